use serde::Deserialize;

/// Envelope shared by every v5 REST response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i32,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentsResult {
    pub list: Vec<InstrumentInfo>,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct KlineResult {
    pub list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct OrderBookResult {
    pub b: Vec<Vec<String>>,
    pub a: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RecentTradeResult {
    pub list: Vec<RecentTrade>,
}

#[derive(Debug, Deserialize)]
pub struct RecentTrade {
    #[serde(rename = "execId")]
    pub exec_id: String,
    pub price: String,
    pub size: String,
    pub side: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenInterestResult {
    pub list: Vec<OpenInterestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OpenInterestEntry {
    #[serde(rename = "openInterest")]
    pub open_interest: String,
}

#[derive(Debug, Deserialize)]
pub struct TickersResult {
    pub list: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TickerEntry {
    #[serde(rename = "lastPrice")]
    pub last_price: String,
    #[serde(rename = "fundingRate")]
    pub funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    pub next_funding_time: String,
}
