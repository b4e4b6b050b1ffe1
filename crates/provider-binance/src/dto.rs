use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    #[serde(rename = "contractType")]
    pub contract_type: String,
}

/// A single kline row, positional per Binance's array-of-arrays response.
#[derive(Debug, Deserialize)]
pub struct Kline(
    pub i64,    // open time
    pub String, // open
    pub String, // high
    pub String, // low
    pub String, // close
    pub String, // volume
    pub i64,    // close time
    pub String, // quote asset volume
    pub u64,    // number of trades
    pub String, // taker buy base volume
    pub String, // taker buy quote volume
    pub String, // ignore
);

#[derive(Debug, Deserialize)]
pub struct DepthResponse {
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
pub struct TradeResponse {
    pub price: String,
    pub qty: String,
    pub time: i64,
    #[serde(rename = "isBuyerMaker")]
    pub is_buyer_maker: bool,
}

#[derive(Debug, Deserialize)]
pub struct OpenInterestResponse {
    #[serde(rename = "openInterest")]
    pub open_interest: String,
}

#[derive(Debug, Deserialize)]
pub struct PremiumIndexResponse {
    #[serde(rename = "markPrice")]
    pub mark_price: String,
    #[serde(rename = "lastFundingRate")]
    pub last_funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    pub next_funding_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct TickerPriceResponse {
    pub price: String,
}
