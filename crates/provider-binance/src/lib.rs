mod client;
mod dto;

pub use client::BinanceProvider;

pub const VENUE_ID: &str = "binance";
pub const BASE_URL: &str = "https://fapi.binance.com";
