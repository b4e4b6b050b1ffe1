mod client;
mod dto;

pub use client::BybitProvider;

pub const VENUE_ID: &str = "bybit";
pub const BASE_URL: &str = "https://api.bybit.com";
