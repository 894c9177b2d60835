pub mod coingecko;
pub mod dataset;
pub mod exchange_rate;
