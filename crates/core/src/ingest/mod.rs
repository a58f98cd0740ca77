pub mod fixture;
pub mod provider;
pub mod tushare;
pub mod types;

pub use fixture::FixtureDataSource;
pub use provider::MarketDataSource;
pub use tushare::TushareClient;
