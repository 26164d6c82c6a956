pub mod classify;
pub mod config;
pub mod constants;
#[cfg(feature = "db")]
pub mod db;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod normalize;
pub mod period;
pub mod providers;
pub mod storage;
pub mod types;
