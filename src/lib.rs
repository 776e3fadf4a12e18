pub mod config;
pub mod coordinator;
pub mod eth;
pub mod format;
pub mod graceful_shutdown;
pub mod health;
pub mod hyperliquid;
pub mod json_util;
pub mod ledger;
pub mod mirror;
pub mod normalize;
pub mod notify;
pub mod poller;
pub mod positions;
pub mod stream;
pub mod types;
