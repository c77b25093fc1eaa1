pub mod config;
pub mod logging;

pub mod adapters;
pub mod breaker;
pub mod executor;
pub mod retry;
