//! Trendguard trading bot library
//!
//! Trend-following futures trading for a single symbol: indicator pipeline,
//! signal engine, risk sizing with circuit breakers, and the polling loop
//! that ties them to an exchange gateway.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod secrets;
