pub mod circuit_breaker;
pub mod indicators;
pub mod position_sizer;
pub mod signal_engine;
