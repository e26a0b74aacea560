pub mod bybit_client;
pub mod exchange_client_factory;
pub mod simulated_client;
