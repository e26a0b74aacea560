pub mod exchange_gateway;
