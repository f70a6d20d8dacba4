pub mod actions;
pub mod api;
pub mod capture;
pub mod config;
pub mod hub;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod shutdown;
