pub mod api;
pub mod app;
pub mod cache;
pub mod channel_seed;
pub mod config;
pub mod logging;
pub mod sla;
pub mod state;
