pub mod config;
pub mod deploy;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod platform;
pub mod registry;
pub mod ui;
