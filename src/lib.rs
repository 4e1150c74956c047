pub mod cli;
pub mod core;
pub mod logging;
pub mod platform;
