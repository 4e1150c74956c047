pub mod config;
pub mod endpoint;
pub mod error;
pub mod fork;
pub mod inventory;
pub mod launch;
pub mod session;
pub mod terminal;
pub mod transport;
