pub mod config;
pub mod conn;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod logging;
pub mod net;
pub mod telnet;

pub static CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

pub type Result<T, E = error::Error> = core::result::Result<T, E>;
