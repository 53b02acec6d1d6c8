pub mod brewing;
pub mod commands;
pub mod console;
pub mod controller;
pub mod hardware;
pub mod scheduler;
pub mod system;
pub mod telemetry;
pub mod transport;
pub mod twin;
pub mod types;

pub use types::*;
pub use controller::*;
