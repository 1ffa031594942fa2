pub mod error;
pub mod settings;
pub mod poff;
pub mod server;
