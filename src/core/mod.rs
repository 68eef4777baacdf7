pub mod chat_stream;
pub mod config;
pub mod error;
pub mod message;
pub mod persona;
pub mod providers;
pub mod session;
