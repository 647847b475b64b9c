pub mod channel;
pub mod clients;
pub mod crypto;
pub mod engine;
pub mod handlers;
pub mod types;
