pub mod home_network;

pub use home_network::{HomeNetworkClient, HomeTransaction};
