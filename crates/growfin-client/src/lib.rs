pub mod client;
pub mod config;
pub mod debug;
pub mod envelope;
pub mod error;
pub mod provider;
pub mod ticker;

#[cfg(test)]
mod test_server;
