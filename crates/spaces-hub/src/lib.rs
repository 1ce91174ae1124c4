//! HTTP client for the Hugging Face Spaces API.

mod client;
mod config;

pub use client::HubClient;
pub use config::{HubConfig, DEFAULT_BASE_URL};
