//! Startup configuration read from the environment

use crate::segmenter::{MarkerPair, DEFAULT_CLOSE_MARKER, DEFAULT_OPEN_MARKER};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "deepseek-r1:14b";

/// Server and model settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub ollama_url: String,
    pub model: String,
    pub markers: MarkerPair,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset, empty or unparsable
    /// values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind: var("CHAT_BIND")
                .and_then(|b| b.trim().parse().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: var("CHAT_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            ollama_url: var("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: var("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            markers: MarkerPair::new(
                var("THINK_OPEN_MARKER").unwrap_or_else(|| DEFAULT_OPEN_MARKER.to_string()),
                var("THINK_CLOSE_MARKER").unwrap_or_else(|| DEFAULT_CLOSE_MARKER.to_string()),
            ),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
