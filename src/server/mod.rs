//! HTTP server bind configuration.
//!
//! The bind address isn't part of the configuration record (§6) pushed
//! through [`crate::config::ConfigManager`] — that record describes
//! routing/transform/cache policy a hot update can swap, while the
//! listen address is a deployment-time concern set once at process
//! start. Kept as a small standalone struct the way the teacher keeps
//! `ServerConfig` independent of the S3 bucket configuration.

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub address: String,
    /// Number of worker threads
    pub threads: usize,
}

impl ServerConfig {
    /// Create a new ServerConfig with default values
    pub fn new(address: String) -> Self {
        Self {
            address,
            threads: 4, // Default to 4 threads
        }
    }
}
