use std::fmt;

use url::Url;

use crate::core::error::ClientError;

pub const VMS_PATH: &str = "/api/vms";
pub const LAUNCH_PATH: &str = "/api/launch";
pub const FORK_PATH: &str = "/api/fork";
pub const HOST_SHUTDOWN_PATH: &str = "/api/host-shutdown";

/// Validated base address of the VM service, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base: String,
}

impl ServiceEndpoint {
    /// Accepts `http://host:port` style addresses. A bare `host:port` is treated as http.
    pub fn parse(address: &str) -> Result<Self, ClientError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ClientError::MissingBaseUrl);
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let parsed = Url::parse(&candidate).map_err(|err| ClientError::InvalidBaseUrl {
            address: trimmed.to_string(),
            reason: err.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl {
                address: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidBaseUrl {
                address: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            base: candidate.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn vms_url(&self) -> String {
        self.url_for(VMS_PATH)
    }

    pub fn launch_url(&self) -> String {
        self.url_for(LAUNCH_PATH)
    }

    pub fn fork_url(&self) -> String {
        self.url_for(FORK_PATH)
    }

    pub fn host_shutdown_url(&self) -> String {
        self.url_for(HOST_SHUTDOWN_PATH)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
