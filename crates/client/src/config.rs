//! Environment-selected endpoint configuration.
//!
//! Host and service identifier are constants per deployment, resolved once
//! per channel construction and never re-read mid-call.

use std::env;

use vickrey_types::DEFAULT_SERVICE_ID;

/// Ledger gateway for local development deployments.
pub const LOCAL_HOST: &str = "http://127.0.0.1:9944";

/// Ledger gateway for production deployments.
pub const PRODUCTION_HOST: &str = "https://rpc.auctionledger.example";

/// Deployment environment the client runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local/test deployment; channels perform the trust bootstrap.
    #[default]
    Local,
    /// Production deployment; the root of trust ships with the client.
    Production,
}

impl Environment {
    /// Resolve from `AUCTION_ENV` (`production` selects production, anything
    /// else the local deployment).
    pub fn from_env() -> Self {
        match env::var("AUCTION_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Local,
        }
    }

    pub fn host(&self) -> &'static str {
        match self {
            Environment::Local => LOCAL_HOST,
            Environment::Production => PRODUCTION_HOST,
        }
    }

    /// Whether freshly built channels must fetch the endpoint's root of
    /// trust before use. Only non-production deployments need this.
    pub fn requires_trust_bootstrap(&self) -> bool {
        matches!(self, Environment::Local)
    }

    /// Default endpoint for this environment, with `AUCTION_RPC_URL` and
    /// `AUCTION_SERVICE_ID` overrides applied.
    pub fn endpoint(&self) -> Endpoint {
        let host = env::var("AUCTION_RPC_URL").unwrap_or_else(|_| self.host().to_string());
        let service = env::var("AUCTION_SERVICE_ID").unwrap_or_else(|_| DEFAULT_SERVICE_ID.to_string());
        Endpoint::new(host, service)
    }
}

/// A resolved call target: one host, one service endpoint identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub service: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
        }
    }

    /// URL channels are built against.
    pub fn url(&self) -> &str {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_environment_bootstraps_trust() {
        assert!(Environment::Local.requires_trust_bootstrap());
        assert!(!Environment::Production.requires_trust_bootstrap());
    }

    #[test]
    fn hosts_differ_per_environment() {
        assert_ne!(Environment::Local.host(), Environment::Production.host());
    }

    #[test]
    fn endpoint_url_is_the_host() {
        let endpoint = Endpoint::new("http://127.0.0.1:4943", "auc-backend");
        assert_eq!(endpoint.url(), "http://127.0.0.1:4943");
    }
}
