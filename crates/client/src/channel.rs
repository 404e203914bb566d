//! Call channels and the factory that builds them.
//!
//! A channel binds exactly one identity (or the anonymous identity) to one
//! endpoint. Channels are cheap and built per call where freshness matters;
//! they are never pooled and never survive an identity change.

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use thiserror::Error;
use tracing::debug;

use vickrey_types::{Identity, SessionToken};

use crate::config::{Endpoint, Environment};

/// Errors constructing a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to construct call channel: {0}")]
    Construction(String),

    #[error("endpoint unreachable: trust bootstrap failed: {0}")]
    EndpointUnreachable(String),
}

/// A call conduit bound to one identity and one endpoint.
///
/// The binding is fixed at construction; a superseded identity means a
/// discarded channel, never a mutated one.
#[derive(Debug)]
pub struct Channel {
    http: HttpClient,
    identity: Option<Identity>,
    endpoint: Endpoint,
    root_key: Option<String>,
}

impl Channel {
    /// Identity this channel is bound to, if not anonymous.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Credential presented on mutating calls issued over this channel.
    pub fn credential(&self) -> Option<&SessionToken> {
        self.identity.as_ref().map(|id| &id.token)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Root of trust fetched at construction, present only in deployments
    /// that bootstrap it.
    pub fn root_key(&self) -> Option<&str> {
        self.root_key.as_deref()
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }
}

/// Builds channels keyed by (identity, environment).
///
/// Callers must not hold a built channel across an identity change; they ask
/// the factory again instead.
#[derive(Clone)]
pub struct ChannelFactory {
    environment: Environment,
    endpoint: Endpoint,
}

impl ChannelFactory {
    /// Factory for the environment's default endpoint.
    pub fn new(environment: Environment) -> Self {
        let endpoint = environment.endpoint();
        Self {
            environment,
            endpoint,
        }
    }

    /// Factory for an explicit endpoint, keeping the environment's trust
    /// bootstrap behavior.
    pub fn with_endpoint(environment: Environment, endpoint: Endpoint) -> Self {
        Self {
            environment,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build a channel bound to `identity` (anonymous when `None`).
    ///
    /// Outside production this performs the one-time root-of-trust fetch on
    /// the freshly built channel before handing it out; failure there means
    /// the endpoint is unreachable and no channel is returned.
    pub async fn build(&self, identity: Option<&Identity>) -> Result<Channel, ChannelError> {
        let http = HttpClientBuilder::default()
            .build(self.endpoint.url())
            .map_err(|e| ChannelError::Construction(e.to_string()))?;

        let mut channel = Channel {
            http,
            identity: identity.cloned(),
            endpoint: self.endpoint.clone(),
            root_key: None,
        };

        if self.environment.requires_trust_bootstrap() {
            let root_key: String = channel
                .http
                .request("chain_getRootKey", vec![self.endpoint.service.clone()])
                .await
                .map_err(|e| ChannelError::EndpointUnreachable(e.to_string()))?;
            debug!(endpoint = %self.endpoint.host, "root of trust fetched");
            channel.root_key = Some(root_key);
        }

        debug!(
            service = %self.endpoint.service,
            authenticated = channel.identity.is_some(),
            "channel built"
        );
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn production_build_skips_bootstrap() {
        // No server is listening here; without the bootstrap fetch the build
        // must still succeed because constructing an HTTP client is lazy.
        let factory = ChannelFactory::with_endpoint(
            Environment::Production,
            Endpoint::new("http://127.0.0.1:1", "auc-backend"),
        );
        let channel = factory.build(None).await.expect("lazy build");
        assert!(channel.identity().is_none());
        assert!(channel.root_key().is_none());
    }

    #[tokio::test]
    async fn local_build_fails_unreachable_endpoint() {
        let factory = ChannelFactory::with_endpoint(
            Environment::Local,
            Endpoint::new("http://127.0.0.1:1", "auc-backend"),
        );
        let err = factory.build(None).await.expect_err("bootstrap must fail");
        assert!(matches!(err, ChannelError::EndpointUnreachable(_)));
    }
}
