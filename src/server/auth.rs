//! Authentication seam
//!
//! The server does not decide who may connect. It hands the token from the
//! client's `hello` event to an [`Authenticator`] and only serves the
//! connection if a [`Principal`] comes back.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

/// Connection information passed to the authenticator
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Unique connection ID
    pub connection_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,
}

impl ConnectionContext {
    /// Create a new context
    pub fn new(connection_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            peer_addr,
        }
    }
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Decides whether a connection may use the live channel
pub trait Authenticator: Send + Sync + 'static {
    /// Check the token sent in `hello`
    ///
    /// Returns `None` to refuse the connection.
    fn authenticate(
        &self,
        ctx: &ConnectionContext,
        token: Option<&str>,
    ) -> impl Future<Output = Option<Principal>> + Send;
}

/// Accepts everyone, naming them after their connection
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    async fn authenticate(&self, ctx: &ConnectionContext, _token: Option<&str>) -> Option<Principal> {
        Some(Principal::new(format!("anonymous-{}", ctx.connection_id)))
    }
}

/// Accepts a fixed set of tokens
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, Principal>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a principal
    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<String>) -> Self {
        self.tokens
            .insert(token.into(), Principal::new(principal));
        self
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if no token is registered
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticTokens {
    async fn authenticate(&self, ctx: &ConnectionContext, token: Option<&str>) -> Option<Principal> {
        let principal = token.and_then(|t| self.tokens.get(t)).cloned();
        if principal.is_none() {
            tracing::debug!(
                conn = ctx.connection_id,
                peer = %ctx.peer_addr,
                "Unknown token"
            );
        }
        principal
    }
}
