//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and starting [`AdSession`]
//! instances.
//!
//! # Transport Selection
//!
//! | Configuration | Transport |
//! |---------------|-----------|
//! | `.transport(..)` | The given transport |
//! | `.without_service()` | None, the session is unsupported |
//! | `.host(..)` | Located through the session call site |
//! | Nothing | None, the session is unsupported |
//!
//! # Example
//!
//! ```
//! use omid_bridge::{AdSession, FrameTree, Host, Partner, SessionContext};
//! use std::sync::Arc;
//!
//! # fn example() -> omid_bridge::Result<()> {
//! let tree = FrameTree::new();
//! let root = tree.add_root("https://publisher.example");
//! let host: Arc<dyn Host> = Arc::new(tree.view(root));
//!
//! let session = AdSession::builder()
//!     .context(SessionContext::new(Partner::new("Partner", "1.0.0")?))
//!     .host(host)
//!     .build()?;
//!
//! // No service is exported anywhere in the tree.
//! assert!(!session.is_supported());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::discovery::{PresenceProbe, default_presence_probe, locate_session_service};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::identifiers::ContextId;
use crate::protocol::PROTOCOL_VERSION;
use crate::protocol::version::is_valid_version;
use crate::transport::Transport;

use super::context::SessionContext;
use super::core::AdSession;

// ============================================================================
// AdSessionBuilder
// ============================================================================

/// Builder for configuring an [`AdSession`].
///
/// Use [`AdSession::builder()`] to create a new builder.
#[derive(Default)]
pub struct AdSessionBuilder {
    /// Session context.
    context: Option<SessionContext>,
    /// Host used for discovery.
    host: Option<Arc<dyn Host>>,
    /// Explicit transport, bypassing discovery.
    transport: Option<Box<dyn Transport>>,
    /// Skip discovery entirely.
    without_service: bool,
    /// Candidate tried before the own context.
    service_context: Option<ContextId>,
    /// Presence probe for relay candidates.
    presence_probe: Option<PresenceProbe>,
    /// Protocol version override.
    client_version: Option<String>,
}

// ============================================================================
// AdSessionBuilder Implementation
// ============================================================================

impl AdSessionBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session context. Required.
    #[inline]
    #[must_use]
    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the host used to locate the session service.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Uses `transport` instead of discovery.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Starts the session without a service.
    #[inline]
    #[must_use]
    pub fn without_service(mut self) -> Self {
        self.without_service = true;
        self
    }

    /// Tries `context` before the own and top contexts during discovery.
    #[inline]
    #[must_use]
    pub fn service_context(mut self, context: ContextId) -> Self {
        self.service_context = Some(context);
        self
    }

    /// Sets the presence probe for relay candidates.
    ///
    /// Defaults to [`is_service_present`](crate::discovery::is_service_present).
    #[inline]
    #[must_use]
    pub fn presence_probe(mut self, probe: PresenceProbe) -> Self {
        self.presence_probe = Some(probe);
        self
    }

    /// Overrides the protocol version the session declares.
    ///
    /// Versions before `1.0.3` encode arguments as JSON text.
    #[inline]
    #[must_use]
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = Some(version.into());
        self
    }
}

// ============================================================================
// Build
// ============================================================================

impl AdSessionBuilder {
    /// Selects a transport and starts the session.
    ///
    /// # Errors
    ///
    /// - [`Error::Construction`] if no context was set or the client
    ///   version is malformed
    /// - Any error raised while sending the construction messages
    pub fn build(self) -> Result<AdSession> {
        let context = self
            .context
            .ok_or_else(|| Error::construction("Context is undefined or null"))?;

        let client_version = self
            .client_version
            .unwrap_or_else(|| PROTOCOL_VERSION.to_string());
        if !is_valid_version(&client_version) {
            return Err(Error::construction(format!(
                "Invalid client version: {client_version}"
            )));
        }

        let transport = if self.without_service {
            None
        } else if let Some(transport) = self.transport {
            Some(transport)
        } else if let Some(host) = &self.host {
            let probe = self.presence_probe.unwrap_or_else(default_presence_probe);
            locate_session_service(host, self.service_context, &probe)
        } else {
            None
        };

        debug!(
            transport = ?transport.as_ref().map(|transport| transport.kind()),
            "Session transport selected"
        );
        AdSession::start(context, transport, client_version)
    }
}

impl fmt::Debug for AdSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdSessionBuilder")
            .field("context", &self.context)
            .field("has_host", &self.host.is_some())
            .field("has_transport", &self.transport.is_some())
            .field("without_service", &self.without_service)
            .field("service_context", &self.service_context)
            .field("client_version", &self.client_version)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
