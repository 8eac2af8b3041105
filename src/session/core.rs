//! The ad session.
//!
//! An [`AdSession`] is a cheap handle: clones share one session. Facades keep
//! a clone; the session never references its facades or its service.
//!
//! # Construction
//!
//! With a transport, starting a session sends, in order:
//!
//! 1. `setClientInfo` with the client version and partner identity
//! 2. `getVersion`, the handshake establishing the service version
//! 3. `injectVerificationScriptResources` when resources were given
//! 4. `setSlotElement` / `setVideoElement` when elements were given
//! 5. `registerSessionObserver`, watching for lifecycle events
//!
//! Without a transport every outbound operation is a silent no-op and
//! [`AdSession::is_supported`] reports `false`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{
    AdEventType, Arg, ElementHandle, ErrorType, Rectangle, Service, SessionEvent, is_compatible,
};
use crate::transport::Transport;

use super::builder::AdSessionBuilder;
use super::context::SessionContext;
use super::correlation::{CorrelationTable, Reply, dispatch_inbound, submit};
use super::{FacadeKind, Registration, SessionState};

// ============================================================================
// Types
// ============================================================================

/// State written only by the lifecycle observer and the handshake.
#[derive(Debug, Default)]
struct Lifecycle {
    state: SessionState,
    negotiated_version: Option<String>,
}

/// State shared by all clones of a session.
struct Shared {
    context: SessionContext,
    transport: Option<Box<dyn Transport>>,
    client_version: String,
    correlation: Arc<Mutex<CorrelationTable>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    registrations: Mutex<FxHashSet<FacadeKind>>,
    impression: AtomicBool,
}

// ============================================================================
// AdSession
// ============================================================================

/// A single measurement session.
///
/// # Example
///
/// ```
/// use omid_bridge::{AdSession, Partner, SessionContext};
///
/// # fn example() -> omid_bridge::Result<()> {
/// let context = SessionContext::new(Partner::new("Partner", "1.0.0")?);
/// let session = AdSession::builder().context(context).without_service().build()?;
///
/// assert!(!session.is_supported());
/// session.send_one_way("impressionOccurred", vec![])?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AdSession {
    shared: Arc<Shared>,
}

impl AdSession {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> AdSessionBuilder {
        AdSessionBuilder::new()
    }

    /// Starts a session over `transport`.
    pub(crate) fn start(
        context: SessionContext,
        transport: Option<Box<dyn Transport>>,
        client_version: String,
    ) -> Result<Self> {
        let correlation = Arc::new(Mutex::new(CorrelationTable::default()));

        if let Some(transport) = &transport {
            let table = Arc::clone(&correlation);
            let version = client_version.clone();
            transport.set_on_message(Arc::new(move |message, _from| {
                dispatch_inbound(&table, &version, message);
            }));
        }

        let session = Self {
            shared: Arc::new(Shared {
                context,
                transport,
                client_version,
                correlation,
                lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
                registrations: Mutex::new(FxHashSet::default()),
                impression: AtomicBool::new(false),
            }),
        };

        session.set_client_info()?;
        session.negotiate_version()?;
        session.inject_verification_scripts()?;
        if let Some(slot) = session.shared.context.slot_element().cloned() {
            session.send_element("setSlotElement", slot)?;
        }
        if let Some(video) = session.shared.context.video_element().cloned() {
            session.send_element("setVideoElement", video)?;
        }
        session.watch_session_events()?;

        debug!(
            supported = session.is_supported(),
            version = %session.shared.client_version,
            "Ad session started"
        );
        Ok(session)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns `true` if a service was found.
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.shared.transport.is_some()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.lock().state
    }

    /// Returns the version the service reported in the handshake.
    #[must_use]
    pub fn negotiated_version(&self) -> Option<String> {
        self.shared.lifecycle.lock().negotiated_version.clone()
    }

    /// Returns the protocol version this session speaks.
    #[inline]
    #[must_use]
    pub fn client_version(&self) -> &str {
        &self.shared.client_version
    }

    /// Returns the session context.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.shared.context
    }

    /// Returns the number of unanswered one-shot requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.correlation.lock().pending_count()
    }

    /// Returns `true` if the transport allows direct references.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.shared
            .transport
            .as_ref()
            .is_some_and(|transport| transport.is_direct())
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Sends `SessionService.<method>` without expecting a reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Codec`] if a direct reference must be JSON encoded
    /// - [`Error::NotTransmissible`] if a direct reference would cross a
    ///   boundary
    pub fn send_one_way(&self, method: &str, args: Vec<Arg>) -> Result<()> {
        self.send(method, args, Reply::None).map(|_| ())
    }

    /// Sends `SessionService.<method>` and runs `callback` with the decoded
    /// reply arguments. The callback fires at most once.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way). The callback is
    /// forgotten when sending fails.
    pub fn send_request(
        &self,
        method: &str,
        args: Vec<Arg>,
        callback: impl FnOnce(Vec<Arg>) + Send + 'static,
    ) -> Result<()> {
        self.send(method, args, Reply::Once(Box::new(callback)))
            .map(|_| ())
    }

    /// Sends `SessionService.<method>` and runs `callback` for every reply
    /// for the lifetime of the session.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way).
    pub fn subscribe(
        &self,
        method: &str,
        args: Vec<Arg>,
        callback: impl Fn(Vec<Arg>) + Send + Sync + 'static,
    ) -> Result<()> {
        self.send(method, args, Reply::Every(Arc::new(callback)))
            .map(|_| ())
    }

    /// Sends `SessionService.<method>` and waits for the reply.
    ///
    /// With a `timeout`, the correlation entry is removed when it expires.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if the reply does not arrive in time
    /// - [`Error::ChannelClosed`] if the session has no service
    /// - Any error of [`send_one_way`](Self::send_one_way)
    pub async fn request(
        &self,
        method: &str,
        args: Vec<Arg>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Arg>> {
        let (tx, rx) = oneshot::channel();
        let id = self.send(
            method,
            args,
            Reply::Once(Box::new(move |args: Vec<Arg>| {
                let _ = tx.send(args);
            })),
        )?;

        let Some(limit) = timeout else {
            return Ok(rx.await?);
        };

        match tokio::time::timeout(limit, rx).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                self.shared.correlation.lock().remove_pending(&id);
                Err(Error::request_timeout(id, limit))
            }
        }
    }

    fn send(&self, method: &str, args: Vec<Arg>, reply: Reply) -> Result<MessageId> {
        let Some(transport) = &self.shared.transport else {
            trace!(method, "No service, message dropped");
            return Ok(MessageId::generate());
        };
        submit(
            transport.as_ref(),
            &self.shared.correlation,
            Service::Session,
            &self.shared.client_version,
            method,
            args,
            reply,
        )
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Runs `observer` with every lifecycle event object the service reports.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way).
    pub fn register_session_observer(
        &self,
        observer: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<()> {
        self.subscribe("registerSessionObserver", vec![], move |args| {
            let event = args
                .into_iter()
                .next()
                .and_then(|arg| match arg {
                    Arg::Json(value) => Some(value),
                    Arg::Element(_) => None,
                })
                .unwrap_or(Value::Null);
            observer(event);
        })
    }

    /// Reports an error to the service.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way).
    pub fn error(&self, error_type: ErrorType, message: &str) -> Result<()> {
        self.send_one_way(
            "sessionError",
            vec![Arg::from(error_type.as_str()), Arg::from(message)],
        )
    }

    /// Reports the bounds of the ad element.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way).
    pub fn set_element_bounds(&self, bounds: Rectangle) -> Result<()> {
        self.send_one_way(
            "setElementBounds",
            vec![Arg::Json(serde_json::to_value(bounds)?)],
        )
    }

    /// Sends a direct element reference.
    ///
    /// Over a relay transport nothing is sent; a `sessionError` is reported
    /// instead.
    ///
    /// # Errors
    ///
    /// Same as [`send_one_way`](Self::send_one_way).
    pub fn send_element(&self, method: &str, element: ElementHandle) -> Result<()> {
        if !self.is_supported() {
            return Ok(());
        }
        if !self.is_direct() {
            warn!(method, "Element not sent over a cross-origin transport");
            return self.error(
                ErrorType::Generic,
                &format!("Session Client {method} called when communication is cross-origin"),
            );
        }
        self.send_one_way(method, vec![Arg::Element(element)])
    }

    /// Binds a facade kind. A kind binds at most once per session.
    pub fn register_facade(&self, kind: FacadeKind) -> Registration {
        if !self.shared.registrations.lock().insert(kind) {
            return Registration::AlreadyRegistered;
        }
        if let Err(e) = self.send_one_way(kind.register_method(), vec![]) {
            warn!(%kind, error = %e, "Failed to announce facade");
        }
        debug!(%kind, "Facade registered");
        Registration::Registered
    }

    /// Fails unless the session is running against a compatible service.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionNotRunning`] before a start event, after a finish
    ///   event, or before the version handshake completed
    /// - [`Error::IncompatibleService`] if the handshake produced an
    ///   incompatible version
    pub fn assert_running(&self) -> Result<()> {
        let lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != SessionState::Running {
            return Err(Error::SessionNotRunning);
        }
        match lifecycle.negotiated_version.as_deref() {
            Some(version) if is_compatible(version, &self.shared.client_version) => Ok(()),
            Some(version) => Err(Error::incompatible_service(version)),
            None => Err(Error::SessionNotRunning),
        }
    }

    /// Records that the impression was signaled.
    #[inline]
    pub fn impression_occurred(&self) {
        self.shared.impression.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the impression was signaled.
    #[inline]
    #[must_use]
    pub fn has_impression_occurred(&self) -> bool {
        self.shared.impression.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Construction Steps
    // ========================================================================

    fn set_client_info(&self) -> Result<()> {
        let partner = self.shared.context.partner();
        self.send_one_way(
            "setClientInfo",
            vec![
                Arg::from(self.shared.client_version.as_str()),
                Arg::from(partner.name()),
                Arg::from(partner.version()),
            ],
        )
    }

    fn negotiate_version(&self) -> Result<()> {
        let lifecycle = Arc::clone(&self.shared.lifecycle);
        let client_version = self.shared.client_version.clone();

        self.send_request("getVersion", vec![], move |args| {
            let Some(version) = args.first().and_then(Arg::as_str) else {
                warn!("Version handshake answered without a version");
                return;
            };
            if !is_compatible(version, &client_version) {
                warn!(service = version, client = %client_version, "Incompatible service version");
            }
            debug!(service = version, "Version negotiated");
            lifecycle.lock().negotiated_version = Some(version.to_string());
        })
    }

    fn inject_verification_scripts(&self) -> Result<()> {
        let Some(resources) = self.shared.context.verification_resources() else {
            return Ok(());
        };
        self.send_one_way(
            "injectVerificationScriptResources",
            vec![Arg::Json(serde_json::to_value(resources)?)],
        )
    }

    fn watch_session_events(&self) -> Result<()> {
        let lifecycle = Arc::clone(&self.shared.lifecycle);

        self.register_session_observer(move |event| {
            let Some(event) = SessionEvent::from_value(&event) else {
                return;
            };
            let mut lifecycle = lifecycle.lock();
            match (event.event_type, lifecycle.state) {
                (AdEventType::SessionStart, state) if state != SessionState::Running => {
                    lifecycle.state = SessionState::Running;
                    debug!("Session running");
                }
                (AdEventType::SessionFinish, SessionState::Running) => {
                    lifecycle.state = SessionState::Finished;
                    debug!("Session finished");
                }
                _ => {}
            }
        })
    }
}

impl fmt::Debug for AdSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdSession")
            .field("supported", &self.is_supported())
            .field("state", &self.state())
            .field("client_version", &self.shared.client_version)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
