//! The verification client.
//!
//! # Timers
//!
//! When the host provides timers they run locally. Otherwise timers are
//! proxied to the service under ids allocated by the client:
//!
//! | Operation | Proxied as |
//! |-----------|------------|
//! | `set_timeout` | `setTimeout(id, ms)`, answered once |
//! | `set_interval` | `setInterval(id, ms)`, answered on every tick |
//! | `clear_timeout` | `clearTimeout(id)` |
//! | `clear_interval` | `clearInterval(id)` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::host::Timers;
use crate::identifiers::MessageId;
use crate::protocol::{Arg, PROTOCOL_VERSION, Service};
use crate::session::correlation::{CorrelationTable, Reply, dispatch_inbound, submit};
use crate::transport::Transport;
use crate::validate::{assert_positive_number, assert_truthy_string};

use super::builder::VerificationClientBuilder;

// ============================================================================
// VerificationClient
// ============================================================================

/// Client for the verification service.
///
/// Every operation is a silent no-op when no service was found.
pub struct VerificationClient {
    transport: Option<Box<dyn Transport>>,
    correlation: Arc<Mutex<CorrelationTable>>,
    timers: Option<Arc<dyn Timers>>,
    next_timeout: AtomicU64,
    next_interval: AtomicU64,
    /// Proxied timers by local id. Timeouts leave once they fire.
    remote_timeouts: Arc<Mutex<FxHashMap<u64, MessageId>>>,
    remote_intervals: Mutex<FxHashMap<u64, MessageId>>,
}

impl VerificationClient {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> VerificationClientBuilder {
        VerificationClientBuilder::new()
    }

    pub(crate) fn new(
        transport: Option<Box<dyn Transport>>,
        timers: Option<Arc<dyn Timers>>,
    ) -> Self {
        let correlation = Arc::new(Mutex::new(CorrelationTable::default()));

        if let Some(transport) = &transport {
            let table = Arc::clone(&correlation);
            transport.set_on_message(Arc::new(move |message, _from| {
                dispatch_inbound(&table, PROTOCOL_VERSION, message);
            }));
        }

        Self {
            transport,
            correlation,
            timers,
            next_timeout: AtomicU64::new(0),
            next_interval: AtomicU64::new(0),
            remote_timeouts: Arc::new(Mutex::new(FxHashMap::default())),
            remote_intervals: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns `true` if a service was found.
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns the number of unanswered one-shot requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().pending_count()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Runs `observer` with every session start and finish event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// blank vendor key.
    pub fn register_session_observer(
        &self,
        observer: impl Fn(Value) + Send + Sync + 'static,
        vendor_key: Option<&str>,
    ) -> Result<()> {
        let mut args = Vec::new();
        if let Some(key) = vendor_key {
            assert_truthy_string("vendorKey", key)?;
            args.push(Arg::from(key));
        }
        self.send(
            "addSessionListener",
            args,
            Reply::Every(Arc::new(move |args: Vec<Arg>| observer(first_json(args)))),
        )
        .map(|_| ())
    }

    /// Runs `listener` with every ad event of `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// blank event type.
    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<()> {
        assert_truthy_string("eventType", event_type)?;
        self.send(
            "addEventListener",
            vec![Arg::from(event_type)],
            Reply::Every(Arc::new(move |args: Vec<Arg>| listener(first_json(args)))),
        )
        .map(|_| ())
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Asks the service to request `url`.
    ///
    /// Exactly one of the callbacks runs when the service answers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// blank URL.
    pub fn send_url(
        &self,
        url: &str,
        on_success: impl FnOnce() + Send + 'static,
        on_failure: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        assert_truthy_string("url", url)?;
        self.send(
            "sendUrl",
            vec![Arg::from(url)],
            Reply::Once(Box::new(move |args: Vec<Arg>| {
                if reported_success(&args) {
                    on_success();
                } else {
                    on_failure();
                }
            })),
        )
        .map(|_| ())
    }

    /// Asks the service to fetch the script at `url`.
    ///
    /// `on_loaded` receives the script source. Evaluating it is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// blank URL.
    pub fn inject_javascript_resource(
        &self,
        url: &str,
        on_loaded: impl FnOnce(String) + Send + 'static,
        on_failure: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        assert_truthy_string("url", url)?;
        let resource = url.to_string();
        self.send(
            "injectJavaScriptResource",
            vec![Arg::from(url)],
            Reply::Once(Box::new(move |args: Vec<Arg>| {
                if !reported_success(&args) {
                    error!(url = %resource, "Service failed to load JavaScript resource");
                    on_failure();
                    return;
                }
                let contents = args
                    .get(1)
                    .and_then(Arg::as_str)
                    .unwrap_or_default()
                    .to_string();
                on_loaded(contents);
            })),
        )
        .map(|_| ())
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Runs `callback` once after `time_in_millis`. Returns the timeout id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// negative, non-finite or unrepresentable delay.
    pub fn set_timeout(
        &self,
        callback: impl FnOnce() + Send + 'static,
        time_in_millis: f64,
    ) -> Result<u64> {
        let delay = millis(time_in_millis)?;

        if let Some(timers) = &self.timers {
            return Ok(timers.set_timeout(Box::new(callback), delay));
        }

        let id = self.next_timeout.fetch_add(1, Ordering::Relaxed);
        let remote = Arc::clone(&self.remote_timeouts);
        let message_id = self.send(
            "setTimeout",
            vec![Arg::from(id), Arg::from(time_in_millis)],
            Reply::Once(Box::new(move |_: Vec<Arg>| {
                remote.lock().remove(&id);
                callback();
            })),
        )?;

        // A synchronous service may already have fired the timeout.
        let mut remote = self.remote_timeouts.lock();
        if self.correlation.lock().is_pending(&message_id) {
            remote.insert(id, message_id);
        }
        Ok(id)
    }

    /// Cancels a timeout that has not fired yet.
    pub fn clear_timeout(&self, timeout_id: u64) -> Result<()> {
        if let Some(timers) = &self.timers {
            timers.clear_timeout(timeout_id);
            return Ok(());
        }

        if let Some(message_id) = self.remote_timeouts.lock().remove(&timeout_id) {
            self.correlation.lock().remove_pending(&message_id);
        }
        self.send("clearTimeout", vec![Arg::from(timeout_id)], Reply::None)
            .map(|_| ())
    }

    /// Runs `callback` every `time_in_millis`. Returns the interval id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    /// negative, non-finite or unrepresentable period.
    pub fn set_interval(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
        time_in_millis: f64,
    ) -> Result<u64> {
        let period = millis(time_in_millis)?;

        if let Some(timers) = &self.timers {
            return Ok(timers.set_interval(Arc::new(callback), period));
        }

        let id = self.next_interval.fetch_add(1, Ordering::Relaxed);
        let message_id = self.send(
            "setInterval",
            vec![Arg::from(id), Arg::from(time_in_millis)],
            Reply::Every(Arc::new(move |_: Vec<Arg>| callback())),
        )?;
        self.remote_intervals.lock().insert(id, message_id);
        Ok(id)
    }

    /// Stops an interval.
    pub fn clear_interval(&self, interval_id: u64) -> Result<()> {
        if let Some(timers) = &self.timers {
            timers.clear_interval(interval_id);
            return Ok(());
        }

        if let Some(message_id) = self.remote_intervals.lock().remove(&interval_id) {
            self.correlation.lock().remove_subscription(&message_id);
        }
        self.send("clearInterval", vec![Arg::from(interval_id)], Reply::None)
            .map(|_| ())
    }

    // ========================================================================
    // Sending
    // ========================================================================

    fn send(&self, method: &str, args: Vec<Arg>, reply: Reply) -> Result<MessageId> {
        let Some(transport) = &self.transport else {
            trace!(method, "No verification service, message dropped");
            return Ok(MessageId::generate());
        };
        let id = submit(
            transport.as_ref(),
            &self.correlation,
            Service::Verification,
            PROTOCOL_VERSION,
            method,
            args,
            reply,
        )?;
        debug!(%id, method, "Verification message sent");
        Ok(id)
    }
}

impl fmt::Debug for VerificationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationClient")
            .field("supported", &self.is_supported())
            .field("host_timers", &self.timers.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn first_json(args: Vec<Arg>) -> Value {
    match args.into_iter().next() {
        Some(Arg::Json(value)) => value,
        _ => Value::Null,
    }
}

fn reported_success(args: &[Arg]) -> bool {
    args.first()
        .and_then(Arg::as_json)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Validates a delay in milliseconds and converts it.
fn millis(value: f64) -> Result<Duration> {
    assert_positive_number("timeInMillis", value)?;
    Duration::try_from_secs_f64(value / 1000.0).map_err(|_| {
        Error::invalid_argument(format!("timeInMillis is out of range: {value}"))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CrossOriginReads, FrameTree, TokioTimers};
    use crate::protocol::{Message, Payload, RESPONSE_METHOD};
    use crate::testing::FakeService;
    use crate::transport::{DirectTransport, Endpoint};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn client(service: &FakeService) -> VerificationClient {
        VerificationClient::builder()
            .transport(service.client_transport())
            .build()
    }

    #[test]
    fn test_unsupported_client_is_silent() {
        let client = VerificationClient::builder().build();
        assert!(!client.is_supported());
        assert!(client.send_url("https://v.example/p", || {}, || {}).is_ok());
        assert_eq!(client.set_timeout(|| {}, 10.0).expect("timeout"), 0);
    }

    #[test]
    fn test_methods_are_namespaced() {
        let service = FakeService::new();
        let client = client(&service);
        client
            .add_event_listener("impression", |_| {})
            .expect("listener");

        let (message, _) = service.find("VerificationService.addEventListener");
        assert_eq!(message.args, Payload::Structured(vec![Arg::from("impression")]));
    }

    #[test]
    fn test_arguments_validated() {
        let service = FakeService::new();
        let client = client(&service);
        assert!(client.add_event_listener("", |_| {}).is_err());
        assert!(client.send_url("  ", || {}, || {}).is_err());
        assert!(client.register_session_observer(|_| {}, Some("")).is_err());
        assert!(client.set_timeout(|| {}, -1.0).is_err());
        assert!(service.methods().is_empty());
    }

    #[test]
    fn test_session_observer_fires_repeatedly() {
        let service = FakeService::new();
        let client = client(&service);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        client
            .register_session_observer(move |event| sink.lock().push(event), Some("vendor"))
            .expect("observer");

        let (request, _) = service.find("VerificationService.addSessionListener");
        assert_eq!(request.args, Payload::Structured(vec![Arg::from("vendor")]));
        service.reply_to(&request, vec![Arg::from(json!({"type": "sessionStart"}))]);
        service.reply_to(&request, vec![Arg::from(json!({"type": "sessionFinish"}))]);

        assert_eq!(
            *seen.lock(),
            vec![json!({"type": "sessionStart"}), json!({"type": "sessionFinish"})]
        );
    }

    #[test]
    fn test_send_url_runs_one_callback() {
        let service = FakeService::new();
        let client = client(&service);
        let outcome = Arc::new(Mutex::new(Vec::new()));

        let (ok, failed) = (Arc::clone(&outcome), Arc::clone(&outcome));
        client
            .send_url(
                "https://v.example/pixel",
                move || ok.lock().push("success"),
                move || failed.lock().push("failure"),
            )
            .expect("send");
        service.reply("VerificationService.sendUrl", vec![Arg::from(false)]);
        service.reply("VerificationService.sendUrl", vec![Arg::from(true)]);

        assert_eq!(*outcome.lock(), vec!["failure"]);
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_inject_javascript_resource_hands_back_contents() {
        let service = FakeService::new();
        let client = client(&service);
        let loaded = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&loaded);
        client
            .inject_javascript_resource(
                "https://v.example/extra.js",
                move |contents| *sink.lock() = Some(contents),
                || panic!("must not fail"),
            )
            .expect("send");
        service.reply(
            "VerificationService.injectJavaScriptResource",
            vec![Arg::from(true), Arg::from("var x = 1;")],
        );

        assert_eq!(loaded.lock().as_deref(), Some("var x = 1;"));
    }

    #[test]
    fn test_proxied_timers_use_local_ids() {
        let service = FakeService::new();
        let client = client(&service);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let first = client
            .set_timeout(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }, 100.0)
            .expect("timeout");
        let second = client.set_timeout(|| {}, 50.0).expect("timeout");
        assert_eq!((first, second), (0, 1));

        let (request, _) = service.find("VerificationService.setTimeout");
        assert_eq!(
            request.args,
            Payload::Structured(vec![Arg::from(0u64), Arg::from(100.0)])
        );
        service.reply_to(&request, vec![]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        client.clear_timeout(second).expect("clear");
        assert_eq!(client.pending_count(), 0);
        assert_eq!(service.count("VerificationService.clearTimeout"), 1);
    }

    #[test]
    fn test_cleared_proxied_interval_stops_firing() {
        let service = FakeService::new();
        let client = client(&service);
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ticks);
        let id = client
            .set_interval(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }, 10.0)
            .expect("interval");

        let (request, _) = service.find("VerificationService.setInterval");
        service.reply_to(&request, vec![]);
        service.reply_to(&request, vec![]);
        client.clear_interval(id).expect("clear");
        service.reply_to(&request, vec![]);

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fired_proxied_timeouts_are_forgotten() {
        let service = FakeService::new();
        let client = client(&service);
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&fired);
            client
                .set_timeout(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }, 10.0)
                .expect("timeout");
        }
        assert_eq!(client.remote_timeouts.lock().len(), 100);

        for request in service.find_all("VerificationService.setTimeout") {
            service.reply_to(&request, vec![]);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 100);
        assert_eq!(client.pending_count(), 0);
        assert!(client.remote_timeouts.lock().is_empty());
    }

    #[test]
    fn test_synchronously_fired_timeout_not_tracked() {
        let service = Arc::new(DirectTransport::new());
        let responder = Arc::downgrade(&service);
        service.set_on_message(Arc::new(move |message: Message, from: Endpoint| {
            if let Some(service) = responder.upgrade() {
                let reply = Message::new(message.id, RESPONSE_METHOD, PROTOCOL_VERSION, Payload::Absent);
                let _ = service.send(reply, Some(&from));
            }
        }));

        let client = VerificationClient::builder()
            .transport(Box::new(DirectTransport::connect(service.exported_handler())))
            .build();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        client
            .set_timeout(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }, 10.0)
            .expect("timeout");

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(client.remote_timeouts.lock().is_empty());
    }

    #[test]
    fn test_unrepresentable_delay_rejected() {
        let service = FakeService::new();
        let client = client(&service);
        let err = client.set_timeout(|| {}, 1e300).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(client.set_interval(|| {}, 1e300).is_err());
        assert!(client.set_interval(|| {}, f64::MAX).is_err());
        assert!(service.methods().is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_delay_rejected_with_host_timers() {
        let timers: Arc<dyn Timers> = Arc::new(TokioTimers::current().expect("runtime"));
        let tree = FrameTree::with_options(CrossOriginReads::default(), Some(timers));
        let root = tree.add_root("https://publisher.example");

        let client = VerificationClient::builder()
            .host(Arc::new(tree.view(root)))
            .build();
        assert!(matches!(
            client.set_interval(|| {}, 1e300),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            client.set_timeout(|| {}, 1e300),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_timers_run_locally() {
        let timers: Arc<dyn Timers> = Arc::new(TokioTimers::current().expect("runtime"));
        let tree = FrameTree::with_options(CrossOriginReads::default(), Some(timers));
        let root = tree.add_root("https://publisher.example");
        let service = FakeService::new();

        let client = VerificationClient::builder()
            .host(Arc::new(tree.view(root)))
            .transport(service.client_transport())
            .build();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        client
            .set_timeout(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }, 100.0)
            .expect("timeout");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(service.count("VerificationService.setTimeout"), 0);
    }
}
