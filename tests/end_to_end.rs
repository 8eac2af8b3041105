//! End-to-end scenarios over direct and relay transports.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use omid_bridge::discovery::{PRESENCE_FRAME_NAME, default_presence_probe};
use omid_bridge::protocol::RESPONSE_METHOD;
use omid_bridge::{
    AdEvents, AdSession, Arg, ContextId, CrossOriginReads, DirectTransport, Endpoint, Error,
    Export, ExportedHandler, FacadeKind, FrameTree, Host, MediaEvents, Message, PROTOCOL_VERSION,
    Partner, Payload, PresenceProbe, RelayTransport, SERVICE_WINDOW_KEY_PATH,
    SESSION_SERVICE_KEY_PATH, SessionContext, SessionState, Transport, VERIFICATION_SERVICE_KEY_PATH,
    VerificationClient, listen_for_service_context, locate,
};

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context() -> SessionContext {
    SessionContext::new(Partner::new("Partner", "1.0.0").expect("partner"))
}

fn reply(request: &Message, args: Vec<Arg>) -> Message {
    Message::new(
        request.id.clone(),
        RESPONSE_METHOD,
        PROTOCOL_VERSION,
        Payload::Structured(args),
    )
}

/// Direct service recording inbound messages.
struct DirectService {
    transport: Arc<DirectTransport>,
    inbox: Arc<Mutex<Vec<(Message, Endpoint)>>>,
}

impl DirectService {
    fn new() -> Self {
        let transport = Arc::new(DirectTransport::new());
        let inbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inbox);
        transport.set_on_message(Arc::new(move |message: Message, from: Endpoint| {
            sink.lock().push((message, from));
        }));
        Self { transport, inbox }
    }

    fn connect(&self) -> Box<dyn Transport> {
        Box::new(DirectTransport::connect(self.transport.exported_handler()))
    }

    fn request(&self, method: &str) -> (Message, Endpoint) {
        self.inbox
            .lock()
            .iter()
            .find(|(message, _)| message.method == method)
            .cloned()
            .expect("request received")
    }

    fn answer(&self, method: &str, args: Vec<Arg>) {
        let (request, from) = self.request(method);
        self.transport
            .send(reply(&request, args), Some(&from))
            .expect("reply");
    }

    fn count(&self, method: &str) -> usize {
        self.inbox
            .lock()
            .iter()
            .filter(|(message, _)| message.method == method)
            .count()
    }
}

async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// Direct Transport
// ============================================================================

#[test]
fn test_direct_pair_exchanges_request_and_reply() {
    init_tracing();
    let a = Arc::new(DirectTransport::new());
    let b = Arc::new(DirectTransport::new());
    a.set_peer(b.exported_handler());
    b.set_peer(a.exported_handler());

    let seen_by_a = Arc::new(Mutex::new(Vec::new()));
    let seen_by_b = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen_by_a);
    a.set_on_message(Arc::new(move |message: Message, _| sink.lock().push(message)));

    let sink = Arc::clone(&seen_by_b);
    let responder = Arc::downgrade(&b);
    b.set_on_message(Arc::new(move |message: Message, from: Endpoint| {
        sink.lock().push(message.clone());
        if let Some(b) = responder.upgrade() {
            let answer = Message::new(
                message.id,
                "method2",
                PROTOCOL_VERSION,
                Payload::Structured(vec![Arg::from(json!(321))]),
            );
            b.send(answer, Some(&from)).expect("reply");
        }
    }));

    let request = Message::new(
        "guid1",
        "method1",
        PROTOCOL_VERSION,
        Payload::Structured(vec![Arg::from(json!(123))]),
    );
    a.send(request.clone(), None).expect("send");

    assert_eq!(*seen_by_b.lock(), vec![request]);
    let seen = seen_by_a.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "method2");
    assert_eq!(seen[0].id.as_str(), "guid1");
    assert_eq!(seen[0].args, Payload::Structured(vec![Arg::from(json!(321))]));
}

#[test]
fn test_send_request_fires_exactly_once() {
    init_tracing();
    let service = DirectService::new();
    let session = AdSession::builder()
        .context(context())
        .transport(service.connect())
        .build()
        .expect("session");

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    session
        .send_request("op", vec![Arg::from("x")], move |args| sink.lock().push(args))
        .expect("send");

    let (request, from) = service.request("SessionService.op");
    for value in [321, 999] {
        service
            .transport
            .send(reply(&request, vec![Arg::from(json!(value))]), Some(&from))
            .expect("reply");
    }

    assert_eq!(*calls.lock(), vec![vec![Arg::from(json!(321))]]);
}

#[test]
fn test_facade_kind_registers_once() {
    let service = DirectService::new();
    let session = AdSession::builder()
        .context(context())
        .transport(service.connect())
        .build()
        .expect("session");

    let first = AdEvents::new(&session);
    let second = AdEvents::new(&session);

    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::AlreadyRegistered { kind: FacadeKind::AdEvents })));
    assert_eq!(service.count("SessionService.registerAdEvents"), 1);
}

#[test]
fn test_unsupported_session_is_inert() {
    let session = AdSession::builder()
        .context(context())
        .without_service()
        .build()
        .expect("session");

    assert!(!session.is_supported());
    assert!(session.send_one_way("impressionOccurred", vec![]).is_ok());
    assert!(session.send_request("getVersion", vec![], |_| {}).is_ok());
    assert_eq!(session.pending_count(), 0);
    assert!(MediaEvents::new(&session).is_ok());
}

#[test]
fn test_lifecycle_gates_running_operations() {
    let service = DirectService::new();
    let session = AdSession::builder()
        .context(context())
        .transport(service.connect())
        .build()
        .expect("session");
    let ad_events = AdEvents::new(&session).expect("ad events");

    service.answer("SessionService.getVersion", vec![Arg::from(PROTOCOL_VERSION)]);
    assert!(session.assert_running().is_err());

    service.answer(
        "SessionService.registerSessionObserver",
        vec![Arg::from(json!({"type": "sessionStart"}))],
    );
    assert!(session.assert_running().is_ok());
    ad_events.impression_occurred().expect("impression");

    service.answer(
        "SessionService.registerSessionObserver",
        vec![Arg::from(json!({"type": "sessionFinish"}))],
    );
    assert_eq!(session.state(), SessionState::Finished);
    assert!(matches!(session.assert_running(), Err(Error::SessionNotRunning)));
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_locate_prefers_same_boundary_export() {
    let tree = FrameTree::new();
    let own = tree.add_root("https://publisher.example");
    let foreign = tree.add_frame(own, "https://other.example");
    let sibling = tree.add_frame(own, "https://publisher.example");

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    tree.export(
        sibling,
        SESSION_SERVICE_KEY_PATH,
        Export::Handler(ExportedHandler::new(move |message, _| sink.lock().push(message.method))),
    );

    let probed = Arc::new(Mutex::new(Vec::<ContextId>::new()));
    let log = Arc::clone(&probed);
    let probe: PresenceProbe = Arc::new(move |_host: &dyn Host, peer: ContextId| {
        log.lock().push(peer);
        false
    });

    let host: Arc<dyn Host> = Arc::new(tree.view(own));
    let transport = locate(&host, own, &[foreign, sibling], SESSION_SERVICE_KEY_PATH, &probe)
        .expect("transport");

    assert!(transport.is_direct());
    assert_eq!(*probed.lock(), vec![foreign]);

    transport
        .send(Message::new("guid1", "SessionService.ping", PROTOCOL_VERSION, Payload::Absent), None)
        .expect("send");
    assert_eq!(*delivered.lock(), vec!["SessionService.ping".to_string()]);
}

#[test]
fn test_silent_cross_origin_reads_count_as_boundary() {
    let tree = FrameTree::with_options(CrossOriginReads::SilentUndefined, None);
    let own = tree.add_root("https://publisher.example");
    let foreign = tree.add_frame(own, "https://other.example");

    assert!(omid_bridge::is_cross_boundary(tree.as_ref(), own, foreign));
    assert!(!omid_bridge::is_cross_boundary(tree.as_ref(), own, own));
}

// ============================================================================
// Relay Transport
// ============================================================================

/// Relay service in `context` forwarding inbound messages to a channel.
fn relay_service(
    host: &Arc<dyn Host>,
    context: ContextId,
) -> (Arc<RelayTransport>, mpsc::UnboundedReceiver<(Message, Endpoint)>) {
    let service = Arc::new(RelayTransport::new(Arc::clone(host), context, None).expect("relay"));
    let (tx, rx) = mpsc::unbounded_channel();
    service.set_on_message(Arc::new(move |message: Message, from: Endpoint| {
        let _ = tx.send((message, from));
    }));
    (service, rx)
}

async fn next_request(
    inbox: &mut mpsc::UnboundedReceiver<(Message, Endpoint)>,
    method: &str,
) -> (Message, Endpoint) {
    loop {
        let (message, from) = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
            .await
            .expect("request in time")
            .expect("service alive");
        if message.method == method {
            return (message, from);
        }
    }
}

#[tokio::test]
async fn test_session_over_relay() {
    init_tracing();
    let tree = FrameTree::new();
    let top = tree.add_root("https://publisher.example");
    tree.add_named_frame(top, "https://publisher.example", PRESENCE_FRAME_NAME);
    let creative = tree.add_frame(top, "https://creative.example");

    let service_host: Arc<dyn Host> = Arc::new(tree.view(top));
    let (service, mut inbox) = relay_service(&service_host, top);

    let session = AdSession::builder()
        .context(context().with_video_element(omid_bridge::ElementHandle::new("video")))
        .host(Arc::new(tree.view(creative)))
        .build()
        .expect("session");
    assert!(session.is_supported());
    assert!(!session.is_direct());

    let (info, _) = next_request(&mut inbox, "SessionService.setClientInfo").await;
    assert_eq!(
        info.args,
        Payload::Structured(vec![
            Arg::from(PROTOCOL_VERSION),
            Arg::from("Partner"),
            Arg::from("1.0.0"),
        ])
    );

    let (version, from) = next_request(&mut inbox, "SessionService.getVersion").await;
    assert_eq!(from, Endpoint::Context(creative));
    service
        .send(reply(&version, vec![Arg::from("1.4.0")]), Some(&from))
        .expect("reply");

    // The video element cannot cross the boundary.
    let (report, _) = next_request(&mut inbox, "SessionService.sessionError").await;
    assert_eq!(
        report.args,
        Payload::Structured(vec![
            Arg::from("generic"),
            Arg::from("Session Client setVideoElement called when communication is cross-origin"),
        ])
    );

    let (observer, from) = next_request(&mut inbox, "SessionService.registerSessionObserver").await;
    service
        .send(
            reply(&observer, vec![Arg::from(json!({"type": "sessionStart"}))]),
            Some(&from),
        )
        .expect("reply");

    let watched = session.clone();
    eventually(move || watched.assert_running().is_ok()).await;
    assert_eq!(session.negotiated_version().as_deref(), Some("1.4.0"));

    let (echo, reply_to) = {
        let session = session.clone();
        let pending = tokio::spawn(async move {
            session
                .request("ping", vec![Arg::from(7u64)], Some(Duration::from_secs(1)))
                .await
        });
        let request = next_request(&mut inbox, "SessionService.ping").await;
        (pending, request)
    };
    service
        .send(reply(&reply_to.0, vec![Arg::from(8u64)]), Some(&reply_to.1))
        .expect("reply");
    assert_eq!(echo.await.expect("join").expect("reply"), vec![Arg::from(8u64)]);
}

#[test]
fn test_relay_session_without_runtime_is_inert() {
    init_tracing();
    let tree = FrameTree::with_options(CrossOriginReads::SilentUndefined, None);
    let top = tree.add_root("https://publisher.example");
    tree.add_named_frame(top, "https://publisher.example", PRESENCE_FRAME_NAME);
    let creative = tree.add_frame(top, "https://creative.example");

    let session = AdSession::builder()
        .context(context())
        .host(Arc::new(tree.view(creative)))
        .build()
        .expect("session");
    assert!(!session.is_supported());
    assert!(session.error(omid_bridge::ErrorType::Generic, "ignored").is_ok());
}

#[tokio::test]
async fn test_relay_ignores_foreign_traffic() {
    let tree = FrameTree::new();
    let top = tree.add_root("https://publisher.example");
    let creative = tree.add_frame(top, "https://creative.example");
    let host: Arc<dyn Host> = Arc::new(tree.view(creative));

    let client = RelayTransport::new(Arc::clone(&host), creative, Some(top)).expect("relay");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.set_on_message(Arc::new(move |message: Message, _| sink.lock().push(message.method)));

    for data in [
        "hello".to_string(),
        "omid://not json".to_string(),
        r#"omid://{"omid_message_guid":"a","omid_message_method":"response"}"#.to_string(),
        r#"{"omid_message_guid":"a","omid_message_method":"response","omid_message_version":"1.4.0"}"#
            .to_string(),
    ] {
        host.post_message(creative, data, top);
    }
    host.post_message(
        creative,
        r#"omid://{"omid_message_guid":"b","omid_message_method":"response","omid_message_version":"1.4.0"}"#
            .to_string(),
        top,
    );

    let observed = Arc::clone(&seen);
    eventually(move || !observed.lock().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*seen.lock(), vec!["response".to_string()]);
}

// ============================================================================
// Verification Client
// ============================================================================

#[test]
fn test_verification_client_prefers_announced_context() {
    let tree = FrameTree::new();
    let top = tree.add_root("https://publisher.example");
    let service_frame = tree.add_frame(top, "https://publisher.example");
    let script = tree.add_frame(top, "https://publisher.example");

    let received = Arc::new(Mutex::new(Vec::new()));
    for (ctx, label) in [(top, "top"), (service_frame, "service")] {
        let sink = Arc::clone(&received);
        tree.export(
            ctx,
            VERIFICATION_SERVICE_KEY_PATH,
            Export::Handler(ExportedHandler::new(move |message, _| {
                sink.lock().push((label, message.method));
            })),
        );
    }
    tree.export(script, SERVICE_WINDOW_KEY_PATH, Export::Context(service_frame));

    let client = VerificationClient::builder()
        .host(Arc::new(tree.view(script)))
        .presence_probe(default_presence_probe())
        .build();
    assert!(client.is_supported());

    client
        .add_event_listener("impression", |_| {})
        .expect("listener");
    assert_eq!(
        *received.lock(),
        vec![("service", "VerificationService.addEventListener".to_string())]
    );
}

#[tokio::test]
async fn test_service_context_announcement() {
    let tree = FrameTree::new();
    let top = tree.add_root("https://publisher.example");
    let service_frame = tree.add_frame(top, "https://omsdk.example");
    let host: Arc<dyn Host> = Arc::new(tree.view(top));

    let announced = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&announced);
    let listener =
        listen_for_service_context(&host, move |ctx| sink.lock().push(ctx)).expect("listener");

    let identify = Message::new(
        "guid1",
        omid_bridge::protocol::IDENTIFY_SERVICE_WINDOW_METHOD,
        PROTOCOL_VERSION,
        Payload::Absent,
    );
    host.post_message(top, "unrelated".to_string(), service_frame);
    host.post_message(top, identify.to_tagged().expect("tagged"), service_frame);

    let observed = Arc::clone(&announced);
    eventually(move || !observed.lock().is_empty()).await;
    assert_eq!(*announced.lock(), vec![service_frame]);
    listener.abort();
}
