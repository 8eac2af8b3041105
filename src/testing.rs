//! In-process service stub for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::protocol::{Arg, Message, PROTOCOL_VERSION, Payload, RESPONSE_METHOD};
use crate::transport::{DirectTransport, Endpoint, MessageHandler, Transport};

/// Records every inbound message and replies on demand.
pub(crate) struct FakeService {
    pub transport: DirectTransport,
    pub received: Arc<Mutex<Vec<(Message, Endpoint)>>>,
}

impl FakeService {
    pub fn new() -> Self {
        let transport = DirectTransport::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handler: MessageHandler = Arc::new(move |message, from| {
            sink.lock().push((message, from));
        });
        transport.set_on_message(handler);
        Self {
            transport,
            received,
        }
    }

    /// A client transport wired to this service.
    pub fn client_transport(&self) -> Box<dyn Transport> {
        Box::new(DirectTransport::connect(self.transport.exported_handler()))
    }

    pub fn methods(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|(message, _)| message.method.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.received
            .lock()
            .iter()
            .filter(|(message, _)| message.method == method)
            .count()
    }

    pub fn find(&self, method: &str) -> (Message, Endpoint) {
        self.received
            .lock()
            .iter()
            .find(|(message, _)| message.method == method)
            .cloned()
            .expect("message sent")
    }

    pub fn find_all(&self, method: &str) -> Vec<Message> {
        self.received
            .lock()
            .iter()
            .filter(|(message, _)| message.method == method)
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn find_last(&self, method: &str) -> (Message, Endpoint) {
        self.received
            .lock()
            .iter()
            .rev()
            .find(|(message, _)| message.method == method)
            .cloned()
            .expect("message sent")
    }

    /// Answers `request` with `args`.
    pub fn reply_to(&self, request: &Message, args: Vec<Arg>) {
        let from = self
            .received
            .lock()
            .iter()
            .find(|(message, _)| message.id == request.id)
            .map(|(_, from)| from.clone())
            .expect("request received");
        let message = Message::new(
            request.id.clone(),
            RESPONSE_METHOD,
            PROTOCOL_VERSION,
            Payload::Structured(args),
        );
        self.transport.send(message, Some(&from)).expect("reply");
    }

    /// Answers the first message with `method`.
    pub fn reply(&self, method: &str, args: Vec<Arg>) {
        let (request, _) = self.find(method);
        self.reply_to(&request, args);
    }

    /// Reports a lifecycle event to the session observer.
    pub fn lifecycle(&self, event_type: &str) {
        self.reply(
            "SessionService.registerSessionObserver",
            vec![Arg::from(json!({"type": event_type}))],
        );
    }

    /// Completes the handshake and starts the session.
    pub fn start_session(&self) {
        self.reply("SessionService.getVersion", vec![Arg::from(PROTOCOL_VERSION)]);
        self.lifecycle("sessionStart");
    }
}
