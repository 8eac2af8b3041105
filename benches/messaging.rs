//! Messaging benchmark suite.
//!
//! Benchmarks the hot paths of a client at different payload sizes:
//! - Argument codec, legacy text and structured
//! - Request/response round trip through an `AdSession`, over a direct
//!   transport and over a relay in an in-process frame tree
//!
//! Run with: cargo bench --bench messaging
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

use omid_bridge::protocol::{RESPONSE_METHOD, decode, encode};
use omid_bridge::{
    AdSession, Arg, DirectTransport, Endpoint, FrameTree, Host, Message, PROTOCOL_VERSION,
    Partner, RelayTransport, SessionContext, Transport,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ARG_COUNTS: &[usize] = &[1, 8, 64];

const LEGACY_VERSION: &str = "1.0.0";

fn args(count: usize) -> Vec<Arg> {
    (0..count)
        .map(|i| Arg::from(json!({"index": i, "label": "quartile", "volume": 0.5})))
        .collect()
}

// ============================================================================
// Benchmark: Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &count in ARG_COUNTS {
        for version in [LEGACY_VERSION, PROTOCOL_VERSION] {
            let id = format!("{count}args_{version}");
            group.bench_with_input(BenchmarkId::new("round_trip", &id), &count, |b, &count| {
                b.iter(|| {
                    let payload = encode(version, args(count)).expect("encode");
                    black_box(decode(version, payload).expect("decode"))
                });
            });
        }
    }

    group.finish();
}

// ============================================================================
// Helpers
// ============================================================================

/// Answers every message with its own arguments.
fn echo(transport: &Arc<impl Transport + 'static>) {
    let responder = Arc::downgrade(transport);
    transport.set_on_message(Arc::new(move |message: Message, from: Endpoint| {
        if let Some(service) = responder.upgrade() {
            let reply = Message::new(message.id, RESPONSE_METHOD, PROTOCOL_VERSION, message.args);
            let _ = service.send(reply, Some(&from));
        }
    }));
}

fn session(transport: Box<dyn Transport>) -> AdSession {
    AdSession::builder()
        .context(SessionContext::new(Partner::new("Bench", "1.0.0").expect("partner")))
        .transport(transport)
        .build()
        .expect("session")
}

fn bench_round_trip(c: &mut Criterion, name: &str, rt: &Runtime, session: &AdSession) {
    let mut group = c.benchmark_group(name);
    for &count in ARG_COUNTS {
        group.bench_with_input(BenchmarkId::new("request", count), &count, |b, &count| {
            b.to_async(rt).iter(|| async {
                black_box(session.request("echo", args(count), None).await.expect("reply"))
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark: Direct Round Trip
// ============================================================================

fn bench_direct_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let service = Arc::new(DirectTransport::new());
    echo(&service);

    let session = session(Box::new(DirectTransport::connect(service.exported_handler())));
    bench_round_trip(c, "direct", &rt, &session);
}

// ============================================================================
// Benchmark: Relay Round Trip
// ============================================================================

fn bench_relay_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let _guard = rt.enter();

    let tree = FrameTree::new();
    let top = tree.add_root("https://publisher.example");
    let creative = tree.add_frame(top, "https://creative.example");
    let host: Arc<dyn Host> = Arc::new(tree.view(creative));

    let service = Arc::new(RelayTransport::new(Arc::clone(&host), top, None).expect("relay"));
    echo(&service);

    let session = session(Box::new(RelayTransport::new(host, creative, Some(top)).expect("relay")));
    bench_round_trip(c, "relay", &rt, &session);
}

criterion_group!(
    benches,
    bench_codec,
    bench_direct_round_trip,
    bench_relay_round_trip
);
criterion_main!(benches);
