//! End-to-end tests driving the daemon over a real TCP connection.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use scribed::alerts::LexicalMatcher;
use scribed::asr::MockAsrEngine;
use scribed::audio::analysis::encode_f32_pcm;
use scribed::audio::codec::WavCodec;
use scribed::preserve::NullPreservation;
use scribed::server::{ServerContext, ShutdownHandle, SocketServer};
use scribed::streaming::gate::QualityGate;
use scribed::streaming::processor::{ChunkProcessor, ProcessorConfig};
use scribed::streaming::registry::StreamRegistry;
use scribed::streaming::service::TranscriptionService;
use scribed::streaming::types::TranscriptSegment;
use scribed::streaming::worker::{ProcessingLoop, ProcessingLoopHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::timeout;

struct TestServer {
    addr: SocketAddr,
    engine: Arc<MockAsrEngine>,
    service: Arc<TranscriptionService>,
    worker: Option<ProcessingLoopHandle>,
    shutdown: ShutdownHandle,
}

impl TestServer {
    async fn start(engine: MockAsrEngine) -> Self {
        let engine = Arc::new(engine);
        let registry = Arc::new(StreamRegistry::new());
        let processor = Arc::new(ChunkProcessor::new(
            Arc::clone(&engine) as Arc<dyn scribed::AsrEngine>,
            QualityGate::new(),
            Arc::new(NullPreservation),
            ProcessorConfig::default(),
        ));
        let service = Arc::new(TranscriptionService::new(
            Arc::clone(&registry),
            Arc::clone(&processor),
        ));

        let worker =
            ProcessingLoop::new(registry, processor, Duration::from_millis(10)).spawn();

        let server = SocketServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();

        let ctx = Arc::new(ServerContext {
            service: Arc::clone(&service),
            codec: Arc::new(WavCodec::new()),
            alerts: Arc::new(LexicalMatcher::new()),
        });
        tokio::spawn(server.serve(ctx));

        Self {
            addr,
            engine,
            service,
            worker: Some(worker),
            shutdown,
        }
    }

    async fn stop(mut self) {
        self.shutdown.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join().await;
        }
    }
}

struct Client {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, payload: serde_json::Value) {
        let mut line = payload.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next_json(&mut self) -> serde_json::Value {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a reply line")
            .unwrap()
            .expect("connection closed unexpectedly");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, payload: serde_json::Value) -> serde_json::Value {
        self.send(payload).await;
        self.next_json().await
    }

    /// Reads lines until one with the given `type` arrives.
    async fn next_of_type(&mut self, record_type: &str) -> serde_json::Value {
        for _ in 0..10 {
            let record = self.next_json().await;
            if record["type"] == record_type {
                return record;
            }
        }
        panic!("no {} record arrived", record_type);
    }
}

fn chunk_request(stream_id: &str, samples: &[f32]) -> serde_json::Value {
    serde_json::json!({
        "type": "stream_chunk",
        "stream_id": stream_id,
        "audio_data": BASE64.encode(encode_f32_pcm(samples)),
    })
}

#[tokio::test]
async fn end_to_end_sentence_after_leading_silence() {
    // Engine output for the one (forced) chunk: speech begins twenty
    // seconds into the audio.
    let server = TestServer::start(MockAsrEngine::with_segments(vec![
        TranscriptSegment::new("Hello", 20.0, 21.0),
        TranscriptSegment::new("world.", 21.0, 22.0),
    ]))
    .await;
    let mut client = Client::connect(server.addr).await;

    let reply = client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "s1",
            "stream_type": "microphone",
        }))
        .await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["stream_id"], "s1");

    // 20s of near-zero audio followed by 2s of speech-level audio, fed
    // one second at a time. Well under a full chunk, so nothing is
    // extracted until the stop-drain.
    for _ in 0..20 {
        let reply = client.request(chunk_request("s1", &vec![0.001f32; 16000])).await;
        assert_eq!(reply["success"], true);
    }
    for _ in 0..2 {
        let reply = client.request(chunk_request("s1", &vec![0.8f32; 16000])).await;
        assert_eq!(reply["success"], true);
    }

    let reply = client
        .request(serde_json::json!({"type": "stop_stream", "stream_id": "s1"}))
        .await;
    assert_eq!(reply["success"], true);

    let update = client.next_of_type("transcript_update").await;
    assert_eq!(update["stream_id"], "s1");
    assert_eq!(update["text"], "Hello world.");
    assert_eq!(update["stream_type"], "microphone");
    let start = update["start_time"].as_f64().unwrap();
    let end = update["end_time"].as_f64().unwrap();
    assert!((start - 20.0).abs() < 0.1, "start was {}", start);
    assert!((end - 22.0).abs() < 0.1, "end was {}", end);

    assert_eq!(server.engine.call_count(), 1);
    server.stop().await;
}

#[tokio::test]
async fn silent_stream_never_reaches_engine() {
    let server = TestServer::start(MockAsrEngine::with_segments(vec![
        TranscriptSegment::new("ghost text.", 0.0, 2.0),
    ]))
    .await;
    let mut client = Client::connect(server.addr).await;

    client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "quiet",
            "stream_type": "system",
        }))
        .await;

    // 5s of near-silence: rejected at the gate on the stop-drain.
    let reply = client
        .request(chunk_request("quiet", &vec![0.005f32; 80000]))
        .await;
    assert_eq!(reply["success"], true);

    let reply = client
        .request(serde_json::json!({"type": "stop_stream", "stream_id": "quiet"}))
        .await;
    assert_eq!(reply["success"], true);

    // No update follows the ack; the line stays quiet.
    let extra = timeout(Duration::from_millis(300), client.lines.next_line()).await;
    assert!(extra.is_err(), "unexpected record after silent stream stop");

    assert_eq!(server.engine.call_count(), 0);
    server.stop().await;
}

#[tokio::test]
async fn duplicate_start_and_unknown_stop_report_errors() {
    let server = TestServer::start(MockAsrEngine::new()).await;
    let mut client = Client::connect(server.addr).await;

    let start = serde_json::json!({
        "type": "start_stream",
        "stream_id": "dup",
        "stream_type": "microphone",
    });
    assert_eq!(client.request(start.clone()).await["success"], true);

    let reply = client.request(start).await;
    assert_eq!(reply["success"], false);
    assert!(
        reply["error"].as_str().unwrap().contains("already exists"),
        "got: {}",
        reply["error"]
    );

    let reply = client
        .request(serde_json::json!({"type": "stop_stream", "stream_id": "nobody"}))
        .await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"].as_str().unwrap().contains("not found"));

    server.stop().await;
}

#[tokio::test]
async fn malformed_input_keeps_connection_open() {
    let server = TestServer::start(MockAsrEngine::new()).await;
    let mut client = Client::connect(server.addr).await;

    client.writer.write_all(b"this is not json\n").await.unwrap();
    let reply = client.next_json().await;
    assert_eq!(reply["success"], false);

    let reply = client
        .request(serde_json::json!({"type": "make_coffee"}))
        .await;
    assert_eq!(reply["success"], false);

    // Same connection still serves valid commands.
    let reply = client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "after_garbage",
            "stream_type": "system",
        }))
        .await;
    assert_eq!(reply["success"], true);

    server.stop().await;
}

#[tokio::test]
async fn bad_base64_and_unknown_stream_chunks_fail_cleanly() {
    let server = TestServer::start(MockAsrEngine::new()).await;
    let mut client = Client::connect(server.addr).await;

    let reply = client
        .request(serde_json::json!({
            "type": "stream_chunk",
            "stream_id": "nobody",
            "audio_data": "AAAAAA==",
        }))
        .await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"].as_str().unwrap().contains("not found"));

    client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "s1",
            "stream_type": "microphone",
        }))
        .await;

    let reply = client
        .request(serde_json::json!({
            "type": "stream_chunk",
            "stream_id": "s1",
            "audio_data": "!!!not-base64!!!",
        }))
        .await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"].as_str().unwrap().contains("base64"));

    server.stop().await;
}

#[tokio::test]
async fn disconnect_stops_owned_streams() {
    let server = TestServer::start(MockAsrEngine::new()).await;

    {
        let mut client = Client::connect(server.addr).await;
        let reply = client
            .request(serde_json::json!({
                "type": "start_stream",
                "stream_id": "orphan",
                "stream_type": "microphone",
            }))
            .await;
        assert_eq!(reply["success"], true);
        assert_eq!(server.service.registry().len(), 1);
        // Connection dropped here without stop_stream.
    }

    // The handler notices the disconnect and cleans up.
    for _ in 0..50 {
        if server.service.registry().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server.service.registry().is_empty());

    // The identifier is free again for a new client.
    let mut client = Client::connect(server.addr).await;
    let reply = client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "orphan",
            "stream_type": "microphone",
        }))
        .await;
    assert_eq!(reply["success"], true);

    server.stop().await;
}

#[tokio::test]
async fn check_alerts_round_trip() {
    let server = TestServer::start(MockAsrEngine::new()).await;
    let mut client = Client::connect(server.addr).await;

    let reply = client
        .request(serde_json::json!({
            "type": "check_alerts",
            "transcript": "We need to revisit the quarterly budget before Friday.",
            "keywords": [
                {"keyword": "quarterly budget", "threshold": 0.7, "enabled": true},
                {"keyword": "vacation", "threshold": 0.7, "enabled": true},
            ],
        }))
        .await;

    assert_eq!(reply["success"], true);
    let matches = reply["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["keyword"], "quarterly budget");
    assert_eq!(matches[0]["similarity"], 1.0);

    server.stop().await;
}

#[tokio::test]
async fn live_updates_pushed_while_streaming() {
    // Small chunks via the worker path: the polling loop extracts and
    // transcribes while the stream is still live.
    let engine = MockAsrEngine::with_segments(vec![TranscriptSegment::new(
        "Streamed sentence.",
        0.0,
        2.0,
    )]);

    // Registry with a 2s chunk so one stream_chunk fills a whole chunk.
    let engine = Arc::new(engine);
    let registry = Arc::new(StreamRegistry::with_configs(
        scribed::streaming::buffer::BufferConfig {
            sample_rate: 16000,
            chunk_duration_s: 2.0,
            min_chunk_duration_s: 0.5,
            overlap_duration_s: 0.2,
        },
        Default::default(),
    ));
    let processor = Arc::new(ChunkProcessor::new(
        Arc::clone(&engine) as Arc<dyn scribed::AsrEngine>,
        QualityGate::new(),
        Arc::new(NullPreservation),
        ProcessorConfig::default(),
    ));
    let service = Arc::new(TranscriptionService::new(
        Arc::clone(&registry),
        Arc::clone(&processor),
    ));
    let worker = ProcessingLoop::new(registry, processor, Duration::from_millis(10)).spawn();

    let server = SocketServer::bind("127.0.0.1", 0).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let ctx = Arc::new(ServerContext {
        service,
        codec: Arc::new(WavCodec::new()),
        alerts: Arc::new(LexicalMatcher::new()),
    });
    tokio::spawn(server.serve(ctx));

    let mut client = Client::connect(addr).await;
    client
        .request(serde_json::json!({
            "type": "start_stream",
            "stream_id": "live",
            "stream_type": "microphone",
        }))
        .await;

    // A full 2s chunk of speech-level audio; the worker picks it up.
    let reply = client.request(chunk_request("live", &vec![0.8f32; 32000])).await;
    assert_eq!(reply["success"], true);

    let update = client.next_of_type("transcript_update").await;
    assert_eq!(update["text"], "Streamed sentence.");
    assert_eq!(update["stream_id"], "live");

    shutdown.shutdown();
    worker.join().await;
}
