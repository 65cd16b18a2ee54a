//! Per-connection command loop.
//!
//! Each client connection runs one handler: it reads JSON command lines,
//! answers each with exactly one reply line, and pushes sentence updates
//! for the streams this connection started. On disconnect every stream
//! the connection owns is stopped and drained, so a dropped client never
//! leaks a buffer.

use crate::error::ScribedError;
use crate::server::listener::ServerContext;
use crate::server::protocol::{Request, Response};
use crate::streaming::types::StreamType;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Protocol loop for one client.
pub struct ConnectionHandler {
    ctx: Arc<ServerContext>,
    peer: SocketAddr,
    /// Streams started over this connection. Updates are routed to their
    /// owner, and whatever is still registered at disconnect gets
    /// stopped and drained.
    owned_streams: HashSet<String>,
}

impl ConnectionHandler {
    pub fn new(ctx: Arc<ServerContext>, peer: SocketAddr) -> Self {
        Self {
            ctx,
            peer,
            owned_streams: HashSet::new(),
        }
    }

    /// Serves the connection until the client goes away.
    pub async fn run(mut self, stream: TcpStream) {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let mut updates = self.ctx.service.subscribe();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            let response = self.handle_line(line).await;
                            if write_line(&mut writer, &response).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(peer = %self.peer, "read failed: {}", e);
                            break;
                        }
                    }
                }
                update = updates.recv() => {
                    match update {
                        Ok(update) if self.owned_streams.contains(&update.stream_id) => {
                            if write_line(&mut writer, &Response::update(update)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {
                            // Another connection's stream.
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(peer = %self.peer, missed, "connection lagged behind updates");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        self.cleanup().await;
        debug!(peer = %self.peer, "client disconnected");
    }

    /// Parses and dispatches one command line.
    async fn handle_line(&mut self, line: &str) -> Response {
        let request = match Request::from_json(line) {
            Ok(request) => request,
            Err(e) => {
                let error = ScribedError::Protocol {
                    message: format!("invalid command: {}", e),
                };
                return Response::error(error.to_string());
            }
        };
        self.dispatch(request).await
    }

    async fn dispatch(&mut self, request: Request) -> Response {
        match request {
            Request::StartStream {
                stream_id,
                stream_type,
            } => self.start_stream(stream_id, stream_type),
            Request::StopStream { stream_id } => self.stop_stream(stream_id).await,
            Request::StreamChunk {
                stream_id,
                audio_data,
            } => self.stream_chunk(stream_id, &audio_data),
            Request::DualStreamChunk {
                audio_path,
                stream_type,
            } => self.dual_stream_chunk(&audio_path, stream_type).await,
            Request::CheckAlerts {
                transcript,
                keywords,
            } => Response::Alerts {
                success: true,
                matches: self.ctx.alerts.match_keywords(&transcript, &keywords),
            },
        }
    }

    fn start_stream(&mut self, stream_id: String, stream_type: StreamType) -> Response {
        match self.ctx.service.start_stream(&stream_id, stream_type) {
            Ok(()) => {
                self.owned_streams.insert(stream_id.clone());
                Response::ok_stream(stream_id)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn stop_stream(&mut self, stream_id: String) -> Response {
        // Ownership is kept after an explicit stop: the drain's updates
        // are still queued on the broadcast receiver and must be
        // delivered to this connection once the reply is written.
        match self.ctx.service.stop_stream(&stream_id).await {
            Ok(_) => Response::ok_stream(stream_id),
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn stream_chunk(&self, stream_id: String, audio_data: &str) -> Response {
        let bytes = match BASE64.decode(audio_data) {
            Ok(bytes) => bytes,
            Err(e) => return Response::error(format!("invalid base64 audio data: {}", e)),
        };

        match self.ctx.service.add_chunk(&stream_id, &bytes) {
            Ok(_) => Response::ok(),
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn dual_stream_chunk(&self, audio_path: &str, stream_type: StreamType) -> Response {
        let result = self
            .ctx
            .service
            .processor()
            .transcribe_file(self.ctx.codec.as_ref(), Path::new(audio_path), stream_type)
            .await;

        match result {
            Ok(result) => Response::Transcript {
                success: true,
                text: result.text,
                language: result.language,
                language_probability: result.language_probability,
                duration: result.duration_s,
            },
            Err(e) => Response::error(e.to_string()),
        }
    }

    /// Stops every stream this connection started.
    async fn cleanup(&mut self) {
        for stream_id in std::mem::take(&mut self.owned_streams) {
            match self.ctx.service.stop_stream(&stream_id).await {
                Ok(_) => debug!(stream_id = %stream_id, "stopped orphaned stream"),
                // Already stopped through another path; nothing leaked.
                Err(ScribedError::StreamNotFound { .. }) => {}
                Err(e) => warn!(stream_id = %stream_id, "failed to stop orphaned stream: {}", e),
            }
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
    let json = match response.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to serialize response: {}", e);
            return Ok(());
        }
    };
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
