//! TCP listener for the command socket.

use crate::alerts::AlertMatcher;
use crate::audio::codec::AudioCodec;
use crate::error::{Result, ScribedError};
use crate::server::connection::ConnectionHandler;
use crate::streaming::service::TranscriptionService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Everything a connection needs to serve commands.
pub struct ServerContext {
    pub service: Arc<TranscriptionService>,
    pub codec: Arc<dyn AudioCodec>,
    pub alerts: Arc<dyn AlertMatcher>,
}

/// Handle for requesting listener shutdown from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Asks the accept loop to stop after its current iteration.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Accepting socket for client connections.
pub struct SocketServer {
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl SocketServer {
    /// Binds the command socket.
    ///
    /// Failure here is fatal to startup; there is no point running
    /// without a listener.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            ScribedError::SocketBind {
                message: format!("{}:{}: {}", host, port, e),
            }
        })?;

        Ok(Self {
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (relevant when the port was 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for stopping the accept loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Accepts connections until shutdown, one handler task per client.
    pub async fn serve(self, ctx: Arc<ServerContext>) -> Result<()> {
        info!(addr = %self.local_addr()?, "command socket listening");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            // Bounded accept wait so the shutdown flag is observed.
            let accepted =
                tokio::time::timeout(Duration::from_millis(100), self.listener.accept()).await;

            match accepted {
                Ok(Ok((stream, peer))) => {
                    debug!(%peer, "client connected");
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        ConnectionHandler::new(ctx, peer).run(stream).await;
                    });
                }
                Ok(Err(e)) => {
                    warn!("failed to accept connection: {}", e);
                }
                Err(_) => {
                    // Timeout; loop around and re-check the flag.
                }
            }
        }

        info!("command socket closed");
        Ok(())
    }
}
