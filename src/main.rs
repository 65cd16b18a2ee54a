use anyhow::Result;
use clap::Parser;
use scribed::asr::{AsrEngine, WhisperEngine};
use scribed::cli::Cli;
use scribed::config::Config;
use scribed::instance::InstanceLock;
use scribed::preserve::{DirPreservation, NullPreservation, PreservationSink};
use scribed::server::{ServerContext, SocketServer};
use scribed::streaming::processor::ChunkProcessor;
use scribed::streaming::registry::StreamRegistry;
use scribed::streaming::service::TranscriptionService;
use scribed::streaming::worker::ProcessingLoop;
use scribed::{LexicalMatcher, WavCodec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let config = cli.apply_to(config.with_env_overrides());

    // One daemon per machine; taken before the port so the loser of a
    // race exits with a clear message instead of a bind error.
    let _lock = InstanceLock::acquire(&config.lock_file())?;

    let engine: Arc<dyn AsrEngine> = Arc::new(WhisperEngine::new(config.whisper_config())?);
    info!(model = engine.model_name(), "transcription engine loaded");

    let preservation: Arc<dyn PreservationSink> = if config.preservation.enabled {
        let dir = config
            .preservation
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("preserved"));
        Arc::new(DirPreservation::new(dir)?)
    } else {
        Arc::new(NullPreservation)
    };

    let registry = Arc::new(StreamRegistry::with_configs(
        config.buffer_config(),
        config.accumulator_config(),
    ));
    let processor = Arc::new(ChunkProcessor::new(
        engine,
        config.quality_gate(),
        preservation,
        config.processor_config(),
    ));
    let service = Arc::new(TranscriptionService::new(
        Arc::clone(&registry),
        Arc::clone(&processor),
    ));

    let worker = ProcessingLoop::new(registry, processor, config.poll_interval()).spawn();

    let server = SocketServer::bind(&config.server.host, config.server.port).await?;
    let shutdown = server.shutdown_handle();

    let ctx = Arc::new(ServerContext {
        service,
        codec: Arc::new(WavCodec::new()),
        alerts: Arc::new(LexicalMatcher::new()),
    });

    // Supervisor handshake: the parent process waits for this line.
    println!("READY");

    let mut serve_task = tokio::spawn(server.serve(ctx));

    tokio::select! {
        result = &mut serve_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            shutdown.shutdown();
            serve_task.await??;
        }
    }

    // The worker touches stream buffers; join it before they drop.
    worker.join().await;
    info!("scribed stopped");

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::load_or_default(Path::new("scribed.toml"))?),
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "scribed=info",
        1 => "scribed=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
