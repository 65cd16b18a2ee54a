//! Command-line interface for scribed
//!
//! Provides argument parsing using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Streaming dual-channel transcription service
#[derive(Parser, Debug)]
#[command(name = "scribed", version, about = "Streaming dual-channel transcription service")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Path to the Whisper ggml model file
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Language code for transcription (e.g., en, de) or "auto"
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Preserve rejected chunks into this directory
    #[arg(long, value_name = "DIR")]
    pub preserve_dir: Option<PathBuf>,

    /// Instance lock file path
    #[arg(long, value_name = "PATH")]
    pub lock_file: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Folds CLI flags into a loaded configuration.
    pub fn apply_to(&self, mut config: crate::config::Config) -> crate::config::Config {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(model) = &self.model {
            config.asr.model_path = model.clone();
        }
        if let Some(language) = &self.language {
            config.asr.language = language.clone();
        }
        if let Some(dir) = &self.preserve_dir {
            config.preservation.enabled = true;
            config.preservation.directory = Some(dir.clone());
        }
        if let Some(lock) = &self.lock_file {
            config.server.lock_file = Some(lock.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_no_args_parses() {
        let cli = Cli::parse_from(["scribed"]);
        assert!(cli.config.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "scribed",
            "--port",
            "9100",
            "--language",
            "de",
            "--preserve-dir",
            "/tmp/preserved",
        ]);

        let config = cli.apply_to(Config::default());
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.asr.language, "de");
        assert!(config.preservation.enabled);
        assert_eq!(
            config.preservation.directory.as_deref(),
            Some(std::path::Path::new("/tmp/preserved"))
        );
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["scribed", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
