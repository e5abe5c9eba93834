use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::ExecutorSettings;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_QUEUE_SIZE: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Run local commands when a repository receives a push.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Settings {
    /// Address to listen at
    #[arg(long, env = "HOOK_LISTEN", default_value = DEFAULT_BIND_ADDRESS)]
    pub listen: SocketAddr,

    /// Job queue size (at least 1)
    #[arg(long, env = "HOOK_QSIZE", default_value_t = DEFAULT_QUEUE_SIZE)]
    pub qsize: usize,

    /// Path to the endpoint config (TOML, or YAML for .yaml/.yml)
    #[arg(long, env = "HOOK_CONFIG")]
    pub config: PathBuf,

    /// Path to TLS certificate (PEM)
    #[arg(long, env = "HOOK_CERT", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Path to TLS certificate key (PEM)
    #[arg(long, env = "HOOK_KEY", requires = "cert")]
    pub key: Option<PathBuf>,

    /// Timeout for a command run in seconds, 0 disables it
    #[arg(long, env = "HOOK_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Pass stdout/stderr from commands to stderr
    #[arg(long, env = "HOOK_VERBOSE")]
    pub verbose: bool,

    /// Directory for daily rotated log files
    #[arg(long, env = "HOOK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    pub fn queue_capacity(&self) -> usize {
        self.qsize.max(1)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Certificate and key, only when both are configured.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn executor(&self) -> ExecutorSettings {
        ExecutorSettings {
            timeout: self.command_timeout(),
            verbose: self.verbose,
        }
    }
}
