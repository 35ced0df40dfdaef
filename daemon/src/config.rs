//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

/// Default Ollama endpoint on the local machine
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:11434";
/// Model used until a refresh reports the installed set
pub const DEFAULT_MODEL: &str = "gemma3:4b";
pub const DEFAULT_SOURCE_LANG: &str = "French";
pub const DEFAULT_TARGET_LANG: &str = "English";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
/// File name of the native key monitor binary
pub const MONITOR_BINARY_NAME: &str = "key-listener";

/// Fixed timing constants of the hotkey and typing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Two gestures must arrive strictly closer than this to fire
    pub double_tap_window: Duration,
    /// Quiet period after the last edit before a request is issued
    pub debounce: Duration,
    /// Delay before respawning a monitor that exited unexpectedly
    pub restart_delay: Duration,
    /// Pause between a fired gesture and the clipboard read
    pub settle_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            double_tap_window: Duration::from_millis(600),
            debounce: Duration::from_millis(500),
            restart_delay: Duration::from_millis(2000),
            settle_delay: Duration::from_millis(100),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Base URL of the translation service
    pub service_url: String,

    /// Model selected at startup
    pub model: String,

    pub source_lang: String,
    pub target_lang: String,

    /// Upper bound for a single translation call
    pub request_timeout: Duration,

    /// Explicit monitor binary, tried before the search path
    pub monitor_override: Option<PathBuf>,

    /// Packaged resource directory (`Contents/Resources` in an app bundle)
    pub resource_dir: PathBuf,

    pub timings: Timings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("deeplocal");

        let socket_path = data_dir.join("daemon.sock");

        let request_timeout_secs = match std::env::var("DEEPLOCAL_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse()?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let resource_dir = match std::env::var_os("DEEPLOCAL_RESOURCE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => exe_dir().join("..").join("Resources"),
        };

        Ok(Self {
            socket_path,
            data_dir,
            service_url: env_or("DEEPLOCAL_OLLAMA_HOST", DEFAULT_SERVICE_URL),
            model: env_or("DEEPLOCAL_MODEL", DEFAULT_MODEL),
            source_lang: env_or("DEEPLOCAL_SOURCE_LANG", DEFAULT_SOURCE_LANG),
            target_lang: env_or("DEEPLOCAL_TARGET_LANG", DEFAULT_TARGET_LANG),
            request_timeout: Duration::from_secs(request_timeout_secs),
            monitor_override: std::env::var_os("DEEPLOCAL_MONITOR_PATH").map(PathBuf::from),
            resource_dir,
            timings: Timings::default(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Candidate locations of the monitor binary, in search order.
    ///
    /// Packaged resources come first, then the development build output
    /// next to this crate, then a `resources/` directory beside the
    /// running executable.
    pub fn monitor_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(path) = &self.monitor_override {
            candidates.push(path.clone());
        }
        candidates.push(self.resource_dir.join(MONITOR_BINARY_NAME));
        candidates.push(dev_monitor_path());
        candidates.push(exe_dir().join("resources").join(MONITOR_BINARY_NAME));
        candidates
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Where `cargo build` places the monitor inside this workspace
fn dev_monitor_path() -> PathBuf {
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("target")
        .join(profile)
        .join(MONITOR_BINARY_NAME)
}
