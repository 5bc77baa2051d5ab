//! Environment and service identity.
//!
//! Resolved once at startup. The service name is stamped process-wide so the
//! logging and metrics layers can label their output with it.

pub mod runtime;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use runtime::{RuntimeEnv, RUNTIME_ENV_VAR};

/// Environment variable overriding the project root.
pub const PROJECT_ROOT_VAR: &str = "KIT_PROJECT_ROOT";

static SERVICE_NAME: OnceLock<String> = OnceLock::new();

/// Where and as what the process is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub service_name: String,
    pub runtime: RuntimeEnv,
    /// Root containing the `configs/` directory.
    pub project_root: PathBuf,
}

impl Environment {
    /// Detect the environment from process state.
    pub fn detect(service_name: &str) -> std::io::Result<Self> {
        let project_root = match std::env::var_os(PROJECT_ROOT_VAR) {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            service_name: service_name.to_string(),
            runtime: RuntimeEnv::from_env(),
            project_root,
        })
    }

    /// `<project_root>/configs/<env>`.
    pub fn config_dir(&self) -> PathBuf {
        self.project_root.join("configs").join(self.runtime.as_str())
    }

    /// Resolve a possibly relative path against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }
}

/// Stamp the service identity. Only the first call takes effect.
pub fn set_service_name(name: &str) {
    if SERVICE_NAME.set(name.to_string()).is_err() {
        tracing::debug!(name, "Service name already set, ignoring");
    }
}

/// The stamped service identity, or `"unknown"` before startup.
pub fn service_name() -> &'static str {
    SERVICE_NAME.get().map(String::as_str).unwrap_or("unknown")
}
