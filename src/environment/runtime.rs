//! Runtime environment detection.

use std::fmt;

/// Environment variable naming the runtime environment.
pub const RUNTIME_ENV_VAR: &str = "APP_ENV";

/// Deployment environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuntimeEnv {
    /// Local development. Config is read from the project tree.
    #[default]
    Debug,
    Test,
    Prod,
}

impl RuntimeEnv {
    /// Parse an environment name. Unknown names fall back to `Debug`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" | "testing" => Self::Test,
            "prod" | "production" => Self::Prod,
            _ => Self::Debug,
        }
    }

    /// Read from [`RUNTIME_ENV_VAR`].
    pub fn from_env() -> Self {
        std::env::var(RUNTIME_ENV_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Directory name under `configs/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!(RuntimeEnv::parse("prod"), RuntimeEnv::Prod);
        assert_eq!(RuntimeEnv::parse(" Production "), RuntimeEnv::Prod);
        assert_eq!(RuntimeEnv::parse("TEST"), RuntimeEnv::Test);
        assert_eq!(RuntimeEnv::parse("dev"), RuntimeEnv::Debug);
    }

    #[test]
    fn test_unknown_falls_back_to_debug() {
        assert_eq!(RuntimeEnv::parse(""), RuntimeEnv::Debug);
        assert_eq!(RuntimeEnv::parse("staging"), RuntimeEnv::Debug);
        assert!(RuntimeEnv::parse("staging").is_debug());
    }

    #[test]
    fn test_display_matches_dir_name() {
        assert_eq!(RuntimeEnv::Prod.to_string(), "prod");
        assert_eq!(RuntimeEnv::Test.as_str(), "test");
    }
}
