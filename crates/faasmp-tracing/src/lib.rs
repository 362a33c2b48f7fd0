//! Tracing setup shared across the faasmp crates.
//!
//! Exactly one `tracing` subscriber can own a process, but what it should
//! look like depends on where the worker runs: a developer terminal wants
//! pretty ANSI output, CI wants JSON a collector can ingest. [`TracingConfig`]
//! captures that choice once, with environment overrides, so the worker
//! binary and the test harnesses install logging the same way.

#[macro_use]
pub mod macros;

use std::env;
use std::str::FromStr;

pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Formatter choices for subscriber output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line events, for terminals with little room
    Compact,
    /// Multi-line human-readable events
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Failures while setting up the shared subscriber
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// The configured filter directives do not parse
    #[error("cannot parse log directives {directives:?}")]
    BadDirectives {
        directives: String,
        source: ParseError,
    },

    /// Some other subscriber already owns this process
    #[error("a global subscriber is already installed")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// One worker's logging choices.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Explicit filter directives, e.g. `faasmp_runtime=debug,info`. `None`
    /// defers to `RUST_LOG`, then to [`TracingConfig::fallback`].
    pub directives: Option<String>,
    /// Directive used when nothing else supplies one.
    pub fallback: String,
    /// Output formatter.
    pub format: LogFormat,
    /// Include event targets (module paths) in output.
    pub with_targets: bool,
    /// Emit ANSI colour codes.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Settings for a developer terminal.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            fallback: "info".to_string(),
            format: LogFormat::Pretty,
            with_targets: true,
            ansi: true,
        }
    }

    /// Settings for CI and log collection: JSON, no colour codes.
    pub fn for_ci() -> Self {
        Self {
            format: LogFormat::Json,
            ansi: false,
            ..Self::for_local()
        }
    }

    /// Read overrides from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `FAASMP_TRACING_PROFILE` - `local` (default) or `ci`
    /// - `FAASMP_TRACING_DIRECTIVES` - explicit filter directives
    /// - `FAASMP_TRACING_FORMAT` - `pretty`, `compact`, or `json`
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// [`TracingConfig::from_env`] with the variable source injected, so
    /// tests can feed it values without mutating process state.
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup("FAASMP_TRACING_PROFILE").as_deref() {
            Some(profile) if profile.eq_ignore_ascii_case("ci") => Self::for_ci(),
            _ => Self::for_local(),
        };

        if let Some(directives) = lookup("FAASMP_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Some(format) = lookup("FAASMP_TRACING_FORMAT").and_then(|value| value.parse::<LogFormat>().ok()) {
            config.format = format;
            if format == LogFormat::Json {
                // colour codes inside JSON strings defeat the point
                config.ansi = false;
            }
        }

        config
    }

    /// Build the subscriber this configuration describes.
    pub fn subscriber(&self) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
        let filter = self.filter()?;
        Ok(Registry::default().with(self.formatter()).with(filter))
    }

    /// Build the subscriber and install it process-wide.
    pub fn install(&self) -> Result<(), TracingSetupError> {
        self.subscriber()?.try_init()?;
        Ok(())
    }

    fn filter(&self) -> Result<EnvFilter, TracingSetupError> {
        if let Some(directives) = &self.directives {
            return EnvFilter::try_new(directives).map_err(|source| TracingSetupError::BadDirectives {
                directives: directives.clone(),
                source,
            });
        }
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.fallback)))
    }

    fn formatter(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = tracing_subscriber::fmt::layer()
            .with_target(self.with_targets)
            .with_ansi(self.ansi);
        match self.format {
            LogFormat::Compact => Box::new(base),
            LogFormat::Pretty => Box::new(base.pretty()),
            LogFormat::Json => Box::new(base.json().with_ansi(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("COMPACT".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn no_vars_means_local_defaults() {
        let config = TracingConfig::from_vars(|_| None);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.ansi);
        assert!(config.directives.is_none());
        assert_eq!(config.fallback, "info");
    }

    #[test]
    fn ci_profile_with_format_and_directive_overrides() {
        let config = TracingConfig::from_vars(lookup_from(&[
            ("FAASMP_TRACING_PROFILE", "ci"),
            ("FAASMP_TRACING_FORMAT", "compact"),
            ("FAASMP_TRACING_DIRECTIVES", "faasmp_runtime=debug"),
        ]));
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.ansi);
        assert_eq!(config.directives.as_deref(), Some("faasmp_runtime=debug"));
    }

    #[test]
    fn json_format_turns_ansi_off() {
        let config = TracingConfig::from_vars(lookup_from(&[("FAASMP_TRACING_FORMAT", "json")]));
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi);
    }

    #[test]
    fn blank_directives_are_not_overrides() {
        let config = TracingConfig::from_vars(lookup_from(&[("FAASMP_TRACING_DIRECTIVES", "  ")]));
        assert!(config.directives.is_none());
    }

    #[test]
    fn unparseable_directives_fail_setup() {
        let config = TracingConfig {
            directives: Some("=::nonsense".to_string()),
            ..TracingConfig::default()
        };
        assert!(matches!(
            config.subscriber(),
            Err(TracingSetupError::BadDirectives { .. })
        ));
    }

    #[test]
    fn valid_configs_build_a_subscriber() {
        assert!(TracingConfig::for_local().subscriber().is_ok());
        assert!(TracingConfig::for_ci().subscriber().is_ok());
    }
}
