// ============================================================
// Layer 6 — Logging
// ============================================================
// One fmt subscriber for the whole process. The filter sits
// behind a reload layer so a run can change the crate's log
// level after startup (the classifier's `log.level` key).
//
// Default filter: RUST_LOG, plus `finetune=info` (the binary crate).

use anyhow::{anyhow, bail, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

const CRATE_TARGET: &str = "finetune";

/// Levels accepted in run configs. `critical` maps to error, and
/// `passive` leaves the current filter alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Passive,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "debug"    => LogLevel::Debug,
            "info"     => LogLevel::Info,
            "warning"  => LogLevel::Warning,
            "error"    => LogLevel::Error,
            "critical" => LogLevel::Critical,
            "passive"  => LogLevel::Passive,
            other => bail!("Unknown log level '{other}'"),
        })
    }
}

impl LogLevel {
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Debug    => Some("debug"),
            LogLevel::Info     => Some("info"),
            LogLevel::Warning  => Some("warn"),
            LogLevel::Error    => Some("error"),
            LogLevel::Critical => Some("error"),
            LogLevel::Passive  => None,
        }
    }
}

#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn apply(&self, level: LogLevel) -> Result<()> {
        let Some(directive) = level.directive() else {
            return Ok(());
        };
        self.handle
            .reload(filter(directive)?)
            .map_err(|e| anyhow!("Cannot change log level: {e}"))?;
        tracing::debug!("Log level set to {}", directive);
        Ok(())
    }
}

fn filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(format!("{CRATE_TARGET}={level}").parse()?))
}

/// A handle wired to a private subscriber instead of the global one.
/// The handle only works while the returned subscriber is alive.
#[cfg(test)]
pub(crate) fn detached() -> Result<(LogHandle, impl tracing::Subscriber)> {
    let (filter_layer, handle) = reload::Layer::new(filter("info")?);
    let subscriber = tracing_subscriber::registry().with(filter_layer).with(fmt::layer());
    Ok((LogHandle { handle }, subscriber))
}

/// Install the global subscriber. Call once, from `main`.
pub fn init() -> Result<LogHandle> {
    let (filter_layer, handle) = reload::Layer::new(filter("info")?);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| anyhow!("Cannot install log subscriber: {e}"))?;
    Ok(LogHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("PASSIVE".parse::<LogLevel>().unwrap(), LogLevel::Passive);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_critical_maps_to_error() {
        assert_eq!(LogLevel::Critical.directive(), Some("error"));
        assert_eq!(LogLevel::Passive.directive(), None);
    }

    #[test]
    fn test_apply_relevels_a_live_subscriber() {
        let (log, _subscriber) = detached().unwrap();
        log.apply(LogLevel::Debug).unwrap();
        log.apply(LogLevel::Critical).unwrap();
        log.apply(LogLevel::Passive).unwrap();
    }

    #[test]
    fn test_apply_fails_once_subscriber_is_gone() {
        let (log, subscriber) = detached().unwrap();
        drop(subscriber);
        assert!(log.apply(LogLevel::Debug).is_err());
        assert!(log.apply(LogLevel::Passive).is_ok());
    }

    #[test]
    fn test_filter_accepts_every_directive() {
        for level in ["debug", "info", "warn", "error"] {
            assert!(filter(level).is_ok());
        }
    }
}
