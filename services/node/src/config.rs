//! Configuration shared by controllers and agents.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use beacon_protocol::{ChannelPrefixes, Realm};

use crate::controller::ProbeStrategy;

/// Default period of the serve and work loops.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Realm isolating this group's channels.
    pub realm: Realm,

    /// Channel name prefixes.
    pub prefixes: ChannelPrefixes,

    /// Serve/work loop period in seconds.
    pub tick_interval_secs: u64,

    /// What the controller sends on each tick.
    pub probe_strategy: ProbeStrategy,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            realm: Realm::default(),
            prefixes: ChannelPrefixes::default(),
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            probe_strategy: ProbeStrategy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ChannelPrefixes::default();

        let realm = Realm::new(lookup("BEACON_REALM").unwrap_or_default());

        let prefixes = ChannelPrefixes {
            control: prefix(&lookup, "BEACON_CTRL_PREFIX", defaults.control)?,
            broadcast: prefix(&lookup, "BEACON_BCAST_PREFIX", defaults.broadcast)?,
            agent: prefix(&lookup, "BEACON_AGENT_PREFIX", defaults.agent)?,
        };

        let tick_interval_secs = match lookup("BEACON_TICK_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("BEACON_TICK_INTERVAL_SECS is not a number: {raw}"))?,
            None => DEFAULT_TICK_INTERVAL_SECS,
        };
        if tick_interval_secs == 0 {
            bail!("BEACON_TICK_INTERVAL_SECS must be greater than zero");
        }

        let probe_strategy = match lookup("BEACON_PROBE_STRATEGY") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow::anyhow!("BEACON_PROBE_STRATEGY: {e}"))?,
            None => ProbeStrategy::default(),
        };

        let log_level = lookup("BEACON_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            realm,
            prefixes,
            tick_interval_secs,
            probe_strategy,
            log_level,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

fn prefix<F>(lookup: &F, key: &str, default: String) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.is_empty() || value.contains(':') => {
            bail!("{key} must be non-empty and must not contain ':'")
        }
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.realm.as_str(), "");
        assert_eq!(config.prefixes, ChannelPrefixes::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(10));
        assert_eq!(config.probe_strategy, ProbeStrategy::Oscillate);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BEACON_REALM", "lab"),
            ("BEACON_CTRL_PREFIX", "ctl"),
            ("BEACON_BCAST_PREFIX", "all"),
            ("BEACON_AGENT_PREFIX", "one"),
            ("BEACON_TICK_INTERVAL_SECS", "3"),
            ("BEACON_PROBE_STRATEGY", "status-only"),
            ("BEACON_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.realm.as_str(), "lab");
        assert_eq!(config.prefixes.control, "ctl");
        assert_eq!(config.prefixes.broadcast, "all");
        assert_eq!(config.prefixes.agent, "one");
        assert_eq!(config.tick_interval_secs, 3);
        assert_eq!(config.probe_strategy, ProbeStrategy::StatusOnly);
        assert_eq!(config.log_level, "debug");
    }

    #[rstest]
    #[case("BEACON_TICK_INTERVAL_SECS", "0")]
    #[case("BEACON_TICK_INTERVAL_SECS", "soon")]
    #[case("BEACON_PROBE_STRATEGY", "random")]
    #[case("BEACON_CTRL_PREFIX", "")]
    #[case("BEACON_AGENT_PREFIX", "a:b")]
    fn test_invalid_values(#[case] key: &str, #[case] value: &str) {
        assert!(Config::from_lookup(lookup(&[(key, value)])).is_err());
    }
}
