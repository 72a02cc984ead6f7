//! Channel naming.
//!
//! ```text
//! control:   <ctrl-prefix>:<realm>
//! broadcast: <bcast-prefix>:<realm>
//! agent:     <agent-prefix>:<realm>.<agent-name>
//! ```

use serde::{Deserialize, Serialize};

/// Namespace isolating one controller/agent group from another on the same
/// broker. The empty realm is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Realm(String);

impl Realm {
    pub fn new(realm: impl Into<String>) -> Self {
        Self(realm.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Realm {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Channel name prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPrefixes {
    pub control: String,
    pub broadcast: String,
    pub agent: String,
}

impl Default for ChannelPrefixes {
    fn default() -> Self {
        Self {
            control: "mnrdmqctrl".to_string(),
            broadcast: "mnrdmqbcst".to_string(),
            agent: "mnrdmqagnt".to_string(),
        }
    }
}

/// Resolved channel names for one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    realm: Realm,
    control: String,
    broadcast: String,
    agent_base: String,
}

impl Channels {
    pub fn new(realm: Realm, prefixes: &ChannelPrefixes) -> Self {
        Self {
            control: format!("{}:{}", prefixes.control, realm),
            broadcast: format!("{}:{}", prefixes.broadcast, realm),
            agent_base: format!("{}:{}", prefixes.agent, realm),
            realm,
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Channel every agent publishes to and the controller listens on.
    pub fn control(&self) -> &str {
        &self.control
    }

    /// Channel the controller publishes to and every agent listens on.
    pub fn broadcast(&self) -> &str {
        &self.broadcast
    }

    /// Unicast channel for one agent.
    pub fn agent(&self, name: &str) -> String {
        format!("{}.{}", self.agent_base, name)
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new(Realm::default(), &ChannelPrefixes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_realm_names() {
        let channels = Channels::default();
        assert_eq!(channels.control(), "mnrdmqctrl:");
        assert_eq!(channels.broadcast(), "mnrdmqbcst:");
        assert_eq!(channels.agent("w1"), "mnrdmqagnt:.w1");
    }

    #[test]
    fn test_realm_and_custom_prefixes() {
        let prefixes = ChannelPrefixes {
            control: "c".to_string(),
            broadcast: "b".to_string(),
            agent: "a".to_string(),
        };
        let channels = Channels::new(Realm::new("lab"), &prefixes);
        assert_eq!(channels.realm().as_str(), "lab");
        assert_eq!(channels.control(), "c:lab");
        assert_eq!(channels.broadcast(), "b:lab");
        assert_eq!(channels.agent("w1"), "a:lab.w1");
    }

    #[test]
    fn test_realms_do_not_collide() {
        let a = Channels::new("a".into(), &ChannelPrefixes::default());
        let b = Channels::new("b".into(), &ChannelPrefixes::default());
        assert_ne!(a.control(), b.control());
        assert_ne!(a.agent("w1"), b.agent("w1"));
    }
}
