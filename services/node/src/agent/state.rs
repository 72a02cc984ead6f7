//! Agent-local suspend/resume state.

use serde::{Serialize, Serializer};

/// State an agent was last told to be in.
///
/// On the wire this is `null`, `"S"` or `"R"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocalState {
    #[default]
    Unset,
    Suspended,
    Resumed,
}

impl LocalState {
    /// Wire code, `None` when unset.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            LocalState::Unset => None,
            LocalState::Suspended => Some("S"),
            LocalState::Resumed => Some("R"),
        }
    }

    pub fn is_suspended(&self) -> bool {
        *self == LocalState::Suspended
    }
}

impl Serialize for LocalState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.code() {
            Some(code) => serializer.serialize_str(code),
            None => serializer.serialize_none(),
        }
    }
}

impl std::fmt::Display for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code().unwrap_or("unset"))
    }
}
