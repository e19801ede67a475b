//! Cursor and session vocabulary.
//!
//! Pure data types used by the cursor store and the coordinator. Kept in
//! the types crate so the CLI can name keyspaces without pulling in the
//! engine's collaborators.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque catalog sync-session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Keyspaces
// ---------------------------------------------------------------------------

/// Independent cursor cycle over the same query.
///
/// Drain and refresh progress separately, so each gets its own keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKeyspace {
    /// Catch-up over everything not yet delivered.
    Drain,
    /// Slow perpetual re-walk of the whole result set.
    Refresh,
}

impl CursorKeyspace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drain => "drain",
            Self::Refresh => "refresh",
        }
    }

    /// Prefix applied to every state key of this keyspace.
    ///
    /// Drain keys carry no prefix so they match the layout written by
    /// earlier releases.
    #[must_use]
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Drain => "",
            Self::Refresh => "refresh_",
        }
    }
}

impl std::fmt::Display for CursorKeyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CursorKeyspace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drain" => Ok(Self::Drain),
            "refresh" => Ok(Self::Refresh),
            other => Err(format!("unknown keyspace '{other}', expected drain or refresh")),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync kinds
// ---------------------------------------------------------------------------

/// Entry points invoked by the scheduler; each runs single-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    TagDrain,
    TagRefresh,
    ActivityTypeDrain,
    ActivityTypeRefresh,
}

impl SyncKind {
    pub const ALL: [Self; 4] = [
        Self::TagDrain,
        Self::TagRefresh,
        Self::ActivityTypeDrain,
        Self::ActivityTypeRefresh,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TagDrain => "tag_drain",
            Self::TagRefresh => "tag_refresh",
            Self::ActivityTypeDrain => "activity_type_drain",
            Self::ActivityTypeRefresh => "activity_type_refresh",
        }
    }

    #[must_use]
    pub fn keyspace(self) -> CursorKeyspace {
        match self {
            Self::TagDrain | Self::ActivityTypeDrain => CursorKeyspace::Drain,
            Self::TagRefresh | Self::ActivityTypeRefresh => CursorKeyspace::Refresh,
        }
    }
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_and_as_str() {
        let sid = SessionId::new("session-1");
        assert_eq!(sid.as_str(), "session-1");
        assert_eq!(sid.to_string(), "session-1");
    }

    #[test]
    fn session_id_serde_transparent() {
        let json = serde_json::to_string(&SessionId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn keyspace_prefixes_are_disjoint() {
        assert_eq!(CursorKeyspace::Drain.key_prefix(), "");
        assert_eq!(CursorKeyspace::Refresh.key_prefix(), "refresh_");
    }

    #[test]
    fn keyspace_from_str() {
        assert_eq!("drain".parse::<CursorKeyspace>().unwrap(), CursorKeyspace::Drain);
        assert_eq!("refresh".parse::<CursorKeyspace>().unwrap(), CursorKeyspace::Refresh);
        assert!("sideways".parse::<CursorKeyspace>().is_err());
    }

    #[test]
    fn sync_kind_keyspaces() {
        assert_eq!(SyncKind::TagDrain.keyspace(), CursorKeyspace::Drain);
        assert_eq!(SyncKind::ActivityTypeRefresh.keyspace(), CursorKeyspace::Refresh);
        assert_eq!(SyncKind::ALL.len(), 4);
        assert_eq!(SyncKind::ActivityTypeDrain.to_string(), "activity_type_drain");
    }
}
