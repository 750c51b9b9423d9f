use std::fmt;

/// The point catalog violates one of its structural invariants.
/// Detected at startup; never recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    EmptyCatalog,
    InvalidDay(u32),
    DuplicateDay(u32),
    EdgeIndexGap { after: i32, next: i32 },
    AmbiguousBranch { edge_index: i32 },
    MissingSuccessor { day: u32 },
    UnknownAnchor(u32),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCatalog => write!(f, "point catalog is empty"),
            Self::InvalidDay(day) => write!(f, "invalid day {day}: days start at 1"),
            Self::DuplicateDay(day) => write!(f, "day {day} appears more than once"),
            Self::EdgeIndexGap { after, next } => {
                write!(f, "edge index gap: {after} is followed by {next}")
            }
            Self::AmbiguousBranch { edge_index } => write!(
                f,
                "points sharing edge index {edge_index} need distinct branch indices"
            ),
            Self::MissingSuccessor { day } => {
                write!(f, "day {day} has no branch-compatible successor")
            }
            Self::UnknownAnchor(day) => write!(f, "overlay anchor day {day} is not in the catalog"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// A discovered point had no resolvable screen position when geometry was
/// requested. Signals a collaborator synchronization bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteGeometryError {
    pub day: u32,
}

impl fmt::Display for IncompleteGeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no screen position for discovered day {}", self.day)
    }
}

impl std::error::Error for IncompleteGeometryError {}

/// Persisted discovery state could not be read or decoded.
#[derive(Debug)]
pub enum PersistenceError {
    Backend(String),
    Malformed(serde_json::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "key-value backend error: {msg}"),
            Self::Malformed(e) => write!(f, "malformed discovery state: {e}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(_) => None,
            Self::Malformed(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e)
    }
}
