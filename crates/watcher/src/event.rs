//! Change events produced by snapshot diffing

use crate::snapshot::Node;
use bitflags::bitflags;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

bitflags! {
    /// Type of change, as a bit flag so consumers can test set membership
    ///
    /// Renames and moves are never reported directly: they show up as a
    /// `DELETE` for the old path plus a `CREATE` for the new one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKind: u32 {
        const CREATE = 1 << 0;
        const MODIFY = 1 << 1;
        const DELETE = 1 << 2;
        /// Reserved, never emitted
        const CHMOD  = 1 << 3;
    }
}

impl EventKind {
    /// Short lowercase label
    pub fn label(self) -> &'static str {
        if self == Self::CREATE {
            "create"
        } else if self == Self::MODIFY {
            "modify"
        } else if self == Self::DELETE {
            "delete"
        } else if self == Self::CHMOD {
            "chmod"
        } else {
            "mixed"
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detected change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Modification time of the source node (not detection time)
    pub timestamp: SystemTime,
}

impl Event {
    /// Create an event describing `node`
    pub fn from_node(node: &Node, kind: EventKind) -> Self {
        Self {
            path: node.path.clone(),
            kind,
            is_dir: node.is_dir(),
            timestamp: node.modified,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())?;
        if self.is_dir {
            f.write_str("/")?;
        }
        Ok(())
    }
}
