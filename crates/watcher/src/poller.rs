//! Per-root baselines and a single poll cycle
//!
//! The poller keeps exactly one previous snapshot per root. A root without a
//! baseline is treated as newly added: its first scan reports every entry
//! below it as created.

use crate::diff::{diff, emit_subtree};
use crate::event::{Event, EventKind};
use crate::ignore::Ignore;
use crate::snapshot::{self, Node};
use crate::Result;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot cache and diff driver, independent of any runtime
#[derive(Debug, Default)]
pub struct Poller {
    /// Last good snapshot per watched root
    baselines: AHashMap<PathBuf, Node>,
}

impl Poller {
    /// Create a poller with no baselines
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` and return what changed since its baseline
    ///
    /// On scan failure the baseline is left untouched so the next attempt
    /// diffs against the same state.
    pub fn poll_root(&mut self, root: &Path, ignore: &dyn Ignore) -> Result<Vec<Event>> {
        let current = snapshot::build(root, ignore)?;
        Ok(self.observe(root, current))
    }

    /// Diff a fresh snapshot against the baseline for `root`, then replace it
    pub fn observe(&mut self, root: &Path, current: Node) -> Vec<Event> {
        let mut events = Vec::new();
        let mut emit = |event| events.push(event);

        match self.baselines.get(root) {
            Some(previous) if previous.is_dir() && current.is_dir() => {
                diff(previous, &current, &mut emit);
            }
            Some(previous) => {
                // At most one side is a directory; its entries appeared or vanished wholesale
                if !previous.same_metadata(&current) {
                    emit(Event::from_node(&current, EventKind::MODIFY));
                }
                if previous.is_dir() {
                    emit_subtree(previous, EventKind::DELETE, true, &mut emit);
                }
                if current.is_dir() {
                    emit_subtree(&current, EventKind::CREATE, true, &mut emit);
                }
            }
            None => {
                debug!("New root {}, reporting {} entries", root.display(), current.node_count() - 1);
                emit_subtree(&current, EventKind::CREATE, true, &mut emit);
            }
        }

        self.baselines.insert(root.to_path_buf(), current);
        events
    }

    /// Whether `root` has been scanned successfully at least once
    pub fn has_baseline(&self, root: &Path) -> bool {
        self.baselines.contains_key(root)
    }

    /// Baseline snapshot for `root`
    pub fn baseline(&self, root: &Path) -> Option<&Node> {
        self.baselines.get(root)
    }

    /// Drop the baseline for `root`; its next scan is a full creation burst
    pub fn forget(&mut self, root: &Path) -> Option<Node> {
        self.baselines.remove(root)
    }
}
