//! Tree diffing between two snapshots of the same root
//!
//! Emission order is whatever the children maps iterate in; callers must not
//! rely on it.

use crate::event::{Event, EventKind};
use crate::snapshot::Node;

/// Compare two directory snapshots and emit one event per change
///
/// - A child only in `previous` is reported deleted, subtree and all.
/// - A child only in `current` is reported created, subtree and all.
/// - A child in both with different metadata gets one `MODIFY`.
/// - A child that is a directory in both is diffed recursively, whether or
///   not it was reported modified.
pub fn diff<F>(previous: &Node, current: &Node, emit: &mut F)
where
    F: FnMut(Event),
{
    for (name, old) in previous.children() {
        if current.child(name).is_none() {
            emit_subtree(old, EventKind::DELETE, false, emit);
        }
    }

    for (name, new) in current.children() {
        let Some(old) = previous.child(name) else {
            emit_subtree(new, EventKind::CREATE, false, emit);
            continue;
        };

        if !new.same_metadata(old) {
            emit(Event::from_node(new, EventKind::MODIFY));
        }

        if new.is_dir() && old.is_dir() {
            diff(old, new, emit);
        }
    }
}

/// Emit `kind` for every node in the subtree rooted at `node`
///
/// With `skip_root`, the root itself is not reported, only what it contains.
pub fn emit_subtree<F>(node: &Node, kind: EventKind, skip_root: bool, emit: &mut F)
where
    F: FnMut(Event),
{
    if !skip_root {
        emit(Event::from_node(node, kind));
    }
    for (_, child) in node.children() {
        emit_subtree(child, kind, false, emit);
    }
}

/// Collect the events of `diff` into a vector
pub fn diff_to_vec(previous: &Node, current: &Node) -> Vec<Event> {
    let mut events = Vec::new();
    diff(previous, current, &mut |event| events.push(event));
    events
}
