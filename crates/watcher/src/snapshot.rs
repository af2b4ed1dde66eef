//! Metadata snapshots of a directory tree
//!
//! A snapshot is rebuilt from scratch on every poll tick and never mutated
//! afterwards; the next tick's tree replaces it wholesale.

use crate::error::WatchError;
use crate::ignore::Ignore;
use crate::Result;
use ahash::AHashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;
use walkdir::{DirEntry, WalkDir};

/// One file system entry captured at scan time
#[derive(Debug, Clone)]
pub struct Node {
    /// Full path (root joined with each base name on the way down)
    pub path: PathBuf,
    /// Size in bytes as reported by lstat
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Children keyed by base name; `Some` iff this node is a directory
    children: Option<AHashMap<OsString, Node>>,
}

impl Node {
    /// Create a leaf (non-directory) node
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            children: None,
        }
    }

    /// Create an empty directory node
    pub fn dir(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            children: Some(AHashMap::new()),
        }
    }

    fn from_entry(entry: &DirEntry) -> io::Result<Self> {
        let metadata = entry.metadata().map_err(io::Error::from)?;
        let modified = metadata.modified()?;

        Ok(if metadata.is_dir() {
            Self::dir(entry.path(), metadata.len(), modified)
        } else {
            Self::file(entry.path(), metadata.len(), modified)
        })
    }

    /// Whether this node is a directory
    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    /// Look up a direct child by base name
    pub fn child(&self, name: impl AsRef<OsStr>) -> Option<&Node> {
        self.children.as_ref()?.get(name.as_ref())
    }

    /// Iterate direct children (arbitrary order); empty for files
    pub fn children(&self) -> impl Iterator<Item = (&OsStr, &Node)> {
        self.children
            .iter()
            .flat_map(|map| map.iter().map(|(name, node)| (name.as_os_str(), node)))
    }

    /// Insert a child, returning the one it replaced
    ///
    /// Returns `None` without inserting when `self` is not a directory.
    pub fn insert_child(&mut self, name: impl Into<OsString>, child: Node) -> Option<Node> {
        self.children.as_mut()?.insert(name.into(), child)
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children().map(|(_, child)| child.node_count()).sum::<usize>()
    }

    /// Metadata equality: same kind, same size, same mtime
    ///
    /// Children are not compared; nested differences are found by diffing.
    pub fn same_metadata(&self, other: &Node) -> bool {
        self.is_dir() == other.is_dir()
            && self.size == other.size
            && self.modified == other.modified
    }
}

/// Entry under construction while the walk is still inside it
struct Pending {
    depth: usize,
    name: OsString,
    node: Node,
    /// Listing failed; the directory is dropped instead of attached
    unreadable: bool,
}

/// Attach every pending entry at `depth` or deeper to its parent
fn settle(stack: &mut Vec<Pending>, depth: usize) {
    while stack.len() > 1 && stack.last().map_or(false, |p| p.depth >= depth) {
        let Some(done) = stack.pop() else { break };
        if done.unreadable {
            trace!("Omitting unreadable directory {}", done.node.path.display());
            continue;
        }
        if let Some(parent) = stack.last_mut() {
            parent.node.insert_child(done.name, done.node);
        }
    }
}

/// Snapshot the tree rooted at `root`
///
/// Link metadata is used throughout, so symlinks are leaves and never
/// followed. `ignore` is consulted for every path below the root and prunes
/// whole subtrees. Only failures on the root itself (stat or listing) are
/// returned; anything that fails below it is left out of the tree.
pub fn build(root: &Path, ignore: &dyn Ignore) -> Result<Node> {
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !ignore.is_ignored_entry(entry.path(), entry.file_type().is_dir())
        });

    let mut stack: Vec<Pending> = Vec::new();

    while let Some(next) = walker.next() {
        let entry = match next {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(WatchError::scan(root, err)),
            Err(err) => {
                if let Some(path) = err.path() {
                    if let Some(pending) = stack.iter_mut().rev().find(|p| p.node.path == path) {
                        pending.unreadable = true;
                    }
                }
                trace!("Skipping entry below {}: {}", root.display(), err);
                continue;
            }
        };

        let depth = entry.depth();
        settle(&mut stack, depth);

        let node = match Node::from_entry(&entry) {
            Ok(node) => node,
            Err(source) if depth == 0 => {
                return Err(WatchError::Scan {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                trace!("Skipping {}: {}", entry.path().display(), err);
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
        };

        stack.push(Pending {
            depth,
            name: entry.file_name().to_os_string(),
            node,
            unreadable: false,
        });
    }

    settle(&mut stack, 1);

    match stack.pop() {
        Some(root_entry) => Ok(root_entry.node),
        None => Err(WatchError::Scan {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "walk yielded no root entry"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::NoIgnore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("main.tex"), b"\\documentclass{article}").unwrap();
        fs::create_dir_all(root.join("chapters/figures")).unwrap();
        fs::write(root.join("chapters/intro.tex"), b"intro").unwrap();
        fs::write(root.join("chapters/figures/plot.pdf"), b"%PDF").unwrap();

        let tree = build(root, &NoIgnore).unwrap();

        assert!(tree.is_dir());
        assert_eq!(tree.path, root);
        assert_eq!(tree.node_count(), 6);

        let main = tree.child("main.tex").unwrap();
        assert!(!main.is_dir());
        assert_eq!(main.size, 23);
        assert_eq!(main.path, root.join("main.tex"));
        assert_eq!(main.children().count(), 0);

        let chapters = tree.child("chapters").unwrap();
        assert!(chapters.is_dir());
        assert_eq!(chapters.children().count(), 2);

        let plot = chapters.child("figures").unwrap().child("plot.pdf").unwrap();
        assert_eq!(plot.path, root.join("chapters/figures/plot.pdf"));
    }

    #[test]
    fn test_build_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let tree = build(temp_dir.path(), &NoIgnore).unwrap();

        assert!(tree.is_dir());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_build_file_root_is_leaf() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("solo.tex");
        fs::write(&file, b"abc").unwrap();

        let tree = build(&file, &NoIgnore).unwrap();

        assert!(!tree.is_dir());
        assert_eq!(tree.size, 3);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_build_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = build(&missing, &NoIgnore).unwrap_err();

        match err {
            WatchError::Scan { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ignore_prunes_subtrees() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("build/out")).unwrap();
        fs::write(root.join("build/out/main.pdf"), b"pdf").unwrap();
        fs::write(root.join("main.tex"), b"tex").unwrap();
        fs::write(root.join("main.log"), b"log").unwrap();

        let ignore = |p: &Path| {
            p.ends_with("build") || p.extension().map_or(false, |ext| ext == "log")
        };
        let tree = build(root, &ignore).unwrap();

        assert!(tree.child("build").is_none());
        assert!(tree.child("main.log").is_none());
        assert!(tree.child("main.tex").is_some());
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_ignore_never_applies_to_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.tex"), b"a").unwrap();

        let tree = build(temp_dir.path(), &|_: &Path| true).unwrap();

        assert!(tree.is_dir());
        assert_eq!(tree.node_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("real")).unwrap();
        fs::write(root.join("real/a.tex"), b"a").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();
        // A cycle back to the root must not be walked
        std::os::unix::fs::symlink(root, root.join("real/up")).unwrap();

        let tree = build(root, &NoIgnore).unwrap();

        let link = tree.child("link").unwrap();
        assert!(!link.is_dir());
        assert!(tree.child("real").unwrap().child("up").is_some());
        assert_eq!(tree.node_count(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_omitted() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let locked = root.join("locked");

        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("secret.tex"), b"s").unwrap();
        fs::write(root.join("open.tex"), b"o").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can list anything; nothing to check then
        let readable = fs::read_dir(&locked).is_ok();
        let tree = build(root, &NoIgnore).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(tree.child("open.tex").is_some());
        if !readable {
            assert!(tree.child("locked").is_none());
        }
    }

    fn pending(depth: usize, path: &str, dir: bool, unreadable: bool) -> Pending {
        let path = PathBuf::from(path);
        let name = path.file_name().unwrap_or(path.as_os_str()).to_os_string();
        let node = if dir {
            Node::dir(&path, 0, SystemTime::UNIX_EPOCH)
        } else {
            Node::file(&path, 0, SystemTime::UNIX_EPOCH)
        };
        Pending {
            depth,
            name,
            node,
            unreadable,
        }
    }

    #[test]
    fn test_settle_drops_unreadable_directories() {
        // Same order the walk produces: root, locked/, then its siblings
        let mut stack = vec![pending(0, "root", true, false)];
        stack.push(pending(1, "root/locked", true, true));

        settle(&mut stack, 1);
        stack.push(pending(1, "root/open", true, false));
        stack.push(pending(2, "root/open/deep", true, true));

        settle(&mut stack, 2);
        stack.push(pending(2, "root/open/a.tex", false, false));

        settle(&mut stack, 1);
        assert_eq!(stack.len(), 1);

        let root = stack.pop().unwrap().node;
        assert!(root.child("locked").is_none());
        let open = root.child("open").unwrap();
        assert!(open.child("deep").is_none());
        assert!(open.child("a.tex").is_some());
        assert_eq!(root.node_count(), 3);
    }

    #[test]
    fn test_settle_never_pops_root() {
        let mut stack = vec![pending(0, "root", true, false)];

        settle(&mut stack, 0);

        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].node.path, PathBuf::from("root"));
    }

    #[test]
    fn test_same_metadata() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + std::time::Duration::from_nanos(1);

        let a = Node::file("a", 10, t0);
        assert!(a.same_metadata(&Node::file("elsewhere", 10, t0)));
        assert!(!a.same_metadata(&Node::file("a", 11, t0)));
        assert!(!a.same_metadata(&Node::file("a", 10, t1)));
        assert!(!a.same_metadata(&Node::dir("a", 10, t0)));

        // Children never take part in equality
        let mut with_child = Node::dir("d", 4096, t0);
        with_child.insert_child("x", Node::file("d/x", 1, t0));
        assert!(with_child.same_metadata(&Node::dir("d", 4096, t0)));
    }

    #[test]
    fn test_insert_child_into_file_is_rejected() {
        let mut file = Node::file("f", 0, SystemTime::UNIX_EPOCH);
        assert!(file.insert_child("x", Node::file("f/x", 0, SystemTime::UNIX_EPOCH)).is_none());
        assert!(!file.is_dir());
        assert_eq!(file.node_count(), 1);
    }
}
