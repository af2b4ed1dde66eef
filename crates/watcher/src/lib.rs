//! Polling file system watcher for texer
//!
//! This crate detects changes under one or more directory roots without any
//! OS notification API:
//! - Metadata snapshots of each root, rebuilt on every poll tick
//! - Tree diffing into create/modify/delete events
//! - A background polling loop with bounded event and error streams
//! - Ignore rules (.gitignore, suffix filters, custom predicates)
//!
//! ```no_run
//! use std::path::Path;
//! use texer_watcher::{Watcher, WatcherConfig, EventKind};
//!
//! # async fn demo() -> texer_watcher::Result<()> {
//! let watcher = Watcher::new(WatcherConfig::default(), |p: &Path| {
//!     p.extension().map_or(false, |ext| ext == "log")
//! });
//! watcher.add("./paper")?;
//! let mut events = watcher.events().expect("events taken once");
//! watcher.start()?;
//!
//! while let Some(event) = events.recv().await {
//!     if event.kind.intersects(EventKind::CREATE | EventKind::MODIFY) {
//!         println!("rebuild {}", event.path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod ignore;
pub mod poller;
pub mod snapshot;
pub mod watcher;

// Re-exports
pub use config::WatcherConfig;
pub use error::WatchError;
pub use event::{Event, EventKind};
pub use self::ignore::{Ignore, IgnoreConfig, IgnoreRules, IgnoreSet};
pub use poller::Poller;
pub use snapshot::Node;
pub use watcher::{Lifecycle, Watcher};

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
