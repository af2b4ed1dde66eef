//! Terminal output for watcher events

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use watcher::{Event, EventKind, WatchError};

/// Running totals for the session summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl Tally {
    /// Count one event
    pub fn record(&mut self, event: &Event) {
        if event.kind.contains(EventKind::CREATE) {
            self.created += 1;
        }
        if event.kind.contains(EventKind::MODIFY) {
            self.modified += 1;
        }
        if event.kind.contains(EventKind::DELETE) {
            self.deleted += 1;
        }
    }

    /// Total number of events counted
    pub fn events(&self) -> usize {
        self.created + self.modified + self.deleted
    }
}

/// Print the startup banner
pub fn banner(roots: &[PathBuf], interval: Duration, config_source: Option<&PathBuf>) {
    println!("{}", " ⟪ texer ⟫".bold().magenta());
    for root in roots {
        println!(" {} {}", "Watching:".cyan(), root.display());
    }
    println!(" {} {:?}", "Interval:".cyan(), interval);
    if let Some(path) = config_source {
        println!(" {} {}", "Config:".cyan(), path.display().dimmed());
    }
    println!();
}

/// Print one event line
pub fn event(event: &Event) {
    let stamp = format_timestamp(event.timestamp).dimmed().to_string();
    let marker = if event.kind.contains(EventKind::CREATE) {
        "+".green().bold().to_string()
    } else if event.kind.contains(EventKind::MODIFY) {
        "~".blue().bold().to_string()
    } else if event.kind.contains(EventKind::DELETE) {
        "-".yellow().bold().to_string()
    } else {
        "?".dimmed().to_string()
    };

    let kind = if event.is_dir { "dir " } else { "file" };
    println!("{} {} {} {}", stamp, marker, kind.dimmed(), event.path.display());
}

/// Print one error line
pub fn error(err: &WatchError) {
    eprintln!("{} {}", "✖".red().bold(), err);
}

/// Print the session summary
pub fn summary(tally: &Tally, elapsed: Duration) {
    println!();
    println!(
        "{} {} event(s): {} created, {} modified, {} deleted, {} error(s) in {}",
        "Summary:".bold(),
        tally.events(),
        tally.created.green(),
        tally.modified.blue(),
        tally.deleted.yellow(),
        tally.errors.red(),
        format_duration(elapsed)
    );
}

/// Format a file timestamp as local wall-clock time ("14:30:05")
pub fn format_timestamp(ts: SystemTime) -> String {
    let local: DateTime<Local> = ts.into();
    local.format("%H:%M:%S").to_string()
}

/// Format a duration as "HH:MM:SS"
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
