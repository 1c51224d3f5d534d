//! # Source Selector
//!
//! Pure choice between a song's teaser and full locator.
//!
//! - Teaser preferred and a teaser exists: the teaser.
//! - Otherwise the full locator: the song's own full source first, then a
//!   locator pre-resolved upstream, unless that locator is the teaser.
//! - Blank locators count as absent. No usable locator means `None`, which
//!   callers treat as "nothing to play".

use crate::song::{usable, Song};
use bridge_traits::SourceMode;
use std::fmt;

/// Which of a song's locators a [`Source`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Teaser,
    Full,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Teaser => "teaser",
            SourceKind::Full => "full",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved locator tagged with its kind. Lives only in controller memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub locator: String,
    pub kind: SourceKind,
}

impl Source {
    fn teaser(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            kind: SourceKind::Teaser,
        }
    }

    fn full(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            kind: SourceKind::Full,
        }
    }

    pub fn is_teaser(&self) -> bool {
        self.kind == SourceKind::Teaser
    }
}

/// Chooses the source to load for `song` under `mode`.
///
/// `resolved` is a locator attached to the request by upstream code. It is
/// only used as a full source, and never when it equals the teaser.
pub fn select_source(song: &Song, mode: SourceMode, resolved: Option<&str>) -> Option<Source> {
    if mode.is_teaser_preferred() {
        if let Some(teaser) = song.teaser_locator() {
            return Some(Source::teaser(teaser));
        }
    }

    full_source(song, resolved)
}

/// The full-source retry target after `failed` could not be loaded.
///
/// Only a teaser failure has a fallback, and only when the full locator
/// differs from the one that just failed.
pub fn fallback_source(song: &Song, failed: &Source, resolved: Option<&str>) -> Option<Source> {
    if !failed.is_teaser() {
        return None;
    }

    full_source(song, resolved).filter(|full| full.locator != failed.locator)
}

fn full_source(song: &Song, resolved: Option<&str>) -> Option<Source> {
    if let Some(full) = song.full_locator() {
        return Some(Source::full(full));
    }

    let resolved = usable(resolved)?;
    if song.teaser_locator() == Some(resolved) {
        return None;
    }
    Some(Source::full(resolved))
}
