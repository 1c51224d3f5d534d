//! Song model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque song identifier. Catalog backends use either numeric or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SongId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongId::Numeric(id) => write!(f, "{id}"),
            SongId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for SongId {
    fn from(id: u64) -> Self {
        SongId::Numeric(id)
    }
}

impl From<&str> for SongId {
    fn from(id: &str) -> Self {
        SongId::Text(id.to_string())
    }
}

impl From<String> for SongId {
    fn from(id: String) -> Self {
        SongId::Text(id)
    }
}

/// A playable catalog entry.
///
/// A song with neither locator is unplayable; the selector returns no source
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub cover: Option<String>,
    /// Locator of the full track.
    #[serde(default)]
    pub full_source: Option<String>,
    /// Locator of the short preview.
    #[serde(default)]
    pub teaser_source: Option<String>,
}

impl Song {
    pub fn new(id: impl Into<SongId>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover: None,
            full_source: None,
            teaser_source: None,
        }
    }

    pub fn with_full_source(mut self, locator: impl Into<String>) -> Self {
        self.full_source = Some(locator.into());
        self
    }

    pub fn with_teaser_source(mut self, locator: impl Into<String>) -> Self {
        self.teaser_source = Some(locator.into());
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    /// Full locator, if present and not blank.
    pub fn full_locator(&self) -> Option<&str> {
        usable(self.full_source.as_deref())
    }

    /// Teaser locator, if present and not blank.
    pub fn teaser_locator(&self) -> Option<&str> {
        usable(self.teaser_source.as_deref())
    }

    pub fn is_playable(&self) -> bool {
        self.full_locator().is_some() || self.teaser_locator().is_some()
    }
}

/// Trims a locator and treats empty results as absent.
pub(crate) fn usable(locator: Option<&str>) -> Option<&str> {
    locator.map(str::trim).filter(|l| !l.is_empty())
}
