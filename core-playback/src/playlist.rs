//! Adjacent-song lookup for next/prev.

use crate::song::{Song, SongId};

/// Direction of travel through a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Prev,
}

/// The song after (or before) `current` in `playlist`, wrapping around.
///
/// `None` if the playlist is empty or does not contain `current`.
pub fn adjacent<'a>(playlist: &'a [Song], current: &SongId, step: Step) -> Option<&'a Song> {
    let len = playlist.len();
    let index = playlist.iter().position(|song| &song.id == current)?;

    let target = match step {
        Step::Next => (index + 1) % len,
        Step::Prev => (index + len - 1) % len,
    };
    playlist.get(target)
}
