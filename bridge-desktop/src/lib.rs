//! # Desktop Bridge Implementations
//!
//! Default implementations of the storage and marks bridges for desktop
//! platforms (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `RemoteMarkRecorder` posting JSON over HTTP with `reqwest`
//!
//! The media engine is always host-supplied; there is no desktop default.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HttpMarkRecorder, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let settings = SqliteSettingsStore::open_default().await?;
//!     let recorder = HttpMarkRecorder::new("https://api.example.com/marks")?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod marks;
mod settings;

pub use marks::HttpMarkRecorder;
pub use settings::SqliteSettingsStore;
