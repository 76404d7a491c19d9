//! Wave sources, override rule tables and output sinks
//!
//! The merge engine never touches files. Waves come in through a
//! [`WaveSource`], curator directives through an [`OverrideRuleSource`], and
//! the finalized dataset goes out through an [`OutputSink`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use wavemerge_source::{JsonDirectorySource, WaveSource};
//!
//! let source = JsonDirectorySource::new("data/waves");
//! let waves = source.fetch_all().await?;
//! ```

pub mod source;
pub mod directory;
pub mod mock;

pub use source::{OutputSink, OverrideRuleSource, SourceError, WaveSource};
pub use directory::{JsonDirectorySink, JsonDirectorySource, MERGED_DATA_FILE, MERGED_METADATA_FILE, OVERRIDES_FILE};
pub use mock::{MemorySink, MockWaveSource, MockWaveSourceBuilder};
