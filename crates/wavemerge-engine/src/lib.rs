//! WaveMerge engine - metadata reconciliation and merge decisions
//!
//! This crate implements the decision logic of a wave merge:
//! - Metadata extraction and wave ordering
//! - Variable universe and occurrence counts
//! - Override directive resolution
//! - Cross-wave aggregation and inconsistency detection
//! - Inclusion policy
//! - Dataset assembly and integrity checks
//!
//! Everything here is synchronous and single-threaded. Wave rank order is
//! the only ordering that matters and it is carried explicitly on every
//! record.

pub mod extractor;
pub mod waves;
pub mod universe;
pub mod overrides;
pub mod aggregator;
pub mod inconsistency;
pub mod policy;
pub mod assembler;
pub mod integrity;
pub mod pipeline;

pub use extractor::{ExtractedWave, ExtractionError, MetadataExtractor};
pub use waves::{order_waves, select_waves, WaveSelectionOutcome};
pub use universe::VariableUniverse;
pub use overrides::{OverrideConflictError, OverrideDirective, OverrideResolver, OverrideSet, ResolvedOverrides};
pub use aggregator::MetadataAggregator;
pub use inconsistency::{InconsistencyDetector, InconsistencyReport};
pub use policy::{InclusionPolicy, PolicyOutcome};
pub use assembler::DatasetAssembler;
pub use integrity::IntegrityChecker;
pub use pipeline::{ConfigurationError, MergeError, MergeOutcome, MergePipeline};
