//! TestScope Common Library
//!
//! Analysis engines and shared types for the TestScope platform: the
//! visual-regression pipeline, heuristic script/locator classifiers and
//! narrative generation.

pub mod error;
pub mod heuristics;
pub mod narrative;
pub mod vision;

// Re-export commonly used types
pub use error::{Error, Result};
pub use narrative::{FallbackNarrator, NarrativeBundle, NarrativeContext, Narrator};
pub use vision::{
    ChangeDetector, ChangeRecord, DecodedImage, ImageMetadata, Jitter, SimilarityEngine,
    SimilarityResult, Verdict, VerdictBuilder, VerdictReport,
};

/// TestScope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
