//! Visual-regression comparison pipeline
//!
//! codec → similarity → change detection → verdict. Decode failures abort
//! the analysis; everything downstream degrades to labeled fallback
//! methods instead of failing.

pub mod changes;
pub mod codec;
pub mod similarity;
pub mod verdict;

pub use changes::{ChangeDetector, ChangeRecord, Severity};
pub use codec::{DecodedImage, ImageFormat, ImageMetadata, MAX_IMAGE_BYTES};
pub use similarity::{Jitter, SimilarityEngine, SimilarityMethod, SimilarityResult};
pub use verdict::{Verdict, VerdictBuilder, VerdictReport};
