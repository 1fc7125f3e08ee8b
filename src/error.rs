use std::error::Error as StdError;

use thiserror::Error;

use crate::Segmentation;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, SegmentError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("need at least 3 points for a rectangle, got {0}")]
    TooFewPoints(usize),
    #[error("shape encloses zero area")]
    ZeroArea,
}

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// OCR found a different number of label tokens than the caption promised.
    #[error("expected {expected} label(s) but OCR found {found}")]
    LabelCount { expected: usize, found: usize },
    /// The largest remaining blob never dropped below the area floor.
    #[error("extraction still had blobs left after {iterations} iterations")]
    ExtractionIncomplete {
        iterations: usize,
        partial: Segmentation,
    },
    #[error("text recognition failed: {0}")]
    Ocr(#[source] BoxError),
    #[error("invalid unit pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
