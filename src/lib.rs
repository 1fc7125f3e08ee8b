use std::cmp::Reverse;

use float_ord::FloatOrd;
use image::DynamicImage;
use regex::Regex;
use tracing::instrument;

pub mod assign;
pub mod components;
pub mod debug;
pub mod dotted;
mod error;
pub mod extract;
pub mod filter;
pub mod geometry;
pub mod grid;
mod result;
pub mod util;

pub use error::*;
pub use geometry::{Contour, RotatedRect};
pub use grid::CollinearTolerance;
pub use result::*;

use assign::{assign_contours, attach_heights};
use dotted::{detect_dotted_lines, pair_by_dotted_line, DottedPair};
use extract::{extract_fallback, extract_labelled};
use filter::{filter_heights, filter_labels};
use util::{binarize, external_contours};

/// The external OCR engine: one blocking call per plate.
pub trait TextRecognizer {
    fn recognize(&self, image: &DynamicImage) -> std::result::Result<Vec<OcrPrediction>, BoxError>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&DynamicImage) -> std::result::Result<Vec<OcrPrediction>, BoxError>,
{
    fn recognize(&self, image: &DynamicImage) -> std::result::Result<Vec<OcrPrediction>, BoxError> {
        self(image)
    }
}

pub struct SegmenterBuilder {
    strict: bool,
    max_iterations: usize,
    unit_pattern: String,
    merge_collinear: bool,
}

impl SegmenterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`SegmentError::LabelCount`] instead of degrading when OCR
    /// finds a different number of labels than expected.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Cap on fallback extraction rounds per plate.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Regex recognising unit tokens of height annotations.
    pub fn unit_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.unit_pattern = pattern.into();
        self
    }

    /// Join side-by-side pieces of one sub-illustration on unlabelled plates.
    /// Off by default; equal-sized neighbours closer than
    /// [`CollinearTolerance::distance`] would otherwise become one region.
    pub fn merge_collinear(mut self, merge: bool) -> Self {
        self.merge_collinear = merge;
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<Segmenter> {
        Ok(Segmenter {
            strict: self.strict,
            max_iterations: self.max_iterations,
            unit_pattern: Regex::new(&self.unit_pattern)?,
            merge_collinear: self.merge_collinear,
        })
    }
}

impl Default for SegmenterBuilder {
    fn default() -> Self {
        Self {
            strict: false,
            max_iterations: 25,
            unit_pattern: "[cm]m".to_string(),
            merge_collinear: false,
        }
    }
}

pub struct Segmenter {
    strict: bool,
    max_iterations: usize,
    unit_pattern: Regex,
    merge_collinear: bool,
}

impl Segmenter {
    /// Runs `recognizer` once on the plate and segments it with the result.
    /// Recognition failures surface as [`SegmentError::Ocr`].
    #[instrument(skip(self, recognizer, image, options))]
    pub fn segment_with(
        &self,
        recognizer: &impl TextRecognizer,
        image: &DynamicImage,
        label_count: usize,
        options: SegmentOptions,
    ) -> Result<Segmentation> {
        let predictions = recognizer.recognize(image).map_err(SegmentError::Ocr)?;
        log::debug!("OCR returned {} token(s)", predictions.len());
        self.segment(image, &predictions, label_count, options)
    }

    /// Splits a plate into one image per label `A..`, using the OCR tokens to
    /// place labels. Without any usable label token the plate goes through
    /// [`Segmenter::extract_fallback`] instead.
    #[instrument(skip(self, image, predictions, options))]
    pub fn segment(
        &self,
        image: &DynamicImage,
        predictions: &[OcrPrediction],
        label_count: usize,
        options: SegmentOptions,
    ) -> Result<Segmentation> {
        let plate = image.to_rgb8();
        let labels = labels_for(label_count);
        let label_boxes = filter_labels(predictions, &labels, options.label_padding, self.strict)?;
        if label_boxes.is_empty() {
            log::debug!("No label text on the plate, peeling blobs instead");
            return extract_fallback(&plate, &options, self.max_iterations, self.merge_collinear);
        }
        let heights = filter_heights(predictions, &self.unit_pattern, options.unit_merge_distance);

        let mask = binarize(&plate, options.foreground_threshold);
        let mut contours = external_contours(&mask, options.min_contour_area);
        contours.sort_by_key(|it| Reverse(FloatOrd(it.area())));
        log::debug!(
            "{} contour(s), {} label box(es), {} height box(es)",
            contours.len(),
            label_boxes.len(),
            heights.len()
        );

        let regions = self.regions(&contours, &label_boxes, &heights, &[], &options);
        let segments = extract_labelled(&plate, &mask, &labels, &regions);

        let images = segments.iter().map(|it| it.image.clone()).collect::<Vec<_>>();
        let residual = debug::highlight_missing(&plate, &images, 0.0);
        let lines = detect_dotted_lines(&residual, &label_boxes, &options);
        let pairs = pair_by_dotted_line(&contours, &lines);

        #[cfg(feature = "debug")]
        {
            let saved = std::fs::create_dir_all("debug")
                .map_err(image::ImageError::IoError)
                .and_then(|_| residual.save("debug/residual.png"))
                .and_then(|_| debug::draw_contours(&residual, &lines).save("debug/dotted_lines.png"));
            if let Err(err) = saved {
                log::warn!("Could not write debug images: {err}");
            }
        }

        if pairs.is_empty() {
            return Ok(Segmentation {
                segments,
                partial: false,
            });
        }
        log::debug!("Dotted lines pair up {pairs:?}");
        let regions = self.regions(&contours, &label_boxes, &heights, &pairs, &options);
        Ok(Segmentation {
            segments: extract_labelled(&plate, &mask, &labels, &regions),
            partial: false,
        })
    }

    /// Unlabelled plates: largest blob first, labelled by reading order.
    pub fn extract_fallback(
        &self,
        image: &DynamicImage,
        options: SegmentOptions,
    ) -> Result<Segmentation> {
        extract_fallback(
            &image.to_rgb8(),
            &options,
            self.max_iterations,
            self.merge_collinear,
        )
    }

    fn regions(
        &self,
        contours: &[Contour],
        label_boxes: &[LabelBox],
        heights: &[HeightBox],
        pairs: &[DottedPair],
        options: &SegmentOptions,
    ) -> LabelRegions {
        let mut regions = assign_contours(contours, label_boxes, pairs);
        attach_heights(&mut regions, contours, heights, options.height_padding);
        regions
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Pixels added to the right and bottom of each label box.
    pub label_padding: f32,
    /// Largest centre distance at which a number and a unit are joined.
    pub unit_merge_distance: f32,
    /// Contours at or below this area are noise; also the fallback floor.
    pub min_contour_area: f32,
    /// Specks smaller than this many pixels are dropped before dotted line
    /// detection.
    pub min_noise_area: u32,
    /// Pixels added to the left of each height box.
    pub height_padding: f32,
    /// Margin whitened around label boxes before dotted line detection.
    pub label_clear_weight: i32,
    pub foreground_threshold: u8,
    pub dotted_threshold: u8,
    /// White frame added around the plate on the fallback path.
    pub border: u32,
    pub collinear: CollinearTolerance,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            label_padding: 10.0,
            unit_merge_distance: 100.0,
            min_contour_area: 500.0,
            min_noise_area: 10,
            height_padding: 25.0,
            label_clear_weight: 25,
            foreground_threshold: 250,
            dotted_threshold: 200,
            border: 0,
            collinear: CollinearTolerance::default(),
        }
    }
}
