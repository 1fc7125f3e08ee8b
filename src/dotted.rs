//! Dotted leader lines: faint dashes joining a small callout to its main
//! illustration that neither OCR nor contour extraction picks up.

use float_ord::FloatOrd;
use image::RgbImage;
use ndarray::Array2;
use tracing::instrument;

use crate::{
    geometry::Contour,
    util::{
        binarize, clear_around_boxes, dilate_rect, external_contours, fill_contour,
        remove_point_noise, WHITE,
    },
    LabelBox, SegmentOptions,
};

/// Kernel radius used to bridge the gaps between dots.
const BRIDGE_RADIUS: u8 = 2;

/// Two contours joined by a dotted line. `main` is the larger of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DottedPair {
    pub main: usize,
    pub sub: usize,
}

/// Finds dotted lines in `residual`, the plate with every explained region
/// already whitened.
///
/// The largest leftover shape (usually a signature or frame) and the
/// surroundings of every label box are cleared first. What remains is
/// thresholded, stripped of specks and dilated so the dots fuse into one blob
/// per line.
#[instrument(level = "debug", skip_all)]
pub fn detect_dotted_lines(
    residual: &RgbImage,
    label_boxes: &[LabelBox],
    options: &SegmentOptions,
) -> Vec<Contour> {
    let mut residual = residual.clone();

    let leftovers = binarize(&residual, options.foreground_threshold);
    if let Some(frame) = external_contours(&leftovers, 0.0)
        .into_iter()
        .max_by_key(|it| FloatOrd(it.area()))
    {
        log::trace!("Clearing leftover shape of area {}", frame.area());
        fill_contour(&mut residual, &frame.points, WHITE);
    }

    let quads = label_boxes.iter().map(|it| it.quad).collect::<Vec<_>>();
    clear_around_boxes(&mut residual, &quads, options.label_clear_weight);

    let binary = binarize(&residual, options.dotted_threshold);
    let binary = remove_point_noise(&binary, options.min_noise_area);
    let bridged = dilate_rect(&binary, BRIDGE_RADIUS);

    let lines = external_contours(&bridged, 0.0);
    log::debug!("Found {} dotted line candidate(s)", lines.len());
    lines
}

/// For every dotted line, pairs the two contours whose centres lie closest to
/// the line's centre. The larger contour takes the `main` slot; equal areas
/// fall back to the lower index.
#[instrument(level = "debug", skip_all, fields(contours = contours.len(), lines = lines.len()))]
pub fn pair_by_dotted_line(contours: &[Contour], lines: &[Contour]) -> Vec<DottedPair> {
    if contours.len() < 2 {
        return Vec::new();
    }

    let centers = contours.iter().map(Contour::center).collect::<Vec<_>>();
    let distances = Array2::from_shape_fn((lines.len(), contours.len()), |(row, col)| {
        let delta = lines[row].center() - centers[col];
        delta.x.hypot(delta.y)
    });

    let mut pairs = distances
        .rows()
        .into_iter()
        .map(|row| {
            let mut order = (0..contours.len()).collect::<Vec<_>>();
            order.sort_by_key(|it| FloatOrd(row[*it]));
            let (first, second) = (order[0], order[1]);
            let first_key = (FloatOrd(contours[first].area()), std::cmp::Reverse(first));
            let second_key = (FloatOrd(contours[second].area()), std::cmp::Reverse(second));
            if first_key >= second_key {
                DottedPair {
                    main: first,
                    sub: second,
                }
            } else {
                DottedPair {
                    main: second,
                    sub: first,
                }
            }
        })
        .collect::<Vec<_>>();
    pairs.sort_by_key(|it| (it.main, it.sub));
    pairs.dedup();
    pairs
}
