//! Merging of sub-illustrations that a gap split into side-by-side pieces,
//! for plain grid plates without OCR labels.

use image::{ImageBuffer, Pixel, RgbImage};
use tracing::instrument;

use crate::{
    components::connected_components,
    error::GeometryError,
    geometry::{merge_rects, minimum_area_rect, RotatedRect},
    util::{all_contour_points, binarize},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollinearTolerance {
    /// Degrees a rectangle may lean away from the axes.
    pub angle: f32,
    /// Largest gap, in pixels, between facing edges on either axis.
    pub distance: f32,
    /// Allowed relative area difference, unless the gap is tiny.
    pub area: f32,
}

impl Default for CollinearTolerance {
    fn default() -> Self {
        Self {
            angle: 2.0,
            distance: 100.0,
            area: 0.2,
        }
    }
}

/// Minimum-area rectangle around the foreground of each segment image.
pub fn segment_rects(
    segments: &[RgbImage],
    foreground_threshold: u8,
) -> Result<Vec<RotatedRect>, GeometryError> {
    segments
        .iter()
        .map(|segment| {
            let points = all_contour_points(&binarize(segment, foreground_threshold));
            minimum_area_rect(&points)
        })
        .collect()
}

/// Folds an angle onto `[0, 45]`, measured against the nearest axis.
pub fn angle_to_zero(angle: f32) -> f32 {
    if angle > 45.0 {
        (90.0 - angle).abs()
    } else {
        angle
    }
}

/// Half the extent of `rect` along the image x axis.
fn half_width(rect: &RotatedRect) -> f32 {
    if rect.angle < (90.0 - rect.angle).abs() {
        rect.size.0 / 2.0
    } else {
        rect.size.1 / 2.0
    }
}

/// Links near-axis-aligned rectangles whose facing left/right edges are close
/// and whose areas are similar, then merges every linked group into a single
/// rectangle and a single overlaid segment image. Unlinked entries pass
/// through untouched, in their original order.
#[instrument(level = "debug", skip_all, fields(rects = rects.len()))]
pub fn merge_collinear(
    rects: Vec<RotatedRect>,
    segments: Vec<RgbImage>,
    tolerance: CollinearTolerance,
) -> Result<(Vec<RotatedRect>, Vec<RgbImage>), GeometryError> {
    let max_ratio = 1.0 + tolerance.area;
    let min_ratio = 1.0 / max_ratio;

    let mut edges = Vec::new();
    for (i, rect) in rects.iter().enumerate() {
        let angle = angle_to_zero(rect.angle);
        for (j, other) in rects.iter().enumerate().skip(i + 1) {
            let other_angle = angle_to_zero(other.angle);
            if (angle - other_angle).abs() > 2.0 * tolerance.angle
                || (angle < 90.0 - tolerance.angle && angle > tolerance.angle)
            {
                continue;
            }

            let (edge, other_edge) = if rect.center.x < other.center.x {
                (
                    rect.center.x + half_width(rect),
                    other.center.x - half_width(other),
                )
            } else {
                (
                    rect.center.x - half_width(rect),
                    other.center.x + half_width(other),
                )
            };
            let distance_x = (edge - other_edge).abs();
            let distance_y = (rect.center.y - other.center.y).abs();
            if distance_x > tolerance.distance || distance_y > tolerance.distance {
                continue;
            }

            let ratio = rect.area() / other.area();
            let tiny_gap = tolerance.distance / 10.0;
            if (ratio > max_ratio || ratio < min_ratio)
                && (distance_x > tiny_gap || distance_y > tiny_gap)
            {
                continue;
            }
            edges.push((i, j));
        }
    }

    if edges.is_empty() {
        return Ok((rects, segments));
    }
    log::debug!("Merging collinear rectangles along {edges:?}");

    let mut merged_rects = Vec::new();
    let mut merged_segments = Vec::new();
    for component in connected_components(&edges, rects.len()) {
        if let [single] = component.as_slice() {
            merged_rects.push(rects[*single]);
            merged_segments.push(segments[*single].clone());
            continue;
        }
        let group = component.iter().map(|it| rects[*it]).collect::<Vec<_>>();
        merged_rects.push(merge_rects(&group)?);
        let group = component
            .iter()
            .map(|it| &segments[*it])
            .collect::<Vec<_>>();
        merged_segments.push(merge_segments(&group));
    }
    Ok((merged_rects, merged_segments))
}

/// Overlays the dark content of every segment on one white canvas. Expects
/// non-overlapping segments of equal size.
pub fn merge_segments(segments: &[&RgbImage]) -> RgbImage {
    let Some(first) = segments.first() else {
        return RgbImage::new(0, 0);
    };
    ImageBuffer::from_fn(first.width(), first.height(), |x, y| {
        let ink = segments.iter().fold(first.get_pixel(x, y).map(|_| 0u8), |acc, it| {
            acc.map2(it.get_pixel(x, y), |a, b| a.saturating_add(255 - b))
        });
        ink.map(|it| 255 - it)
    })
}
