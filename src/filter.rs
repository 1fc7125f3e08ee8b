//! Sorting raw OCR tokens into plate labels and height annotations.

use float_ord::FloatOrd;
use geo::Coord;
use regex::Regex;
use tracing::instrument;

use crate::{
    error::{Result, SegmentError},
    geometry::{axis_aligned_union, quad_center, rect_corners},
    HeightBox, LabelBox, OcrPrediction, Quad,
};

const UNIT_SUFFIX: char = 'm';

/// Keeps the predictions that read as one of `labels`, pads their right and
/// bottom edges by `padding` and sorts them by label.
///
/// A token is a label when it is exactly one expected letter, or when it starts
/// with one and its second character is not `m`. Matching ignores case. Only
/// the first box per letter survives. With `strict`, any difference between the
/// number of distinct labels found and `labels.len()` is an error; otherwise it
/// is logged and missing labels end up with empty regions.
#[instrument(level = "debug", skip(predictions))]
pub fn filter_labels(
    predictions: &[OcrPrediction],
    labels: &[char],
    padding: f32,
    strict: bool,
) -> Result<Vec<LabelBox>> {
    let mut accepted = predictions
        .iter()
        .filter_map(|prediction| {
            let mut chars = prediction.text.chars();
            let label = chars.next()?.to_ascii_uppercase();
            if !labels.contains(&label) {
                return None;
            }
            match chars.next() {
                Some(second) if second == UNIT_SUFFIX => None,
                _ => Some(LabelBox {
                    label,
                    quad: pad_label_quad(&prediction.quad, padding),
                }),
            }
        })
        .collect::<Vec<_>>();
    accepted.sort_by_key(|it| it.label);
    accepted.dedup_by_key(|it| it.label);

    if accepted.len() != labels.len() {
        if strict {
            return Err(SegmentError::LabelCount {
                expected: labels.len(),
                found: accepted.len(),
            });
        }
        log::warn!(
            "Expected {} label(s) but OCR found {}; continuing with what was found.",
            labels.len(),
            accepted.len()
        );
    }
    Ok(accepted)
}

/// Pushes the two right-most vertices right and the two bottom-most vertices
/// down; OCR tends to crop single letters tightly on those sides.
pub(crate) fn pad_label_quad(quad: &Quad, padding: f32) -> Quad {
    let mut padded = *quad;
    for index in extreme_two(quad, |c| c.x) {
        padded[index].x += padding;
    }
    for index in extreme_two(quad, |c| c.y) {
        padded[index].y += padding;
    }
    padded
}

/// Grows a height box to the left so the scale bar next to it is covered.
pub(crate) fn pad_height_quad(quad: &Quad, padding: f32) -> Quad {
    let mut padded = *quad;
    for index in extreme_two(quad, |c| -c.x) {
        padded[index].x -= padding;
    }
    padded
}

/// Indices of the two corners with the largest `key`.
fn extreme_two(quad: &Quad, key: impl Fn(&Coord<f32>) -> f32) -> [usize; 2] {
    let mut order = [0, 1, 2, 3];
    order.sort_by_key(|i| FloatOrd(key(&quad[*i])));
    [order[2], order[3]]
}

/// Collects height annotations. Tokens matching `unit_pattern` are units,
/// all-digit tokens are numbers. Each unit is joined with the nearest number
/// whose box centre is closer than `max_distance`, giving a box covering both
/// and the text `"<number> <unit>"`. Units without a close number are kept on
/// their own.
#[instrument(level = "debug", skip(predictions))]
pub fn filter_heights(
    predictions: &[OcrPrediction],
    unit_pattern: &Regex,
    max_distance: f32,
) -> Vec<HeightBox> {
    let (units, digits): (Vec<_>, Vec<_>) = predictions
        .iter()
        .filter(|it| unit_pattern.is_match(&it.text) || is_number(&it.text))
        .partition(|it| unit_pattern.is_match(&it.text));

    units
        .into_iter()
        .map(|unit| {
            let center = quad_center(&unit.quad);
            let nearest = digits
                .iter()
                .map(|digit| {
                    let delta = center - quad_center(&digit.quad);
                    (digit, delta.x.hypot(delta.y))
                })
                .min_by_key(|(_, distance)| FloatOrd(*distance))
                .filter(|(_, distance)| *distance < max_distance);

            match nearest {
                Some((digit, _)) => {
                    let corners = unit.quad.iter().chain(digit.quad.iter()).copied();
                    let bounds = axis_aligned_union(&corners.collect::<Vec<_>>())
                        .map(|it| rect_corners(&it))
                        .unwrap_or(unit.quad);
                    HeightBox {
                        text: format!("{} {}", digit.text, unit.text),
                        quad: bounds,
                    }
                }
                None => HeightBox {
                    text: unit.text.clone(),
                    quad: unit.quad,
                },
            }
        })
        .collect()
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}
