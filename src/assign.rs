//! Nearest-label assignment of contours, first come first served.

use float_ord::FloatOrd;
use geo::{Coord, EuclideanDistance, Point as GeoPoint};
use ndarray::{Array2, ArrayView1};
use tracing::instrument;

use crate::{
    dotted::DottedPair,
    filter::pad_height_quad,
    geometry::{quad_center, Contour},
    HeightBox, LabelBox, LabelRegions, RegionMember,
};

/// `centers x contours` matrix of [`Contour::distance_to`]: 0 when the centre
/// lies inside the contour, otherwise the distance to its nearest edge.
pub fn distance_matrix(centers: &[Coord<f32>], contours: &[Contour]) -> Array2<f32> {
    let polygons = contours.iter().map(Contour::polygon).collect::<Vec<_>>();
    Array2::from_shape_fn((centers.len(), contours.len()), |(row, col)| {
        GeoPoint::from(centers[row]).euclidean_distance(&polygons[col])
    })
}

/// First index holding the smallest value.
fn argmin(values: ArrayView1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, value)| FloatOrd(**value))
        .map(|(index, _)| index)
}

/// Index of the contour closest to `point`, `None` without contours.
pub fn nearest_contour(point: Coord<f32>, contours: &[Contour]) -> Option<usize> {
    argmin(distance_matrix(&[point], contours).row(0))
}

/// Gives every contour to the label whose box centre is closest to it.
///
/// Contours are visited in order and never reassigned. When a contour is the
/// main side of a dotted-line pair, its partner joins the same label and is
/// skipped later. Each label also gets its own text box once, including labels
/// that won no contour.
#[instrument(level = "debug", skip_all, fields(contours = contours.len(), labels = label_boxes.len()))]
pub fn assign_contours(
    contours: &[Contour],
    label_boxes: &[LabelBox],
    pairs: &[DottedPair],
) -> LabelRegions {
    let mut regions = LabelRegions::new();
    if label_boxes.is_empty() {
        return regions;
    }

    let centers = label_boxes
        .iter()
        .map(|it| quad_center(&it.quad))
        .collect::<Vec<_>>();
    let distances = distance_matrix(&centers, contours);

    let mut consumed = vec![false; contours.len()];
    let mut box_added = vec![false; label_boxes.len()];
    for (index, contour) in contours.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Some(owner) = argmin(distances.column(index)) else {
            continue;
        };
        let label_box = &label_boxes[owner];
        let region = regions.entry(label_box.label).or_default();

        region.members.push(RegionMember::Contour {
            index,
            contour: contour.clone(),
        });
        consumed[index] = true;

        for pair in pairs.iter().filter(|it| it.main == index) {
            if consumed[pair.sub] {
                continue;
            }
            log::trace!("Contour {} follows {index} along a dotted line", pair.sub);
            region.members.push(RegionMember::Contour {
                index: pair.sub,
                contour: contours[pair.sub].clone(),
            });
            consumed[pair.sub] = true;
        }

        if !box_added[owner] {
            region.members.push(RegionMember::LabelBox(label_box.quad));
            box_added[owner] = true;
        }
    }

    for (label_box, _) in label_boxes
        .iter()
        .zip(box_added)
        .filter(|(_, added)| !added)
    {
        log::debug!("Label {} has no contour of its own", label_box.label);
        regions
            .entry(label_box.label)
            .or_default()
            .members
            .push(RegionMember::LabelBox(label_box.quad));
    }

    regions
}

/// Hands each height box to the label owning the contour nearest to it. A
/// label keeps the first height box it receives.
#[instrument(level = "debug", skip_all, fields(heights = heights.len()))]
pub fn attach_heights(
    regions: &mut LabelRegions,
    contours: &[Contour],
    heights: &[HeightBox],
    padding: f32,
) {
    for height in heights {
        let Some(nearest) = nearest_contour(quad_center(&height.quad), contours) else {
            return;
        };
        let owner = regions
            .iter_mut()
            .find(|(_, region)| region.contour_indices().any(|it| it == nearest));
        match owner {
            Some((_, region)) if region.height.is_none() => {
                region.height = Some(pad_height_quad(&height.quad, padding));
            }
            Some((label, _)) => {
                log::debug!("Label {label} already has a height box, ignoring {:?}", height.text);
            }
            None => log::debug!("Height box {:?} sits next to an unlabelled contour", height.text),
        }
    }
}
