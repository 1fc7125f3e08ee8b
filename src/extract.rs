//! Turning regions into cropped plate images, for both the labelled path and
//! the unlabelled largest-blob-first fallback.

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::{
    contours::{find_contours, BorderType},
    point::Point,
};
use tracing::instrument;

use crate::{
    error::{Result, SegmentError},
    geometry::axis_aligned_union,
    grid::{merge_collinear, segment_rects},
    labels_for,
    util::{
        add_border, binarize, contour_area, dilate_rect, fill_contour, fill_quad, flood_fill,
        mask_image, or_images, remove_border, subtract, subtract_mut, WHITE,
    },
    LabelRegions, Region, RegionMember, Segment, SegmentOptions, Segmentation,
};

/// Radius of the square kernel that closes small gaps before compositing.
const GROW_RADIUS: u8 = 3;

/// Copy of `image` where everything away from `footprint` is white.
///
/// The footprint is dilated, used to mask the plate, and the black surround
/// reachable from the top-left corner is flood-filled white before OR-ing
/// back onto the plate. Both are framed in white wider than the dilation
/// first, so the seed is always surround even when a blob touches the corner.
pub fn cut_out(image: &RgbImage, footprint: &GrayImage) -> RgbImage {
    let margin = u32::from(GROW_RADIUS) + 1;
    let framed = add_border(image, margin);
    let mut frame = GrayImage::new(framed.width(), framed.height());
    imageops::replace(&mut frame, footprint, i64::from(margin), i64::from(margin));

    let grown = dilate_rect(&frame, GROW_RADIUS);
    let mut blob = mask_image(&framed, &grown);
    flood_fill(&mut blob, (0, 0), WHITE);
    remove_border(&or_images(&framed, &blob), margin)
}

/// Foreground pixels of `mask` covered by the members of `region`.
pub fn region_footprint(mask: &GrayImage, region: &Region) -> GrayImage {
    let mut painted = mask.clone();
    for member in &region.members {
        match member {
            RegionMember::Contour { contour, .. } => {
                fill_contour(&mut painted, &contour.points, Luma([0]))
            }
            RegionMember::LabelBox(quad) => fill_quad(&mut painted, quad, Luma([0])),
        }
    }
    if let Some(quad) = &region.height {
        fill_quad(&mut painted, quad, Luma([0]));
    }
    subtract(mask, &painted)
}

/// One image per entry of `labels`, in that order. Pixels handed to an earlier
/// label are no longer available to later ones; labels without a region come
/// out blank.
#[instrument(level = "debug", skip_all, fields(labels = labels.len()))]
pub fn extract_labelled(
    image: &RgbImage,
    mask: &GrayImage,
    labels: &[char],
    regions: &LabelRegions,
) -> Vec<Segment> {
    let empty = Region::default();
    let mut remaining = mask.clone();
    labels
        .iter()
        .map(|label| {
            let region = regions.get(label).unwrap_or(&empty);
            let footprint = region_footprint(&remaining, region);
            subtract_mut(&mut remaining, &footprint);
            Segment {
                label: *label,
                image: cut_out(image, &footprint),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Extracted,
    Done,
}

/// Running state of the fallback extractor: the foreground not yet claimed
/// and the region images produced so far.
#[derive(Debug, Clone)]
pub struct ExtractionState {
    mask: GrayImage,
    regions: Vec<RgbImage>,
    iterations: usize,
}

impl ExtractionState {
    pub fn new(mask: GrayImage) -> Self {
        Self {
            mask,
            regions: Vec::new(),
            iterations: 0,
        }
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn regions(&self) -> &[RgbImage] {
        &self.regions
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn into_regions(self) -> Vec<RgbImage> {
        self.regions
    }

    /// Outline of the largest remaining blob, if its area reaches `min_area`.
    pub fn scan(&self, min_area: f32) -> Option<Vec<Point<i32>>> {
        let (points, area) = find_contours::<i32>(&self.mask)
            .into_iter()
            .filter(|it| it.border_type == BorderType::Outer)
            .map(|it| {
                let area = contour_area(&it.points);
                (it.points, area)
            })
            // first of equally large blobs wins
            .fold(None, |best: Option<(Vec<Point<i32>>, f32)>, candidate| match best {
                Some(best) if best.1 >= candidate.1 => Some(best),
                _ => Some(candidate),
            })?;
        log::trace!("Largest remaining blob has area {area}");
        (area >= min_area).then_some(points)
    }

    /// Cuts the blob outlined by `outline` out of `image` and removes it from
    /// the running mask.
    pub fn extract(&mut self, image: &RgbImage, outline: &[Point<i32>]) {
        let mut painted = self.mask.clone();
        fill_contour(&mut painted, outline, Luma([0]));
        let footprint = subtract(&self.mask, &painted);

        self.regions.push(cut_out(image, &footprint));
        subtract_mut(&mut self.mask, &footprint);
        self.iterations += 1;
    }

    /// One scan, followed by an extraction when a large enough blob is left.
    pub fn step(&mut self, image: &RgbImage, min_area: f32) -> Step {
        match self.scan(min_area) {
            Some(outline) => {
                self.extract(image, &outline);
                Step::Extracted
            }
            None => Step::Done,
        }
    }
}

/// Unlabelled path: peels off the largest blob until only specks below
/// `options.min_contour_area` remain, optionally merges collinear pieces and
/// labels the results in reading order: rows top to bottom, left to right
/// within a row.
///
/// Stopping at `max_iterations` with blobs still left yields
/// [`SegmentError::ExtractionIncomplete`] carrying the partial result.
#[instrument(level = "debug", skip(image, options))]
pub fn extract_fallback(
    image: &RgbImage,
    options: &SegmentOptions,
    max_iterations: usize,
    merge: bool,
) -> Result<Segmentation> {
    let padded = if options.border > 0 {
        add_border(image, options.border)
    } else {
        image.clone()
    };

    let mut state = ExtractionState::new(binarize(&padded, options.foreground_threshold));
    let mut complete = false;
    while state.iterations() < max_iterations {
        if state.step(&padded, options.min_contour_area) == Step::Done {
            complete = true;
            break;
        }
    }
    if !complete {
        complete = state.scan(options.min_contour_area).is_none();
    }
    let iterations = state.iterations();
    log::debug!("Fallback extraction produced {iterations} region(s)");

    let mut regions = state.into_regions();
    if options.border > 0 {
        regions = regions
            .iter()
            .map(|it| remove_border(it, options.border))
            .collect();
    }

    let segments = in_reading_order(regions, options, merge)?;
    let segmentation = Segmentation {
        segments,
        partial: !complete,
    };
    if complete {
        Ok(segmentation)
    } else {
        Err(SegmentError::ExtractionIncomplete {
            iterations,
            partial: segmentation,
        })
    }
}

fn in_reading_order(
    regions: Vec<RgbImage>,
    options: &SegmentOptions,
    merge: bool,
) -> Result<Vec<Segment>> {
    let mut rects = segment_rects(&regions, options.foreground_threshold)?;
    let mut regions = regions;
    if merge {
        (rects, regions) = merge_collinear(rects, regions, options.collinear)?;
    }

    let mut placed = rects
        .iter()
        .map(|rect| {
            let corners = rect.corners();
            let bounds = axis_aligned_union(&corners).unwrap_or_else(|| {
                geo::Rect::new(rect.center, rect.center)
            });
            // snap to the pixel grid so hull noise cannot reorder ties
            [bounds.min().x, bounds.min().y, bounds.max().y].map(|it| it.round() as i32)
        })
        .zip(regions)
        .collect::<Vec<_>>();
    placed.sort_by_key(|([left, top, _], _)| (*top, *left));

    // a blob starting above the bottom of a row's first blob belongs to that row
    let mut rows: Vec<(i32, Vec<_>)> = Vec::new();
    for ([left, top, bottom], image) in placed {
        match rows.last_mut() {
            Some((row_bottom, row)) if top <= *row_bottom => row.push((left, image)),
            _ => rows.push((bottom, vec![(left, image)])),
        }
    }

    let ordered = rows
        .into_iter()
        .flat_map(|(_, mut row)| {
            row.sort_by_key(|(left, _)| *left);
            row.into_iter().map(|(_, image)| image)
        })
        .collect::<Vec<_>>();
    Ok(labels_for(ordered.len())
        .into_iter()
        .zip(ordered)
        .map(|(label, image)| Segment { label, image })
        .collect())
}
