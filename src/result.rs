use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use geo::Coord;
use image::RgbImage;

use crate::{error::Result, geometry::Contour};

/// Four ordered corners of an OCR box.
pub type Quad = [Coord<f32>; 4];

/// One recognised token from the external OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrPrediction {
    pub text: String,
    pub quad: Quad,
}

impl OcrPrediction {
    pub fn new(text: impl Into<String>, quad: [(f32, f32); 4]) -> Self {
        Self {
            text: text.into(),
            quad: quad.map(|(x, y)| Coord { x, y }),
        }
    }

    /// Convenience for axis-aligned boxes, corners clockwise from top-left.
    pub fn from_rect(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(
            text,
            [
                (x, y),
                (x + width, y),
                (x + width, y + height),
                (x, y + height),
            ],
        )
    }
}

/// A padded OCR box whose text was accepted as a plate label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBox {
    pub label: char,
    pub quad: Quad,
}

/// A height or scale-bar annotation such as `"5 mm"`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightBox {
    pub text: String,
    pub quad: Quad,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionMember {
    Contour { index: usize, contour: Contour },
    /// The label's own text box; painted into the mask even though it is not
    /// artwork.
    LabelBox(Quad),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    pub members: Vec<RegionMember>,
    pub height: Option<Quad>,
}

impl Region {
    pub fn contour_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().filter_map(|member| match member {
            RegionMember::Contour { index, .. } => Some(*index),
            RegionMember::LabelBox(_) => None,
        })
    }
}

pub type LabelRegions = BTreeMap<char, Region>;

/// One cropped sub-illustration, same size as the source plate.
#[derive(Debug, Clone)]
pub struct Segment {
    pub label: char,
    pub image: RgbImage,
}

#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    /// Set when extraction stopped at the iteration cap.
    pub partial: bool,
}

impl Segmentation {
    pub fn labels(&self) -> Vec<char> {
        self.segments.iter().map(|it| it.label).collect()
    }

    /// Writes every segment into `dir` as
    /// `<source stem>-<LABEL>.<source ext>`.
    pub fn save_all(&self, dir: &Path, source: &Path) -> Result<Vec<PathBuf>> {
        let base = source
            .file_stem()
            .map(|it| it.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|it| it.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        std::fs::create_dir_all(dir)?;
        self.segments
            .iter()
            .map(|segment| {
                let path = dir.join(output_name(&base, segment.label, &ext));
                segment.image.save(&path)?;
                log::debug!("Wrote segment {}", path.display());
                Ok(path)
            })
            .collect()
    }
}

pub fn output_name(base: &str, label: char, ext: &str) -> String {
    format!("{base}-{}.{ext}", label.to_ascii_uppercase())
}

/// Contiguous labels `A, B, ...` for a plate with `count` sub-illustrations.
pub fn labels_for(count: usize) -> Vec<char> {
    if count > 26 {
        log::warn!("Plate claims {count} labels, only A-Z are supported.");
    }
    ('A'..='Z').take(count).collect()
}
