//! Visual aids: distinguishable colours, outlines and residual images.

use image::{ImageBuffer, Pixel, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::{geometry::Contour, util::or_images, RotatedRect};

/// Channel walked on each face of the colour cube and whether it rises.
const FACES: [(usize, bool); 6] = [
    (1, true),
    (0, false),
    (2, true),
    (1, false),
    (0, true),
    (2, false),
];

/// `n` colours stepping around the hue loop of the RGB cube: red, yellow,
/// green, cyan, blue, magenta and back. Each of the six faces is split into
/// enough steps to keep up to 1530 colours distinct.
pub fn rainbow_sequence(n: usize) -> Vec<Rgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    let steps = ((n + FACES.len() - 1) / FACES.len()).clamp(1, 255);
    let level = |step: usize| (step * 255 / steps) as u8;

    let mut rgb = [255, 0, 0];
    let mut colors = Vec::with_capacity(FACES.len() * steps);
    for (channel, rising) in FACES {
        for step in 0..steps {
            rgb[channel] = if rising { level(step) } else { level(steps - step) };
            colors.push(Rgb(rgb));
        }
        rgb[channel] = if rising { 255 } else { 0 };
    }
    colors.into_iter().cycle().take(n).collect()
}

/// Outlines every rectangle in its own colour.
pub fn draw_rects(image: &RgbImage, rects: &[RotatedRect]) -> RgbImage {
    let mut canvas = image.clone();
    for (rect, color) in rects.iter().zip(rainbow_sequence(rects.len())) {
        let corners = rect.corners();
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x, b.y), color);
        }
    }
    canvas
}

/// Outlines every contour in its own colour.
pub fn draw_contours(image: &RgbImage, contours: &[Contour]) -> RgbImage {
    let mut canvas = image.clone();
    for (contour, color) in contours.iter().zip(rainbow_sequence(contours.len())) {
        let points = &contour.points;
        for i in 0..points.len() {
            let (a, b) = (points[i], points[(i + 1) % points.len()]);
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                color,
            );
        }
    }
    canvas
}

/// `original * alpha + segment * (1 - alpha)`.
pub fn highlight_segment(original: &RgbImage, segment: &RgbImage, alpha: f32) -> RgbImage {
    ImageBuffer::from_fn(original.width(), original.height(), |x, y| {
        original.get_pixel(x, y).map2(segment.get_pixel(x, y), |a, b| {
            (a as f32 * alpha + b as f32 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8
        })
    })
}

/// The plate with every pixel claimed by one of `segments` whitened, faded
/// into the original by `alpha`. With `alpha = 0` only the unexplained parts
/// remain.
pub fn highlight_missing(original: &RgbImage, segments: &[RgbImage], alpha: f32) -> RgbImage {
    let missing = segments.iter().fold(original.clone(), |acc, segment| {
        let mut inverted = segment.clone();
        image::imageops::invert(&mut inverted);
        or_images(&acc, &inverted)
    });
    highlight_segment(original, &missing, alpha)
}
