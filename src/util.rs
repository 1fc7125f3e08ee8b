use std::collections::HashMap;

use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::{
    contours::{find_contours, BorderType},
    contrast::{threshold, ThresholdType},
    distance_transform::Norm,
    drawing::{draw_filled_rect_mut, draw_polygon_mut, Canvas},
    morphology::dilate,
    point::Point,
    rect::Rect,
    region_labelling::{connected_components, Connectivity},
};
use tracing::instrument;

use crate::{
    geometry::{self, Contour},
    Quad,
};

pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Grayscale then inverse threshold: anything at or below `level` becomes
/// foreground (255).
pub fn binarize(image: &RgbImage, level: u8) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    threshold(&gray, level, ThresholdType::BinaryInverted)
}

/// Outer boundaries of top-level components, skipping holes and anything
/// nested inside a hole. Only contours enclosing more than `min_area` are
/// kept.
#[instrument(level = "trace", skip(mask))]
pub fn external_contours(mask: &GrayImage, min_area: f32) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|it| it.border_type == BorderType::Outer && it.parent.is_none())
        .filter_map(|it| Contour::new(it.points).ok())
        .filter(|it| it.area() > min_area)
        .collect()
}

/// Every contour point of the foreground, holes included.
pub(crate) fn all_contour_points(mask: &GrayImage) -> Vec<geo::Coord<f32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .flat_map(|it| it.points)
        .map(|p| geo::Coord {
            x: p.x as f32,
            y: p.y as f32,
        })
        .collect()
}

/// Shoelace area, 0 for fewer than three points.
pub fn contour_area(points: &[Point<i32>]) -> f32 {
    use geo::Area;

    if points.len() < 3 {
        return 0.0;
    }
    geometry::to_geo_poly(points).unsigned_area()
}

/// Paints the filled polygon, boundary pixels included. Degenerate one or
/// two point outlines only set their own pixels.
pub fn fill_contour<C: Canvas>(canvas: &mut C, points: &[Point<i32>], color: C::Pixel) {
    let mut polygon = points.to_vec();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        draw_polygon_mut(canvas, &polygon, color);
    }
    let (width, height) = canvas.dimensions();
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            canvas.draw_pixel(p.x as u32, p.y as u32, color);
        }
    }
}

pub fn fill_quad<C: Canvas>(canvas: &mut C, quad: &Quad, color: C::Pixel) {
    let points = quad
        .iter()
        .map(|c| Point::new(c.x as i32, c.y as i32))
        .collect::<Vec<_>>();
    fill_contour(canvas, &points, color);
}

/// Dilation with a square `(2r+1)x(2r+1)` kernel.
pub fn dilate_rect(mask: &GrayImage, radius: u8) -> GrayImage {
    dilate(mask, Norm::LInf, radius)
}

/// `first - second`, clamped at 0.
pub fn subtract(first: &GrayImage, second: &GrayImage) -> GrayImage {
    let mut out = first.clone();
    for (o, s) in out.pixels_mut().zip(second.pixels()) {
        o.0[0] = o.0[0].saturating_sub(s.0[0]);
    }
    out
}

pub fn subtract_mut(first: &mut GrayImage, second: &GrayImage) {
    for (o, s) in first.pixels_mut().zip(second.pixels()) {
        o.0[0] = o.0[0].saturating_sub(s.0[0]);
    }
}

/// Keeps the colour of `image` where `mask` is set, black elsewhere.
pub fn mask_image(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] > 0 {
            *image.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

pub fn or_images(first: &RgbImage, second: &RgbImage) -> RgbImage {
    let mut out = first.clone();
    for (o, s) in out.pixels_mut().zip(second.pixels()) {
        *o = o.map2(s, |a, b| a | b);
    }
    out
}

/// Replaces the 4-connected run of pixels exactly matching the seed colour.
pub fn flood_fill(image: &mut RgbImage, seed: (u32, u32), color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if seed.0 >= width || seed.1 >= height {
        return;
    }
    let target = *image.get_pixel(seed.0, seed.1);
    if target == color {
        return;
    }
    let mut stack = vec![seed];
    while let Some((x, y)) = stack.pop() {
        if *image.get_pixel(x, y) != target {
            continue;
        }
        image.put_pixel(x, y, color);
        if x > 0 {
            stack.push((x - 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }
}

/// Drops 8-connected foreground components smaller than `min_area` pixels.
pub fn remove_point_noise(mask: &GrayImage, min_area: u32) -> GrayImage {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut sizes = HashMap::<u32, u32>::new();
    for pixel in labels.pixels() {
        if pixel.0[0] != 0 {
            *sizes.entry(pixel.0[0]).or_default() += 1;
        }
    }
    ImageBuffer::from_fn(mask.width(), mask.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        match sizes.get(&label) {
            Some(size) if label != 0 && *size >= min_area => Luma([255]),
            _ => Luma([0]),
        }
    })
}

/// Whitens the axis-aligned box around each quad, grown by `weight` pixels.
pub fn clear_around_boxes(image: &mut RgbImage, quads: &[Quad], weight: i32) {
    for quad in quads {
        let Some(bounds) = geometry::axis_aligned_union(quad) else {
            continue;
        };
        let left = bounds.min().x as i32 - weight;
        let top = bounds.min().y as i32 - weight;
        let right = bounds.max().x as i32 + weight;
        let bottom = bounds.max().y as i32 + weight;
        let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_filled_rect_mut(image, rect, WHITE);
    }
}

pub fn add_border(image: &RgbImage, border: u32) -> RgbImage {
    let mut out = RgbImage::from_pixel(
        image.width() + 2 * border,
        image.height() + 2 * border,
        WHITE,
    );
    image::imageops::replace(&mut out, image, border as i64, border as i64);
    out
}

pub fn remove_border(image: &RgbImage, border: u32) -> RgbImage {
    let width = image.width().saturating_sub(2 * border);
    let height = image.height().saturating_sub(2 * border);
    image::imageops::crop_imm(image, border, border, width, height).to_image()
}
