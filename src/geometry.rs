//! Rotated rectangles, contours and the asymmetric predicates the label
//! assignment relies on.

use geo::{
    Area, BoundingRect, Coord, EuclideanDistance, Intersects, LineString, MinimumRotatedRect,
    MultiPoint, Point as GeoPoint, Polygon, Rect,
};
use imageproc::point::Point;

use crate::{error::GeometryError, Quad};

/// Rectangle at an arbitrary angle. `angle` is in degrees within `[0, 90)`
/// and `size` is measured along the rectangle's own axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Coord<f32>,
    pub size: (f32, f32),
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: Coord<f32>, size: (f32, f32), angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    pub fn area(&self) -> f32 {
        self.size.0 * self.size.1
    }

    /// Corners in winding order, starting from the one opposite both axes.
    pub fn corners(&self) -> Quad {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (half_w, half_h) = (self.size.0 / 2.0, self.size.1 / 2.0);
        let along = Coord {
            x: cos * half_w,
            y: sin * half_w,
        };
        let across = Coord {
            x: -sin * half_h,
            y: cos * half_h,
        };
        let c = self.center;
        [
            c - along - across,
            c + along - across,
            c + along + across,
            c - along + across,
        ]
    }

    pub fn to_polygon(&self) -> Polygon<f32> {
        quad_polygon(&self.corners())
    }

    /// Reads a rectangle back out of the four-corner polygon produced by
    /// [`MinimumRotatedRect`].
    pub fn from_polygon(rect: &Polygon<f32>) -> Result<Self, GeometryError> {
        let coords = rect.exterior().coords().take(4).copied().collect::<Vec<_>>();
        if coords.len() < 4 {
            return Err(GeometryError::TooFewPoints(coords.len()));
        }
        let first = coords[1] - coords[0];
        let second = coords[2] - coords[1];
        let first_len = first.x.hypot(first.y);
        let second_len = second.x.hypot(second.y);
        if first_len * second_len <= f32::EPSILON {
            return Err(GeometryError::ZeroArea);
        }

        let mut angle = first.y.atan2(first.x).to_degrees().rem_euclid(180.0);
        let mut size = (first_len, second_len);
        if angle >= 90.0 {
            angle -= 90.0;
            size = (second_len, first_len);
        }
        // float noise from the hull can leave an axis-aligned box at 89.9999
        if 90.0 - angle < 1e-3 {
            angle = 0.0;
            size = (size.1, size.0);
        }

        let center = coords.iter().fold(Coord::zero(), |acc, c| acc + *c) / 4.0;
        Ok(Self::new(center, size, angle))
    }
}

/// Closed boundary of one foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
    area: f32,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Result<Self, GeometryError> {
        if points.len() < 3 {
            return Err(GeometryError::TooFewPoints(points.len()));
        }
        let area = to_geo_poly(&points).unsigned_area();
        if area <= 0.0 {
            return Err(GeometryError::ZeroArea);
        }
        Ok(Self { points, area })
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn polygon(&self) -> Polygon<f32> {
        to_geo_poly(&self.points)
    }

    /// Mean of the boundary points.
    pub fn center(&self) -> Coord<f32> {
        let sum = self.points.iter().fold(Coord::zero(), |acc, p| {
            acc + Coord {
                x: p.x as f32,
                y: p.y as f32,
            }
        });
        sum / self.points.len() as f32
    }

    /// Distance from `point` to the nearest edge, or 0 when the point lies
    /// inside the contour.
    pub fn distance_to(&self, point: Coord<f32>) -> f32 {
        GeoPoint::from(point).euclidean_distance(&self.polygon())
    }
}

pub(crate) fn to_geo_poly(points: &[Point<i32>]) -> Polygon<f32> {
    let points = points
        .iter()
        .map(|point| Coord {
            x: point.x as f32,
            y: point.y as f32,
        })
        .collect();
    Polygon::new(LineString::new(points), vec![])
}

pub fn quad_polygon(quad: &Quad) -> Polygon<f32> {
    Polygon::new(LineString::new(quad.to_vec()), vec![])
}

pub fn quad_center(quad: &Quad) -> Coord<f32> {
    quad.iter().fold(Coord::zero(), |acc, c| acc + *c) / 4.0
}

/// Smallest rectangle, at any angle, containing every point.
pub fn minimum_area_rect(points: &[Coord<f32>]) -> Result<RotatedRect, GeometryError> {
    if points.len() < 3 {
        return Err(GeometryError::TooFewPoints(points.len()));
    }
    let rect = MultiPoint::from(points.to_vec())
        .minimum_rotated_rect()
        .ok_or(GeometryError::ZeroArea)?;
    RotatedRect::from_polygon(&rect)
}

/// Re-minimises over the corners of all `rects`, so the result keeps its own
/// optimal angle instead of being an axis-aligned union.
pub fn merge_rects(rects: &[RotatedRect]) -> Result<RotatedRect, GeometryError> {
    let corners = rects
        .iter()
        .flat_map(|rect| rect.corners())
        .collect::<Vec<_>>();
    minimum_area_rect(&corners)
}

/// Axis-aligned bounding box of a point cloud, `None` when empty.
pub fn axis_aligned_union(points: &[Coord<f32>]) -> Option<Rect<f32>> {
    MultiPoint::from(points.to_vec()).bounding_rect()
}

pub fn rect_corners(rect: &Rect<f32>) -> Quad {
    let (min, max) = (rect.min(), rect.max());
    [
        min,
        Coord { x: max.x, y: min.y },
        max,
        Coord { x: min.x, y: max.y },
    ]
}

/// True when any vertex of `second` lies inside or on the boundary of
/// `first`.
///
/// Not symmetric: if `first` sits entirely inside `second`, none of
/// `second`'s vertices touch `first` and this returns `false`. Test both
/// directions and compare areas when containment matters.
pub fn rects_intersect(first: &Quad, second: &Quad) -> bool {
    let first = quad_polygon(first);
    second.iter().any(|vertex| first.intersects(vertex))
}
