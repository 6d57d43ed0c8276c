//! Minimal planar geometry model.
//!
//! Geometries are carried through the query layer untouched. The only
//! operations the layer needs are envelopes (spatial filtering and extents),
//! area and WKT text for the geometry-derived pseudo-fields.

use crate::numfmt::format_g;
use crate::types::GeometryType;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// A 2D coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Grows this envelope to cover `other`.
    pub fn merge(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Returns true if the two rectangles share at least one point.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Converts the envelope into its rectangle polygon.
    pub fn to_polygon(&self) -> Geometry {
        Geometry::Polygon(alloc::vec![
            Coord::new(self.min_x, self.min_y),
            Coord::new(self.max_x, self.min_y),
            Coord::new(self.max_x, self.max_y),
            Coord::new(self.min_x, self.max_y),
            Coord::new(self.min_x, self.min_y),
        ])
    }
}

/// A feature geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Outer ring only; the ring is expected to be closed.
    Polygon(Vec<Coord>),
}

impl Geometry {
    /// Creates a point geometry.
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point(Coord::new(x, y))
    }

    /// Returns the geometry type.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
        }
    }

    fn coords(&self) -> &[Coord] {
        match self {
            Geometry::Point(c) => core::slice::from_ref(c),
            Geometry::LineString(cs) | Geometry::Polygon(cs) => cs,
        }
    }

    /// Returns the bounding rectangle, or None for an empty geometry.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut coords = self.coords().iter();
        let first = coords.next()?;
        let mut env = Envelope::new(first.x, first.y, first.x, first.y);
        for c in coords {
            env.merge(&Envelope::new(c.x, c.y, c.x, c.y));
        }
        Some(env)
    }

    /// Returns the planar area. Points and line strings have no area.
    pub fn area(&self) -> f64 {
        match self {
            Geometry::Polygon(ring) if ring.len() >= 3 => {
                let mut twice = 0.0;
                for pair in ring.windows(2) {
                    twice += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
                }
                if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
                    if first != last {
                        twice += last.x * first.y - first.x * last.y;
                    }
                }
                libm::fabs(twice) / 2.0
            }
            _ => 0.0,
        }
    }

    /// Renders the geometry as well-known text.
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Point(c) => format!("POINT ({})", coord_text(c)),
            Geometry::LineString(cs) if cs.is_empty() => "LINESTRING EMPTY".into(),
            Geometry::LineString(cs) => format!("LINESTRING ({})", coord_list(cs)),
            Geometry::Polygon(cs) if cs.is_empty() => "POLYGON EMPTY".into(),
            Geometry::Polygon(cs) => format!("POLYGON (({}))", coord_list(cs)),
        }
    }

    /// Envelope-based spatial predicate used by spatial filters.
    pub fn envelope_intersects(&self, other: &Geometry) -> bool {
        match (self.envelope(), other.envelope()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        }
    }
}

fn coord_text(c: &Coord) -> String {
    format!("{} {}", format_g(c.x, 15), format_g(c.y, 15))
}

fn coord_list(cs: &[Coord]) -> String {
    let parts: Vec<String> = cs.iter().map(coord_text).collect();
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn square(size: f64) -> Geometry {
        Envelope::new(0.0, 0.0, size, size).to_polygon()
    }

    #[test]
    fn test_envelope() {
        let line = Geometry::LineString(vec![Coord::new(1.0, 5.0), Coord::new(-2.0, 3.0)]);
        assert_eq!(line.envelope(), Some(Envelope::new(-2.0, 3.0, 1.0, 5.0)));
        assert_eq!(Geometry::LineString(vec![]).envelope(), None);
    }

    #[test]
    fn test_area() {
        assert_eq!(square(2.0).area(), 4.0);
        assert_eq!(Geometry::point(1.0, 1.0).area(), 0.0);
        // open ring is closed implicitly
        let open = Geometry::Polygon(vec![
            Coord::new(0.0, 0.0),
            Coord::new(3.0, 0.0),
            Coord::new(3.0, 1.0),
        ]);
        assert_eq!(open.area(), 1.5);
    }

    #[test]
    fn test_wkt() {
        assert_eq!(Geometry::point(1.5, -2.0).to_wkt(), "POINT (1.5 -2)");
        assert_eq!(
            square(1.0).to_wkt(),
            "POLYGON ((0 0,1 0,1 1,0 1,0 0))"
        );
    }

    #[test]
    fn test_intersects() {
        let a = square(2.0);
        assert!(a.envelope_intersects(&Geometry::point(2.0, 2.0)));
        assert!(!a.envelope_intersects(&Geometry::point(2.5, 0.0)));
    }
}
