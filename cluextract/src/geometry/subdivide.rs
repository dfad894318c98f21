//! Polygon subdivision strategies.
//!
//! A region is cut into strips across the longer side of its bounding box and
//! clipped to each strip. Strips share their cut lines exactly, so the
//! fragments tile the region: together they cover it, and no two overlap by
//! more than a shared edge.
//!
//! Two strategies are available:
//!
//! - [`EqualAreaSubdivider`]: positions cuts so each fragment holds the same
//!   polygon area (stacked blocks of equal size)
//! - [`GridSubdivider`]: cuts the bounding box into equal-width strips and
//!   intersects them with the region (fishnet and intersect)

use std::fmt;
use std::str::FromStr;

use geo::{coord, Area, BooleanOps, BoundingRect, MultiPolygon, Rect};

/// Number of bisection steps used to place each equal-area cut.
const BISECTION_STEPS: u32 = 48;

/// Relative padding applied to the bounding box before clipping.
///
/// Keeps the outermost strip edges strictly outside the region so vertices on
/// the bounding box are never clipped away by rounding.
const BOUNDS_PADDING: f64 = 1e-9;

/// Fragments smaller than this share of the parent area are discarded.
const MIN_FRAGMENT_SHARE: f64 = 1e-12;

/// Splits a region into fragments that tile it.
pub trait Subdivide: Send + Sync {
    /// Cuts `region` into at most `parts` non-empty fragments.
    ///
    /// Returns the region unchanged (as a single fragment) when it cannot be
    /// cut, for example when `parts < 2` or the region has no extent.
    fn subdivide(&self, region: &MultiPolygon<f64>, parts: usize) -> Vec<MultiPolygon<f64>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Selects a [`Subdivide`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdivisionStrategy {
    /// Equal-area stacked strips.
    #[default]
    EqualArea,
    /// Equal-width strips intersected with the region.
    Grid,
}

impl SubdivisionStrategy {
    /// Creates the subdivider for this strategy.
    pub fn subdivider(&self) -> Box<dyn Subdivide> {
        match self {
            SubdivisionStrategy::EqualArea => Box::new(EqualAreaSubdivider::default()),
            SubdivisionStrategy::Grid => Box::new(GridSubdivider),
        }
    }

    /// Configuration file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubdivisionStrategy::EqualArea => "equal_area",
            SubdivisionStrategy::Grid => "grid",
        }
    }
}

impl fmt::Display for SubdivisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubdivisionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "equal_area" => Ok(SubdivisionStrategy::EqualArea),
            "grid" => Ok(SubdivisionStrategy::Grid),
            other => Err(format!(
                "unknown subdivision strategy '{}' (expected equal_area or grid)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    X,
    Y,
}

/// Bounding box of the region, padded, with the axis to cut along.
struct Frame {
    bounds: Rect<f64>,
    axis: Axis,
}

impl Frame {
    fn of(region: &MultiPolygon<f64>) -> Option<Self> {
        let rect = region.bounding_rect()?;
        let (width, height) = (rect.width(), rect.height());
        if width <= 0.0 && height <= 0.0 {
            return None;
        }

        let pad = width.max(height) * BOUNDS_PADDING;
        let bounds = Rect::new(
            coord! { x: rect.min().x - pad, y: rect.min().y - pad },
            coord! { x: rect.max().x + pad, y: rect.max().y + pad },
        );
        let axis = if width >= height { Axis::X } else { Axis::Y };

        Some(Self { bounds, axis })
    }

    fn start(&self) -> f64 {
        match self.axis {
            Axis::X => self.bounds.min().x,
            Axis::Y => self.bounds.min().y,
        }
    }

    fn end(&self) -> f64 {
        match self.axis {
            Axis::X => self.bounds.max().x,
            Axis::Y => self.bounds.max().y,
        }
    }

    /// Region clipped to the strip between `lo` and `hi` along the cut axis.
    fn clip(&self, region: &MultiPolygon<f64>, lo: f64, hi: f64) -> MultiPolygon<f64> {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        let strip = match self.axis {
            Axis::X => Rect::new(coord! { x: lo, y: min.y }, coord! { x: hi, y: max.y }),
            Axis::Y => Rect::new(coord! { x: min.x, y: lo }, coord! { x: max.x, y: hi }),
        };
        region.intersection(&MultiPolygon::new(vec![strip.to_polygon()]))
    }

    /// Clips the region between consecutive cuts, dropping empty fragments.
    fn fragments(&self, region: &MultiPolygon<f64>, cuts: &[f64]) -> Vec<MultiPolygon<f64>> {
        let min_area = region.unsigned_area() * MIN_FRAGMENT_SHARE;
        let mut edges = Vec::with_capacity(cuts.len() + 2);
        edges.push(self.start());
        edges.extend_from_slice(cuts);
        edges.push(self.end());

        edges
            .windows(2)
            .map(|pair| self.clip(region, pair[0], pair[1]))
            .filter(|fragment| fragment.unsigned_area() > min_area)
            .collect()
    }
}

/// Equal-width strips across the longer side of the bounding box.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSubdivider;

impl Subdivide for GridSubdivider {
    fn subdivide(&self, region: &MultiPolygon<f64>, parts: usize) -> Vec<MultiPolygon<f64>> {
        let frame = match Frame::of(region) {
            Some(frame) if parts >= 2 => frame,
            _ => return vec![region.clone()],
        };

        let (start, end) = (frame.start(), frame.end());
        let step = (end - start) / parts as f64;
        let cuts: Vec<f64> = (1..parts).map(|i| start + step * i as f64).collect();

        frame.fragments(region, &cuts)
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

/// Strips sized so each fragment holds an equal share of the region's area.
#[derive(Debug, Clone, Copy)]
pub struct EqualAreaSubdivider {
    steps: u32,
}

impl Default for EqualAreaSubdivider {
    fn default() -> Self {
        Self {
            steps: BISECTION_STEPS,
        }
    }
}

impl Subdivide for EqualAreaSubdivider {
    fn subdivide(&self, region: &MultiPolygon<f64>, parts: usize) -> Vec<MultiPolygon<f64>> {
        let frame = match Frame::of(region) {
            Some(frame) if parts >= 2 => frame,
            _ => return vec![region.clone()],
        };

        let total = region.unsigned_area();
        let (start, end) = (frame.start(), frame.end());
        let mut cuts = Vec::with_capacity(parts - 1);
        let mut lower = start;

        for i in 1..parts {
            let target = total * i as f64 / parts as f64;
            let (mut lo, mut hi) = (lower, end);

            for _ in 0..self.steps {
                let mid = (lo + hi) / 2.0;
                if frame.clip(region, start, mid).unsigned_area() < target {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }

            let cut = (lo + hi) / 2.0;
            cuts.push(cut);
            lower = cut;
        }

        frame.fragments(region, &cuts)
    }

    fn name(&self) -> &'static str {
        "equal_area"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn rectangle(width: f64, height: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: width, y: 0.0),
            (x: width, y: height),
            (x: 0.0, y: height),
        ]])
    }

    /// An L-shaped region: most of the area sits on the left.
    fn l_shape() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 1.0),
            (x: 2.0, y: 1.0),
            (x: 2.0, y: 8.0),
            (x: 0.0, y: 8.0),
        ]])
    }

    fn total_area(fragments: &[MultiPolygon<f64>]) -> f64 {
        fragments.iter().map(|f| f.unsigned_area()).sum()
    }

    #[test]
    fn test_grid_splits_long_axis_into_equal_strips() {
        let region = rectangle(9.0, 3.0);
        let fragments = GridSubdivider.subdivide(&region, 3);

        assert_eq!(fragments.len(), 3);
        for fragment in &fragments {
            assert!((fragment.unsigned_area() - 9.0).abs() < 1e-6);
            let rect = fragment.bounding_rect().unwrap();
            assert!((rect.height() - 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_grid_drops_empty_strips() {
        // Two unit squares far apart; the middle strip covers neither.
        let region = MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
            polygon![(x: 9.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 1.0), (x: 9.0, y: 1.0)],
        ]);

        let fragments = GridSubdivider.subdivide(&region, 3);
        assert_eq!(fragments.len(), 2);
        assert!((total_area(&fragments) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_equal_area_fragments_have_equal_area() {
        let region = l_shape();
        let fragments = EqualAreaSubdivider::default().subdivide(&region, 4);

        assert_eq!(fragments.len(), 4);
        let expected = region.unsigned_area() / 4.0;
        for fragment in &fragments {
            assert!(
                (fragment.unsigned_area() - expected).abs() < 1e-6,
                "fragment area {} should be close to {}",
                fragment.unsigned_area(),
                expected
            );
        }
    }

    #[test]
    fn test_subdivision_preserves_area() {
        let region = l_shape();
        for parts in 2..7 {
            let equal = EqualAreaSubdivider::default().subdivide(&region, parts);
            let grid = GridSubdivider.subdivide(&region, parts);
            assert!((total_area(&equal) - region.unsigned_area()).abs() < 1e-6);
            assert!((total_area(&grid) - region.unsigned_area()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_single_part_returns_region() {
        let region = rectangle(2.0, 2.0);
        let fragments = EqualAreaSubdivider::default().subdivide(&region, 1);
        assert_eq!(fragments, vec![region]);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "equal_area".parse::<SubdivisionStrategy>().unwrap(),
            SubdivisionStrategy::EqualArea
        );
        assert_eq!(
            "Equal-Area".parse::<SubdivisionStrategy>().unwrap(),
            SubdivisionStrategy::EqualArea
        );
        assert_eq!(
            "grid".parse::<SubdivisionStrategy>().unwrap(),
            SubdivisionStrategy::Grid
        );
        assert!("hexagons".parse::<SubdivisionStrategy>().is_err());
    }

    #[test]
    fn test_strategy_builds_matching_subdivider() {
        assert_eq!(SubdivisionStrategy::Grid.subdivider().name(), "grid");
        assert_eq!(
            SubdivisionStrategy::EqualArea.subdivider().name(),
            "equal_area"
        );
    }
}
