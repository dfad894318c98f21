//! Esri JSON polygon encoding.
//!
//! ArcGIS REST endpoints describe polygons as a flat list of rings. Outer
//! rings run clockwise and holes run counter-clockwise; which hole belongs to
//! which shell is left for the reader to work out by containment.

use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GeometryError;

/// WKID of WGS84 geographic coordinates.
pub const WGS84_WKID: u32 = 4326;

/// Spatial reference as it appears in Esri JSON payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<u32>,

    #[serde(
        rename = "latestWkid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_wkid: Option<u32>,
}

impl SpatialReference {
    /// Spatial reference for a known WKID.
    pub fn from_wkid(wkid: u32) -> Self {
        Self {
            wkid: Some(wkid),
            latest_wkid: None,
        }
    }

    /// WGS84 (EPSG:4326).
    pub fn wgs84() -> Self {
        Self::from_wkid(WGS84_WKID)
    }

    /// The WKID to use for requests, preferring `latestWkid` when present.
    pub fn effective_wkid(&self) -> Option<u32> {
        self.latest_wkid.or(self.wkid)
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// An Esri JSON polygon (`{"rings": [...], "spatialReference": {...}}`).
///
/// Vertices are kept as plain number lists because services may send
/// `[x, y, z]` or `[x, y, z, m]` tuples; only x and y are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriPolygon {
    pub rings: Vec<Vec<Vec<f64>>>,

    #[serde(
        rename = "spatialReference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub spatial_reference: Option<SpatialReference>,
}

impl EsriPolygon {
    /// Encodes a multipolygon with Esri ring orientation.
    pub fn from_multi_polygon(
        geometry: &MultiPolygon<f64>,
        spatial_reference: Option<SpatialReference>,
    ) -> Self {
        let oriented = geometry.orient(Direction::Reversed);
        let mut rings = Vec::new();

        for polygon in oriented.iter() {
            rings.push(ring_points(polygon.exterior()));
            for interior in polygon.interiors() {
                rings.push(ring_points(interior));
            }
        }

        Self {
            rings,
            spatial_reference,
        }
    }

    /// Decodes the rings into shells with their holes.
    ///
    /// Clockwise rings become shells. Each counter-clockwise ring is attached
    /// to the smallest shell containing it; a hole with no containing shell is
    /// treated as a shell of its own so no area is silently lost.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        let mut shells: Vec<LineString<f64>> = Vec::new();
        let mut holes: Vec<LineString<f64>> = Vec::new();

        for ring in &self.rings {
            let line: LineString<f64> = ring
                .iter()
                .filter(|point| point.len() >= 2)
                .map(|point| (point[0], point[1]))
                .collect::<Vec<_>>()
                .into();

            if line.0.len() < 3 {
                continue;
            }

            let signed = Polygon::new(line.clone(), vec![]).signed_area();
            if signed < 0.0 {
                shells.push(line);
            } else if signed > 0.0 {
                holes.push(line);
            }
        }

        let shell_polygons: Vec<Polygon<f64>> = shells
            .iter()
            .map(|shell| Polygon::new(shell.clone(), vec![]))
            .collect();
        let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
        let mut orphans = Vec::new();

        for hole in holes {
            let probe = hole.0[0];
            let owner = shell_polygons
                .iter()
                .enumerate()
                .filter(|(_, shell)| shell.contains(&probe))
                .min_by(|(_, a), (_, b)| a.unsigned_area().total_cmp(&b.unsigned_area()))
                .map(|(index, _)| index);

            match owner {
                Some(index) => interiors[index].push(hole),
                None => orphans.push(hole),
            }
        }

        let mut polygons: Vec<Polygon<f64>> = shells
            .into_iter()
            .zip(interiors)
            .map(|(shell, holes)| Polygon::new(shell, holes))
            .collect();
        polygons.extend(orphans.into_iter().map(|ring| Polygon::new(ring, vec![])));

        MultiPolygon::new(polygons)
    }
}

/// Reads the area covered by an Esri JSON feature set.
///
/// Every feature geometry is unioned into one multipolygon. The spatial
/// reference is the feature set's own, or the first one found on a geometry.
pub fn multi_polygon_from_feature_set(
    value: &Value,
) -> Result<(MultiPolygon<f64>, Option<SpatialReference>), GeometryError> {
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| GeometryError::Unsupported("feature set without features".to_string()))?;

    let mut spatial_reference: Option<SpatialReference> = match value.get("spatialReference") {
        Some(sr) => Some(serde_json::from_value(sr.clone()).map_err(GeometryError::Json)?),
        None => None,
    };

    let mut merged: Option<MultiPolygon<f64>> = None;
    for feature in features {
        let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
            continue;
        };
        let polygon: EsriPolygon =
            serde_json::from_value(geometry.clone()).map_err(GeometryError::Json)?;
        spatial_reference = spatial_reference.or(polygon.spatial_reference);

        let area = polygon.to_multi_polygon();
        merged = Some(match merged {
            Some(current) => current.union(&area),
            None => area,
        });
    }

    merged
        .map(|geometry| (geometry, spatial_reference))
        .ok_or(GeometryError::Empty)
}

fn ring_points(ring: &LineString<f64>) -> Vec<Vec<f64>> {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square_with_hole() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [[
                (x: 4.0, y: 4.0),
                (x: 6.0, y: 4.0),
                (x: 6.0, y: 6.0),
                (x: 4.0, y: 6.0),
            ]],
        )])
    }

    #[test]
    fn test_spatial_reference_prefers_latest_wkid() {
        let sr = SpatialReference {
            wkid: Some(102100),
            latest_wkid: Some(3857),
        };
        assert_eq!(sr.effective_wkid(), Some(3857));
        assert_eq!(SpatialReference::wgs84().effective_wkid(), Some(4326));
    }

    #[test]
    fn test_outer_ring_is_clockwise() {
        let esri = EsriPolygon::from_multi_polygon(&square_with_hole(), None);
        assert_eq!(esri.rings.len(), 2);

        let outer: LineString<f64> = esri.rings[0]
            .iter()
            .map(|p| (p[0], p[1]))
            .collect::<Vec<_>>()
            .into();
        let hole: LineString<f64> = esri.rings[1]
            .iter()
            .map(|p| (p[0], p[1]))
            .collect::<Vec<_>>()
            .into();

        assert!(Polygon::new(outer, vec![]).signed_area() < 0.0);
        assert!(Polygon::new(hole, vec![]).signed_area() > 0.0);
    }

    #[test]
    fn test_hole_is_attached_to_shell() {
        let original = square_with_hole();
        let decoded = EsriPolygon::from_multi_polygon(&original, None).to_multi_polygon();

        assert_eq!(decoded.0.len(), 1);
        assert_eq!(decoded.0[0].interiors().len(), 1);
        assert!((decoded.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_clockwise_only_rings_become_shells() {
        let esri = EsriPolygon {
            rings: vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 1.0],
                vec![0.0, 0.0],
            ]],
            spatial_reference: None,
        };

        let decoded = esri.to_multi_polygon();
        assert_eq!(decoded.0.len(), 1);
        assert!((decoded.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_values_are_ignored() {
        let json = r#"{"rings":[[[0,0,5],[0,2,5],[2,2,5],[2,0,5],[0,0,5]]],
                       "spatialReference":{"wkid":4326,"latestWkid":4326}}"#;
        let esri: EsriPolygon = serde_json::from_str(json).unwrap();

        let decoded = esri.to_multi_polygon();
        assert!((decoded.unsigned_area() - 4.0).abs() < 1e-12);
        assert_eq!(esri.spatial_reference.unwrap().effective_wkid(), Some(4326));
    }
}
