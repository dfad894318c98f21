//! GeoJSON polygon reading and writing.

use geo::orient::{Direction, Orient};
use geo::{BooleanOps, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

use super::GeometryError;

/// Reads the polygonal area described by a GeoJSON value.
///
/// Accepts `Polygon`, `MultiPolygon`, `GeometryCollection`, `Feature` and
/// `FeatureCollection`. Every polygon found is merged into one multipolygon;
/// overlapping inputs are unioned so the result covers each point once.
pub fn multi_polygon_from_geojson(value: &Value) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut polygons = Vec::new();
    collect_polygons(value, &mut polygons)?;

    if polygons.is_empty() {
        return Err(GeometryError::Empty);
    }

    let mut merged = MultiPolygon::new(vec![polygons.remove(0)]);
    for polygon in polygons {
        merged = merged.union(&MultiPolygon::new(vec![polygon]));
    }

    Ok(merged)
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) -> Result<(), GeometryError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeometryError::Unsupported("missing GeoJSON \"type\"".to_string()))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    GeometryError::Unsupported("FeatureCollection without features".to_string())
                })?;
            for feature in features {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => match value.get("geometry") {
            Some(Value::Null) | None => {}
            Some(geometry) => collect_polygons(geometry, out)?,
        },
        "GeometryCollection" => {
            if let Some(geometries) = value.get("geometries").and_then(Value::as_array) {
                for geometry in geometries {
                    collect_polygons(geometry, out)?;
                }
            }
        }
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = coordinates(value)?;
            if let Some(polygon) = polygon_from_rings(&rings) {
                out.push(polygon);
            }
        }
        "MultiPolygon" => {
            let parts: Vec<Vec<Vec<Vec<f64>>>> = coordinates(value)?;
            out.extend(parts.iter().filter_map(|rings| polygon_from_rings(rings)));
        }
        other => {
            return Err(GeometryError::Unsupported(format!(
                "GeoJSON type {} is not polygonal",
                other
            )))
        }
    }

    Ok(())
}

fn coordinates<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, GeometryError> {
    let coords = value
        .get("coordinates")
        .cloned()
        .ok_or_else(|| GeometryError::Unsupported("geometry without coordinates".to_string()))?;
    serde_json::from_value(coords).map_err(GeometryError::Json)
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let mut lines = rings.iter().map(|ring| {
        LineString::from(
            ring.iter()
                .filter(|p| p.len() >= 2)
                .map(|p| (p[0], p[1]))
                .collect::<Vec<_>>(),
        )
    });

    let exterior: LineString<f64> = lines.next()?;
    if exterior.0.len() < 3 {
        return None;
    }

    Some(Polygon::new(exterior, lines.collect()))
}

/// Encodes a multipolygon as a GeoJSON geometry object.
///
/// Single-part geometries are written as `Polygon`. Rings follow the
/// RFC 7946 right-hand rule (exteriors counter-clockwise).
pub fn multi_polygon_to_geojson(geometry: &MultiPolygon<f64>) -> Value {
    let oriented = geometry.orient(Direction::Default);
    let parts: Vec<Value> = oriented.iter().map(polygon_coordinates).collect();

    if parts.len() == 1 {
        json!({ "type": "Polygon", "coordinates": parts[0] })
    } else {
        json!({ "type": "MultiPolygon", "coordinates": parts })
    }
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Value {
    let rings: Vec<Value> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect()))
        .collect();
    Value::Array(rings)
}
