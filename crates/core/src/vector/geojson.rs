//! GeoJSON area-of-interest loading
//!
//! Accepts a `FeatureCollection`, `Feature`, `GeometryCollection` or bare
//! `Polygon` / `MultiPolygon`. Coordinates are EPSG:4326 unless the legacy
//! top-level `crs` member names another system.

use std::fs;
use std::path::Path;

use geo_types::{Coord, LineString, Polygon};
use serde_json::Value;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::AreaOfInterest;

/// Read an AOI from a GeoJSON file
pub fn read_aoi_geojson<P: AsRef<Path>>(path: P) -> Result<AreaOfInterest> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_aoi_geojson(&text)
        .map_err(|e| Error::InvalidAoi(format!("{}: {}", path.display(), e)))
}

/// Parse an AOI from GeoJSON text
pub fn parse_aoi_geojson(text: &str) -> Result<AreaOfInterest> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| Error::InvalidAoi(format!("invalid JSON: {}", e)))?;

    let crs = match root.get("crs") {
        Some(member) => legacy_crs(member)?,
        None => CRS::wgs84(),
    };

    let mut polygons = Vec::new();
    collect_polygons(&root, &mut polygons)?;

    AreaOfInterest::new(polygons, crs)
}

/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32630"}}`
fn legacy_crs(member: &Value) -> Result<CRS> {
    let name = member
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidAoi("crs member has no properties.name".into()))?;

    CRS::parse(name).ok_or_else(|| Error::InvalidAoi(format!("unrecognised crs name '{}'", name)))
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidAoi("object without a type member".into()))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::InvalidAoi("FeatureCollection without features".into()))?;
            for feature in features {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => match value.get("geometry") {
            Some(Value::Null) | None => {}
            Some(geometry) => collect_polygons(geometry, out)?,
        },
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::InvalidAoi("GeometryCollection without geometries".into()))?;
            for geometry in geometries {
                collect_polygons(geometry, out)?;
            }
        }
        "Polygon" => out.push(polygon(coordinates(value)?)?),
        "MultiPolygon" => {
            let parts = coordinates(value)?
                .as_array()
                .ok_or_else(|| Error::InvalidAoi("MultiPolygon coordinates must be an array".into()))?;
            for part in parts {
                out.push(polygon(part)?);
            }
        }
        other => {
            return Err(Error::InvalidAoi(format!(
                "unsupported geometry type '{}', expected polygons",
                other
            )))
        }
    }

    Ok(())
}

fn coordinates(geometry: &Value) -> Result<&Value> {
    geometry
        .get("coordinates")
        .ok_or_else(|| Error::InvalidAoi("geometry without coordinates".into()))
}

fn polygon(rings: &Value) -> Result<Polygon<f64>> {
    let rings = rings
        .as_array()
        .ok_or_else(|| Error::InvalidAoi("polygon coordinates must be an array of rings".into()))?;

    let mut rings = rings.iter().map(ring);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::InvalidAoi("polygon without an exterior ring".into()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn ring(value: &Value) -> Result<LineString<f64>> {
    let positions = value
        .as_array()
        .ok_or_else(|| Error::InvalidAoi("ring must be an array of positions".into()))?;

    let coords = positions
        .iter()
        .map(|p| {
            let x = p.get(0).and_then(Value::as_f64);
            let y = p.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(Error::InvalidAoi(format!("invalid position {}", p))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if coords.len() < 4 {
        return Err(Error::InvalidAoi(format!(
            "ring has {} positions, a closed ring needs at least 4",
            coords.len()
        )));
    }

    Ok(LineString::new(coords))
}
