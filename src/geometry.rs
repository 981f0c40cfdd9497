use geojson::{GeoJson, Value};
use serde::{Deserialize, Serialize};
use shapefile::dbase::FieldValue;

use crate::components::RegionId;
use crate::loading::LoadError;

/// One polygon of a region: projected outer ring plus holes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    pub outer: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

impl Footprint {
    /// Shoelace area of the outer ring minus holes.
    pub fn area(&self) -> f64 {
        ring_area(&self.outer) - self.holes.iter().map(|h| ring_area(h)).sum::<f64>()
    }
}

fn ring_area(ring: &[[f64; 2]]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % ring.len()];
        sum += x0 * y1 - x1 * y0;
    }
    (sum / 2.0).abs()
}

/// A geometry feature tagged with the region it belongs to. Multipolygon
/// regions produce several features with the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryFeature {
    pub region: RegionId,
    pub footprint: Footprint,
}

/// Equirectangular projection: x = λ·scale + tx, y = −φ·scale + ty, with
/// λ and φ in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
    pub scale: f64,
    pub translate: [f64; 2],
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            scale: 200.0,
            translate: [500.0, 0.0],
        }
    }
}

impl Projection {
    pub fn project(&self, lon: f64, lat: f64) -> [f64; 2] {
        [
            lon.to_radians() * self.scale + self.translate[0],
            -lat.to_radians() * self.scale + self.translate[1],
        ]
    }

    fn ring(&self, positions: &[Vec<f64>]) -> Vec<[f64; 2]> {
        positions
            .iter()
            .filter(|p| p.len() >= 2)
            .map(|p| self.project(p[0], p[1]))
            .collect()
    }

    fn polygon(&self, rings: &[Vec<Vec<f64>>]) -> Option<Footprint> {
        let (outer, holes) = rings.split_first()?;
        Some(Footprint {
            outer: self.ring(outer),
            holes: holes.iter().map(|h| self.ring(h)).collect(),
        })
    }
}

fn region_id_from_json(value: &serde_json::Value) -> Option<RegionId> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(RegionId),
        serde_json::Value::String(s) => crate::registry::parse_region_id(s),
        _ => None,
    }
}

/// Parse a GeoJSON FeatureCollection into projected region features.
pub fn features_from_geojson(
    text: &str,
    id_property: &str,
    projection: &Projection,
) -> Result<Vec<GeometryFeature>, LoadError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(LoadError::NotAFeatureCollection);
    };

    let mut features = Vec::new();
    let mut skipped = 0usize;
    for feature in collection.features {
        let region = feature
            .properties
            .as_ref()
            .and_then(|p| p.get(id_property))
            .and_then(region_id_from_json);
        let Some(region) = region else {
            log::warn!("geometry: feature without a '{}' id, skipping", id_property);
            skipped += 1;
            continue;
        };
        let Some(geometry) = feature.geometry else {
            log::warn!("geometry: region {} has no geometry, skipping", region);
            skipped += 1;
            continue;
        };
        match &geometry.value {
            Value::Polygon(rings) => {
                features.extend(
                    projection
                        .polygon(rings)
                        .map(|footprint| GeometryFeature { region, footprint }),
                );
            }
            Value::MultiPolygon(polygons) => {
                features.extend(
                    polygons
                        .iter()
                        .filter_map(|rings| projection.polygon(rings))
                        .map(|footprint| GeometryFeature { region, footprint }),
                );
            }
            _ => {
                log::warn!("geometry: region {} is not a polygon, skipping", region);
                skipped += 1;
            }
        }
    }
    log::info!(
        "geometry: {} footprints loaded, {} features skipped",
        features.len(),
        skipped
    );
    Ok(features)
}

pub fn load_geojson(
    path: &str,
    id_property: &str,
    projection: &Projection,
) -> Result<Vec<GeometryFeature>, LoadError> {
    let text = std::fs::read_to_string(path)?;
    features_from_geojson(&text, id_property, projection)
}

fn region_id_from_field(record: &shapefile::dbase::Record, name: &str) -> Option<RegionId> {
    match record.get(name) {
        Some(FieldValue::Numeric(Some(v))) if v.fract() == 0.0 => Some(RegionId(*v as i64)),
        Some(FieldValue::Integer(v)) => Some(RegionId(i64::from(*v))),
        Some(FieldValue::Character(Some(s))) => crate::registry::parse_region_id(s),
        _ => None,
    }
}

/// Read polygons from an ESRI shapefile (with its .dbf), keyed by `id_field`.
/// Ring orientation decides outer rings versus holes.
pub fn load_shapefile(
    path: &str,
    id_field: &str,
    projection: &Projection,
) -> Result<Vec<GeometryFeature>, LoadError> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut features = Vec::new();
    let mut skipped = 0usize;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let shapefile::Shape::Polygon(polygon) = shape else {
            skipped += 1;
            continue;
        };
        let Some(region) = region_id_from_field(&record, id_field) else {
            log::warn!("{}: record without a '{}' id, skipping", path, id_field);
            skipped += 1;
            continue;
        };

        let mut current: Option<Footprint> = None;
        for ring in polygon.rings() {
            let points: Vec<[f64; 2]> = ring
                .points()
                .iter()
                .map(|p| projection.project(p.x, p.y))
                .collect();
            match ring {
                shapefile::PolygonRing::Outer(_) => {
                    if let Some(done) = current.take() {
                        features.push(GeometryFeature {
                            region,
                            footprint: done,
                        });
                    }
                    current = Some(Footprint {
                        outer: points,
                        holes: Vec::new(),
                    });
                }
                shapefile::PolygonRing::Inner(_) => match current.as_mut() {
                    Some(footprint) => footprint.holes.push(points),
                    None => log::debug!("{}: hole before any outer ring in region {}", path, region),
                },
            }
        }
        if let Some(done) = current {
            features.push(GeometryFeature {
                region,
                footprint: done,
            });
        }
    }

    log::info!(
        "{}: {} footprints loaded, {} records skipped",
        path,
        features.len(),
        skipped
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "LGA_ID": 20110, "name": "Alpine" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[146.0, -37.0], [147.0, -37.0], [147.0, -36.0], [146.0, -37.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "LGA_ID": "20260" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[142.0, -37.0], [143.0, -37.0], [143.0, -36.0], [142.0, -37.0]]],
                        [[[144.0, -38.0], [144.5, -38.0], [144.5, -37.5], [144.0, -38.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "other": 1 },
                "geometry": { "type": "Point", "coordinates": [145.0, -37.0] }
            },
            {
                "type": "Feature",
                "properties": { "LGA_ID": 20570 },
                "geometry": { "type": "Point", "coordinates": [145.0, -37.0] }
            }
        ]
    }"#;

    #[test]
    fn projection_matches_equirectangular() {
        let p = Projection::default();
        let [x, y] = p.project(0.0, 0.0);
        assert!((x - 500.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        let [x, y] = p.project(180.0, 90.0);
        assert!((x - (std::f64::consts::PI * 200.0 + 500.0)).abs() < 1e-9);
        assert!((y + std::f64::consts::FRAC_PI_2 * 200.0).abs() < 1e-9);
    }

    #[test]
    fn geojson_groups_multipolygons_and_skips_bad_features() {
        let features = features_from_geojson(SAMPLE, "LGA_ID", &Projection::default()).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].region, RegionId(20110));
        assert_eq!(features[1].region, RegionId(20260));
        assert_eq!(features[2].region, RegionId(20260));
        assert_eq!(features[0].footprint.outer.len(), 4);
    }

    #[test]
    fn non_collection_is_an_error() {
        let point = r#"{ "type": "Point", "coordinates": [1.0, 2.0] }"#;
        assert!(matches!(
            features_from_geojson(point, "LGA_ID", &Projection::default()),
            Err(LoadError::NotAFeatureCollection)
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(features_from_geojson("{ nope", "LGA_ID", &Projection::default()).is_err());
    }

    #[test]
    fn footprint_area_subtracts_holes() {
        let fp = Footprint {
            outer: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            holes: vec![vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]]],
        };
        assert!((fp.area() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn missing_shapefile_is_an_error() {
        assert!(load_shapefile("does/not/exist.shp", "LGA_ID", &Projection::default()).is_err());
    }
}
