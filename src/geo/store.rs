use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::model::ZoneType;
use crate::geo::polygon::{Polygon, Position};
use crate::utils::error::{BlueGuardError, Result};

/// 具名的管制區域，幾何為 WGS84 經緯度
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub zone_type: ZoneType,
    pub name: String,
    pub polygons: Vec<Polygon>,
}

impl Zone {
    pub fn new(zone_type: ZoneType, name: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        Self {
            zone_type,
            name: name.into(),
            polygons,
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygons.iter().any(|p| p.contains(lon, lat))
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    crs: Option<serde_json::Value>,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

const NAME_PROPERTIES: [&str; 3] = ["name", "NAME", "Name"];

/// 舊版 GeoJSON 的 crs 欄位只接受 WGS84
fn ensure_wgs84(crs: &Option<serde_json::Value>, source: &str) -> Result<()> {
    let Some(crs) = crs else {
        return Ok(());
    };
    let name = crs
        .pointer("/properties/name")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if name.contains("4326") || name.contains("CRS84") {
        Ok(())
    } else {
        Err(BlueGuardError::ZoneDataError {
            path: source.to_string(),
            message: format!(
                "coordinate reference system '{}' is not WGS84; reproject to EPSG:4326 first",
                name
            ),
        })
    }
}

fn to_ring(raw: Vec<Vec<f64>>) -> std::result::Result<Vec<Position>, String> {
    raw.into_iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => Ok((*lon, *lat)),
            _ => Err("position needs longitude and latitude".to_string()),
        })
        .collect()
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> std::result::Result<Polygon, String> {
    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| "polygon without exterior ring".to_string())?;
    let holes = rings.map(to_ring).collect::<std::result::Result<Vec<_>, _>>()?;
    Polygon::new(to_ring(exterior)?, holes)
}

/// 解析 GeoJSON FeatureCollection；非多邊形的 feature 會被略過
pub fn parse_zones(zone_type: ZoneType, content: &str, source: &str) -> Result<Vec<Zone>> {
    let collection: FeatureCollection =
        serde_json::from_str(content).map_err(|e| BlueGuardError::ZoneDataError {
            path: source.to_string(),
            message: format!("invalid GeoJSON: {}", e),
        })?;

    if collection.kind != "FeatureCollection" {
        return Err(BlueGuardError::ZoneDataError {
            path: source.to_string(),
            message: format!("expected FeatureCollection, got {}", collection.kind),
        });
    }
    ensure_wgs84(&collection.crs, source)?;

    let mut zones = Vec::new();
    for (i, feature) in collection.features.into_iter().enumerate() {
        let polygons = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => vec![to_polygon(coordinates)],
            Some(Geometry::MultiPolygon { coordinates }) => {
                coordinates.into_iter().map(to_polygon).collect()
            }
            Some(Geometry::Unsupported) | None => {
                tracing::debug!("Skipping non-polygon feature #{} in {}", i, source);
                continue;
            }
        }
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|message| BlueGuardError::ZoneDataError {
            path: source.to_string(),
            message: format!("feature #{}: {}", i, message),
        })?;

        let name = feature
            .properties
            .as_ref()
            .and_then(|props| {
                NAME_PROPERTIES
                    .iter()
                    .find_map(|key| props.get(*key).and_then(|v| v.as_str()))
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", zone_type, i + 1));

        zones.push(Zone::new(zone_type, name, polygons));
    }

    Ok(zones)
}

/// 依類型索引的區域集合；載入一次後唯讀共享
#[derive(Debug, Clone, Default)]
pub struct ZoneStore {
    zones: HashMap<ZoneType, Vec<Zone>>,
}

impl ZoneStore {
    pub fn new(zones: Vec<Zone>) -> Self {
        let mut by_type: HashMap<ZoneType, Vec<Zone>> = HashMap::new();
        for zone in zones {
            by_type.entry(zone.zone_type).or_default().push(zone);
        }
        Self { zones: by_type }
    }

    /// 讀取 `<root>/mpa_zones`、`<root>/eez_zones`、`<root>/ports` 下所有 GeoJSON
    ///
    /// 缺少的類別不是錯誤，該類別的歸屬一律為 false。
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let mut zones = Vec::new();

        for zone_type in ZoneType::ALL {
            let folder = root.join(zone_type.folder_name());
            if !folder.is_dir() {
                tracing::warn!(
                    "⚠️ No {} zone data at {}, membership will be false",
                    zone_type,
                    folder.display()
                );
                continue;
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&folder)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("geojson") | Some("json")
                    )
                })
                .collect();
            files.sort();

            let before = zones.len();
            for file in files {
                let content = fs::read_to_string(&file)?;
                zones.extend(parse_zones(zone_type, &content, &file.display().to_string())?);
            }
            tracing::info!(
                "🗺️ Loaded {} {} zone(s) from {}",
                zones.len() - before,
                zone_type,
                folder.display()
            );
        }

        Ok(Self::new(zones))
    }

    pub fn zones(&self, zone_type: ZoneType) -> &[Zone] {
        self.zones
            .get(&zone_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_loaded(&self, zone_type: ZoneType) -> bool {
        !self.zones(zone_type).is_empty()
    }

    pub fn counts(&self) -> Vec<(ZoneType, usize)> {
        ZoneType::ALL
            .iter()
            .map(|zt| (*zt, self.zones(*zt).len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MPA: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME": "Anholt Reef"},
                "geometry": {"type": "Polygon", "coordinates": [[[11.0, 56.0], [12.0, 56.0], [12.0, 57.0], [11.0, 57.0], [11.0, 56.0]]]}
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                    [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]]
                ]}
            },
            {
                "type": "Feature",
                "properties": {"name": "buoy"},
                "geometry": {"type": "Point", "coordinates": [3.0, 3.0]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_polygons_and_names() {
        let zones = parse_zones(ZoneType::Mpa, MPA, "mpa.geojson").unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].name, "Anholt Reef");
        assert_eq!(zones[1].name, "MPA-2");
        assert_eq!(zones[1].polygons.len(), 2);
        assert!(zones[0].contains(11.5, 56.5));
    }

    #[test]
    fn test_non_wgs84_crs_is_rejected() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": []
        }"#;
        let err = parse_zones(ZoneType::Eez, content, "eez.geojson").unwrap_err();
        assert!(err.to_string().contains("not WGS84"));

        let content = content.replace("EPSG::3857", "OGC:1.3:CRS84");
        assert!(parse_zones(ZoneType::Eez, &content, "eez.geojson").is_ok());
    }

    #[test]
    fn test_load_from_dir_tolerates_missing_categories() {
        let root = TempDir::new().unwrap();
        let mpa_dir = root.path().join("mpa_zones");
        fs::create_dir_all(&mpa_dir).unwrap();
        fs::write(mpa_dir.join("reserves.geojson"), MPA).unwrap();

        let store = ZoneStore::load_from_dir(root.path()).unwrap();
        assert_eq!(store.zones(ZoneType::Mpa).len(), 2);
        assert!(store.is_loaded(ZoneType::Mpa));
        assert!(!store.is_loaded(ZoneType::Port));
        assert!(store.zones(ZoneType::Eez).is_empty());
    }

    #[test]
    fn test_invalid_geometry_reports_file() {
        let content = r#"{
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 1.0]]]}}]
        }"#;
        let err = parse_zones(ZoneType::Port, content, "ports/bad.geojson").unwrap_err();
        assert!(err.to_string().contains("ports/bad.geojson"));
    }
}
