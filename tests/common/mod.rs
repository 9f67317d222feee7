#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// 模型、區域資料與設定檔都放在暫存目錄
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> String {
        self.root().join(relative).display().to_string()
    }

    pub fn config_path(&self) -> String {
        self.path("blueguard.toml")
    }
}

fn write_json(path: &Path, value: serde_json::Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> serde_json::Value {
    json!([[
        [min_lon, min_lat],
        [max_lon, min_lat],
        [max_lon, max_lat],
        [min_lon, max_lat],
        [min_lon, min_lat]
    ]])
}

fn collection(name: &str, rings: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": name},
            "geometry": {"type": "Polygon", "coordinates": rings}
        }]
    })
}

pub fn write_models(root: &Path) {
    // 6 個 AIS 欄位，截距決定類別
    write_json(
        &root.join("models/ais/model.json"),
        json!({
            "kind": "linear",
            "classes": ["cargo", "tanker", "passenger"],
            "coefficients": [
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            ],
            "intercepts": [2.0, 0.0, 0.0]
        }),
    );
    write_json(
        &root.join("models/ais/scaler.json"),
        json!({"mean": [10.0, 180.0, 180.0, 100.0, 20.0, 8.0], "scale": [5.0, 90.0, 90.0, 50.0, 10.0, 4.0]}),
    );

    // 低速 → fishing
    write_json(
        &root.join("models/fishing/model.json"),
        json!({
            "kind": "linear",
            "feature_names": ["SOG", "sog_diff", "time_diff", "distance"],
            "classes": [0, 1],
            "coefficients": [[-2.0, 0.0, 0.0, 0.0]],
            "intercepts": [8.0]
        }),
    );
    write_json(
        &root.join("models/fishing/label_encoder.json"),
        json!({"classes": ["non-fishing", "fishing"]}),
    );

    write_json(
        &root.join("models/kattegat/model.json"),
        json!({
            "kind": "nearest_centroid",
            "classes": ["trawler", "merchant"],
            "centroids": [[20.0, 4.0, 0.0, 0.0, 3.0, 1.0], [150.0, 9.0, 0.0, 0.0, 14.0, 1.0]]
        }),
    );
}

pub fn write_zones(root: &Path) {
    write_json(
        &root.join("zones/mpa_zones/reserves.geojson"),
        collection("Anholt Reef", square(11.0, 56.0, 12.0, 57.0)),
    );
    write_json(
        &root.join("zones/eez_zones/eez.geojson"),
        collection("Danish EEZ", square(8.0, 54.0, 15.0, 58.0)),
    );
    write_json(
        &root.join("zones/ports/ports.geojson"),
        collection("Grenaa", square(10.8, 56.3, 10.95, 56.45)),
    );
}

pub fn config_toml(root: &Path, extra: &str) -> String {
    let root = root.display().to_string().replace('\\', "/");
    format!(
        r#"
[service]
name = "blueguard-test"

[agents]
artifact_root = "{root}/models"

[[agents.registry]]
key = "ais"
variant = "ais"
artifact_dir = "ais"

[[agents.registry]]
key = "fishing"
variant = "fishing"
artifact_dir = "fishing"

[[agents.registry]]
key = "kattegat"
variant = "kattegat"
artifact_dir = "kattegat"
default = true

[zones]
root = "{root}/zones"

[batch]
concurrent_requests = 4

[load]
output_path = "{root}/output"
output_formats = ["csv", "json"]
{extra}
"#
    )
}

pub fn fixture(extra_config: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    write_models(dir.path());
    write_zones(dir.path());
    fs::write(
        dir.path().join("blueguard.toml"),
        config_toml(dir.path(), extra_config),
    )
    .unwrap();
    Fixture { dir }
}
