mod common;

use anyhow::Result;
use blueguard::core::violation::{detect_violations, ILLEGAL_FISHING};
use blueguard::domain::model::{Observation, Severity, ZoneType};
use blueguard::geo::{check_zone, classify, classify_batch};
use blueguard::ZoneStore;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;

fn at(lat: f64, lon: f64) -> Observation {
    Observation::new("265000001", Utc::now(), lat, lon, HashMap::new())
}

#[test]
fn test_zone_store_loads_all_categories() -> Result<()> {
    let fixture = common::fixture("");
    let store = ZoneStore::load_from_dir(fixture.root().join("zones"))?;

    assert_eq!(
        store.counts(),
        vec![(ZoneType::Mpa, 1), (ZoneType::Eez, 1), (ZoneType::Port, 1)]
    );
    Ok(())
}

#[test]
fn test_check_zone_priority_and_violation() -> Result<()> {
    let fixture = common::fixture("");
    let store = ZoneStore::load_from_dir(fixture.root().join("zones"))?;

    let inside_mpa = check_zone(56.5, 11.5, &store);
    assert_eq!(inside_mpa.zone_type, Some(ZoneType::Mpa));
    assert_eq!(inside_mpa.zone_name.as_deref(), Some("Anholt Reef"));
    assert!(inside_mpa.is_violation);

    let port = check_zone(56.4, 10.9, &store);
    assert_eq!(port.zone_type, Some(ZoneType::Eez));
    assert!(!port.is_violation);
    assert!(classify(&at(56.4, 10.9), &store).near_port());

    let open_sea = check_zone(60.0, 2.0, &store);
    assert_eq!(open_sea.zone_type, None);
    assert!(!open_sea.is_violation);
    Ok(())
}

#[test]
fn test_boundary_points_are_members() -> Result<()> {
    let fixture = common::fixture("");
    let store = ZoneStore::load_from_dir(fixture.root().join("zones"))?;

    // 西側邊界與角點
    let memberships = classify_batch(&[at(56.5, 11.0), at(57.0, 12.0), at(56.5, 10.99)], &store);
    assert!(memberships[0].in_mpa());
    assert!(memberships[1].in_mpa());
    assert!(!memberships[2].in_mpa());
    assert!(memberships.iter().all(|m| m.in_eez()));
    Ok(())
}

#[test]
fn test_missing_port_data_is_not_an_error() -> Result<()> {
    let fixture = common::fixture("");
    fs::remove_dir_all(fixture.root().join("zones/ports"))?;
    let store = ZoneStore::load_from_dir(fixture.root().join("zones"))?;

    let memberships = classify_batch(&[at(56.4, 10.9), at(56.5, 11.5)], &store);
    assert!(memberships.iter().all(|m| !m.near_port()));
    assert!(memberships[1].in_mpa());
    Ok(())
}

#[test]
fn test_projected_zone_file_is_rejected() -> Result<()> {
    let fixture = common::fixture("");
    let path = fixture.root().join("zones/eez_zones/eez.geojson");
    let mut geojson: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    geojson["crs"] = serde_json::json!({
        "type": "name",
        "properties": {"name": "urn:ogc:def:crs:EPSG::25832"}
    });
    fs::write(&path, serde_json::to_string(&geojson)?)?;

    assert!(ZoneStore::load_from_dir(fixture.root().join("zones")).is_err());
    Ok(())
}

#[test]
fn test_illegal_fishing_needs_mpa_and_fishing() -> Result<()> {
    let fixture = common::fixture("");
    let store = ZoneStore::load_from_dir(fixture.root().join("zones"))?;

    let in_reserve = at(56.5, 11.5);
    let in_eez_only = at(55.0, 9.0);

    let flags = detect_violations(&in_reserve, Some("fishing"), &classify(&in_reserve, &store));
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].rule_id, ILLEGAL_FISHING);
    assert_eq!(flags[0].severity, Severity::High);
    assert_eq!(flags[0].vessel_id, "265000001");

    for (obs, label) in [
        (&in_reserve, Some("non-fishing")),
        (&in_reserve, None),
        (&in_eez_only, Some("fishing")),
    ] {
        let membership = classify(obs, &store);
        assert!(detect_violations(obs, label, &membership).is_empty());
    }
    Ok(())
}
