use serde::{Deserialize, Serialize};

use crate::domain::model::{Observation, ZoneMembership, ZoneType};
use crate::geo::store::ZoneStore;

/// 單點區域查詢結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCheck {
    pub latitude: f64,
    pub longitude: f64,
    pub zone_type: Option<ZoneType>,
    pub zone_name: Option<String>,
    pub is_violation: bool,
}

pub fn classify_point(latitude: f64, longitude: f64, zones: &ZoneStore) -> ZoneMembership {
    let mut membership = ZoneMembership::default();
    for zone_type in ZoneType::ALL {
        for zone in zones.zones(zone_type) {
            if zone.contains(longitude, latitude) {
                membership.record_match(zone_type, zone.name.clone());
            }
        }
    }
    membership
}

/// 對每種區域類型檢查 (lon, lat) 是否落在該類型任一多邊形內 (含邊界)
pub fn classify(observation: &Observation, zones: &ZoneStore) -> ZoneMembership {
    classify_point(observation.latitude(), observation.longitude(), zones)
}

pub fn classify_batch(observations: &[Observation], zones: &ZoneStore) -> Vec<ZoneMembership> {
    observations.iter().map(|obs| classify(obs, zones)).collect()
}

/// 依 MPA、EEZ、PORT 順序回報第一個符合的區域；只有 MPA 視為違規
pub fn check_zone(latitude: f64, longitude: f64, zones: &ZoneStore) -> ZoneCheck {
    let membership = classify_point(latitude, longitude, zones);
    let first = ZoneType::ALL
        .iter()
        .find_map(|zt| membership.matched_names(*zt).first().map(|name| (*zt, name.clone())));

    ZoneCheck {
        latitude,
        longitude,
        zone_type: first.as_ref().map(|(zt, _)| *zt),
        zone_name: first.map(|(_, name)| name),
        is_violation: membership.in_mpa(),
    }
}
