/// 邊界判斷的容許誤差 (度)
const BOUNDARY_EPSILON: f64 = 1e-9;

/// (longitude, latitude)，WGS84 度
pub type Position = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    fn of(points: &[Position]) -> Self {
        points.iter().fold(
            BoundingBox {
                min_lon: f64::INFINITY,
                min_lat: f64::INFINITY,
                max_lon: f64::NEG_INFINITY,
                max_lat: f64::NEG_INFINITY,
            },
            |b, &(lon, lat)| BoundingBox {
                min_lon: b.min_lon.min(lon),
                min_lat: b.min_lat.min(lat),
                max_lon: b.max_lon.max(lon),
                max_lat: b.max_lat.max(lat),
            },
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon - BOUNDARY_EPSILON
            && lon <= self.max_lon + BOUNDARY_EPSILON
            && lat >= self.min_lat - BOUNDARY_EPSILON
            && lat <= self.max_lat + BOUNDARY_EPSILON
    }
}

/// 外環加上可選的內洞；邊界上的點 (含洞的邊界) 視為在多邊形內
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<Position>,
    holes: Vec<Vec<Position>>,
    bbox: BoundingBox,
}

fn normalize_ring(mut ring: Vec<Position>) -> Result<Vec<Position>, String> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return Err(format!("ring needs at least 3 distinct points, got {}", ring.len()));
    }
    for &(lon, lat) in &ring {
        if !lon.is_finite() || !lat.is_finite() {
            return Err("ring contains non-finite coordinates".to_string());
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(format!(
                "coordinate ({}, {}) is outside WGS84 bounds",
                lon, lat
            ));
        }
    }
    Ok(ring)
}

impl Polygon {
    pub fn new(exterior: Vec<Position>, holes: Vec<Vec<Position>>) -> Result<Self, String> {
        let exterior = normalize_ring(exterior)?;
        let holes = holes
            .into_iter()
            .map(normalize_ring)
            .collect::<Result<Vec<_>, _>>()?;
        let bbox = BoundingBox::of(&exterior);
        Ok(Self {
            exterior,
            holes,
            bbox,
        })
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bbox.contains(lon, lat) {
            return false;
        }
        let on_any_boundary = std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .any(|ring| on_boundary(ring, lon, lat));
        if on_any_boundary {
            return true;
        }
        crosses_odd(&self.exterior, lon, lat)
            && !self.holes.iter().any(|hole| crosses_odd(hole, lon, lat))
    }
}

fn edges(ring: &[Position]) -> impl Iterator<Item = (Position, Position)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
}

fn on_boundary(ring: &[Position], lon: f64, lat: f64) -> bool {
    edges(ring).any(|((x1, y1), (x2, y2))| {
        let cross = (x2 - x1) * (lat - y1) - (y2 - y1) * (lon - x1);
        if cross.abs() > BOUNDARY_EPSILON {
            return false;
        }
        lon >= x1.min(x2) - BOUNDARY_EPSILON
            && lon <= x1.max(x2) + BOUNDARY_EPSILON
            && lat >= y1.min(y2) - BOUNDARY_EPSILON
            && lat <= y1.max(y2) + BOUNDARY_EPSILON
    })
}

/// even-odd 射線法
fn crosses_odd(ring: &[Position], lon: f64, lat: f64) -> bool {
    edges(ring).fold(false, |inside, ((x1, y1), (x2, y2))| {
        if (y1 > lat) != (y2 > lat) && lon < (x2 - x1) * (lat - y1) / (y2 - y1) + x1 {
            !inside
        } else {
            inside
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<Position> {
        vec![(min, min), (max, min), (max, max), (min, max), (min, min)]
    }

    #[test]
    fn test_inside_outside() {
        let poly = Polygon::new(square(0.0, 10.0), vec![]).unwrap();
        assert!(poly.contains(5.0, 5.0));
        assert!(!poly.contains(10.5, 5.0));
        assert!(!poly.contains(-0.1, -0.1));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let poly = Polygon::new(square(0.0, 10.0), vec![]).unwrap();
        assert!(poly.contains(0.0, 5.0));
        assert!(poly.contains(10.0, 10.0));
        assert!(poly.contains(3.0, 0.0));
    }

    #[test]
    fn test_holes_exclude_interior_but_not_their_edge() {
        let poly = Polygon::new(square(0.0, 10.0), vec![square(4.0, 6.0)]).unwrap();
        assert!(!poly.contains(5.0, 5.0));
        assert!(poly.contains(4.0, 5.0));
        assert!(poly.contains(2.0, 2.0));
    }

    #[test]
    fn test_concave_polygon() {
        // U 形
        let ring = vec![
            (0.0, 0.0),
            (6.0, 0.0),
            (6.0, 6.0),
            (4.0, 6.0),
            (4.0, 2.0),
            (2.0, 2.0),
            (2.0, 6.0),
            (0.0, 6.0),
        ];
        let poly = Polygon::new(ring, vec![]).unwrap();
        assert!(poly.contains(1.0, 5.0));
        assert!(!poly.contains(3.0, 4.0));
        assert!(poly.contains(3.0, 1.0));
    }

    #[test]
    fn test_degenerate_or_out_of_range_rings_are_rejected() {
        assert!(Polygon::new(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)], vec![]).is_err());
        assert!(Polygon::new(square(0.0, 200.0), vec![]).is_err());
    }
}
