//! Nearest-entry search strategies.
//!
//! Both strategies rank by exact geodesic distance and break ties in favour
//! of the entry that comes first in the catalog. The R-tree stores points on
//! the unit sphere, so chord length orders candidates by great-circle
//! distance, and the search stops only once no remaining candidate can beat
//! the best exact distance found.

use crate::catalog::entry::CatalogEntry;
use crate::catalog::geodesic::geodesic_km;
use crate::types::location::LatLon;
use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Upper bound on the relative gap between spherical and ellipsoidal distance.
const SPHERE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NearestStrategy {
    /// Scan every entry.
    #[default]
    Linear,
    /// Query an R-tree for candidates, then rank them exactly.
    SpatialIndex,
}

/// Index of the closest entry and its distance in km.
pub fn nearest_linear(entries: &[CatalogEntry], target: LatLon) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, entry) in entries.iter().enumerate() {
        let Some(distance) = geodesic_km(target, entry.lat_lon()) else {
            continue;
        };
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }
    best
}

fn unit_vector(point: LatLon) -> [f64; 3] {
    let (lat, lon) = (point.0.to_radians(), point.1.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Great-circle km for a chord between two unit vectors.
fn chord_to_km(chord: f64) -> f64 {
    2.0 * EARTH_RADIUS_KM * (chord / 2.0).clamp(0.0, 1.0).asin()
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    point: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for IndexedPoint {
    // Squared chord length; monotone in great-circle distance.
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.point
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// R-tree over the positions of catalog entries on the unit sphere.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    rtree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    pub fn build(entries: &[CatalogEntry]) -> Self {
        let points = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.lat_lon().is_valid())
            .map(|(index, entry)| IndexedPoint {
                index,
                point: unit_vector(entry.lat_lon()),
            })
            .collect();
        Self {
            rtree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// Same contract as [`nearest_linear`]; `entries` must be the slice the
    /// index was built from.
    pub fn nearest(&self, entries: &[CatalogEntry], target: LatLon) -> Option<(usize, f64)> {
        if !target.is_valid() {
            return None;
        }
        let query = unit_vector(target);
        let mut best: Option<(usize, f64)> = None;
        for candidate in self.rtree.nearest_neighbor_iter(&query) {
            let lower_bound =
                chord_to_km(candidate.distance_2(&query).sqrt()) * (1.0 - SPHERE_TOLERANCE);
            if best.is_some_and(|(_, best_distance)| lower_bound > best_distance) {
                break;
            }
            let Some(entry) = entries.get(candidate.index) else {
                continue;
            };
            let Some(distance) = geodesic_km(target, entry.lat_lon()) else {
                continue;
            };
            let key = (OrderedFloat(distance), candidate.index);
            let closer = best.map_or(true, |(index, best_distance)| {
                key < (OrderedFloat(best_distance), index)
            });
            if closer {
                best = Some((candidate.index, distance));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, latitude: f64, longitude: f64) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            name: code.to_string(),
            latitude,
            longitude,
            elevation: None,
        }
    }

    fn sample() -> Vec<CatalogEntry> {
        vec![
            entry("08019", 41.3874, 2.1686),
            entry("28079", 40.4168, -3.7038),
            entry("46250", 39.4699, -0.3763),
            entry("41091", 37.3891, -5.9845),
            entry("15030", 43.3623, -8.4115),
        ]
    }

    #[test]
    fn linear_search_finds_closest() {
        let entries = sample();
        let found = nearest_linear(&entries, LatLon(40.45, -3.70));
        assert_eq!(found.map(|(i, _)| entries[i].code.as_str()), Some("28079"));
    }

    #[test]
    fn first_entry_wins_ties() {
        let entries = vec![
            entry("first", 40.0, -3.0),
            entry("second", 40.0, -3.0),
        ];
        let target = LatLon(40.1, -3.1);

        assert_eq!(nearest_linear(&entries, target).map(|(i, _)| i), Some(0));
        let index = SpatialIndex::build(&entries);
        assert_eq!(index.nearest(&entries, target).map(|(i, _)| i), Some(0));
    }

    #[test]
    fn strategies_agree() {
        let entries = sample();
        let index = SpatialIndex::build(&entries);
        for target in [
            LatLon(40.45, -3.70),
            LatLon(41.0, 1.0),
            LatLon(38.0, -1.0),
            LatLon(42.9, -7.5),
        ] {
            assert_eq!(
                nearest_linear(&entries, target).map(|(i, _)| i),
                index.nearest(&entries, target).map(|(i, _)| i),
                "target {target:?}"
            );
        }
    }

    #[test]
    fn nearest_is_found_past_many_closer_looking_candidates() {
        // One entry 0.1° east (about 8.5 km) and 25 entries 0.09° north
        // (about 10 km), which are closer in raw degrees.
        let target = LatLon(40.0, -3.0);
        let mut entries = vec![entry("east", 40.0, -2.9)];
        for i in 0..25 {
            let offset = i as f64 * 1e-5;
            entries.push(entry(&format!("north{i}"), 40.09, -3.0 + offset));
        }
        let index = SpatialIndex::build(&entries);

        let linear = nearest_linear(&entries, target);
        let indexed = index.nearest(&entries, target);
        assert_eq!(linear.map(|(i, _)| i), Some(0));
        assert_eq!(indexed.map(|(i, _)| i), Some(0));
        assert!(indexed.is_some_and(|(_, km)| (km - 8.54).abs() < 0.1));
    }

    #[test]
    fn chord_length_maps_to_great_circle_km() {
        let a = unit_vector(LatLon(0.0, 0.0));
        let b = unit_vector(LatLon(0.0, 90.0));
        let chord = IndexedPoint { index: 0, point: a }.distance_2(&b).sqrt();
        let quarter = std::f64::consts::FRAC_PI_2 * EARTH_RADIUS_KM;
        assert!((chord_to_km(chord) - quarter).abs() < 1e-6);
    }

    #[test]
    fn empty_catalog_has_no_nearest() {
        let index = SpatialIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(nearest_linear(&[], LatLon(40.0, -3.0)), None);
        assert_eq!(index.nearest(&[], LatLon(40.0, -3.0)), None);
    }
}
