//! # Encounter Hotspots
//!
//! Greedy distance-threshold clustering of episode centroids.
//!
//! ## Algorithm
//! 1. Visit episodes in list order (start time order for analyzer output)
//! 2. The first unassigned centroid seeds a hotspot
//! 3. Every unassigned centroid within `radius_km` of the seed joins it
//! 4. Repeat until every centroid belongs to exactly one hotspot
//!
//! The result depends on visiting order. Feeding episodes in a stable order
//! makes runs reproducible. Candidates are found with an R-tree in degree
//! space and confirmed with the haversine distance, so the outcome is the
//! same as checking every pair.

use log::{debug, info};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::episodes::EncounterEpisode;
use crate::geo_utils::{compute_center, distance_km, km_to_degrees, EARTH_RADIUS_KM};
use crate::progress::CancellationToken;
use crate::GeoPoint;

/// A spatial cluster of encounter locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// Mean of the member episode centroids
    pub centroid: GeoPoint,
    /// Largest distance from the centroid to a member episode centroid
    pub radius_km: f64,
    pub episode_count: u32,
    /// Ids of the member episodes, ascending
    pub contributing_episode_ids: Vec<usize>,
}

// =============================================================================
// R-tree Indexed Centroid
// =============================================================================

/// An episode centroid with its position in the episode slice
#[derive(Debug, Clone, Copy)]
struct IndexedCentroid {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedCentroid {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedCentroid {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Degree-space search radius that contains every point within `radius_km` of `latitude`.
fn search_radius_degrees(radius_km: f64, latitude: f64) -> f64 {
    let lat_reach = radius_km / EARTH_RADIUS_KM.to_radians();
    let widest_lat = (latitude.abs() + lat_reach).min(89.9);
    km_to_degrees(radius_km, widest_lat) * 1.01
}

// =============================================================================
// Clustering
// =============================================================================

/// Cluster episode centroids into hotspots.
///
/// # Example
/// ```
/// use proximity_engine::cluster_hotspots;
///
/// let hotspots = cluster_hotspots(&[], 4.0);
/// assert!(hotspots.is_empty());
/// ```
pub fn cluster_hotspots(episodes: &[EncounterEpisode], radius_km: f64) -> Vec<Hotspot> {
    cluster_hotspots_cancellable(episodes, radius_km, &CancellationToken::new()).unwrap_or_default()
}

/// Cluster episode centroids into hotspots, checking `cancel` before each new hotspot.
///
/// Returns `None` if cancelled. Hotspots are ordered by descending
/// `episode_count`, then ascending centroid latitude and longitude.
pub fn cluster_hotspots_cancellable(
    episodes: &[EncounterEpisode],
    radius_km: f64,
    cancel: &CancellationToken,
) -> Option<Vec<Hotspot>> {
    if episodes.is_empty() {
        return Some(Vec::new());
    }

    let indexed: Vec<IndexedCentroid> = episodes
        .iter()
        .enumerate()
        .map(|(idx, e)| IndexedCentroid {
            idx,
            lat: e.centroid.latitude,
            lng: e.centroid.longitude,
        })
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut assigned = vec![false; episodes.len()];
    let mut hotspots = Vec::new();

    for seed in 0..episodes.len() {
        if assigned[seed] {
            continue;
        }
        if cancel.is_cancelled() {
            debug!("[Hotspots] Cancelled after {} hotspots", hotspots.len());
            return None;
        }

        let seed_position = episodes[seed].centroid;
        let search_deg = search_radius_degrees(radius_km, seed_position.latitude);

        let mut members: Vec<usize> = tree
            .locate_within_distance([seed_position.latitude, seed_position.longitude], search_deg * search_deg)
            .map(|c| c.idx)
            .filter(|&idx| {
                idx != seed
                    && !assigned[idx]
                    && distance_km(&seed_position, &episodes[idx].centroid) <= radius_km
            })
            .collect();
        members.push(seed);
        members.sort_unstable();

        for &idx in &members {
            assigned[idx] = true;
        }

        hotspots.push(build_hotspot(episodes, members));
    }

    hotspots.sort_by(|a, b| {
        b.episode_count
            .cmp(&a.episode_count)
            .then(a.centroid.latitude.total_cmp(&b.centroid.latitude))
            .then(a.centroid.longitude.total_cmp(&b.centroid.longitude))
    });

    info!(
        "[Hotspots] {} hotspots from {} episodes (radius {:.2} km)",
        hotspots.len(),
        episodes.len(),
        radius_km
    );

    Some(hotspots)
}

fn build_hotspot(episodes: &[EncounterEpisode], members: Vec<usize>) -> Hotspot {
    let positions: Vec<GeoPoint> = members.iter().map(|&idx| episodes[idx].centroid).collect();
    let centroid = compute_center(&positions).unwrap_or(positions[0]);
    let radius_km = positions
        .iter()
        .map(|p| distance_km(&centroid, p))
        .fold(0.0, f64::max);

    Hotspot {
        centroid,
        radius_km,
        episode_count: members.len() as u32,
        contributing_episode_ids: members.iter().map(|&idx| episodes[idx].id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn episode(id: usize, lat: f64, lng: f64) -> EncounterEpisode {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::hours(id as i64);
        EncounterEpisode {
            id,
            individual_a: "A".to_string(),
            individual_b: "B".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(10),
            duration_seconds: 600,
            event_count: 2,
            min_distance_km: 0.3,
            avg_distance_km: 0.4,
            centroid: GeoPoint::new(lat, lng),
        }
    }

    /// Same greedy rule without the spatial index.
    fn brute_force(episodes: &[EncounterEpisode], radius_km: f64) -> Vec<Vec<usize>> {
        let mut assigned = vec![false; episodes.len()];
        let mut groups = Vec::new();
        for seed in 0..episodes.len() {
            if assigned[seed] {
                continue;
            }
            let group: Vec<usize> = (0..episodes.len())
                .filter(|&j| {
                    !assigned[j] && distance_km(&episodes[seed].centroid, &episodes[j].centroid) <= radius_km
                })
                .collect();
            for &j in &group {
                assigned[j] = true;
            }
            groups.push(group);
        }
        groups
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_hotspots(&[], 4.0).is_empty());
    }

    #[test]
    fn test_single_episode() {
        let hotspots = cluster_hotspots(&[episode(0, 46.55, 7.98)], 4.0);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].episode_count, 1);
        assert_eq!(hotspots[0].radius_km, 0.0);
        assert_eq!(hotspots[0].contributing_episode_ids, vec![0]);
    }

    #[test]
    fn test_two_separate_sites() {
        let episodes = vec![
            episode(0, 46.550, 7.980),
            episode(1, 46.700, 8.300),
            episode(2, 46.552, 7.982),
            episode(3, 46.551, 7.979),
            episode(4, 46.701, 8.301),
        ];

        let hotspots = cluster_hotspots(&episodes, 1.0);
        assert_eq!(hotspots.len(), 2);
        assert_eq!(hotspots[0].contributing_episode_ids, vec![0, 2, 3]);
        assert_eq!(hotspots[1].contributing_episode_ids, vec![1, 4]);
        assert!(hotspots[0].radius_km > 0.0 && hotspots[0].radius_km < 1.0);
        assert!((hotspots[1].centroid.latitude - 46.7005).abs() < 1e-9);
    }

    #[test]
    fn test_ties_ranked_by_latitude_then_longitude() {
        let episodes = vec![
            episode(0, 46.90, 8.00),
            episode(1, 46.50, 8.40),
            episode(2, 46.50, 8.00),
        ];

        let hotspots = cluster_hotspots(&episodes, 1.0);
        let order: Vec<_> = hotspots.iter().map(|h| h.contributing_episode_ids[0]).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_counts_sum_to_episode_total() {
        let episodes: Vec<_> = (0..60)
            .map(|i| episode(i, 46.5 + (i % 7) as f64 * 0.013, 7.9 + (i % 5) as f64 * 0.017))
            .collect();

        let hotspots = cluster_hotspots(&episodes, 1.5);
        let total: u32 = hotspots.iter().map(|h| h.episode_count).sum();
        assert_eq!(total, 60);

        let mut ids: Vec<usize> = hotspots.iter().flat_map(|h| h.contributing_episode_ids.clone()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_matches_brute_force_rule() {
        let episodes: Vec<_> = (0..80)
            .map(|i| {
                let x = (i * 37 % 101) as f64 / 101.0;
                let y = (i * 53 % 97) as f64 / 97.0;
                episode(i, 46.4 + x * 0.3, 7.8 + y * 0.4)
            })
            .collect();

        for radius in [0.5, 2.0, 6.0] {
            let mut expected = brute_force(&episodes, radius);
            let mut actual: Vec<Vec<usize>> = cluster_hotspots(&episodes, radius)
                .into_iter()
                .map(|h| h.contributing_episode_ids)
                .collect();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "radius {radius}");
        }
    }

    #[test]
    fn test_cancelled_clustering_returns_none() {
        let token = CancellationToken::new();
        token.cancel();
        let episodes = vec![episode(0, 46.55, 7.98)];
        assert!(cluster_hotspots_cancellable(&episodes, 1.0, &token).is_none());
    }
}
