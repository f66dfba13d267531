//! # Pairwise Proximity Matching
//!
//! Finds every pair of fixes from two individuals that are close in both time
//! and space.
//!
//! ## Algorithm
//! 1. Canonicalize the pair so the lexicographically smaller id is `a`
//! 2. Reject tracks that are not sorted by timestamp
//! 3. Skip the pair outright if the time ranges (widened by the window) or the
//!    bounding boxes (widened by the threshold) never meet
//! 4. Sweep track A while a lower-bound pointer trails through track B: the
//!    pointer only moves forward, and for each fix of A only the fixes of B
//!    inside `[t - window, t + window]` are tested
//!
//! For evenly sampled tracks this is `O(n + m)` amortized, compared with
//! `O(n * m)` for the full cross product.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::geo_utils::{bounds_overlap, distance_km, midpoint};
use crate::{GeoPoint, IndividualTrack, TrackPoint};

/// A single fix-to-fix correspondence within the distance and time thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEvent {
    /// Lexicographically smaller individual id
    pub individual_a: String,
    /// Lexicographically larger individual id
    pub individual_b: String,
    pub time_a: DateTime<Utc>,
    pub time_b: DateTime<Utc>,
    pub distance_km: f64,
    /// Mean of the two positions
    pub midpoint: GeoPoint,
    pub position_a: GeoPoint,
    pub position_b: GeoPoint,
}

impl ProximityEvent {
    /// Event between a fix of `track_a` and a fix of `track_b`. Ids come from
    /// the tracks, which the caller has already put in canonical order.
    fn from_fixes(
        track_a: &IndividualTrack,
        a: &TrackPoint,
        track_b: &IndividualTrack,
        b: &TrackPoint,
        distance_km: f64,
    ) -> Self {
        let position_a = a.position();
        let position_b = b.position();
        Self {
            individual_a: track_a.individual_id.clone(),
            individual_b: track_b.individual_id.clone(),
            time_a: a.timestamp,
            time_b: b.timestamp,
            distance_km,
            midpoint: midpoint(&position_a, &position_b),
            position_a,
            position_b,
        }
    }

    /// Earlier of the two fix times.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.time_a.min(self.time_b)
    }

    /// Later of the two fix times.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time_a.max(self.time_b)
    }

    /// Absolute difference between the two fix times.
    pub fn time_offset(&self) -> Duration {
        self.end_time() - self.start_time()
    }
}

/// Strategy for matching one pair of tracks.
///
/// Implementations must return events for the canonical pair (smaller id as
/// `individual_a`) in ascending `time_a` order, and fail with
/// [`AnalysisError::DataOrder`] for a track that is not time-ordered.
pub trait PairMatcher {
    fn match_pair(
        &self,
        a: &IndividualTrack,
        b: &IndividualTrack,
        config: &AnalysisConfig,
    ) -> Result<Vec<ProximityEvent>>;
}

/// Two-pointer sliding-window matcher over time-sorted tracks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepMatcher;

impl PairMatcher for SweepMatcher {
    fn match_pair(
        &self,
        a: &IndividualTrack,
        b: &IndividualTrack,
        config: &AnalysisConfig,
    ) -> Result<Vec<ProximityEvent>> {
        if a.individual_id == b.individual_id {
            return Ok(Vec::new());
        }
        let (a, b) = canonical_pair(a, b);
        ensure_time_ordered(a)?;
        ensure_time_ordered(b)?;

        let window = config.time_window();
        let threshold = config.proximity_threshold_km;

        if !time_ranges_overlap(a, b, window) || !spatially_reachable(a, b, threshold) {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let mut lower = 0;

        for fix_a in &a.points {
            let earliest = fix_a.timestamp - window;
            while lower < b.points.len() && b.points[lower].timestamp < earliest {
                lower += 1;
            }

            let latest = fix_a.timestamp + window;
            let position_a = fix_a.position();

            for fix_b in b.points[lower..].iter().take_while(|p| p.timestamp <= latest) {
                let distance = distance_km(&position_a, &fix_b.position());
                if distance <= threshold {
                    events.push(ProximityEvent::from_fixes(a, fix_a, b, fix_b, distance));
                }
            }
        }

        Ok(events)
    }
}

/// Order two tracks so the smaller individual id comes first.
pub fn canonical_pair<'a>(
    a: &'a IndividualTrack,
    b: &'a IndividualTrack,
) -> (&'a IndividualTrack, &'a IndividualTrack) {
    if a.individual_id <= b.individual_id {
        (a, b)
    } else {
        (b, a)
    }
}

/// Fail with [`AnalysisError::DataOrder`] if a track is not sorted by timestamp.
pub fn ensure_time_ordered(track: &IndividualTrack) -> Result<()> {
    match track.first_order_violation() {
        Some(index) => Err(AnalysisError::DataOrder {
            individual_id: track.individual_id.clone(),
            index,
        }),
        None => Ok(()),
    }
}

/// True if the two observation windows, widened by `window`, intersect.
pub fn time_ranges_overlap(a: &IndividualTrack, b: &IndividualTrack, window: Duration) -> bool {
    match (a.first_time(), a.last_time(), b.first_time(), b.last_time()) {
        (Some(a_first), Some(a_last), Some(b_first), Some(b_last)) => {
            a_first <= b_last + window && b_first <= a_last + window
        }
        _ => false,
    }
}

/// True if the bounding boxes, widened by `threshold_km`, overlap.
fn spatially_reachable(a: &IndividualTrack, b: &IndividualTrack, threshold_km: f64) -> bool {
    let (Some(bounds_a), Some(bounds_b)) = (a.bounds(), b.bounds()) else {
        return false;
    };

    // Widest longitude degrees occur at the highest absolute latitude
    let reference_lat = [bounds_a.min_lat, bounds_a.max_lat, bounds_b.min_lat, bounds_b.max_lat]
        .into_iter()
        .map(f64::abs)
        .fold(0.0, f64::max);

    bounds_overlap(&bounds_a, &bounds_b, threshold_km, reference_lat)
}
