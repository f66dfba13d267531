//! # Proximity Engine
//!
//! Spatio-temporal proximity analysis for GPS-tagged animals.
//!
//! This library provides:
//! - Pairwise proximity detection across irregularly sampled tracks (sliding-window sweep)
//! - Merging of raw proximity events into encounter episodes
//! - Overview, per-pair, temporal and distance statistics
//! - Greedy hotspot clustering of encounter locations
//! - Cooperative cancellation and progress reporting for long runs
//!
//! ## Features
//!
//! - **`parallel`** - Process pairs of individuals in parallel with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use proximity_engine::{AnalysisConfig, IndividualTrack, ProximityAnalyzer, TrackPoint};
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
//! let track = |id: &str, lng: f64| {
//!     let points = (0..6)
//!         .map(|i| TrackPoint::new(id, t0 + Duration::minutes(10 * i), 46.55, lng))
//!         .collect();
//!     IndividualTrack::new(id, points)
//! };
//!
//! let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
//! let result = analyzer.analyze(&[track("A", 7.980), track("B", 7.985)]).unwrap();
//!
//! assert!(result.is_complete());
//! assert_eq!(result.episodes.len(), 1);
//! assert_eq!(result.statistics.overview.unique_pairs, 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AnalysisError, AnalysisWarning, Result};

// Geographic utilities (distance, bounds, center calculations)
pub mod geo_utils;

// Analysis configuration
pub mod config;
pub use config::AnalysisConfig;

// Cancellation and progress reporting
pub mod progress;
pub use progress::{CancellationToken, ProgressCallback};

// Pairwise matching (sliding-window sweep)
pub mod matcher;
pub use matcher::{PairMatcher, ProximityEvent, SweepMatcher};

// Encounter episode building (interval merge)
pub mod episodes;
pub use episodes::{EncounterEpisode, build_episodes, merge_spans};

// Aggregate statistics
pub mod statistics;
pub use statistics::{
    DistanceDistribution, EncounterStatistics, OverviewStatistics, PairStatistics,
    TemporalStatistics, compute_statistics,
};

// Hotspot clustering
pub mod hotspots;
pub use hotspots::{Hotspot, cluster_hotspots, cluster_hotspots_cancellable};

// Orchestration
pub mod analysis;
pub use analysis::{AnalysisResult, AnalysisStatus, ProximityAnalyzer, RunMetadata, SkippedPair};

// JSON/CSV export helpers
pub mod export;
pub use export::{EncounterWindow, encounter_window, episodes_to_csv, write_episodes_csv};

// ============================================================================
// Core Types
// ============================================================================

/// A coordinate with latitude and longitude in decimal degrees.
///
/// # Example
/// ```
/// use proximity_engine::GeoPoint;
/// let point = GeoPoint::new(46.5480, 7.9850);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates. Returns `None` if there are none.
    pub fn from_positions(positions: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        let mut positions = positions.into_iter();
        let first = positions.next()?;
        let mut bounds = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lng: first.longitude,
            max_lng: first.longitude,
        };

        for p in positions {
            bounds.min_lat = bounds.min_lat.min(p.latitude);
            bounds.max_lat = bounds.max_lat.max(p.latitude);
            bounds.min_lng = bounds.min_lng.min(p.longitude);
            bounds.max_lng = bounds.max_lng.max(p.longitude);
        }

        Some(bounds)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A single location fix of one tagged individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Identifier of the tagged individual
    pub individual_id: String,
    /// Fix time (UTC, second precision)
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters, when the logger recorded one
    pub altitude: Option<f64>,
}

impl TrackPoint {
    /// Create a fix without altitude.
    pub fn new(individual_id: &str, timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            individual_id: individual_id.to_string(),
            timestamp,
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Attach an altitude in meters.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Horizontal position of the fix.
    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// The time-ordered fixes of one individual.
///
/// Points are expected in ascending timestamp order. The matcher verifies
/// this and refuses to process a track that violates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualTrack {
    pub individual_id: String,
    pub points: Vec<TrackPoint>,
}

impl IndividualTrack {
    pub fn new(individual_id: &str, points: Vec<TrackPoint>) -> Self {
        Self {
            individual_id: individual_id.to_string(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the first fix.
    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    /// Timestamp of the last fix.
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Index of the first point whose timestamp is earlier than its predecessor's.
    pub fn first_order_violation(&self) -> Option<usize> {
        self.points
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
            .map(|i| i + 1)
    }

    /// True if timestamps are monotonically non-decreasing.
    pub fn is_time_ordered(&self) -> bool {
        self.first_order_violation().is_none()
    }

    /// Bounding box of all fixes.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_positions(self.points.iter().map(TrackPoint::position))
    }
}

/// Split a flat list of fixes into one track per individual.
///
/// Tracks are returned sorted by individual id. The relative order of each
/// individual's fixes is preserved, so time-ordered input yields time-ordered
/// tracks.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use proximity_engine::{TrackPoint, group_by_individual};
///
/// let t = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
/// let fixes = vec![
///     TrackPoint::new("B", t, 46.5, 8.0),
///     TrackPoint::new("A", t, 46.6, 8.1),
/// ];
///
/// let tracks = group_by_individual(fixes);
/// assert_eq!(tracks[0].individual_id, "A");
/// assert_eq!(tracks[1].individual_id, "B");
/// ```
pub fn group_by_individual(points: Vec<TrackPoint>) -> Vec<IndividualTrack> {
    let mut by_id: std::collections::BTreeMap<String, Vec<TrackPoint>> = std::collections::BTreeMap::new();
    for point in points {
        by_id.entry(point.individual_id.clone()).or_default().push(point);
    }

    by_id
        .into_iter()
        .map(|(individual_id, points)| IndividualTrack { individual_id, points })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
