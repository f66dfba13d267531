//! Analysis configuration.
//!
//! All thresholds are carried in one immutable [`AnalysisConfig`] that is
//! handed to the analyzer, so repeated runs with different parameters never
//! share state.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Default hotspot radius as a multiple of the proximity threshold.
pub const HOTSPOT_RADIUS_FACTOR: f64 = 2.0;

/// Configuration for proximity analysis.
///
/// Deserializes from partial JSON: missing fields take their defaults.
///
/// # Example
/// ```
/// use proximity_engine::AnalysisConfig;
///
/// let config: AnalysisConfig = serde_json::from_str(r#"{"proximity_threshold_km": 0.5}"#).unwrap();
/// assert_eq!(config.proximity_threshold_km, 0.5);
/// assert_eq!(config.time_window_minutes, 30.0);
/// assert_eq!(config.hotspot_radius_km(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum distance between two individuals to count as a proximity event.
    /// Default: 2.0 km
    pub proximity_threshold_km: f64,

    /// Maximum difference between two fix timestamps for them to be compared.
    /// Default: 30 minutes
    pub time_window_minutes: f64,

    /// Maximum gap between consecutive events of the same episode.
    /// Default: `None`, meaning the time window is used
    pub episode_gap_minutes: Option<f64>,

    /// Radius used to absorb episode centroids into a hotspot.
    /// Default: `None`, meaning `HOTSPOT_RADIUS_FACTOR` x proximity threshold
    pub hotspot_radius_km: Option<f64>,

    /// Skip pairs involving a track that is not time-ordered instead of failing the run.
    /// Skipped pairs are listed in the result metadata. Default: false
    pub skip_unordered_tracks: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_km: 2.0,
            time_window_minutes: 30.0,
            episode_gap_minutes: None,
            hotspot_radius_km: None,
            skip_unordered_tracks: false,
        }
    }
}

impl AnalysisConfig {
    /// Check every threshold. Called by the analyzer before any computation.
    pub fn validate(&self) -> Result<()> {
        if !self.proximity_threshold_km.is_finite() || self.proximity_threshold_km <= 0.0 {
            return Err(AnalysisError::invalid_config(
                "proximity_threshold_km",
                self.proximity_threshold_km,
                "must be a positive number",
            ));
        }
        if !self.time_window_minutes.is_finite() || self.time_window_minutes <= 0.0 {
            return Err(AnalysisError::invalid_config(
                "time_window_minutes",
                self.time_window_minutes,
                "must be a positive number",
            ));
        }
        if let Some(gap) = self.episode_gap_minutes {
            if !gap.is_finite() || gap < 0.0 {
                return Err(AnalysisError::invalid_config(
                    "episode_gap_minutes",
                    gap,
                    "must be zero or a positive number",
                ));
            }
        }
        if let Some(radius) = self.hotspot_radius_km {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(AnalysisError::invalid_config(
                    "hotspot_radius_km",
                    radius,
                    "must be a positive number",
                ));
            }
        }
        Ok(())
    }

    /// Time window as a duration, rounded to the millisecond.
    pub fn time_window(&self) -> Duration {
        minutes_to_duration(self.time_window_minutes)
    }

    /// Effective episode gap.
    pub fn episode_gap(&self) -> Duration {
        self.episode_gap_minutes
            .map(minutes_to_duration)
            .unwrap_or_else(|| self.time_window())
    }

    /// Effective hotspot radius in kilometers.
    pub fn hotspot_radius_km(&self) -> f64 {
        self.hotspot_radius_km
            .unwrap_or(self.proximity_threshold_km * HOTSPOT_RADIUS_FACTOR)
    }
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}
