//! Aggregate statistics over encounter episodes.
//!
//! Everything here is a pure function of the episode list. Averages and
//! extrema are `None` when there is nothing to average, never NaN.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::episodes::EncounterEpisode;

/// Number of equal-width bins in the distance distribution.
pub const DISTANCE_BINS: usize = 10;

/// All statistics for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterStatistics {
    pub overview: OverviewStatistics,
    /// One entry per pair with at least one episode, ordered by pair ids
    pub per_pair: Vec<PairStatistics>,
    pub temporal: TemporalStatistics,
    pub distance: DistanceDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewStatistics {
    pub total_episodes: u32,
    /// Raw proximity events across all episodes
    pub total_events: u32,
    pub unique_pairs: u32,
    /// Individuals involved in at least one episode
    pub unique_individuals: u32,
    pub first_encounter: Option<DateTime<Utc>>,
    pub last_encounter: Option<DateTime<Utc>>,
    /// Seconds between the first episode start and the last episode end
    pub span_seconds: i64,
    /// Calendar days (UTC) from first to last encounter, inclusive
    pub days_covered: u32,
    pub episodes_per_day: f64,
    pub total_duration_seconds: i64,
    pub mean_duration_seconds: Option<f64>,
    pub min_distance_km: Option<f64>,
    /// Mean over all raw events
    pub mean_distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStatistics {
    pub individual_a: String,
    pub individual_b: String,
    pub episode_count: u32,
    pub event_count: u32,
    pub total_duration_seconds: i64,
    /// Mean over the pair's raw events
    pub avg_distance_km: f64,
    pub min_distance_km: f64,
    pub first_encounter: DateTime<Utc>,
    pub last_encounter: DateTime<Utc>,
}

/// Episode counts by start time (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalStatistics {
    /// Index = hour of day, 0-23
    pub hourly: [u32; 24],
    /// Index = day of week, Monday = 0
    pub weekday: [u32; 7],
    /// Index = month, January = 0
    pub monthly: [u32; 12],
    /// Calendar days with at least one episode, in date order
    pub daily: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub episodes: u32,
}

/// Distribution of each episode's closest approach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceDistribution {
    pub bin_width_km: f64,
    /// `DISTANCE_BINS` counts covering `[0, proximity_threshold_km]`
    pub bins: Vec<u32>,
    pub min_km: Option<f64>,
    pub max_km: Option<f64>,
    pub mean_km: Option<f64>,
    pub median_km: Option<f64>,
}

/// Compute all statistics for a list of episodes.
///
/// `proximity_threshold_km` sets the range of the distance histogram.
///
/// # Example
/// ```
/// use proximity_engine::compute_statistics;
///
/// let stats = compute_statistics(&[], 2.0);
/// assert_eq!(stats.overview.total_episodes, 0);
/// assert_eq!(stats.overview.episodes_per_day, 0.0);
/// assert!(stats.overview.mean_distance_km.is_none());
/// assert!(stats.per_pair.is_empty());
/// ```
pub fn compute_statistics(episodes: &[EncounterEpisode], proximity_threshold_km: f64) -> EncounterStatistics {
    EncounterStatistics {
        overview: overview(episodes),
        per_pair: per_pair(episodes),
        temporal: temporal(episodes),
        distance: distance_distribution(episodes, proximity_threshold_km),
    }
}

fn overview(episodes: &[EncounterEpisode]) -> OverviewStatistics {
    let total_events: u32 = episodes.iter().map(|e| e.event_count).sum();
    let pairs: BTreeSet<(&str, &str)> = episodes.iter().map(|e| e.pair()).collect();
    let individuals: BTreeSet<&str> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();

    let first_encounter = episodes.iter().map(|e| e.start_time).min();
    let last_encounter = episodes.iter().map(|e| e.end_time).max();

    let (span_seconds, days_covered) = match (first_encounter, last_encounter) {
        (Some(first), Some(last)) => {
            let days = (last.date_naive() - first.date_naive()).num_days() + 1;
            ((last - first).num_seconds(), days.max(1) as u32)
        }
        _ => (0, 0),
    };

    let episodes_per_day = if days_covered > 0 {
        episodes.len() as f64 / days_covered as f64
    } else {
        0.0
    };

    let total_duration_seconds: i64 = episodes.iter().map(|e| e.duration_seconds).sum();

    OverviewStatistics {
        total_episodes: episodes.len() as u32,
        total_events,
        unique_pairs: pairs.len() as u32,
        unique_individuals: individuals.len() as u32,
        first_encounter,
        last_encounter,
        span_seconds,
        days_covered,
        episodes_per_day,
        total_duration_seconds,
        mean_duration_seconds: mean(episodes.iter().map(|e| e.duration_seconds as f64)),
        min_distance_km: episodes.iter().map(|e| e.min_distance_km).reduce(f64::min),
        mean_distance_km: event_weighted_distance(episodes.iter()),
    }
}

fn per_pair(episodes: &[EncounterEpisode]) -> Vec<PairStatistics> {
    let mut by_pair: BTreeMap<(&str, &str), Vec<&EncounterEpisode>> = BTreeMap::new();
    for episode in episodes {
        by_pair.entry(episode.pair()).or_default().push(episode);
    }

    by_pair
        .into_iter()
        .filter_map(|((a, b), pair_episodes)| {
            Some(PairStatistics {
                individual_a: a.to_string(),
                individual_b: b.to_string(),
                episode_count: pair_episodes.len() as u32,
                event_count: pair_episodes.iter().map(|e| e.event_count).sum(),
                total_duration_seconds: pair_episodes.iter().map(|e| e.duration_seconds).sum(),
                avg_distance_km: event_weighted_distance(pair_episodes.iter().copied())?,
                min_distance_km: pair_episodes.iter().map(|e| e.min_distance_km).reduce(f64::min)?,
                first_encounter: pair_episodes.iter().map(|e| e.start_time).min()?,
                last_encounter: pair_episodes.iter().map(|e| e.end_time).max()?,
            })
        })
        .collect()
}

fn temporal(episodes: &[EncounterEpisode]) -> TemporalStatistics {
    let mut hourly = [0u32; 24];
    let mut weekday = [0u32; 7];
    let mut monthly = [0u32; 12];
    let mut daily: BTreeMap<NaiveDate, u32> = BTreeMap::new();

    for episode in episodes {
        let start = episode.start_time;
        hourly[start.hour() as usize] += 1;
        weekday[start.weekday().num_days_from_monday() as usize] += 1;
        monthly[start.month0() as usize] += 1;
        *daily.entry(start.date_naive()).or_insert(0) += 1;
    }

    TemporalStatistics {
        hourly,
        weekday,
        monthly,
        daily: daily
            .into_iter()
            .map(|(date, episodes)| DailyCount { date, episodes })
            .collect(),
    }
}

fn distance_distribution(episodes: &[EncounterEpisode], proximity_threshold_km: f64) -> DistanceDistribution {
    let mut distances: Vec<f64> = episodes.iter().map(|e| e.min_distance_km).collect();
    distances.sort_by(f64::total_cmp);

    let bin_width_km = if proximity_threshold_km.is_finite() && proximity_threshold_km > 0.0 {
        proximity_threshold_km / DISTANCE_BINS as f64
    } else {
        0.0
    };

    let mut bins = vec![0u32; DISTANCE_BINS];
    for &d in &distances {
        let index = if bin_width_km > 0.0 {
            ((d / bin_width_km) as usize).min(DISTANCE_BINS - 1)
        } else {
            0
        };
        bins[index] += 1;
    }

    let median_km = match distances.len() {
        0 => None,
        n if n % 2 == 1 => Some(distances[n / 2]),
        n => Some((distances[n / 2 - 1] + distances[n / 2]) / 2.0),
    };

    DistanceDistribution {
        bin_width_km,
        bins,
        min_km: distances.first().copied(),
        max_km: distances.last().copied(),
        mean_km: mean(distances.iter().copied()),
        median_km,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean distance over the raw events behind a set of episodes.
fn event_weighted_distance<'a>(episodes: impl Iterator<Item = &'a EncounterEpisode>) -> Option<f64> {
    let (sum, count) = episodes.fold((0.0, 0u32), |(s, c), e| {
        (s + e.avg_distance_km * e.event_count as f64, c + e.event_count)
    });
    (count > 0).then(|| sum / count as f64)
}
