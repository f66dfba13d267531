//! # Encounter Episodes
//!
//! Merges raw proximity events into continuous encounters, one pair at a time.
//!
//! Events of a pair are ordered by their start (the earlier of the two fix
//! times). An event joins the current episode when the time between the
//! episode's end so far and the event's start is at most `episode_gap`;
//! otherwise it opens a new episode. This is a single-pass interval merge.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo_utils::compute_center;
use crate::matcher::ProximityEvent;
use crate::GeoPoint;

/// A merged, continuous run of proximity events for one pair of individuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterEpisode {
    /// Position of the episode in the ordered episode list
    pub id: usize,
    pub individual_a: String,
    pub individual_b: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Number of raw proximity events merged into this episode
    pub event_count: u32,
    pub min_distance_km: f64,
    pub avg_distance_km: f64,
    /// Mean of the event midpoints
    pub centroid: GeoPoint,
}

impl EncounterEpisode {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }

    /// Canonical pair ids.
    pub fn pair(&self) -> (&str, &str) {
        (&self.individual_a, &self.individual_b)
    }

    pub fn involves(&self, individual_id: &str) -> bool {
        self.individual_a == individual_id || self.individual_b == individual_id
    }
}

/// Group sorted time spans into runs separated by more than `gap`.
///
/// `spans` must be sorted by start. Each returned range indexes a run of
/// consecutive spans where every span starts no later than `gap` after the
/// latest end seen so far in the run.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use proximity_engine::merge_spans;
///
/// let t = |m| Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(m);
/// let spans = vec![(t(0), t(5)), (t(20), t(25)), (t(90), t(95))];
///
/// let runs = merge_spans(&spans, Duration::minutes(30));
/// assert_eq!(runs, vec![0..2, 2..3]);
/// ```
pub fn merge_spans(spans: &[(DateTime<Utc>, DateTime<Utc>)], gap: Duration) -> Vec<Range<usize>> {
    let Some(&(_, first_end)) = spans.first() else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut run_start = 0;
    let mut run_end = first_end;

    for (i, &(start, end)) in spans.iter().enumerate().skip(1) {
        if start - run_end <= gap {
            run_end = run_end.max(end);
        } else {
            runs.push(run_start..i);
            run_start = i;
            run_end = end;
        }
    }
    runs.push(run_start..spans.len());

    runs
}

/// Build encounter episodes from raw proximity events.
///
/// Events from any number of pairs may be mixed; they are merged per pair.
/// The returned episodes are ordered by `(start_time, individual_a,
/// individual_b)` and their `id` is their index in that order.
///
/// No events yields no episodes.
pub fn build_episodes(events: &[ProximityEvent], episode_gap: Duration) -> Vec<EncounterEpisode> {
    let mut by_pair: BTreeMap<(&str, &str), Vec<&ProximityEvent>> = BTreeMap::new();
    for event in events {
        by_pair
            .entry((event.individual_a.as_str(), event.individual_b.as_str()))
            .or_default()
            .push(event);
    }

    let mut episodes: Vec<EncounterEpisode> = Vec::new();
    for pair_events in by_pair.values_mut() {
        pair_events.sort_by(|x, y| {
            x.start_time()
                .cmp(&y.start_time())
                .then(x.end_time().cmp(&y.end_time()))
        });

        let spans: Vec<_> = pair_events
            .iter()
            .map(|e| (e.start_time(), e.end_time()))
            .collect();

        episodes.extend(
            merge_spans(&spans, episode_gap)
                .into_iter()
                .filter_map(|run| summarize(&pair_events[run])),
        );
    }

    episodes.sort_by(|x, y| {
        x.start_time
            .cmp(&y.start_time)
            .then_with(|| x.individual_a.cmp(&y.individual_a))
            .then_with(|| x.individual_b.cmp(&y.individual_b))
    });
    for (id, episode) in episodes.iter_mut().enumerate() {
        episode.id = id;
    }

    episodes
}

/// Summarize one run of a pair's events. Returns `None` for an empty run.
fn summarize(events: &[&ProximityEvent]) -> Option<EncounterEpisode> {
    let first = events.first()?;
    let midpoints: Vec<GeoPoint> = events.iter().map(|e| e.midpoint).collect();
    let centroid = compute_center(&midpoints)?;

    let start_time = events.iter().map(|e| e.start_time()).min()?;
    let end_time = events.iter().map(|e| e.end_time()).max()?;
    let min_distance_km = events.iter().map(|e| e.distance_km).fold(f64::INFINITY, f64::min);
    let avg_distance_km = events.iter().map(|e| e.distance_km).sum::<f64>() / events.len() as f64;

    Some(EncounterEpisode {
        id: 0,
        individual_a: first.individual_a.clone(),
        individual_b: first.individual_b.clone(),
        start_time,
        end_time,
        duration_seconds: (end_time - start_time).num_seconds(),
        event_count: events.len() as u32,
        min_distance_km,
        avg_distance_km,
        centroid,
    })
}
