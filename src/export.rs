//! Export helpers for downstream consumers.
//!
//! JSON export of a whole run lives on [`crate::AnalysisResult::to_json`].
//! This module covers the tabular episode export and the track excerpts
//! used to replay a single encounter.

use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::episodes::EncounterEpisode;
use crate::error::Result;
use crate::IndividualTrack;

/// Column names, in `EpisodeRow` field order.
const EPISODE_COLUMNS: [&str; 11] = [
    "episode_id",
    "individual_a",
    "individual_b",
    "start_time",
    "end_time",
    "duration_minutes",
    "event_count",
    "min_distance_km",
    "avg_distance_km",
    "centroid_latitude",
    "centroid_longitude",
];

/// One CSV row per episode.
#[derive(Serialize)]
struct EpisodeRow<'a> {
    episode_id: usize,
    individual_a: &'a str,
    individual_b: &'a str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: f64,
    event_count: u32,
    min_distance_km: f64,
    avg_distance_km: f64,
    centroid_latitude: f64,
    centroid_longitude: f64,
}

impl<'a> From<&'a EncounterEpisode> for EpisodeRow<'a> {
    fn from(episode: &'a EncounterEpisode) -> Self {
        Self {
            episode_id: episode.id,
            individual_a: &episode.individual_a,
            individual_b: &episode.individual_b,
            start_time: episode.start_time,
            end_time: episode.end_time,
            duration_minutes: episode.duration_minutes(),
            event_count: episode.event_count,
            min_distance_km: episode.min_distance_km,
            avg_distance_km: episode.avg_distance_km,
            centroid_latitude: episode.centroid.latitude,
            centroid_longitude: episode.centroid.longitude,
        }
    }
}

/// Write episodes as CSV. The header row is written even when there are no episodes.
pub fn write_episodes_csv<W: Write>(episodes: &[EncounterEpisode], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(EPISODE_COLUMNS)?;
    for episode in episodes {
        wtr.serialize(EpisodeRow::from(episode))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Render episodes as a CSV string with a header row.
///
/// # Example
/// ```
/// use proximity_engine::episodes_to_csv;
///
/// let csv = episodes_to_csv(&[]).unwrap();
/// assert!(csv.starts_with("episode_id,individual_a,individual_b,"));
/// assert_eq!(csv.lines().count(), 1);
/// ```
pub fn episodes_to_csv(episodes: &[EncounterEpisode]) -> Result<String> {
    let mut buf = Vec::new();
    write_episodes_csv(episodes, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// The fixes of an episode's two individuals around the encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterWindow {
    pub episode_id: usize,
    /// Episode start minus the buffer
    pub start: DateTime<Utc>,
    /// Episode end plus the buffer
    pub end: DateTime<Utc>,
    /// Track excerpts ordered by individual id. Individuals without fixes in
    /// the window are left out.
    pub tracks: Vec<IndividualTrack>,
}

/// Cut the two individuals' tracks down to `[start - buffer, end + buffer]`.
pub fn encounter_window(
    episode: &EncounterEpisode,
    tracks: &[IndividualTrack],
    buffer: Duration,
) -> EncounterWindow {
    let start = episode.start_time - buffer;
    let end = episode.end_time + buffer;

    let excerpts = [&episode.individual_a, &episode.individual_b]
        .into_iter()
        .filter_map(|id| tracks.iter().find(|t| &t.individual_id == id))
        .map(|track| IndividualTrack {
            individual_id: track.individual_id.clone(),
            points: track
                .points
                .iter()
                .filter(|p| p.timestamp >= start && p.timestamp <= end)
                .cloned()
                .collect(),
        })
        .filter(|excerpt| !excerpt.is_empty())
        .collect();

    EncounterWindow {
        episode_id: episode.id,
        start,
        end,
        tracks: excerpts,
    }
}
