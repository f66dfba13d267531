//! # Analysis Orchestrator
//!
//! Runs the full pipeline for one set of tracks:
//! 1. Validate input and enumerate every pair of individuals with data
//! 2. Match each pair (sequentially, or with rayon behind `parallel`)
//! 3. Merge the events into episodes
//! 4. Compute statistics and cluster hotspots
//!
//! Cancellation is cooperative: the token is polled before every pair and
//! every hotspot iteration. A cancelled run still returns a result, built from
//! the pairs that completed.

use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::episodes::{build_episodes, EncounterEpisode};
use crate::error::{AnalysisError, AnalysisWarning, Result};
use crate::hotspots::{cluster_hotspots_cancellable, Hotspot};
use crate::matcher::{PairMatcher, ProximityEvent, SweepMatcher};
use crate::progress::{progress_fraction, CancellationToken, ProgressCallback};
use crate::statistics::{compute_statistics, EncounterStatistics};
use crate::IndividualTrack;

// =============================================================================
// Result Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    Cancelled,
}

/// A pair left out of the run because one of its tracks was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub individual_a: String,
    pub individual_b: String,
    pub reason: String,
}

/// Bookkeeping for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Individuals with at least one fix
    pub individuals: u32,
    pub pairs_total: u32,
    /// Pairs matched or skipped before the run ended
    pub pairs_processed: u32,
    pub skipped_pairs: Vec<SkippedPair>,
    /// Raw proximity events before merging
    pub total_events: u32,
    pub warnings: Vec<AnalysisWarning>,
    pub elapsed_ms: u64,
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub episodes: Vec<EncounterEpisode>,
    pub statistics: EncounterStatistics,
    pub hotspots: Vec<Hotspot>,
    /// Configuration the run was made with
    pub config: AnalysisConfig,
    pub metadata: RunMetadata,
}

impl AnalysisResult {
    pub fn is_complete(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AnalysisStatus::Cancelled
    }

    /// Serialize the whole result as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// Analyzer
// =============================================================================

/// Outcome of a single pair.
enum PairOutcome {
    Matched(Vec<ProximityEvent>),
    Skipped(SkippedPair),
    Cancelled,
}

/// Validated input: individuals with data, sorted by id, and their pairs.
struct PreparedInput<'a> {
    tracks: Vec<&'a IndividualTrack>,
    /// Index pairs into `tracks`, `i < j`, so every pair is already canonical
    pairs: Vec<(usize, usize)>,
    warnings: Vec<AnalysisWarning>,
}

/// Proximity analysis over a fixed configuration.
///
/// The analyzer holds no per-run state and can be reused for any number of
/// runs, including concurrently from several threads.
///
/// # Example
/// ```
/// use proximity_engine::{AnalysisConfig, ProximityAnalyzer};
///
/// let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
/// let result = analyzer.analyze(&[]).unwrap();
///
/// assert!(result.is_complete());
/// assert!(result.episodes.is_empty());
/// assert_eq!(result.metadata.warnings.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ProximityAnalyzer<M = SweepMatcher> {
    config: AnalysisConfig,
    matcher: M,
}

impl ProximityAnalyzer<SweepMatcher> {
    /// Create an analyzer with the default sweep matcher.
    ///
    /// Fails with [`AnalysisError::InvalidConfig`] for out-of-range thresholds.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_matcher(config, SweepMatcher)
    }
}

impl<M: PairMatcher> ProximityAnalyzer<M> {
    /// Create an analyzer with a custom pair matching strategy.
    pub fn with_matcher(config: AnalysisConfig, matcher: M) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, matcher })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis to completion.
    pub fn analyze(&self, tracks: &[IndividualTrack]) -> Result<AnalysisResult> {
        self.analyze_with(tracks, &CancellationToken::new(), None)
    }

    /// Run the analysis with cancellation and progress reporting.
    ///
    /// `progress` is called after every pair with (completed pairs, total pairs).
    pub fn analyze_with(
        &self,
        tracks: &[IndividualTrack],
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<AnalysisResult> {
        let start = Instant::now();
        let input = prepare(tracks)?;
        let total = input.pairs.len() as u32;

        info!(
            "[ProximityEngine] Analyzing {} individuals ({} pairs)",
            input.tracks.len(),
            total
        );

        let mut outcomes = Vec::with_capacity(input.pairs.len());
        for (done, &(i, j)) in input.pairs.iter().enumerate() {
            let outcome = self.run_pair(input.tracks[i], input.tracks[j], cancel)?;
            let cancelled = matches!(outcome, PairOutcome::Cancelled);
            outcomes.push(outcome);
            if cancelled {
                break;
            }

            let completed = done as u32 + 1;
            debug!(
                "[ProximityEngine] Pair {}/{} ({:.0}%)",
                completed,
                total,
                progress_fraction(completed, total) * 100.0
            );
            if let Some(ref callback) = progress {
                callback(completed, total);
            }
        }

        Ok(self.assemble(input, outcomes, cancel, start))
    }

    /// Match one pair, honoring cancellation and the skip policy.
    fn run_pair(
        &self,
        a: &IndividualTrack,
        b: &IndividualTrack,
        cancel: &CancellationToken,
    ) -> Result<PairOutcome> {
        if cancel.is_cancelled() {
            return Ok(PairOutcome::Cancelled);
        }

        match self.matcher.match_pair(a, b, &self.config) {
            Ok(events) => Ok(PairOutcome::Matched(events)),
            Err(err @ AnalysisError::DataOrder { .. }) if self.config.skip_unordered_tracks => {
                warn!(
                    "[ProximityEngine] Skipping pair {}-{}: {}",
                    a.individual_id, b.individual_id, err
                );
                Ok(PairOutcome::Skipped(SkippedPair {
                    individual_a: a.individual_id.clone(),
                    individual_b: b.individual_id.clone(),
                    reason: err.to_string(),
                }))
            }
            Err(err) => Err(err),
        }
    }

    /// Merge, summarize and cluster the pair outcomes into a result.
    fn assemble(
        &self,
        input: PreparedInput<'_>,
        outcomes: Vec<PairOutcome>,
        cancel: &CancellationToken,
        start: Instant,
    ) -> AnalysisResult {
        let pairs_total = input.pairs.len() as u32;
        let mut warnings = input.warnings;
        let mut events = Vec::new();
        let mut skipped_pairs = Vec::new();
        let mut pairs_processed = 0u32;
        let mut cancelled = false;

        for outcome in outcomes {
            match outcome {
                PairOutcome::Matched(pair_events) => {
                    pairs_processed += 1;
                    events.extend(pair_events);
                }
                PairOutcome::Skipped(pair) => {
                    pairs_processed += 1;
                    skipped_pairs.push(pair);
                }
                PairOutcome::Cancelled => cancelled = true,
            }
        }

        let episodes = build_episodes(&events, self.config.episode_gap());
        let statistics = compute_statistics(&episodes, self.config.proximity_threshold_km);

        let hotspots = if cancelled {
            Vec::new()
        } else {
            match cluster_hotspots_cancellable(&episodes, self.config.hotspot_radius_km(), cancel) {
                Some(hotspots) => hotspots,
                None => {
                    cancelled = true;
                    Vec::new()
                }
            }
        };

        if !cancelled && pairs_total > 0 && events.is_empty() {
            warnings.push(AnalysisWarning::NoOverlappingPairs);
        }
        for warning in &warnings {
            warn!("[ProximityEngine] {}", warning);
        }

        let status = if cancelled {
            AnalysisStatus::Cancelled
        } else {
            AnalysisStatus::Completed
        };
        let elapsed = start.elapsed();

        info!(
            "[ProximityEngine] {:?}: {} events, {} episodes, {} hotspots in {:?}",
            status,
            events.len(),
            episodes.len(),
            hotspots.len(),
            elapsed
        );

        AnalysisResult {
            status,
            episodes,
            statistics,
            hotspots,
            config: self.config.clone(),
            metadata: RunMetadata {
                individuals: input.tracks.len() as u32,
                pairs_total,
                pairs_processed,
                skipped_pairs,
                total_events: events.len() as u32,
                warnings,
                elapsed_ms: elapsed.as_millis() as u64,
            },
        }
    }
}

#[cfg(feature = "parallel")]
impl<M: PairMatcher + Sync> ProximityAnalyzer<M> {
    /// Run the analysis with pairs matched in parallel.
    ///
    /// Produces the same result as [`ProximityAnalyzer::analyze_with`] when
    /// not cancelled. Progress callbacks may arrive from worker threads, and
    /// pairs finish in no particular order.
    pub fn analyze_parallel(
        &self,
        tracks: &[IndividualTrack],
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<AnalysisResult> {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        let start = Instant::now();
        let input = prepare(tracks)?;
        let total = input.pairs.len() as u32;
        let completed = AtomicU32::new(0);

        info!(
            "[ProximityEngine] Analyzing {} individuals ({} pairs) in parallel",
            input.tracks.len(),
            total
        );

        let outcomes: Vec<PairOutcome> = input
            .pairs
            .par_iter()
            .map(|&(i, j)| -> Result<PairOutcome> {
                let outcome = self.run_pair(input.tracks[i], input.tracks[j], cancel)?;
                if !matches!(outcome, PairOutcome::Cancelled) {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = progress {
                        callback(done, total);
                    }
                }
                Ok(outcome)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.assemble(input, outcomes, cancel, start))
    }
}

/// Reject duplicate ids, drop empty tracks and enumerate pairs.
fn prepare(tracks: &[IndividualTrack]) -> Result<PreparedInput<'_>> {
    let mut sorted: Vec<&IndividualTrack> = tracks.iter().collect();
    sorted.sort_by(|a, b| a.individual_id.cmp(&b.individual_id));

    if let Some(dup) = sorted
        .windows(2)
        .find(|w| w[0].individual_id == w[1].individual_id)
    {
        return Err(AnalysisError::DuplicateIndividual {
            individual_id: dup[0].individual_id.clone(),
        });
    }

    let tracks: Vec<&IndividualTrack> = sorted.into_iter().filter(|t| !t.is_empty()).collect();

    let mut warnings = Vec::new();
    match tracks.as_slice() {
        [] => warnings.push(AnalysisWarning::NoIndividuals),
        [only] => warnings.push(AnalysisWarning::SingleIndividual {
            individual_id: only.individual_id.clone(),
        }),
        _ => {}
    }

    let n = tracks.len();
    let pairs = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();

    Ok(PreparedInput {
        tracks,
        pairs,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackPoint;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    /// Fixes every 10 minutes at a fixed position.
    fn stationary(id: &str, lat: f64, lng: f64, fixes: i64) -> IndividualTrack {
        let points = (0..fixes)
            .map(|i| TrackPoint::new(id, t0() + Duration::minutes(10 * i), lat, lng))
            .collect();
        IndividualTrack::new(id, points)
    }

    /// Matcher that never finds anything.
    struct NeverMatcher;

    impl PairMatcher for NeverMatcher {
        fn match_pair(
            &self,
            _a: &IndividualTrack,
            _b: &IndividualTrack,
            _config: &AnalysisConfig,
        ) -> Result<Vec<ProximityEvent>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfig {
            proximity_threshold_km: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            ProximityAnalyzer::new(config),
            Err(AnalysisError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_duplicate_individuals_are_rejected() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks = vec![
            stationary("A", 46.55, 7.98, 3),
            stationary("B", 46.55, 7.98, 3),
            stationary("A", 46.60, 7.98, 3),
        ];

        match analyzer.analyze(&tracks) {
            Err(AnalysisError::DuplicateIndividual { individual_id }) => assert_eq!(individual_id, "A"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_warns() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();

        let result = analyzer.analyze(&[IndividualTrack::new("A", vec![])]).unwrap();
        assert!(result.is_complete());
        assert_eq!(result.metadata.individuals, 0);
        assert_eq!(result.metadata.warnings, vec![AnalysisWarning::NoIndividuals]);
        assert_eq!(result.statistics.overview.total_episodes, 0);
    }

    #[test]
    fn test_single_individual_warns() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();

        let result = analyzer.analyze(&[stationary("A", 46.55, 7.98, 4)]).unwrap();
        assert_eq!(result.metadata.pairs_total, 0);
        assert_eq!(
            result.metadata.warnings,
            vec![AnalysisWarning::SingleIndividual { individual_id: "A".into() }]
        );
    }

    #[test]
    fn test_distant_pair_warns_no_overlap() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks = vec![stationary("A", 46.55, 7.98, 4), stationary("B", 46.64, 7.98, 4)];

        let result = analyzer.analyze(&tracks).unwrap();
        assert!(result.episodes.is_empty());
        assert!(result.hotspots.is_empty());
        assert_eq!(result.metadata.warnings, vec![AnalysisWarning::NoOverlappingPairs]);
    }

    #[test]
    fn test_pipeline_produces_consistent_result() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks = vec![
            stationary("C", 46.551, 7.981, 6),
            stationary("A", 46.550, 7.980, 6),
            stationary("B", 46.70, 8.30, 6),
        ];

        let result = analyzer.analyze(&tracks).unwrap();
        assert!(result.is_complete());
        assert_eq!(result.metadata.individuals, 3);
        assert_eq!(result.metadata.pairs_total, 3);
        assert_eq!(result.metadata.pairs_processed, 3);
        // Fixes within +-30 minutes of each other: 36 combinations minus 6 too far apart
        assert_eq!(result.metadata.total_events, 30);

        assert_eq!(result.episodes.len(), 1);
        assert_eq!(result.episodes[0].pair(), ("A", "C"));
        assert_eq!(result.statistics.overview.unique_pairs, 1);
        assert_eq!(result.hotspots.len(), 1);
        assert_eq!(result.hotspots[0].contributing_episode_ids, vec![0]);
        assert!(result.metadata.warnings.is_empty());
    }

    #[test]
    fn test_unordered_track_fails_run_by_default() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let mut broken = stationary("B", 46.55, 7.98, 4);
        broken.points.swap(1, 2);

        let err = analyzer
            .analyze(&[stationary("A", 46.55, 7.98, 4), broken])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DataOrder { ref individual_id, .. } if individual_id == "B"));
    }

    #[test]
    fn test_unordered_track_can_be_skipped() {
        let config = AnalysisConfig {
            skip_unordered_tracks: true,
            ..Default::default()
        };
        let analyzer = ProximityAnalyzer::new(config).unwrap();
        let mut broken = stationary("B", 46.55, 7.98, 4);
        broken.points.swap(1, 2);
        let tracks = vec![
            stationary("A", 46.55, 7.98, 4),
            broken,
            stationary("C", 46.55, 7.98, 4),
        ];

        let result = analyzer.analyze(&tracks).unwrap();
        assert!(result.is_complete());
        assert_eq!(result.metadata.pairs_processed, 3);
        assert_eq!(result.metadata.skipped_pairs.len(), 2);
        assert!(result.episodes.iter().all(|e| e.pair() == ("A", "C")));
        assert_eq!(result.episodes.len(), 1);
    }

    #[test]
    fn test_cancel_before_start() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks = vec![stationary("A", 46.55, 7.98, 4), stationary("B", 46.55, 7.98, 4)];
        let token = CancellationToken::new();
        token.cancel();

        let result = analyzer.analyze_with(&tracks, &token, None).unwrap();
        assert!(result.is_cancelled());
        assert!(result.episodes.is_empty());
        assert!(result.hotspots.is_empty());
        assert_eq!(result.metadata.pairs_processed, 0);
        assert!(result.metadata.warnings.is_empty());
    }

    #[test]
    fn test_progress_reports_every_pair() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|id| stationary(id, 46.55, 7.98, 3))
            .collect();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let callback: ProgressCallback = Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        analyzer
            .analyze_with(&tracks, &CancellationToken::new(), Some(callback))
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(*calls, (1..=6).map(|i| (i, 6)).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_from_progress_callback() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|id| stationary(id, 46.55, 7.98, 3))
            .collect();
        let full = analyzer.analyze(&tracks).unwrap();

        let token = CancellationToken::new();
        let trigger = token.clone();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_callback = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |done, _| {
            seen_in_callback.store(done, Ordering::SeqCst);
            trigger.cancel();
        });

        let partial = analyzer.analyze_with(&tracks, &token, Some(callback)).unwrap();
        assert!(partial.is_cancelled());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(partial.metadata.pairs_processed, 1);
        assert_eq!(partial.episodes.len(), 1);
        assert!(partial.hotspots.is_empty());
        assert!(full.episodes.len() > partial.episodes.len());
    }

    #[test]
    fn test_custom_matcher() {
        let analyzer = ProximityAnalyzer::with_matcher(AnalysisConfig::default(), NeverMatcher).unwrap();
        let tracks = vec![stationary("A", 46.55, 7.98, 4), stationary("B", 46.55, 7.98, 4)];

        let result = analyzer.analyze(&tracks).unwrap();
        assert!(result.episodes.is_empty());
        assert_eq!(result.config, *analyzer.config());
    }

    #[test]
    fn test_json_top_level_fields() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks = vec![stationary("A", 46.55, 7.98, 3), stationary("B", 46.551, 7.98, 3)];
        let result = analyzer.analyze(&tracks).unwrap();

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        for field in ["status", "episodes", "statistics", "hotspots", "config", "metadata"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["status"], "completed");
        assert_eq!(json["episodes"][0]["start_time"], "2024-06-01T08:00:00Z");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let analyzer = ProximityAnalyzer::new(AnalysisConfig::default()).unwrap();
        let tracks: Vec<_> = (0..8)
            .map(|i| stationary(&format!("ind-{i}"), 46.55 + i as f64 * 0.004, 7.98, 12))
            .collect();

        let sequential = analyzer.analyze(&tracks).unwrap();
        let parallel = analyzer
            .analyze_parallel(&tracks, &CancellationToken::new(), None)
            .unwrap();

        assert_eq!(parallel.episodes, sequential.episodes);
        assert_eq!(parallel.statistics, sequential.statistics);
        assert_eq!(parallel.hotspots, sequential.hotspots);
        assert_eq!(parallel.metadata.total_events, sequential.metadata.total_events);
    }
}
