//! Example of analyzing a whole colony in parallel with progress and cancellation.
//!
//! Run with: cargo run --example colony_analysis --features parallel

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, TimeZone, Utc};
use proximity_engine::{
    AnalysisConfig, CancellationToken, IndividualTrack, ProgressCallback, ProximityAnalyzer,
    TrackPoint,
};

fn main() {
    println!("Colony Proximity Analysis Example\n");

    let tracks: Vec<IndividualTrack> = (0..40).map(|i| simulated_track(i, 600)).collect();
    println!("Simulated {} individuals\n", tracks.len());

    let analyzer = match ProximityAnalyzer::new(AnalysisConfig::default()) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    let progress: ProgressCallback = Arc::new(|done, total| {
        if done % 100 == 0 || done == total {
            println!("   {done}/{total} pairs");
        }
    });

    let start = Instant::now();
    let result = analyzer.analyze_parallel(&tracks, &CancellationToken::new(), Some(progress));
    let elapsed = start.elapsed();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Analysis failed: {e}");
            return;
        }
    };

    println!("\nAnalysis completed in {:?}\n", elapsed);
    println!("Episodes:     {}", result.episodes.len());
    println!("Unique pairs: {}", result.statistics.overview.unique_pairs);
    println!("Hotspots:     {}\n", result.hotspots.len());

    for hotspot in result.hotspots.iter().take(5) {
        println!(
            "Hotspot at ({:.4}, {:.4}): {} episodes within {:.2} km",
            hotspot.centroid.latitude, hotspot.centroid.longitude, hotspot.episode_count, hotspot.radius_km
        );
    }

    // A run cancelled up front still returns a well-formed result
    let token = CancellationToken::new();
    token.cancel();
    if let Ok(cancelled) = analyzer.analyze_parallel(&tracks, &token, None) {
        println!(
            "\nCancelled run: status={:?}, {} episodes",
            cancelled.status,
            cancelled.episodes.len()
        );
    }
}

/// Deterministic random walk around a shared feeding site.
fn simulated_track(index: u64, fixes: i64) -> IndividualTrack {
    let id = format!("Vulture-{:02}", index);
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();

    let mut state = index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f64 / 10_000.0
    };

    let mut lat = 46.50 + next() * 0.2;
    let mut lng = 7.90 + next() * 0.3;
    let mut seconds = 0;
    let points = (0..fixes)
        .map(|_| {
            seconds += 300 + (next() * 600.0) as i64;
            lat += (next() - 0.5) * 0.01;
            lng += (next() - 0.5) * 0.01;
            TrackPoint::new(&id, t0 + Duration::seconds(seconds), lat, lng)
        })
        .collect();

    IndividualTrack::new(&id, points)
}
