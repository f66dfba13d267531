//! Basic example of analyzing three tagged vultures.
//!
//! Run with: cargo run --example basic_analysis

use chrono::{Duration, TimeZone, Utc};
use proximity_engine::{
    encounter_window, episodes_to_csv, AnalysisConfig, IndividualTrack, ProximityAnalyzer,
    TrackPoint,
};

fn main() {
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();

    // Fix every 15 minutes over 6 hours, drifting east
    let track = |id: &str, lat: f64, lng: f64, drift: f64| {
        let points = (0..24)
            .map(|i| TrackPoint::new(id, t0 + Duration::minutes(15 * i), lat, lng + drift * i as f64))
            .collect();
        IndividualTrack::new(id, points)
    };

    let tracks = vec![
        track("Vulture-01", 46.550, 7.980, 0.002),
        track("Vulture-02", 46.556, 7.985, 0.002),
        // Roosts on a different ridge
        track("Vulture-03", 46.700, 8.300, 0.0),
    ];

    let config = AnalysisConfig {
        proximity_threshold_km: 1.0,
        ..Default::default()
    };
    let analyzer = match ProximityAnalyzer::new(config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    let result = match analyzer.analyze(&tracks) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Analysis failed: {e}");
            return;
        }
    };

    println!("Proximity Analysis Example\n");
    println!(
        "Config: threshold={}km, window={}min\n",
        result.config.proximity_threshold_km, result.config.time_window_minutes
    );

    let overview = &result.statistics.overview;
    println!("Raw events:     {}", result.metadata.total_events);
    println!("Episodes:       {}", overview.total_episodes);
    println!("Unique pairs:   {}", overview.unique_pairs);
    println!("Hotspots:       {}\n", result.hotspots.len());

    for episode in &result.episodes {
        println!(
            "Episode {}: {} & {} for {:.0} min, closest {:.2} km",
            episode.id,
            episode.individual_a,
            episode.individual_b,
            episode.duration_minutes(),
            episode.min_distance_km
        );

        let window = encounter_window(episode, &tracks, Duration::hours(1));
        for excerpt in &window.tracks {
            println!("   {}: {} fixes around the encounter", excerpt.individual_id, excerpt.len());
        }
    }

    for warning in &result.metadata.warnings {
        println!("Warning: {warning}");
    }

    match episodes_to_csv(&result.episodes) {
        Ok(csv) => println!("\nCSV export:\n{csv}"),
        Err(e) => eprintln!("CSV export failed: {e}"),
    }
}
