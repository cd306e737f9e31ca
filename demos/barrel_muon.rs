//! Barrel muon identification example
//!
//! Generates a synthetic event on the reference geometry, swims every track
//! under every hypothesis and prints the per-track likelihood records.
//!
//! Run with: RUST_LOG=debug cargo run --example barrel_muon -- --tracks 5

use std::sync::Arc;

use clap::Parser;
use muid_swim_rs::bench_utils::{generate_event, synthetic_pdf_tables, SyntheticEventConfig};
use muid_swim_rs::reporter::LoggingReporter;
use muid_swim_rs::{
    EventProcessor, KlmGeometry, KlmGeometryConfig, PdfTableSet, StepperConfig,
    StraightLineStepper, SwimConfig, SwimError,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Random seed for deterministic runs
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of tracks in the event
    #[arg(short, long, default_value_t = 10)]
    tracks: usize,

    /// Fraction of tracks that penetrate every layer
    #[arg(short, long, default_value_t = 0.5)]
    penetrating: f64,

    /// Mean number of noise hits
    #[arg(short, long, default_value_t = 20.0)]
    noise: f64,

    /// Swim configuration (JSON); defaults when omitted
    #[arg(long)]
    config: Option<String>,

    /// PDF tables (JSON); synthetic tables when omitted
    #[arg(long)]
    pdfs: Option<String>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), SwimError> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SwimConfig::from_json_file(path)?,
        None => SwimConfig::default(),
    };
    let tables = match &args.pdfs {
        Some(path) => PdfTableSet::from_json_file(path)?,
        None => synthetic_pdf_tables()?,
    };

    println!("Barrel Muon Identification Example");
    println!("==================================");
    println!("Seed: {}", args.seed);
    println!("Tracks: {}", args.tracks);
    println!("Penetrating fraction: {}", args.penetrating);
    println!("Noise hits: {}", args.noise);
    println!();

    let geometry = Arc::new(KlmGeometry::new(KlmGeometryConfig::default())?);
    let stepper = StraightLineStepper::new(Arc::clone(&geometry), StepperConfig::default())?;
    let processor = EventProcessor::new(config, Arc::new(stepper), geometry.clone(), tables)?;

    let event_config = SyntheticEventConfig {
        tracks: args.tracks,
        penetrating_fraction: args.penetrating,
        noise_hits: args.noise,
        ..SyntheticEventConfig::default()
    };
    let event = generate_event(&geometry, &event_config, args.seed)?;
    println!("Generated {} hits", event.hits.len());

    let start_time = std::time::Instant::now();
    let result = processor.process_with_reporter(&event.tracks, &event.hits, &mut LoggingReporter::new());
    let elapsed = start_time.elapsed();
    println!("Processed in {:.2} ms", elapsed.as_secs_f64() * 1e3);
    println!();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{:>5} {:>6} {:>16} {:>4} {:>4} {:>8} {:>10} {:>8}", "track", "charge", "outcome", "ext", "hit", "chi2/ndf", "best", "P(mu)");
    for record in result.records() {
        let reduced = if record.ndof > 0 {
            record.chi2 / f64::from(record.ndof)
        } else {
            0.0
        };
        let best = record
            .most_likely()
            .map_or_else(|| "-".to_string(), |h| h.to_string());
        let muon = record
            .score(muid_swim_rs::ParticleKind::Muon)
            .and_then(|s| s.normalized)
            .map_or_else(|| "-".to_string(), |p| format!("{:.3}", p));
        let layer = |l: Option<u16>| l.map_or_else(|| "-".to_string(), |l| l.to_string());
        println!(
            "{:>5} {:>6} {:>16} {:>4} {:>4} {:>8.2} {:>10} {:>8}",
            record.track.0,
            record.charge,
            format!("{:?}", record.outcome),
            layer(record.ext_layer),
            layer(record.hit_layer),
            reduced,
            best,
            muon
        );
    }

    println!();
    println!(
        "Claimed hits: {} ({} contested)",
        processor.ledger().len(),
        processor.ledger().contested().len()
    );
    Ok(())
}
