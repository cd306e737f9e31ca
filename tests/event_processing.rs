//! Event-level swims and scoring on synthetic events

mod helpers;

use std::sync::Arc;

use helpers::radial_fit;
use muid_swim_rs::bench_utils::{generate_event, synthetic_pdf_tables, SyntheticEventConfig};
use muid_swim_rs::reporter::DebugReporter;
use muid_swim_rs::{
    DeadChannelSet, EventProcessor, EventResult, KlmGeometry, KlmGeometryConfig, Outcome,
    ParticleKind, Section, StepperConfig, StraightLineStepper, StructuralAddress, Subsystem,
    SwimConfig,
};

fn geometry() -> Arc<KlmGeometry> {
    Arc::new(KlmGeometry::new(KlmGeometryConfig::default()).unwrap())
}

fn processor(geometry: &Arc<KlmGeometry>) -> EventProcessor {
    let stepper = StraightLineStepper::new(Arc::clone(geometry), StepperConfig::default()).unwrap();
    EventProcessor::new(
        SwimConfig::default(),
        Arc::new(stepper),
        geometry.clone(),
        synthetic_pdf_tables().unwrap(),
    )
    .unwrap()
}

fn penetrating_event() -> SyntheticEventConfig {
    SyntheticEventConfig {
        tracks: 6,
        penetrating_fraction: 1.0,
        hit_efficiency: 1.0,
        noise_hits: 0.0,
        ..SyntheticEventConfig::default()
    }
}

#[test]
fn test_penetrating_tracks_are_most_likely_muons() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let event = generate_event(&geometry, &penetrating_event(), 11).unwrap();
    let result = processor.process(&event.tracks, &event.hits);

    assert_eq!(result.tracks.len(), event.tracks.len());
    for record in result.records() {
        assert!(!record.unreliable, "track {:?}", record.track);
        assert_eq!(record.outcome, Outcome::ReachedBoundary);
        assert_eq!(record.most_likely().map(|h| h.kind), Some(ParticleKind::Muon));
        assert_eq!(record.reference.map(|h| h.kind), Some(ParticleKind::Muon));

        let total: f64 = record.scores.iter().filter_map(|s| s.normalized).sum();
        assert!((total - 1.0).abs() < 1e-9, "normalized sum {}", total);
        assert!(record.scores.iter().all(|s| s.log_density.is_finite()));
    }
}

#[test]
fn test_results_keep_input_track_order() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let event = generate_event(&geometry, &SyntheticEventConfig::default(), 3).unwrap();
    let result = processor.process(&event.tracks, &event.hits);

    let ids: Vec<_> = result.records().map(|r| r.track).collect();
    let expected: Vec<_> = event.tracks.iter().map(|t| t.id).collect();
    assert_eq!(ids, expected);
    for track in &result.tracks {
        assert_eq!(track.summaries.len(), ParticleKind::ALL.len());
    }
}

fn assert_same_results(a: &EventResult, b: &EventResult) {
    assert_eq!(a.tracks.len(), b.tracks.len());
    for (x, y) in a.tracks.iter().zip(&b.tracks) {
        assert_eq!(x.record.track, y.record.track);
        assert_eq!(x.record.ext_pattern, y.record.ext_pattern);
        assert_eq!(x.record.hit_pattern, y.record.hit_pattern);
        assert_eq!(x.record.chi2.to_bits(), y.record.chi2.to_bits());
        for (s, t) in x.record.scores.iter().zip(&y.record.scores) {
            assert_eq!(s.hypothesis, t.hypothesis);
            assert_eq!(s.density.to_bits(), t.density.to_bits());
            assert_eq!(s.normalized.map(f64::to_bits), t.normalized.map(f64::to_bits));
        }
    }
}

#[test]
fn test_reporter_run_matches_plain_run() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let event = generate_event(&geometry, &SyntheticEventConfig::default(), 5).unwrap();

    let plain = processor.process(&event.tracks, &event.hits);
    let plain_claims = processor.ledger().total_claims();

    let mut reporter = DebugReporter::new();
    let reported = processor.process_with_reporter(&event.tracks, &event.hits, &mut reporter);

    assert_same_results(&plain, &reported);
    assert_eq!(processor.ledger().total_claims(), plain_claims);
    assert_eq!(reported.event, plain.event + 1);

    let swims: usize = reported.tracks.iter().map(|t| t.summaries.len()).sum();
    assert_eq!(reporter.starts(), swims);
    assert_eq!(reporter.summaries().len(), swims);
    let matches: usize = reported
        .tracks
        .iter()
        .flat_map(|t| &t.summaries)
        .map(|s| s.matched.len())
        .sum();
    assert_eq!(reporter.matches().len(), matches);
}

#[test]
fn test_ledger_holds_only_the_latest_event() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let first = generate_event(&geometry, &penetrating_event(), 1).unwrap();
    let second = generate_event(
        &geometry,
        &SyntheticEventConfig {
            tracks: 2,
            ..penetrating_event()
        },
        2,
    )
    .unwrap();

    processor.process(&first.tracks, &first.hits);
    let result = processor.process(&second.tracks, &second.hits);

    let matched: usize = result
        .tracks
        .iter()
        .flat_map(|t| &t.summaries)
        .map(|s| s.matched.len())
        .sum();
    assert_eq!(processor.ledger().total_claims(), matched);
}

#[test]
fn test_neutral_track_gets_an_empty_record() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let event = generate_event(&geometry, &penetrating_event(), 4).unwrap();
    let neutral = radial_fit(99, 0, 2.0, 0.0);

    let result = processor.process(std::slice::from_ref(&neutral), &event.hits);
    let track = &result.tracks[0];
    assert!(track.summaries.is_empty());
    assert!(track.record.scores.is_empty());
    assert_eq!(track.record.reference, None);
    assert_eq!(track.record.outcome, Outcome::NotReached);
    assert!(track.record.most_likely().is_none());
}

#[test]
fn test_dead_layer_removes_bit_from_every_track() {
    let geometry = geometry();
    let config = geometry.config().clone();
    let dead: DeadChannelSet = [Section::Forward, Section::Backward]
        .into_iter()
        .flat_map(|section| {
            (0..config.barrel_sectors)
                .map(move |sector| StructuralAddress::new(Subsystem::Barrel, section, sector, 5))
        })
        .collect();
    let processor = processor(&geometry).with_channels(Arc::new(dead));
    let event = generate_event(&geometry, &penetrating_event(), 8).unwrap();
    let result = processor.process(&event.tracks, &event.hits);

    let bit = 1u32 << 5;
    for track in &result.tracks {
        for summary in &track.summaries {
            assert_eq!(summary.ext_pattern & bit, 0);
            assert_eq!(summary.last_ext_layer(Subsystem::Barrel), Some(14));
        }
    }
}

#[test]
fn test_restricted_species() {
    let geometry = geometry();
    assert!(processor(&geometry).with_kinds(Vec::new()).is_err());

    let processor = processor(&geometry)
        .with_kinds(vec![ParticleKind::Muon, ParticleKind::Pion])
        .unwrap();
    let event = generate_event(&geometry, &penetrating_event(), 9).unwrap();
    let result = processor.process(&event.tracks, &event.hits);
    for track in &result.tracks {
        let kinds: Vec<_> = track.summaries.iter().map(|s| s.hypothesis.kind).collect();
        assert_eq!(kinds, vec![ParticleKind::Muon, ParticleKind::Pion]);
    }
}

#[test]
fn test_event_result_serializes() {
    let geometry = geometry();
    let processor = processor(&geometry);
    let event = generate_event(&geometry, &penetrating_event(), 10).unwrap();
    let result = processor.process(&event.tracks, &event.hits);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["tracks"].as_array().map(Vec::len), Some(event.tracks.len()));
    assert!(json["tracks"][0]["record"]["scores"].is_array());
}
