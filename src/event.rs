//! Event-level driver
//!
//! [`EventProcessor`] runs every (track × hypothesis) swim of one event,
//! shares one [`HitClaimLedger`] between them and scores each track into a
//! [`MuidRecord`]. With the `rayon` feature the swims run in parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::association::HitClaimLedger;
use crate::cache::{ComputationId, EventCache};
use crate::config::SwimConfig;
use crate::errors::SwimError;
use crate::geometry::{AllChannelsAlive, ChannelStatus, VolumeClassifier};
use crate::hits::HitCatalog;
use crate::hypothesis::{Hypothesis, ParticleKind};
use crate::propagation::Stepper;
use crate::reporter::{NoOpReporter, SwimReporter};
use crate::scoring::{LikelihoodScorer, MuidRecord, PdfTableSet};
use crate::state::{TrackFit, TrajectoryState};
use crate::swim::{SwimEngine, SwimSummary};

/// Swims and score of one track
#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    /// Scored record
    pub record: MuidRecord,
    /// One summary per swum hypothesis
    pub summaries: Vec<SwimSummary>,
}

/// Results of one event, in input track order
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventResult {
    /// Event sequence number
    pub event: u64,
    /// One entry per input track
    pub tracks: Vec<TrackResult>,
}

impl EventResult {
    /// Records of every track
    pub fn records(&self) -> impl Iterator<Item = &MuidRecord> {
        self.tracks.iter().map(|t| &t.record)
    }
}

/// Runs the swims of successive events
pub struct EventProcessor {
    config: SwimConfig,
    stepper: Arc<dyn Stepper>,
    classifier: Arc<dyn VolumeClassifier>,
    channels: Arc<dyn ChannelStatus>,
    tables: PdfTableSet,
    kinds: Vec<ParticleKind>,
    ledger: HitClaimLedger,
    seeds: EventCache<bool>,
    events: AtomicU64,
}

impl EventProcessor {
    /// Create a processor; every channel is considered alive
    pub fn new(
        config: SwimConfig,
        stepper: Arc<dyn Stepper>,
        classifier: Arc<dyn VolumeClassifier>,
        tables: PdfTableSet,
    ) -> Result<Self, SwimError> {
        config.validate()?;
        Ok(Self {
            config,
            stepper,
            classifier,
            channels: Arc::new(AllChannelsAlive),
            tables,
            kinds: ParticleKind::ALL.to_vec(),
            ledger: HitClaimLedger::new(),
            seeds: EventCache::new(),
            events: AtomicU64::new(0),
        })
    }

    /// Use a channel-status map
    pub fn with_channels(mut self, channels: Arc<dyn ChannelStatus>) -> Self {
        self.channels = channels;
        self
    }

    /// Restrict the swum species
    pub fn with_kinds(mut self, kinds: Vec<ParticleKind>) -> Result<Self, SwimError> {
        if kinds.is_empty() {
            return Err(SwimError::configuration("at least one species must be swum"));
        }
        self.kinds = kinds;
        Ok(self)
    }

    /// Swim configuration in use
    pub fn config(&self) -> &SwimConfig {
        &self.config
    }

    /// Hit claims of the last processed event
    pub fn ledger(&self) -> &HitClaimLedger {
        &self.ledger
    }

    /// Swim and score every track of one event
    pub fn process(&self, tracks: &[TrackFit], catalog: &dyn HitCatalog) -> EventResult {
        let event = self.begin_event();
        let engine = self.engine(catalog);

        #[cfg(feature = "rayon")]
        let results: Vec<TrackResult> = tracks
            .par_iter()
            .map(|fit| self.process_track(&engine, fit, &mut NoOpReporter))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let results: Vec<TrackResult> = tracks
            .iter()
            .map(|fit| self.process_track(&engine, fit, &mut NoOpReporter))
            .collect();

        self.end_event(event, results)
    }

    /// Swim and score every track of one event on this thread, reporting
    /// every swim to `reporter`
    pub fn process_with_reporter<R: SwimReporter + ?Sized>(
        &self,
        tracks: &[TrackFit],
        catalog: &dyn HitCatalog,
        reporter: &mut R,
    ) -> EventResult {
        let event = self.begin_event();
        let engine = self.engine(catalog);
        let results = tracks
            .iter()
            .map(|fit| self.process_track(&engine, fit, reporter))
            .collect();
        self.end_event(event, results)
    }

    fn begin_event(&self) -> u64 {
        self.ledger.clear();
        self.seeds.clear();
        self.events.fetch_add(1, Ordering::Relaxed)
    }

    fn end_event(&self, event: u64, tracks: Vec<TrackResult>) -> EventResult {
        let swims: usize = tracks.iter().map(|t| t.summaries.len()).sum();
        let unreliable = tracks.iter().filter(|t| t.record.unreliable).count();
        info!(
            "Event {}: {} tracks, {} swims, {} hits claimed ({} contested), {} unreliable records",
            event,
            tracks.len(),
            swims,
            self.ledger.len(),
            self.ledger.contested().len(),
            unreliable
        );
        EventResult { event, tracks }
    }

    fn engine<'e>(&'e self, catalog: &'e dyn HitCatalog) -> SwimEngine<'e> {
        SwimEngine::new(
            &self.config,
            self.stepper.as_ref(),
            self.classifier.as_ref(),
            catalog,
            self.channels.as_ref(),
            &self.ledger,
        )
    }

    fn process_track<R: SwimReporter + ?Sized>(
        &self,
        engine: &SwimEngine<'_>,
        fit: &TrackFit,
        reporter: &mut R,
    ) -> TrackResult {
        let summaries = if fit.charge == 0 {
            debug!("Track {} is neutral, not swum", fit.id.0);
            Vec::new()
        } else {
            let hypotheses: Vec<Hypothesis> = self
                .kinds
                .iter()
                .map(|&kind| Hypothesis::new(kind, fit.charge.signum()))
                .collect();
            hypotheses
                .into_iter()
                .map(|hypothesis| self.swim_hypothesis(engine, fit, hypothesis, reporter))
                .collect()
        };

        let record = LikelihoodScorer::new(&self.tables).score(fit.id, fit.charge, &summaries);
        TrackResult { record, summaries }
    }

    fn swim_hypothesis<R: SwimReporter + ?Sized>(
        &self,
        engine: &SwimEngine<'_>,
        fit: &TrackFit,
        hypothesis: Hypothesis,
        reporter: &mut R,
    ) -> SwimSummary {
        if !engine.is_swimmable(fit) {
            return SwimSummary::not_reached(fit.id, hypothesis);
        }
        let seedable = self
            .seeds
            .get_or_insert_with(fit.id.0, ComputationId::SEED_VALIDATION, || {
                match fit.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Track {} cannot seed a swim: {}", fit.id.0, e);
                        false
                    }
                }
            });
        if !seedable {
            return SwimSummary::not_reached(fit.id, hypothesis);
        }
        engine.swim(fit.id, TrajectoryState::seed(fit, hypothesis), reporter)
    }
}
