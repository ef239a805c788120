//! Pipeline orchestration — one full harvest run.
//!
//! Load registry → fetch all sources → reconcile → sweep → enrich →
//! dedupe coordinates → solve center → reverse-geocode → persist. The
//! registry is saved even when the run fails partway, so geocoding work
//! already paid for survives the failure.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use midway_common::{Coordinate, MeetingPoint, MidwayError, Registry, SourceDescriptor};

use crate::center::CenterSolver;
use crate::enrich;
use crate::fetch::FetchOrchestrator;
use crate::reconcile;
use crate::registry;
use crate::traits::{Geocoder, SourceFetcher};

pub struct PipelineOptions {
    pub sources: Vec<SourceDescriptor>,
    pub registry_path: PathBuf,
    pub output_path: PathBuf,
    pub fetch_concurrency: usize,
    pub geocode_concurrency: usize,
    pub max_attempts: u32,
    pub region_hint: String,
    /// Exclude permanently closed places from the center computation.
    /// They stay in the registry either way.
    pub exclude_closed: bool,
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub sources: usize,
    pub places: usize,
    pub swept: usize,
    pub geocoded: usize,
    pub dropped: usize,
    pub distinct_coordinates: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources, {} places ({} swept, {} geocoded, {} dropped), {} distinct coordinates",
            self.sources, self.places, self.swept, self.geocoded, self.dropped,
            self.distinct_coordinates
        )
    }
}

pub struct PipelineController<'a> {
    fetcher: &'a dyn SourceFetcher,
    geocoder: &'a dyn Geocoder,
    solver: &'a dyn CenterSolver,
    options: PipelineOptions,
}

impl<'a> PipelineController<'a> {
    pub fn new(
        fetcher: &'a dyn SourceFetcher,
        geocoder: &'a dyn Geocoder,
        solver: &'a dyn CenterSolver,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            geocoder,
            solver,
            options,
        }
    }

    /// Run the full harvest. The registry is persisted on both the success
    /// and the failure path; on failure the save is best-effort and the
    /// original error propagates.
    pub async fn run(&self) -> Result<MeetingPoint> {
        let mut registry = registry::load(&self.options.registry_path);

        match self.run_inner(&mut registry).await {
            Ok(point) => {
                registry::save(&self.options.registry_path, &registry)
                    .context("persisting registry")?;
                self.write_output(&point)?;
                Ok(point)
            }
            Err(e) => {
                if let Err(save_err) = registry::save(&self.options.registry_path, &registry) {
                    error!(error = %save_err, "Failed to persist registry after run error");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, registry: &mut Registry) -> Result<MeetingPoint> {
        let mut stats = RunStats {
            sources: self.options.sources.len(),
            ..RunStats::default()
        };

        reconcile::begin_run(registry);

        let orchestrator = FetchOrchestrator::new(
            self.fetcher,
            self.options.fetch_concurrency,
            self.options.max_attempts,
        );
        let batches = orchestrator.run(&self.options.sources).await;
        for batch in &batches {
            reconcile::apply(registry, batch);
        }
        stats.swept = reconcile::sweep(registry);

        let enriched = enrich::enrich(
            registry,
            self.geocoder,
            &self.options.region_hint,
            self.options.geocode_concurrency,
        )
        .await;
        stats.geocoded = enriched.geocoded;
        stats.dropped = enriched.dropped;
        stats.places = registry.len();

        let coordinates = self.collect_coordinates(registry);
        stats.distinct_coordinates = coordinates.len();
        if coordinates.is_empty() {
            return Err(MidwayError::NoCoordinates.into());
        }

        let center = self.solver.center(&coordinates);
        let address = match self.geocoder.reverse(&center).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                warn!("No reverse geocoding match for the center");
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "Reverse geocoding failed");
                String::new()
            }
        };

        info!("Harvest complete. {stats}");
        Ok(MeetingPoint {
            lat: center.lat,
            lng: center.lng,
            address,
        })
    }

    /// Distinct registry coordinates for the solver. The closed-place
    /// filter runs before dedup, so an open place sharing a rounded key
    /// with an excluded closed one still contributes its coordinate.
    /// Microdegree-equal coordinates count once so a chain with many
    /// branches at one corner cannot outvote everything else.
    fn collect_coordinates(&self, registry: &Registry) -> Vec<Coordinate> {
        let mut seen = HashSet::new();
        registry
            .iter()
            .filter(|(_, place)| !(self.options.exclude_closed && place.permanently_closed))
            .filter_map(|(_, place)| place.coordinate)
            .filter(|coordinate| seen.insert(coordinate.rounded_key()))
            .collect()
    }

    fn write_output(&self, point: &MeetingPoint) -> Result<()> {
        let json = serde_json::to_string_pretty(point)
            .map_err(|e| MidwayError::Persistence(format!("serialize meeting point: {e}")))?;
        std::fs::write(&self.options.output_path, json).map_err(|e| {
            MidwayError::Persistence(format!(
                "write {}: {e}",
                self.options.output_path.display()
            ))
        })?;
        info!(path = %self.options.output_path.display(), "Meeting point written");
        Ok(())
    }
}
