use std::time::{Duration, Instant};

use serde::Serialize;

use crate::assembler::{self, AssemblerOptions, OccurrenceAssembler, SiteSummary};
use crate::checklist::ChecklistAggregator;
use crate::config::ResolvedConfig;
use crate::domain::is_known_site;
use crate::error::EdnaError;
use crate::metadata::{SampleMetadata, TrackerClient};
use crate::package::{self, PackagedTree};
use crate::reference::ReferenceData;
use crate::species_lists::SpeciesListClient;
use crate::store::OutputStore;
use crate::worms::TaxonRegistry;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub sites: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub sites: Vec<SiteResult>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResult {
    #[serde(flatten)]
    pub summary: SiteSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist_species: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist_dna_species: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageResult {
    pub archives: Vec<PackagedTree>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String, started: Option<Instant>) {
    sink.event(ProgressEvent {
        message,
        elapsed: started.map(|started| started.elapsed()),
    });
}

pub struct App<R: TaxonRegistry, T: TrackerClient, S: SpeciesListClient> {
    config: ResolvedConfig,
    store: OutputStore,
    registry: R,
    tracker: T,
    species_lists: S,
}

impl<R: TaxonRegistry, T: TrackerClient, S: SpeciesListClient> App<R, T, S> {
    pub fn new(config: ResolvedConfig, registry: R, tracker: T, species_lists: S) -> Self {
        let store = OutputStore::new(config.output_folder.clone(), config.lists_folder.clone());
        Self {
            config,
            store,
            registry,
            tracker,
            species_lists,
        }
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn build(
        &self,
        options: &BuildOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BuildResult, EdnaError> {
        let started = Instant::now();
        if let Some(unknown) = options.sites.iter().find(|site| !is_known_site(site)) {
            return Err(EdnaError::UnknownSite(unknown.clone()));
        }

        phase(sink, "phase=Prepare; clearing output folders".to_string(), None);
        self.store.prepare(self.config.generate_lists)?;

        phase(sink, "phase=Resolve; loading sample metadata".to_string(), None);
        let metadata = SampleMetadata::partition(self.tracker.fetch_samples()?);
        tracing::info!(
            blank = metadata.blank.len(),
            non_blank = metadata.non_blank.len(),
            "loaded sample metadata"
        );
        let reference = if self.config.generate_lists {
            Some(ReferenceData::load(&self.config.supporting_data_folder)?)
        } else {
            None
        };

        let datasets =
            assembler::list_datasets(&self.config.results_root, &self.config.project_names)?;
        let sites = assembler::group_by_site(datasets)?;
        tracing::info!(sites = sites.len(), "grouped datasets by site");

        let assembler = OccurrenceAssembler::new(
            &self.registry,
            AssemblerOptions {
                occurrence_file: self.config.occurrence_file.clone(),
                dna_file: self.config.dna_file.clone(),
                annotations_folder: self.config.annotations_folder.clone(),
                remove_contaminants: self.config.remove_contaminants,
            },
        )?;
        let aggregator = reference.as_ref().map(|reference| {
            ChecklistAggregator::new(&self.registry, &self.species_lists, reference)
        });

        let mut result = BuildResult {
            sites: Vec::new(),
            skipped: Vec::new(),
        };
        for (site, datasets) in sites {
            if !options.sites.is_empty() && !options.sites.iter().any(|s| s == site) {
                tracing::debug!(site, "not selected");
                continue;
            }
            let site_started = Instant::now();
            phase(
                sink,
                format!("phase=Assemble; site={site}; datasets={}", datasets.len()),
                None,
            );
            let Some(input) = assembler.load_site(&datasets)? else {
                tracing::warn!(site, "no usable datasets, skipping site");
                result.skipped.push(site.to_string());
                continue;
            };
            let (tables, summary) = assembler.assemble(site, input, &metadata)?;
            tables.write(&self.store, site)?;

            let mut site_result = SiteResult {
                summary,
                checklist_species: None,
                checklist_dna_species: None,
            };
            if let Some(aggregator) = &aggregator {
                phase(sink, format!("phase=Checklist; site={site}"), None);
                let checklist = aggregator.aggregate(site, &tables.occurrences, &tables.dna)?;
                checklist.write(&self.store, site)?;
                site_result.checklist_species = Some(checklist.entries.len());
                site_result.checklist_dna_species = Some(checklist.dna_entries().count());
            }
            phase(sink, format!("phase=Done; site={site}"), Some(site_started));
            result.sites.push(site_result);
        }

        phase(
            sink,
            format!(
                "phase=Done; sites={}; skipped={}",
                result.sites.len(),
                result.skipped.len()
            ),
            Some(started),
        );
        Ok(result)
    }

    pub fn package(&self, sink: &dyn ProgressSink) -> Result<PackageResult, EdnaError> {
        let mut archives = Vec::new();
        let mut trees = vec![self.store.output_root()];
        if self.config.generate_lists {
            trees.push(self.store.lists_root());
        }
        for tree in trees {
            phase(sink, format!("phase=Package; tree={tree}"), None);
            archives.push(package::package_tree(tree)?);
        }
        Ok(PackageResult { archives })
    }
}
