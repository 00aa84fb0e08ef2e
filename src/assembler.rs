use std::collections::HashMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::annotations::{self, AnnotationEngine, ContaminantRule};
use crate::domain::{Marker, derive_site_name, sequencing_batch};
use crate::error::EdnaError;
use crate::filters;
use crate::metadata::{SAMPLE_COLUMNS, Sample, SampleMetadata};
use crate::store::OutputStore;
use crate::tables::{DnaTable, EVENT_REMARKS, OccurrenceTable};
use crate::taxonomy::Reconciler;
use crate::worms::TaxonRegistry;

const DWCA_FOLDER: &str = "05-dwca";
const DUPLICATE_SAMPLE_CODE: &str = "EE0476";
const CANONICAL_SAMPLE_CODE: &str = "EE0475";

pub fn list_datasets(
    results_root: &Utf8Path,
    project_names: &[String],
) -> Result<Vec<Utf8PathBuf>, EdnaError> {
    let mut datasets = Vec::new();
    for project in project_names {
        let runs = results_root.join(project).join("runs");
        let entries = fs::read_dir(runs.as_std_path())
            .map_err(|err| EdnaError::MissingResults(format!("{runs}: {err}")))?;
        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| EdnaError::Filesystem(err.to_string()))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            folders.push(runs.join(name));
        }
        folders.sort();
        datasets.extend(folders);
    }
    Ok(datasets)
}

pub fn group_by_site(
    datasets: Vec<Utf8PathBuf>,
) -> Result<Vec<(&'static str, Vec<Utf8PathBuf>)>, EdnaError> {
    let mut sites: Vec<(&'static str, Vec<Utf8PathBuf>)> = Vec::new();
    for dataset in datasets {
        let site = derive_site_name(dataset.as_str())?;
        match sites.iter_mut().find(|(name, _)| *name == site) {
            Some((_, folders)) => folders.push(dataset),
            None => sites.push((site, vec![dataset])),
        }
    }
    Ok(sites)
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub occurrence_file: String,
    pub dna_file: String,
    pub annotations_folder: Utf8PathBuf,
    pub remove_contaminants: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SiteInput {
    pub occurrences: OccurrenceTable,
    pub dna: DnaTable,
    pub datasets: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SiteTables {
    pub occurrences: OccurrenceTable,
    pub dna: DnaTable,
    pub blank_occurrences: OccurrenceTable,
    pub blank_dna: DnaTable,
}

impl SiteTables {
    pub fn write(&self, store: &OutputStore, site: &str) -> Result<(), EdnaError> {
        self.occurrences
            .write_tsv(&store.occurrence_path(site, false))?;
        self.dna.write_tsv(&store.dna_path(site, false))?;
        self.blank_occurrences
            .write_tsv(&store.occurrence_path(site, true))?;
        self.blank_dna.write_tsv(&store.dna_path(site, true))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteSummary {
    pub site: String,
    pub datasets: usize,
    pub occurrences: usize,
    pub dna: usize,
    pub blank_occurrences: usize,
    pub blank_dna: usize,
    pub annotations_removed: usize,
    pub annotations_reclassified: usize,
    pub contaminants_removed: usize,
    pub singletons_removed: usize,
    pub low_complexity_removed: usize,
}

pub struct OccurrenceAssembler<'a, R: TaxonRegistry + ?Sized> {
    registry: &'a R,
    options: AssemblerOptions,
    contaminants: Vec<ContaminantRule>,
}

impl<'a, R: TaxonRegistry + ?Sized> OccurrenceAssembler<'a, R> {
    pub fn new(registry: &'a R, options: AssemblerOptions) -> Result<Self, EdnaError> {
        let contaminants = if options.remove_contaminants {
            annotations::load_contaminants(&options.annotations_folder)?
        } else {
            Vec::new()
        };
        Ok(Self {
            registry,
            options,
            contaminants,
        })
    }

    pub fn load_site(&self, datasets: &[Utf8PathBuf]) -> Result<Option<SiteInput>, EdnaError> {
        let mut input = SiteInput::default();
        for dataset in datasets {
            let marker = Marker::from_dataset(dataset.as_str())?;
            let dwca = dataset.join(DWCA_FOLDER);
            let occurrence_path = dwca.join(&self.options.occurrence_file);
            let dna_path = dwca.join(&self.options.dna_file);

            if !occurrence_path.as_std_path().exists() {
                warn!(path = %occurrence_path, "missing file");
                continue;
            }
            if !dna_path.as_std_path().exists() {
                warn!(path = %dna_path, "missing file");
                continue;
            }

            let mut occurrences = OccurrenceTable::read_tsv(&occurrence_path)?;
            let mut dna = DnaTable::read_tsv(&dna_path)?;

            for row in &mut occurrences.rows {
                row.occurrence_id = format!("{}_{marker}", row.occurrence_id);
            }
            for row in &mut dna.rows {
                row.occurrence_id = format!("{}_{marker}", row.occurrence_id);
            }

            if let Some(batch) = sequencing_batch(dataset.as_str()) {
                occurrences.add_column(EVENT_REMARKS);
                for row in &mut occurrences.rows {
                    row.event_remarks = Some(batch.to_string());
                }
            }

            input.occurrences.append(occurrences);
            input.dna.append(dna);
            input.datasets += 1;
        }

        if input.datasets == 0 {
            return Ok(None);
        }
        correct_sample_codes(&mut input.occurrences, &mut input.dna);
        Ok(Some(input))
    }

    pub fn assemble(
        &self,
        site: &str,
        input: SiteInput,
        metadata: &SampleMetadata,
    ) -> Result<(SiteTables, SiteSummary), EdnaError> {
        let SiteInput {
            occurrences,
            dna,
            datasets,
        } = input;
        let blank_occurrences = join_samples(&occurrences, &metadata.blank);
        let mut non_blank = join_samples(&occurrences, &metadata.non_blank);

        Reconciler::new(self.registry).reconcile_occurrences(&mut non_blank.rows)?;

        let directives = annotations::load_directives(&self.options.annotations_folder, site)?;
        let annotated = AnnotationEngine::new(self.registry).apply_directives(
            &mut non_blank,
            &directives,
            site,
        )?;

        let contaminants_removed = if self.options.remove_contaminants {
            info!(site, rules = self.contaminants.len(), "removing contaminants");
            annotations::remove_contaminants(&mut non_blank, &self.contaminants)
        } else {
            0
        };

        let singletons_removed = filters::remove_singletons(&mut non_blank, &dna);
        let low_complexity_removed = filters::remove_low_complexity(&mut non_blank, &dna);

        let tables = SiteTables {
            dna: filters::dna_for(&non_blank, &dna),
            blank_dna: filters::dna_for(&blank_occurrences, &dna),
            occurrences: non_blank,
            blank_occurrences,
        };
        let summary = SiteSummary {
            site: site.to_string(),
            datasets,
            occurrences: tables.occurrences.len(),
            dna: tables.dna.len(),
            blank_occurrences: tables.blank_occurrences.len(),
            blank_dna: tables.blank_dna.len(),
            annotations_removed: annotated.removed,
            annotations_reclassified: annotated.reclassified,
            contaminants_removed,
            singletons_removed,
            low_complexity_removed,
        };
        info!(
            site,
            occurrences = summary.occurrences,
            blank = summary.blank_occurrences,
            singletons = singletons_removed,
            low_complexity = low_complexity_removed,
            "assembled site"
        );
        Ok((tables, summary))
    }
}

pub fn correct_sample_codes(occurrences: &mut OccurrenceTable, dna: &mut DnaTable) {
    for row in &mut occurrences.rows {
        row.occurrence_id = row
            .occurrence_id
            .replace(DUPLICATE_SAMPLE_CODE, CANONICAL_SAMPLE_CODE);
        if let Some(sample) = row.material_sample_id.as_mut() {
            *sample = sample.replace(DUPLICATE_SAMPLE_CODE, CANONICAL_SAMPLE_CODE);
        }
    }
    for row in &mut dna.rows {
        row.occurrence_id = row
            .occurrence_id
            .replace(DUPLICATE_SAMPLE_CODE, CANONICAL_SAMPLE_CODE);
    }
}

pub fn join_samples(
    occurrences: &OccurrenceTable,
    samples: &HashMap<String, Sample>,
) -> OccurrenceTable {
    let mut joined = OccurrenceTable::new(occurrences.columns.clone());
    for column in SAMPLE_COLUMNS {
        joined.add_column(column);
    }
    joined.rows = occurrences
        .rows
        .iter()
        .filter_map(|row| {
            let sample = samples.get(row.material_sample_id.as_deref()?)?;
            let mut row = row.clone();
            row.sample = Some(sample.clone());
            Some(row)
        })
        .collect();
    joined
}
