#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use edna_results::domain::AphiaId;
use edna_results::error::EdnaError;
use edna_results::metadata::{Sample, TrackerClient};
use edna_results::species_lists::{ReferenceSpecies, SpeciesListClient};
use edna_results::tables::{DnaRecord, OccurrenceRecord};
use edna_results::worms::{AphiaRecord, TaxonRegistry};

pub fn record(id: u64, name: &str, rank: &str) -> AphiaRecord {
    AphiaRecord {
        aphia_id: AphiaId::new(id),
        scientificname: Some(name.to_string()),
        status: Some("accepted".to_string()),
        rank: Some(rank.to_string()),
        valid_aphia_id: Some(AphiaId::new(id)),
        kingdom: Some("Animalia".to_string()),
        phylum: None,
        class: None,
        order: None,
        family: None,
        genus: None,
        lsid: Some(AphiaId::new(id).lsid()),
        is_marine: Some(1),
        is_brackish: None,
        match_type: None,
    }
}

/// In-memory registry. Unknown identifiers come back as bare records so every
/// batch keeps its size unless `short_batches` is set.
#[derive(Default)]
pub struct FakeRegistry {
    taxa: HashMap<AphiaId, AphiaRecord>,
    names: HashMap<String, AphiaId>,
    short_batches: bool,
    calls: Mutex<Vec<(&'static str, usize)>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an accepted taxon with lineage `[phylum, class, order, family, genus]`.
    pub fn taxon(mut self, id: u64, name: &str, rank: &str, lineage: [&str; 5]) -> Self {
        let mut record = record(id, name, rank);
        let [phylum, class, order, family, genus] = lineage.map(|value| {
            (!value.is_empty()).then(|| value.to_string())
        });
        record.phylum = phylum;
        record.class = class;
        record.order = order;
        record.family = family;
        record.genus = genus;
        self.names.insert(name.to_string(), record.aphia_id);
        self.taxa.insert(record.aphia_id, record);
        self
    }

    /// Adds a synonym pointing at an accepted identifier.
    pub fn synonym(mut self, id: u64, name: &str, accepted: u64) -> Self {
        let mut record = record(id, name, "Species");
        record.status = Some("unaccepted".to_string());
        record.valid_aphia_id = Some(AphiaId::new(accepted));
        self.names.insert(name.to_string(), record.aphia_id);
        self.taxa.insert(record.aphia_id, record);
        self
    }

    pub fn with_short_batches(mut self) -> Self {
        self.short_batches = true;
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, usize)> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, endpoint: &'static str, size: usize) {
        self.calls.lock().unwrap().push((endpoint, size));
    }
}

impl TaxonRegistry for FakeRegistry {
    fn match_names(&self, names: &[String]) -> Result<Vec<Vec<AphiaRecord>>, EdnaError> {
        self.log("match_names", names.len());
        let mut results: Vec<Vec<AphiaRecord>> = names
            .iter()
            .map(|name| match self.names.get(name) {
                Some(id) => {
                    let mut record = self.taxa[id].clone();
                    record.match_type = Some("exact".to_string());
                    vec![record]
                }
                None => Vec::new(),
            })
            .collect();
        if self.short_batches {
            results.pop();
        }
        Ok(results)
    }

    fn records_by_ids(&self, ids: &[AphiaId]) -> Result<Vec<AphiaRecord>, EdnaError> {
        self.log("records_by_ids", ids.len());
        let mut results: Vec<AphiaRecord> = ids
            .iter()
            .map(|id| {
                self.taxa.get(id).cloned().unwrap_or_else(|| AphiaRecord {
                    scientificname: None,
                    rank: None,
                    kingdom: None,
                    valid_aphia_id: None,
                    ..record(id.get(), "", "")
                })
            })
            .collect();
        if self.short_batches {
            results.pop();
        }
        Ok(results)
    }

    fn record_by_id(&self, id: AphiaId) -> Result<AphiaRecord, EdnaError> {
        self.log("record_by_id", 1);
        self.taxa
            .get(&id)
            .cloned()
            .ok_or(EdnaError::RegistryStatus {
                status: 404,
                message: "not found".to_string(),
            })
    }
}

#[derive(Default)]
pub struct FakeTracker {
    pub samples: Vec<Sample>,
}

impl TrackerClient for FakeTracker {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError> {
        Ok(self.samples.clone())
    }
}

#[derive(Default)]
pub struct FakeSpeciesLists {
    pub species: HashMap<String, Vec<ReferenceSpecies>>,
    pub calls: Mutex<Vec<String>>,
}

impl SpeciesListClient for FakeSpeciesLists {
    fn fetch_species(&self, site: &str) -> Result<Vec<ReferenceSpecies>, EdnaError> {
        self.calls.lock().unwrap().push(site.to_string());
        Ok(self.species.get(site).cloned().unwrap_or_default())
    }
}

pub fn sample(id: &str, blank: Option<bool>) -> Sample {
    Sample {
        material_sample_id: id.to_string(),
        locality: Some("North reef".to_string()),
        decimal_longitude: Some(-90.5),
        decimal_latitude: Some(-0.7),
        sample_size: Some("1500".to_string()),
        higher_geography: Some("Galapagos Islands".to_string()),
        blank,
        location_id: Some("S1".to_string()),
        event_date: Some("2022-10-01".to_string()),
    }
}

pub fn occurrence(id: &str, sample: &str, name: &str, quantity: u64) -> OccurrenceRecord {
    OccurrenceRecord {
        occurrence_id: id.to_string(),
        material_sample_id: Some(sample.to_string()),
        scientific_name: Some(name.to_string()),
        organism_quantity: Some(quantity),
        ..OccurrenceRecord::default()
    }
}

pub fn dna(id: &str, sequence: &str, gene: &str) -> DnaRecord {
    DnaRecord {
        occurrence_id: id.to_string(),
        dna_sequence: Some(sequence.to_string()),
        target_gene: Some(gene.to_string()),
        ..DnaRecord::default()
    }
}
