use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::domain::{AphiaId, TaxonField};
use crate::error::EdnaError;
use crate::tables::OccurrenceRecord;
use crate::worms::{AphiaRecord, TaxonRegistry};

pub const BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    pub aphia_id: AphiaId,
    pub lsid: String,
    pub scientific_name: Option<String>,
    pub rank: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub marine: bool,
}

impl From<AphiaRecord> for Lineage {
    fn from(record: AphiaRecord) -> Self {
        Self {
            lsid: record.lsid_or_default(),
            marine: record.is_marine_or_brackish(),
            aphia_id: record.aphia_id,
            scientific_name: record.scientificname,
            rank: record.rank,
            kingdom: record.kingdom,
            phylum: record.phylum,
            class: record.class,
            order: record.order,
            family: record.family,
            genus: record.genus,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DwcTaxonomy {
    pub scientific_name_id: String,
    pub scientific_name: Option<String>,
    pub taxon_rank: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistTaxonomy {
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub rank: Option<String>,
    pub marine: bool,
}

impl Lineage {
    pub fn to_dwc(&self) -> DwcTaxonomy {
        DwcTaxonomy {
            scientific_name_id: self.lsid.clone(),
            scientific_name: self.scientific_name.clone(),
            taxon_rank: self.rank.as_ref().map(|rank| rank.to_lowercase()),
            kingdom: self.kingdom.clone(),
            phylum: self.phylum.clone(),
            class: self.class.clone(),
            order: self.order.clone(),
            family: self.family.clone(),
            genus: self.genus.clone(),
        }
    }

    pub fn to_checklist(&self) -> ChecklistTaxonomy {
        ChecklistTaxonomy {
            phylum: self.phylum.clone(),
            class: self.class.clone(),
            order: self.order.clone(),
            family: self.family.clone(),
            genus: self.genus.clone(),
            species: self.scientific_name.clone(),
            rank: self.rank.clone(),
            marine: self.marine,
        }
    }
}

impl OccurrenceRecord {
    pub fn apply_taxonomy(&mut self, accepted: AphiaId, taxonomy: DwcTaxonomy) {
        self.accepted_id = Some(accepted);
        self.scientific_name_id = Some(taxonomy.scientific_name_id);
        self.scientific_name = taxonomy.scientific_name;
        self.taxon_rank = taxonomy.taxon_rank;
        self.kingdom = taxonomy.kingdom;
        self.phylum = taxonomy.phylum;
        self.class = taxonomy.class;
        self.order = taxonomy.order;
        self.family = taxonomy.family;
        self.genus = taxonomy.genus;
    }
}

/// Picks the identifier of the most specific populated rank that the name
/// matcher resolved, falling back to the incertae sedis placeholder.
pub fn most_specific_match(
    row: &OccurrenceRecord,
    matches: &HashMap<String, AphiaId>,
) -> AphiaId {
    TaxonField::PRECEDENCE
        .iter()
        .filter_map(|field| row.taxon(*field))
        .find_map(|name| matches.get(name.trim()).copied())
        .unwrap_or(AphiaId::INCERTAE_SEDIS)
}

pub struct Reconciler<'a, R: TaxonRegistry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: TaxonRegistry + ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub fn match_names(&self, names: &[String]) -> Result<HashMap<String, AphiaId>, EdnaError> {
        let names = distinct(names.iter().map(|name| name.trim()).filter(|n| !n.is_empty()));
        let mut matched = HashMap::new();
        for batch in names.chunks(BATCH_SIZE) {
            let batch: Vec<String> = batch.iter().map(|name| name.to_string()).collect();
            let candidates = self.registry.match_names(&batch)?;
            check_batch(batch.len(), candidates.len())?;
            for (name, candidates) in batch.into_iter().zip(candidates) {
                let exact = candidates
                    .into_iter()
                    .find(|record| record.match_type.as_deref() == Some("exact"));
                if let Some(record) = exact {
                    matched.insert(name, record.aphia_id);
                }
            }
        }
        tracing::debug!(names = names.len(), matched = matched.len(), "matched names");
        Ok(matched)
    }

    pub fn accepted_ids(&self, ids: &[AphiaId]) -> Result<HashMap<AphiaId, AphiaId>, EdnaError> {
        let ids = distinct(ids.iter().copied());
        let mut accepted = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(BATCH_SIZE) {
            let records = self.registry.records_by_ids(batch)?;
            check_batch(batch.len(), records.len())?;
            for (id, record) in batch.iter().zip(records) {
                accepted.insert(*id, record.valid_aphia_id.unwrap_or(*id));
            }
        }
        Ok(accepted)
    }

    pub fn lineages(&self, ids: &[AphiaId]) -> Result<HashMap<AphiaId, Lineage>, EdnaError> {
        let ids = distinct(ids.iter().copied());
        let mut lineages = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(BATCH_SIZE) {
            let records = self.registry.records_by_ids(batch)?;
            check_batch(batch.len(), records.len())?;
            for (id, record) in batch.iter().zip(records) {
                lineages.insert(*id, Lineage::from(record));
            }
        }
        Ok(lineages)
    }

    pub fn lineage(&self, id: AphiaId) -> Result<Lineage, EdnaError> {
        self.registry.record_by_id(id).map(Lineage::from)
    }

    pub fn reconcile_occurrences(&self, rows: &mut [OccurrenceRecord]) -> Result<(), EdnaError> {
        if rows.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = rows
            .iter()
            .flat_map(|row| {
                TaxonField::PRECEDENCE
                    .iter()
                    .filter_map(|field| row.taxon(*field))
            })
            .map(|name| name.to_string())
            .collect();
        let matches = self.match_names(&names)?;

        let matched: Vec<AphiaId> = rows
            .iter()
            .map(|row| most_specific_match(row, &matches))
            .collect();
        let accepted = self.accepted_ids(&matched)?;
        let accepted_ids: Vec<AphiaId> = accepted.values().copied().collect();
        let lineages = self.lineages(&accepted_ids)?;

        for (row, id) in rows.iter_mut().zip(matched) {
            let accepted_id = accepted.get(&id).copied().unwrap_or(id);
            let lineage = lineages
                .get(&accepted_id)
                .ok_or(EdnaError::MissingTaxon(accepted_id.get()))?;
            row.apply_taxonomy(accepted_id, lineage.to_dwc());
        }
        tracing::info!(
            rows = rows.len(),
            names = matches.len(),
            taxa = lineages.len(),
            "reconciled occurrences"
        );
        Ok(())
    }
}

fn check_batch(requested: usize, received: usize) -> Result<(), EdnaError> {
    if requested != received {
        return Err(EdnaError::BatchMismatch {
            requested,
            received,
        });
    }
    Ok(())
}

fn distinct<T: Eq + Hash + Clone>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}
