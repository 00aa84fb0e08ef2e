use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use camino::Utf8Path;
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use tracing::info;

use crate::domain::AphiaId;
use crate::error::EdnaError;
use crate::reference::ReferenceData;
use crate::species_lists::SpeciesListClient;
use crate::store::OutputStore;
use crate::tables::{DnaTable, OccurrenceTable};
use crate::taxonomy::{ChecklistTaxonomy, Reconciler};
use crate::worms::TaxonRegistry;

pub const EXCLUDED_SPECIES: &str = "Homo sapiens";

pub const CSV_COLUMNS: [&str; 19] = [
    "AphiaID",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
    "records",
    "reads",
    "asvs",
    "max_year",
    "target_gene",
    "source_obis",
    "source_gbif",
    "source_dna",
    "marine",
    "redlist_category",
    "vernacular",
    "group",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistEntry {
    #[serde(rename = "AphiaID")]
    pub aphia_id: AphiaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phylum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asvs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_gene: Option<String>,
    pub source_obis: bool,
    pub source_gbif: bool,
    pub source_dna: bool,
    pub marine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redlist_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vernacular: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip)]
    pub rank: Option<String>,
}

impl ChecklistEntry {
    fn new(aphia_id: AphiaId, row: SourceRow, taxonomy: ChecklistTaxonomy) -> Self {
        Self {
            aphia_id,
            phylum: taxonomy.phylum,
            class: taxonomy.class,
            order: taxonomy.order,
            family: taxonomy.family,
            genus: taxonomy.genus,
            species: taxonomy.species,
            records: row.records,
            reads: row.reads,
            asvs: row.asvs,
            max_year: row.max_year,
            target_gene: row.target_gene,
            source_obis: row.obis.unwrap_or(false),
            source_gbif: row.gbif.unwrap_or(false),
            source_dna: row.dna.unwrap_or(false),
            marine: taxonomy.marine,
            redlist_category: None,
            vernacular: None,
            group: None,
            rank: taxonomy.rank,
        }
    }

    pub fn rank_value(&self, rank: &str) -> Option<&str> {
        match rank {
            "phylum" => self.phylum.as_deref(),
            "class" => self.class.as_deref(),
            "order" => self.order.as_deref(),
            "family" => self.family.as_deref(),
            "genus" => self.genus.as_deref(),
            "species" => self.species.as_deref(),
            _ => None,
        }
    }

    pub fn is_species(&self) -> bool {
        self.rank
            .as_deref()
            .is_some_and(|rank| rank.eq_ignore_ascii_case("species"))
    }

    fn csv_record(&self) -> Vec<String> {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let number = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();
        vec![
            self.aphia_id.to_string(),
            text(&self.phylum),
            text(&self.class),
            text(&self.order),
            text(&self.family),
            text(&self.genus),
            text(&self.species),
            number(self.records),
            number(self.reads),
            number(self.asvs),
            self.max_year.map(|v| v.to_string()).unwrap_or_default(),
            text(&self.target_gene),
            self.source_obis.to_string(),
            self.source_gbif.to_string(),
            self.source_dna.to_string(),
            self.marine.to_string(),
            text(&self.redlist_category),
            text(&self.vernacular),
            text(&self.group),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SourceRow {
    records: Option<u64>,
    reads: Option<u64>,
    asvs: Option<u64>,
    max_year: Option<i64>,
    target_gene: Option<String>,
    obis: Option<bool>,
    gbif: Option<bool>,
    dna: Option<bool>,
}

impl SourceRow {
    /// Keeps the first non-null value per column; presence flags are or-ed.
    fn merge(&mut self, other: SourceRow) {
        self.records = self.records.or(other.records);
        self.reads = self.reads.or(other.reads);
        self.asvs = self.asvs.or(other.asvs);
        self.max_year = self.max_year.or(other.max_year);
        self.target_gene = self.target_gene.take().or(other.target_gene);
        self.obis = any_flag(self.obis, other.obis);
        self.gbif = any_flag(self.gbif, other.gbif);
        self.dna = any_flag(self.dna, other.dna);
    }
}

fn any_flag(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (None, None) => None,
        (left, right) => Some(left.unwrap_or(false) || right.unwrap_or(false)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnaSpecies {
    pub scientific_name: String,
    pub aphia_id: AphiaId,
    pub reads: u64,
    pub target_genes: BTreeSet<String>,
    pub asvs: u64,
}

pub fn dna_species(occurrences: &OccurrenceTable, dna: &DnaTable) -> Vec<DnaSpecies> {
    let genes: HashMap<&str, Option<&str>> = dna
        .rows
        .iter()
        .map(|row| (row.occurrence_id.as_str(), row.target_gene.as_deref()))
        .collect();

    let mut grouped: Vec<DnaSpecies> = Vec::new();
    let mut index: HashMap<(String, AphiaId), usize> = HashMap::new();
    for row in occurrences.rows.iter().filter(|row| row.is_species()) {
        let Some(gene) = genes.get(row.occurrence_id.as_str()) else {
            continue;
        };
        let (Some(name), Some(id)) = (
            row.scientific_name.as_ref(),
            row.scientific_name_id.as_deref().and_then(AphiaId::extract),
        ) else {
            continue;
        };
        let key = (name.clone(), id);
        let position = *index.entry(key).or_insert_with(|| {
            grouped.push(DnaSpecies {
                scientific_name: name.clone(),
                aphia_id: id,
                reads: 0,
                target_genes: BTreeSet::new(),
                asvs: 0,
            });
            grouped.len() - 1
        });
        let entry = &mut grouped[position];
        entry.reads += row.organism_quantity.unwrap_or(0);
        entry.asvs += 1;
        if let Some(gene) = gene {
            entry.target_genes.insert(gene.to_string());
        }
    }
    grouped
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceCounts {
    pub dna: usize,
    pub obis: usize,
    pub gbif: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceOverlap {
    pub database: usize,
    pub dna: usize,
    pub both: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    #[serde(rename = "materialSampleID")]
    pub material_sample_id: String,
    pub locality: Option<String>,
    #[serde(rename = "locationID")]
    pub location_id: Option<String>,
    #[serde(rename = "decimalLongitude")]
    pub decimal_longitude: Option<f64>,
    #[serde(rename = "decimalLatitude")]
    pub decimal_latitude: Option<f64>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
    pub reads: u64,
    pub asvs: u64,
    pub species: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChecklistStats {
    pub redlist: BTreeMap<String, SourceCounts>,
    pub groups: BTreeMap<String, usize>,
    pub source: SourceOverlap,
    pub samples: Vec<SampleStats>,
}

impl ChecklistStats {
    pub fn compute(entries: &[ChecklistEntry], occurrences: &OccurrenceTable) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            if let Some(category) = &entry.redlist_category {
                let counts = stats.redlist.entry(category.clone()).or_default();
                counts.dna += usize::from(entry.source_dna);
                counts.obis += usize::from(entry.source_obis);
                counts.gbif += usize::from(entry.source_gbif);
                counts.total += 1;
            }
            if let Some(group) = &entry.group {
                *stats.groups.entry(group.clone()).or_default() += 1;
            }
            let database = entry.source_obis || entry.source_gbif;
            stats.source.database += usize::from(database);
            stats.source.dna += usize::from(entry.source_dna);
            stats.source.both += usize::from(database && entry.source_dna);
            stats.source.total += 1;
        }
        stats.samples = sample_stats(occurrences);
        stats
    }
}

fn sample_stats(occurrences: &OccurrenceTable) -> Vec<SampleStats> {
    let mut samples: BTreeMap<&str, (SampleStats, HashSet<&str>)> = BTreeMap::new();
    for row in &occurrences.rows {
        let Some(sample) = &row.sample else {
            continue;
        };
        let (stats, species) = samples
            .entry(sample.material_sample_id.as_str())
            .or_insert_with(|| {
                (
                    SampleStats {
                        material_sample_id: sample.material_sample_id.clone(),
                        locality: sample.locality.clone(),
                        location_id: sample.location_id.clone(),
                        decimal_longitude: sample.decimal_longitude,
                        decimal_latitude: sample.decimal_latitude,
                        event_date: sample.event_date.clone(),
                        reads: 0,
                        asvs: 0,
                        species: 0,
                    },
                    HashSet::new(),
                )
            });
        stats.reads += row.organism_quantity.unwrap_or(0);
        stats.asvs += 1;
        if row.is_species() {
            if let Some(name) = row.scientific_name.as_deref() {
                species.insert(name);
            }
        }
    }
    samples
        .into_values()
        .map(|(mut stats, species)| {
            stats.species = species.len();
            stats
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checklist {
    pub entries: Vec<ChecklistEntry>,
    pub stats: ChecklistStats,
}

#[derive(Serialize)]
struct ChecklistDocument<'a> {
    created: &'a str,
    species: Vec<&'a ChecklistEntry>,
    stats: &'a ChecklistStats,
}

impl Checklist {
    pub fn dna_entries(&self) -> impl Iterator<Item = &ChecklistEntry> {
        self.entries.iter().filter(|entry| entry.source_dna)
    }

    pub fn write(&self, store: &OutputStore, site: &str) -> Result<(), EdnaError> {
        let created = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let full: Vec<&ChecklistEntry> = self.entries.iter().collect();
        let dna: Vec<&ChecklistEntry> = self.dna_entries().collect();

        write_csv(&store.checklist_path(false, "csv", site), &full)?;
        write_csv(&store.checklist_path(true, "csv", site), &dna)?;
        self.write_json(&store.checklist_path(false, "json", site), &created, full)?;
        self.write_json(&store.checklist_path(true, "json", site), &created, dna)?;
        Ok(())
    }

    fn write_json(
        &self,
        path: &Utf8Path,
        created: &str,
        species: Vec<&ChecklistEntry>,
    ) -> Result<(), EdnaError> {
        let document = ChecklistDocument {
            created,
            species,
            stats: &self.stats,
        };
        let content = serde_json::to_vec_pretty(&document).map_err(|err| {
            EdnaError::TableWrite {
                path: path.to_string(),
                message: err.to_string(),
            }
        })?;
        info!(path = %path, "writing checklist");
        OutputStore::write_bytes_atomic(path, &content)
    }
}

pub fn checklist_csv(entries: &[&ChecklistEntry]) -> Result<Vec<u8>, String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|err| err.to_string())?;
    for entry in entries {
        writer
            .write_record(entry.csv_record())
            .map_err(|err| err.to_string())?;
    }
    writer.into_inner().map_err(|err| err.to_string())
}

fn write_csv(path: &Utf8Path, entries: &[&ChecklistEntry]) -> Result<(), EdnaError> {
    let content = checklist_csv(entries).map_err(|message| EdnaError::TableWrite {
        path: path.to_string(),
        message,
    })?;
    info!(path = %path, "writing checklist");
    OutputStore::write_bytes_atomic(path, &content)
}

pub struct ChecklistAggregator<'a, R, S>
where
    R: TaxonRegistry + ?Sized,
    S: SpeciesListClient + ?Sized,
{
    reconciler: Reconciler<'a, R>,
    species_lists: &'a S,
    reference: &'a ReferenceData,
}

impl<'a, R, S> ChecklistAggregator<'a, R, S>
where
    R: TaxonRegistry + ?Sized,
    S: SpeciesListClient + ?Sized,
{
    pub fn new(registry: &'a R, species_lists: &'a S, reference: &'a ReferenceData) -> Self {
        Self {
            reconciler: Reconciler::new(registry),
            species_lists,
            reference,
        }
    }

    pub fn aggregate(
        &self,
        site: &str,
        occurrences: &OccurrenceTable,
        dna: &DnaTable,
    ) -> Result<Checklist, EdnaError> {
        let mut rows: Vec<(AphiaId, SourceRow)> = Vec::new();

        let detected = dna_species(occurrences, dna);
        let ids: Vec<AphiaId> = detected.iter().map(|species| species.aphia_id).collect();
        let accepted = self.reconciler.accepted_ids(&ids)?;
        for species in detected {
            let id = accepted
                .get(&species.aphia_id)
                .copied()
                .unwrap_or(species.aphia_id);
            let target_gene = (!species.target_genes.is_empty()).then(|| {
                species
                    .target_genes
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(",")
            });
            rows.push((
                id,
                SourceRow {
                    reads: Some(species.reads),
                    asvs: Some(species.asvs),
                    target_gene,
                    dna: Some(true),
                    ..SourceRow::default()
                },
            ));
        }

        let published = self.species_lists.fetch_species(site)?;
        let ids: Vec<AphiaId> = published.iter().map(|species| species.aphia_id).collect();
        let accepted = self.reconciler.accepted_ids(&ids)?;
        for species in published {
            let id = accepted
                .get(&species.aphia_id)
                .copied()
                .unwrap_or(species.aphia_id);
            rows.push((
                id,
                SourceRow {
                    records: species.records,
                    max_year: species.max_year,
                    obis: species.obis,
                    gbif: species.gbif,
                    ..SourceRow::default()
                },
            ));
        }

        let aggregated = aggregate_by_id(rows);
        let ids: Vec<AphiaId> = aggregated.iter().map(|(id, _)| *id).collect();
        let lineages = self.reconciler.lineages(&ids)?;

        let mut entries = Vec::with_capacity(aggregated.len());
        for (id, row) in aggregated {
            let lineage = lineages.get(&id).ok_or(EdnaError::MissingTaxon(id.get()))?;
            let entry = ChecklistEntry::new(id, row, lineage.to_checklist());
            if entry.species.as_deref() == Some(EXCLUDED_SPECIES) || !entry.is_species() {
                continue;
            }
            entries.push(entry);
        }

        for entry in &mut entries {
            self.enrich(entry);
        }
        sort_entries(&mut entries);

        let stats = ChecklistStats::compute(&entries, occurrences);
        info!(
            site,
            species = entries.len(),
            dna = stats.source.dna,
            both = stats.source.both,
            "aggregated checklist"
        );
        Ok(Checklist { entries, stats })
    }

    fn enrich(&self, entry: &mut ChecklistEntry) {
        entry.redlist_category = entry
            .species
            .as_deref()
            .and_then(|species| self.reference.redlist_category(species))
            .map(str::to_string);
        entry.vernacular = self.reference.vernacular(entry.aphia_id).map(str::to_string);
        entry.group = self
            .reference
            .group_for(|rank| entry.rank_value(rank))
            .map(str::to_string);
    }
}

fn aggregate_by_id(rows: Vec<(AphiaId, SourceRow)>) -> Vec<(AphiaId, SourceRow)> {
    let mut aggregated: Vec<(AphiaId, SourceRow)> = Vec::new();
    let mut index: HashMap<AphiaId, usize> = HashMap::new();
    for (id, row) in rows {
        match index.get(&id) {
            Some(&position) => aggregated[position].1.merge(row),
            None => {
                index.insert(id, aggregated.len());
                aggregated.push((id, row));
            }
        }
    }
    aggregated
}

fn none_last(left: &Option<String>, right: &Option<String>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_entries(entries: &mut [ChecklistEntry]) {
    entries.sort_by(|a, b| {
        none_last(&a.group, &b.group)
            .then_with(|| none_last(&a.phylum, &b.phylum))
            .then_with(|| none_last(&a.class, &b.class))
            .then_with(|| none_last(&a.order, &b.order))
            .then_with(|| none_last(&a.species, &b.species))
    });
}
