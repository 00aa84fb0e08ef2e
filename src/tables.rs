use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};

use camino::Utf8Path;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};

use crate::domain::{AphiaId, TaxonField};
use crate::error::EdnaError;
use crate::metadata::{SAMPLE_COLUMNS, Sample};
use crate::store::OutputStore;

pub const OCCURRENCE_ID: &str = "occurrenceID";
pub const EVENT_REMARKS: &str = "eventRemarks";

pub trait DwcRow: Sized {
    fn from_fields(fields: HashMap<String, String>) -> Self;
    fn value(&self, column: &str) -> Option<Cow<'_, str>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table<T> {
    pub columns: Vec<String>,
    pub rows: Vec<T>,
}

impl<T: DwcRow> Table<T> {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn read_tsv(path: &Utf8Path) -> Result<Self, EdnaError> {
        let file = File::open(path.as_std_path()).map_err(|err| EdnaError::TableRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        Self::from_reader(file).map_err(|message| EdnaError::TableRead {
            path: path.to_string(),
            message,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, String> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers().map_err(|err| err.to_string())?.clone();
        let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| err.to_string())?;
            rows.push(T::from_fields(zip_fields(&headers, &record)));
        }
        Ok(Self { columns, rows })
    }

    pub fn write_tsv(&self, path: &Utf8Path) -> Result<(), EdnaError> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)
            .map_err(|message| EdnaError::TableWrite {
                path: path.to_string(),
                message,
            })?;
        OutputStore::write_bytes_atomic(path, &buffer)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), String> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Necessary)
            .from_writer(writer);
        writer
            .write_record(&self.columns)
            .map_err(|err| err.to_string())?;
        for row in &self.rows {
            let values: Vec<Cow<'_, str>> = self
                .columns
                .iter()
                .map(|column| row.value(column).unwrap_or(Cow::Borrowed("")))
                .collect();
            writer
                .write_record(values.iter().map(|value| value.as_bytes()))
                .map_err(|err| err.to_string())?;
        }
        writer.flush().map_err(|err| err.to_string())
    }

    pub fn append(&mut self, other: Table<T>) {
        for column in other.columns {
            add_column(&mut self.columns, &column);
        }
        self.rows.extend(other.rows);
    }

    pub fn add_column(&mut self, column: &str) {
        add_column(&mut self.columns, column);
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(keep);
        before - self.rows.len()
    }
}

fn add_column(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|c| c == column) {
        columns.push(column.to_string());
    }
}

fn zip_fields(headers: &StringRecord, record: &StringRecord) -> HashMap<String, String> {
    headers
        .iter()
        .zip(record.iter())
        .filter(|(_, value)| !value.is_empty())
        .map(|(header, value)| (header.to_string(), value.to_string()))
        .collect()
}

pub type OccurrenceTable = Table<OccurrenceRecord>;
pub type DnaTable = Table<DnaRecord>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccurrenceRecord {
    pub occurrence_id: String,
    pub material_sample_id: Option<String>,
    pub scientific_name: Option<String>,
    pub scientific_name_id: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub taxon_rank: Option<String>,
    pub identification_remarks: Option<String>,
    pub organism_quantity: Option<u64>,
    pub event_remarks: Option<String>,
    pub accepted_id: Option<AphiaId>,
    pub sample: Option<Sample>,
    pub extra: HashMap<String, String>,
}

impl OccurrenceRecord {
    pub fn taxon(&self, field: TaxonField) -> Option<&str> {
        match field {
            TaxonField::ScientificName => self.scientific_name.as_deref(),
            TaxonField::Genus => self.genus.as_deref(),
            TaxonField::Family => self.family.as_deref(),
            TaxonField::Order => self.order.as_deref(),
            TaxonField::Class => self.class.as_deref(),
            TaxonField::Phylum => self.phylum.as_deref(),
        }
    }

    pub fn is_species(&self) -> bool {
        self.taxon_rank
            .as_deref()
            .is_some_and(|rank| rank.eq_ignore_ascii_case("species"))
    }
}

impl DwcRow for OccurrenceRecord {
    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            occurrence_id: fields.remove(OCCURRENCE_ID).unwrap_or_default(),
            material_sample_id: fields.remove("materialSampleID"),
            scientific_name: fields.remove("scientificName"),
            scientific_name_id: fields.remove("scientificNameID"),
            kingdom: fields.remove("kingdom"),
            phylum: fields.remove("phylum"),
            class: fields.remove("class"),
            order: fields.remove("order"),
            family: fields.remove("family"),
            genus: fields.remove("genus"),
            taxon_rank: fields.remove("taxonRank"),
            identification_remarks: fields.remove("identificationRemarks"),
            organism_quantity: fields
                .remove("organismQuantity")
                .and_then(|value| parse_quantity(&value)),
            event_remarks: fields.remove(EVENT_REMARKS),
            accepted_id: None,
            sample: None,
            extra: fields,
        }
    }

    fn value(&self, column: &str) -> Option<Cow<'_, str>> {
        if let Some(sample) = &self.sample {
            if SAMPLE_COLUMNS.contains(&column) {
                return sample.value(column);
            }
        }
        match column {
            OCCURRENCE_ID => Some(Cow::Borrowed(self.occurrence_id.as_str())),
            "materialSampleID" => borrowed(&self.material_sample_id),
            "scientificName" => borrowed(&self.scientific_name),
            "scientificNameID" => borrowed(&self.scientific_name_id),
            "kingdom" => borrowed(&self.kingdom),
            "phylum" => borrowed(&self.phylum),
            "class" => borrowed(&self.class),
            "order" => borrowed(&self.order),
            "family" => borrowed(&self.family),
            "genus" => borrowed(&self.genus),
            "taxonRank" => borrowed(&self.taxon_rank),
            "identificationRemarks" => borrowed(&self.identification_remarks),
            "organismQuantity" => self
                .organism_quantity
                .map(|value| Cow::Owned(value.to_string())),
            EVENT_REMARKS => borrowed(&self.event_remarks),
            other => self.extra.get(other).map(|value| Cow::Borrowed(value.as_str())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DnaRecord {
    pub occurrence_id: String,
    pub dna_sequence: Option<String>,
    pub target_gene: Option<String>,
    pub extra: HashMap<String, String>,
}

impl DwcRow for DnaRecord {
    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            occurrence_id: fields.remove(OCCURRENCE_ID).unwrap_or_default(),
            dna_sequence: fields.remove("DNA_sequence"),
            target_gene: fields.remove("target_gene"),
            extra: fields,
        }
    }

    fn value(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            OCCURRENCE_ID => Some(Cow::Borrowed(self.occurrence_id.as_str())),
            "DNA_sequence" => self.dna_sequence.as_deref().map(Cow::Borrowed),
            "target_gene" => self.target_gene.as_deref().map(Cow::Borrowed),
            other => self.extra.get(other).map(|value| Cow::Borrowed(value.as_str())),
        }
    }
}

fn borrowed(value: &Option<String>) -> Option<Cow<'_, str>> {
    value.as_deref().map(Cow::Borrowed)
}

/// Abundances are integral read counts, occasionally written as `12.0`.
fn parse_quantity(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}
