use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{AphiaId, TaxonField};
use crate::error::EdnaError;
use crate::tables::{DwcRow, OccurrenceRecord, OccurrenceTable};
use crate::taxonomy::Reconciler;
use crate::worms::TaxonRegistry;

pub const ANNOTATION_REMARK: &str = "scientificName changed due to a manual annotation";
pub const INCERTAE_SEDIS: &str = "incertae sedis";
pub const CONTAMINANTS_FILE: &str = "contaminants.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Remove,
    Reclassify(AphiaId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub target: Option<(TaxonField, String)>,
    pub aphia_id: Option<AphiaId>,
    pub action: Option<Action>,
}

impl Directive {
    pub fn from_json(value: &Value) -> Self {
        let target = TaxonField::PRECEDENCE.iter().find_map(|field| {
            value
                .get(field.annotation_key())
                .and_then(Value::as_str)
                .map(|name| (*field, name.trim().to_string()))
        });
        let aphia_id = value.get("AphiaID").and_then(json_aphia_id);
        // Without a taxon key the directive selects nothing of its own.
        let action = match (&target, value.get("remove").and_then(json_flag)) {
            (None, _) | (_, None) => None,
            (Some(_), Some(true)) => Some(Action::Remove),
            (Some(_), Some(false)) => value
                .get("new_AphiaID")
                .and_then(json_aphia_id)
                .map(Action::Reclassify),
        };
        Self {
            target,
            aphia_id,
            action,
        }
    }

    /// Occurrence identifiers selected by name or, when given, by accepted
    /// identifier. The two criteria are unioned.
    pub fn affected(&self, rows: &[OccurrenceRecord]) -> HashSet<String> {
        rows.iter()
            .filter(|row| {
                let by_name = self
                    .target
                    .as_ref()
                    .is_some_and(|(field, name)| row.taxon(*field) == Some(name.as_str()));
                let by_id = self.aphia_id.is_some() && row.accepted_id == self.aphia_id;
                by_name || by_id
            })
            .map(|row| row.occurrence_id.clone())
            .collect()
    }

    fn describe(&self) -> String {
        match &self.target {
            Some((field, name)) => format!("{} {name}", field.column()),
            None => "nothing".to_string(),
        }
    }
}

pub(crate) fn json_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_aphia_id(value: &Value) -> Option<AphiaId> {
    match value {
        Value::Number(number) => number.as_u64().map(AphiaId::new),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContaminantRule {
    pub column: String,
    pub name: String,
}

pub fn load_directives(folder: &Utf8Path, site: &str) -> Result<Vec<Directive>, EdnaError> {
    let path = folder.join(format!("{site}.json"));
    let Some(entries) = read_json_array(&path)? else {
        debug!(site, "no annotation file");
        return Ok(Vec::new());
    };
    Ok(entries.iter().map(Directive::from_json).collect())
}

pub fn load_contaminants(folder: &Utf8Path) -> Result<Vec<ContaminantRule>, EdnaError> {
    let path = folder.join(CONTAMINANTS_FILE);
    let Some(entries) = read_json_array(&path)? else {
        warn!(path = %path, "contaminant list not found");
        return Ok(Vec::new());
    };
    let mut rules = Vec::new();
    for entry in &entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        for (column, name) in object {
            if let Some(name) = name.as_str() {
                rules.push(ContaminantRule {
                    column: column.trim().to_string(),
                    name: name.trim().to_string(),
                });
            }
        }
    }
    Ok(rules)
}

fn read_json_array(path: &Utf8Path) -> Result<Option<Vec<Value>>, EdnaError> {
    if !path.as_std_path().exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| EdnaError::AnnotationParse {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| EdnaError::AnnotationParse {
            path: path.to_string(),
            message: err.to_string(),
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub removed: usize,
    pub reclassified: usize,
    pub contaminants: usize,
}

pub struct AnnotationEngine<'a, R: TaxonRegistry + ?Sized> {
    reconciler: Reconciler<'a, R>,
}

impl<'a, R: TaxonRegistry + ?Sized> AnnotationEngine<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            reconciler: Reconciler::new(registry),
        }
    }

    pub fn apply_directives(
        &self,
        table: &mut OccurrenceTable,
        directives: &[Directive],
        site: &str,
    ) -> Result<AnnotationSummary, EdnaError> {
        info!(site, directives = directives.len(), "applying annotations");
        let mut summary = AnnotationSummary::default();
        for directive in directives {
            let Some(action) = directive.action else {
                continue;
            };
            let affected = directive.affected(&table.rows);
            if affected.is_empty() {
                continue;
            }
            let rows = table
                .rows
                .iter_mut()
                .filter(|row| affected.contains(&row.occurrence_id));
            match action {
                Action::Remove => {
                    debug!(site, target = %directive.describe(), "removing");
                    for row in rows {
                        mark_incertae_sedis(row);
                        summary.removed += 1;
                    }
                }
                Action::Reclassify(id) => {
                    debug!(site, target = %directive.describe(), new = %id, "updating");
                    let taxonomy = self.reconciler.lineage(id)?.to_dwc();
                    for row in rows {
                        row.apply_taxonomy(id, taxonomy.clone());
                        prepend_remark(row);
                        summary.reclassified += 1;
                    }
                }
            }
        }
        Ok(summary)
    }
}

fn mark_incertae_sedis(row: &mut OccurrenceRecord) {
    row.class = None;
    row.order = None;
    row.family = None;
    row.genus = None;
    row.taxon_rank = None;
    row.scientific_name = Some(INCERTAE_SEDIS.to_string());
    row.scientific_name_id = Some(AphiaId::INCERTAE_SEDIS.lsid());
    row.accepted_id = Some(AphiaId::INCERTAE_SEDIS);
    prepend_remark(row);
}

fn prepend_remark(row: &mut OccurrenceRecord) {
    row.identification_remarks = Some(match row.identification_remarks.take() {
        Some(existing) => format!("{ANNOTATION_REMARK}; {existing}"),
        None => ANNOTATION_REMARK.to_string(),
    });
}

pub fn remove_contaminants(table: &mut OccurrenceTable, rules: &[ContaminantRule]) -> usize {
    let mut removed = 0;
    for rule in rules {
        removed += table.retain(|row| row.value(&rule.column).as_deref() != Some(rule.name.as_str()));
    }
    removed
}
