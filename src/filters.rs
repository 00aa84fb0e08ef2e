use std::collections::{HashMap, HashSet};

use crate::tables::{DnaTable, OccurrenceTable};

pub fn is_low_complexity(sequence: &str) -> bool {
    !sequence.is_empty()
        && sequence
            .bytes()
            .all(|base| matches!(base.to_ascii_uppercase(), b'A' | b'C'))
}

fn sequences_by_occurrence(dna: &DnaTable) -> HashMap<&str, &str> {
    dna.rows
        .iter()
        .filter_map(|row| {
            row.dna_sequence
                .as_deref()
                .map(|sequence| (row.occurrence_id.as_str(), sequence))
        })
        .collect()
}

/// Removes occurrences whose sequence has a total abundance of exactly one
/// across all occurrences sharing it.
pub fn remove_singletons(occurrences: &mut OccurrenceTable, dna: &DnaTable) -> usize {
    let sequences = sequences_by_occurrence(dna);
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for row in &occurrences.rows {
        if let Some(sequence) = sequences.get(row.occurrence_id.as_str()) {
            *totals.entry(*sequence).or_default() += row.organism_quantity.unwrap_or(0);
        }
    }
    occurrences.retain(|row| {
        sequences
            .get(row.occurrence_id.as_str())
            .and_then(|sequence| totals.get(sequence))
            .is_none_or(|total| *total != 1)
    })
}

pub fn remove_low_complexity(occurrences: &mut OccurrenceTable, dna: &DnaTable) -> usize {
    let sequences = sequences_by_occurrence(dna);
    occurrences.retain(|row| {
        !sequences
            .get(row.occurrence_id.as_str())
            .is_some_and(|sequence| is_low_complexity(sequence))
    })
}

pub fn dna_for(occurrences: &OccurrenceTable, dna: &DnaTable) -> DnaTable {
    let ids: HashSet<&str> = occurrences
        .rows
        .iter()
        .map(|row| row.occurrence_id.as_str())
        .collect();
    DnaTable {
        columns: dna.columns.clone(),
        rows: dna
            .rows
            .iter()
            .filter(|row| ids.contains(row.occurrence_id.as_str()))
            .cloned()
            .collect(),
    }
}
