mod common;

use std::collections::HashSet;
use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use common::{FakeRegistry, sample};
use edna_results::assembler::{
    AssemblerOptions, OccurrenceAssembler, correct_sample_codes, group_by_site, list_datasets,
};
use edna_results::error::EdnaError;
use edna_results::filters::{dna_for, remove_low_complexity, remove_singletons};
use edna_results::metadata::SampleMetadata;
use edna_results::store::OutputStore;
use edna_results::tables::{DnaTable, OccurrenceTable};

const PROJECT: &str = "eDNAexpeditions_batch1_samples";

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

fn write_dataset(root: &Utf8Path, name: &str, occurrences: Option<&str>, dna: Option<&str>) {
    let dwca = root.join(PROJECT).join("runs").join(name).join("05-dwca");
    fs::create_dir_all(&dwca).unwrap();
    if let Some(occurrences) = occurrences {
        fs::write(dwca.join("Occurrence_table.tsv"), occurrences).unwrap();
    }
    if let Some(dna) = dna {
        fs::write(dwca.join("DNA_extension_table.tsv"), dna).unwrap();
    }
}

fn fixture(root: &Utf8Path) {
    write_dataset(
        root,
        "Galapagos_MiMammal_2023",
        Some(
            "occurrenceID\tmaterialSampleID\tscientificName\torganismQuantity\tidentifiedBy\n\
             occ1\tEE0001\tSolea solea\t10\tpipeline\n\
             occ2\tEE0001\tSolea solea\t1\tpipeline\n\
             occ3\tEE0476\tSolea solea\t1\tpipeline\n\
             occ5\tEE0001\tSolea solea\t7\tpipeline\n\
             occ6\tEE0099\tHomo sapiens\t3\tpipeline\n\
             occ7\tEE0500\tSolea solea\t9\tpipeline\n",
        ),
        Some(
            "occurrenceID\tDNA_sequence\ttarget_gene\n\
             occ1\tAAAGGGTTT\t12S\n\
             occ2\tGGGGTTTTAA\t12S\n\
             occ3\tTTTTGGGG\t12S\n\
             occ5\tACACAC\t12S\n\
             occ6\tCCCGGGTTT\t12S\n\
             occ7\tCCCCAAAAT\t12S\n",
        ),
    );
    write_dataset(
        root,
        "Galapagos_COI_2023",
        Some(
            "occurrenceID\tmaterialSampleID\tscientificName\torganismQuantity\n\
             occ4\tEE0002\tSolea solea\t1\n\
             occ8\tEE0002\tHomo sapiens\t50\n",
        ),
        Some(
            "occurrenceID\tDNA_sequence\ttarget_gene\n\
             occ4\tTTTTGGGG\tCOI\n\
             occ8\tGATTACA\tCOI\n",
        ),
    );
    write_dataset(
        root,
        "Wadden_COI_2023",
        Some("occurrenceID\tscientificName\nocc1\tSolea solea\n"),
        None,
    );
}

fn registry() -> FakeRegistry {
    FakeRegistry::new()
        .taxon(
            127160,
            "Solea solea",
            "Species",
            ["Chordata", "Teleostei", "Pleuronectiformes", "Soleidae", "Solea"],
        )
        .taxon(
            127000,
            "Homo sapiens",
            "Species",
            ["Chordata", "Mammalia", "Primates", "Hominidae", "Homo"],
        )
}

fn metadata() -> SampleMetadata {
    SampleMetadata::partition(vec![
        sample("EE0001", Some(false)),
        sample("EE0475", Some(false)),
        sample("EE0002", Some(false)),
        sample("EE0099", Some(true)),
        sample("EE0777", None),
    ])
}

fn options(annotations: &Utf8Path) -> AssemblerOptions {
    AssemblerOptions {
        occurrence_file: "Occurrence_table.tsv".to_string(),
        dna_file: "DNA_extension_table.tsv".to_string(),
        annotations_folder: annotations.to_path_buf(),
        remove_contaminants: true,
    }
}

#[test]
fn datasets_group_by_site_in_first_seen_order() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path());
    fixture(&root);

    let datasets = list_datasets(&root, &[PROJECT.to_string()]).unwrap();
    let names: Vec<&str> = datasets.iter().filter_map(|path| path.file_name()).collect();
    assert_eq!(
        names,
        vec!["Galapagos_COI_2023", "Galapagos_MiMammal_2023", "Wadden_COI_2023"]
    );

    let sites = group_by_site(datasets).unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].0, "galapagos_islands");
    assert_eq!(sites[0].1.len(), 2);
    assert_eq!(sites[1].0, "wadden_sea");
}

#[test]
fn missing_project_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let err = list_datasets(&utf8(temp.path()), &["absent".to_string()]).unwrap_err();
    assert_matches!(err, EdnaError::MissingResults(_));
}

#[test]
fn site_without_usable_datasets_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path());
    fixture(&root);
    let registry = registry();
    let assembler = OccurrenceAssembler::new(&registry, options(&root.join("annotations"))).unwrap();

    let wadden = root.join(PROJECT).join("runs").join("Wadden_COI_2023");
    assert!(assembler.load_site(&[wadden]).unwrap().is_none());
}

#[test]
fn assembles_and_writes_site_tables() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path());
    fixture(&root);
    let annotations = root.join("annotations");
    fs::create_dir_all(&annotations).unwrap();
    fs::write(annotations.join("contaminants.json"), r#"[{"genus": "Homo"}]"#).unwrap();

    let registry = registry();
    let assembler = OccurrenceAssembler::new(&registry, options(&annotations)).unwrap();
    let datasets = list_datasets(&root, &[PROJECT.to_string()]).unwrap();
    let (site, datasets) = group_by_site(datasets).unwrap().remove(0);

    let input = assembler.load_site(&datasets).unwrap().unwrap();
    assert_eq!(input.datasets, 2);
    assert!(
        input
            .occurrences
            .rows
            .iter()
            .all(|row| row.event_remarks.as_deref() == Some("sequencing batch 1"))
    );

    let (tables, summary) = assembler.assemble(site, input, &metadata()).unwrap();
    let mut ids: Vec<&str> = tables
        .occurrences
        .rows
        .iter()
        .map(|row| row.occurrence_id.as_str())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["occ1_12s_mimammal", "occ3_12s_mimammal", "occ4_coi"]);
    assert_eq!(summary.contaminants_removed, 1);
    assert_eq!(summary.singletons_removed, 1);
    assert_eq!(summary.low_complexity_removed, 1);
    assert_eq!(summary.blank_occurrences, 1);
    assert_eq!(tables.blank_dna.rows[0].occurrence_id, "occ6_12s_mimammal");

    let corrected = tables
        .occurrences
        .rows
        .iter()
        .find(|row| row.occurrence_id == "occ3_12s_mimammal")
        .unwrap();
    assert_eq!(corrected.material_sample_id.as_deref(), Some("EE0475"));
    assert_eq!(corrected.scientific_name.as_deref(), Some("Solea solea"));
    assert_eq!(corrected.taxon_rank.as_deref(), Some("species"));

    let output = root.join("output");
    let store = OutputStore::new(output.clone(), root.join("output_lists"));
    store.prepare(false).unwrap();
    tables.write(&store, site).unwrap();

    let written = OccurrenceTable::read_tsv(&store.occurrence_path(site, false)).unwrap();
    let written_dna = DnaTable::read_tsv(&store.dna_path(site, false)).unwrap();
    assert_eq!(written.len(), 3);
    assert!(written.columns.iter().any(|column| column == "identifiedBy"));
    assert!(written.columns.iter().any(|column| column == "locality"));
    assert!(written.columns.iter().any(|column| column == "eventRemarks"));

    let occurrence_ids: HashSet<&str> = written
        .rows
        .iter()
        .map(|row| row.occurrence_id.as_str())
        .collect();
    assert!(
        written_dna
            .rows
            .iter()
            .all(|row| occurrence_ids.contains(row.occurrence_id.as_str()))
    );

    let blank = OccurrenceTable::read_tsv(&store.occurrence_path(site, true)).unwrap();
    assert_eq!(blank.rows[0].scientific_name.as_deref(), Some("Homo sapiens"));
    assert_eq!(
        blank.rows[0].extra.get("blank").map(String::as_str),
        Some("true")
    );
}

#[test]
fn contaminants_are_kept_when_removal_is_disabled() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path());
    fixture(&root);
    let annotations = root.join("annotations");
    fs::create_dir_all(&annotations).unwrap();
    fs::write(annotations.join("contaminants.json"), r#"[{"genus": "Homo"}]"#).unwrap();

    let registry = registry();
    let options = AssemblerOptions {
        remove_contaminants: false,
        ..options(&annotations)
    };
    let assembler = OccurrenceAssembler::new(&registry, options).unwrap();
    let datasets = list_datasets(&root, &[PROJECT.to_string()]).unwrap();
    let (site, datasets) = group_by_site(datasets).unwrap().remove(0);
    let input = assembler.load_site(&datasets).unwrap().unwrap();

    let (tables, summary) = assembler.assemble(site, input, &metadata()).unwrap();
    assert_eq!(summary.contaminants_removed, 0);
    let homo: Vec<&str> = tables
        .occurrences
        .rows
        .iter()
        .filter(|row| row.genus.as_deref() == Some("Homo"))
        .map(|row| row.occurrence_id.as_str())
        .collect();
    assert_eq!(homo, vec!["occ8_coi"]);
    assert!(
        tables
            .dna
            .rows
            .iter()
            .any(|row| row.occurrence_id == "occ8_coi")
    );
}

#[test]
fn singleton_filter_uses_total_abundance_per_sequence() {
    let mut occurrences = OccurrenceTable::default();
    occurrences.rows = vec![
        common::occurrence("a", "EE0001", "Solea solea", 1),
        common::occurrence("b", "EE0002", "Solea solea", 1),
        common::occurrence("c", "EE0001", "Solea solea", 1),
    ];
    let mut dna = DnaTable::default();
    dna.rows = vec![
        common::dna("a", "GATTACA", "COI"),
        common::dna("b", "GATTACA", "COI"),
        common::dna("c", "TTTTGGGG", "COI"),
    ];

    assert_eq!(remove_singletons(&mut occurrences, &dna), 1);
    let kept = dna_for(&occurrences, &dna);
    let ids: Vec<&str> = kept.rows.iter().map(|row| row.occurrence_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn low_complexity_filter_drops_only_a_and_c() {
    let mut occurrences = OccurrenceTable::default();
    occurrences.rows = vec![
        common::occurrence("a", "EE0001", "Solea solea", 5),
        common::occurrence("b", "EE0001", "Solea solea", 5),
    ];
    let mut dna = DnaTable::default();
    dna.rows = vec![
        common::dna("a", "ACACAC", "COI"),
        common::dna("b", "ACACAT", "COI"),
    ];

    assert_eq!(remove_low_complexity(&mut occurrences, &dna), 1);
    assert_eq!(occurrences.rows[0].occurrence_id, "b");
}

#[test]
fn sample_code_correction_applies_to_both_tables() {
    let mut occurrences = OccurrenceTable::default();
    occurrences.rows = vec![common::occurrence("EE0476_1_coi", "EE0476", "Solea solea", 5)];
    let mut dna = DnaTable::default();
    dna.rows = vec![common::dna("EE0476_1_coi", "GATTACA", "COI")];

    correct_sample_codes(&mut occurrences, &mut dna);
    assert_eq!(occurrences.rows[0].occurrence_id, "EE0475_1_coi");
    assert_eq!(
        occurrences.rows[0].material_sample_id.as_deref(),
        Some("EE0475")
    );
    assert_eq!(dna.rows[0].occurrence_id, "EE0475_1_coi");
}
