mod common;

use assert_matches::assert_matches;

use common::{FakeRegistry, occurrence};
use edna_results::domain::AphiaId;
use edna_results::error::EdnaError;
use edna_results::taxonomy::{BATCH_SIZE, Reconciler};

fn registry() -> FakeRegistry {
    FakeRegistry::new()
        .taxon(
            127160,
            "Solea solea",
            "Species",
            ["Chordata", "Teleostei", "Pleuronectiformes", "Soleidae", "Solea"],
        )
        .synonym(127161, "Solea vulgaris", 127160)
        .taxon(
            125581,
            "Soleidae",
            "Family",
            ["Chordata", "Teleostei", "Pleuronectiformes", "Soleidae", ""],
        )
}

#[test]
fn name_matching_is_batched() {
    let registry = FakeRegistry::new();
    let names: Vec<String> = (0..120).map(|i| format!("Taxon {i}")).collect();

    let matched = Reconciler::new(&registry).match_names(&names).unwrap();
    assert!(matched.is_empty());

    let sizes: Vec<usize> = registry.calls().iter().map(|(_, size)| *size).collect();
    assert_eq!(sizes, vec![BATCH_SIZE, BATCH_SIZE, 20]);
}

#[test]
fn name_matching_deduplicates_and_trims() {
    let registry = registry();
    let names = vec![
        "Solea solea".to_string(),
        " Solea solea ".to_string(),
        "".to_string(),
        "Unknown fish".to_string(),
    ];
    let matched = Reconciler::new(&registry).match_names(&names).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched["Solea solea"], AphiaId::new(127160));
    assert_eq!(registry.calls(), vec![("match_names", 2)]);
}

#[test]
fn short_batch_is_an_integrity_error() {
    let registry = registry().with_short_batches();
    let err = Reconciler::new(&registry)
        .match_names(&["Solea solea".to_string()])
        .unwrap_err();
    assert_matches!(
        err,
        EdnaError::BatchMismatch {
            requested: 1,
            received: 0
        }
    );

    let err = Reconciler::new(&registry)
        .accepted_ids(&[AphiaId::new(127160), AphiaId::new(125581)])
        .unwrap_err();
    assert_matches!(err, EdnaError::BatchMismatch { .. });
}

#[test]
fn acceptance_collapses_synonyms() {
    let registry = registry();
    let accepted = Reconciler::new(&registry)
        .accepted_ids(&[AphiaId::new(127161), AphiaId::new(999)])
        .unwrap();
    assert_eq!(accepted[&AphiaId::new(127161)], AphiaId::new(127160));
    assert_eq!(accepted[&AphiaId::new(999)], AphiaId::new(999));
}

#[test]
fn acceptance_is_idempotent() {
    let registry = registry();
    let reconciler = Reconciler::new(&registry);
    let first = reconciler
        .accepted_ids(&[AphiaId::new(127161), AphiaId::new(125581)])
        .unwrap();
    let accepted: Vec<AphiaId> = first.values().copied().collect();
    let second = reconciler.accepted_ids(&accepted).unwrap();
    for (id, accepted) in second {
        assert_eq!(id, accepted);
    }
}

#[test]
fn reconcile_overwrites_taxonomy_with_accepted_lineage() {
    let registry = registry();
    let mut rows = vec![
        occurrence("a_coi", "EE0001", "Solea vulgaris", 10),
        {
            let mut row = occurrence("b_coi", "EE0001", "Soleidae sp.", 3);
            row.family = Some("Soleidae".to_string());
            row.class = Some("Actinopteri".to_string());
            row
        },
        occurrence("c_coi", "EE0001", "Nothing known", 4),
    ];

    Reconciler::new(&registry)
        .reconcile_occurrences(&mut rows)
        .unwrap();

    assert_eq!(rows[0].scientific_name.as_deref(), Some("Solea solea"));
    assert_eq!(
        rows[0].scientific_name_id.as_deref(),
        Some("urn:lsid:marinespecies.org:taxname:127160")
    );
    assert_eq!(rows[0].taxon_rank.as_deref(), Some("species"));
    assert_eq!(rows[0].genus.as_deref(), Some("Solea"));
    assert_eq!(rows[0].accepted_id, Some(AphiaId::new(127160)));

    assert_eq!(rows[1].scientific_name.as_deref(), Some("Soleidae"));
    assert_eq!(rows[1].taxon_rank.as_deref(), Some("family"));
    assert_eq!(rows[1].class.as_deref(), Some("Teleostei"));
    assert_eq!(rows[1].genus, None);

    assert_eq!(rows[2].accepted_id, Some(AphiaId::INCERTAE_SEDIS));
    assert_eq!(
        rows[2].scientific_name_id.as_deref(),
        Some("urn:lsid:marinespecies.org:taxname:12")
    );
    assert_eq!(rows[2].scientific_name, None);
}

#[test]
fn reconcile_of_no_rows_makes_no_calls() {
    let registry = registry();
    Reconciler::new(&registry)
        .reconcile_occurrences(&mut [])
        .unwrap();
    assert!(registry.calls().is_empty());
}
