use camino::Utf8PathBuf;

use edna_results::store::OutputStore;
use edna_results::tables::{OccurrenceRecord, OccurrenceTable};

#[test]
fn prepare_clears_previous_outputs() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = OutputStore::new(root.join("output"), root.join("output_lists"));

    let stale = store.occurrence_path("wadden_sea", false);
    std::fs::create_dir_all(root.join("output")).unwrap();
    std::fs::write(&stale, "old").unwrap();

    store.prepare(true).unwrap();

    assert!(!stale.as_std_path().exists());
    assert!(store.blank_root().as_std_path().is_dir());
    for dna_only in [false, true] {
        for format in ["csv", "json"] {
            let folder = store
                .checklist_path(dna_only, format, "wadden_sea")
                .parent()
                .unwrap()
                .to_path_buf();
            assert!(folder.as_std_path().is_dir(), "{folder} missing");
        }
    }
}

#[test]
fn prepare_without_lists_leaves_lists_alone() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = OutputStore::new(root.join("output"), root.join("output_lists"));
    std::fs::create_dir_all(root.join("output_lists")).unwrap();
    std::fs::write(root.join("output_lists").join("keep.txt"), "keep").unwrap();

    store.prepare(false).unwrap();

    assert!(root.join("output_lists").join("keep.txt").as_std_path().exists());
}

#[test]
fn atomic_write_replaces_content() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("nested").join("list.json");

    OutputStore::write_bytes_atomic(&path, b"first").unwrap();
    OutputStore::write_bytes_atomic(&path, b"second").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    let leftovers = std::fs::read_dir(root.join("nested")).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn table_writes_replace_previous_tables_atomically() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = OutputStore::new(root.join("output"), root.join("output_lists"));
    let path = store.occurrence_path("wadden_sea", false);

    let mut table = OccurrenceTable::new(vec!["occurrenceID".to_string()]);
    table.rows = vec![OccurrenceRecord {
        occurrence_id: "occ1_coi".to_string(),
        ..OccurrenceRecord::default()
    }];
    table.write_tsv(&path).unwrap();
    table.rows[0].occurrence_id = "occ2_coi".to_string();
    table.write_tsv(&path).unwrap();

    let written = OccurrenceTable::read_tsv(&path).unwrap();
    assert_eq!(written.rows.len(), 1);
    assert_eq!(written.rows[0].occurrence_id, "occ2_coi");
    let files = std::fs::read_dir(root.join("output")).unwrap().count();
    assert_eq!(files, 1);
}
