use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::EdnaError;

pub const BLANK_FOLDER: &str = "blank";
const FULL_LISTS: &str = "lists_full";
const DNA_LISTS: &str = "lists";
const LIST_FORMATS: [&str; 2] = ["csv", "json"];

#[derive(Debug, Clone)]
pub struct OutputStore {
    output_root: Utf8PathBuf,
    lists_root: Utf8PathBuf,
}

impl OutputStore {
    pub fn new(output_root: Utf8PathBuf, lists_root: Utf8PathBuf) -> Self {
        Self {
            output_root,
            lists_root,
        }
    }

    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    pub fn lists_root(&self) -> &Utf8Path {
        &self.lists_root
    }

    pub fn blank_root(&self) -> Utf8PathBuf {
        self.output_root.join(BLANK_FOLDER)
    }

    pub fn occurrence_path(&self, site: &str, blank: bool) -> Utf8PathBuf {
        self.table_root(blank).join(format!("{site}_Occurrence.tsv"))
    }

    pub fn dna_path(&self, site: &str, blank: bool) -> Utf8PathBuf {
        self.table_root(blank)
            .join(format!("{site}_DNADerivedData.tsv"))
    }

    pub fn checklist_path(&self, dna_only: bool, format: &str, site: &str) -> Utf8PathBuf {
        let tree = if dna_only { DNA_LISTS } else { FULL_LISTS };
        self.lists_root
            .join(tree)
            .join(format)
            .join(format!("{site}.{format}"))
    }

    fn table_root(&self, blank: bool) -> Utf8PathBuf {
        if blank {
            self.blank_root()
        } else {
            self.output_root.clone()
        }
    }

    /// Removes both trees and recreates their folder skeleton. Must finish
    /// before any site writes.
    pub fn prepare(&self, with_lists: bool) -> Result<(), EdnaError> {
        clear_dir(&self.output_root)?;
        create_dir(&self.blank_root())?;
        if with_lists {
            clear_dir(&self.lists_root)?;
            for tree in [FULL_LISTS, DNA_LISTS] {
                for format in LIST_FORMATS {
                    create_dir(&self.lists_root.join(tree).join(format))?;
                }
            }
        }
        tracing::debug!(output = %self.output_root, lists = %self.lists_root, "prepared output folders");
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), EdnaError> {
        let parent = path
            .parent()
            .ok_or_else(|| EdnaError::Filesystem(format!("invalid output path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| EdnaError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".edna-results")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| EdnaError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| EdnaError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| EdnaError::Filesystem(format!("write {path}: {err}")))?;
        Ok(())
    }
}

fn clear_dir(path: &Utf8Path) -> Result<(), EdnaError> {
    if path.as_std_path().exists() {
        fs::remove_dir_all(path.as_std_path())
            .map_err(|err| EdnaError::Filesystem(format!("remove {path}: {err}")))?;
    }
    create_dir(path)
}

fn create_dir(path: &Utf8Path) -> Result<(), EdnaError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| EdnaError::Filesystem(format!("create {path}: {err}")))
}
