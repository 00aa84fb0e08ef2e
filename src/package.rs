use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::EdnaError;

#[derive(Debug, Clone, Serialize)]
pub struct PackagedTree {
    pub source: String,
    pub archive: String,
    pub files: usize,
}

pub fn package_tree(tree: &Utf8Path) -> Result<PackagedTree, EdnaError> {
    if !tree.as_std_path().is_dir() {
        return Err(EdnaError::Package(format!("{tree} is not a directory")));
    }
    let archive = Utf8PathBuf::from(format!("{}.zip", tree.as_str().trim_end_matches('/')));
    let file = fs::File::create(archive.as_std_path())
        .map_err(|err| EdnaError::Package(format!("create {archive}: {err}")))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for path in walk_dir(tree.as_std_path())? {
        let relative = path
            .strip_prefix(tree.as_std_path())
            .map_err(|err| EdnaError::Package(err.to_string()))?;
        let name = entry_name(relative)?;
        if path.is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|err| EdnaError::Package(err.to_string()))?;
            continue;
        }
        writer
            .start_file(name, options)
            .map_err(|err| EdnaError::Package(err.to_string()))?;
        let mut source = fs::File::open(&path)
            .map_err(|err| EdnaError::Package(format!("open {}: {err}", path.display())))?;
        io::copy(&mut source, &mut writer).map_err(|err| EdnaError::Package(err.to_string()))?;
        files += 1;
    }
    writer
        .finish()
        .map_err(|err| EdnaError::Package(err.to_string()))?;

    tracing::info!(tree = %tree, archive = %archive, files, "packaged output");
    Ok(PackagedTree {
        source: tree.to_string(),
        archive: archive.to_string(),
        files,
    })
}

pub fn archive_entries(archive: &Utf8Path) -> Result<Vec<String>, EdnaError> {
    let file = fs::File::open(archive.as_std_path())
        .map_err(|err| EdnaError::Package(format!("open {archive}: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| EdnaError::Package(err.to_string()))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|err| EdnaError::Package(err.to_string()))?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

fn entry_name(relative: &Path) -> Result<String, EdnaError> {
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    parts
        .map(|parts| parts.join("/"))
        .ok_or_else(|| EdnaError::Package(format!("non UTF-8 path {}", relative.display())))
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, EdnaError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let mut entries = fs::read_dir(&path)
            .map_err(|err| EdnaError::Package(err.to_string()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| EdnaError::Package(err.to_string()))?;
        entries.sort();
        for path in entries.iter().rev().filter(|path| path.is_dir()) {
            stack.push(path.clone());
        }
        items.extend(entries);
    }
    Ok(items)
}
