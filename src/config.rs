use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::EdnaError;

pub const DEFAULT_CONFIG_FILE: &str = "edna-results.json";
pub const DEFAULT_METADATA_URL: &str =
    "https://raw.githubusercontent.com/iobis/edna-tracker-data/data/generated.json";
pub const DEFAULT_SPECIES_LISTS_URL: &str =
    "https://raw.githubusercontent.com/iobis/mwhs-obis-species/master/lists/{site}.json";
pub const DEFAULT_REGISTRY_URL: &str = "https://www.marinespecies.org/rest";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub project_names: Option<Vec<String>>,
    #[serde(default)]
    pub results_root: Option<String>,
    #[serde(default)]
    pub occurrence_file: Option<String>,
    #[serde(default)]
    pub dna_file: Option<String>,
    #[serde(default)]
    pub output_folder: Option<String>,
    #[serde(default)]
    pub lists_folder: Option<String>,
    #[serde(default)]
    pub annotations_folder: Option<String>,
    #[serde(default)]
    pub supporting_data_folder: Option<String>,
    #[serde(default)]
    pub remove_contaminants: Option<bool>,
    #[serde(default)]
    pub generate_lists: Option<bool>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub metadata_path: Option<String>,
    #[serde(default)]
    pub species_lists_url: Option<String>,
    #[serde(default)]
    pub registry_url: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project_names: Vec<String>,
    pub results_root: Utf8PathBuf,
    pub occurrence_file: String,
    pub dna_file: String,
    pub output_folder: Utf8PathBuf,
    pub lists_folder: Utf8PathBuf,
    pub annotations_folder: Utf8PathBuf,
    pub supporting_data_folder: Utf8PathBuf,
    pub remove_contaminants: bool,
    pub generate_lists: bool,
    pub metadata_url: String,
    pub metadata_path: Option<Utf8PathBuf>,
    pub species_lists_url: String,
    pub registry_url: String,
    pub http_timeout_secs: Option<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EdnaError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_config_path(),
        };

        let Some(config_path) = config_path else {
            return Ok(ResolvedConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EdnaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EdnaError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            project_names: config.project_names.unwrap_or_else(default_project_names),
            results_root: config
                .results_root
                .unwrap_or_else(|| "pacman-pipeline-results".to_string())
                .into(),
            occurrence_file: config
                .occurrence_file
                .unwrap_or_else(|| "Occurrence_table.tsv".to_string()),
            dna_file: config
                .dna_file
                .unwrap_or_else(|| "DNA_extension_table.tsv".to_string()),
            output_folder: config
                .output_folder
                .unwrap_or_else(|| "output".to_string())
                .into(),
            lists_folder: config
                .lists_folder
                .unwrap_or_else(|| "output_lists".to_string())
                .into(),
            annotations_folder: config
                .annotations_folder
                .unwrap_or_else(|| "annotations".to_string())
                .into(),
            supporting_data_folder: config
                .supporting_data_folder
                .unwrap_or_else(|| "supporting_data".to_string())
                .into(),
            remove_contaminants: config.remove_contaminants.unwrap_or(true),
            generate_lists: config.generate_lists.unwrap_or(true),
            metadata_url: config
                .metadata_url
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            metadata_path: config.metadata_path.map(Utf8PathBuf::from),
            species_lists_url: config
                .species_lists_url
                .unwrap_or_else(|| DEFAULT_SPECIES_LISTS_URL.to_string()),
            registry_url: config
                .registry_url
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_timeout_secs: config.http_timeout_secs,
        }
    }
}

pub fn default_project_names() -> Vec<String> {
    vec![
        "eDNAexpeditions_batch1_samples".to_string(),
        "eDNAexpeditions_batch2_samples".to_string(),
    ]
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("edna-results").join("config.json"))
        .filter(|path| path.exists())
}
