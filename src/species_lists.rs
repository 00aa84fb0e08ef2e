use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::AphiaId;
use crate::error::EdnaError;
use crate::http::{build_client, handle_status, send_with_retries};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceSpecies {
    pub species: Option<String>,
    #[serde(rename = "AphiaID")]
    pub aphia_id: AphiaId,
    #[serde(default)]
    pub records: Option<u64>,
    #[serde(default)]
    pub obis: Option<bool>,
    #[serde(default)]
    pub gbif: Option<bool>,
    #[serde(default)]
    pub max_year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SpeciesListDocument {
    #[serde(default)]
    species: Vec<ReferenceSpecies>,
}

pub fn parse_species_list(content: &str) -> Result<Vec<ReferenceSpecies>, EdnaError> {
    let document: SpeciesListDocument = serde_json::from_str(content)
        .map_err(|err| EdnaError::SpeciesListParse(err.to_string()))?;
    Ok(document.species)
}

pub trait SpeciesListClient: Send + Sync {
    fn fetch_species(&self, site: &str) -> Result<Vec<ReferenceSpecies>, EdnaError>;
}

#[derive(Clone)]
pub struct SpeciesListHttpClient {
    client: Client,
    url_template: String,
}

impl SpeciesListHttpClient {
    pub fn new(url_template: &str, timeout_secs: Option<u64>) -> Result<Self, EdnaError> {
        let client = build_client(timeout_secs, EdnaError::SpeciesListHttp)?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    pub fn url_for(&self, site: &str) -> String {
        self.url_template.replace("{site}", site)
    }
}

impl SpeciesListClient for SpeciesListHttpClient {
    fn fetch_species(&self, site: &str) -> Result<Vec<ReferenceSpecies>, EdnaError> {
        let url = self.url_for(site);
        tracing::info!(site, url = %url, "fetching species list");
        let response = send_with_retries(|| self.client.get(&url), EdnaError::SpeciesListHttp)?;
        let response = handle_status(response, |status, message| {
            EdnaError::SpeciesListStatus { status, message }
        })?;
        let content = response
            .text()
            .map_err(|err| EdnaError::SpeciesListHttp(err.to_string()))?;
        parse_species_list(&content)
    }
}
