use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::AphiaId;
use crate::error::EdnaError;
use crate::http::{build_client, handle_status, send_with_retries};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AphiaRecord {
    #[serde(rename = "AphiaID")]
    pub aphia_id: AphiaId,
    #[serde(default)]
    pub scientificname: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default, rename = "valid_AphiaID")]
    pub valid_aphia_id: Option<AphiaId>,
    #[serde(default)]
    pub kingdom: Option<String>,
    #[serde(default)]
    pub phylum: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub genus: Option<String>,
    #[serde(default)]
    pub lsid: Option<String>,
    #[serde(default, rename = "isMarine")]
    pub is_marine: Option<i64>,
    #[serde(default, rename = "isBrackish")]
    pub is_brackish: Option<i64>,
    #[serde(default)]
    pub match_type: Option<String>,
}

impl AphiaRecord {
    pub fn is_marine_or_brackish(&self) -> bool {
        self.is_marine.unwrap_or(0) != 0 || self.is_brackish.unwrap_or(0) != 0
    }

    pub fn lsid_or_default(&self) -> String {
        self.lsid.clone().unwrap_or_else(|| self.aphia_id.lsid())
    }
}

/// Raw batch calls against the species registry. Implementations perform a
/// single request per call; batching and integrity checks live in
/// [`crate::taxonomy::Reconciler`].
pub trait TaxonRegistry: Send + Sync {
    fn match_names(&self, names: &[String]) -> Result<Vec<Vec<AphiaRecord>>, EdnaError>;
    fn records_by_ids(&self, ids: &[AphiaId]) -> Result<Vec<AphiaRecord>, EdnaError>;
    fn record_by_id(&self, id: AphiaId) -> Result<AphiaRecord, EdnaError>;
}

#[derive(Clone)]
pub struct WormsHttpClient {
    client: Client,
    base_url: String,
}

impl WormsHttpClient {
    pub fn new(base_url: &str, timeout_secs: Option<u64>) -> Result<Self, EdnaError> {
        let client = build_client(timeout_secs, EdnaError::RegistryHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<reqwest::blocking::Response>, EdnaError> {
        let url = format!("{}/{}", self.base_url, path);
        let response =
            send_with_retries(|| self.client.get(&url).query(query), EdnaError::RegistryHttp)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = handle_status(response, |status, message| EdnaError::RegistryStatus {
            status,
            message,
        })?;
        Ok(Some(response))
    }
}

impl TaxonRegistry for WormsHttpClient {
    fn match_names(&self, names: &[String]) -> Result<Vec<Vec<AphiaRecord>>, EdnaError> {
        let mut query: Vec<(&str, String)> = names
            .iter()
            .map(|name| ("scientificnames[]", name.clone()))
            .collect();
        query.push(("marine_only", "false".to_string()));

        let Some(response) = self.get("AphiaRecordsByMatchNames", &query)? else {
            return Ok(vec![Vec::new(); names.len()]);
        };
        let matches: Vec<Option<Vec<AphiaRecord>>> = response
            .json()
            .map_err(|err| EdnaError::RegistryHttp(err.to_string()))?;
        Ok(matches
            .into_iter()
            .map(|candidates| candidates.unwrap_or_default())
            .collect())
    }

    fn records_by_ids(&self, ids: &[AphiaId]) -> Result<Vec<AphiaRecord>, EdnaError> {
        let query: Vec<(&str, String)> = ids
            .iter()
            .map(|id| ("aphiaids[]", id.to_string()))
            .collect();
        let Some(response) = self.get("AphiaRecordsByAphiaIDs", &query)? else {
            return Ok(Vec::new());
        };
        response
            .json()
            .map_err(|err| EdnaError::RegistryHttp(err.to_string()))
    }

    fn record_by_id(&self, id: AphiaId) -> Result<AphiaRecord, EdnaError> {
        let path = format!("AphiaRecordByAphiaID/{id}");
        let Some(response) = self.get(&path, &[])? else {
            return Err(EdnaError::MissingTaxon(id.get()));
        };
        response
            .json()
            .map_err(|err| EdnaError::RegistryHttp(err.to_string()))
    }
}
