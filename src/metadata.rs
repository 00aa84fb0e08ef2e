use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;

use camino::Utf8PathBuf;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotations::json_flag;
use crate::error::EdnaError;
use crate::http::{build_client, handle_status, send_with_retries};

pub const SAMPLE_COLUMNS: [&str; 9] = [
    "materialSampleID",
    "locality",
    "decimalLongitude",
    "decimalLatitude",
    "sampleSize",
    "higherGeography",
    "blank",
    "locationID",
    "eventDate",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    #[serde(rename = "materialSampleID")]
    pub material_sample_id: String,
    pub locality: Option<String>,
    #[serde(rename = "decimalLongitude")]
    pub decimal_longitude: Option<f64>,
    #[serde(rename = "decimalLatitude")]
    pub decimal_latitude: Option<f64>,
    #[serde(rename = "sampleSize")]
    pub sample_size: Option<String>,
    #[serde(rename = "higherGeography")]
    pub higher_geography: Option<String>,
    pub blank: Option<bool>,
    #[serde(rename = "locationID")]
    pub location_id: Option<String>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
}

impl Sample {
    pub fn value(&self, column: &str) -> Option<Cow<'_, str>> {
        let text = |value: &Option<String>| value.clone().map(Cow::Owned);
        match column {
            "materialSampleID" => Some(Cow::Borrowed(self.material_sample_id.as_str())),
            "locality" => text(&self.locality),
            "decimalLongitude" => self.decimal_longitude.map(|v| Cow::Owned(v.to_string())),
            "decimalLatitude" => self.decimal_latitude.map(|v| Cow::Owned(v.to_string())),
            "sampleSize" => text(&self.sample_size),
            "higherGeography" => text(&self.higher_geography),
            "blank" => self.blank.map(|v| Cow::Owned(v.to_string())),
            "locationID" => text(&self.location_id),
            "eventDate" => text(&self.event_date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleMetadata {
    pub blank: HashMap<String, Sample>,
    pub non_blank: HashMap<String, Sample>,
}

impl SampleMetadata {
    pub fn partition(samples: Vec<Sample>) -> Self {
        let mut metadata = Self::default();
        for sample in samples {
            match sample.blank {
                Some(true) => {
                    metadata
                        .blank
                        .entry(sample.material_sample_id.clone())
                        .or_insert(sample);
                }
                Some(false) => {
                    metadata
                        .non_blank
                        .entry(sample.material_sample_id.clone())
                        .or_insert(sample);
                }
                None => {}
            }
        }
        metadata
    }
}

#[derive(Debug, Deserialize)]
struct TrackerDocument {
    #[serde(default)]
    samples: Vec<TrackerSample>,
}

#[derive(Debug, Deserialize)]
struct TrackerSample {
    name: String,
    #[serde(default)]
    area_locality: Option<Value>,
    #[serde(default)]
    area_longitude: Option<Value>,
    #[serde(default)]
    area_latitude: Option<Value>,
    #[serde(default)]
    size: Option<Value>,
    #[serde(default)]
    parent_area_name: Option<Value>,
    #[serde(default)]
    blank: Option<Value>,
    #[serde(default)]
    station: Option<Value>,
    #[serde(default)]
    event_begin: Option<Value>,
}

impl From<TrackerSample> for Sample {
    fn from(raw: TrackerSample) -> Self {
        Self {
            material_sample_id: raw.name,
            locality: scalar_text(raw.area_locality),
            decimal_longitude: scalar_number(raw.area_longitude),
            decimal_latitude: scalar_number(raw.area_latitude),
            sample_size: scalar_text(raw.size),
            higher_geography: scalar_text(raw.parent_area_name),
            blank: scalar_flag(raw.blank),
            location_id: scalar_text(raw.station),
            event_date: scalar_text(raw.event_begin),
        }
    }
}

fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn scalar_flag(value: Option<Value>) -> Option<bool> {
    match value? {
        Value::Number(number) => match number.as_u64()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        other => json_flag(&other),
    }
}

fn scalar_number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_tracker_json(content: &str) -> Result<Vec<Sample>, EdnaError> {
    let document: TrackerDocument =
        serde_json::from_str(content).map_err(|err| EdnaError::TrackerParse(err.to_string()))?;
    Ok(document.samples.into_iter().map(Sample::from).collect())
}

pub trait TrackerClient: Send + Sync {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError>;
}

#[derive(Clone)]
pub struct TrackerHttpClient {
    client: Client,
    url: String,
}

impl TrackerHttpClient {
    pub fn new(url: &str, timeout_secs: Option<u64>) -> Result<Self, EdnaError> {
        let client = build_client(timeout_secs, EdnaError::TrackerHttp)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl TrackerClient for TrackerHttpClient {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError> {
        tracing::info!(url = %self.url, "downloading sample metadata");
        let response = send_with_retries(|| self.client.get(&self.url), EdnaError::TrackerHttp)?;
        let response = handle_status(response, |status, message| EdnaError::TrackerStatus {
            status,
            message,
        })?;
        let content = response
            .text()
            .map_err(|err| EdnaError::TrackerHttp(err.to_string()))?;
        parse_tracker_json(&content)
    }
}

#[derive(Debug, Clone)]
pub struct FileTracker {
    path: Utf8PathBuf,
}

impl FileTracker {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl TrackerClient for FileTracker {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError> {
        tracing::info!(path = %self.path, "reading sample metadata");
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| EdnaError::Filesystem(format!("read {}: {err}", self.path)))?;
        parse_tracker_json(&content)
    }
}
