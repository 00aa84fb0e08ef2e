use std::collections::HashMap;
use std::io::Read;

use camino::Utf8Path;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::domain::AphiaId;
use crate::error::EdnaError;

pub const REDLIST_FILE: &str = "redlist.csv";
pub const VERNACULAR_FILE: &str = "vernacularname.txt";
pub const GROUPS_FILE: &str = "groups.csv";

pub const THREATENED_CATEGORIES: [&str; 5] = ["CR", "EN", "EW", "EX", "VU"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRule {
    pub rank: String,
    pub taxon: String,
    pub group: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    redlist: HashMap<String, String>,
    vernacular: HashMap<AphiaId, String>,
    groups: Vec<GroupRule>,
}

#[derive(Debug, Deserialize)]
struct RedlistRow {
    species: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct VernacularRow {
    #[serde(rename = "taxonID")]
    taxon_id: String,
    #[serde(rename = "vernacularName")]
    vernacular_name: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    rank: String,
    taxon: String,
    group: String,
}

impl ReferenceData {
    pub fn new(
        redlist: HashMap<String, String>,
        vernacular: HashMap<AphiaId, String>,
        groups: Vec<GroupRule>,
    ) -> Self {
        Self {
            redlist,
            vernacular,
            groups,
        }
    }

    pub fn load(folder: &Utf8Path) -> Result<Self, EdnaError> {
        let open = |name: &str| {
            let path = folder.join(name);
            std::fs::File::open(path.as_std_path())
                .map(|file| (path.clone(), file))
                .map_err(|err| EdnaError::ReferenceData {
                    path: path.to_string(),
                    message: err.to_string(),
                })
        };

        let (path, file) = open(REDLIST_FILE)?;
        let redlist = parse_redlist(file).map_err(|message| reference_err(&path, message))?;
        let (path, file) = open(VERNACULAR_FILE)?;
        let vernacular = parse_vernacular(file).map_err(|message| reference_err(&path, message))?;
        let (path, file) = open(GROUPS_FILE)?;
        let groups = parse_groups(file).map_err(|message| reference_err(&path, message))?;

        tracing::info!(
            redlist = redlist.len(),
            vernacular = vernacular.len(),
            groups = groups.len(),
            "loaded reference data"
        );
        Ok(Self::new(redlist, vernacular, groups))
    }

    pub fn redlist_category(&self, species: &str) -> Option<&str> {
        self.redlist.get(species).map(String::as_str)
    }

    pub fn vernacular(&self, id: AphiaId) -> Option<&str> {
        self.vernacular.get(&id).map(String::as_str)
    }

    pub fn group_for<'v>(&self, lookup: impl Fn(&str) -> Option<&'v str>) -> Option<&str> {
        self.groups
            .iter()
            .find(|rule| lookup(&rule.rank) == Some(rule.taxon.as_str()))
            .map(|rule| rule.group.as_str())
    }
}

fn reference_err(path: &Utf8Path, message: String) -> EdnaError {
    EdnaError::ReferenceData {
        path: path.to_string(),
        message,
    }
}

pub fn parse_redlist<R: Read>(reader: R) -> Result<HashMap<String, String>, String> {
    let mut reader = ReaderBuilder::new().from_reader(reader);
    let mut redlist = HashMap::new();
    for row in reader.deserialize::<RedlistRow>() {
        let row = row.map_err(|err| err.to_string())?;
        if THREATENED_CATEGORIES.contains(&row.category.as_str()) {
            redlist.entry(row.species).or_insert(row.category);
        }
    }
    Ok(redlist)
}

pub fn parse_vernacular<R: Read>(reader: R) -> Result<HashMap<AphiaId, String>, String> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);
    let mut names: HashMap<AphiaId, String> = HashMap::new();
    for row in reader.deserialize::<VernacularRow>() {
        let row = row.map_err(|err| err.to_string())?;
        if row.language.as_deref() != Some("ENG") {
            continue;
        }
        let Some(id) = AphiaId::extract(&row.taxon_id) else {
            continue;
        };
        names
            .entry(id)
            .and_modify(|joined| {
                joined.push(',');
                joined.push_str(&row.vernacular_name);
            })
            .or_insert(row.vernacular_name);
    }
    Ok(names)
}

pub fn parse_groups<R: Read>(reader: R) -> Result<Vec<GroupRule>, String> {
    let mut reader = ReaderBuilder::new().from_reader(reader);
    reader
        .deserialize::<GroupRow>()
        .map(|row| {
            row.map(|row| GroupRule {
                rank: row.rank.trim().to_string(),
                taxon: row.taxon.trim().to_string(),
                group: row.group.trim().to_string(),
            })
            .map_err(|err| err.to_string())
        })
        .collect()
}
