use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EdnaError;

const LSID_PREFIX: &str = "urn:lsid:marinespecies.org:taxname:";

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AphiaId(u64);

impl AphiaId {
    /// Placeholder taxon assigned to names the registry cannot resolve.
    pub const INCERTAE_SEDIS: AphiaId = AphiaId(12);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn lsid(self) -> String {
        format!("{LSID_PREFIX}{}", self.0)
    }

    pub fn extract(value: &str) -> Option<Self> {
        DIGITS
            .find(value)
            .and_then(|found| found.as_str().parse().ok())
            .map(Self)
    }
}

impl fmt::Display for AphiaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AphiaId {
    type Err = EdnaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| EdnaError::InvalidAphiaId(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Mimammal12s,
    Mifish12s,
    Teleo12s,
    Coi,
    Rrna16s,
}

impl Marker {
    pub fn as_str(self) -> &'static str {
        match self {
            Marker::Mimammal12s => "12s_mimammal",
            Marker::Mifish12s => "12s_mifish",
            Marker::Teleo12s => "12s_teleo",
            Marker::Coi => "coi",
            Marker::Rrna16s => "16s",
        }
    }

    pub fn from_dataset(dataset: &str) -> Result<Self, EdnaError> {
        const VOCABULARY: [(&str, Marker); 6] = [
            ("mimammal", Marker::Mimammal12s),
            ("mifish", Marker::Mifish12s),
            ("teleo", Marker::Teleo12s),
            ("coi", Marker::Coi),
            ("co1", Marker::Coi),
            ("16s", Marker::Rrna16s),
        ];

        let token = base_name(dataset)
            .split('_')
            .nth(1)
            .ok_or_else(|| EdnaError::UnknownMarker(dataset.to_string()))?
            .to_lowercase();
        VOCABULARY
            .iter()
            .find(|(keyword, _)| token.contains(keyword))
            .map(|(_, marker)| *marker)
            .ok_or_else(|| EdnaError::UnknownMarker(dataset.to_string()))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SITES: [(&str, &str); 32] = [
    ("cocos", "cocos_island_national_park"),
    ("galapagos", "galapagos_islands"),
    (
        "coiba",
        "coiba_national_park_and_its_special_zone_of_marine_protection",
    ),
    ("banc", "banc_d_arguin_national_park"),
    ("tubbataha", "tubbataha_reefs_natural_park"),
    ("wadden", "wadden_sea"),
    ("sundarbans", "the_sundarbans"),
    ("revillagigedo", "archipielago_de_revillagigedo"),
    ("everglades", "everglades_national_park"),
    ("aldabra", "aldabra_atoll"),
    ("lord", "lord_howe_island_group"),
    ("french", "french_austral_lands_and_seas"),
    ("shark", "shark_bay_western_australia"),
    ("isimangaliso", "isimangaliso_wetland_park"),
    (
        "porto",
        "gulf_of_porto_calanche_of_piana_gulf_of_girolata_scandola_reserve",
    ),
    ("belize", "belize_barrier_reef_reserve_system"),
    (
        "lagoons",
        "lagoons_of_new_caledonia_reef_diversity_and_associated_ecosystems",
    ),
    (
        "brazilian",
        "brazilian_atlantic_islands_fernando_de_noronha_and_atol_das_rocas_reserves",
    ),
    ("ningaloo", "ningaloo_coast"),
    (
        "sanganeb",
        "sanganeb_marine_national_park_and_dungonab_bay_mukkawar_island_marine_national_park",
    ),
    (
        "scandola",
        "gulf_of_porto_calanche_of_piana_gulf_of_girolata_scandola_reserve",
    ),
    (
        "brazil",
        "brazilian_atlantic_islands_fernando_de_noronha_and_atol_das_rocas_reserves",
    ),
    ("mauritania", "banc_d_arguin_national_park"),
    ("southernocean", "french_austral_lands_and_seas"),
    (
        "newcaledonia",
        "lagoons_of_new_caledonia_reef_diversity_and_associated_ecosystems",
    ),
    ("philippines", "tubbataha_reefs_natural_park"),
    ("bangladesh", "the_sundarbans"),
    ("southafrica", "isimangaliso_wetland_park"),
    ("seychel", "aldabra_atoll"),
    ("mexico", "archipielago_de_revillagigedo"),
    ("yemen", "socotra_archipelago"),
    ("argentina", "peninsula_valdes"),
];

pub fn derive_site_name(dataset: &str) -> Result<&'static str, EdnaError> {
    let name = base_name(dataset).to_lowercase();
    SITES
        .iter()
        .find(|(keyword, _)| name.starts_with(keyword))
        .map(|(_, site)| *site)
        .ok_or_else(|| EdnaError::UnknownSite(dataset.to_string()))
}

pub fn is_known_site(site: &str) -> bool {
    SITES.iter().any(|(_, slug)| *slug == site)
}

pub fn sequencing_batch(dataset: &str) -> Option<&'static str> {
    if dataset.contains("batch1") {
        Some("sequencing batch 1")
    } else if dataset.contains("batch2") {
        Some("sequencing batch 2")
    } else {
        None
    }
}

fn base_name(dataset: &str) -> &str {
    dataset
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(dataset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxonField {
    ScientificName,
    Genus,
    Family,
    Order,
    Class,
    Phylum,
}

impl TaxonField {
    pub const PRECEDENCE: [TaxonField; 6] = [
        TaxonField::ScientificName,
        TaxonField::Genus,
        TaxonField::Family,
        TaxonField::Order,
        TaxonField::Class,
        TaxonField::Phylum,
    ];

    pub fn column(self) -> &'static str {
        match self {
            TaxonField::ScientificName => "scientificName",
            TaxonField::Genus => "genus",
            TaxonField::Family => "family",
            TaxonField::Order => "order",
            TaxonField::Class => "class",
            TaxonField::Phylum => "phylum",
        }
    }

    pub fn annotation_key(self) -> &'static str {
        match self {
            TaxonField::ScientificName => "species",
            other => other.column(),
        }
    }
}
