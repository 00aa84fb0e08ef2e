pub mod annotations;
pub mod app;
pub mod assembler;
pub mod checklist;
pub mod config;
pub mod domain;
pub mod error;
pub mod filters;
pub mod http;
pub mod metadata;
pub mod output;
pub mod package;
pub mod reference;
pub mod species_lists;
pub mod store;
pub mod tables;
pub mod taxonomy;
pub mod worms;
