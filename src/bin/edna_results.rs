use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use edna_results::app::{App, BuildOptions, ProgressSink};
use edna_results::config::{ConfigLoader, ResolvedConfig};
use edna_results::domain::AphiaId;
use edna_results::error::EdnaError;
use edna_results::metadata::{FileTracker, Sample, TrackerClient, TrackerHttpClient};
use edna_results::output::{JsonOutput, LogSink};
use edna_results::species_lists::{ReferenceSpecies, SpeciesListClient, SpeciesListHttpClient};
use edna_results::worms::{AphiaRecord, TaxonRegistry, WormsHttpClient};

#[derive(Parser)]
#[command(name = "edna-results")]
#[command(about = "Builds eDNA occurrence tables and species checklists per site")]
#[command(version, author)]
struct Cli {
    /// Suppress progress logging; only the JSON summary is written.
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Assemble occurrence tables and checklists for every site")]
    Build(BuildArgs),
    #[command(about = "Zip the output folders")]
    Package(PackageArgs),
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long)]
    config: Option<String>,

    /// Keep taxa listed in the contaminant file.
    #[arg(long)]
    no_contaminants: bool,

    /// Skip species checklist generation.
    #[arg(long)]
    no_lists: bool,

    /// Only process this site slug; repeatable.
    #[arg(long = "site")]
    sites: Vec<String>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    lists_output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct PackageArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    lists_output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<EdnaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EdnaError) -> u8 {
    match error {
        EdnaError::UnknownMarker(_)
        | EdnaError::UnknownSite(_)
        | EdnaError::InvalidAphiaId(_)
        | EdnaError::ConfigRead(_)
        | EdnaError::ConfigParse(_)
        | EdnaError::MissingResults(_)
        | EdnaError::TableRead { .. }
        | EdnaError::AnnotationParse { .. }
        | EdnaError::ReferenceData { .. }
        | EdnaError::TrackerParse(_)
        | EdnaError::SpeciesListParse(_) => 2,
        EdnaError::RegistryHttp(_)
        | EdnaError::RegistryStatus { .. }
        | EdnaError::TrackerHttp(_)
        | EdnaError::TrackerStatus { .. }
        | EdnaError::SpeciesListHttp(_)
        | EdnaError::SpeciesListStatus { .. } => 3,
        EdnaError::BatchMismatch { .. } | EdnaError::MissingTaxon(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let sink: &dyn ProgressSink = if cli.quiet { &JsonOutput } else { &LogSink };

    match cli.command {
        Commands::Build(args) => run_build(args, sink),
        Commands::Package(args) => run_package(args, sink),
    }
}

fn run_build(args: BuildArgs, sink: &dyn ProgressSink) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    apply_paths(&mut config, args.output, args.lists_output);
    if args.no_contaminants {
        config.remove_contaminants = false;
    }
    if args.no_lists {
        config.generate_lists = false;
    }

    let registry = WormsHttpClient::new(&config.registry_url, config.http_timeout_secs)?;
    let tracker = tracker_for(&config)?;
    let species_lists =
        SpeciesListHttpClient::new(&config.species_lists_url, config.http_timeout_secs)?;
    let app = App::new(config, registry, tracker, species_lists);

    let options = BuildOptions { sites: args.sites };
    let result = app.build(&options, sink)?;
    JsonOutput::print_build(&result).into_diagnostic()?;
    Ok(())
}

fn run_package(args: PackageArgs, sink: &dyn ProgressSink) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    apply_paths(&mut config, args.output, args.lists_output);
    let app = App::new(config, NopRegistry, NopTracker, NopSpeciesLists);
    let result = app.package(sink)?;
    JsonOutput::print_package(&result).into_diagnostic()?;
    Ok(())
}

fn apply_paths(
    config: &mut ResolvedConfig,
    output: Option<Utf8PathBuf>,
    lists_output: Option<Utf8PathBuf>,
) {
    if let Some(output) = output {
        config.output_folder = output;
    }
    if let Some(lists_output) = lists_output {
        config.lists_folder = lists_output;
    }
}

enum Tracker {
    Http(TrackerHttpClient),
    File(FileTracker),
}

impl TrackerClient for Tracker {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError> {
        match self {
            Tracker::Http(client) => client.fetch_samples(),
            Tracker::File(client) => client.fetch_samples(),
        }
    }
}

fn tracker_for(config: &ResolvedConfig) -> Result<Tracker, EdnaError> {
    match &config.metadata_path {
        Some(path) => Ok(Tracker::File(FileTracker::new(path.clone()))),
        None => TrackerHttpClient::new(&config.metadata_url, config.http_timeout_secs)
            .map(Tracker::Http),
    }
}

struct NopRegistry;

impl TaxonRegistry for NopRegistry {
    fn match_names(&self, _names: &[String]) -> Result<Vec<Vec<AphiaRecord>>, EdnaError> {
        Err(EdnaError::RegistryHttp("registry not available".to_string()))
    }

    fn records_by_ids(&self, _ids: &[AphiaId]) -> Result<Vec<AphiaRecord>, EdnaError> {
        Err(EdnaError::RegistryHttp("registry not available".to_string()))
    }

    fn record_by_id(&self, _id: AphiaId) -> Result<AphiaRecord, EdnaError> {
        Err(EdnaError::RegistryHttp("registry not available".to_string()))
    }
}

struct NopTracker;

impl TrackerClient for NopTracker {
    fn fetch_samples(&self) -> Result<Vec<Sample>, EdnaError> {
        Err(EdnaError::TrackerHttp("tracker not available".to_string()))
    }
}

struct NopSpeciesLists;

impl SpeciesListClient for NopSpeciesLists {
    fn fetch_species(&self, _site: &str) -> Result<Vec<ReferenceSpecies>, EdnaError> {
        Err(EdnaError::SpeciesListHttp(
            "species lists not available".to_string(),
        ))
    }
}
