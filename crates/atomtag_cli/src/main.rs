//! `atomtag` command-line front end.
//!
//! # Responsibility
//! - Parse one non-interactive command and run it against an archive.
//! - Print a diagnostic and exit non-zero on failure; the core never exits.

use atomtag_core::{
    init_logging, ArchiveConfig, ArchiveService, ConfigError, LoggingError, ServiceError,
    TypeFilter,
};
use clap::{Parser, Subcommand};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_WIDTH: &str = "100";

/// Atomic tagging archive
#[derive(Parser, Debug)]
#[command(name = "atomtag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the local repository root
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text columns
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import files with the best matching importer
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Store content in this remote repository
        #[arg(short, long)]
        repository: Option<String>,
    },
    /// List molecules carrying every given tag
    Ls {
        tags: Vec<String>,
        #[arg(short, long, default_value = DEFAULT_WIDTH)]
        width: usize,
    },
    /// Show one molecule with all its atoms
    Show {
        id: i64,
        #[arg(short, long, default_value = DEFAULT_WIDTH)]
        width: usize,
        /// Let the molecule's viewer present its content
        #[arg(long)]
        open: bool,
    },
    /// Add or remove tags of a molecule
    Tag {
        id: i64,
        #[arg(short, long = "add")]
        add: Vec<String>,
        #[arg(short, long = "remove")]
        remove: Vec<String>,
    },
    /// Remove a molecule, or a single atom with --atom
    Rm {
        id: i64,
        #[arg(long)]
        atom: bool,
    },
    /// Export a molecule's content to a file
    Export { id: i64, target: PathBuf },
    /// List atoms having (or, with --exclude, lacking) the given types
    Atoms {
        types: Vec<String>,
        #[arg(long)]
        exclude: bool,
    },
    /// List all tags
    Tags,
    /// List all atom types
    Types,
    /// Delete tags and types nothing references
    Prune,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Service(ServiceError),
    Output(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "[{:?}] {err}", err.kind()),
            Self::Output(message) => write!(f, "failed to write output: {message}"),
        }
    }
}

impl Error for CliError {}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Output(value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value.to_string())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("atomtag: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ArchiveConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ArchiveConfig::load(path).map_err(CliError::Config)?,
        None => ArchiveConfig::default(),
    };
    if let Some(base_dir) = &cli.base_dir {
        config.base_dir = base_dir.clone();
    }
    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).map_err(CliError::Logging)?;
    }
    let service = ArchiveService::open(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&service, cli.command, cli.json, &mut out)
}

fn execute(
    service: &ArchiveService,
    command: Commands,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Commands::Import { files, repository } => {
            let mut imported = Vec::new();
            for file in &files {
                imported.extend(service.import_file(file, repository.as_deref())?);
            }
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&imported)?)?;
            } else {
                for molecule in &imported {
                    writeln!(out, "imported molecule {}", molecule.id())?;
                }
            }
        }
        Commands::Ls { tags, width } => {
            if json {
                let molecules = service.molecules(&tags)?;
                writeln!(out, "{}", serde_json::to_string_pretty(&molecules)?)?;
            } else {
                for line in service.list(&tags, width)? {
                    writeln!(out, "{line}")?;
                }
            }
        }
        Commands::Show { id, width, open } => {
            if json {
                let molecule = service.molecule(id)?;
                writeln!(out, "{}", serde_json::to_string_pretty(&molecule)?)?;
            } else if open {
                service.render(id, out)?;
            } else {
                writeln!(out, "{}", service.show(id, width)?)?;
            }
        }
        Commands::Tag { id, add, remove } => {
            let (molecule, report) = service.retag(id, &add, &remove)?;
            writeln!(
                out,
                "molecule {}: +{} -{} tags [{}]",
                molecule.id(),
                report.tags_linked,
                report.tags_unlinked,
                molecule.tags().join(", ")
            )?;
        }
        Commands::Rm { id, atom } => {
            if atom {
                let report = service.remove_atom(id)?;
                writeln!(
                    out,
                    "removed atom {} from {} molecule(s)",
                    report.atom_id, report.molecules_unlinked
                )?;
            } else {
                let report = service.remove_molecule(id)?;
                writeln!(
                    out,
                    "removed molecule {} ({} atom(s) unlinked, {} deleted)",
                    report.molecule_id, report.atoms_unlinked, report.atoms_deleted
                )?;
            }
        }
        Commands::Export { id, target } => {
            service.export(id, &target)?;
            writeln!(out, "exported molecule {id} to {}", target.display())?;
        }
        Commands::Atoms { types, exclude } => {
            let filter = if exclude {
                TypeFilter::Exclude
            } else {
                TypeFilter::Include
            };
            let atoms = service.atoms_by_type(&types, filter)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&atoms)?)?;
            } else {
                for atom in &atoms {
                    writeln!(out, "{atom}")?;
                }
            }
        }
        Commands::Tags => print_values(out, json, &service.tags()?)?,
        Commands::Types => print_values(out, json, &service.types()?)?,
        Commands::Prune => {
            let report = service.prune()?;
            writeln!(
                out,
                "pruned {} tag(s) and {} type(s)",
                report.tags_deleted, report.types_deleted
            )?;
        }
    }
    Ok(())
}

fn print_values(out: &mut dyn Write, json: bool, values: &[String]) -> Result<(), CliError> {
    if json {
        writeln!(out, "{}", serde_json::to_string(values)?)?;
    } else {
        for value in values {
            writeln!(out, "{value}")?;
        }
    }
    Ok(())
}
