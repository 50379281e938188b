//! jsonwidget CLI
//!
//! Validate, inspect and edit JSON/YAML documents against a schema, generate
//! schemas from examples and convert between schema vocabularies.
//!
//! Exit status: 0 on success, 1 when a document fails validation, 2 on usage
//! or I/O errors.

use anyhow::Context;
use clap::{Parser, Subcommand};
use jsonwidget::bundled::OPEN_SCHEMA;
use jsonwidget::{
    storage, Command, EditSession, EditorConfig, JsonWidgetError, NodeView, OutputOptions, Renderable,
    SchemaFormat, SchemaSource, SchemaTree, StorageFormat,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonwidget")]
#[command(about = "Schema-driven JSON and YAML document tools")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document against a schema
    Validate {
        file: PathBuf,
        /// Schema file or bundled schema name
        #[arg(short, long, default_value = OPEN_SCHEMA)]
        schema: String,
    },

    /// Print a schema generated from an example document
    Schemagen {
        file: PathBuf,
        /// Schema format version (1 or 2); defaults to the configured one
        #[arg(short = 'V', long, value_parser = parse_format)]
        version: Option<SchemaFormat>,
    },

    /// Rewrite a version 1 schema as version 2
    Upgradeschema { file: PathBuf },

    /// Rewrite a schema in the given format version
    ConvertSchema {
        file: PathBuf,
        #[arg(long, value_parser = parse_format)]
        to: SchemaFormat,
    },

    /// Print a JSON document as YAML
    Json2yaml { file: PathBuf },

    /// Print a YAML document as JSON
    Yaml2json { file: PathBuf },

    /// Print the titled outline of a document
    Show {
        file: PathBuf,
        /// Schema file or bundled schema name; generated when omitted
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Apply a list of edit commands and save
    Edit {
        file: PathBuf,
        /// Schema file or bundled schema name; generated when omitted
        #[arg(short, long)]
        schema: Option<String>,
        /// JSON or YAML list of commands
        #[arg(long)]
        commands: PathBuf,
        /// Write here instead of back to FILE
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_format(s: &str) -> Result<SchemaFormat, String> {
    s.trim_start_matches(['v', 'V'])
        .parse::<u8>()
        .ok()
        .and_then(SchemaFormat::from_version)
        .ok_or_else(|| format!("unknown schema format {:?} (expected 1 or 2)", s))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let invalid = e
                .downcast_ref::<JsonWidgetError>()
                .map(JsonWidgetError::is_validation)
                .unwrap_or(false);
            if invalid {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = EditorConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let output = OutputOptions::from_config(&config);

    match cli.command {
        Commands::Validate { file, schema } => {
            let (data, order) = storage::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let schema_tree = SchemaSource::from_arg(Some(&schema)).resolve(None, &config)?;
            match jsonwidget::DocumentTree::new(&data, schema_tree, Some(&order)) {
                Ok(_) => {
                    println!("Valid file! {} validates against {}", file.display(), schema);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_validation() => {
                    eprintln!("{}", e);
                    Ok(ExitCode::from(1))
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Schemagen { file, version } => {
            let (data, order) = storage::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let format = version.unwrap_or(config.schema.format);
            let schema = jsonwidget::generate_from_example(&data, &order, format)?;
            print!("{}", schema.dumps(format, &output)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Upgradeschema { file } => {
            let schema = SchemaTree::from_file(&file, SchemaFormat::V1)?;
            print!("{}", schema.convert(SchemaFormat::V2)?.dumps(SchemaFormat::V2, &output)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::ConvertSchema { file, to } => {
            let schema = SchemaTree::from_file(&file, config.schema.format)?;
            print!("{}", schema.convert(to)?.dumps(to, &output)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Json2yaml { file } => convert_document(&file, StorageFormat::Json, StorageFormat::Yaml, &output),

        Commands::Yaml2json { file } => convert_document(&file, StorageFormat::Yaml, StorageFormat::Json, &output),

        Commands::Show { file, schema } => {
            let session = EditSession::open(&file, SchemaSource::from_arg(schema.as_deref()), config)?;
            for line in NodeView::root(session.tree()).render()? {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Edit {
            file,
            schema,
            commands,
            output: destination,
        } => {
            let (raw, _) = storage::read(&commands).with_context(|| format!("reading {}", commands.display()))?;
            let commands: Vec<Command> = serde_json::from_value(raw).context("parsing edit commands")?;

            let mut session = EditSession::open(&file, SchemaSource::from_arg(schema.as_deref()), config)?;
            let applied = session.apply_all(&commands)?;
            match destination {
                Some(path) => session.save_as(path)?,
                None => session.save()?,
            }
            eprintln!(
                "Applied {} commands ({} edits); wrote {}",
                applied,
                session.tree().edit_count(),
                session.filename().display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn convert_document(file: &Path, from: StorageFormat, to: StorageFormat, output: &OutputOptions) -> anyhow::Result<ExitCode> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let (data, order) = storage::parse_str(&text, from)?;
    print!("{}", storage::render(&data, &order, to, output)?);
    Ok(ExitCode::SUCCESS)
}
