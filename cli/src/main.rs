use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use schema_engine_core::reverse_map::{MetadataFieldNames, PackShape, ReverseMapOptions};
use schema_engine_core::{Engine, EngineConfig};
use serde_json::Value;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "schema-engine")]
#[command(about = "Convert an EMR assessment-form schema into an LLM structured-output JSON Schema, validate a response, and reverse-map it back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an external schema under a meta-schema and print its assigned id/name
    Register {
        #[command(flatten)]
        schemas: SchemaArgs,

        /// Explicit table id to register under, instead of auto-allocating one
        #[arg(long)]
        table_id: Option<i64>,
    },

    /// Register an external schema and print the generated JSON Schema
    Schema {
        #[command(flatten)]
        schemas: SchemaArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Register an external schema and validate a candidate response against it
    Validate {
        #[command(flatten)]
        schemas: SchemaArgs,

        /// Model response JSON file to validate
        response: PathBuf,
    },

    /// Register an external schema, validate a response, and reverse-map it to the external wire format
    ReverseMap {
        #[command(flatten)]
        schemas: SchemaArgs,

        /// Model response JSON file to reverse-map
        response: PathBuf,

        /// Formatter set to use (default: "pcc-ui")
        #[arg(long)]
        formatter_set: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Register an external schema and list its field index
    List {
        #[command(flatten)]
        schemas: SchemaArgs,
    },
}

#[derive(clap::Args)]
struct SchemaArgs {
    /// Meta-schema file describing the external schema family (PCC, Airtable, ...)
    #[arg(long)]
    meta_schema: PathBuf,

    /// External schema file to register
    #[arg(long)]
    external_schema: PathBuf,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — logs go to stderr so stdout stays clean for JSON.
    let log_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Register { schemas, table_id } => {
            let engine = build_engine(&schemas.meta_schema)?;
            let external_schema = read_json(&schemas.external_schema)?;
            let (id, name) = engine
                .register_table(table_id, &external_schema)
                .map_err(|e| anyhow::Error::from(e).context("Registration failed"))?;
            write_json(&serde_json::json!({"id": id, "name": name}), None, OutputFormat::Pretty)?;
        }

        Commands::Schema { schemas, output, format } => {
            let engine = build_engine(&schemas.meta_schema)?;
            let external_schema = read_json(&schemas.external_schema)?;
            let (id, _name) = engine
                .register_table(None, &external_schema)
                .map_err(|e| anyhow::Error::from(e).context("Registration failed"))?;
            let schema = engine.get_json_schema(id).map_err(anyhow::Error::from)?;
            write_json(&schema, output.as_ref(), format)?;
        }

        Commands::Validate { schemas, response } => {
            let engine = build_engine(&schemas.meta_schema)?;
            let external_schema = read_json(&schemas.external_schema)?;
            let (id, _name) = engine
                .register_table(None, &external_schema)
                .map_err(|e| anyhow::Error::from(e).context("Registration failed"))?;
            let response_doc = read_json(&response)?;
            let (valid, errors) = engine.validate(id, &response_doc).map_err(anyhow::Error::from)?;
            write_json(&serde_json::json!({"valid": valid, "errors": errors}), None, OutputFormat::Pretty)?;
            if !valid {
                std::process::exit(1);
            }
        }

        Commands::ReverseMap { schemas, response, formatter_set, output, format } => {
            let engine = build_engine(&schemas.meta_schema)?;
            let external_schema = read_json(&schemas.external_schema)?;
            let (id, _name) = engine
                .register_table(None, &external_schema)
                .map_err(|e| anyhow::Error::from(e).context("Registration failed"))?;
            let response_doc = read_json(&response)?;

            let (valid, errors) = engine.validate(id, &response_doc).map_err(anyhow::Error::from)?;
            if !valid {
                for err in &errors {
                    eprintln!("Warning: {err}");
                }
            }

            let mut options = ReverseMapOptions {
                group_by_containers: None,
                field_pack_shape: PackShape::Object,
                container_pack_shape: PackShape::Object,
                default_section_state: false,
                metadata: MetadataFieldNames::default(),
                formatter_set: engine.config().default_formatter_set.clone(),
            };
            if let Some(set) = formatter_set {
                options.formatter_set = set;
            }

            let mapped = engine.reverse_map(id, &response_doc, &options).map_err(anyhow::Error::from)?;
            write_json(&mapped, output.as_ref(), format)?;
        }

        Commands::List { schemas } => {
            let engine = build_engine(&schemas.meta_schema)?;
            let external_schema = read_json(&schemas.external_schema)?;
            let (id, _name) = engine
                .register_table(None, &external_schema)
                .map_err(|e| anyhow::Error::from(e).context("Registration failed"))?;
            let fields = engine.get_field_metadata(id).map_err(anyhow::Error::from)?;
            for field in &fields {
                println!("{}\t{}\t{}", field.property_key, field.target_type, field.original_schema_type);
            }
        }
    }

    Ok(())
}

fn build_engine(meta_schema_path: &Path) -> Result<Engine> {
    let meta_schema = read_json(meta_schema_path)?;
    Engine::new(meta_schema, EngineConfig::default()).map_err(|e| anyhow::Error::from(e).context("Engine construction failed"))
}

/// Read and parse a JSON document from a file path.
fn read_json(path: &Path) -> Result<Value> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("Failed to parse JSON from: {}", path.display()))
}

fn write_json<T: serde::Serialize>(val: &T, path: Option<&PathBuf>, format: OutputFormat) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p).with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }
    writeln!(writer).context("Failed to write trailing newline")?;
    Ok(())
}
