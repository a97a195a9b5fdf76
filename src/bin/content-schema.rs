//! Content Schema CLI
//!
//! Command-line interface for building JSON Schemas of content types from a model file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use content_schema::{
    load_registry, Context, MessageCatalog, Request, SchemaBuilder, SchemaError, TypeRegistry,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "content-schema")]
#[command(about = "Build JSON Schemas for content types")]
#[command(version)]
struct Cli {
    /// Log progress to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full JSON Schema of a content type
    Type {
        #[command(flatten)]
        common: CommonArgs,

        /// Content type id
        portal_type: String,

        /// Field names to leave out (repeatable or comma-separated)
        #[arg(long, short = 'x', value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Describe a single field or fieldset of a content type
    Field {
        #[command(flatten)]
        common: CommonArgs,

        /// Content type id
        portal_type: String,

        /// Field name or fieldset id
        name: String,
    },

    /// List the fieldsets of a content type
    Fieldsets {
        #[command(flatten)]
        common: CommonArgs,

        /// Content type id
        portal_type: String,
    },

    /// List the content types declared in a model file
    Types {
        /// Model file with schemas and types
        model: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Model file with schemas and types
    model: PathBuf,

    /// Translation catalog ({"<lang>": {"<msgid>": "<text>"}})
    #[arg(long, requires = "lang")]
    translations: Option<PathBuf>,

    /// Language for titles and labels
    #[arg(long)]
    lang: Option<String>,

    /// Absolute URL of the context object, used for vocabulary and source links
    #[arg(long, default_value = "")]
    context_url: String,

    /// Site root URL, used for links when no context URL is given
    #[arg(long)]
    site_url: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Type {
            common,
            portal_type,
            exclude,
        } => run_type(&common, &portal_type, exclude),
        Commands::Field {
            common,
            portal_type,
            name,
        } => run_field(&common, &portal_type, &name),
        Commands::Fieldsets {
            common,
            portal_type,
        } => run_fieldsets(&common, &portal_type),
        Commands::Types { model } => run_types(&model),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: SchemaError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

/// Load the model and optional catalog, and build the request-scoped inputs.
fn setup(common: &CommonArgs) -> Result<(SchemaBuilder, Context, Request), u8> {
    let registry = load_registry(&common.model).map_err(fail)?;
    let mut builder = SchemaBuilder::new(Arc::new(registry));

    if let Some(path) = &common.translations {
        let catalog = MessageCatalog::load(path).map_err(fail)?;
        builder = builder.with_translator(Arc::new(catalog));
    }

    let mut request = Request::new();
    if let Some(lang) = &common.lang {
        request = request.with_language(lang.as_str());
    }
    if let Some(site_url) = &common.site_url {
        request = request.with_site_url(site_url.as_str());
    }

    Ok((builder, Context::new(common.context_url.as_str()), request))
}

fn run_type(common: &CommonArgs, portal_type: &str, exclude: Vec<String>) -> Result<(), u8> {
    let (builder, context, request) = setup(common)?;
    let excluded: HashSet<String> = exclude.into_iter().collect();

    let doc = builder
        .schema_for_type(portal_type, &context, &request, &excluded)
        .map_err(fail)?;
    write_output(&doc, common)
}

fn run_field(common: &CommonArgs, portal_type: &str, name: &str) -> Result<(), u8> {
    let (builder, context, request) = setup(common)?;

    let detail = builder
        .field_detail(portal_type, name, &context, &request)
        .map_err(fail)?;
    write_output(&detail.to_value(), common)?;

    // Not finding a name is a valid answer, but scripts want to know
    if detail.is_not_found() {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_fieldsets(common: &CommonArgs, portal_type: &str) -> Result<(), u8> {
    let (builder, context, request) = setup(common)?;

    let summaries = builder
        .fieldset_summaries(portal_type, &context, &request)
        .map_err(fail)?;
    let value = serde_json::to_value(&summaries).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    write_output(&value, common)
}

fn run_types(model: &Path) -> Result<(), u8> {
    let registry = load_registry(model).map_err(fail)?;
    for id in registry.type_ids() {
        println!("{}", id);
    }
    Ok(())
}

fn write_output(value: &Value, common: &CommonArgs) -> Result<(), u8> {
    let json_output = if common.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &common.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
