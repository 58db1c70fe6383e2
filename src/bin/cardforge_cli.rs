//! CardForge CLI - render cards from the command line
//!
//! Commands: templates, build, check-field
//! Outputs JSON to stdout, logs to stderr (`RUST_LOG`)
//! Returns 2 when a card cannot be rendered

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cardforge_core::{
    Card, FieldType, FileResources, RecordingCanvasSupplier, RenderConfig, Renderer,
    TemplateRegistry, TemplateSupplier,
};

#[derive(Parser)]
#[command(name = "cardforge-cli")]
#[command(about = "CardForge CLI - Drawing-Data Compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to templates directory
    #[arg(short, long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Directory images and vector art are read from (defaults to the templates directory)
    #[arg(short, long)]
    assets_dir: Option<PathBuf>,

    /// JSON render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Render a card and print its drawing manifest
    Build {
        /// Card JSON, inline or a path to a file
        #[arg(long)]
        card: String,
    },

    /// Check that a template field exists with the given type
    CheckField {
        #[arg(short, long)]
        template: String,

        #[arg(short, long)]
        field: String,

        /// Field type tag, e.g. `text` or `image`
        #[arg(long = "type")]
        field_type: FieldType,
    },
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn failure(error: impl ToString, code: u8) -> ExitCode {
    emit(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }));
    ExitCode::from(code)
}

fn read_card(arg: &str) -> Result<Card, String> {
    let json = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        fs::read_to_string(Path::new(arg)).map_err(|e| format!("Failed to read card {}: {}", arg, e))?
    };
    serde_json::from_str(&json).map_err(|e| format!("Invalid card: {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = match &cli.config {
        Some(path) => match RenderConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => return failure(format!("Failed to load config: {}", e), 1),
        },
        None => RenderConfig::default(),
    };

    let registry = match TemplateRegistry::load_from_dir(&cli.templates_dir) {
        Ok(r) => Arc::new(r),
        Err(e) => return failure(format!("Failed to load templates: {}", e), 1),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get(name).map(|t| (name, t)))
                .map(|(name, t)| {
                    serde_json::json!({
                        "name": name,
                        "width": t.width,
                        "height": t.height,
                        "fields": t.fields.len(),
                        "editable": t.editable_fields().map(|f| f.id.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect();

            emit(&templates);
            ExitCode::SUCCESS
        }

        Commands::Build { card } => {
            let card = match read_card(&card) {
                Ok(c) => c,
                Err(e) => return failure(e, 1),
            };

            let assets = Arc::new(FileResources::new(
                cli.assets_dir.unwrap_or_else(|| cli.templates_dir.clone()),
            ));
            let renderer = Renderer::new(config)
                .with_template_supplier(registry)
                .with_canvas_supplier(Arc::new(RecordingCanvasSupplier))
                .with_image_fetcher(assets.clone())
                .with_svg_loader(assets);

            match renderer.draw(&card).await {
                Ok(rendered) => {
                    emit(&serde_json::json!({
                        "success": true,
                        "manifest": rendered.manifest,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e, 2),
            }
        }

        Commands::CheckField { template, field, field_type } => {
            let result = registry
                .supply(&template)
                .and_then(|t| t.check_field(&field, field_type).map(|_| ()));

            match result {
                Ok(()) => {
                    emit(&serde_json::json!({
                        "valid": true,
                        "template": template,
                        "field": field,
                        "type": field_type.as_str(),
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e, 2),
            }
        }
    }
}
