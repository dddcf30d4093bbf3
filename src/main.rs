use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use relq::{config, MappingSchema, QueryModel, QueryTranslator};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Indented statement tree
    Tree,
    /// Statement serialized as JSON, for a downstream renderer
    Json,
}

/// relq - compiles a JSON query model into a resolved relational statement
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Query model (JSON)
    query: PathBuf,

    /// Mapping schema (YAML)
    #[arg(long, short)]
    mapping: PathBuf,

    /// Translator configuration (YAML); overrides the CLI flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum nesting of sub-statements
    #[arg(long, default_value_t = 64)]
    max_statement_depth: usize,

    /// Keep booleans as booleans instead of rewriting them to integers
    #[arg(long)]
    no_boolean_emulation: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
    output: OutputFormat,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            max_statement_depth: cli.max_statement_depth,
            no_boolean_emulation: cli.no_boolean_emulation,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::TranslatorConfig::from_yaml_file(path),
        None => config::TranslatorConfig::from_cli((&cli).into()),
    }
    .context("Configuration error")?;

    let schema = MappingSchema::from_yaml_file(&cli.mapping)
        .with_context(|| format!("Failed to load mapping {}", cli.mapping.display()))?;

    let json = std::fs::read_to_string(&cli.query)
        .with_context(|| format!("Failed to read query model {}", cli.query.display()))?;
    let model = QueryModel::from_json(&json).context("Invalid query model")?;

    let translator = QueryTranslator::new(Arc::new(schema), config);
    let statement = translator.translate(&model).map_err(|e| {
        let kind = e.kind();
        anyhow::Error::new(e).context(format!("Translation failed ({})", kind))
    })?;

    match cli.output {
        OutputFormat::Tree => println!("{}", statement),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statement)?),
    }
    Ok(())
}
