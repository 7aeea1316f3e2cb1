use std::path::Path;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use schema_annotate::config::{self, Config, NamespaceSetting, Position, DEFAULT_CONFIG_PATH};
use schema_annotate::{utils, FileOutcome, SchemaAnnotateClient};

/// Write table schema comments into model files
#[derive(Parser, Debug)]
#[command(name = "schema_annotate", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Database URL, overriding the configuration file
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate model files; with no paths the configured model directories are scanned
    Annotate(AnnotateArgs),
    /// Print the schema comment for one table
    Show {
        /// Table name, optionally schema-qualified
        table: String,
        /// Print the introspected table as JSON instead
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Files, directories or glob patterns
    paths: Vec<String>,

    /// Where the comment goes: after or before
    #[arg(long)]
    position: Option<Position>,

    /// Surround the comment with dashed lines
    #[arg(long)]
    border: bool,

    #[arg(long)]
    no_indexes: bool,

    #[arg(long)]
    no_constraints: bool,

    #[arg(long)]
    no_foreign_keys: bool,

    #[arg(long)]
    no_references: bool,

    #[arg(long)]
    no_triggers: bool,

    #[arg(long)]
    no_comments: bool,

    /// Prefix model names with this namespace
    #[arg(long, conflicts_with = "detect_namespace")]
    namespace: Option<String>,

    /// Use the modules enclosing each model as its namespace
    #[arg(long)]
    detect_namespace: bool,

    /// Leave every file untouched; any non-false environment value enables it
    #[arg(
        long,
        env = "SCHEMA_ANNOTATE_SKIP",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    skip: bool,
}

impl AnnotateArgs {
    fn apply(&self, config: &mut Config) {
        let annotate = &mut config.annotate;
        let render = &mut annotate.render;

        if let Some(position) = self.position {
            render.position = position;
        }
        render.border |= self.border;
        render.indexes &= !self.no_indexes;
        render.constraints &= !self.no_constraints;
        render.foreign_keys &= !self.no_foreign_keys;
        render.references &= !self.no_references;
        render.triggers &= !self.no_triggers;
        render.comments &= !self.no_comments;

        if let Some(namespace) = &self.namespace {
            annotate.namespace = Some(NamespaceSetting::Named(namespace.clone()));
        } else if self.detect_namespace {
            annotate.namespace = Some(NamespaceSetting::Detect(true));
        }
        annotate.skip |= self.skip;
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = if Path::new(&cli.config).exists() {
        config::load_from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config))?
    } else if let Some(url) = &cli.database_url {
        Config::for_database_url(url)
    } else {
        anyhow::bail!(
            "Configuration file {} not found and no --database-url given",
            cli.config
        );
    };

    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
        config.database.driver = None;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    utils::init_logging(&config.logging)?;

    if let Command::Annotate(args) = &cli.command {
        args.apply(&mut config);
    }

    let client = SchemaAnnotateClient::new(config)
        .await
        .context("Failed to connect to database")?;

    match &cli.command {
        Command::Annotate(args) => {
            let report = client.annotate(&args.paths).await?;

            for (path, outcome) in &report.files {
                match outcome {
                    FileOutcome::Updated => println!("updated   {}", path.display()),
                    FileOutcome::Unchanged => println!("unchanged {}", path.display()),
                    FileOutcome::Skipped(reason) => {
                        println!("skipped   {} ({})", path.display(), reason)
                    }
                }
            }
            println!(
                "{} updated, {} unchanged, {} skipped",
                report.updated(),
                report.unchanged(),
                report.skipped()
            );
        }
        Command::Show { table, json } => {
            if *json {
                let snapshot = client.snapshot(table).await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let comment = client.schema_comment(table).await;
                if comment.is_empty() {
                    anyhow::bail!("Table {} could not be described", table);
                }
                println!("{}", comment);
            }
        }
    }

    Ok(())
}
