//! # erpmap
//!
//! Administration of ERP field-mapping rules and export of approved invoices.

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use erpmap_export::{ExportFormat, ExportRequest, ExportService, known_fields};
use erpmap_mapping::{TransformRegistry, TransformSpec};
use erpmap_model::{Invoice, Status};
use erpmap_store::{
    FieldMappingUpdate, LibsqlStore, MappingRepository, NewErp, NewFieldMapping,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "erpmap")]
#[command(about = "ERP field-mapping and invoice export")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL or file path, overrides the config file
    #[arg(long, global = true)]
    database: Option<String>,

    /// Log filter (e.g. `info`, `erpmap_store=debug`), overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage ERP destinations
    #[command(subcommand)]
    Erp(ErpCommand),

    /// Manage field-mapping rules
    #[command(subcommand)]
    Mapping(MappingCommand),

    /// Load invoices into the store
    #[command(subcommand)]
    Invoices(InvoiceCommand),

    /// Export approved invoices for an ERP
    Export(ExportArgs),

    /// Map approved invoices and push them to the ERP
    Push {
        #[arg(long)]
        erp: String,

        /// One row per invoice item
        #[arg(long)]
        flatten: bool,
    },

    /// List the source fields rules can read
    Fields {
        /// Include the `item.` fields of flattened exports
        #[arg(long)]
        flatten: bool,
    },

    /// List the registered transform functions
    Transforms,
}

#[derive(Subcommand)]
enum ErpCommand {
    /// Register a new ERP
    Create { name: String },
    /// List all ERPs
    List,
    /// Set an ERP's status
    Status { id: i64, status: Status },
}

#[derive(Subcommand)]
enum MappingCommand {
    /// List an ERP's rules
    List {
        #[arg(long)]
        erp: String,

        /// Only rules with this status
        #[arg(long, default_value = "ACTIVE", conflicts_with = "all")]
        status: Status,

        /// Rules of any status
        #[arg(long)]
        all: bool,
    },
    /// Add a rule to an ERP
    Create {
        #[arg(long)]
        erp: String,

        #[arg(long)]
        source: String,

        #[arg(long)]
        target: String,

        /// Transform spec, `NAME` or `NAME:ARG`
        #[arg(long)]
        transform: Option<String>,

        #[arg(long)]
        status: Option<Status>,
    },
    /// Change fields of a rule; an empty `--transform` clears it
    Update {
        id: i64,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        transform: Option<String>,

        #[arg(long)]
        status: Option<Status>,
    },
    /// Set a rule's status
    Status { id: i64, status: Status },
}

#[derive(Subcommand)]
enum InvoiceCommand {
    /// Import invoices from a JSON array
    Import { file: PathBuf },
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    erp: String,

    /// Output format, defaults to the config file's
    #[arg(long)]
    format: Option<ExportFormat>,

    /// One row per invoice item; `--flatten=false` overrides a config default
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    flatten: Option<bool>,

    /// Reload the ERP's rules instead of using cached ones
    #[arg(long)]
    refresh: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database.database_url = database;
    }
    init_tracing(cli.log_level.as_deref().or(config.log_level.as_deref()));

    match cli.command {
        Commands::Fields { flatten } => print_json(&known_fields(flatten)),
        Commands::Transforms => print_json(&TransformRegistry::with_builtins().names()),
        Commands::Erp(command) => run_erp(&config, command).await,
        Commands::Mapping(command) => run_mapping(&config, command).await,
        Commands::Invoices(InvoiceCommand::Import { file }) => import_invoices(&config, &file).await,
        Commands::Export(args) => run_export(&config, args).await,
        Commands::Push { erp, flatten } => {
            let store = open_store(&config).await?;
            let service = ExportService::new(MappingRepository::new(store.clone()), store);
            let rows = service.push_to_erp(&erp, flatten).await?;
            info!(erp = %erp, rows, "Push finished");
            print_json(&serde_json::json!({ "erp": erp, "rows": rows }))
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<LibsqlStore>> {
    let store = LibsqlStore::connect(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.database_url))?;
    Ok(Arc::new(store))
}

async fn open_repository(config: &AppConfig) -> anyhow::Result<MappingRepository> {
    Ok(MappingRepository::new(open_store(config).await?))
}

async fn run_erp(config: &AppConfig, command: ErpCommand) -> anyhow::Result<()> {
    let repository = open_repository(config).await?;
    match command {
        ErpCommand::Create { name } => print_json(&repository.create_erp(NewErp::new(name)).await?),
        ErpCommand::List => print_json(&repository.list_erps().await?),
        ErpCommand::Status { id, status } => {
            print_json(&repository.change_erp_status(id, status).await?)
        }
    }
}

async fn run_mapping(config: &AppConfig, command: MappingCommand) -> anyhow::Result<()> {
    let repository = open_repository(config).await?;
    match command {
        MappingCommand::List { erp, status, all } => {
            let status = (!all).then_some(status);
            print_json(&repository.list_rules(&erp, status).await?)
        }
        MappingCommand::Create {
            erp,
            source,
            target,
            transform,
            status,
        } => {
            warn_unknown_transform(transform.as_deref());
            let request = NewFieldMapping {
                erp_name: erp,
                source_field: source,
                target_field: target,
                transform_fn: transform,
                status,
            };
            print_json(&repository.create_rule(request).await?)
        }
        MappingCommand::Update {
            id,
            source,
            target,
            transform,
            status,
        } => {
            warn_unknown_transform(transform.as_deref());
            let update = FieldMappingUpdate {
                source_field: source,
                target_field: target,
                transform_fn: transform,
                status,
            };
            print_json(&repository.update_rule(id, update).await?)
        }
        MappingCommand::Status { id, status } => {
            print_json(&repository.change_rule_status(id, status).await?)
        }
    }
}

/// Unknown transforms pass values through unchanged at export time.
fn warn_unknown_transform(spec: Option<&str>) {
    let Some(spec) = TransformSpec::parse(spec) else {
        return;
    };
    if !TransformRegistry::with_builtins().contains(spec.name) {
        warn!(
            transform = spec.name,
            "Transform is not registered; values will be exported unchanged"
        );
    }
}

async fn import_invoices(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("reading invoices from {}", file.display()))?;
    let invoices: Vec<Invoice> = serde_json::from_str(&text)
        .with_context(|| format!("parsing invoices from {}", file.display()))?;

    let store = open_store(config).await?;
    let mut ids = Vec::with_capacity(invoices.len());
    for invoice in &invoices {
        ids.push(store.save_invoice(invoice).await?);
    }
    info!(count = ids.len(), file = %file.display(), "Imported invoices");
    print_json(&serde_json::json!({ "imported": ids.len(), "ids": ids }))
}

async fn run_export(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let service = ExportService::new(MappingRepository::new(store.clone()), store);
    let request = ExportRequest::new(&args.erp)
        .format(args.format.unwrap_or(config.export.format))
        .flatten(args.flatten.unwrap_or(config.export.flatten))
        .refresh(args.refresh);

    let output = service.export(&request).await?;
    match &args.output {
        Some(path) => {
            fs::write(path, &output.bytes)
                .with_context(|| format!("writing export to {}", path.display()))?;
            info!(path = %path.display(), rows = output.row_count, "Wrote export");
        }
        None => {
            use std::io::Write as _;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output.bytes)?;
            if output.format == ExportFormat::Json {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
