use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use registry_index::logging::configure_logging;
use registry_index::{
    run_load, search, PipelineConfig, SearchRequest, SortOrder, SqliteIndex,
};

#[derive(Parser)]
#[command(name = "registry-index", version, about = "Normalize registry extracts and build search indices")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild every index from the source dumps
    Load(LoadArgs),
    /// Run one search against an index and print the JSON response
    Search(SearchArgs),
}

#[derive(Args)]
struct LoadArgs {
    /// JSON pipeline config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "REGISTRY_DB")]
    db: Option<PathBuf>,

    #[arg(long)]
    companies: Option<PathBuf>,

    #[arg(long)]
    business_names: Option<PathBuf>,

    #[arg(long)]
    tax_payers: Option<PathBuf>,

    /// Legislator contact list (CSV)
    #[arg(long)]
    wabunge: Option<PathBuf>,

    /// postcode,region,district,ward
    #[arg(long)]
    postcodes: Option<PathBuf>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Never infer nationality from a decoded identifier
    #[arg(long)]
    no_nationality_inference: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long, env = "REGISTRY_DB", default_value = "registry.db")]
    db: PathBuf,

    index: String,

    #[arg(long)]
    term: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 10)]
    page_size: u32,

    #[arg(long, default_value = "id")]
    sort_field: String,

    #[arg(long)]
    desc: bool,

    #[arg(long)]
    whole_word: bool,

    #[arg(long)]
    whole_sentence: bool,

    #[arg(long)]
    cursor: Option<String>,
}

fn main() -> Result<()> {
    configure_logging();

    match Cli::parse().command {
        Command::Load(args) => run_import(args),
        Command::Search(args) => run_search(args),
    }
}

fn pipeline_config(args: LoadArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(db) = args.db {
        config.database = db;
    }
    config.companies = args.companies.or(config.companies);
    config.business_names = args.business_names.or(config.business_names);
    config.tax_payers = args.tax_payers.or(config.tax_payers);
    config.wabunge = args.wabunge.or(config.wabunge);
    config.postcodes = args.postcodes.or(config.postcodes);
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.no_nationality_inference {
        config.nationality.infer_from_identifier = false;
    }

    config.validate()?;
    Ok(config)
}

fn run_import(args: LoadArgs) -> Result<()> {
    let config = pipeline_config(args)?;

    println!("🗄️  Registry load → {}", config.database.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut index = SqliteIndex::open(&config.database)
        .with_context(|| format!("Failed to open index database: {:?}", config.database))?;

    let report = run_load(&config, &mut index).context("Load run failed")?;

    println!("\n{:<24} {:>10} {:>10} {:>8}", "index", "processed", "indexed", "errors");
    for summary in &report.types {
        println!(
            "{:<24} {:>10} {:>10} {:>8}",
            summary.index, summary.processed, summary.indexed, summary.errors
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Run {} finished in {} ms", report.run_id, report.elapsed_ms);

    Ok(())
}

fn run_search(args: SearchArgs) -> Result<()> {
    let index = SqliteIndex::open(&args.db)
        .with_context(|| format!("Failed to open index database: {:?}", args.db))?;

    let request = SearchRequest {
        page: args.page,
        page_size: args.page_size,
        search_term: args.term,
        whole_word: args.whole_word,
        whole_sentence: args.whole_sentence,
        sort_field: args.sort_field,
        sort_order: if args.desc { SortOrder::Desc } else { SortOrder::Asc },
        cursor_token: args.cursor,
    };

    let response = search(index.connection(), &args.index, &request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
