use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use county_sales_etl::{
    aggregate, classify, latest_month, persist_summary, write_report, BatchLoader,
    CancellationFlag, ClassificationTally, EtlConfig, JurisdictionReference, LoaderOptions, Month,
    PartitionSource, RecordNormalizer, SchemaRegistry, SqliteStore, Store, SummaryRecord, VERSION,
};

/// Load partitioned county sales, aggregate them and classify counties.
#[derive(Parser, Debug)]
#[command(name = "county-sales")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load partition files into the store
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Build the monthly summary
    Aggregate,
    /// Classify counties over a window of the summary
    Classify(ClassifyArgs),
    /// Load, aggregate and classify in one go
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        classify: ClassifyArgs,
    },
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Jurisdiction reference CSV (overrides the config file)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// First month of the window (YYYY-MM)
    #[arg(long, conflicts_with = "trailing_months")]
    as_of: Option<Month>,

    /// Window of the N most recent months in the summary
    #[arg(long, default_value_t = 12)]
    trailing_months: u32,

    /// Report file (.csv or .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read the persisted summary table instead of re-aggregating
    #[arg(long)]
    from_table: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EtlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = cli.database {
        config = config.with_database(database);
    }

    println!("🏛️  County Sales ETL v{}", VERSION);
    let mut store = open_store(&config.database)?;

    match cli.command {
        Command::Load { files } => run_load(&config, &mut store, &files),
        Command::Aggregate => run_aggregate(&config, &mut store).map(|_| ()),
        Command::Classify(args) => run_classify(&config, &mut store, &args),
        Command::Run { files, classify } => {
            run_load(&config, &mut store, &files)?;
            run_classify(&config, &mut store, &classify)
        }
    }
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    println!("🔧 Opening database {}", path.display());
    let store = SqliteStore::open(path).with_context(|| format!("Failed to open database: {}", path.display()))?;
    println!("✓ Database ready (WAL mode)");
    Ok(store)
}

fn run_load(config: &EtlConfig, store: &mut SqliteStore, files: &[PathBuf]) -> Result<()> {
    println!("\n📂 Loading {} partition(s)...", files.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let before = store.row_count()?;
    let loader = BatchLoader::new(
        RecordNormalizer::new(SchemaRegistry::new()),
        LoaderOptions::try_from(config).context("Invalid loader settings")?,
    );
    let sources: Vec<PartitionSource> = files.iter().map(PartitionSource::file).collect();

    let summary = loader.load_all(store, &sources, &CancellationFlag::new());

    for report in &summary.reports {
        println!(
            "✓ {}: {} accepted, {} rejected ({} ms)",
            report.partition,
            report.accepted_count,
            report.rejected_count,
            report.elapsed.as_millis()
        );
        if report.previously_loaded_by.is_some() {
            println!("  ⚠️  identical file loaded before; its rows are now duplicated");
        }
        for rejection in &report.rejections {
            println!("  ✗ line {}: {}", rejection.line, rejection.error);
        }
        if report.rejected_count > report.rejections.len() {
            println!("  … {} more rejected rows", report.rejected_count - report.rejections.len());
        }
    }
    for failure in &summary.failures {
        println!("❌ {}", failure);
    }

    println!("\n🔍 Verifying database...");
    let after = store.row_count()?;
    let expected = before + summary.accepted_total() as i64;
    println!("✓ Database contains {} rows", after);
    if after != expected {
        bail!("row count mismatch: expected {}, found {}", expected, after);
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Loaded {} rows, rejected {}",
        summary.accepted_total(),
        summary.rejected_total()
    );

    if !summary.failures.is_empty() {
        bail!("{} partition(s) failed to load", summary.failures.len());
    }
    Ok(())
}

fn run_aggregate(config: &EtlConfig, store: &mut SqliteStore) -> Result<Vec<SummaryRecord>> {
    println!("\n📊 Aggregating monthly summary...");
    let summary = aggregate(&*store).context("Aggregation failed")?;
    println!("✓ {} summary groups", summary.len());

    if config.summary_table_persist {
        let written = persist_summary(store, &summary)?;
        println!("✓ Persisted {} rows to monthly_summary", written);
    }
    Ok(summary)
}

fn run_classify(config: &EtlConfig, store: &mut SqliteStore, args: &ClassifyArgs) -> Result<()> {
    let reference_path = args
        .reference
        .as_ref()
        .or(config.reference.as_ref())
        .context("No jurisdiction reference given (use --reference or `reference` in the config)")?;
    let reference = JurisdictionReference::from_path(reference_path)
        .with_context(|| format!("Failed to load reference: {}", reference_path.display()))?;

    let summary = if args.from_table {
        println!("\n📊 Reading persisted monthly summary...");
        store.read_summary()?
    } else {
        run_aggregate(config, store)?
    };

    let as_of = match args.as_of {
        Some(month) => month,
        None => match latest_month(&summary) {
            Some(latest) => Month::trailing_window_start(latest, args.trailing_months),
            None => {
                println!("⚠️  Summary is empty; nothing to classify");
                return Ok(());
            }
        },
    };
    info!(%as_of, "classification window");

    println!("\n🏷️  Classifying counties from {}...", as_of);
    let classified = classify(&summary, &reference, as_of);
    let tally = ClassificationTally::from_rows(&classified);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Taxable: {} counties, ${}", tally.taxable.counties, tally.taxable.sale_dollars);
    println!("✓ Exempt:  {} counties, ${}", tally.exempt.counties, tally.exempt.sale_dollars);
    if tally.unknown.counties > 0 {
        println!("⚠️  Unknown: {} counties, ${}", tally.unknown.counties, tally.unknown.sale_dollars);
    }
    println!("✅ {} counties, ${} total", tally.counties(), tally.sale_dollars());

    if let Some(output) = &args.output {
        let format = write_report(output, &classified)?;
        println!("💾 Wrote {:?} report to {}", format, output.display());
    }

    Ok(())
}
