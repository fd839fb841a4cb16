//! qcview CLI - filter, encode and cutoff-check sequencing QC metrics caches

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Diagnostics go to stderr, reports to stdout

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use qcview_core::config::{self, QcviewConfig};
use qcview_core::filter::{FilterSpec, HighlightSet, RunRegistry};
use qcview_core::label::create_data_label;
use qcview_core::provider::{join, CacheProvider, DataProvider};
use qcview_core::report::{
    render_cutoff_json, render_cutoff_text, render_table_json, render_table_text,
};
use qcview_core::reshape::{
    needs_run_registry, reshape_call_ready, reshape_single_lane, Encoding, EncodingUniverse,
    ReshapeRequest, SortKeys,
};
use qcview_core::schema::{ReportSchema, Variant, RUN, RUN_COMPLETION, RUN_START};
use qcview_core::{evaluate, ResolvedConfig, Table, Value};
use std::io::Write;
use std::path::PathBuf;

/// Column added by `reshape --label-columns`
const LABEL_COLUMN: &str = "label";

#[derive(Parser)]
#[command(name = "qcview")]
#[command(about = "Filter, colour-code and cutoff-check sequencing QC metrics")]
#[command(version = env!("QCVIEW_VERSION"))]
struct Cli {
    /// Print debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, sort and add chart encoding columns to a metrics table
    Reshape {
        #[command(flatten)]
        report: ReportArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Columns to build a hover label from (comma separated)
        #[arg(long, value_delimiter = ',')]
        label_columns: Vec<String>,

        /// Free text appended to every label
        #[arg(long)]
        label_text: Option<String>,
    },
    /// Evaluate configured cutoffs on the filtered table
    Cutoffs {
        #[command(flatten)]
        report: ReportArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Exit with status 1 when any row fails or is missing a metric
        #[arg(long)]
        strict: bool,
    },
    /// Validate or show a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Directory of `.csv` / `.csv.zst` cache files
    data_dir: PathBuf,

    /// Metrics table to report on
    #[arg(long)]
    table: String,

    /// Sample provenance table joined onto the metrics table
    #[arg(long)]
    provenance: Option<String>,

    /// Key columns for the provenance join
    #[arg(long, value_delimiter = ',')]
    join_on: Vec<String>,

    /// Run registry table used for the date window (single-lane only)
    #[arg(long)]
    runs: Option<String>,

    /// JSON filter selection file
    #[arg(long)]
    filters: Option<PathBuf>,

    /// Select every value of every dimension not named in --filters
    #[arg(long)]
    all: bool,

    /// Identifiers to highlight (comma separated, added to --filters)
    #[arg(long, value_delimiter = ',')]
    highlight: Vec<String>,

    /// Report layout
    #[arg(long, default_value = "single-lane")]
    variant: VariantArg,

    /// Sort keys (overrides config file)
    #[arg(long, num_args = 2, value_names = ["PRIMARY", "SECONDARY"])]
    sort: Option<Vec<String>>,

    /// Column driving marker colour
    #[arg(long)]
    colour_by: Option<String>,

    /// Column driving marker shape
    #[arg(long)]
    shape_by: Option<String>,

    /// Path to config file (default: auto-discover in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without loading any data
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Print an example config file instead
        #[arg(long)]
        example: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum VariantArg {
    SingleLane,
    CallReady,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::SingleLane => Variant::SingleLane,
            VariantArg::CallReady => Variant::CallReady,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Reshape {
            report,
            format,
            label_columns,
            label_text,
        } => {
            let resolved = load_config(&report)?;
            let (mut table, _) = run_reshape(&report, &resolved)?;

            if !label_columns.is_empty() || label_text.is_some() {
                let labels = create_data_label(
                    &table,
                    Some(label_columns.as_slice()),
                    label_text.as_deref(),
                    &resolved.label,
                )?;
                table.set_column(LABEL_COLUMN, labels.into_iter().map(Value::Str).collect())?;
            }

            match format {
                OutputFormat::Text => print!("{}", render_table_text(&table)),
                OutputFormat::Json => println!("{}", render_table_json(&table)?),
            }
        }
        Commands::Cutoffs {
            report,
            format,
            strict,
        } => {
            let resolved = load_config(&report)?;
            if resolved.cutoffs.is_empty() {
                anyhow::bail!("no cutoffs configured; add a \"cutoffs\" list to the config file");
            }
            let (table, schema) = run_reshape(&report, &resolved)?;
            let identity = resolved
                .identity_columns
                .clone()
                .unwrap_or_else(|| schema.identity_columns.clone());
            let result = evaluate(&table, &resolved.cutoffs, &identity)?;

            match format {
                OutputFormat::Text => print!("{}", render_cutoff_text(&result)),
                OutputFormat::Json => println!("{}", render_cutoff_json(&result)?),
            }

            if strict && result.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let cwd = std::env::current_dir()?;
                match config::load_and_resolve(&cwd, path.as_deref()) {
                    Ok(resolved) => {
                        if let Some(ref p) = resolved.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config error: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path, example } => {
                if example {
                    let json = serde_json::to_string_pretty(&QcviewConfig::example())
                        .context("failed to serialize example config")?;
                    println!("{}", json);
                    return Ok(());
                }
                let cwd = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&cwd, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn load_config(args: &ReportArgs) -> anyhow::Result<ResolvedConfig> {
    let resolved = config::load_and_resolve(&args.data_dir, args.config.as_deref())?;
    if let Some(ref path) = resolved.config_path {
        eprintln!("Using config: {}", path.display());
    }
    Ok(resolved)
}

/// Load caches, join provenance and run the reshape for `args.variant`
fn run_reshape(
    args: &ReportArgs,
    resolved: &ResolvedConfig,
) -> anyhow::Result<(Table, ReportSchema)> {
    let mut provider = CacheProvider::open(&args.data_dir)?;
    let count = provider.load()?;
    log::info!("loaded {} tables from {}", count, args.data_dir.display());

    let metrics = provider.table(&args.table)?;
    let table = match args.provenance {
        Some(ref name) => {
            if args.join_on.is_empty() {
                anyhow::bail!("--provenance requires --join-on <columns>");
            }
            let keys: Vec<&str> = args.join_on.iter().map(String::as_str).collect();
            join(metrics, provider.table(name)?, &keys)
                .with_context(|| format!("failed to join {} onto {}", name, args.table))?
        }
        None => metrics.clone(),
    };

    let variant = Variant::from(args.variant);
    let schema = ReportSchema::for_variant(variant);

    let mut filters = match args.filters {
        Some(ref path) => read_filters(path)?,
        None => FilterSpec::new(),
    };
    if args.all {
        for (&dimension, column) in &schema.dimensions {
            if filters.allowed(dimension).is_some() {
                continue;
            }
            let mut values = table.distinct(column)?;
            values.push(Value::Null);
            filters = filters.allow(dimension, values);
        }
    }
    if !args.highlight.is_empty() {
        let mut highlight: HighlightSet = filters.highlight.clone();
        for id in &args.highlight {
            highlight.insert(id.trim());
        }
        filters = filters.with_highlight(highlight);
    }

    let sort = match args.sort {
        Some(ref keys) if keys.len() == 2 => SortKeys::new(keys[0].as_str(), keys[1].as_str()),
        _ => resolved
            .sort
            .clone()
            .unwrap_or_else(|| SortKeys::default_for(variant)),
    };
    let defaults = Encoding::default();
    let encoding = Encoding {
        colour_by: args.colour_by.clone().unwrap_or(defaults.colour_by),
        shape_by: args.shape_by.clone().unwrap_or(defaults.shape_by),
    };
    let universe = EncodingUniverse::from_table(&table, &encoding)
        .context("cannot build colour/shape universe")?;

    let request = ReshapeRequest {
        filters,
        sort,
        encoding,
        universe,
    };

    let reshaped = match variant {
        Variant::SingleLane => {
            if args.runs.is_none() && needs_run_registry(&request.filters, &schema) {
                anyhow::bail!("the filter file sets a date_range; pass --runs <table> to apply it");
            }
            let runs = match args.runs {
                Some(ref name) => Some(
                    RunRegistry::from_table(provider.table(name)?, RUN, RUN_START, RUN_COMPLETION)
                        .with_context(|| format!("table {} is not a run registry", name))?,
                ),
                None => None,
            };
            let now = Local::now().naive_local();
            reshape_single_lane(
                &table,
                &schema,
                &request,
                &resolved.style,
                runs.as_ref(),
                now,
            )?
        }
        Variant::CallReady => {
            if args.runs.is_some() {
                log::warn!("--runs is ignored for call-ready reports");
            }
            reshape_call_ready(&table, &schema, &request, &resolved.style)?
        }
    };

    log::info!("{} of {} rows selected", reshaped.len(), table.len());
    Ok((reshaped, schema))
}

fn read_filters(path: &std::path::Path) -> anyhow::Result<FilterSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read filter file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse filter file: {}", path.display()))
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Style:");
    println!("  colours:               {}", resolved.style.colours.entries().join(", "));
    println!("  shapes:                {} symbols", resolved.style.shapes.len());
    println!("  highlight colour:      {}", resolved.style.highlight_colour);
    println!("  marker size:           {}", resolved.style.marker_size);
    println!("  highlight marker size: {}", resolved.style.highlight_marker_size);
    println!();
    match resolved.sort {
        Some(ref sort) => println!("Sort: {}, {}", sort.primary, sort.secondary),
        None => println!("Sort: report default"),
    }
    match resolved.identity_columns {
        Some(ref columns) => println!("Identity columns: {}", columns.join(", ")),
        None => println!("Identity columns: report default"),
    }
    println!("Label priority: {}", resolved.label.priority.join(", "));
    println!();
    if resolved.cutoffs.is_empty() {
        println!("Cutoffs: none");
    } else {
        println!("Cutoffs:");
        for rule in &resolved.cutoffs {
            println!("  {:<28} {} {:?}", rule.header(), rule.column, rule.comparison);
        }
    }
}
