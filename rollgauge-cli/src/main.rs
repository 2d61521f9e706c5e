//! CLI for the rollgauge roll profile measurement engine.
//!
//! Provides commands for submitting measurements, paging through the stored
//! history, comparing a roll across capture dates, and printing the ideal
//! profile, all over a JSON-file-backed store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rollgauge::config::ProfileConfig;
use rollgauge::measurement::{RawSubmission, validate};
use rollgauge::profile::{deviation, round2};
use rollgauge::repository::RecordRepository;
use rollgauge::reshape::ComparisonReshaper;
use rollgauge::store::JsonFileStore;
use rollgauge::{DedupPolicy, ToleranceBand};

/// Roll profile measurement engine CLI.
#[derive(Parser)]
#[command(name = "rollgauge", version, about)]
struct Cli {
    /// Path to the store document.
    #[arg(long, global = true, default_value = "measurements.json")]
    store: PathBuf,

    /// Path to a deployment configuration JSON file. Without one, a default
    /// backup-roll deployment is used (7 positions, 1200-1400 mm band).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a measurement submission and append it to the store.
    Submit {
        /// Capture date (YYYY-MM-DD).
        #[arg(long)]
        date: chrono::NaiveDate,

        /// Roll identifier.
        #[arg(long)]
        roll_id: String,

        /// Diameter reading as `position=value`, e.g. `850=1304.20`.
        /// Repeatable; unmeasured positions are simply omitted.
        #[arg(long = "reading", value_name = "POS=VALUE")]
        readings: Vec<String>,

        /// Categorical attribute as `name=value`, e.g. `stand=F1`.
        #[arg(long = "attr", value_name = "NAME=VALUE")]
        attributes: Vec<String>,

        /// Dedup policy override for this append.
        #[arg(long)]
        dedup: Option<DedupArg>,
    },

    /// Display one page of the stored measurement table.
    List {
        /// 1-indexed page number; out-of-range pages clamp.
        #[arg(long, default_value = "1")]
        page: usize,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Pivot a roll's history across capture dates.
    Compare {
        /// Roll identifier.
        roll_id: String,

        /// Date labels to compare. Defaults to the most recently inserted
        /// date for the roll.
        #[arg(long = "date")]
        dates: Vec<String>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the ideal diameter curve, optionally against measured values.
    Ideal {
        /// Compare against this roll's stored readings.
        #[arg(long)]
        roll_id: Option<String>,

        /// Date label to take readings from; defaults to the most recently
        /// inserted date for the roll.
        #[arg(long)]
        date: Option<String>,
    },
}

/// Output format for tabular results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object.
    Json,
}

/// Dedup policy names for the command line.
#[derive(Clone, Copy, ValueEnum)]
enum DedupArg {
    Reject,
    Overwrite,
    Allow,
}

impl From<DedupArg> for DedupPolicy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Reject => DedupPolicy::Reject,
            DedupArg::Overwrite => DedupPolicy::Overwrite,
            DedupArg::Allow => DedupPolicy::Allow,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Submit {
            date,
            roll_id,
            readings,
            attributes,
            dedup,
        } => cmd_submit(
            &cli.store,
            cli.config.as_ref(),
            date,
            &roll_id,
            &readings,
            &attributes,
            dedup,
        ),
        Commands::List { page, format } => {
            cmd_list(&cli.store, cli.config.as_ref(), page, &format)
        }
        Commands::Compare {
            roll_id,
            dates,
            format,
        } => cmd_compare(&cli.store, cli.config.as_ref(), &roll_id, &dates, &format),
        Commands::Ideal { roll_id, date } => {
            cmd_ideal(&cli.store, cli.config.as_ref(), roll_id.as_deref(), date)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Loads the deployment configuration, falling back to a default
/// backup-roll deployment.
fn load_config(path: Option<&PathBuf>) -> Result<ProfileConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let data = std::fs::read_to_string(path)?;
            let config: ProfileConfig = serde_json::from_str(&data)?;
            config.validate()?;
            config
        }
        None => ProfileConfig::new(
            vec![100, 350, 600, 850, 1100, 1350, 1600],
            ToleranceBand::new(1200.0, 1400.0),
        )?,
    };
    Ok(config)
}

/// Parses a `key=value` argument pair.
fn split_pair<'a>(raw: &'a str, what: &str) -> Result<(&'a str, &'a str), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| format!("Invalid {what} '{raw}': expected KEY=VALUE"))
}

/// Implements `rollgauge submit`.
fn cmd_submit(
    store_path: &PathBuf,
    config_path: Option<&PathBuf>,
    date: chrono::NaiveDate,
    roll_id: &str,
    readings: &[String],
    attributes: &[String],
    dedup: Option<DedupArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    if let Some(policy) = dedup {
        config.dedup_policy = policy.into();
    }

    let mut reading_map = BTreeMap::new();
    for raw in readings {
        let (position, value) = split_pair(raw, "reading")?;
        let position: u32 = position
            .parse()
            .map_err(|_| format!("Invalid position '{position}' in '{raw}'"))?;
        reading_map.insert(position, value.to_string());
    }

    let mut attribute_map = BTreeMap::new();
    for raw in attributes {
        let (name, value) = split_pair(raw, "attribute")?;
        attribute_map.insert(name.to_string(), value.to_string());
    }

    let raw = RawSubmission {
        capture_date: date,
        roll_id: roll_id.to_string(),
        attributes: attribute_map,
        readings: reading_map,
    };

    // Report every violation in one pass rather than stopping at the first.
    let set = match validate(&raw, &config) {
        Ok(set) => set,
        Err(issues) => {
            eprintln!("Submission rejected with {} issue(s):", issues.len());
            for issue in &issues {
                eprintln!("  - {issue}");
            }
            std::process::exit(1);
        }
    };

    let store = JsonFileStore::open(store_path, &config)?;
    let mut repository = RecordRepository::new(store, config)?;
    repository.append(&set)?;

    println!(
        "Stored {} readings for roll {} on {}",
        set.readings.len(),
        set.roll_id,
        set.date_label()
    );
    Ok(())
}

/// Implements `rollgauge list`.
fn cmd_list(
    store_path: &PathBuf,
    config_path: Option<&PathBuf>,
    page_number: usize,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = JsonFileStore::open(store_path, &config)?;
    let repository = RecordRepository::new(store, config.clone())?;

    let page = repository.fetch_page(page_number)?;
    let header = repository.display_header();

    match format {
        OutputFormat::Csv => {
            println!(
                "# page {} of {} ({} rows total)",
                page.page_number, page.total_pages, page.total_rows
            );
            println!("{}", header.join(","));
            for record in &page.rows {
                let mut cells = vec![record.date_raw.clone(), record.roll_id.clone()];
                for attribute in &config.attributes {
                    cells.push(
                        record
                            .attributes
                            .get(&attribute.name)
                            .cloned()
                            .unwrap_or_default(),
                    );
                }
                for &position in &config.positions {
                    cells.push(
                        record
                            .readings
                            .get(&position)
                            .map(|v| format!("{v:.2}"))
                            .unwrap_or_default(),
                    );
                }
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = page
                .rows
                .iter()
                .map(|record| {
                    serde_json::json!({
                        "date": record.date_raw,
                        "roll_id": record.roll_id,
                        "attributes": record.attributes,
                        "readings": record
                            .readings
                            .iter()
                            .map(|(p, v)| (p.to_string(), *v))
                            .collect::<BTreeMap<String, f64>>(),
                    })
                })
                .collect();

            let output = serde_json::json!({
                "page": page.page_number,
                "total_pages": page.total_pages,
                "total_rows": page.total_rows,
                "rows": rows,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `rollgauge compare`.
fn cmd_compare(
    store_path: &PathBuf,
    config_path: Option<&PathBuf>,
    roll_id: &str,
    dates: &[String],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = JsonFileStore::open(store_path, &config)?;
    let repository = RecordRepository::new(store, config.clone())?;

    let records = repository.find_by_roll_id(roll_id)?;
    if records.is_empty() {
        return Err(format!("No records found for roll '{roll_id}'").into());
    }

    let reshaper = ComparisonReshaper::new(&config);
    let chosen = if dates.is_empty() {
        reshaper.default_dates(&records, roll_id)
    } else {
        dates.to_vec()
    };

    let series = reshaper.for_roll(&records, roll_id, &chosen);
    let pivot = reshaper.pivot(&series);
    let (axis_low, axis_high) = reshaper.axis_range(&series);

    match format {
        OutputFormat::Csv => {
            println!("# roll={}, axis={axis_low:.2}..{axis_high:.2}", series.roll_id);
            println!("position,{}", pivot.date_labels.join(","));
            for &position in &pivot.positions {
                let cells: Vec<String> = pivot
                    .date_labels
                    .iter()
                    .map(|label| {
                        pivot
                            .cell(position, label)
                            .map(|v| format!("{v:.2}"))
                            .unwrap_or_default()
                    })
                    .collect();
                println!("{position},{}", cells.join(","));
            }
        }
        OutputFormat::Json => {
            let columns: Vec<serde_json::Value> = pivot
                .date_labels
                .iter()
                .map(|label| {
                    let values: BTreeMap<String, f64> = pivot
                        .positions
                        .iter()
                        .filter_map(|&p| pivot.cell(p, label).map(|v| (p.to_string(), v)))
                        .collect();
                    serde_json::json!({ "date": label, "readings": values })
                })
                .collect();

            let output = serde_json::json!({
                "roll_id": series.roll_id,
                "positions": pivot.positions,
                "axis": { "low": axis_low, "high": axis_high },
                "dates": columns,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `rollgauge ideal`.
fn cmd_ideal(
    store_path: &PathBuf,
    config_path: Option<&PathBuf>,
    roll_id: Option<&str>,
    date: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let Some(geometry) = config.geometry else {
        return Err("No taper geometry in the configuration; add a `geometry` section".into());
    };

    let Some(roll_id) = roll_id else {
        // No roll to compare: just print the curve.
        println!("position,ideal");
        for (&position, value) in config.positions.iter().zip(geometry.ideal_curve(&config.positions)) {
            println!("{position},{value:.2}");
        }
        return Ok(());
    };

    let store = JsonFileStore::open(store_path, &config)?;
    let repository = RecordRepository::new(store, config.clone())?;
    let records = repository.find_by_roll_id(roll_id)?;
    if records.is_empty() {
        return Err(format!("No records found for roll '{roll_id}'").into());
    }

    let reshaper = ComparisonReshaper::new(&config);
    let chosen = match date {
        Some(date) => vec![date],
        None => reshaper.default_dates(&records, roll_id),
    };
    let series = reshaper.for_roll(&records, roll_id, &chosen);
    if series.points.is_empty() {
        return Err(format!(
            "No readings for roll '{roll_id}' on {}",
            chosen.join(", ")
        )
        .into());
    }

    let readings: BTreeMap<u32, f64> = series
        .points
        .iter()
        .map(|p| (p.position, p.diameter))
        .collect();
    let points = deviation(&readings, &config.positions, &geometry);

    println!("# roll={}, date={}", series.roll_id, chosen.join(", "));
    println!("position,measured,ideal,deviation");
    for point in points {
        println!(
            "{},{:.2},{:.2},{:.2}",
            point.position,
            round2(point.measured),
            point.ideal,
            point.deviation
        );
    }

    Ok(())
}
