use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parentlab::{
    analysis::{self, Dataset, Selection},
    config::Config,
    load::{self, RawTable},
};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Non-parametric group comparisons for parenting study data")]
struct Cli {
    /// YAML file with lookup table, layout and analysis settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Resource root (overrides the config file and PARENTLAB_RESOURCES).
    #[arg(long, global = true)]
    resources: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the configured file names and/or column bounds as JSON.
    Files {
        #[arg(long, default_value = "both")]
        mode: String,
    },
    /// Load configured files and print their shapes and schemas.
    Load {
        #[arg(required = true)]
        names: Vec<String>,
        /// Header row per name, `none` for files without one.
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<Option<usize>>,
    },
    /// Compare the lookup table against the CSV files on disk.
    Scan,
    /// Run the pairwise analysis over one CSV and print the results as JSON.
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Column holding the treatment group.
        #[arg(long)]
        group: String,
        /// Keep rows where `column=value`.
        #[arg(long, value_parser = parse_filter)]
        filter: Option<(String, String)>,
        /// Columns that are not measures.
        #[arg(long)]
        exclude: Vec<String>,
        /// Also write the results to this Parquet file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_header(s: &str) -> Result<Option<usize>, String> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    s.parse::<usize>()
        .map(Some)
        .map_err(|e| format!("header must be a row index or 'none': {}", e))
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(c, v)| (c.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("filter must look like column=value, got '{}'", s))
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,parentlab=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ─── 2) configuration ────────────────────────────────────────────
    let config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Files { mode } => {
            let tree = config.file_tree().context("building lookup table")?;
            let info = tree.get_str(&mode)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Load { names, headers } => {
            let loader = config.loader(cli.resources.as_deref())?;
            let headers = (!headers.is_empty()).then_some(headers.as_slice());
            let frames = loader.load(&names, headers).context("loading files")?;
            for (name, batch) in names.iter().zip(&frames) {
                println!(
                    "{}: {} rows x {} columns",
                    name,
                    batch.num_rows(),
                    batch.num_columns()
                );
                for field in batch.schema().fields() {
                    println!("  {}: {}", field.name(), field.data_type());
                }
            }
        }
        Command::Scan => {
            let loader = config.loader(cli.resources.as_deref())?;
            let report = load::scan(&loader).context("scanning resources")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                warn!(
                    missing = report.missing.len(),
                    unconfigured = report.unconfigured.len(),
                    "resources out of sync"
                );
            }
        }
        Command::Analyze {
            input,
            group,
            filter,
            exclude,
            out,
        } => {
            let mut selection = Selection::group(group);
            if let Some((column, value)) = filter {
                selection = selection.filter(column, value);
            }
            for column in exclude {
                selection = selection.exclude(column);
            }

            let dataset = read_dataset(&input, &selection)?;
            let results = analysis::analyze(&dataset, &config.analysis)
                .with_context(|| format!("analyzing {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&results)?);

            if let Some(out) = out {
                analysis::write_parquet(&out, &results)
                    .with_context(|| format!("writing {}", out.display()))?;
            }
        }
    }

    info!("done");
    Ok(())
}

/// Analysis inputs carry their labels on the first row and keep every column.
fn read_dataset(path: &Path, selection: &Selection) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let batch = RawTable::read(BufReader::new(file), path, usize::MAX, Some(0))?
        .into_record_batch()?;
    if batch.num_rows() == 0 {
        bail!("{} has no data rows", path.display());
    }
    info!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "read analysis input"
    );
    Dataset::from_batch(&batch, selection)
        .with_context(|| format!("selecting columns from {}", path.display()))
}
