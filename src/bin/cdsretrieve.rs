//! cdsretrieve CLI
//!
//! Plan and download SEAS5 hindcasts and ERA5 monthly means.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use cdsretrieve::config::{Era5Settings, Seas5Settings, Settings};
use cdsretrieve::{
    Area, Client, DEFAULT_MAX_LEAD_TIME, TargetMonths, YearRange, plan_seas5, retrieve_era5,
    retrieve_seas5,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cdsretrieve")]
#[command(author, version, about = "Download SEAS5 and ERA5 data from the Copernicus Climate Data Store", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (default: ./cdsretrieve.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print year, initialization month and lead times for target months
    Plan {
        /// Target month(s), e.g. 6 or 6,7,8
        #[arg(short, long)]
        target_months: TargetMonths,

        /// Years, e.g. 1981-1982
        #[arg(short, long, default_value = "1981-1982")]
        years: YearRange,

        /// Largest lead time month available
        #[arg(long, default_value_t = DEFAULT_MAX_LEAD_TIME)]
        max_lead_time: u32,
    },

    /// Download SEAS5 seasonal hindcasts
    Seas5(Seas5Args),

    /// Download ERA5 monthly means, one file per year
    Era5(Era5Args),
}

#[derive(Args)]
struct Seas5Args {
    /// Variables, comma separated
    #[arg(long, value_delimiter = ',')]
    variables: Vec<String>,

    /// Target month(s), e.g. 6 or 6,7,8
    #[arg(short, long)]
    target_months: Option<TargetMonths>,

    /// North,West,South,East
    #[arg(short, long, allow_hyphen_values = true)]
    area: Option<Area>,

    /// Output folder
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Years, e.g. 1981-2016
    #[arg(short, long)]
    years: Option<YearRange>,

    /// Forecast system number
    #[arg(long)]
    system: Option<u32>,

    /// Largest lead time month available
    #[arg(long)]
    max_lead_time: Option<u32>,

    /// Print what would be downloaded without contacting the CDS
    #[arg(long)]
    dry_run: bool,
}

impl Seas5Args {
    fn overlay(self, mut s: Seas5Settings) -> Seas5Settings {
        if !self.variables.is_empty() {
            s.variables = self.variables;
        }
        s.target_months = self.target_months.or(s.target_months);
        s.area = self.area.or(s.area);
        s.folder = self.folder.or(s.folder);
        s.years = self.years.unwrap_or(s.years);
        s.system = self.system.unwrap_or(s.system);
        s.max_lead_time = self.max_lead_time.unwrap_or(s.max_lead_time);
        s
    }
}

#[derive(Args)]
struct Era5Args {
    /// Variables, comma separated
    #[arg(long, value_delimiter = ',')]
    variables: Vec<String>,

    /// Output folder
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Grid spacing in degrees, e.g. 0.25,0.25
    #[arg(short, long, value_delimiter = ',')]
    grid: Vec<f64>,

    /// Months, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    months: Vec<u32>,

    /// North,West,South,East
    #[arg(short, long, allow_hyphen_values = true)]
    area: Option<Area>,

    /// Years, e.g. 1979-2020
    #[arg(short, long)]
    years: Option<YearRange>,

    /// Print what would be downloaded without contacting the CDS
    #[arg(long)]
    dry_run: bool,
}

impl Era5Args {
    fn overlay(self, mut s: Era5Settings) -> anyhow::Result<Era5Settings> {
        if !self.variables.is_empty() {
            s.variables = self.variables;
        }
        if !self.grid.is_empty() {
            let Ok(grid) = <[f64; 2]>::try_from(self.grid.as_slice()) else {
                bail!("--grid needs two values, got {:?}", self.grid);
            };
            s.grid = grid;
        }
        if !self.months.is_empty() {
            s.months = self.months;
        }
        s.folder = self.folder.or(s.folder);
        s.area = self.area.unwrap_or(s.area);
        s.years = self.years.unwrap_or(s.years);
        Ok(s)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter_from_verbosity(cli.verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Plan {
            target_months,
            years,
            max_lead_time,
        } => {
            let plan = plan_seas5(&target_months, years, max_lead_time, Path::new(""))?;
            for planned in plan {
                println!("{planned}");
            }
        }

        Commands::Seas5(args) => {
            let settings = load_settings(config)?;
            let dry_run = args.dry_run;
            let opts = args.overlay(settings.seas5).into_options()?;

            if dry_run {
                let plan = plan_seas5(&opts.target_months, opts.years, opts.max_lead_time, &opts.folder)?;
                for planned in plan {
                    let state = if planned.target.exists() { "present" } else { "missing" };
                    println!("{planned} -> {} ({state})", planned.target.display());
                }
                return Ok(());
            }

            let client = Client::new(settings.client.client_options()?).context("creating CDS client")?;
            let summary = retrieve_seas5(&client, &opts)?;
            println!(
                "SEAS5: {} downloaded, {} already present in {}",
                summary.requested,
                summary.skipped,
                opts.folder.display()
            );
        }

        Commands::Era5(args) => {
            let settings = load_settings(config)?;
            let dry_run = args.dry_run;
            let opts = args.overlay(settings.era5)?.into_options()?;

            if dry_run {
                for year in opts.years.iter() {
                    let target = cdsretrieve::era5_path(&opts.folder, year);
                    let state = if target.exists() { "present" } else { "missing" };
                    println!("year = {year} -> {} ({state})", target.display());
                }
                return Ok(());
            }

            let client = Client::new(settings.client.client_options()?).context("creating CDS client")?;
            let summary = retrieve_era5(&client, &opts)?;
            println!(
                "ERA5: {} downloaded, {} already present in {}",
                summary.requested,
                summary.skipped,
                opts.folder.display()
            );
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    Settings::load(path).context("loading settings")
}

const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
