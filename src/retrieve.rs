use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::calendar::{DEFAULT_MAX_LEAD_TIME, InitSchedule, TargetMonths, YearInitPair, YearRange, month_of};
use crate::client::Retriever;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::sources::{ERA5_DATASET, SEAS5_DATASET};

/// Bounding box in degrees, sent as `[north, west, south, east]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct Area {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl Area {
    pub const GLOBAL: Area = Area {
        north: 90.0,
        west: -180.0,
        south: -90.0,
        east: 180.0,
    };
}

impl From<[f64; 4]> for Area {
    fn from([north, west, south, east]: [f64; 4]) -> Self {
        Self {
            north,
            west,
            south,
            east,
        }
    }
}

impl From<Area> for [f64; 4] {
    fn from(a: Area) -> Self {
        [a.north, a.west, a.south, a.east]
    }
}

/// Accepts `"N,W,S,E"`, e.g. `"70,-11,30,120"`.
impl FromStr for Area {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidRequest(format!("invalid area: {s}")))
            })
            .collect::<Result<Vec<f64>>>()?;
        let coords: [f64; 4] = parts
            .try_into()
            .map_err(|_| Error::InvalidRequest(format!("area needs north,west,south,east: {s}")))?;
        Ok(coords.into())
    }
}

/// Everything needed to fetch SEAS5 hindcasts covering `target_months`.
#[derive(Debug, Clone, PartialEq)]
pub struct Seas5Options {
    pub variables: Vec<String>,
    pub target_months: TargetMonths,
    pub area: Area,
    pub folder: PathBuf,
    /// Base years; year-crossing schedules shift early init months forward.
    pub years: YearRange,
    pub system: u32,
    pub max_lead_time: u32,
}

impl Seas5Options {
    pub const DEFAULT_YEARS: YearRange = YearRange {
        first: 1981,
        last: 2016,
    };
    pub const DEFAULT_SYSTEM: u32 = 5;

    pub fn new(
        variables: Vec<String>,
        target_months: TargetMonths,
        area: Area,
        folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            variables,
            target_months,
            area,
            folder: folder.into(),
            years: Self::DEFAULT_YEARS,
            system: Self::DEFAULT_SYSTEM,
            max_lead_time: DEFAULT_MAX_LEAD_TIME,
        }
    }
}

/// Options for the yearly ERA5 monthly-mean files.
#[derive(Debug, Clone, PartialEq)]
pub struct Era5Options {
    pub variables: Vec<String>,
    pub folder: PathBuf,
    pub grid: [f64; 2],
    pub months: Vec<u32>,
    pub area: Area,
    pub years: YearRange,
}

impl Era5Options {
    pub const DEFAULT_YEARS: YearRange = YearRange {
        first: 1979,
        last: 2020,
    };
    /// Matches the SEAS5 1x1 degree grid.
    pub const DEFAULT_GRID: [f64; 2] = [1.0, 1.0];

    pub fn new(variables: Vec<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            variables,
            folder: folder.into(),
            grid: Self::DEFAULT_GRID,
            months: (1..=12).collect(),
            area: Area::GLOBAL,
            years: Self::DEFAULT_YEARS,
        }
    }
}

/// One forecast file: which year and init month, the lead times to ask for,
/// and where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub pair: YearInitPair,
    pub lead_times: Vec<u32>,
    pub target: PathBuf,
}

impl fmt::Display for PlannedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "year = {} init_month = {} leadtime_month = {:?}",
            self.pair.year, self.pair.init_month, self.lead_times
        )
    }
}

/// Outcome counts of one enumeration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub requested: usize,
    pub skipped: usize,
}

pub fn seas5_path(folder: &Path, pair: YearInitPair) -> PathBuf {
    folder.join(format!("{}{:02}.nc", pair.year, pair.init_month))
}

pub fn era5_path(folder: &Path, year: i32) -> PathBuf {
    folder.join(format!("ERA5_{year}.nc"))
}

/// Every SEAS5 file the target months need, in download order. No I/O.
pub fn plan_seas5(
    target_months: &TargetMonths,
    years: YearRange,
    max_lead_time: u32,
    folder: &Path,
) -> Result<Vec<PlannedRequest>> {
    let schedule = InitSchedule::new(target_months, max_lead_time)?;
    if schedule.is_empty() {
        warn!(%target_months, max_lead_time, "no initialization month reaches these target months");
    }
    debug!(
        target = ?target_months.names(),
        init_months = ?schedule.init_months(),
        crosses_year = schedule.crosses_year(),
        "initialization schedule"
    );

    Ok(schedule
        .pairs(years)
        .into_iter()
        .map(|(pair, lookback)| PlannedRequest {
            pair,
            lead_times: lookback.lead_times.clone(),
            target: seas5_path(folder, pair),
        })
        .collect())
}

pub fn seas5_request(opts: &Seas5Options, planned: &PlannedRequest) -> Request {
    Request::new()
        .format("netcdf")
        .originating_centre("ecmwf")
        .system(opts.system)
        .variable(opts.variables.as_slice())
        .product_type(["monthly_mean"])
        .year(planned.pair.year.to_string())
        .month(format!("{:02}", planned.pair.init_month))
        .leadtime_month(
            planned
                .lead_times
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>(),
        )
        .area(<[f64; 4]>::from(opts.area))
}

pub fn era5_request(opts: &Era5Options, year: i32) -> Request {
    Request::new()
        .format("netcdf")
        .product_type("monthly_averaged_reanalysis")
        .variable(opts.variables.as_slice())
        .area(<[f64; 4]>::from(opts.area))
        .grid(opts.grid)
        .year(year.to_string())
        .month(
            opts.months
                .iter()
                .map(|m| format!("{m:02}"))
                .collect::<Vec<_>>(),
        )
        .time("00:00")
}

/// Fetch every missing SEAS5 file for `opts`.
///
/// Files already in `opts.folder` are skipped. The first retriever error
/// aborts the run.
pub fn retrieve_seas5<R: Retriever + ?Sized>(retriever: &R, opts: &Seas5Options) -> Result<Summary> {
    check_variables(&opts.variables)?;
    let plan = plan_seas5(&opts.target_months, opts.years, opts.max_lead_time, &opts.folder)?;

    let mut summary = Summary::default();
    for planned in &plan {
        fetch_unless_present(retriever, SEAS5_DATASET, &planned.target, &mut summary, || {
            seas5_request(opts, planned)
        })?;
    }

    info!(requested = summary.requested, skipped = summary.skipped, "SEAS5 retrieval finished");
    Ok(summary)
}

/// Fetch one ERA5 file per year unless it is already in `opts.folder`.
pub fn retrieve_era5<R: Retriever + ?Sized>(retriever: &R, opts: &Era5Options) -> Result<Summary> {
    check_variables(&opts.variables)?;
    for &m in &opts.months {
        month_of(m)?;
    }

    let mut summary = Summary::default();
    for year in opts.years.iter() {
        let target = era5_path(&opts.folder, year);
        fetch_unless_present(retriever, ERA5_DATASET, &target, &mut summary, || {
            era5_request(opts, year)
        })?;
    }

    info!(requested = summary.requested, skipped = summary.skipped, "ERA5 retrieval finished");
    Ok(summary)
}

fn fetch_unless_present<R, F>(
    retriever: &R,
    dataset: &str,
    target: &Path,
    summary: &mut Summary,
    build: F,
) -> Result<()>
where
    R: Retriever + ?Sized,
    F: FnOnce() -> Request,
{
    if target.exists() {
        debug!(target = %target.display(), "already downloaded");
        summary.skipped += 1;
        return Ok(());
    }

    info!(dataset, target = %target.display(), "retrieving");
    retriever.retrieve(dataset, &build(), target)?;
    summary.requested += 1;
    Ok(())
}

fn check_variables(variables: &[String]) -> Result<()> {
    if variables.iter().all(|v| v.trim().is_empty()) {
        return Err(Error::InvalidRequest("at least one variable is required".into()));
    }
    Ok(())
}
