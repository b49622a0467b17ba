//! Layered settings: built-in defaults, then an optional TOML file, then
//! `CDSRETRIEVE_*` environment variables (e.g. `CDSRETRIEVE_CLIENT__KEY`).
//!
//! ```toml
//! [client]
//! poll_interval_secs = 10
//!
//! [seas5]
//! variables = ["2m_temperature", "total_precipitation"]
//! target_months = [6, 7, 8]
//! area = [70, -11, 30, 120]
//! folder = "data/seas5"
//! years = { first = 1981, last = 2016 }
//!
//! [era5]
//! variables = ["2m_temperature"]
//! folder = "data/era5"
//! grid = [0.25, 0.25]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::calendar::{DEFAULT_MAX_LEAD_TIME, TargetMonths, YearRange};
use crate::client::ClientOptions;
use crate::error::{Error, Result};
use crate::retrieve::{Area, Era5Options, Seas5Options};

pub const ENV_PREFIX: &str = "CDSRETRIEVE";

/// Default file name looked up in the working directory (`cdsretrieve.toml`).
pub const DEFAULT_FILE: &str = "cdsretrieve";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub seas5: Seas5Settings,

    #[serde(default)]
    pub era5: Era5Settings,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; without one,
    /// `cdsretrieve.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };

        let cfg = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

/// API endpoint and polling. Unset `url`/`key` fall back to `CDSAPI_URL`,
/// `CDSAPI_KEY` and `~/.cdsapirc`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub verify_tls: Option<bool>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum wait for one job, unset waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

const fn default_poll_interval() -> u64 {
    5
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            verify_tls: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: None,
        }
    }
}

impl ClientSettings {
    /// Overlay these settings on the rc file / environment credentials.
    pub fn client_options(&self) -> Result<ClientOptions> {
        let mut opts = ClientOptions::from_env()?;
        self.apply(&mut opts);
        Ok(opts)
    }

    fn apply(&self, opts: &mut ClientOptions) {
        if let Some(url) = &self.url {
            opts.source = url.clone();
        }
        if let Some(key) = &self.key {
            opts.key = Some(key.clone());
        }
        if let Some(verify) = self.verify_tls {
            opts.verify_tls = verify;
        }
        opts.poll_interval = Duration::from_secs(self.poll_interval_secs);
        opts.timeout = self.timeout_secs.map(Duration::from_secs);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Seas5Settings {
    #[serde(default)]
    pub variables: Vec<String>,

    #[serde(default)]
    pub target_months: Option<TargetMonths>,

    #[serde(default)]
    pub area: Option<Area>,

    #[serde(default)]
    pub folder: Option<PathBuf>,

    #[serde(default = "default_seas5_years")]
    pub years: YearRange,

    #[serde(default = "default_system")]
    pub system: u32,

    #[serde(default = "default_max_lead_time")]
    pub max_lead_time: u32,
}

const fn default_seas5_years() -> YearRange {
    Seas5Options::DEFAULT_YEARS
}

const fn default_system() -> u32 {
    Seas5Options::DEFAULT_SYSTEM
}

const fn default_max_lead_time() -> u32 {
    DEFAULT_MAX_LEAD_TIME
}

impl Default for Seas5Settings {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            target_months: None,
            area: None,
            folder: None,
            years: default_seas5_years(),
            system: default_system(),
            max_lead_time: default_max_lead_time(),
        }
    }
}

impl Seas5Settings {
    pub fn into_options(self) -> Result<Seas5Options> {
        let target_months = self.target_months.ok_or_else(|| missing("seas5", "target_months"))?;
        let area = self.area.ok_or_else(|| missing("seas5", "area"))?;
        let folder = self.folder.ok_or_else(|| missing("seas5", "folder"))?;

        Ok(Seas5Options {
            variables: self.variables,
            target_months,
            area,
            folder,
            years: self.years,
            system: self.system,
            max_lead_time: self.max_lead_time,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Era5Settings {
    #[serde(default)]
    pub variables: Vec<String>,

    #[serde(default)]
    pub folder: Option<PathBuf>,

    #[serde(default = "default_grid")]
    pub grid: [f64; 2],

    #[serde(default = "default_months")]
    pub months: Vec<u32>,

    #[serde(default = "default_area")]
    pub area: Area,

    #[serde(default = "default_era5_years")]
    pub years: YearRange,
}

const fn default_grid() -> [f64; 2] {
    Era5Options::DEFAULT_GRID
}

fn default_months() -> Vec<u32> {
    (1..=12).collect()
}

const fn default_area() -> Area {
    Area::GLOBAL
}

const fn default_era5_years() -> YearRange {
    Era5Options::DEFAULT_YEARS
}

impl Default for Era5Settings {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            folder: None,
            grid: default_grid(),
            months: default_months(),
            area: default_area(),
            years: default_era5_years(),
        }
    }
}

impl Era5Settings {
    pub fn into_options(self) -> Result<Era5Options> {
        let folder = self.folder.ok_or_else(|| missing("era5", "folder"))?;
        Ok(Era5Options {
            variables: self.variables,
            folder,
            grid: self.grid,
            months: self.months,
            area: self.area,
            years: self.years,
        })
    }
}

fn missing(section: &str, key: &str) -> Error {
    Error::InvalidRequest(format!("missing {section}.{key} (set it in the config file or on the command line)"))
}
