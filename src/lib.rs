#![forbid(unsafe_code)]

//! Fetch SEAS5 seasonal hindcasts and ERA5 monthly means from the Copernicus
//! Climate Data Store for a chosen set of target months.
//!
//! For target months such as June-August, the forecasts that cover them were
//! started in May, April and March. Each of those runs is requested with the
//! lead times that land on the target months (`leadtime_month` 2-4, 3-5 and
//! 4-6), one NetCDF file per year and initialization month. Files already on
//! disk are left alone, so an interrupted run can simply be restarted.
//!
//! **Quick start**
//! ```no_run
//! use cdsretrieve::{Area, Client, Seas5Options, TargetMonths, YearRange, retrieve_seas5};
//!
//! // Credentials come from CDSAPI_URL/CDSAPI_KEY or ~/.cdsapirc.
//! let client = Client::from_env()?;
//!
//! let mut opts = Seas5Options::new(
//!     vec!["2m_temperature".to_string()],
//!     TargetMonths::Consecutive(vec![6, 7, 8]),
//!     Area::from([70.0, -11.0, 30.0, 120.0]),
//!     "data/seas5",
//! );
//! opts.years = YearRange::new(1993, 2016)?;
//!
//! let summary = retrieve_seas5(&client, &opts)?;
//! println!("{} downloaded, {} already present", summary.requested, summary.skipped);
//! # Ok::<(), cdsretrieve::Error>(())
//! ```
//!
//! **Inspecting the schedule**
//! ```
//! use cdsretrieve::{InitSchedule, TargetMonths};
//!
//! let schedule = InitSchedule::new(&TargetMonths::Single(2), 6)?;
//! assert_eq!(schedule.init_months(), vec![1, 12, 11, 10, 9]);
//! assert!(schedule.crosses_year());
//! # Ok::<(), cdsretrieve::Error>(())
//! ```
//!
//! Notes:
//! - Data use is governed by the Copernicus licence accepted for each dataset
//!   on the CDS website; requests fail until it has been accepted.
//! - Large requests may sit in the CDS queue for a long time; set a client
//!   timeout if waiting indefinitely is not acceptable.

mod calendar;
mod client;
pub mod config;
mod error;
mod request;
mod retrieve;
mod sources;

pub use crate::calendar::{
    DEFAULT_MAX_LEAD_TIME, InitSchedule, Lookback, TargetMonths, YearInitPair, YearRange,
};
pub use crate::client::{Asset, Client, ClientOptions, JobState, JobStatus, RcFile, Retriever, rc_path};
pub use crate::error::{Error, Result};
pub use crate::request::{Request, RequestValue};
pub use crate::retrieve::{
    Area, Era5Options, PlannedRequest, Seas5Options, Summary, era5_path, era5_request, plan_seas5,
    retrieve_era5, retrieve_seas5, seas5_path, seas5_request,
};
pub use crate::sources::{ERA5_DATASET, SEAS5_DATASET};
