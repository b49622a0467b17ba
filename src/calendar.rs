use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest `leadtime_month` published for SEAS5 monthly means.
pub const DEFAULT_MAX_LEAD_TIME: u32 = 6;

/// Calendar month(s) of interest, either one month or a consecutive run.
///
/// In config files this is written as `target_months = 6` or
/// `target_months = [6, 7, 8]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetMonths {
    Single(u32),
    Consecutive(Vec<u32>),
}

impl TargetMonths {
    pub fn months(&self) -> &[u32] {
        match self {
            TargetMonths::Single(m) => std::slice::from_ref(m),
            TargetMonths::Consecutive(ms) => ms,
        }
    }

    /// Check month range and, for lists, that the months are strictly
    /// consecutive and increasing. A single month skips the consecutiveness
    /// check.
    pub fn validate(&self) -> Result<()> {
        for &m in self.months() {
            month_of(m)?;
        }
        if let TargetMonths::Consecutive(ms) = self {
            if ms.is_empty() {
                return Err(Error::EmptyTargetMonths);
            }
            if !ms.windows(2).all(|w| w[1] == w[0] + 1) {
                return Err(Error::NonConsecutiveMonths(ms.clone()));
            }
        }
        Ok(())
    }

    /// English month names, e.g. `["June", "July", "August"]`.
    pub fn names(&self) -> Vec<&'static str> {
        self.months()
            .iter()
            .filter_map(|&m| month_of(m).ok())
            .map(|m| m.name())
            .collect()
    }
}

impl From<u32> for TargetMonths {
    fn from(value: u32) -> Self {
        TargetMonths::Single(value)
    }
}

impl From<Vec<u32>> for TargetMonths {
    fn from(value: Vec<u32>) -> Self {
        TargetMonths::Consecutive(value)
    }
}

impl<const N: usize> From<[u32; N]> for TargetMonths {
    fn from(value: [u32; N]) -> Self {
        TargetMonths::Consecutive(value.to_vec())
    }
}

/// Accepts `"6"`, `"6,7,8"` and `"[6, 7, 8]"`.
impl FromStr for TargetMonths {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut t = s.trim();
        let bracketed = t.starts_with('[') && t.ends_with(']') && t.len() >= 2;
        if bracketed {
            t = t[1..t.len() - 1].trim();
        }

        let mut months = Vec::new();
        for item in t.split(',').map(str::trim).filter(|x| !x.is_empty()) {
            let m = item
                .parse::<u32>()
                .map_err(|_| Error::InvalidRequest(format!("invalid month: {item}")))?;
            months.push(m);
        }

        match months.as_slice() {
            [m] if !bracketed => Ok(TargetMonths::Single(*m)),
            _ => Ok(TargetMonths::Consecutive(months)),
        }
    }
}

impl fmt::Display for TargetMonths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMonths::Single(m) => write!(f, "{m}"),
            TargetMonths::Consecutive(ms) => write!(f, "{ms:?}"),
        }
    }
}

pub fn month_of(m: u32) -> Result<Month> {
    u8::try_from(m)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or(Error::MonthOutOfRange(m))
}

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    pub fn new(first: i32, last: i32) -> Result<Self> {
        if last < first {
            return Err(Error::InvalidRequest(format!(
                "year range end {last} < start {first}"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn iter(&self) -> RangeInclusive<i32> {
        self.first..=self.last
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Accepts `"1981"` or `"1981-2016"`.
impl FromStr for YearRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|_| Error::InvalidRequest(format!("invalid year range: {s}")))
        };
        match s.split_once('-') {
            Some((a, b)) => Self::new(parse(a)?, parse(b)?),
            None => {
                let y = parse(s)?;
                Self::new(y, y)
            }
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// One forecast initialization and the lead times that land on the target
/// months, in target order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookback {
    pub init_month: u32,
    pub lead_times: Vec<u32>,
}

/// (calendar year, init month) identifying one retrievable forecast file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearInitPair {
    pub year: i32,
    pub init_month: u32,
}

/// Initialization months and lead times covering a set of target months.
///
/// Lookback `x` (1, 2, ...) starts `x` months before the first target month.
/// The init month itself is lead time 1, so the first target month is lead
/// time `x + 1` for that lookback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSchedule {
    first_target: u32,
    lookbacks: Vec<Lookback>,
}

impl InitSchedule {
    pub fn new(target: &TargetMonths, max_lead_time: u32) -> Result<Self> {
        target.validate()?;
        if !(1..=12).contains(&max_lead_time) {
            return Err(Error::InvalidRequest(format!(
                "max lead time must be within 1..=12, got {max_lead_time}"
            )));
        }

        let months = target.months();
        let first = months[0];
        let len = months.len() as u32;

        let lookbacks = (1..=max_lead_time.saturating_sub(len))
            .map(|x| Lookback {
                init_month: months_before(first, x),
                lead_times: (x + 1..=x + len).collect(),
            })
            .collect();

        Ok(Self {
            first_target: first,
            lookbacks,
        })
    }

    pub fn lookbacks(&self) -> &[Lookback] {
        &self.lookbacks
    }

    pub fn init_months(&self) -> Vec<u32> {
        self.lookbacks.iter().map(|l| l.init_month).collect()
    }

    pub fn lead_times(&self) -> Vec<Vec<u32>> {
        self.lookbacks.iter().map(|l| l.lead_times.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lookbacks.is_empty()
    }

    /// True when the init months run from January back into December.
    pub fn crosses_year(&self) -> bool {
        let has = |m: u32| self.lookbacks.iter().any(|l| l.init_month == m);
        has(1) && has(12)
    }

    /// Calendar year of `init_month` for runs targeting `base_year`'s season.
    /// Once the schedule wraps, init months before the first target month sit
    /// in the following year together with the target.
    pub fn year_for(&self, base_year: i32, init_month: u32) -> i32 {
        if self.crosses_year() && init_month < self.first_target {
            base_year + 1
        } else {
            base_year
        }
    }

    /// Base years to iterate. A year-crossing schedule leaves out the last
    /// year so that shifted init years stay inside `years`.
    pub fn base_years(&self, years: YearRange) -> RangeInclusive<i32> {
        if self.crosses_year() {
            years.first..=years.last - 1
        } else {
            years.iter()
        }
    }

    /// Every (year, init month) to fetch, paired with its lookback, ordered by
    /// base year then lookback distance.
    pub fn pairs(&self, years: YearRange) -> Vec<(YearInitPair, &Lookback)> {
        self.base_years(years)
            .flat_map(|base| {
                self.lookbacks.iter().map(move |l| {
                    let pair = YearInitPair {
                        year: self.year_for(base, l.init_month),
                        init_month: l.init_month,
                    };
                    (pair, l)
                })
            })
            .collect()
    }
}

fn months_before(month: u32, x: u32) -> u32 {
    let raw = month + 12 - x;
    if raw > 12 { raw - 12 } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(target: TargetMonths) -> InitSchedule {
        InitSchedule::new(&target, DEFAULT_MAX_LEAD_TIME).unwrap()
    }

    fn single(m: u32) -> TargetMonths {
        TargetMonths::Single(m)
    }

    fn list(ms: &[u32]) -> TargetMonths {
        TargetMonths::Consecutive(ms.to_vec())
    }

    #[test]
    fn june_looks_back_five_months() {
        let s = schedule(single(6));
        assert_eq!(s.init_months(), vec![5, 4, 3, 2, 1]);
        assert_eq!(s.lead_times()[0], vec![2]);
        assert_eq!(s.lead_times()[4], vec![6]);
        assert!(!s.crosses_year());
    }

    #[test]
    fn june_with_seven_lead_times_wraps_to_december() {
        let s = InitSchedule::new(&TargetMonths::Single(6), 7).unwrap();
        assert_eq!(s.init_months(), vec![5, 4, 3, 2, 1, 12]);
        assert_eq!(s.lead_times()[0], vec![2]);
        assert_eq!(s.lead_times()[5], vec![7]);
        assert!(s.crosses_year());
    }

    #[test]
    fn jja_has_three_lookbacks_of_three() {
        let s = schedule(list(&[6, 7, 8]));
        assert_eq!(s.init_months(), vec![5, 4, 3]);
        assert_eq!(s.lead_times(), vec![vec![2, 3, 4], vec![3, 4, 5], vec![4, 5, 6]]);
        assert_eq!(s.init_months().len(), s.lead_times().len());
    }

    #[test]
    fn single_month_matches_singleton_list() {
        assert_eq!(schedule(single(2)), schedule(list(&[2])));
    }

    #[test]
    fn february_crosses_year() {
        let s = schedule(single(2));
        assert_eq!(s.init_months(), vec![1, 12, 11, 10, 9]);
        assert!(s.crosses_year());
        assert_eq!(s.year_for(1981, 1), 1982);
        assert_eq!(s.year_for(1981, 12), 1981);
        assert_eq!(s.year_for(1981, 9), 1981);
    }

    #[test]
    fn january_to_march_all_initialized_in_previous_year() {
        let s = schedule(list(&[1, 2, 3]));
        assert_eq!(s.init_months(), vec![12, 11, 10]);
        assert!(!s.crosses_year());
        assert_eq!(s.year_for(1990, 12), 1990);
    }

    #[test]
    fn crossing_detection_uses_months_not_digits() {
        // 11 followed by 2 would read "112" when concatenated.
        let s = InitSchedule {
            first_target: 4,
            lookbacks: vec![
                Lookback { init_month: 11, lead_times: vec![2] },
                Lookback { init_month: 2, lead_times: vec![3] },
            ],
        };
        assert!(!s.crosses_year());
    }

    #[test]
    fn non_consecutive_months_are_rejected() {
        let err = InitSchedule::new(&list(&[5, 7]), 6).unwrap_err();
        assert!(matches!(err, Error::NonConsecutiveMonths(ref ms) if ms == &vec![5, 7]));

        let err = list(&[11, 12, 1]).validate().unwrap_err();
        assert!(matches!(err, Error::NonConsecutiveMonths(_)));
    }

    #[test]
    fn out_of_range_and_empty_are_rejected() {
        assert!(matches!(
            TargetMonths::Single(13).validate(),
            Err(Error::MonthOutOfRange(13))
        ));
        assert!(matches!(
            TargetMonths::Consecutive(vec![]).validate(),
            Err(Error::EmptyTargetMonths)
        ));
        assert!(InitSchedule::new(&TargetMonths::Single(6), 0).is_err());
    }

    #[test]
    fn six_target_months_leave_no_lookback() {
        let s = schedule(list(&[1, 2, 3, 4, 5, 6]));
        assert!(s.is_empty());
    }

    #[test]
    fn pairs_shift_years_and_drop_last_base_year_when_crossing() {
        let s = schedule(single(2));
        let years = YearRange::new(1981, 1983).unwrap();
        let pairs: Vec<YearInitPair> = s.pairs(years).into_iter().map(|(p, _)| p).collect();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0], YearInitPair { year: 1982, init_month: 1 });
        assert_eq!(pairs[1], YearInitPair { year: 1981, init_month: 12 });
        assert_eq!(pairs[5], YearInitPair { year: 1983, init_month: 1 });
        assert!(pairs.iter().all(|p| p.year <= 1983));
    }

    #[test]
    fn long_lookback_keeps_one_target_year_per_base_year() {
        // July with eight lead months reaches back to December, past June.
        let s = InitSchedule::new(&single(7), 8).unwrap();
        assert_eq!(s.init_months(), vec![6, 5, 4, 3, 2, 1, 12]);
        assert!(s.crosses_year());

        let pairs = s.pairs(YearRange::new(1981, 1982).unwrap());
        assert_eq!(pairs.len(), 7);
        let target_years: Vec<i32> = pairs
            .iter()
            .map(|(p, l)| {
                let month0 = p.init_month - 1 + l.lead_times[0] - 1;
                p.year + (month0 / 12) as i32
            })
            .collect();
        assert!(target_years.iter().all(|&y| y == 1982), "{target_years:?}");
        assert_eq!(pairs[0].0, YearInitPair { year: 1982, init_month: 6 });
        assert_eq!(pairs[6].0, YearInitPair { year: 1981, init_month: 12 });
    }

    #[test]
    fn pairs_use_every_year_without_crossing() {
        let s = schedule(list(&[6, 7, 8]));
        let pairs = s.pairs(YearRange::new(1981, 1982).unwrap());
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().take(3).all(|(p, _)| p.year == 1981));
        assert_eq!(pairs[3].1.lead_times, vec![2, 3, 4]);
    }

    #[test]
    fn parses_target_months() {
        assert_eq!("6".parse::<TargetMonths>().unwrap(), TargetMonths::Single(6));
        assert_eq!(
            "6,7,8".parse::<TargetMonths>().unwrap(),
            TargetMonths::Consecutive(vec![6, 7, 8])
        );
        assert_eq!(
            "[6]".parse::<TargetMonths>().unwrap(),
            TargetMonths::Consecutive(vec![6])
        );
        assert!("jun".parse::<TargetMonths>().is_err());
        assert_eq!(list(&[6, 7, 8]).names(), vec!["June", "July", "August"]);
    }

    #[test]
    fn parses_year_ranges() {
        assert_eq!("1981-2016".parse::<YearRange>().unwrap(), YearRange { first: 1981, last: 2016 });
        assert_eq!("1993".parse::<YearRange>().unwrap().len(), 1);
        assert!("2016-1981".parse::<YearRange>().is_err());
    }
}
