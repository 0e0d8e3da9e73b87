//! Binning period and observation time filtering.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BinningError, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// 2000-01-01T00:00:00Z, the origin of observation times.
pub fn mjd2000_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Days since 2000-01-01T00:00:00Z.
pub fn to_mjd2000(time: DateTime<Utc>) -> f64 {
    let delta = time - mjd2000_epoch();
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6 / SECONDS_PER_DAY,
        None => delta.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

/// Parse `yyyy-MM-dd` or `yyyy-MM-dd HH:mm:ss` as UTC.
pub fn parse_utc(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| {
            BinningError::invalid_parameter(
                "start_time",
                format!("'{}' is neither yyyy-MM-dd nor yyyy-MM-dd HH:mm:ss", text),
            )
        })
}

/// A time interval `[start, start + duration_days)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PeriodSpec", into = "PeriodSpec")]
pub struct DataPeriod {
    start: DateTime<Utc>,
    duration_days: f64,
    start_mjd: f64,
    end_mjd: f64,
}

#[derive(Serialize, Deserialize)]
struct PeriodSpec {
    start_time: String,
    duration_days: f64,
}

impl TryFrom<PeriodSpec> for DataPeriod {
    type Error = BinningError;

    fn try_from(spec: PeriodSpec) -> Result<Self> {
        DataPeriod::new(parse_utc(&spec.start_time)?, spec.duration_days)
    }
}

impl From<DataPeriod> for PeriodSpec {
    fn from(period: DataPeriod) -> Self {
        Self {
            start_time: period.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_days: period.duration_days,
        }
    }
}

impl DataPeriod {
    pub fn new(start: DateTime<Utc>, duration_days: f64) -> Result<Self> {
        if !(duration_days > 0.0) || !duration_days.is_finite() {
            return Err(BinningError::invalid_parameter(
                "duration_days",
                format!("must be a positive number, got {}", duration_days),
            ));
        }
        let start_mjd = to_mjd2000(start);
        Ok(Self {
            start,
            duration_days,
            start_mjd,
            end_mjd: start_mjd + duration_days,
        })
    }

    /// Parse the start time, see [`parse_utc`].
    pub fn parse(start_time: &str, duration_days: f64) -> Result<Self> {
        Self::new(parse_utc(start_time)?, duration_days)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration_days(&self) -> f64 {
        self.duration_days
    }

    pub fn start_mjd(&self) -> f64 {
        self.start_mjd
    }

    pub fn end_mjd(&self) -> f64 {
        self.end_mjd
    }

    pub fn contains(&self, mjd: f64) -> bool {
        mjd >= self.start_mjd && mjd < self.end_mjd
    }
}

/// Selects the observations that take part in binning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeFilter {
    /// Accept every observation.
    #[default]
    None,
    /// Accept observations within the period.
    TimeRange {
        #[serde(flatten)]
        period: DataPeriod,
    },
    /// Accept observations within the period measured in "data days".
    ///
    /// A data day starts at `min_data_hour` UTC on the 180° meridian, where
    /// the sensor has the fewest observations, and follows local solar time
    /// westwards. At longitude `lon` the period is shifted by
    /// `min_data_hour / 24 + (180 - lon) / 360` days, so pixels on both sides
    /// of the date line fall into different data days.
    SpatiotemporalDataDay {
        #[serde(flatten)]
        period: DataPeriod,
        min_data_hour: f64,
    },
}

impl TimeFilter {
    pub fn time_range(period: DataPeriod) -> Self {
        Self::TimeRange { period }
    }

    /// `min_data_hour` must lie in [0, 24].
    pub fn data_day(period: DataPeriod, min_data_hour: f64) -> Result<Self> {
        check_min_data_hour(min_data_hour)?;
        Ok(Self::SpatiotemporalDataDay {
            period,
            min_data_hour,
        })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SpatiotemporalDataDay { min_data_hour, .. } => {
                check_min_data_hour(*min_data_hour)
            }
            _ => Ok(()),
        }
    }

    /// Whether an observation taken at `mjd` on longitude `lon` is accepted.
    pub fn accepts(&self, lon: f64, mjd: f64) -> bool {
        match self {
            Self::None => true,
            Self::TimeRange { period } => period.contains(mjd),
            Self::SpatiotemporalDataDay {
                period,
                min_data_hour,
            } => period.contains(mjd - data_day_offset(lon, *min_data_hour)),
        }
    }
}

fn check_min_data_hour(hour: f64) -> Result<()> {
    if !(0.0..=24.0).contains(&hour) {
        return Err(BinningError::invalid_parameter(
            "min_data_hour",
            format!("must be within [0, 24], got {}", hour),
        ));
    }
    Ok(())
}

/// Days between UTC midnight and the data-day start at `lon`.
fn data_day_offset(lon: f64, min_data_hour: f64) -> f64 {
    // (-180, 180], the date line itself belongs to the western side
    let mut lon = lon % 360.0;
    if lon <= -180.0 {
        lon += 360.0;
    } else if lon > 180.0 {
        lon -= 360.0;
    }
    min_data_hour / 24.0 + (180.0 - lon) / 360.0
}

/// `none`, `<start_time>/<duration_days>` for a time range, e.g.
/// `2003-01-01/8`, or `<start_time>/<duration_days>/<min_data_hour>` for
/// data days, e.g. `2003-01-01/8/13.5`.
impl FromStr for TimeFilter {
    type Err = BinningError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(BinningError::config(format!(
                "time filter '{}' must be 'none', '<start_time>/<duration_days>' \
                 or '<start_time>/<duration_days>/<min_data_hour>'",
                s
            )));
        }
        let days: f64 = parts[1].trim().parse().map_err(|_| {
            BinningError::invalid_parameter(
                "duration_days",
                format!("'{}' is not a number", parts[1]),
            )
        })?;
        let period = DataPeriod::parse(parts[0], days)?;
        match parts.get(2) {
            None => Ok(Self::time_range(period)),
            Some(hour) => {
                let hour: f64 = hour.trim().parse().map_err(|_| {
                    BinningError::invalid_parameter(
                        "min_data_hour",
                        format!("'{}' is not a number", hour),
                    )
                })?;
                Self::data_day(period, hour)
            }
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::TimeRange { period } => write!(
                f,
                "{}/{}",
                period.start.format("%Y-%m-%d %H:%M:%S"),
                period.duration_days
            ),
            Self::SpatiotemporalDataDay {
                period,
                min_data_hour,
            } => write!(
                f,
                "{}/{}/{}",
                period.start.format("%Y-%m-%d %H:%M:%S"),
                period.duration_days,
                min_data_hour
            ),
        }
    }
}
