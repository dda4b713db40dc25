//! Fixed-window aggregation of the hourly series
//!
//! Windows start at local midnight. An hour belongs to the window whose range
//! contains it, lower bound inclusive and upper bound exclusive, so with the
//! default 4-hour window 04:00 opens the second bucket of the day.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::models::HourlySample;

/// Default window size in hours
pub const DEFAULT_WINDOW_HOURS: u32 = 4;

/// Aggregated hourly samples for one window of one day
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyBucket {
    pub date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Arithmetic mean of the temperatures in the window
    pub mean_temperature: Option<f64>,
    /// Sum of the precipitation in the window
    pub total_precipitation: Option<f64>,
    /// Arithmetic mean of the wind speeds in the window
    pub mean_wind_speed: Option<f64>,
}

impl HourlyBucket {
    /// Row label such as "2024-06-01 04:00-08:00"
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {:02}:00-{:02}:00",
            self.date.format("%Y-%m-%d"),
            self.start_hour,
            self.end_hour
        )
    }

    /// The bucket expressed as a single sample at its window start
    #[must_use]
    pub fn as_sample(&self) -> HourlySample {
        let start = NaiveTime::from_hms_opt(self.start_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        HourlySample {
            time: self.date.and_time(start),
            temperature: self.mean_temperature,
            precipitation: self.total_precipitation,
            wind_speed: self.mean_wind_speed,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    temperature: Vec<f64>,
    precipitation: Vec<f64>,
    wind_speed: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn total(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

/// Group hourly samples into fixed windows starting at local midnight.
///
/// Null values are skipped per metric. Windows without any sample are
/// omitted. The result is ordered by date and window start.
#[must_use]
pub fn bucket_hourly(samples: &[HourlySample], window_hours: u32) -> Vec<HourlyBucket> {
    let window = window_hours.clamp(1, 24);
    let mut windows: BTreeMap<(NaiveDate, u32), Accumulator> = BTreeMap::new();

    for sample in samples {
        let start = sample.time.hour() / window * window;
        let acc = windows.entry((sample.time.date(), start)).or_default();
        acc.temperature.extend(sample.temperature);
        acc.precipitation.extend(sample.precipitation);
        acc.wind_speed.extend(sample.wind_speed);
    }

    windows
        .into_iter()
        .map(|((date, start_hour), acc)| HourlyBucket {
            date,
            start_hour,
            end_hour: (start_hour + window).min(24),
            mean_temperature: mean(&acc.temperature),
            total_precipitation: total(&acc.precipitation),
            mean_wind_speed: mean(&acc.wind_speed),
        })
        .collect()
}
