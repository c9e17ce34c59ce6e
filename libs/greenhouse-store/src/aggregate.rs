//! Daily aggregation of sensor samples

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use greenhouse_model::SensorSample;

/// Where calendar days start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// Host local time zone
    #[default]
    Local,
    /// Fixed UTC offset
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn utc() -> Self {
        DayBoundary::Fixed(Utc.fix())
    }

    /// Offset in minutes east of UTC; `None` outside ±24 h
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(DayBoundary::Fixed)
    }

    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => ts.with_timezone(&Local).date_naive(),
            DayBoundary::Fixed(offset) => ts.with_timezone(offset).date_naive(),
        }
    }

    /// Instant the given day starts
    pub fn day_start(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        let local = match self {
            DayBoundary::Local => Local
                .from_local_datetime(&midnight)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
            DayBoundary::Fixed(offset) => offset
                .from_local_datetime(&midnight)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
        };
        local.unwrap_or_else(|| midnight.and_utc())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// One sample per calendar day, ascending
///
/// Each field is the average over that day's connected samples, rounded to
/// a whole number with ties to even. A day without connected samples is all
/// zeros and `connected = false`.
pub fn aggregate_daily(samples: &[SensorSample], boundary: DayBoundary) -> Vec<SensorSample> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&SensorSample>> = BTreeMap::new();
    for sample in samples {
        buckets
            .entry(boundary.day_of(sample.timestamp))
            .or_default()
            .push(sample);
    }

    buckets
        .into_iter()
        .map(|(day, bucket)| {
            let name = bucket
                .first()
                .map(|s| s.greenhouse_name.clone())
                .unwrap_or_default();
            let timestamp = boundary.day_start(day);
            let online: Vec<&SensorSample> =
                bucket.iter().copied().filter(|s| s.connected).collect();

            if online.is_empty() {
                return SensorSample::offline(name, timestamp);
            }

            let avg = |f: fn(&SensorSample) -> f64| {
                mean(online.iter().map(|s| f(s)))
                    .unwrap_or(0.0)
                    .round_ties_even()
            };
            SensorSample {
                timestamp,
                greenhouse_name: name,
                temperature: avg(|s: &SensorSample| s.temperature),
                humidity: avg(|s: &SensorSample| f64::from(s.humidity)) as u16,
                soil_moisture: avg(|s: &SensorSample| s.soil_moisture),
                co2: avg(|s: &SensorSample| f64::from(s.co2)) as u16,
                connected: true,
            }
        })
        .collect()
}
