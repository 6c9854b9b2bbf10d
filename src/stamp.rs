use std::fmt::{Display, Formatter};
use chrono::{DateTime, Duration, Months, Utc};
use crate::grib::sections::sect4::Product;
use crate::tables::statistical_process_name;

impl Durations for i64 {
    fn seconds(&self) -> Duration {
        Duration::seconds(*self)
    }
}

pub(crate) trait Durations {
    fn seconds(&self) -> Duration;
}

/// Indicator of unit of time range (code table 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Decade,
    Normal,
    Century,
    Hours3,
    Hours6,
    Hours12,
    Second,
}

impl TimeUnit {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TimeUnit::Minute),
            1 => Some(TimeUnit::Hour),
            2 => Some(TimeUnit::Day),
            3 => Some(TimeUnit::Month),
            4 => Some(TimeUnit::Year),
            5 => Some(TimeUnit::Decade),
            6 => Some(TimeUnit::Normal),
            7 => Some(TimeUnit::Century),
            10 => Some(TimeUnit::Hours3),
            11 => Some(TimeUnit::Hours6),
            12 => Some(TimeUnit::Hours12),
            13 => Some(TimeUnit::Second),
            _ => None,
        }
    }

    /// Length in seconds, for units that have a fixed one.
    fn seconds(&self) -> Option<i64> {
        match self {
            TimeUnit::Second => Some(1),
            TimeUnit::Minute => Some(60),
            TimeUnit::Hour => Some(3600),
            TimeUnit::Hours3 => Some(3 * 3600),
            TimeUnit::Hours6 => Some(6 * 3600),
            TimeUnit::Hours12 => Some(12 * 3600),
            TimeUnit::Day => Some(24 * 3600),
            _ => None,
        }
    }

    fn months(&self) -> Option<u32> {
        match self {
            TimeUnit::Month => Some(1),
            TimeUnit::Year => Some(12),
            TimeUnit::Decade => Some(120),
            TimeUnit::Normal => Some(360),
            TimeUnit::Century => Some(1200),
            _ => None,
        }
    }

    /// `time` moved by `amount` of this unit; calendar units follow month arithmetic.
    pub fn after(&self, time: DateTime<Utc>, amount: i64) -> Option<DateTime<Utc>> {
        if let Some(seconds) = self.seconds() {
            return time.checked_add_signed(amount.checked_mul(seconds)?.seconds());
        }
        let months = u32::try_from(amount.unsigned_abs()).ok()?.checked_mul(self.months()?)?;
        if amount >= 0 {
            time.checked_add_months(Months::new(months))
        } else {
            time.checked_sub_months(Months::new(months))
        }
    }

    /// `amount` of `from` expressed in this unit, when it divides evenly.
    fn convert(&self, amount: i64, from: TimeUnit) -> Option<i64> {
        if *self == from {
            return Some(amount);
        }
        let (to, from) = (self.seconds()?, from.seconds()?);
        let seconds = amount.checked_mul(from)?;
        if seconds % to == 0 { Some(seconds / to) } else { None }
    }
}

/// Forecast step of a message: reference time plus the `[start, end]` interval
/// counted in `unit`. Instantaneous products have `start == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub ref_time: DateTime<Utc>,
    pub unit: TimeUnit,
    pub start: i64,
    pub end: i64,
    /// `stepType` key: `instant` or the statistical process
    pub step_type: &'static str,
}

impl Stamp {
    pub fn from_product(ref_time: DateTime<Utc>, product: &Product) -> Option<Self> {
        let horizontal = product.horizontal()?;
        let unit = TimeUnit::from_code(horizontal.time_unit)?;
        let start = i64::from(horizontal.forecast_time);

        match product {
            Product::Product8(statistical) => {
                let mut end = start;
                for range in &statistical.ranges {
                    let range_unit = TimeUnit::from_code(range.time_unit)?;
                    end += unit.convert(i64::from(range.length), range_unit)?;
                }
                let step_type = statistical.ranges.first()
                    .map_or("instant", |range| statistical_process_name(range.statistical_process));
                Some(Stamp { ref_time, unit, start, end, step_type })
            }
            _ => Some(Stamp { ref_time, unit, start, end: start, step_type: "instant" }),
        }
    }

    pub fn validity_time(&self) -> Option<DateTime<Utc>> {
        self.unit.after(self.ref_time, self.end)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.unit.after(self.ref_time, self.start)
    }

    /// `(start, end)` in hours, when both convert exactly.
    fn hours(&self) -> Option<(i64, i64)> {
        Some((TimeUnit::Hour.convert(self.start, self.unit)?, TimeUnit::Hour.convert(self.end, self.unit)?))
    }

    /// Start step in hours when expressible, in the native unit otherwise.
    pub fn start_step(&self) -> i64 {
        self.hours().map_or(self.start, |(start, _)| start)
    }

    pub fn end_step(&self) -> i64 {
        self.hours().map_or(self.end, |(_, end)| end)
    }

    /// `stepRange` key: `end`, or `start-end` for intervals.
    pub fn step_range(&self) -> String {
        let suffix = match (self.hours(), self.unit) {
            (None, TimeUnit::Minute) => "m",
            (None, TimeUnit::Second) => "s",
            _ => "",
        };
        if self.start == self.end {
            format!("{}{}", self.end_step(), suffix)
        } else {
            format!("{}-{}{}", self.start_step(), self.end_step(), suffix)
        }
    }
}

impl Display for Stamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "fcst time {}:from {}", self.step_range(), self.ref_time.format("%Y%m%d%H%M"))
    }
}

/// Date as the `YYYYMMDD` integer used by `dataDate` and `validityDate`.
pub fn date_key(time: &DateTime<Utc>) -> i64 {
    time.format("%Y%m%d").to_string().parse().unwrap_or_default()
}

/// Time as the `HHMM` integer used by `dataTime` and `validityTime`.
pub fn time_key(time: &DateTime<Utc>) -> i64 {
    time.format("%H%M").to_string().parse().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use super::*;

    fn ref_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2004, 2, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn hours_cross_leap_day() {
        let validity = TimeUnit::Hour.after(ref_time(), 120).unwrap();
        assert_eq!(date_key(&validity), 20040305);
        assert_eq!(time_key(&validity), 1200);
        assert_eq!(date_key(&TimeUnit::Hour.after(ref_time(), 240).unwrap()), 20040310);
    }

    #[test]
    fn calendar_units_use_months() {
        let time = Utc.with_ymd_and_hms(2004, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(date_key(&TimeUnit::Month.after(time, 1).unwrap()), 20040229);
        assert_eq!(date_key(&TimeUnit::Year.after(time, -1).unwrap()), 20030131);
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(TimeUnit::Hour.convert(2, TimeUnit::Day), Some(48));
        assert_eq!(TimeUnit::Hour.convert(90, TimeUnit::Minute), None);
        assert_eq!(TimeUnit::Hour.convert(1, TimeUnit::Month), None);
        assert_eq!(TimeUnit::from_code(11), Some(TimeUnit::Hours6));
        assert_eq!(TimeUnit::from_code(9), None);
    }

    #[test]
    fn step_ranges() {
        let stamp = Stamp { ref_time: ref_time(), unit: TimeUnit::Hour, start: 108, end: 120, step_type: "avg" };
        assert_eq!(stamp.step_range(), "108-120");
        assert_eq!(stamp.to_string(), "fcst time 108-120:from 200402291200");

        let stamp = Stamp { ref_time: ref_time(), unit: TimeUnit::Minute, start: 30, end: 30, step_type: "instant" };
        assert_eq!(stamp.step_range(), "30m");
        assert_eq!(stamp.end_step(), 30);
    }
}
