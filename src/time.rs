//! Time strings and time quantities.
//!
//! All instants handled by this crate are MJD seconds (UTC), the same time
//! base as the `TIME` column of a measurement set.

use hifitime::{Duration, Epoch, Unit, SECONDS_PER_DAY};
use thiserror::Error;

/// Parsed times smaller than this many seconds are offsets from midnight of
/// the dataset's first day rather than absolute instants.
const RELATIVE_TIME_LIMIT: f64 = 1.0e6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("Couldn't parse '{0}' as a time")]
    BadTime(String),

    #[error("'{0}' is not a start~end range (too many '~'s)")]
    BadRange(String),

    #[error("Couldn't parse '{0}' as a time quantity")]
    BadQuantity(String),

    #[error("The unit '{unit}' of '{quantity}' can't be converted to seconds")]
    UnknownUnit { quantity: String, unit: String },
}

/// The time span covered by a dataset \[MJD seconds\].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> TimeSpan {
        TimeSpan { start, end }
    }

    pub fn centre(&self) -> f64 {
        0.5 * (self.start + self.end)
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Midnight (UTC) of the day this span starts on \[MJD seconds\].
    pub fn start_day(&self) -> f64 {
        (self.start / SECONDS_PER_DAY).floor() * SECONDS_PER_DAY
    }
}

/// Parse a time string into MJD seconds.
///
/// Accepted forms are `YYYY/MM/DD/hh:mm:ss[.fff]`, `YYYY/MM/DD`,
/// `hh:mm[:ss[.fff]]` and plain seconds. Anything that works out to less than
/// 10^6 seconds is treated as an offset from `day_start`.
pub fn parse_time(s: &str, day_start: f64) -> Result<f64, TimeError> {
    let s = s.trim();
    let bad = || TimeError::BadTime(s.to_string());

    let seconds = if s.contains('/') {
        let mut parts = s.splitn(4, '/');
        let mut next_num = || -> Result<i64, TimeError> {
            parts
                .next()
                .and_then(|p| p.parse::<i64>().ok())
                .ok_or_else(bad)
        };
        let year = next_num()?;
        let month = next_num()?;
        let day = next_num()?;
        let clock = match parts.next() {
            Some(c) if !c.is_empty() => parse_clock(c).ok_or_else(bad)?,
            _ => 0.0,
        };
        let (year, month, day) = (
            i32::try_from(year).map_err(|_| bad())?,
            u8::try_from(month).map_err(|_| bad())?,
            u8::try_from(day).map_err(|_| bad())?,
        );
        let midnight =
            Epoch::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0).map_err(|_| bad())?;
        midnight.to_mjd_utc_seconds() + clock
    } else if s.contains(':') {
        parse_clock(s).ok_or_else(bad)?
    } else {
        s.parse::<f64>().map_err(|_| bad())?
    };

    if seconds < RELATIVE_TIME_LIMIT {
        Ok(day_start + seconds)
    } else {
        Ok(seconds)
    }
}

/// `hh:mm[:ss[.fff]]` as seconds since midnight.
fn parse_clock(s: &str) -> Option<f64> {
    let fields = s
        .split(':')
        .map(|f| f.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    match fields.as_slice() {
        [h] => Some(h * 3600.0),
        [h, m] => Some(h * 3600.0 + m * 60.0),
        [h, m, sec] => Some(h * 3600.0 + m * 60.0 + sec),
        _ => None,
    }
}

/// Parse a `start~end` range (or a single instant) into a pair of MJD seconds.
/// An empty end means the range is the start instant.
pub fn parse_timerange(s: &str, day_start: f64) -> Result<(f64, f64), TimeError> {
    let parts: Vec<&str> = s.split('~').collect();
    match parts.as_slice() {
        [single] => {
            let t = parse_time(single, day_start)?;
            Ok((t, t))
        }
        [start, end] => {
            let start = parse_time(start, day_start)?;
            let end = if end.trim().is_empty() {
                start
            } else {
                parse_time(end, day_start)?
            };
            Ok((start, end))
        }
        _ => Err(TimeError::BadRange(s.to_string())),
    }
}

/// Format MJD seconds as `YYYY/MM/DD/hh:mm:ss.sss`. The output parses back
/// with [`parse_time`] to the nearest millisecond.
pub fn format_mjd_seconds(mjd_seconds: f64) -> String {
    let days = (mjd_seconds / SECONDS_PER_DAY).floor();
    // Noon keeps float error in the MJD conversion away from the day boundary.
    let (year, month, day, _, _, _, _) = Epoch::from_mjd_utc(days + 0.5).to_gregorian_utc();

    let millis = ((mjd_seconds - days * SECONDS_PER_DAY) * 1000.0).round() as u64;
    let millis = millis.min(86_400_000 - 1);
    let hour = millis / 3_600_000;
    let minute = millis / 60_000 % 60;
    let second = millis / 1000 % 60;
    let milli = millis % 1000;
    format!("{year:04}/{month:02}/{day:02}/{hour:02}:{minute:02}:{second:02}.{milli:03}")
}

/// Nanoseconds since the MJD epoch (as written by the telescope) to MJD seconds.
pub fn mjd_nanoseconds_to_seconds(nanoseconds: i64) -> f64 {
    Duration::from_total_nanoseconds(i128::from(nanoseconds)).to_seconds()
}

/// Convert a unit-suffixed quantity like "2.5min" or "10 s" to seconds. A bare
/// number is taken to be seconds.
pub fn quantity_to_seconds(quantity: &str) -> Result<f64, TimeError> {
    let quantity = quantity.trim();
    // The longest numeric prefix is the value; whatever is left is the unit.
    let (value, unit) = quantity
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(quantity.len()))
        .rev()
        .filter(|&i| i > 0)
        .find_map(|i| {
            quantity[..i]
                .trim()
                .parse::<f64>()
                .ok()
                .map(|v| (v, quantity[i..].trim()))
        })
        .ok_or_else(|| TimeError::BadQuantity(quantity.to_string()))?;

    let unit = match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "d" | "day" | "days" => Unit::Day,
        "h" | "hr" | "hour" | "hours" => Unit::Hour,
        "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "ms" => Unit::Millisecond,
        "us" => Unit::Microsecond,
        "ns" => Unit::Nanosecond,
        _ => {
            return Err(TimeError::UnknownUnit {
                quantity: quantity.to_string(),
                unit: unit.to_string(),
            })
        }
    };
    Ok((unit * value).to_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2012/01/05 00:00:00 UTC
    const JAN_5_2012: f64 = 55931.0 * 86400.0;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-3, "{a} != {b}");
    }

    #[test]
    fn test_parse_absolute_time() {
        let t = parse_time("2012/01/05/12:30:15.5", 0.0).unwrap();
        assert_close(t, JAN_5_2012 + 12.0 * 3600.0 + 30.0 * 60.0 + 15.5);

        let midnight = parse_time("2012/01/05", 0.0).unwrap();
        assert_close(midnight, JAN_5_2012);
    }

    #[test]
    fn test_parse_relative_time() {
        let t = parse_time("01:00:00", JAN_5_2012).unwrap();
        assert_close(t, JAN_5_2012 + 3600.0);

        // Plain small numbers are offsets too.
        let t = parse_time("30", JAN_5_2012).unwrap();
        assert_close(t, JAN_5_2012 + 30.0);

        // Large numbers are absolute.
        let t = parse_time("4832000000", JAN_5_2012).unwrap();
        assert_close(t, 4832000000.0);
    }

    #[test]
    fn test_parse_bad_time() {
        assert!(parse_time("yesterday", 0.0).is_err());
        assert!(parse_time("2012/13/45/00:00:00", 0.0).is_err());
        assert!(parse_time("1:2:3:4", 0.0).is_err());
    }

    #[test]
    fn test_parse_timerange() {
        let (s, e) = parse_timerange("01:00:00~02:00:00", JAN_5_2012).unwrap();
        assert_close(s, JAN_5_2012 + 3600.0);
        assert_close(e, JAN_5_2012 + 7200.0);

        let (s, e) = parse_timerange("01:00:00", JAN_5_2012).unwrap();
        assert_close(s, e);

        let (s, e) = parse_timerange("01:00:00~", JAN_5_2012).unwrap();
        assert_close(s, e);

        assert_eq!(
            parse_timerange("1~2~3", 0.0),
            Err(TimeError::BadRange("1~2~3".to_string()))
        );
    }

    #[test]
    fn test_format_round_trip() {
        let t = JAN_5_2012 + 45296.25;
        let s = format_mjd_seconds(t);
        assert_eq!(s, "2012/01/05/12:34:56.250");
        assert_close(parse_time(&s, 0.0).unwrap(), t);
    }

    #[test]
    fn test_quantities() {
        assert_close(quantity_to_seconds("2.5min").unwrap(), 150.0);
        assert_close(quantity_to_seconds("10 s").unwrap(), 10.0);
        assert_close(quantity_to_seconds("12").unwrap(), 12.0);
        assert_close(quantity_to_seconds("1h").unwrap(), 3600.0);
        assert!(matches!(
            quantity_to_seconds("3Hz"),
            Err(TimeError::UnknownUnit { .. })
        ));
        assert!(matches!(
            quantity_to_seconds("scan"),
            Err(TimeError::BadQuantity(_))
        ));
    }

    #[test]
    fn test_nanoseconds() {
        let ns = 4_832_000_000_500_000_000;
        assert_close(mjd_nanoseconds_to_seconds(ns), 4_832_000_000.5);
    }

    #[test]
    fn test_time_span() {
        let span = TimeSpan::new(JAN_5_2012 + 100.0, JAN_5_2012 + 300.0);
        assert_close(span.centre(), JAN_5_2012 + 200.0);
        assert_close(span.width(), 200.0);
        assert_close(span.start_day(), JAN_5_2012);
    }
}
