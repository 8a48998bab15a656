// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cron Expression
//!
//! Self-validating value object for standard cron schedules. Accepts the
//! 5-field form (`minute hour day-of-month month day-of-week`) and the
//! 6-field form with a leading seconds field. All evaluation is in UTC.
//!
//! Supported field grammar: `*`, single values, lists (`1,5,20`), ranges
//! (`8-17`), and steps (`*/15`, `10-50/5`). Day-of-week accepts `0-7` with
//! both `0` and `7` meaning Sunday. When both day-of-month and day-of-week
//! are restricted, a date matches if either field matches (classic cron
//! semantics).
//!
//! ## Examples
//!
//! ```
//! use etl_engine_domain::value_objects::CronExpression;
//! use chrono::{TimeZone, Utc};
//!
//! let every_minute = CronExpression::parse("*/1 * * * *").unwrap();
//! let after = Utc.with_ymd_and_hms(2025, 1, 1, 8, 30, 10).unwrap();
//! let next = every_minute.next_occurrence(after).unwrap();
//! assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 8, 31, 0).unwrap());
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EtlError;

// Search horizon for the next occurrence. Four years covers every
// leap-day/day-of-week combination a valid expression can require.
const SEARCH_HORIZON_DAYS: i64 = 4 * 366;

/// A parsed, validated cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    expression: String,
    seconds: BTreeSet<u32>,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    /// Parses a 5- or 6-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the field count is wrong, a field
    /// fails to parse, or a value falls outside its legal range.
    pub fn parse(expression: &str) -> Result<Self, EtlError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let (seconds_src, rest): (Option<&str>, &[&str]) = match fields.len() {
            5 => (None, &fields[..]),
            6 => (Some(fields[0]), &fields[1..]),
            n => {
                return Err(EtlError::invalid_config(format!(
                    "Cron expression '{}' has {} fields, expected 5 or 6",
                    expression, n
                )))
            }
        };

        let seconds = match seconds_src {
            Some(src) => parse_field(src, 0, 59, "seconds")?,
            // 5-field expressions fire at second zero
            None => BTreeSet::from([0]),
        };
        let minutes = parse_field(rest[0], 0, 59, "minute")?;
        let hours = parse_field(rest[1], 0, 23, "hour")?;
        let days_of_month = parse_field(rest[2], 1, 31, "day-of-month")?;
        let months = parse_field(rest[3], 1, 12, "month")?;
        let days_of_week = parse_dow_field(rest[4])?;

        Ok(Self {
            expression: expression.to_string(),
            seconds,
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: rest[2].trim() != "*",
            dow_restricted: rest[4].trim() != "*",
        })
    }

    /// Gets the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Computes the next occurrence strictly after `after`, in UTC.
    ///
    /// Returns `None` when no occurrence exists within the search horizon
    /// (roughly four years), which for a validated expression only happens
    /// with impossible date combinations such as `0 0 31 2 *`.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let horizon = after + Duration::days(SEARCH_HORIZON_DAYS);
        // Scan minute by minute; field checks are cheap set lookups and the
        // horizon bounds the worst case.
        let mut candidate = truncate_to_minute(after);

        while candidate <= horizon {
            if self.matches_minute(candidate) {
                for &second in &self.seconds {
                    let at = candidate + Duration::seconds(second as i64);
                    if at > after {
                        return Some(at);
                    }
                }
            }
            candidate += Duration::minutes(1);
        }
        None
    }

    /// Checks whether a given instant matches the schedule.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.matches_minute(truncate_to_minute(at)) && self.seconds.contains(&at.second())
    }

    fn matches_minute(&self, at: DateTime<Utc>) -> bool {
        if !self.minutes.contains(&at.minute())
            || !self.hours.contains(&at.hour())
            || !self.months.contains(&at.month())
        {
            return false;
        }
        let dom_match = self.days_of_month.contains(&at.day());
        let dow_match = self.days_of_week.contains(&at.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            // classic cron: either restricted day field may match
            (true, true) => dom_match || dow_match,
            (true, false) => dom_match,
            (false, true) => dow_match,
            (false, false) => true,
        }
    }
}

impl std::fmt::Display for CronExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl std::str::FromStr for CronExpression {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CronExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

impl<'de> Deserialize<'de> for CronExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CronExpression::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), at.hour(), at.minute(), 0)
        .single()
        .unwrap_or(at)
}

fn parse_field(src: &str, min: u32, max: u32, label: &str) -> Result<BTreeSet<u32>, EtlError> {
    let mut values = BTreeSet::new();
    for part in src.trim().split(',') {
        let (range_src, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s
                    .parse()
                    .map_err(|_| EtlError::invalid_config(format!("Invalid step '{}' in {} field", s, label)))?;
                if step == 0 {
                    return Err(EtlError::invalid_config(format!("Step cannot be zero in {} field", label)));
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range_src == "*" {
            (min, max)
        } else if let Some((a, b)) = range_src.split_once('-') {
            (parse_value(a, min, max, label)?, parse_value(b, min, max, label)?)
        } else {
            let v = parse_value(range_src, min, max, label)?;
            (v, v)
        };

        if lo > hi {
            return Err(EtlError::invalid_config(format!(
                "Inverted range {}-{} in {} field",
                lo, hi, label
            )));
        }

        let mut v = lo;
        while v <= hi {
            values.insert(v);
            v += step;
        }
    }

    if values.is_empty() {
        return Err(EtlError::invalid_config(format!("Empty {} field", label)));
    }
    Ok(values)
}

fn parse_value(src: &str, min: u32, max: u32, label: &str) -> Result<u32, EtlError> {
    let v: u32 = src
        .trim()
        .parse()
        .map_err(|_| EtlError::invalid_config(format!("Invalid value '{}' in {} field", src, label)))?;
    if v < min || v > max {
        return Err(EtlError::invalid_config(format!(
            "Value {} out of range {}-{} in {} field",
            v, min, max, label
        )));
    }
    Ok(v)
}

// Day-of-week allows 0-7 with 7 normalized to Sunday (0).
fn parse_dow_field(src: &str) -> Result<BTreeSet<u32>, EtlError> {
    let raw = parse_field(src, 0, 7, "day-of-week")?;
    Ok(raw.into_iter().map(|v| if v == 7 { 0 } else { v }).collect())
}
