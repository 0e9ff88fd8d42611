// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timer spec parsing and next-fire calculation.
//!
//! A spec is either a fixed interval (`@every 30s`, `@every 1h30m`), a
//! predefined descriptor (`@daily`, `@midnight`, ...) or a cron expression in
//! standard Unix notation: five fields, or six with a leading seconds field.
//! Day-of-week values follow Unix numbering (0 or 7 is Sunday) and are
//! rewritten to names before reaching the `cron` crate, which counts Sunday
//! as 1.

use chrono::{DateTime, TimeZone};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

const EVERY_PREFIX: &str = "@every";

/// One year.
const MAX_EVERY_MS: u64 = 8760 * 3_600_000;

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A parsed timer spec.
#[derive(Debug, Clone)]
pub enum TimerSpec {
	/// Fire every `interval`, starting one interval after registration.
	Every(Duration),
	/// Fire on every occurrence of a cron schedule.
	Cron {
		/// Six-field expression in the `cron` crate's dialect.
		expression: String,
		schedule: Box<Schedule>,
	},
}

impl TimerSpec {
	pub fn parse(spec: &str) -> Result<Self> {
		let trimmed = spec.trim();
		let invalid = |message: String| SchedulerError::InvalidTimerSpec {
			spec: spec.to_string(),
			message,
		};

		if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
			let interval = parse_every_duration(rest.trim()).map_err(invalid)?;
			return Ok(TimerSpec::Every(interval));
		}

		let expression = convert_to_cron_crate_format(trimmed).map_err(invalid)?;
		let schedule = Schedule::from_str(&expression).map_err(|e| invalid(e.to_string()))?;
		Ok(TimerSpec::Cron {
			expression,
			schedule: Box::new(schedule),
		})
	}

	/// Next cron occurrence strictly after `after`. `None` for interval specs
	/// and for cron schedules with no future occurrence.
	pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
		match self {
			TimerSpec::Every(_) => None,
			TimerSpec::Cron { schedule, .. } => schedule.after(after).next(),
		}
	}
}

/// Validate a timer spec without keeping the parsed form.
pub fn validate_timer_spec(spec: &str) -> Result<()> {
	TimerSpec::parse(spec).map(|_| ())
}

/// Rewrite a Unix cron expression into the six-field `cron` crate dialect.
///
/// Descriptors expand to explicit expressions, five-field expressions get a
/// zero seconds field and the day-of-week field is converted to names.
fn convert_to_cron_crate_format(expression: &str) -> std::result::Result<String, String> {
	if expression.starts_with('@') {
		let expanded = match expression.to_ascii_lowercase().as_str() {
			"@yearly" | "@annually" => "0 0 0 1 1 *",
			"@monthly" => "0 0 0 1 * *",
			"@weekly" => "0 0 0 * * SUN",
			"@daily" | "@midnight" => "0 0 0 * * *",
			"@hourly" => "0 0 * * * *",
			_ => return Err(format!("unknown descriptor '{expression}'")),
		};
		return Ok(expanded.to_string());
	}

	let mut fields: Vec<&str> = expression.split_whitespace().collect();
	match fields.len() {
		5 => fields.insert(0, "0"),
		6 => {}
		n => return Err(format!("expected 5 or 6 fields, found {n}")),
	}

	let day_of_week = convert_day_of_week(fields[5])?;
	let mut converted: Vec<String> = fields[..5].iter().map(|f| f.to_string()).collect();
	converted.push(day_of_week);
	Ok(converted.join(" "))
}

/// Convert a numeric Unix day-of-week field (`0-6`, `7` also Sunday) to a
/// list of day names. Wildcards and fields already using names pass through.
fn convert_day_of_week(field: &str) -> std::result::Result<String, String> {
	if field == "*" || field == "?" || field.chars().any(|c| c.is_ascii_alphabetic()) {
		return Ok(field.to_string());
	}

	let mut days = BTreeSet::new();
	for item in field.split(',') {
		let (range, step) = match item.split_once('/') {
			Some((range, step)) => {
				let step: u8 = step
					.parse()
					.map_err(|_| format!("invalid day-of-week step in '{item}'"))?;
				if step == 0 {
					return Err(format!("day-of-week step must be positive in '{item}'"));
				}
				(range, step)
			}
			None => (item, 1),
		};

		let (start, end) = match range {
			"*" | "?" => (0, 6),
			_ => match range.split_once('-') {
				Some((start, end)) => (weekday_number(start)?, weekday_number(end)?),
				// `N/step` runs from N to the end of the week.
				None if step > 1 => (weekday_number(range)?, 6),
				None => {
					let day = weekday_number(range)?;
					(day, day)
				}
			},
		};
		if start > end {
			return Err(format!("day-of-week range '{range}' is reversed"));
		}

		for day in (start..=end).step_by(usize::from(step)) {
			days.insert(day % 7);
		}
	}

	Ok(days
		.into_iter()
		.map(|day| WEEKDAY_NAMES[usize::from(day)])
		.collect::<Vec<_>>()
		.join(","))
}

fn weekday_number(text: &str) -> std::result::Result<u8, String> {
	match text.parse::<u8>() {
		Ok(day) if day <= 7 => Ok(day),
		_ => Err(format!("invalid day of week '{text}'")),
	}
}

/// Parse `30s`, `10m`, `12h`, `1h30m`, `500ms`.
///
/// Sub-second intervals round up to one second and fractions of a second are
/// dropped.
fn parse_every_duration(text: &str) -> std::result::Result<Duration, String> {
	if text.is_empty() {
		return Err("missing duration after @every".to_string());
	}

	let mut total_ms: u64 = 0;
	let mut chars = text.chars().peekable();

	while chars.peek().is_some() {
		let mut digits = String::new();
		while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
			digits.push(c);
			chars.next();
		}
		let mut unit = String::new();
		while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
			unit.push(c);
			chars.next();
		}

		if digits.is_empty() || unit.is_empty() {
			return Err(format!("invalid duration '{text}'"));
		}

		let value: u64 = digits
			.parse()
			.map_err(|_| format!("duration value out of range in '{text}'"))?;
		let factor_ms = match unit.as_str() {
			"h" => 3_600_000,
			"m" => 60_000,
			"s" => 1_000,
			"ms" => 1,
			other => return Err(format!("unknown duration unit '{other}' in '{text}'")),
		};
		total_ms = value
			.checked_mul(factor_ms)
			.and_then(|ms| total_ms.checked_add(ms))
			.ok_or_else(|| format!("duration out of range in '{text}'"))?;
	}

	if total_ms == 0 {
		return Err("interval must be greater than zero".to_string());
	}
	if total_ms > MAX_EVERY_MS {
		return Err("interval must be at most 8760h".to_string());
	}

	Ok(Duration::from_secs((total_ms / 1000).max(1)))
}
