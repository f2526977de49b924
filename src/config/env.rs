//! Environment accessor with typed defaulting.
//!
//! # Responsibilities
//! - Read raw values from an environment source
//! - Apply the `GATEWAY_` key prefix
//! - Parse strings, durations, integers and booleans
//!
//! # Design Decisions
//! - Absent or empty variables yield the default
//! - Malformed values yield the default; only the key is logged, never the value
//! - The source is a trait so tests never mutate the process environment

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every gateway environment variable.
pub const ENV_PREFIX: &str = "GATEWAY_";

/// A source of raw environment values.
pub trait EnvSource: Send + Sync {
    /// Return the raw value for `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Typed reader over an [`EnvSource`] using the gateway key convention.
pub struct EnvReader<'a> {
    source: &'a dyn EnvSource,
}

impl<'a> EnvReader<'a> {
    pub fn new(source: &'a dyn EnvSource) -> Self {
        Self { source }
    }

    /// Full variable name for a section suffix, e.g. `PORT` → `GATEWAY_PORT`.
    pub fn key(suffix: &str) -> String {
        format!("{ENV_PREFIX}{suffix}")
    }

    fn raw(&self, suffix: &str) -> Option<String> {
        self.source
            .var(&Self::key(suffix))
            .filter(|value| !value.is_empty())
    }

    /// String value, or `default` when unset or empty.
    pub fn string_value(&self, suffix: &str, default: &str) -> String {
        self.raw(suffix).unwrap_or_else(|| default.to_string())
    }

    /// Duration value in Go-style notation (`10s`, `1m30s`, `250ms`).
    pub fn duration_value(&self, suffix: &str, default: Duration) -> Duration {
        self.parsed(suffix, default, parse_duration)
    }

    /// Decimal integer value.
    pub fn int_value<T: FromStr>(&self, suffix: &str, default: T) -> T {
        self.parsed(suffix, default, |raw| raw.parse().ok())
    }

    /// Boolean value (`true/false`, `1/0`, `yes/no`, `on/off`).
    pub fn bool_value(&self, suffix: &str, default: bool) -> bool {
        self.parsed(suffix, default, parse_bool)
    }

    fn parsed<T>(&self, suffix: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
        let Some(raw) = self.raw(suffix) else {
            return default;
        };
        match parse(raw.trim()) {
            Some(value) => value,
            None => {
                tracing::warn!(
                    key = %Self::key(suffix),
                    "Malformed environment value, using default"
                );
                default
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a Go-style duration string.
///
/// Accepts a bare `0` or a sequence of `<decimal><unit>` terms with units
/// `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`. A leading `+` is allowed;
/// negative and overflowing durations are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.strip_prefix('+').unwrap_or(input);
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return None;
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return None,
        };

        total_nanos = total_nanos.checked_add(term_nanos(number, unit_nanos)?)?;
        rest = tail;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).ok()?;
    // Remainder is always below one second.
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Some(Duration::new(secs, nanos))
}

/// Nanoseconds for a single `<decimal><unit>` term.
fn term_nanos(number: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    let mut scale = unit_nanos;
    for digit in fraction.chars() {
        let digit = u128::from(digit.to_digit(10)?);
        scale /= 10;
        nanos = nanos.checked_add(digit * scale)?;
    }
    Some(nanos)
}
