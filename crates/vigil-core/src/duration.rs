//! Duration strings: parsing config values like `"5s"`, `"500ms"`, `"1m30s"`
//! and rendering durations back in the same compact form.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Errors produced while parsing a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parse a duration string.
///
/// Accepts a sequence of `<number><unit>` terms (`"1h"`, `"1m30s"`,
/// `"1.5s"`, `"250ms"`) with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let is_numeric = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = s;
    let mut total = Duration::ZERO;

    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationError::Invalid(s.to_string()));
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail.find(is_numeric).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            "" => return Err(DurationError::MissingUnit(s.to_string())),
            other => {
                return Err(DurationError::UnknownUnit {
                    unit: other.to_string(),
                    input: s.to_string(),
                });
            }
        };

        let term = scaled(number, scale, s)?;
        total = total
            .checked_add(term)
            .ok_or_else(|| DurationError::Overflow(s.to_string()))?;
        rest = tail;
    }

    Ok(total)
}

/// Convert one `<number>` term into a duration, `scale` nanoseconds per unit.
fn scaled(number: &str, scale: u128, input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

    if !frac.is_empty() {
        let digits: u128 = frac.parse().map_err(|_| invalid())?;
        let exponent = u32::try_from(frac.len()).map_err(|_| overflow())?;
        let denominator = 10u128.checked_pow(exponent).ok_or_else(overflow)?;
        let fraction = digits.checked_mul(scale).ok_or_else(overflow)? / denominator;
        nanos = nanos.checked_add(fraction).ok_or_else(overflow)?;
    }

    let secs = u64::try_from(nanos / NANOS_PER_SEC).map_err(|_| overflow())?;
    // Always < 1e9, fits in u32.
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, subsec))
}

/// Display adapter rendering a [`Duration`] compactly.
///
/// Sub-second values use the largest fitting unit (`750ms`, `1.5µs`);
/// anything longer is split into hours, minutes and seconds with
/// zero-valued inner components kept (`5s`, `1m0s`, `1h2m3.5s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn get(self) -> Duration {
        self.0
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        let nanos = d.as_nanos();

        if nanos == 0 {
            return f.write_str("0s");
        }
        if nanos < 1_000 {
            return write!(f, "{nanos}ns");
        }
        if nanos < 1_000_000 {
            return write_fraction(f, nanos, 1_000, "µs");
        }
        if nanos < NANOS_PER_SEC {
            return write_fraction(f, nanos, 1_000_000, "ms");
        }

        let total_secs = d.as_secs();
        let hours = total_secs / 3_600;
        let minutes = (total_secs % 3_600) / 60;
        let secs = total_secs % 60;

        if hours > 0 {
            write!(f, "{hours}h{minutes}m")?;
        } else if minutes > 0 {
            write!(f, "{minutes}m")?;
        }

        let sec_nanos = u128::from(secs) * NANOS_PER_SEC + u128::from(d.subsec_nanos());
        write_fraction(f, sec_nanos, NANOS_PER_SEC, "s")
    }
}

/// Write `value / unit` with trailing fractional zeros trimmed.
fn write_fraction(f: &mut fmt::Formatter<'_>, value: u128, unit: u128, suffix: &str) -> fmt::Result {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return write!(f, "{whole}{suffix}");
    }

    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    write!(f, "{whole}.{}{suffix}", digits.trim_end_matches('0'))
}
