//! PDF date strings.
//!
//! Converts between `D:YYYYMMDDHHmmSSOHH'mm'` strings and seconds since the
//! Unix epoch. Every field after the year is optional; missing fields take
//! their smallest value and a missing offset means UTC.

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Error type for date string parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub message: String,
}

impl std::fmt::Display for DateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DateParseError {}

/// Returns true if the given year is a leap year.
fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Returns the number of days in a given month (1-indexed).
fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Converts a civil date to days since 1970-01-01 (Howard Hinnant's
/// algorithm).
fn date_to_days(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let m = if month <= 2 { month + 9 } else { month - 3 } as i64;

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // year of era
    let doy = (153 * m + 2) / 5 + day as i64 - 1; // day of year
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // day of era

    era * 146097 + doe - 719468
}

/// Converts days since 1970-01-01 back to a civil date.
fn days_to_date(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097; // day of era
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // year of era
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year
    let mp = (5 * doy + 2) / 153; // month index
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;

    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

/// Formats seconds since the Unix epoch as a UTC date string.
pub fn format_date(secs: i64) -> String {
    let days = secs.div_euclid(SECONDS_PER_DAY);
    let rem = secs.rem_euclid(SECONDS_PER_DAY);
    let (year, month, day) = days_to_date(days);
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}Z",
        year,
        month,
        day,
        rem / SECONDS_PER_HOUR,
        rem % SECONDS_PER_HOUR / SECONDS_PER_MINUTE,
        rem % SECONDS_PER_MINUTE
    )
}

/// Fixed-width digit groups of a date string.
struct Fields<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn error(&self, what: &str) -> DateParseError {
        DateParseError {
            message: format!("Invalid date {:?}: {}", self.text, what),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads exactly `width` digits.
    fn number(&mut self, width: usize, what: &str) -> Result<u32, DateParseError> {
        let bytes = self.bytes;
        let digits = bytes
            .get(self.pos..self.pos + width)
            .filter(|digits| digits.iter().all(u8::is_ascii_digit))
            .ok_or_else(|| self.error(&format!("bad {}", what)))?;
        self.pos += width;
        Ok(digits
            .iter()
            .fold(0, |acc, &digit| acc * 10 + (digit - b'0') as u32))
    }

    /// Reads a two-digit field if one follows, checking its range.
    fn optional(
        &mut self,
        min: u32,
        max: u32,
        what: &str,
    ) -> Result<Option<u32>, DateParseError> {
        if !self.peek().is_some_and(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        let value = self.number(2, what)?;
        if value < min || value > max {
            return Err(self.error(&format!("{} {} out of range", what, value)));
        }
        Ok(Some(value))
    }
}

/// Parses a date string into seconds since the Unix epoch.
///
/// The `D:` prefix is optional. Apostrophes in the offset are optional.
pub fn parse_date(text: &str) -> Result<i64, DateParseError> {
    let body = text.strip_prefix("D:").unwrap_or(text);
    let mut fields = Fields {
        text,
        bytes: body.as_bytes(),
        pos: 0,
    };

    let year = fields.number(4, "year")? as i64;
    let month = fields.optional(1, 12, "month")?.unwrap_or(1);
    let day = fields
        .optional(1, days_in_month(year, month), "day")?
        .unwrap_or(1);
    let hour = fields.optional(0, 23, "hour")?.unwrap_or(0);
    let minute = fields.optional(0, 59, "minute")?.unwrap_or(0);
    let second = fields.optional(0, 59, "second")?.unwrap_or(0);

    let offset = match fields.peek() {
        None => 0,
        Some(b'Z') => {
            fields.pos += 1;
            // some writers follow Z with a zero offset
            offset_tail(&mut fields)?;
            0
        }
        Some(sign @ (b'+' | b'-')) => {
            fields.pos += 1;
            if !fields.peek().is_some_and(|b| b.is_ascii_digit()) {
                return Err(fields.error("missing offset hours"));
            }
            let offset = offset_tail(&mut fields)?;
            if sign == b'-' { -offset } else { offset }
        }
        Some(_) => return Err(fields.error("unexpected character")),
    };
    if fields.pos != fields.bytes.len() {
        return Err(fields.error("trailing characters"));
    }

    let days = date_to_days(year, month, day);
    Ok(days * SECONDS_PER_DAY
        + hour as i64 * SECONDS_PER_HOUR
        + minute as i64 * SECONDS_PER_MINUTE
        + second as i64
        - offset)
}

/// Parses `HH'mm'` with every part optional, returning seconds.
fn offset_tail(fields: &mut Fields<'_>) -> Result<i64, DateParseError> {
    let hours = fields.optional(0, 23, "offset hours")?.unwrap_or(0);
    fields.eat(b'\'');
    let minutes = fields.optional(0, 59, "offset minutes")?.unwrap_or(0);
    fields.eat(b'\'');
    Ok(hours as i64 * SECONDS_PER_HOUR + minutes as i64 * SECONDS_PER_MINUTE)
}
