//! Format-driven date/time parsing keyed by datatype and optional pattern.
//!
//! All date-like datatypes resolve to a timezone-aware instant
//! (`DateTime<FixedOffset>`); values without an explicit offset are anchored
//! at UTC so that key equality compares instants. A trailing zone annotation
//! such as `[UTC+02:00]` is tolerated and ignored for instant purposes.
//!
//! Patterns use the ICU date symbols CSV-W metadata carries (`yyyy`, `MM`,
//! `dd`, `HH`, `mm`, `ss`, `.SSS`, trailing `X`/`Z` offsets, quoted
//! literals) and are translated to chrono format strings.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;

use crate::datatype::Datatype;

static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-][0-9]{2}:[0-9]{2}|[+-][0-9]{4})$").unwrap());
static UTC_OFFSET: LazyLock<FixedOffset> =
    LazyLock::new(|| FixedOffset::east_opt(0).unwrap());
static ZONE_ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]$").unwrap());
static G_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-?[0-9]{4,})$").unwrap());
static G_YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?[0-9]{4,})-([0-9]{2})$").unwrap());
static G_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^--([0-9]{2})$").unwrap());
static G_MONTH_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--([0-9]{2})-([0-9]{2})$").unwrap());
static G_DAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^---([0-9]{2})$").unwrap());

/// Parses `value` as the given date-like datatype, honouring `pattern` when
/// present, and returns the zoned instant.
pub fn parse_datetime(
    datatype: Datatype,
    pattern: Option<&str>,
    value: &str,
) -> Result<DateTime<FixedOffset>> {
    let body = ZONE_ANNOTATION_RE.replace(value, "");
    let (body, offset) = split_offset(&body);

    if datatype == Datatype::DateTimeStamp && offset.is_none() {
        bail!("a dateTimeStamp requires an explicit timezone");
    }

    let naive = match pattern {
        Some(p) => parse_with_pattern(p, body, offset.is_some())?,
        None => parse_default(datatype, body)?,
    };

    let offset = offset.unwrap_or(*UTC_OFFSET);
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow!("ambiguous local datetime '{value}'"))
}

fn split_offset(value: &str) -> (&str, Option<FixedOffset>) {
    let Some(found) = OFFSET_RE.find(value) else {
        return (value, None);
    };
    // A bare "-0500" is a negative gYear, not an offset on an empty body.
    if found.start() == 0 {
        return (value, None);
    }
    let text = found.as_str();
    let offset = if text == "Z" {
        FixedOffset::east_opt(0)
    } else {
        let sign = if text.starts_with('-') { -1 } else { 1 };
        let digits: String = text[1..].chars().filter(|c| *c != ':').collect();
        let hours: i32 = digits[..2].parse().unwrap_or(0);
        let minutes: i32 = digits[2..].parse().unwrap_or(0);
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    };
    match offset {
        Some(parsed) => (&value[..found.start()], Some(parsed)),
        None => (value, None),
    }
}

fn parse_default(datatype: Datatype, body: &str) -> Result<NaiveDateTime> {
    use Datatype::*;
    match datatype {
        Date => {
            let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
                .with_context(|| format!("'{body}' is not a valid date"))?;
            Ok(at_midnight(date))
        }
        DateTimeType | DateTimeStamp => {
            const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
            for fmt in FORMATS {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(body, fmt) {
                    return Ok(parsed);
                }
            }
            bail!("'{body}' is not a valid dateTime")
        }
        Time => {
            const FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];
            for fmt in FORMATS {
                if let Ok(parsed) = NaiveTime::parse_from_str(body, fmt) {
                    return Ok(epoch_date().and_time(parsed));
                }
            }
            bail!("'{body}' is not a valid time")
        }
        GYear => {
            let captures = G_YEAR_RE
                .captures(body)
                .ok_or_else(|| anyhow!("'{body}' is not a valid gYear"))?;
            date_from_parts(captures[1].parse()?, 1, 1)
        }
        GYearMonth => {
            let captures = G_YEAR_MONTH_RE
                .captures(body)
                .ok_or_else(|| anyhow!("'{body}' is not a valid gYearMonth"))?;
            date_from_parts(captures[1].parse()?, captures[2].parse()?, 1)
        }
        GMonth => {
            let captures = G_MONTH_RE
                .captures(body)
                .ok_or_else(|| anyhow!("'{body}' is not a valid gMonth"))?;
            date_from_parts(1972, captures[1].parse()?, 1)
        }
        GMonthDay => {
            let captures = G_MONTH_DAY_RE
                .captures(body)
                .ok_or_else(|| anyhow!("'{body}' is not a valid gMonthDay"))?;
            date_from_parts(1972, captures[1].parse()?, captures[2].parse()?)
        }
        GDay => {
            let captures = G_DAY_RE
                .captures(body)
                .ok_or_else(|| anyhow!("'{body}' is not a valid gDay"))?;
            date_from_parts(1972, 1, captures[1].parse()?)
        }
        other => bail!("{} is not a date datatype", other.local_name()),
    }
}

fn parse_with_pattern(pattern: &str, body: &str, has_offset: bool) -> Result<NaiveDateTime> {
    let translated = translate_pattern(pattern)?;
    if translated.expects_offset && !has_offset {
        bail!("pattern '{pattern}' requires a timezone offset");
    }
    if translated.has_date && translated.has_time {
        NaiveDateTime::parse_from_str(body, &translated.format)
            .with_context(|| format!("'{body}' does not match pattern '{pattern}'"))
    } else if translated.has_date {
        NaiveDate::parse_from_str(body, &translated.format)
            .map(at_midnight)
            .with_context(|| format!("'{body}' does not match pattern '{pattern}'"))
    } else if translated.has_time {
        NaiveTime::parse_from_str(body, &translated.format)
            .map(|time| epoch_date().and_time(time))
            .with_context(|| format!("'{body}' does not match pattern '{pattern}'"))
    } else {
        bail!("pattern '{pattern}' contains no date or time fields")
    }
}

struct TranslatedPattern {
    format: String,
    has_date: bool,
    has_time: bool,
    expects_offset: bool,
}

/// Converts an ICU date pattern into a chrono format string.
fn translate_pattern(pattern: &str) -> Result<TranslatedPattern> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut format = String::with_capacity(pattern.len() + 8);
    let mut has_date = false;
    let mut has_time = false;
    let mut expects_offset = false;
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        let mut run = 1;
        while idx + run < chars.len() && chars[idx + run] == ch {
            run += 1;
        }
        match ch {
            'y' => {
                has_date = true;
                format.push_str(if run == 2 { "%y" } else { "%Y" });
            }
            'M' => {
                has_date = true;
                format.push_str(if run >= 2 { "%m" } else { "%-m" });
            }
            'd' => {
                has_date = true;
                format.push_str(if run >= 2 { "%d" } else { "%-d" });
            }
            'H' => {
                has_time = true;
                format.push_str(if run >= 2 { "%H" } else { "%-H" });
            }
            'm' => {
                has_time = true;
                format.push_str(if run >= 2 { "%M" } else { "%-M" });
            }
            's' => {
                has_time = true;
                format.push_str(if run >= 2 { "%S" } else { "%-S" });
            }
            'S' => {
                // Fractional seconds: the preceding literal '.' pairs with
                // chrono's dotted-fraction specifier.
                if format.ends_with('.') {
                    format.pop();
                }
                format.push_str("%.f");
            }
            'X' | 'x' | 'Z' => {
                expects_offset = true;
            }
            '\'' => {
                if chars.get(idx + 1) == Some(&'\'') {
                    format.push('\'');
                    idx += 2;
                    continue;
                }
                let mut end = idx + 1;
                while end < chars.len() && chars[end] != '\'' {
                    push_literal(&mut format, chars[end]);
                    end += 1;
                }
                if end == chars.len() {
                    bail!("unterminated quote in date pattern '{pattern}'");
                }
                idx = end + 1;
                continue;
            }
            other => {
                for _ in 0..run {
                    push_literal(&mut format, other);
                }
            }
        }
        idx += run;
    }

    Ok(TranslatedPattern {
        format,
        has_date,
        has_time,
        expects_offset,
    })
}

fn push_literal(format: &mut String, ch: char) {
    if ch == '%' {
        format.push_str("%%");
    } else {
        format.push(ch);
    }
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn date_from_parts(year: i32, month: u32, day: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(at_midnight)
        .ok_or_else(|| anyhow!("no such calendar date ({year:04}-{month:02}-{day:02})"))
}
