//! Datatype registry: per-datatype parsers for the XML Schema types used by
//! CSV-W column definitions.
//!
//! Each datatype maps a raw cell string to a [`Value`], either directly or
//! through a format-driven parser (LDML number patterns via
//! [`crate::number_format`], date/time patterns via
//! [`crate::datetime_format`]). Values without a format are *standardised*
//! first: percent/permille suffixes stripped, group separators removed, the
//! decimal character replaced by `.`, then matched against the datatype's
//! lexical regex.

use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::{datetime_format, number_format};

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const CSVW: &str = "http://www.w3.org/ns/csvw#";

/// Optional format attached to a column's datatype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Format {
    pub pattern: Option<String>,
    pub decimal_char: Option<char>,
    pub group_char: Option<char>,
}

impl Format {
    pub fn pattern_only(pattern: impl Into<String>) -> Self {
        Format {
            pattern: Some(pattern.into()),
            decimal_char: None,
            group_char: None,
        }
    }

    pub fn describe_pattern(&self) -> String {
        match &self.pattern {
            Some(p) => p.clone(),
            None => "no format provided".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    AnyAtomicType,
    NormalizedString,
    Token,
    Language,
    Name,
    NmToken,
    AnyUri,
    Base64Binary,
    HexBinary,
    QName,
    XmlLiteral,
    Html,
    Json,
    Boolean,
    Decimal,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    NonPositiveInteger,
    NegativeInteger,
    Double,
    Float,
    Date,
    DateTimeType,
    DateTimeStamp,
    GDay,
    GMonth,
    GMonthDay,
    GYear,
    GYearMonth,
    Time,
    Duration,
    DayTimeDuration,
    YearMonthDuration,
}

impl Datatype {
    pub fn from_uri(uri: &str) -> Option<Datatype> {
        let local = uri.strip_prefix(XSD).or_else(|| {
            uri.strip_prefix(RDF)
                .or_else(|| uri.strip_prefix(CSVW))
        })?;
        Datatype::from_local_name(local)
    }

    pub fn from_local_name(name: &str) -> Option<Datatype> {
        use Datatype::*;
        Some(match name {
            "string" => String,
            "anyAtomicType" => AnyAtomicType,
            "normalizedString" => NormalizedString,
            "token" => Token,
            "language" => Language,
            "Name" => Name,
            "NMTOKEN" => NmToken,
            "anyURI" => AnyUri,
            "base64Binary" => Base64Binary,
            "hexBinary" => HexBinary,
            "QName" => QName,
            "XMLLiteral" => XmlLiteral,
            "HTML" => Html,
            "JSON" => Json,
            "boolean" => Boolean,
            "decimal" => Decimal,
            "integer" => Integer,
            "long" => Long,
            "int" => Int,
            "short" => Short,
            "byte" => Byte,
            "nonNegativeInteger" => NonNegativeInteger,
            "positiveInteger" => PositiveInteger,
            "unsignedLong" => UnsignedLong,
            "unsignedInt" => UnsignedInt,
            "unsignedShort" => UnsignedShort,
            "unsignedByte" => UnsignedByte,
            "nonPositiveInteger" => NonPositiveInteger,
            "negativeInteger" => NegativeInteger,
            "double" => Double,
            "float" => Float,
            "date" => Date,
            "dateTime" => DateTimeType,
            "dateTimeStamp" => DateTimeStamp,
            "gDay" => GDay,
            "gMonth" => GMonth,
            "gMonthDay" => GMonthDay,
            "gYear" => GYear,
            "gYearMonth" => GYearMonth,
            "time" => Time,
            "duration" => Duration,
            "dayTimeDuration" => DayTimeDuration,
            "yearMonthDuration" => YearMonthDuration,
            _ => return None,
        })
    }

    pub fn local_name(self) -> &'static str {
        use Datatype::*;
        match self {
            String => "string",
            AnyAtomicType => "anyAtomicType",
            NormalizedString => "normalizedString",
            Token => "token",
            Language => "language",
            Name => "Name",
            NmToken => "NMTOKEN",
            AnyUri => "anyURI",
            Base64Binary => "base64Binary",
            HexBinary => "hexBinary",
            QName => "QName",
            XmlLiteral => "XMLLiteral",
            Html => "HTML",
            Json => "JSON",
            Boolean => "boolean",
            Decimal => "decimal",
            Integer => "integer",
            Long => "long",
            Int => "int",
            Short => "short",
            Byte => "byte",
            NonNegativeInteger => "nonNegativeInteger",
            PositiveInteger => "positiveInteger",
            UnsignedLong => "unsignedLong",
            UnsignedInt => "unsignedInt",
            UnsignedShort => "unsignedShort",
            UnsignedByte => "unsignedByte",
            NonPositiveInteger => "nonPositiveInteger",
            NegativeInteger => "negativeInteger",
            Double => "double",
            Float => "float",
            Date => "date",
            DateTimeType => "dateTime",
            DateTimeStamp => "dateTimeStamp",
            GDay => "gDay",
            GMonth => "gMonth",
            GMonthDay => "gMonthDay",
            GYear => "gYear",
            GYearMonth => "gYearMonth",
            Time => "time",
            Duration => "duration",
            DayTimeDuration => "dayTimeDuration",
            YearMonthDuration => "yearMonthDuration",
        }
    }

    /// The `type` string used for a failed parse of this datatype.
    pub fn error_kind(self) -> String {
        let suffix = match self {
            Datatype::DateTimeType => "datetime",
            other => other.local_name(),
        };
        format!("invalid_{suffix}")
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer_family()
            || matches!(self, Datatype::Decimal | Datatype::Double | Datatype::Float)
    }

    pub fn is_integer_family(self) -> bool {
        use Datatype::*;
        matches!(
            self,
            Integer
                | Long
                | Int
                | Short
                | Byte
                | NonNegativeInteger
                | PositiveInteger
                | UnsignedLong
                | UnsignedInt
                | UnsignedShort
                | UnsignedByte
                | NonPositiveInteger
                | NegativeInteger
        )
    }

    pub fn is_date_like(self) -> bool {
        use Datatype::*;
        matches!(
            self,
            Date | DateTimeType | DateTimeStamp | GDay | GMonth | GMonthDay | GYear | GYearMonth
                | Time
        )
    }

    pub fn is_duration(self) -> bool {
        matches!(
            self,
            Datatype::Duration | Datatype::DayTimeDuration | Datatype::YearMonthDuration
        )
    }

    /// String-style datatypes: trimmed on parse, and the only family whose
    /// `format.pattern` runs as a plain regex over the value.
    pub fn is_string_like(self) -> bool {
        use Datatype::*;
        matches!(
            self,
            String
                | AnyAtomicType
                | NormalizedString
                | Token
                | Language
                | Name
                | NmToken
                | AnyUri
                | Base64Binary
                | HexBinary
                | QName
                | XmlLiteral
                | Html
                | Json
        ) || self.is_duration()
    }

    /// Signed integral range for the bounded integer types, `None` for the
    /// conceptually unbounded ones (held in `i128`, which covers the full
    /// `unsignedLong` range).
    fn integer_range(self) -> Option<(i128, i128)> {
        use Datatype::*;
        match self {
            Long => Some((i64::MIN as i128, i64::MAX as i128)),
            Int => Some((i32::MIN as i128, i32::MAX as i128)),
            Short => Some((i16::MIN as i128, i16::MAX as i128)),
            Byte => Some((i8::MIN as i128, i8::MAX as i128)),
            UnsignedLong => Some((0, u64::MAX as i128)),
            UnsignedInt => Some((0, u32::MAX as i128)),
            UnsignedShort => Some((0, u16::MAX as i128)),
            UnsignedByte => Some((0, u8::MAX as i128)),
            NonNegativeInteger => Some((0, i128::MAX)),
            PositiveInteger => Some((1, i128::MAX)),
            NonPositiveInteger => Some((i128::MIN, 0)),
            NegativeInteger => Some((i128::MIN, -1)),
            _ => None,
        }
    }
}

/// A parsed cell value. Heterogeneous across columns, so comparisons are only
/// defined within one variant; keys compare through [`Value::key_form`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i128),
    Decimal(Decimal),
    Float(f64),
    /// `instant` drives equality; `lexical` preserves the cell text for
    /// display, including any trailing zone annotation such as `[UTC+02:00]`.
    DateTime {
        instant: DateTime<FixedOffset>,
        lexical: String,
    },
    Str(String),
    /// Sentinel recorded when an item failed to parse; excluded from keys.
    Invalid(String),
}

impl Value {
    /// Canonical string used for key equality and hashing: numerics collapse
    /// trailing zeros, datetimes normalise to the UTC instant.
    pub fn key_form(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Float(f) => f.to_string(),
            Value::DateTime { instant, .. } => instant
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Str(s) => s.clone(),
            Value::Invalid(s) => s.clone(),
        }
    }

    /// Human-facing form used when a key is echoed back in an error message.
    pub fn display_form(&self) -> String {
        match self {
            Value::DateTime { lexical, .. } => lexical.clone(),
            Value::Decimal(d) => d.normalize().to_string(),
            other => other.key_form(),
        }
    }

    /// String form used for length restrictions.
    pub fn string_form(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.display_form(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid(_))
    }

    /// Ordering within one variant; `None` across variants or for NaN.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Decimal(b)) => Decimal::try_from_i128_with_scale(*a, 0)
                .ok()
                .and_then(|a| a.partial_cmp(b)),
            (Value::Decimal(a), Value::Integer(b)) => Decimal::try_from_i128_with_scale(*b, 0)
                .ok()
                .and_then(|b| a.partial_cmp(&b)),
            (
                Value::DateTime { instant: a, .. },
                Value::DateTime { instant: b, .. },
            ) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+|-)?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").unwrap());
static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\-+]?[0-9]+$").unwrap());
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((\+|-)?([0-9]+(\.[0-9]*)?|\.[0-9]+)([Ee](\+|-)?[0-9]+)?|(\+|-)?INF|NaN)$")
        .unwrap()
});
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^-?P([0-9]+Y([0-9]+M)?([0-9]+D)?|[0-9]+M([0-9]+D)?|[0-9]+D)?(T([0-9]+H([0-9]+M)?([0-9]+(\.[0-9]+)?S)?|[0-9]+M([0-9]+(\.[0-9]+)?S)?|[0-9]+(\.[0-9]+)?S))?$",
    )
    .unwrap()
});
static DAY_TIME_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^-?P([0-9]+D)?(T([0-9]+H([0-9]+M)?([0-9]+(\.[0-9]+)?S)?|[0-9]+M([0-9]+(\.[0-9]+)?S)?|[0-9]+(\.[0-9]+)?S))?$",
    )
    .unwrap()
});
static YEAR_MONTH_DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?P([0-9]+Y([0-9]+M)?|[0-9]+M)$").unwrap());

/// Parses `raw` under `datatype`, using `format` when present.
pub fn parse_value(datatype: Datatype, format: Option<&Format>, raw: &str) -> Result<Value> {
    use Datatype::*;
    match datatype {
        String | AnyAtomicType => Ok(Value::Str(raw.to_string())),
        Boolean => parse_boolean(raw, format),
        Decimal | Integer | Long | Int | Short | Byte | NonNegativeInteger | PositiveInteger
        | UnsignedLong | UnsignedInt | UnsignedShort | UnsignedByte | NonPositiveInteger
        | NegativeInteger | Double | Float => parse_numeric(datatype, format, raw),
        Date | DateTimeType | DateTimeStamp | GDay | GMonth | GMonthDay | GYear | GYearMonth
        | Time => {
            let trimmed = raw.trim();
            let pattern = format.and_then(|f| f.pattern.as_deref());
            let instant = datetime_format::parse_datetime(datatype, pattern, trimmed)?;
            Ok(Value::DateTime {
                instant,
                lexical: trimmed.to_string(),
            })
        }
        Duration => parse_duration(raw, &DURATION_RE, "duration"),
        DayTimeDuration => parse_duration(raw, &DAY_TIME_DURATION_RE, "dayTimeDuration"),
        YearMonthDuration => parse_duration(raw, &YEAR_MONTH_DURATION_RE, "yearMonthDuration"),
        _ => Ok(Value::Str(raw.trim().to_string())),
    }
}

fn parse_boolean(raw: &str, format: Option<&Format>) -> Result<Value> {
    let trimmed = raw.trim();
    match format.and_then(|f| f.pattern.as_deref()) {
        Some(pattern) => {
            let (truthy, falsy) = pattern
                .split_once('|')
                .ok_or_else(|| anyhow!("boolean format must be of the form 'true|false'"))?;
            if trimmed == truthy {
                Ok(Value::Bool(true))
            } else if trimmed == falsy {
                Ok(Value::Bool(false))
            } else {
                bail!("expected '{truthy}' or '{falsy}'")
            }
        }
        None => match trimmed {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => bail!("expected one of true, false, 1, 0"),
        },
    }
}

fn parse_duration(raw: &str, re: &Regex, name: &str) -> Result<Value> {
    let trimmed = raw.trim();
    // The optional groups make the bare designator "P" (or "-P") match too.
    let degenerate = matches!(trimmed.trim_start_matches('-'), "P" | "PT" | "");
    if !degenerate && re.is_match(trimmed) {
        Ok(Value::Str(trimmed.to_string()))
    } else {
        bail!("not a valid {name}")
    }
}

fn parse_numeric(datatype: Datatype, format: Option<&Format>, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let group_char = format.and_then(|f| f.group_char).unwrap_or(',');
    let decimal_char = format.and_then(|f| f.decimal_char).unwrap_or('.');

    if let Some(pattern) = format.and_then(|f| f.pattern.as_deref()) {
        let parsed = number_format::parse_number(pattern, group_char, decimal_char, trimmed)?;
        return decimal_to_value(datatype, parsed);
    }

    let standardised = standardise_numeric(trimmed, group_char, decimal_char);
    match datatype {
        Datatype::Decimal => {
            if !DECIMAL_RE.is_match(&standardised) {
                bail!("does not match the decimal pattern");
            }
            let parsed = Decimal::from_str(&standardised)
                .map_err(|err| anyhow!("not a valid decimal: {err}"))?;
            Ok(Value::Decimal(parsed))
        }
        Datatype::Double | Datatype::Float => {
            if !FLOAT_RE.is_match(&standardised) {
                bail!("does not match the floating point pattern");
            }
            let parsed = match standardised.as_str() {
                "INF" | "+INF" => f64::INFINITY,
                "-INF" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => other
                    .parse::<f64>()
                    .map_err(|err| anyhow!("not a valid floating point number: {err}"))?,
            };
            Ok(Value::Float(parsed))
        }
        _ => {
            if !INTEGER_RE.is_match(&standardised) {
                bail!("does not match the integer pattern");
            }
            let parsed = standardised
                .trim_start_matches('+')
                .parse::<i128>()
                .map_err(|err| anyhow!("not a valid integer: {err}"))?;
            check_integer_range(datatype, parsed)?;
            Ok(Value::Integer(parsed))
        }
    }
}

fn decimal_to_value(datatype: Datatype, parsed: Decimal) -> Result<Value> {
    match datatype {
        Datatype::Decimal => Ok(Value::Decimal(parsed)),
        Datatype::Double | Datatype::Float => parsed
            .to_f64()
            .map(Value::Float)
            .ok_or_else(|| anyhow!("value does not fit a floating point number")),
        _ => {
            if parsed.fract() != Decimal::ZERO {
                bail!("integer value must not have a fractional part");
            }
            let integral = parsed
                .to_i128()
                .ok_or_else(|| anyhow!("integer value out of range"))?;
            check_integer_range(datatype, integral)?;
            Ok(Value::Integer(integral))
        }
    }
}

fn check_integer_range(datatype: Datatype, value: i128) -> Result<()> {
    if let Some((min, max)) = datatype.integer_range() {
        if value < min || value > max {
            bail!(
                "value out of range for {} ({min}..={max})",
                datatype.local_name()
            );
        }
    }
    Ok(())
}

/// Pre-parse normalisation for unformatted numerics: drop a trailing percent
/// or permille sign, remove group characters between digits, and rewrite the
/// decimal character between digits to `.`.
pub fn standardise_numeric(raw: &str, group_char: char, decimal_char: char) -> String {
    let stripped = raw
        .strip_suffix('%')
        .or_else(|| raw.strip_suffix('\u{2030}'))
        .unwrap_or(raw);
    let chars: Vec<char> = stripped.chars().collect();
    let mut out = String::with_capacity(stripped.len());
    for (idx, &ch) in chars.iter().enumerate() {
        let prev_digit = idx > 0 && chars[idx - 1].is_ascii_digit();
        let next_digit = idx + 1 < chars.len() && chars[idx + 1].is_ascii_digit();
        if ch == group_char && prev_digit && next_digit {
            continue;
        }
        if ch == decimal_char && prev_digit && next_digit {
            out.push('.');
            continue;
        }
        out.push(ch);
    }
    out
}
