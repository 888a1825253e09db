//! LDML number-pattern parsing for format-driven numeric columns.
//!
//! Supports the subset of Unicode number patterns CSV-W metadata uses in
//! practice: quoted literal prefixes/suffixes, optional sign placeholders,
//! integer-part grouping, fraction digits, an optional exponent, and
//! percent/permille scaling. Parsing is pure; failures carry a message
//! naming the offending part of the value.

use anyhow::{Result, anyhow, bail};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default)]
struct CompiledPattern {
    prefix: String,
    suffix: String,
    min_int_digits: usize,
    min_frac_digits: usize,
    max_frac_digits: usize,
    has_fraction: bool,
    primary_group: Option<usize>,
    secondary_group: Option<usize>,
    has_exponent: bool,
    explicit_plus: bool,
    scale_divisor: u32,
}

/// Parses `raw` against an LDML `pattern`, returning the decimal value.
pub fn parse_number(pattern: &str, group_char: char, decimal_char: char, raw: &str) -> Result<Decimal> {
    let compiled = compile_pattern(pattern)?;
    let mut rest = raw;

    rest = rest
        .strip_prefix(compiled.prefix.as_str())
        .ok_or_else(|| anyhow!("missing prefix '{}'", compiled.prefix))?;
    rest = rest
        .strip_suffix(compiled.suffix.as_str())
        .ok_or_else(|| anyhow!("missing suffix '{}'", compiled.suffix))?;

    let negative = rest.starts_with('-');
    if negative || rest.starts_with('+') {
        if rest.starts_with('+') && !compiled.explicit_plus {
            bail!("unexpected '+' sign");
        }
        rest = &rest[1..];
    } else if compiled.explicit_plus {
        bail!("expected an explicit sign");
    }

    let (mantissa, exponent) = match rest.split_once(['E', 'e']) {
        Some((m, e)) if compiled.has_exponent => {
            let exp: i64 = e
                .parse()
                .map_err(|_| anyhow!("invalid exponent '{e}'"))?;
            (m, Some(exp))
        }
        Some(_) => bail!("pattern does not allow an exponent"),
        None => (rest, None),
    };

    let (int_part, frac_part) = match mantissa.split_once(decimal_char) {
        Some((i, f)) => {
            if !compiled.has_fraction {
                bail!("pattern does not allow a fractional part");
            }
            (i, Some(f))
        }
        None => (mantissa, None),
    };

    let int_digits = strip_grouping(int_part, group_char, &compiled)?;
    if int_digits.is_empty() || !int_digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("invalid integer part '{int_part}'");
    }
    if int_digits.len() < compiled.min_int_digits {
        bail!(
            "integer part has {} digit(s), pattern requires at least {}",
            int_digits.len(),
            compiled.min_int_digits
        );
    }

    let frac_digits = frac_part.unwrap_or("");
    if !frac_digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("invalid fractional part '{frac_digits}'");
    }
    if frac_digits.len() < compiled.min_frac_digits || frac_digits.len() > compiled.max_frac_digits {
        bail!(
            "fractional part has {} digit(s), pattern requires {}..={}",
            frac_digits.len(),
            compiled.min_frac_digits,
            compiled.max_frac_digits
        );
    }

    let mut literal = String::with_capacity(mantissa.len() + 8);
    if negative {
        literal.push('-');
    }
    literal.push_str(&int_digits);
    if !frac_digits.is_empty() {
        literal.push('.');
        literal.push_str(frac_digits);
    }
    let mut value = match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{literal}e{exp}"))
            .map_err(|err| anyhow!("value out of range: {err}"))?,
        None => literal
            .parse::<Decimal>()
            .map_err(|err| anyhow!("value out of range: {err}"))?,
    };
    if compiled.scale_divisor > 1 {
        value /= Decimal::from(compiled.scale_divisor);
    }
    Ok(value)
}

/// Removes group separators from the integer part, verifying their positions
/// against the pattern's group sizes.
fn strip_grouping(int_part: &str, group_char: char, compiled: &CompiledPattern) -> Result<String> {
    if !int_part.contains(group_char) {
        return Ok(int_part.to_string());
    }
    let Some(primary) = compiled.primary_group else {
        bail!("pattern does not allow group separators");
    };
    let groups: Vec<&str> = int_part.split(group_char).collect();
    for (idx, group) in groups.iter().enumerate() {
        if group.is_empty() {
            bail!("empty digit group in '{int_part}'");
        }
        let expected = if idx + 1 == groups.len() {
            // Rightmost group is exactly the primary size.
            if group.len() != primary {
                bail!("misplaced group separator in '{int_part}'");
            }
            continue;
        } else if idx == 0 {
            // Leading group may be shorter.
            let max = compiled.secondary_group.unwrap_or(primary);
            if group.len() > max {
                bail!("misplaced group separator in '{int_part}'");
            }
            continue;
        } else {
            compiled.secondary_group.unwrap_or(primary)
        };
        if group.len() != expected {
            bail!("misplaced group separator in '{int_part}'");
        }
    }
    Ok(groups.concat())
}

fn compile_pattern(pattern: &str) -> Result<CompiledPattern> {
    // Only the positive subpattern drives parsing; a negative subpattern, if
    // present, adds nothing the leading '-' convention does not cover.
    let positive = split_unquoted(pattern, ';').0;
    let mut compiled = CompiledPattern {
        max_frac_digits: 0,
        scale_divisor: 1,
        ..CompiledPattern::default()
    };

    let chars: Vec<char> = positive.chars().collect();
    let mut idx = 0;

    // Prefix: everything before the first digit/group symbol.
    let mut prefix = String::new();
    while idx < chars.len() && !matches!(chars[idx], '#' | '0'..='9' | ',' | '.') {
        idx = consume_affix_char(&chars, idx, &mut prefix, &mut compiled)?;
    }
    compiled.prefix = prefix;

    // Numeric core.
    let core_start = idx;
    let mut decimal_pos: Option<usize> = None;
    let mut group_positions: Vec<usize> = Vec::new();
    let mut int_digits = 0usize;
    let mut int_required = 0usize;
    let mut frac_required = 0usize;
    let mut frac_total = 0usize;
    while idx < chars.len() {
        match chars[idx] {
            '#' | '0'..='9' => {
                if decimal_pos.is_none() {
                    int_digits += 1;
                    if chars[idx] != '#' {
                        int_required += 1;
                    }
                } else {
                    frac_total += 1;
                    if chars[idx] != '#' {
                        frac_required += 1;
                    }
                }
            }
            ',' => {
                if decimal_pos.is_some() {
                    bail!("group separator after decimal point in pattern '{pattern}'");
                }
                group_positions.push(int_digits);
            }
            '.' => {
                if decimal_pos.is_some() {
                    bail!("multiple decimal points in pattern '{pattern}'");
                }
                decimal_pos = Some(idx);
            }
            'E' => {
                idx += 1;
                let mut exp_digits = 0;
                while idx < chars.len() && matches!(chars[idx], '0' | '#' | '+') {
                    exp_digits += 1;
                    idx += 1;
                }
                if exp_digits == 0 {
                    bail!("exponent without digits in pattern '{pattern}'");
                }
                compiled.has_exponent = true;
                continue;
            }
            _ => break,
        }
        idx += 1;
    }
    if idx == core_start {
        bail!("pattern '{pattern}' has no digit placeholders");
    }
    compiled.min_int_digits = int_required;
    compiled.min_frac_digits = frac_required;
    compiled.max_frac_digits = frac_total;
    compiled.has_fraction = decimal_pos.is_some();
    if let Some(&last) = group_positions.last() {
        compiled.primary_group = Some(int_digits - last);
        if group_positions.len() > 1 {
            let previous = group_positions[group_positions.len() - 2];
            compiled.secondary_group = Some(last - previous);
        }
    }

    // Suffix: the remainder.
    let mut suffix = String::new();
    while idx < chars.len() {
        idx = consume_affix_char(&chars, idx, &mut suffix, &mut compiled)?;
    }
    compiled.suffix = suffix;

    Ok(compiled)
}

fn consume_affix_char(
    chars: &[char],
    idx: usize,
    affix: &mut String,
    compiled: &mut CompiledPattern,
) -> Result<usize> {
    match chars[idx] {
        '\'' => {
            // Quoted literal; '' is a literal apostrophe.
            if chars.get(idx + 1) == Some(&'\'') {
                affix.push('\'');
                return Ok(idx + 2);
            }
            let mut end = idx + 1;
            while end < chars.len() && chars[end] != '\'' {
                affix.push(chars[end]);
                end += 1;
            }
            if end == chars.len() {
                bail!("unterminated quote in number pattern");
            }
            Ok(end + 1)
        }
        '+' => {
            compiled.explicit_plus = true;
            Ok(idx + 1)
        }
        '-' => Ok(idx + 1),
        '%' => {
            compiled.scale_divisor = 100;
            affix.push('%');
            Ok(idx + 1)
        }
        '\u{2030}' => {
            compiled.scale_divisor = 1000;
            affix.push('\u{2030}');
            Ok(idx + 1)
        }
        other => {
            affix.push(other);
            Ok(idx + 1)
        }
    }
}

fn split_unquoted(pattern: &str, separator: char) -> (&str, Option<&str>) {
    let mut in_quote = false;
    for (pos, ch) in pattern.char_indices() {
        if ch == '\'' {
            in_quote = !in_quote;
        } else if ch == separator && !in_quote {
            return (&pattern[..pos], Some(&pattern[pos + ch.len_utf8()..]));
        }
    }
    (pattern, None)
}
