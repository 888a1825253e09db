use csvw_validate::column::language_tags_match;
use csvw_validate::datatype::{Datatype, Format, Value, parse_value, standardise_numeric};
use proptest::prelude::*;

#[test]
fn string_keeps_whitespace_but_tokens_are_trimmed() {
    assert_eq!(
        parse_value(Datatype::String, None, "  spaced  ").unwrap(),
        Value::Str("  spaced  ".to_string())
    );
    assert_eq!(
        parse_value(Datatype::Token, None, "  spaced  ").unwrap(),
        Value::Str("spaced".to_string())
    );
    assert_eq!(
        parse_value(Datatype::NormalizedString, None, " x ").unwrap(),
        Value::Str("x".to_string())
    );
}

#[test]
fn grouped_numbers_standardise_without_a_format() {
    assert_eq!(
        parse_value(Datatype::Integer, None, "1,234,567").unwrap(),
        Value::Integer(1_234_567)
    );
    assert_eq!(
        parse_value(Datatype::Decimal, None, "12.5%").unwrap(),
        parse_value(Datatype::Decimal, None, "12.5").unwrap()
    );
    assert!(parse_value(Datatype::Integer, None, "1,23,").is_err());
}

#[test]
fn alternate_decimal_characters_apply_without_a_pattern() {
    let format = Format {
        pattern: None,
        decimal_char: Some(','),
        group_char: Some('.'),
    };
    assert_eq!(
        parse_value(Datatype::Decimal, Some(&format), "1.234,5").unwrap(),
        parse_value(Datatype::Decimal, None, "1234.5").unwrap()
    );
}

#[test]
fn ldml_pattern_drives_numeric_parsing() {
    let format = Format::pattern_only("#,##0.00");
    assert_eq!(
        parse_value(Datatype::Decimal, Some(&format), "1,234.50").unwrap(),
        parse_value(Datatype::Decimal, None, "1234.5").unwrap()
    );
    assert!(parse_value(Datatype::Decimal, Some(&format), "1234.5").is_err());
    // Integer datatypes refuse fractional pattern output.
    assert!(parse_value(Datatype::Integer, Some(&format), "1,234.50").is_err());
}

#[test]
fn scientific_notation_needs_the_float_family() {
    assert!(parse_value(Datatype::Decimal, None, "1e3").is_err());
    assert_eq!(
        parse_value(Datatype::Double, None, "1e3").unwrap(),
        Value::Float(1000.0)
    );
    assert_eq!(
        parse_value(Datatype::Float, None, ".5").unwrap(),
        Value::Float(0.5)
    );
}

#[test]
fn gregorian_and_duration_types_round_trip_their_lexical_space() {
    assert!(parse_value(Datatype::GYearMonth, None, "2024-05").is_ok());
    assert!(parse_value(Datatype::GYearMonth, None, "2024").is_err());
    assert!(parse_value(Datatype::Time, None, "20:20:02").is_ok());
    assert!(parse_value(Datatype::Time, None, "25:00:00").is_err());
    assert_eq!(
        parse_value(Datatype::Duration, None, " P1DT2H ").unwrap(),
        Value::Str("P1DT2H".to_string())
    );
}

#[test]
fn key_forms_are_canonical() {
    let a = parse_value(Datatype::DateTimeType, None, "2004-04-12T20:20+02:00").unwrap();
    let b = parse_value(Datatype::DateTimeType, None, "2004-04-12T18:20Z").unwrap();
    assert_eq!(a.key_form(), b.key_form());

    let one = parse_value(Datatype::Decimal, None, "1.0").unwrap();
    let padded = parse_value(Datatype::Decimal, None, "1.00").unwrap();
    assert_eq!(one.key_form(), padded.key_form());
    assert_eq!(one.key_form(), "1");
}

proptest! {
    #[test]
    fn any_i64_round_trips_through_the_integer_parser(n: i64) {
        let parsed = parse_value(Datatype::Integer, None, &n.to_string()).unwrap();
        prop_assert_eq!(parsed, Value::Integer(n as i128));
    }

    #[test]
    fn standardisation_never_panics(raw in ".{0,32}") {
        let _ = standardise_numeric(&raw, ',', '.');
    }

    #[test]
    fn language_tag_matching_is_symmetric(
        a in "[a-z]{1,3}(-[A-Z]{2})?",
        b in "[a-z]{1,3}(-[A-Z]{2})?",
    ) {
        prop_assert_eq!(language_tags_match(&a, &b), language_tags_match(&b, &a));
    }
}
