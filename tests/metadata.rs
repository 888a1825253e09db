use csvw_validate::datatype::Datatype;
use csvw_validate::metadata::table_group_from_json;
use csvw_validate::schema::Trim;
use serde_json::json;
use url::Url;

fn base() -> Url {
    Url::parse("file:///data/group.json").expect("base url")
}

#[test]
fn shorthand_datatype_names_map_to_their_uris() {
    let document = json!({
        "tables": [{
            "url": "t.csv",
            "tableSchema": {
                "columns": [
                    { "name": "a", "datatype": "number" },
                    { "name": "b", "datatype": "binary" },
                    { "name": "c", "datatype": "datetime" },
                    { "name": "d", "datatype": "any" },
                    { "name": "e", "datatype": "xml" },
                    { "name": "f", "datatype": "json" },
                    { "name": "g" }
                ]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert!(intake.issues.errors.is_empty());
    let columns = &intake.group.tables[0].schema.columns;
    assert_eq!(columns[0].datatype, Datatype::Double);
    assert_eq!(columns[1].datatype, Datatype::Base64Binary);
    assert_eq!(columns[2].datatype, Datatype::DateTimeType);
    assert_eq!(columns[3].datatype, Datatype::AnyAtomicType);
    assert_eq!(columns[4].datatype, Datatype::XmlLiteral);
    assert_eq!(columns[5].datatype, Datatype::Json);
    // Absent datatype defaults to string.
    assert_eq!(columns[6].datatype, Datatype::String);
}

#[test]
fn full_uris_and_prefixed_names_resolve() {
    let document = json!({
        "tables": [{
            "url": "t.csv",
            "tableSchema": {
                "columns": [
                    { "name": "a", "datatype": { "@id": "http://www.w3.org/2001/XMLSchema#integer" } },
                    { "name": "b", "datatype": "xsd:gMonthDay" }
                ]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let columns = &intake.group.tables[0].schema.columns;
    assert_eq!(columns[0].datatype, Datatype::Integer);
    assert_eq!(columns[1].datatype, Datatype::GMonthDay);
}

#[test]
fn inherited_properties_flow_down_to_columns() {
    let document = json!({
        "lang": "en",
        "null": ["", "NA"],
        "tables": [{
            "url": "t.csv",
            "required": true,
            "tableSchema": {
                "separator": "|",
                "columns": [
                    { "name": "a" },
                    { "name": "b", "null": "n/a", "required": false }
                ]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let columns = &intake.group.tables[0].schema.columns;
    assert_eq!(columns[0].lang, "en");
    assert_eq!(columns[0].null_tokens, vec!["".to_string(), "NA".to_string()]);
    assert!(columns[0].required);
    assert_eq!(columns[0].separator.as_deref(), Some("|"));
    assert_eq!(columns[1].null_tokens, vec!["n/a".to_string()]);
    assert!(!columns[1].required);
}

#[test]
fn null_tokens_default_to_the_empty_string() {
    let document = json!({
        "tables": [{ "url": "t.csv", "tableSchema": { "columns": [{ "name": "a" }] } }]
    });
    let intake = table_group_from_json(&document, &base()).expect("intake");
    let column = &intake.group.tables[0].schema.columns[0];
    assert_eq!(column.null_tokens, vec![String::new()]);
    assert_eq!(column.lang, "und");
}

#[test]
fn dialect_layers_merge_group_then_table() {
    let document = json!({
        "dialect": { "delimiter": ";", "header": false },
        "tables": [{
            "url": "t.csv",
            "dialect": { "header": true, "trim": "start", "skipRows": 2 },
            "tableSchema": { "columns": [{ "name": "a" }] }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let dialect = &intake.group.tables[0].dialect;
    assert_eq!(dialect.delimiter, b';');
    assert!(dialect.header);
    assert_eq!(dialect.trim, Trim::Start);
    assert_eq!(dialect.skip_rows, 2);
    assert!(dialect.skip_blank_rows);
}

#[test]
fn table_urls_resolve_against_the_metadata_base() {
    let document = json!({
        "tables": [{ "url": "nested/t.csv", "tableSchema": { "columns": [{ "name": "a" }] } }]
    });
    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert_eq!(intake.group.tables[0].url, "file:///data/nested/t.csv");
}

#[test]
fn titles_accept_string_array_and_language_map_forms() {
    let document = json!({
        "tables": [{
            "url": "t.csv",
            "tableSchema": {
                "columns": [
                    { "name": "a", "titles": "A" },
                    { "name": "b", "titles": ["B", "b"] },
                    { "name": "c", "titles": { "en": "C", "fr": ["Ce", "Cé"] } }
                ]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let columns = &intake.group.tables[0].schema.columns;
    assert_eq!(columns[0].titles, vec![("und".to_string(), vec!["A".to_string()])]);
    assert_eq!(
        columns[1].titles,
        vec![("und".to_string(), vec!["B".to_string(), "b".to_string()])]
    );
    assert_eq!(columns[2].titles.len(), 2);
}

#[test]
fn unknown_primary_key_column_drops_the_table() {
    let document = json!({
        "tables": [{
            "url": "t.csv",
            "tableSchema": {
                "columns": [{ "name": "a" }],
                "primaryKey": "missing"
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert!(intake.group.tables.is_empty());
    assert_eq!(intake.issues.errors.len(), 1);
    assert_eq!(intake.issues.errors[0].kind, "metadata");
    assert!(intake.issues.errors[0].content.contains("missing"));
}

#[test]
fn foreign_key_arity_mismatch_is_rejected() {
    let document = json!({
        "tables": [
            { "url": "p.csv", "tableSchema": { "columns": [{ "name": "id" }] } },
            {
                "url": "c.csv",
                "tableSchema": {
                    "columns": [{ "name": "x" }, { "name": "y" }],
                    "foreignKeys": [{
                        "columnReference": ["x", "y"],
                        "reference": { "resource": "p.csv", "columnReference": "id" }
                    }]
                }
            }
        ]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert_eq!(intake.group.tables.len(), 1);
    assert_eq!(intake.issues.errors.len(), 1);
    assert!(intake.issues.errors[0].content.contains("local column"));
}

#[test]
fn foreign_key_to_unknown_table_is_a_metadata_error() {
    let document = json!({
        "tables": [{
            "url": "c.csv",
            "tableSchema": {
                "columns": [{ "name": "x" }],
                "foreignKeys": [{
                    "columnReference": "x",
                    "reference": { "resource": "nowhere.csv", "columnReference": "id" }
                }]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert!(intake.group.tables.is_empty());
    assert!(
        intake.issues.errors[0]
            .content
            .contains("unknown table"),
        "content: {}",
        intake.issues.errors[0].content
    );
}

#[test]
fn referenced_foreign_keys_attach_to_the_target_table() {
    let document = json!({
        "tables": [
            { "url": "p.csv", "tableSchema": { "columns": [{ "name": "id" }] } },
            {
                "url": "c.csv",
                "tableSchema": {
                    "columns": [{ "name": "ref" }],
                    "foreignKeys": [{
                        "columnReference": "ref",
                        "reference": { "resource": "p.csv", "columnReference": "id" }
                    }]
                }
            }
        ]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let parent = &intake.group.tables[0];
    assert_eq!(parent.referenced_foreign_keys.len(), 1);
    let mirror = &parent.referenced_foreign_keys[0];
    assert!(mirror.source_table_url.ends_with("c.csv"));
    assert_eq!(mirror.referenced_columns, vec![0]);
}

#[test]
fn single_table_documents_are_accepted() {
    let document = json!({
        "url": "t.csv",
        "tableSchema": { "columns": [{ "name": "a", "datatype": "integer" }] }
    });
    let intake = table_group_from_json(&document, &base()).expect("intake");
    assert_eq!(intake.group.tables.len(), 1);
    assert_eq!(intake.group.tables[0].schema.columns[0].datatype, Datatype::Integer);
}

#[test]
fn format_objects_carry_separator_characters() {
    let document = json!({
        "tables": [{
            "url": "t.csv",
            "tableSchema": {
                "columns": [{
                    "name": "amount",
                    "datatype": {
                        "base": "decimal",
                        "format": { "pattern": "#.##0,00", "decimalChar": ",", "groupChar": "." }
                    }
                }]
            }
        }]
    });

    let intake = table_group_from_json(&document, &base()).expect("intake");
    let format = intake.group.tables[0].schema.columns[0]
        .format
        .clone()
        .expect("format");
    assert_eq!(format.pattern.as_deref(), Some("#.##0,00"));
    assert_eq!(format.decimal_char, Some(','));
    assert_eq!(format.group_char, Some('.'));
}
