use serde_json::json;

mod common;
use common::{TestWorkspace, kinds, validate_file};

fn single_table(columns: serde_json::Value, extra_schema: serde_json::Value) -> serde_json::Value {
    let mut schema = json!({ "columns": columns });
    if let (Some(schema_obj), Some(extra_obj)) = (schema.as_object_mut(), extra_schema.as_object())
    {
        for (key, value) in extra_obj {
            schema_obj.insert(key.clone(), value.clone());
        }
    }
    json!({ "tables": [{ "url": "data.csv", "tableSchema": schema }] })
}

#[test]
fn clean_table_produces_no_findings() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,name\n1,Alice\n2,Bob\n3,Carol\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer" },
                { "name": "name", "titles": "name" }
            ]),
            json!({ "primaryKey": "id" }),
        ),
    );

    let report = validate_file(&metadata);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
}

#[test]
fn missing_header_yields_empty_name_warning_and_invalid_header_error() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "Name,,City\nAlice,34,Leeds\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "Name", "titles": "Name" },
                { "name": "Age", "titles": "Age", "datatype": "integer" },
                { "name": "City", "titles": "City" }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.warnings), vec!["Empty column name"]);
    assert_eq!(report.warnings[0].column, "2");
    assert_eq!(report.warnings[0].row, "1");

    assert_eq!(kinds(&report.errors), vec!["Invalid Header"]);
    assert_eq!(report.errors[0].row, "1");
    assert_eq!(report.errors[0].column, "2");
    assert_eq!(report.errors[0].content, "");
}

#[test]
fn duplicated_header_yields_duplicate_column_warning() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "Name,Age,Age\nAlice,34,Leeds\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "Name", "titles": "Name" },
                { "name": "Age", "titles": "Age", "datatype": "integer" },
                { "name": "City", "titles": "City" }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.warnings), vec!["Duplicate column name"]);
    assert_eq!(report.warnings[0].column, "3");
    assert_eq!(report.warnings[0].content, "Age");
    // The duplicated name also fails the title check for column 3.
    assert_eq!(kinds(&report.errors), vec!["Invalid Header"]);
}

#[test]
fn duplicate_primary_key_reports_the_second_row() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,name\n1,Alice\n2,Bob\n1,Carol\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer" },
                { "name": "name", "titles": "name" }
            ]),
            json!({ "primaryKey": "id" }),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["duplicate_key"]);
    assert_eq!(report.errors[0].row, "4");
    assert_eq!(report.errors[0].content, "key already present - 1");
}

#[test]
fn composite_datetime_key_echoes_lexical_forms() {
    let workspace = TestWorkspace::new();
    let row = "W00000001,2004-04-12T20:20+02:00[UTC+02:00],Y16T49,fair-health";
    workspace.write(
        "data.csv",
        &format!("ref,when,code,status\n{row}\n{row}\n"),
    );
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "ref", "titles": "ref" },
                { "name": "when", "titles": "when", "datatype": "datetime" },
                { "name": "code", "titles": "code" },
                { "name": "status", "titles": "status" }
            ]),
            json!({ "primaryKey": ["ref", "when", "code", "status"] }),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["duplicate_key"]);
    assert_eq!(
        report.errors[0].content,
        "key already present - W00000001, 2004-04-12T20:20+02:00[UTC+02:00], Y16T49, fair-health"
    );
}

#[test]
fn equal_instants_in_different_offsets_are_duplicate_keys() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "data.csv",
        "when\n2004-04-12T20:20+02:00\n2004-04-12T18:20Z\n",
    );
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([{ "name": "when", "titles": "when", "datatype": "datetime" }]),
            json!({ "primaryKey": "when" }),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["duplicate_key"]);
    assert_eq!(report.errors[0].row, "3");
}

#[test]
fn distinct_keys_never_report_duplicates() {
    let workspace = TestWorkspace::new();
    let mut contents = String::from("id\n");
    for i in 0..200 {
        contents.push_str(&format!("{i}\n"));
    }
    workspace.write("data.csv", &contents);
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([{ "name": "id", "titles": "id", "datatype": "integer" }]),
            json!({ "primaryKey": "id" }),
        ),
    );

    let report = validate_file(&metadata);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
}

#[test]
fn short_rows_are_ragged() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,name\n1,Alice\n2\n3,Carol\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer" },
                { "name": "name", "titles": "name" }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["ragged_rows"]);
    assert_eq!(report.errors[0].row, "3");
    assert_eq!(report.errors[0].category, "structure");
}

#[test]
fn blank_rows_error_when_not_skipped() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,name\n1,Alice\n,\n2,Bob\n");
    let base = single_table(
        json!([
            { "name": "id", "titles": "id", "datatype": "integer" },
            { "name": "name", "titles": "name" }
        ]),
        json!({}),
    );

    let mut strict = base.clone();
    strict["tables"][0]["dialect"] = json!({ "skipBlankRows": false });
    let metadata = workspace.write_metadata("strict.json", &strict);
    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["Blank rows"]);
    assert_eq!(report.errors[0].row, "3");

    let metadata = workspace.write_metadata("lenient.json", &base);
    let report = validate_file(&metadata);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
}

#[test]
fn skip_rows_ignores_leading_records() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "# generated nightly\nid\n1\n2\n");
    let mut document = single_table(
        json!([{ "name": "id", "titles": "id", "datatype": "integer" }]),
        json!({}),
    );
    document["tables"][0]["dialect"] = json!({ "skipRows": 1 });
    let metadata = workspace.write_metadata("data.csv-metadata.json", &document);

    let report = validate_file(&metadata);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
}

#[test]
fn invalid_cells_report_kind_row_and_column() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,score\n1,0.5\ntwo,oops\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer" },
                { "name": "score", "titles": "score", "datatype": "decimal" }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    let mut error_kinds = kinds(&report.errors);
    error_kinds.sort_unstable();
    assert_eq!(error_kinds, vec!["invalid_decimal", "invalid_integer"]);
    for error in &report.errors {
        assert_eq!(error.row, "3");
        assert_eq!(error.category, "schema");
        assert!(error.extra.starts_with("required => "));
    }
}

#[test]
fn required_and_range_constraints_fire() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,age\n1,17\n,44\n3,107\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer", "required": true },
                {
                    "name": "age",
                    "titles": "age",
                    "datatype": { "base": "integer", "minInclusive": 18, "maxExclusive": 100 }
                }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    let summary: Vec<(&str, &str)> = report
        .errors
        .iter()
        .map(|e| (e.kind.as_str(), e.row.as_str()))
        .collect();
    assert!(summary.contains(&("minInclusive", "2")));
    assert!(summary.contains(&("Required", "3")));
    assert!(summary.contains(&("maxExclusive", "4")));
    assert_eq!(report.errors.len(), 3, "errors: {:?}", report.errors);
}

#[test]
fn list_columns_validate_each_item() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", "id,sizes\n1,4;5;six\n");
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([
                { "name": "id", "titles": "id", "datatype": "integer" },
                { "name": "sizes", "titles": "sizes", "datatype": "integer", "separator": ";" }
            ]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["invalid_integer"]);
    assert!(report.errors[0].content.starts_with("'six' - "));
}

#[test]
fn missing_csv_reports_file_not_found() {
    let workspace = TestWorkspace::new();
    let metadata = workspace.write_metadata(
        "data.csv-metadata.json",
        &single_table(
            json!([{ "name": "id", "titles": "id", "datatype": "integer" }]),
            json!({}),
        ),
    );

    let report = validate_file(&metadata);
    assert_eq!(kinds(&report.errors), vec!["file_not_found"]);
}
