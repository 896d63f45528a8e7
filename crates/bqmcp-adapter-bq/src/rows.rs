//! Conversion of REST-encoded result rows into JSON objects.
//!
//! BigQuery returns rows as `{"f": [{"v": <cell>}, ...]}` where every scalar is
//! a string. Cells are decoded against the result schema.

use bqmcp_core::{Row, SchemaField, WarehouseError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// Decode one REST row against the result schema.
pub fn decode_row(schema: &[SchemaField], raw: &Value) -> Result<Row, WarehouseError> {
    let cells = cells(raw)?;
    if cells.len() != schema.len() {
        return Err(WarehouseError::Decode(format!(
            "row has {} cells, schema has {} fields",
            cells.len(),
            schema.len()
        )));
    }

    let mut row = Map::with_capacity(schema.len());
    for (field, cell) in schema.iter().zip(cells) {
        let value = cell.get("v").unwrap_or(&Value::Null);
        row.insert(field.name.clone(), decode_field(field, value)?);
    }
    Ok(row)
}

fn cells(raw: &Value) -> Result<&Vec<Value>, WarehouseError> {
    raw.get("f")
        .and_then(Value::as_array)
        .ok_or_else(|| WarehouseError::Decode("row without cell list".to_string()))
}

fn decode_field(field: &SchemaField, value: &Value) -> Result<Value, WarehouseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    if field.is_repeated() {
        let items = value.as_array().ok_or_else(|| {
            WarehouseError::Decode(format!("repeated field '{}' is not an array", field.name))
        })?;
        return items
            .iter()
            .map(|item| decode_scalar_or_record(field, item.get("v").unwrap_or(&Value::Null)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }

    decode_scalar_or_record(field, value)
}

fn decode_scalar_or_record(field: &SchemaField, value: &Value) -> Result<Value, WarehouseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => decode_row(&field.fields, value).map(Value::Object),
        _ => Ok(decode_scalar(&field.field_type, value)),
    }
}

fn decode_scalar(field_type: &str, value: &Value) -> Value {
    let Some(text) = value.as_str() else {
        return value.clone();
    };

    let decoded = match field_type {
        "INTEGER" | "INT64" => text.parse::<i64>().ok().map(Value::from),
        "FLOAT" | "FLOAT64" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        "BOOL" | "BOOLEAN" => match text {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        "TIMESTAMP" => timestamp(text).map(Value::String),
        _ => None,
    };

    decoded.unwrap_or_else(|| Value::String(text.to_string()))
}

/// Epoch seconds (possibly fractional or in exponent form) to RFC 3339.
fn timestamp(text: &str) -> Option<String> {
    let seconds = text.parse::<f64>().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Vec<SchemaField> {
        vec![
            SchemaField::new("id", "INTEGER"),
            SchemaField::new("score", "FLOAT"),
            SchemaField::new("active", "BOOLEAN"),
            SchemaField::new("name", "STRING"),
            SchemaField::new("created", "TIMESTAMP"),
        ]
    }

    #[test]
    fn test_scalars() {
        let raw = json!({"f": [
            {"v": "42"},
            {"v": "1.5"},
            {"v": "true"},
            {"v": "alice"},
            {"v": "1.7E9"}
        ]});

        let row = decode_row(&schema(), &raw).unwrap();
        assert_eq!(
            Value::Object(row),
            json!({
                "id": 42,
                "score": 1.5,
                "active": true,
                "name": "alice",
                "created": "2023-11-14T22:13:20Z"
            })
        );
    }

    #[test]
    fn test_nulls() {
        let raw = json!({"f": [{"v": null}, {"v": null}, {"v": null}, {"v": null}, {"v": null}]});
        let row = decode_row(&schema(), &raw).unwrap();
        assert!(row.values().all(Value::is_null));
        assert_eq!(row.len(), 5);
    }

    #[test]
    fn test_repeated_and_record() {
        let schema = vec![
            SchemaField::new("tags", "STRING").with_mode("REPEATED"),
            SchemaField::new("address", "RECORD").with_fields(vec![
                SchemaField::new("city", "STRING"),
                SchemaField::new("zip", "INT64"),
            ]),
        ];
        let raw = json!({"f": [
            {"v": [{"v": "a"}, {"v": "b"}]},
            {"v": {"f": [{"v": "Paris"}, {"v": "75001"}]}}
        ]});

        let row = decode_row(&schema, &raw).unwrap();
        assert_eq!(
            Value::Object(row),
            json!({"tags": ["a", "b"], "address": {"city": "Paris", "zip": 75001}})
        );
    }

    #[test]
    fn test_unparseable_numbers_stay_strings() {
        let schema = vec![SchemaField::new("n", "INTEGER"), SchemaField::new("d", "NUMERIC")];
        let raw = json!({"f": [{"v": "not-a-number"}, {"v": "12.3400"}]});
        let row = decode_row(&schema, &raw).unwrap();
        assert_eq!(row["n"], "not-a-number");
        assert_eq!(row["d"], "12.3400");
    }

    #[test]
    fn test_cell_count_mismatch() {
        let raw = json!({"f": [{"v": "1"}]});
        assert!(matches!(
            decode_row(&schema(), &raw),
            Err(WarehouseError::Decode(_))
        ));
    }
}
