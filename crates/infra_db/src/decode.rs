//! Row and value mapping between PostgreSQL and the dynamic field model.
//!
//! Feed tables carry the upstream accounting vocabulary verbatim as quoted
//! mixed-case column names; every column decodes into a [`FieldValue`] keyed
//! by its column name. Bookkeeping columns (snake_case) are handled by the
//! repositories themselves.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use core_kernel::FieldValue;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgColumn, PgRow, Postgres};
use sqlx::query_builder::Separated;
use sqlx::{Column, Row, TypeInfo};

use crate::error::DatabaseError;

/// Decodes every supported column of a row into a field map.
pub fn row_to_fields(row: &PgRow) -> Result<BTreeMap<String, FieldValue>, DatabaseError> {
    let mut fields = BTreeMap::new();
    for column in row.columns() {
        if let Some(value) = decode_column(row, column)? {
            fields.insert(column.name().to_string(), value);
        }
    }
    Ok(fields)
}

/// Decodes one column by its declared PostgreSQL type. Types with no field
/// representation (audit timestamps and the like) decode to `None` and are
/// omitted from the map.
fn decode_column(row: &PgRow, column: &PgColumn) -> Result<Option<FieldValue>, DatabaseError> {
    let idx = column.ordinal();
    let decode_err = |e: sqlx::Error| DatabaseError::DecodeFailed {
        column: column.name().to_string(),
        message: e.to_string(),
    };
    let value = match column.type_info().name() {
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)
            .map_err(decode_err)?
            .map(FieldValue::Number),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map_err(decode_err)?
            .map(|v| FieldValue::Number(Decimal::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map_err(decode_err)?
            .map(|v| FieldValue::Number(Decimal::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(decode_err)?
            .map(|v| FieldValue::Number(Decimal::from(v))),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map_err(decode_err)?
            .and_then(Decimal::from_f32)
            .map(FieldValue::Number),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(decode_err)?
            .and_then(Decimal::from_f64)
            .map(FieldValue::Number),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map_err(decode_err)?
            .map(FieldValue::Date),
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(decode_err)?
            .map(FieldValue::Flag),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)
            .map_err(decode_err)?
            .map(FieldValue::Text),
        _ => return Ok(None),
    };
    Ok(Some(value.unwrap_or(FieldValue::Null)))
}

/// Pushes a field value as the next bind of a values tuple. Missing and
/// explicit-null fields push the literal `NULL` keyword rather than a typed
/// bind, so the statement prepares against numeric, date, and bool columns
/// alike.
pub fn push_field(
    values: &mut Separated<'_, '_, Postgres, &'static str>,
    value: Option<&FieldValue>,
) {
    match value {
        Some(FieldValue::Text(v)) => {
            values.push_bind(v.clone());
        }
        Some(FieldValue::Number(n)) => {
            values.push_bind(*n);
        }
        Some(FieldValue::Date(d)) => {
            values.push_bind(*d);
        }
        Some(FieldValue::Flag(b)) => {
            values.push_bind(*b);
        }
        Some(FieldValue::Null) | None => {
            values.push("NULL");
        }
    }
}

/// Quotes a column identifier after checking it against the allowed shape.
/// Identifiers can arrive from refresh notifications, so anything outside
/// `[A-Za-z0-9_]` is rejected rather than interpolated.
pub fn quote_ident(name: &str) -> Result<String, DatabaseError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}
