//! Multi-statement batch-update script synthesis. One UPDATE per item,
//! concatenated inside dialect-specific transaction delimiters and executed
//! atomically by the storage collaborator via `raw_execute`.

use crate::error::OpError;
use serde_json::{Map, Value};
use std::fmt;

/// Dialects the storage collaborator may report. Batch-update statement
/// templates exist only for a closed subset; everything else fails fast
/// before any statement executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Oracle,
    Sqlite,
    Mysql,
    Mssql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Postgres => "postgres",
            Dialect::Oracle => "oracle",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Mssql => "mssql",
        };
        f.write_str(name)
    }
}

/// Transaction delimiters per dialect. Sqlite scripts run bare (its driver
/// wraps multi-statement execs itself).
fn delimiters(dialect: Dialect) -> Option<(&'static str, &'static str)> {
    match dialect {
        Dialect::Postgres => Some(("BEGIN; ", " COMMIT")),
        Dialect::Oracle => Some(("BEGIN; ", " COMMIT; END")),
        Dialect::Sqlite => Some(("", "")),
        Dialect::Mysql | Dialect::Mssql => None,
    }
}

/// One heterogeneous per-row update: SET `values` WHERE `filter`.
#[derive(Clone, Debug)]
pub struct BatchItem {
    pub values: Map<String, Value>,
    pub filter: Map<String, Value>,
}

/// Quote an identifier (doubled-quote escaping, as the storage engines we
/// target all accept).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Render a JSON value as a SQL literal.
fn literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// One UPDATE statement for a (values, filter) pair.
pub fn update_statement(table: &str, item: &BatchItem) -> String {
    let sets: Vec<String> = item
        .values
        .iter()
        .map(|(col, val)| format!("{} = {}", quoted(col), literal(val)))
        .collect();
    let mut sql = format!("UPDATE {} SET {}", quoted(table), sets.join(", "));
    if !item.filter.is_empty() {
        let conds: Vec<String> = item
            .filter
            .iter()
            .map(|(col, val)| format!("{} = {}", quoted(col), literal(val)))
            .collect();
        sql.push_str(&format!(" WHERE {}", conds.join(" AND ")));
    }
    sql
}

/// Assemble the full batch script: delimiter prefix, one statement per item
/// each terminated with ` ; `, delimiter suffix. Dialects without a template
/// fail before anything is assembled.
pub fn build_batch_script(
    dialect: Dialect,
    table: &str,
    items: &[BatchItem],
) -> Result<String, OpError> {
    let (begin, end) =
        delimiters(dialect).ok_or_else(|| OpError::UnsupportedDialect(dialect.to_string()))?;
    let mut script = String::from(begin);
    for item in items {
        // An item with no values would render `UPDATE t SET  WHERE ...`.
        if item.values.is_empty() {
            return Err(OpError::Validation(format!(
                "batch update item for {} has no values",
                table
            )));
        }
        script.push_str(&update_statement(table, item));
        script.push_str(" ; ");
    }
    script.push_str(end);
    tracing::debug!(%dialect, statements = items.len(), script = %script, "batch script");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(values: Value, filter: Value) -> BatchItem {
        let as_map = |v: Value| match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        BatchItem { values: as_map(values), filter: as_map(filter) }
    }

    #[test]
    fn renders_update_statement() {
        let stmt = update_statement(
            "Todo",
            &item(json!({"completed": true, "text": "x's"}), json!({"id": 3})),
        );
        assert_eq!(
            stmt,
            r#"UPDATE "Todo" SET "completed" = TRUE, "text" = 'x''s' WHERE "id" = 3"#
        );
    }

    #[test]
    fn sqlite_script_has_no_transaction_wrapper() {
        let script = build_batch_script(
            Dialect::Sqlite,
            "Todo",
            &[
                item(json!({"done": true}), json!({"id": 1})),
                item(json!({"done": false}), json!({"id": 2})),
            ],
        )
        .unwrap();
        assert!(!script.contains("BEGIN"));
        assert!(!script.contains("COMMIT"));
        assert_eq!(script.matches("UPDATE").count(), 2);
    }

    #[test]
    fn postgres_script_is_wrapped() {
        let script = build_batch_script(
            Dialect::Postgres,
            "Todo",
            &[item(json!({"done": true}), json!({"id": 1}))],
        )
        .unwrap();
        assert!(script.starts_with("BEGIN; "));
        assert!(script.ends_with(" COMMIT"));
    }

    #[test]
    fn item_without_values_is_rejected() {
        let err = build_batch_script(
            Dialect::Sqlite,
            "Todo",
            &[item(json!({"done": true}), json!({"id": 1})), item(json!({}), json!({"id": 2}))],
        )
        .unwrap_err();
        assert!(matches!(err, OpError::Validation(_)));
        assert!(err.to_string().contains("no values"));
    }

    #[test]
    fn unsupported_dialect_fails_fast() {
        let err = build_batch_script(Dialect::Mysql, "Todo", &[]).unwrap_err();
        assert!(matches!(err, OpError::UnsupportedDialect(_)));
    }
}
