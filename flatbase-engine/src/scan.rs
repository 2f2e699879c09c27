use std::path::PathBuf;
use std::sync::Arc;

use flatbase_ast::{BinOp, Leaf, Node};
use futures::stream::{self, Stream};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::catalog::{ColumnType, TableSchema};
use crate::error::{EngineError, EngineResult};
use crate::validator::ValidatedProjection;
use crate::value::Value;

const DELIMITER: char = ',';

/// A single decoded row: column name -> cast value, in the row file's
/// on-disk column order.
type Row = IndexMap<String, Value>;

/// Open a table's row file and return a lazy stream of projected row
/// objects. Casting, predicate evaluation and projection all happen one
/// record at a time; the scan never buffers more than the current row.
pub async fn scan_table(
    path: PathBuf,
    schema: Arc<TableSchema>,
    projection: ValidatedProjection,
    predicate: Option<Node>,
) -> EngineResult<impl Stream<Item = EngineResult<JsonValue>>> {
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| EngineError::operational(format!("cannot open table file {path:?}: {e}")))?;
    let mut reader = BufReader::new(file).lines();

    let header_line = reader
        .next_line()
        .await
        .map_err(|e| EngineError::operational(format!("reading header of {path:?}: {e}")))?
        .ok_or_else(|| EngineError::operational(format!("{path:?} is empty: missing header")))?;

    let header: Vec<String> = header_line
        .split(DELIMITER)
        .map(|s| s.trim().to_string())
        .collect();

    for col in &header {
        if !schema.contains_key(col) {
            return Err(EngineError::programming(format!(
                "row file declares column '{col}' absent from table metadata"
            )));
        }
    }
    debug!("scanning {path:?}: {} declared column(s)", header.len());

    let state = (reader, header, schema, projection, predicate, false);
    let stream = stream::unfold(state, move |(mut reader, header, schema, projection, predicate, done)| async move {
        if done {
            return None;
        }
        loop {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    return Some((
                        Err(EngineError::operational(format!("reading row: {e}"))),
                        (reader, header, schema, projection, predicate, true),
                    ))
                }
            };

            let row = match decode_row(&line, &header, &schema) {
                Ok(row) => row,
                Err(e) => {
                    return Some((Err(e), (reader, header, schema, projection, predicate, true)))
                }
            };

            let keep = match &predicate {
                Some(node) => match eval(node, &row) {
                    Ok(value) => match value.as_bool() {
                        Ok(b) => b,
                        Err(e) => {
                            return Some((
                                Err(e),
                                (reader, header, schema, projection, predicate, true),
                            ))
                        }
                    },
                    Err(e) => {
                        return Some((
                            Err(e),
                            (reader, header, schema, projection, predicate, true),
                        ))
                    }
                },
                None => true,
            };

            if !keep {
                continue;
            }

            let projected = project(&row, &projection);
            return Some((
                Ok(projected),
                (reader, header, schema, projection, predicate, false),
            ));
        }
    });

    Ok(stream)
}

fn decode_row(line: &str, header: &[String], schema: &TableSchema) -> EngineResult<Row> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() != header.len() {
        return Err(EngineError::data(format!(
            "row has {} field(s), expected {}",
            fields.len(),
            header.len()
        )));
    }
    let mut row = Row::new();
    for (name, raw) in header.iter().zip(fields.iter()) {
        let ty = *schema
            .get(name)
            .expect("header columns were validated against schema at scan start");
        row.insert(name.clone(), Value::cast(raw, ty)?);
    }
    Ok(row)
}

fn project(row: &Row, projection: &ValidatedProjection) -> JsonValue {
    let mut obj = serde_json::Map::new();
    match projection {
        ValidatedProjection::Wildcard => {
            for (name, value) in row.iter() {
                obj.insert(name.clone(), value.to_json());
            }
        }
        ValidatedProjection::Columns(names) => {
            for name in names {
                if let Some(value) = row.get(name) {
                    obj.insert(name.clone(), value.to_json());
                } else {
                    warn!("projection referenced '{name}' not present in row; emitting null");
                    obj.insert(name.clone(), JsonValue::Null);
                }
            }
        }
    }
    JsonValue::Object(obj)
}

/// Recursively evaluate a validated predicate tree against one decoded
/// row. Identifier leaves have already been rewritten to simple column
/// names by the logical validator.
fn eval(node: &Node, row: &Row) -> EngineResult<Value> {
    match node {
        Node::Leaf(Leaf::IntLit(v)) => Ok(Value::Int(*v)),
        Node::Leaf(Leaf::FloatLit(v)) => Ok(Value::Float(*v)),
        Node::Leaf(Leaf::StrLit(v)) => Ok(Value::Str(v.clone())),
        Node::Leaf(Leaf::Ident(name)) => row
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::internal(format!("column '{name}' missing from row"))),
        Node::Not(inner) => {
            let v = eval(inner, row)?.as_bool()?;
            Ok(Value::Bool(!v))
        }
        Node::Binary(BinOp::And, left, right) => {
            if !eval(left, row)?.as_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(right, row)?.as_bool()?))
        }
        Node::Binary(BinOp::Or, left, right) => {
            if eval(left, row)?.as_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(right, row)?.as_bool()?))
        }
        Node::Binary(op, left, right) if op.is_comparison() => {
            let l = eval(left, row)?;
            let r = eval(right, row)?;
            Ok(Value::Bool(compare(*op, &l, &r)?))
        }
        Node::Binary(op, left, right) if op.is_arithmetic() => {
            let l = eval(left, row)?;
            let r = eval(right, row)?;
            arithmetic(*op, &l, &r)
        }
        Node::Binary(op, ..) => Err(EngineError::internal(format!("unhandled operator {op}"))),
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> EngineResult<bool> {
    if let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) {
        return Ok(match op {
            BinOp::Eq => lf == rf,
            BinOp::NotEq => lf != rf,
            BinOp::Lt => lf < rf,
            BinOp::Gt => lf > rf,
            BinOp::LtEq => lf <= rf,
            BinOp::GtEq => lf >= rf,
            _ => unreachable!(),
        });
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(match op {
            BinOp::Eq => a == b,
            BinOp::NotEq => a != b,
            BinOp::Lt => a < b,
            BinOp::Gt => a > b,
            BinOp::LtEq => a <= b,
            BinOp::GtEq => a >= b,
            _ => unreachable!(),
        }),
        (Value::Bool(a), Value::Bool(b)) => Ok(match op {
            BinOp::Eq => a == b,
            BinOp::NotEq => a != b,
            _ => {
                return Err(EngineError::data(
                    "booleans do not support ordering comparisons".to_string(),
                ))
            }
        }),
        _ => Err(EngineError::data(format!(
            "cannot compare {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> EngineResult<Value> {
    let (lf, rf) = match (l.as_f64(), r.as_f64()) {
        (Some(lf), Some(rf)) => (lf, rf),
        _ => {
            return Err(EngineError::data(format!(
                "cannot perform arithmetic on {} and {}",
                l.type_name(),
                r.type_name()
            )))
        }
    };
    let both_int = matches!(l, Value::Int(_)) && matches!(r, Value::Int(_));
    match op {
        BinOp::Add => Ok(numeric_result(lf + rf, both_int)),
        BinOp::Sub => Ok(numeric_result(lf - rf, both_int)),
        BinOp::Mul => Ok(numeric_result(lf * rf, both_int)),
        BinOp::Div => {
            if rf == 0.0 {
                return Err(EngineError::data("division by zero".to_string()));
            }
            Ok(numeric_result(lf / rf, both_int && lf % rf == 0.0))
        }
        BinOp::Mod => {
            if rf == 0.0 {
                return Err(EngineError::data("modulo by zero".to_string()));
            }
            Ok(numeric_result(lf % rf, both_int))
        }
        _ => unreachable!(),
    }
}

fn numeric_result(v: f64, as_int: bool) -> Value {
    if as_int {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatedProjection;
    use flatbase_ast::parse_expression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_schema() -> Arc<TableSchema> {
        let mut schema = TableSchema::new();
        schema.insert("id".into(), ColumnType::Integer);
        schema.insert("name".into(), ColumnType::String);
        schema.insert("salary".into(), ColumnType::Float);
        Arc::new(schema)
    }

    fn write_rows(lines: &[&str]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "id,name,salary").unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
        f
    }

    #[tokio::test]
    async fn scans_and_filters_rows() {
        let file = write_rows(&["1,Ana,1200.0", "2,Bo,800.0", "3,Ci,5000.0", "4,Di,1000.0"]);
        let predicate = parse_expression("salary >= 1000 AND id <> 3").unwrap();
        let schema = test_schema();
        let stream = scan_table(
            file.path().to_path_buf(),
            schema,
            ValidatedProjection::Columns(vec!["name".into(), "salary".into()]),
            Some(predicate),
        )
        .await
        .unwrap();

        use futures::StreamExt;
        let rows: Vec<JsonValue> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Ana");
        assert_eq!(rows[1]["name"], "Di");
    }

    #[tokio::test]
    async fn wildcard_preserves_declared_column_order() {
        let file = write_rows(&["3,Ci,5000.0", "4,Di,1000.0"]);
        let predicate = parse_expression("id * 2 > 5").unwrap();
        let schema = test_schema();
        let stream = scan_table(
            file.path().to_path_buf(),
            schema,
            ValidatedProjection::Wildcard,
            Some(predicate),
        )
        .await
        .unwrap();

        use futures::StreamExt;
        let rows: Vec<JsonValue> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name", "salary"]);
    }

    #[tokio::test]
    async fn short_circuit_and_skips_type_error() {
        // name is a string column; "name > 3" would be a type error, but
        // short-circuit must prevent evaluating the right side of AND.
        let file = write_rows(&["1,Ana,1200.0"]);
        let schema = test_schema();
        let ast = parse_expression("id = 999 AND name > 3").unwrap();
        let stream = scan_table(
            file.path().to_path_buf(),
            schema,
            ValidatedProjection::Wildcard,
            Some(ast),
        )
        .await
        .unwrap();
        use futures::StreamExt;
        let rows: Vec<EngineResult<JsonValue>> = stream.collect().await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn empty_numeric_field_casts_to_zero() {
        let file = write_rows(&["1,Ana,"]);
        let schema = test_schema();
        let stream = scan_table(
            file.path().to_path_buf(),
            schema,
            ValidatedProjection::Wildcard,
            None,
        )
        .await
        .unwrap();
        use futures::StreamExt;
        let rows: Vec<JsonValue> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows[0]["salary"], 0.0);
    }
}
