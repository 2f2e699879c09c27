use flatbase_ast::{BinOp, Leaf, Node};

use crate::catalog::{Catalog, ColumnType, TableSchema};
use crate::error::{EngineError, EngineResult};
use crate::splitter::{ColumnRef, Projection, RawQuery, TableRef};

/// The static type of an expression node, tracked during validation so
/// that operator rules (§4.3) can be checked without re-walking the tree
/// at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticType {
    Int,
    Float,
    String,
    Bool,
}

impl From<ColumnType> for StaticType {
    fn from(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Integer => StaticType::Int,
            ColumnType::Float => StaticType::Float,
            ColumnType::String => StaticType::String,
        }
    }
}

impl StaticType {
    fn is_numeric(self) -> bool {
        matches!(self, StaticType::Int | StaticType::Float)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedProjection {
    Wildcard,
    Columns(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub database: String,
    pub table: String,
    pub projection: ValidatedProjection,
    pub predicate: Option<Node>,
}

/// Bind identifiers against the catalog, type-check the predicate, and
/// rewrite every identifier leaf to its simple column name.
pub fn validate(raw: RawQuery, catalog: &Catalog, requested_db: Option<&str>) -> EngineResult<ValidatedQuery> {
    let (db_name, table_name) = resolve_table(&raw.table, catalog, requested_db)?;
    let database = catalog.database(&db_name).ok_or_else(|| {
        EngineError::programming(format!("unknown database '{db_name}'"))
    })?;
    let schema = database.table(&table_name).ok_or_else(|| {
        EngineError::programming(format!("unknown table '{table_name}'"))
    })?;

    let projection = resolve_projection(&raw.projection, &table_name, schema)?;

    let predicate = raw
        .predicate
        .map(|node| {
            let (rewritten, ty) = check_and_rewrite(node, schema)?;
            if ty != StaticType::Bool {
                return Err(EngineError::programming(
                    "WHERE clause must be a boolean expression".to_string(),
                ));
            }
            Ok(rewritten)
        })
        .transpose()?;

    Ok(ValidatedQuery {
        database: db_name,
        table: table_name,
        projection,
        predicate,
    })
}

fn resolve_table(
    table_ref: &TableRef,
    catalog: &Catalog,
    requested_db: Option<&str>,
) -> EngineResult<(String, String)> {
    match table_ref.parts.as_slice() {
        [table] => {
            let db_name = requested_db
                .map(|s| s.to_string())
                .or_else(|| catalog.only_database().map(|s| s.to_string()))
                .ok_or_else(|| {
                    EngineError::programming(format!(
                        "cannot infer database for table '{table}': multiple databases are loaded"
                    ))
                })?;
            let db = catalog
                .database(&db_name)
                .ok_or_else(|| EngineError::programming(format!("unknown database '{db_name}'")))?;
            if !db.tables.contains_key(table) {
                return Err(EngineError::programming(format!(
                    "unknown table '{table}' in database '{db_name}'"
                )));
            }
            Ok((db_name, table.clone()))
        }
        [db_name, table] => {
            let db = catalog
                .database(db_name)
                .ok_or_else(|| EngineError::programming(format!("unknown database '{db_name}'")))?;
            if !db.tables.contains_key(table) {
                return Err(EngineError::programming(format!(
                    "unknown table '{table}' in database '{db_name}'"
                )));
            }
            Ok((db_name.clone(), table.clone()))
        }
        _ => Err(EngineError::programming("invalid table reference".to_string())),
    }
}

fn resolve_projection(
    projection: &Projection,
    table_name: &str,
    schema: &TableSchema,
) -> EngineResult<ValidatedProjection> {
    match projection {
        Projection::Wildcard => Ok(ValidatedProjection::Wildcard),
        Projection::Columns(cols) => {
            let mut names = Vec::with_capacity(cols.len());
            for col in cols {
                names.push(resolve_column_ref(col, table_name, schema)?);
            }
            Ok(ValidatedProjection::Columns(names))
        }
    }
}

fn resolve_column_ref(col: &ColumnRef, table_name: &str, schema: &TableSchema) -> EngineResult<String> {
    match col.parts.as_slice() {
        [name] => {
            if schema.contains_key(name) {
                Ok(name.clone())
            } else {
                Err(EngineError::programming(format!("unknown column '{name}'")))
            }
        }
        [table, name] => {
            if table != table_name {
                return Err(EngineError::programming(format!(
                    "unknown table '{table}' referenced by column '{table}.{name}'"
                )));
            }
            if schema.contains_key(name) {
                Ok(name.clone())
            } else {
                Err(EngineError::programming(format!("unknown column '{name}'")))
            }
        }
        [_db, table, name] => {
            if table != table_name {
                return Err(EngineError::programming(format!(
                    "unknown table '{table}' referenced by column '{table}.{name}'"
                )));
            }
            if schema.contains_key(name) {
                Ok(name.clone())
            } else {
                Err(EngineError::programming(format!("unknown column '{name}'")))
            }
        }
        _ => Err(EngineError::programming("invalid column reference".to_string())),
    }
}

/// Post-order type-check and rewrite: identifier leaves become simple
/// column names; every operator's operand types are checked against the
/// rules in §4.3.
fn check_and_rewrite(node: Node, schema: &TableSchema) -> EngineResult<(Node, StaticType)> {
    match node {
        Node::Leaf(Leaf::IntLit(v)) => Ok((Node::Leaf(Leaf::IntLit(v)), StaticType::Int)),
        Node::Leaf(Leaf::FloatLit(v)) => Ok((Node::Leaf(Leaf::FloatLit(v)), StaticType::Float)),
        Node::Leaf(Leaf::StrLit(v)) => Ok((Node::Leaf(Leaf::StrLit(v)), StaticType::String)),
        Node::Leaf(Leaf::Ident(name)) => {
            let simple = simple_column_name(&name);
            let ty = schema
                .get(simple)
                .copied()
                .ok_or_else(|| EngineError::programming(format!("unknown column '{name}'")))?;
            Ok((Node::Leaf(Leaf::Ident(simple.to_string())), ty.into()))
        }
        Node::Not(inner) => {
            let (inner, ty) = check_and_rewrite(*inner, schema)?;
            if ty != StaticType::Bool {
                return Err(EngineError::programming(
                    "NOT requires a boolean operand".to_string(),
                ));
            }
            Ok((Node::Not(Box::new(inner)), StaticType::Bool))
        }
        Node::Binary(op, left, right) => {
            let (left, lty) = check_and_rewrite(*left, schema)?;
            let (right, rty) = check_and_rewrite(*right, schema)?;
            let result_ty = check_operator(op, lty, rty)?;
            Ok((Node::Binary(op, Box::new(left), Box::new(right)), result_ty))
        }
    }
}

fn simple_column_name(dotted: &str) -> &str {
    dotted.rsplit('.').next().unwrap_or(dotted)
}

fn check_operator(op: BinOp, lty: StaticType, rty: StaticType) -> EngineResult<StaticType> {
    if op.is_logical() {
        if lty == StaticType::Bool && rty == StaticType::Bool {
            Ok(StaticType::Bool)
        } else {
            Err(EngineError::programming(format!(
                "{op} requires boolean operands, found {lty:?} and {rty:?}"
            )))
        }
    } else if op.is_comparison() {
        let compatible = lty == rty || (lty.is_numeric() && rty.is_numeric());
        if compatible {
            Ok(StaticType::Bool)
        } else {
            Err(EngineError::programming(format!(
                "{op} has incompatible operand types {lty:?} and {rty:?}"
            )))
        }
    } else if op.is_arithmetic() {
        if lty.is_numeric() && rty.is_numeric() {
            if lty == StaticType::Float || rty == StaticType::Float {
                Ok(StaticType::Float)
            } else {
                Ok(StaticType::Int)
            }
        } else {
            Err(EngineError::programming(format!(
                "{op} requires numeric operands, found {lty:?} and {rty:?}"
            )))
        }
    } else {
        Err(EngineError::internal(format!("unhandled operator {op}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnType, Database, TableSchema};
    use crate::splitter::split_query;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn test_catalog() -> Catalog {
        let mut schema = TableSchema::new();
        schema.insert("id".into(), ColumnType::Integer);
        schema.insert("name".into(), ColumnType::String);
        schema.insert("salary".into(), ColumnType::Float);
        let mut tables = HashMap::new();
        tables.insert("employees".to_string(), schema);
        let mut databases = HashMap::new();
        databases.insert(
            "hr".to_string(),
            Database {
                name: "hr".into(),
                root: PathBuf::from("/tmp/hr"),
                tables,
            },
        );
        Catalog { databases }
    }

    #[test]
    fn validates_and_rewrites_simple_query() {
        let catalog = test_catalog();
        let raw = split_query(
            "SELECT name, salary FROM employees WHERE salary >= 1000 AND id <> 3",
        )
        .unwrap();
        let validated = validate(raw, &catalog, None).unwrap();
        assert_eq!(validated.database, "hr");
        assert_eq!(validated.table, "employees");
        assert_eq!(
            validated.projection,
            ValidatedProjection::Columns(vec!["name".into(), "salary".into()])
        );
        assert!(validated.predicate.is_some());
    }

    #[test]
    fn rejects_unknown_column() {
        let catalog = test_catalog();
        let raw = split_query("SELECT unknown FROM employees").unwrap();
        let err = validate(raw, &catalog, None).unwrap_err();
        assert!(err.message.contains("unknown"));
    }

    #[test]
    fn rejects_incompatible_comparison() {
        let catalog = test_catalog();
        let raw = split_query("SELECT id FROM employees WHERE name > 3").unwrap();
        let err = validate(raw, &catalog, None).unwrap_err();
        assert!(err.message.contains("incompatible"));
    }

    #[test]
    fn wildcard_projection_is_preserved() {
        let catalog = test_catalog();
        let raw = split_query("SELECT * FROM employees WHERE id * 2 > 5").unwrap();
        let validated = validate(raw, &catalog, None).unwrap();
        assert_eq!(validated.projection, ValidatedProjection::Wildcard);
    }
}
