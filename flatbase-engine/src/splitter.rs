use flatbase_ast::{parse_expression, Node};

use crate::error::{EngineError, EngineResult};

/// The tokens that are recognised but deliberately unimplemented. Matching
/// is case-insensitive and ignores occurrences inside string literals.
const UNSUPPORTED_TOKENS: &[&str] = &[
    "group by",
    "order by",
    "having",
    "limit",
    "offset",
    "left join",
    "right join",
    "inner join",
    "outer join",
    "join",
    "union",
    "intersect",
    "except",
    "insert",
    "update",
    "delete",
    "create",
    "drop",
    "alter",
    "in(",
    "between",
    "like",
    "is null",
    "exists",
    "distinct",
    "top",
    "into",
    " as ",
    "count(",
    "min(",
    "max(",
    "sum(",
    "avg(",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Wildcard,
    Columns(Vec<ColumnRef>),
}

/// A (possibly dotted) identifier of 1 to 3 parts:
/// `column`, `table.column`, or `database.table.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub parts: Vec<String>,
}

impl ColumnRef {
    pub fn simple_name(&self) -> &str {
        self.parts.last().expect("ColumnRef always has >=1 part")
    }
}

/// `table` or `database.table`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub projection: Projection,
    pub table: TableRef,
    pub predicate: Option<Node>,
}

/// Normalise, gate, and split a raw SELECT statement into its clauses.
pub fn split_query(raw: &str) -> EngineResult<RawQuery> {
    let normalized = normalize(raw)?;
    gate_unsupported(&normalized)?;

    let upper = normalized.to_ascii_uppercase();
    let select_pos = find_keyword(&upper, "SELECT")?;
    let from_pos = find_keyword(&upper, "FROM")?;
    let where_pos = find_optional_keyword(&upper, "WHERE")?;

    let select_at = select_pos.ok_or_else(|| {
        EngineError::programming("query is missing a SELECT clause".to_string())
    })?;
    let from_at = from_pos
        .ok_or_else(|| EngineError::programming("query is missing a FROM clause".to_string()))?;

    if from_at < select_at + "SELECT".len() {
        return Err(EngineError::programming(
            "FROM must appear after SELECT".to_string(),
        ));
    }
    if let Some(where_at) = where_pos {
        if where_at < from_at {
            return Err(EngineError::programming(
                "WHERE must appear after FROM".to_string(),
            ));
        }
    }

    let projection_str = normalized[select_at + "SELECT".len()..from_at].trim();
    let (table_str, predicate_str) = match where_pos {
        Some(where_at) => (
            normalized[from_at + "FROM".len()..where_at].trim(),
            Some(normalized[where_at + "WHERE".len()..].trim()),
        ),
        None => (normalized[from_at + "FROM".len()..].trim(), None),
    };

    let projection = parse_projection(projection_str)?;
    let table = parse_table(table_str)?;
    let predicate = predicate_str
        .map(parse_expression)
        .transpose()
        .map_err(EngineError::from)?;

    Ok(RawQuery {
        projection,
        table,
        predicate,
    })
}

fn normalize(raw: &str) -> EngineResult<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();

    // A semicolon is only tolerated as the final character; anything
    // after it (other than whitespace, already collapsed away) means
    // more than one statement was submitted.
    if let Some(pos) = find_unquoted(trimmed, ';') {
        if pos != trimmed.len() - 1 {
            return Err(EngineError::not_supported(
                "multiple SQL statements are not supported".to_string(),
            ));
        }
        return Ok(trimmed[..pos].trim().to_string());
    }

    Ok(trimmed.to_string())
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_string = false;
    let mut quote = '\'';
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                in_string = true;
                quote = c;
            }
            c if c == needle => return Some(i),
            _ => {}
        }
    }
    None
}

fn gate_unsupported(query: &str) -> EngineResult<()> {
    let lower = query.to_ascii_lowercase();
    let mut in_string = false;
    let mut quote = '\'';
    let mut escaped = false;
    let chars: Vec<char> = lower.chars().collect();
    let mut masked = String::with_capacity(chars.len());

    for &c in &chars {
        if escaped {
            masked.push(' ');
            escaped = false;
            continue;
        }
        if in_string {
            masked.push(' ');
            if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                in_string = true;
                quote = c;
                masked.push(' ');
            }
            other => masked.push(other),
        }
    }

    for token in UNSUPPORTED_TOKENS {
        if masked.contains(token) {
            return Err(EngineError::not_supported(format!(
                "'{}' is not supported",
                token.trim()
            )));
        }
    }
    Ok(())
}

fn find_keyword(upper: &str, keyword: &str) -> EngineResult<Option<usize>> {
    let positions = find_all_word_boundaries(upper, keyword);
    match positions.len() {
        0 => Ok(None),
        1 => Ok(Some(positions[0])),
        _ => Err(EngineError::programming(format!(
            "duplicate {keyword} clause"
        ))),
    }
}

fn find_optional_keyword(upper: &str, keyword: &str) -> EngineResult<Option<usize>> {
    find_keyword(upper, keyword)
}

fn find_all_word_boundaries(haystack: &str, word: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let bytes = haystack.as_bytes();
    let wlen = word.len();
    if wlen == 0 || wlen > bytes.len() {
        return positions;
    }
    for i in 0..=(bytes.len() - wlen) {
        if &haystack[i..i + wlen] == word {
            let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
            let after_ok =
                i + wlen == bytes.len() || !bytes[i + wlen].is_ascii_alphanumeric();
            if before_ok && after_ok {
                positions.push(i);
            }
        }
    }
    positions
}

fn parse_projection(s: &str) -> EngineResult<Projection> {
    if s.trim() == "*" {
        return Ok(Projection::Wildcard);
    }
    if s.trim().is_empty() {
        return Err(EngineError::programming("empty projection list".to_string()));
    }

    let mut cols = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(EngineError::programming(
                "empty column reference in projection list".to_string(),
            ));
        }
        if part == "*" {
            return Err(EngineError::programming(
                "cannot mix '*' with named columns".to_string(),
            ));
        }
        cols.push(parse_dotted(part, 3)?);
    }
    Ok(Projection::Columns(
        cols.into_iter().map(|parts| ColumnRef { parts }).collect(),
    ))
}

fn parse_table(s: &str) -> EngineResult<TableRef> {
    if s.trim().is_empty() {
        return Err(EngineError::programming("empty FROM clause".to_string()));
    }
    if s.contains(',') {
        return Err(EngineError::not_supported(
            "joins between multiple tables are not supported".to_string(),
        ));
    }
    let parts = parse_dotted(s.trim(), 2)?;
    Ok(TableRef { parts })
}

fn parse_dotted(s: &str, max_parts: usize) -> EngineResult<Vec<String>> {
    let parts: Vec<String> = s.split('.').map(|p| p.trim().to_string()).collect();
    if parts.is_empty() || parts.len() > max_parts {
        return Err(EngineError::programming(format!(
            "invalid identifier '{s}'"
        )));
    }
    for p in &parts {
        if !is_simple_identifier(p) {
            return Err(EngineError::programming(format!(
                "invalid identifier '{s}'"
            )));
        }
    }
    Ok(parts)
}

fn is_simple_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_select_from_where() {
        let q = split_query("SELECT name, salary FROM employees WHERE salary >= 1000 AND id <> 3")
            .unwrap();
        assert_eq!(
            q.projection,
            Projection::Columns(vec![
                ColumnRef { parts: vec!["name".into()] },
                ColumnRef { parts: vec!["salary".into()] },
            ])
        );
        assert_eq!(q.table, TableRef { parts: vec!["employees".into()] });
        assert!(q.predicate.is_some());
    }

    #[test]
    fn wildcard_projection() {
        let q = split_query("SELECT * FROM employees").unwrap();
        assert_eq!(q.projection, Projection::Wildcard);
        assert!(q.predicate.is_none());
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = split_query("SELECT id FROM employees; DROP TABLE employees").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotSupported);
    }

    #[test]
    fn rejects_group_by() {
        let err = split_query("SELECT id FROM employees GROUP BY id").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotSupported);
    }

    #[test]
    fn allows_group_by_text_inside_string_literal() {
        // The literal contains the substring "group by" but it's quoted,
        // so the gate must not trip on it.
        let q = split_query("SELECT name FROM employees WHERE name = 'group by this'").unwrap();
        assert!(q.predicate.is_some());
    }

    #[test]
    fn rejects_join() {
        let err = split_query("SELECT id FROM employees JOIN departments").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotSupported);
    }

    #[test]
    fn rejects_missing_from() {
        let err = split_query("SELECT id").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Programming);
    }

    #[test]
    fn qualified_table_and_column() {
        let q = split_query("SELECT hr.employees.name FROM hr.employees").unwrap();
        assert_eq!(
            q.table,
            TableRef { parts: vec!["hr".into(), "employees".into()] }
        );
    }
}
