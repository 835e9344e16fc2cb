use serde_json::{Map, Value as Json};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SelectItem, SetExpr, Statement, TableFactor, TableObject,
    Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::validate::{END_TIME, ROOM_ID, START_TIME};

const TABLE: &str = "reservations";

/// Payload fields filled by INSERT values, by position.
const INSERT_FIELDS: [&str; 3] = [ROOM_ID, START_TIME, END_TIME];

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Raw request payload; validated by the engine, not here.
    InsertReservation {
        payload: Json,
    },
    DeleteReservation {
        id: String,
    },
    SelectReservations {
        room_id: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let stmt = match stmts.as_slice() {
        [] => return Err(SqlError::Empty),
        [stmt] => stmt,
        _ => return Err(SqlError::Unsupported("multiple statements".into())),
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// `INSERT INTO reservations [(..)] VALUES (room_id, start_time, end_time)`.
///
/// With a column list, values map to the named fields. Without one they map
/// by position, and missing trailing values leave the field out so the
/// validator reports it.
fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    if table != TABLE {
        return Err(SqlError::UnknownTable(table));
    }

    let rows = extract_insert_rows(insert)?;
    if rows.len() > 1 {
        return Err(SqlError::Unsupported("multi-row INSERT".into()));
    }
    let values = &rows[0];
    let fields = insert_fields(&insert.columns)?;
    let arity_ok = if insert.columns.is_empty() {
        values.len() <= fields.len()
    } else {
        values.len() == fields.len()
    };
    if !arity_ok {
        return Err(SqlError::WrongArity(TABLE, fields.len(), values.len()));
    }

    let mut payload = Map::new();
    for (field, expr) in fields.iter().zip(values) {
        payload.insert((*field).to_string(), expr_to_json(expr)?);
    }
    Ok(Command::InsertReservation {
        payload: Json::Object(payload),
    })
}

fn insert_fields(columns: &[ast::Ident]) -> Result<Vec<&'static str>, SqlError> {
    if columns.is_empty() {
        return Ok(INSERT_FIELDS.to_vec());
    }
    let mut fields = Vec::with_capacity(columns.len());
    for column in columns {
        let name = column.value.to_lowercase();
        let field = match name.as_str() {
            "room_id" | "roomid" => ROOM_ID,
            "start_time" | "starttime" => START_TIME,
            "end_time" | "endtime" => END_TIME,
            _ => return Err(SqlError::UnknownColumn(name)),
        };
        if fields.contains(&field) {
            return Err(SqlError::Parse(format!("column {name} given twice")));
        }
        fields.push(field);
    }
    Ok(fields)
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    if table != TABLE {
        return Err(SqlError::UnknownTable(table));
    }
    let selection = delete.selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    let id = extract_eq_filter(selection, &["id"])?.ok_or(SqlError::MissingFilter("id"))?;
    Ok(Command::DeleteReservation { id })
}

/// `SELECT * FROM reservations WHERE room_id = '..'`. Rows always carry all
/// four columns, so any other projection is rejected.
fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    if !matches!(select.projection.as_slice(), [SelectItem::Wildcard(_)]) {
        return Err(SqlError::Unsupported("projection other than *".into()));
    }

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    if table != TABLE {
        return Err(SqlError::UnknownTable(table));
    }

    let selection = select
        .selection
        .as_ref()
        .ok_or(SqlError::MissingFilter("room_id"))?;
    let room_id = extract_eq_filter(selection, &["room_id", "roomid"])?
        .ok_or(SqlError::MissingFilter("room_id"))?;
    Ok(Command::SelectReservations { room_id })
}

/// Find `<column> = '<value>'` among AND-ed conditions.
fn extract_eq_filter(expr: &Expr, columns: &[&str]) -> Result<Option<String>, SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => match extract_eq_filter(left, columns)? {
            Some(found) => Ok(Some(found)),
            None => extract_eq_filter(right, columns),
        },
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => match expr_column_name(left) {
            Some(col) if columns.contains(&col.as_str()) => Ok(Some(parse_string_expr(right)?)),
            _ => Ok(None),
        },
        Expr::Nested(inner) => extract_eq_filter(inner, columns),
        _ => Ok(None),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) if values.rows.is_empty() => {
            Err(SqlError::Parse("empty VALUES".into()))
        }
        SetExpr::Values(values) => Ok(&values.rows),
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

/// Literal to JSON without interpreting it; the validator decides what is acceptable.
fn expr_to_json(expr: &Expr) -> Result<Json, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(Json::Null),
        Some(Value::SingleQuotedString(s)) => Ok(Json::String(s.clone())),
        Some(Value::Boolean(b)) => Ok(Json::Bool(*b)),
        Some(Value::Number(n, _)) => n
            .parse::<serde_json::Number>()
            .map(Json::Number)
            .map_err(|e| SqlError::Parse(format!("bad number {n}: {e}"))),
        Some(value) => Err(SqlError::Parse(format!("unsupported literal {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: {2} values for {1} columns")]
    WrongArity(&'static str, usize, usize),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
}
