//! SQLite entity store.
//!
//! # Responsibility
//! - Compile `QueryBuilder` state into parameterized SQL.
//! - Map result rows into `Record`s without interpreting column types.
//!
//! # Invariants
//! - Every value reaches SQLite as a bound parameter, never inline.
//! - Every identifier is validated and double-quoted before use.

use crate::error::RepoResult;
use crate::model::{Attributes, Record};
use crate::query::{
    validate_identifier, Columns, Operator, Order, Predicate, PredicateKind, QueryBuilder,
};
use crate::store::EntityStore;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::time::Instant;

/// Entity store over a borrowed SQLite connection.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    fn query_records(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (index, name) in names.iter().enumerate() {
                attributes.insert(name.clone(), row.get::<_, Value>(index)?);
            }
            records.push(Record::new(attributes));
        }

        Ok(records)
    }
}

impl EntityStore for SqliteStore<'_> {
    fn select(&self, query: &QueryBuilder, columns: &Columns) -> RepoResult<Vec<Record>> {
        let started_at = Instant::now();
        let (sql, binds) = compile_select(query, columns)?;
        let records = self.query_records(&sql, binds)?;
        debug!(
            "event=store_select module=store status=ok table={} rows={} duration_ms={}",
            query.table(),
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    fn count(&self, query: &QueryBuilder) -> RepoResult<u64> {
        let mut binds = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote(query.table())?,
            compile_where(query.predicates(), &mut binds)?
        );
        let count = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get::<_, i64>(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn exists(&self, query: &QueryBuilder) -> RepoResult<bool> {
        let mut binds = Vec::new();
        let mut inner = format!(
            "SELECT 1 FROM {}{}",
            quote(query.table())?,
            compile_where(query.predicates(), &mut binds)?
        );
        compile_window(query, &mut inner, &mut binds);
        let sql = format!("SELECT EXISTS({inner})");
        let exists = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get::<_, i64>(0))?;
        Ok(exists != 0)
    }

    fn insert(&self, table: &str, primary_key: &str, attributes: &Attributes) -> RepoResult<Value> {
        let table = quote(table)?;
        let sql = if attributes.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let mut columns = Vec::with_capacity(attributes.len());
            let mut placeholders = Vec::with_capacity(attributes.len());
            for (index, column) in attributes.columns().enumerate() {
                columns.push(quote(column)?);
                placeholders.push(format!("?{}", index + 1));
            }
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let binds = attributes.iter().map(|(_, value)| value.clone());
        self.conn.execute(&sql, params_from_iter(binds))?;

        Ok(match attributes.get(primary_key) {
            Some(key) => key.clone(),
            None => Value::Integer(self.conn.last_insert_rowid()),
        })
    }

    fn update(
        &self,
        table: &str,
        primary_key: &str,
        key: &Value,
        attributes: &Attributes,
    ) -> RepoResult<usize> {
        if attributes.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::with_capacity(attributes.len());
        let mut binds = Vec::with_capacity(attributes.len() + 1);
        for (column, value) in attributes {
            assignments.push(format!("{} = ?", quote(column)?));
            binds.push(value.clone());
        }
        binds.push(key.clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(table)?,
            assignments.join(", "),
            quote(primary_key)?
        );
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn delete(&self, table: &str, primary_key: &str, keys: &[Value]) -> RepoResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            quote(table)?,
            quote(primary_key)?,
            placeholders(keys.len())
        );
        Ok(self.conn.execute(&sql, params_from_iter(keys.iter()))?)
    }
}

/// Compiles a full `SELECT` for `query`, returning SQL and bind values.
pub fn compile_select(query: &QueryBuilder, columns: &Columns) -> RepoResult<(String, Vec<Value>)> {
    let mut binds = Vec::new();
    let selection = match columns.as_list() {
        None => "*".to_string(),
        Some(list) => list
            .iter()
            .map(|column| quote(column))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
    };

    let mut sql = format!(
        "SELECT {selection} FROM {}{}",
        quote(query.table())?,
        compile_where(query.predicates(), &mut binds)?
    );

    if !query.orders().is_empty() {
        let mut orders = Vec::with_capacity(query.orders().len());
        for order in query.orders() {
            orders.push(match order {
                Order::Column { column, direction } => {
                    format!("{} {}", quote(column)?, direction.as_sql())
                }
                Order::Random => "RANDOM()".to_string(),
            });
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders.join(", "));
    }

    compile_window(query, &mut sql, &mut binds);
    Ok((sql, binds))
}

fn compile_where(predicates: &[Predicate], binds: &mut Vec<Value>) -> RepoResult<String> {
    if predicates.is_empty() {
        return Ok(String::new());
    }
    let mut sql = String::from(" WHERE ");
    push_predicates(predicates, &mut sql, binds)?;
    Ok(sql)
}

fn push_predicates(
    predicates: &[Predicate],
    sql: &mut String,
    binds: &mut Vec<Value>,
) -> RepoResult<()> {
    for (index, predicate) in predicates.iter().enumerate() {
        if index > 0 {
            sql.push(' ');
            sql.push_str(predicate.boolean.as_sql());
            sql.push(' ');
        }

        match &predicate.kind {
            PredicateKind::Compare {
                column,
                operator,
                value,
            } => {
                let column = quote(column)?;
                match (operator, value) {
                    (Operator::Eq, Value::Null) => sql.push_str(&format!("{column} IS NULL")),
                    (Operator::NotEq, Value::Null) => {
                        sql.push_str(&format!("{column} IS NOT NULL"))
                    }
                    _ => {
                        sql.push_str(&format!("{column} {} ?", operator.as_sql()));
                        binds.push(value.clone());
                    }
                }
            }
            PredicateKind::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    sql.push_str(if *negated { "1 = 1" } else { "0 = 1" });
                } else {
                    let keyword = if *negated { "NOT IN" } else { "IN" };
                    sql.push_str(&format!(
                        "{} {keyword} ({})",
                        quote(column)?,
                        placeholders(values.len())
                    ));
                    binds.extend(values.iter().cloned());
                }
            }
            PredicateKind::Null { column, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                sql.push_str(&format!("{} {keyword}", quote(column)?));
            }
            PredicateKind::Group(inner) => {
                if inner.is_empty() {
                    sql.push_str("1 = 1");
                } else {
                    sql.push('(');
                    push_predicates(inner, sql, binds)?;
                    sql.push(')');
                }
            }
        }
    }
    Ok(())
}

fn compile_window(query: &QueryBuilder, sql: &mut String, binds: &mut Vec<Value>) {
    match (query.limit(), query.offset()) {
        (Some(limit), offset) => {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if let Some(offset) = offset {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(offset)));
            }
        }
        (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(offset)));
        }
        (None, None) => {}
    }
}

fn quote(identifier: &str) -> RepoResult<String> {
    Ok(format!("\"{}\"", validate_identifier(identifier)?))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
