#![allow(dead_code)]

use repokit_core::db::open_db_in_memory;
use repokit_core::{
    Attributes, Boolean, Container, Criteria, HandleOutcome, Instance, KeyType, MethodContext,
    Migration, Model, ModelMethod, QueryBuilder, Relation, RepoResult, Repository,
    RepositoryDefinition, Scope,
};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                age INTEGER,
                active INTEGER NOT NULL DEFAULT 1,
                role TEXT,
                created_at INTEGER,
                updated_at INTEGER
            );
            CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        sql: "
            CREATE TABLE tokens (
                id TEXT PRIMARY KEY,
                label TEXT,
                created_at INTEGER,
                updated_at INTEGER
            );
        ",
    },
];

#[derive(Default)]
pub struct User;

impl Model for User {
    fn table(&self) -> &str {
        "users"
    }

    fn fillable(&self) -> &[&str] {
        &["name", "email", "age", "active", "role"]
    }

    fn uses_timestamps(&self) -> bool {
        true
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "posts" => Some(Relation::has_many("posts", "post", "user_id")),
            "first_post" => Some(Relation::has_one("first_post", "post", "user_id")),
            _ => None,
        }
    }

    fn method(&self, name: &str) -> Option<ModelMethod> {
        match name {
            "active" => Some(active_users),
            "named" => Some(named_users),
            "total" => Some(total_users),
            "loaded" => Some(loaded_users),
            _ => None,
        }
    }
}

fn active_users(_: &MethodContext<'_>, query: QueryBuilder) -> RepoResult<HandleOutcome> {
    Ok(HandleOutcome::Chain(query.where_eq("active", 1_i64)?))
}

fn named_users(context: &MethodContext<'_>, query: QueryBuilder) -> RepoResult<HandleOutcome> {
    match context.args.first() {
        Some(name) => Ok(HandleOutcome::Chain(query.where_eq("name", name.clone())?)),
        None => Ok(HandleOutcome::Chain(query.where_not_null("name")?)),
    }
}

fn total_users(context: &MethodContext<'_>, query: QueryBuilder) -> RepoResult<HandleOutcome> {
    let total = context.store.count(&query)?;
    Ok(HandleOutcome::Value(Value::Integer(total as i64)))
}

fn loaded_users(context: &MethodContext<'_>, query: QueryBuilder) -> RepoResult<HandleOutcome> {
    let rows = context
        .store
        .select(&query.where_eq("role", "admin".to_string())?, &Default::default())?;
    Ok(HandleOutcome::Resolved(rows))
}

#[derive(Default)]
pub struct Post;

impl Model for Post {
    fn table(&self) -> &str {
        "posts"
    }

    fn fillable(&self) -> &[&str] {
        &["user_id", "title"]
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to("author", "user", "user_id")),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct Token;

impl Model for Token {
    fn table(&self) -> &str {
        "tokens"
    }

    fn key_type(&self) -> KeyType {
        KeyType::Uuid
    }

    fn fillable(&self) -> &[&str] {
        &["label"]
    }

    fn uses_timestamps(&self) -> bool {
        true
    }
}

/// Narrows to users at least `min` years old.
pub struct MinAge(pub i64);

impl Criteria for MinAge {
    fn apply(&self, repository: &mut Repository<'_>) -> RepoResult<()> {
        repository.filter([("age", ">=", Value::Integer(self.0))], Boolean::And)?;
        Ok(())
    }
}

/// Queues a named scope from inside criteria application.
pub struct OnlyActive;

impl Criteria for OnlyActive {
    fn apply(&self, repository: &mut Repository<'_>) -> RepoResult<()> {
        repository.scope("active");
        Ok(())
    }
}

pub fn container() -> Container {
    let mut container = Container::new();
    container.bind_model::<User>("user").unwrap();
    container.bind_model::<Post>("post").unwrap();
    container.bind_model::<Token>("token").unwrap();
    container
        .bind_criteria("min_age", |args| match args.first() {
            Some(Value::Integer(min)) => Ok(MinAge(*min)),
            _ => Err("min_age expects one integer".to_string()),
        })
        .unwrap();
    container
        .bind_criteria("only_active", |_| Ok(OnlyActive))
        .unwrap();
    container
        .bind("mailer", |_| Ok(Instance::Service("mailer")))
        .unwrap();
    container
}

pub fn connection() -> Connection {
    open_db_in_memory(MIGRATIONS).unwrap()
}

/// User repository whose boot hook counts its runs.
pub struct UserRepository {
    pub boots: Arc<AtomicUsize>,
}

impl UserRepository {
    pub fn counting() -> (Self, Arc<AtomicUsize>) {
        let boots = Arc::new(AtomicUsize::new(0));
        (
            Self {
                boots: Arc::clone(&boots),
            },
            boots,
        )
    }
}

impl RepositoryDefinition for UserRepository {
    fn name(&self) -> &str {
        "UserRepository"
    }

    fn model(&self) -> &str {
        "user"
    }

    fn boot(&self, _repository: &mut Repository<'_>) -> RepoResult<()> {
        self.boots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// User repository whose boot hook limits reads to active users.
pub struct ActiveUserRepository;

impl RepositoryDefinition for ActiveUserRepository {
    fn name(&self) -> &str {
        "ActiveUserRepository"
    }

    fn model(&self) -> &str {
        "user"
    }

    fn boot(&self, repository: &mut Repository<'_>) -> RepoResult<()> {
        repository.scope(Scope::named("active"));
        Ok(())
    }
}

pub struct PostRepository;

impl RepositoryDefinition for PostRepository {
    fn name(&self) -> &str {
        "PostRepository"
    }

    fn model(&self) -> &str {
        "post"
    }
}

pub struct TokenRepository;

impl RepositoryDefinition for TokenRepository {
    fn name(&self) -> &str {
        "TokenRepository"
    }

    fn model(&self) -> &str {
        "token"
    }
}

/// Inserts users directly, bypassing the repository.
pub fn seed_users(conn: &Connection, rows: &[(&str, i64, bool, &str)]) -> Vec<i64> {
    rows.iter()
        .map(|(name, age, active, role)| {
            conn.execute(
                "INSERT INTO users (name, age, active, role) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, age, active, role],
            )
            .unwrap();
            conn.last_insert_rowid()
        })
        .collect()
}

pub fn seed_post(conn: &Connection, user_id: i64, title: &str) -> i64 {
    conn.execute(
        "INSERT INTO posts (user_id, title) VALUES (?1, ?2)",
        rusqlite::params![user_id, title],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn user(name: &str) -> Attributes {
    Attributes::new().with("name", name.to_string())
}

pub fn names(records: &[repokit_core::Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.text("name").unwrap_or_default().to_string())
        .collect()
}
