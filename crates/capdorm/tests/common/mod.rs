//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use capdorm::{CapabilityManager, Mapper, Record, SecureDb, Store};

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct User {
    #[record(primary_key)]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct UserComment {
    #[record(primary_key)]
    pub id: i64,
    #[record(read_by(User, id), write_by(User, id))]
    pub user_id: i64,
    pub body: String,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Metadata {
    pub created_at: i64,
    pub author: String,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct BlogPost {
    #[record(embed)]
    pub meta: Metadata,
    #[record(primary_key)]
    pub id: i64,
    pub title: String,
    pub rating: Option<f64>,
    #[record(skip)]
    pub rendered: Vec<String>,
    revision: u32,
}

impl BlogPost {
    pub fn new(author: &str, title: &str) -> Self {
        Self {
            meta: Metadata {
                created_at: 1_700_000_000,
                author: author.to_string(),
            },
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn bump(&mut self) {
        self.revision += 1;
    }
}

/// A record without a primary key; read permission cannot be determined.
#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct AuditEntry {
    pub message: String,
}

pub const SCHEMA: &str = r#"
    CREATE TABLE "user" (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE user_comment (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        body TEXT NOT NULL
    );
    CREATE TABLE blog_post (
        created_at INTEGER NOT NULL,
        author TEXT NOT NULL,
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        rating REAL
    );
    CREATE TABLE audit_entry (message TEXT NOT NULL);
"#;

/// An in-memory store with every fixture table created.
pub fn store() -> Arc<Store> {
    init_tracing();
    let store = Store::open_in_memory().unwrap();
    store.execute_batch(SCHEMA).unwrap();
    Arc::new(store)
}

pub fn secure_db() -> SecureDb {
    SecureDb::new(Mapper::new(store()), Arc::new(CapabilityManager::new()))
}

/// Insert users named `names`, in order, through the unfiltered store.
pub fn users(db: &SecureDb, names: &[&str]) -> Vec<User> {
    use capdorm::RecordStore;

    names
        .iter()
        .map(|name| {
            let mut user = User {
                id: 0,
                name: name.to_string(),
            };
            db.inner().create(&mut user).unwrap();
            user
        })
        .collect()
}
