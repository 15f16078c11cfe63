/*!
Database interaction module.

The Postgres database to which this connects is meant to have the following
tables.

```sql
CREATE TABLE schools (
    abbr    TEXT PRIMARY KEY,   /* always lower case */
    name    TEXT NOT NULL,
    address TEXT NOT NULL
);

CREATE TABLE users (
    email          TEXT PRIMARY KEY,
    firstname      TEXT NOT NULL,
    lastname       TEXT NOT NULL,
    age            INTEGER NOT NULL,
    grade          INTEGER NOT NULL,
    schoolname     TEXT NOT NULL,
    school_abbr    TEXT REFERENCES schools(abbr),
    password       TEXT NOT NULL,   /* bcrypt hash */
    role           TEXT NOT NULL,   /* one of { 'student', 'educator' } */
    email_verified BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE keys (
    email  TEXT PRIMARY KEY REFERENCES users(email),
    key    TEXT NOT NULL,
    issued TIMESTAMPTZ NOT NULL
);

CREATE TABLE projects (
    owner    TEXT REFERENCES users(email),
    name     TEXT,
    files    TEXT NOT NULL,     /* JSON array of { filename, contents } */
    modified TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (owner, name)
);
```

Everything above the database goes through the `AccountStore` trait, so
the handlers can be run against `MemStore` as well.
*/
use std::fmt::Write;

use async_trait::async_trait;
use tokio_postgres::{error::SqlState, Client, NoTls};

use crate::{
    auth::SessionKey,
    project::RemoteProject,
    school::School,
    user::User,
};

mod mem;
mod projects;
mod schools;
mod users;

pub use mem::MemStore;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'schools'",
        "CREATE TABLE schools (
            abbr    TEXT PRIMARY KEY,
            name    TEXT NOT NULL,
            address TEXT NOT NULL
        )",
        "DROP TABLE schools",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'users'",
        "CREATE TABLE users (
            email          TEXT PRIMARY KEY,
            firstname      TEXT NOT NULL,
            lastname       TEXT NOT NULL,
            age            INTEGER NOT NULL,
            grade          INTEGER NOT NULL,
            schoolname     TEXT NOT NULL,
            school_abbr    TEXT REFERENCES schools(abbr),
            password       TEXT NOT NULL,
            role           TEXT NOT NULL,
            email_verified BOOLEAN NOT NULL DEFAULT FALSE
        )",
        "DROP TABLE users",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'keys'",
        "CREATE TABLE keys (
            email  TEXT PRIMARY KEY REFERENCES users(email),
            key    TEXT NOT NULL,
            issued TIMESTAMPTZ NOT NULL
        )",
        "DROP TABLE keys",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'projects'",
        "CREATE TABLE projects (
            owner    TEXT REFERENCES users(email),
            name     TEXT,
            files    TEXT NOT NULL,
            modified TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (owner, name)
        )",
        "DROP TABLE projects",
    ),
];

#[derive(Debug, PartialEq)]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl std::error::Error for DbError {}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "; {}", dbe);
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

/// Whether an insert actually inserted, or ran into an existing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    Duplicate,
}

fn is_unique_violation(e: &tokio_postgres::error::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

/**
The persistence operations the rest of the application needs.

Implemented by `Store` (Postgres) and `MemStore` (in process). Per-record
atomicity is left to the implementation; nothing above this trait holds
locks across calls.
*/
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn ensure_db_schema(&self) -> Result<(), DbError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn insert_user(&self, user: &User) -> Result<Insertion, DbError>;
    async fn count_users(&self) -> Result<usize, DbError>;

    async fn get_school(&self, abbr: &str) -> Result<Option<School>, DbError>;
    async fn get_schools(&self) -> Result<Vec<School>, DbError>;
    async fn insert_school(&self, school: &School) -> Result<Insertion, DbError>;

    async fn set_key(&self, email: &str, key: &SessionKey) -> Result<(), DbError>;
    async fn get_key(&self, email: &str) -> Result<Option<SessionKey>, DbError>;

    /// Overwrites any existing project of the same name for `owner`.
    async fn save_project(&self, owner: &str, project: &RemoteProject) -> Result<(), DbError>;
    async fn get_project_names(&self, owner: &str) -> Result<Vec<String>, DbError>;
    async fn get_project(&self, owner: &str, name: &str) -> Result<Option<RemoteProject>, DbError>;
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( {:?} ) called.", &connection_string);

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "Store::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Data DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Data DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(test_stmt.to_owned(), &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(create_stmt.to_owned(), &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(drop_stmt.to_owned(), &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for Store {
    async fn ensure_db_schema(&self) -> Result<(), DbError> {
        Store::ensure_db_schema(self).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Store::get_user_by_email(self, email).await
    }

    async fn insert_user(&self, user: &User) -> Result<Insertion, DbError> {
        Store::insert_user(self, user).await
    }

    async fn count_users(&self) -> Result<usize, DbError> {
        Store::count_users(self).await
    }

    async fn get_school(&self, abbr: &str) -> Result<Option<School>, DbError> {
        Store::get_school(self, abbr).await
    }

    async fn get_schools(&self) -> Result<Vec<School>, DbError> {
        Store::get_schools(self).await
    }

    async fn insert_school(&self, school: &School) -> Result<Insertion, DbError> {
        Store::insert_school(self, school).await
    }

    async fn set_key(&self, email: &str, key: &SessionKey) -> Result<(), DbError> {
        Store::set_key(self, email, key).await
    }

    async fn get_key(&self, email: &str) -> Result<Option<SessionKey>, DbError> {
        Store::get_key(self, email).await
    }

    async fn save_project(&self, owner: &str, project: &RemoteProject) -> Result<(), DbError> {
        Store::save_project(self, owner, project).await
    }

    async fn get_project_names(&self, owner: &str) -> Result<Vec<String>, DbError> {
        Store::get_project_names(self, owner).await
    }

    async fn get_project(&self, owner: &str, name: &str) -> Result<Option<RemoteProject>, DbError> {
        Store::get_project(self, owner, name).await
    }
}
