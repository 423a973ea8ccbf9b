use diesel::connection::SimpleConnection;
use gotham::state::{FromState, State};
use gotham_derive::StateData;

use std::sync::{Arc, Mutex, MutexGuard};

pub use diesel::sqlite::SqliteConnection as Connection;

embed_migrations!();

/// The wrapper for a database connection that can shared via gotham's state data
#[derive(Clone, StateData)]
pub struct DbConnection {
    connection: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn from_url(url: &str) -> Result<Self, failure::Error> {
        Ok(Self {
            connection: Arc::new(Mutex::new(connect(url)?)),
        })
    }

    pub fn from_state(state: &State) -> Result<MutexGuard<Connection>, failure::Error> {
        Self::borrow_from(state).lock()
    }

    pub fn lock(&self) -> Result<MutexGuard<Connection>, failure::Error> {
        match self.connection.lock() {
            Ok(lock) => Ok(lock),
            Err(_) => Err(failure::err_msg("failed to get lock")),
        }
    }
}

/// Opens the database file at `url`, creating the schema if it doesn't exist yet.
pub fn connect(url: &str) -> Result<Connection, failure::Error> {
    let connection = <Connection as diesel::Connection>::establish(url)?;
    connection.batch_execute("PRAGMA foreign_keys = ON;")?;

    // Run migrations, logging whatever the runner reports.
    let mut output = Vec::new();
    embedded_migrations::run_with_output(&connection, &mut output)?;
    for line in String::from_utf8_lossy(&output).lines() {
        tracing::info!("{}", line);
    }

    Ok(connection)
}

/// A fresh in-memory database with the schema applied.
#[cfg(test)]
pub fn memory() -> Connection {
    connect(":memory:").unwrap()
}
