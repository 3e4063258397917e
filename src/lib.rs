pub mod collection;
pub mod driver;
pub mod errors;
pub mod logger;
pub mod options;
pub mod query;
pub mod test_support;

use crate::driver::{Driver, reply_ok};
use crate::errors::Error;
use bson::Document;
use std::sync::Arc;

pub use crate::collection::Collection;
pub use crate::query::{Builder, Cursor, Expr, Query, QueryResult, QueryType};

/// Handle to one database of the underlying store. Cheap to clone; all I/O
/// goes through the injected driver.
#[derive(Clone)]
pub struct Database {
    name: String,
    driver: Arc<dyn Driver>,
}

impl Database {
    pub fn new(name: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Database { name: name.into(), driver }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Retrieves a collection handle by name.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name)
    }

    /// A handle to another database on the same driver; used when a
    /// mapReduce reply points at an output collection elsewhere.
    pub fn sibling(&self, name: &str) -> Database {
        Database { name: name.to_string(), driver: self.driver.clone() }
    }

    /// Execute a command document and validate its success flag. A reply
    /// without a truthy `ok` member becomes a command error carrying the
    /// full raw reply.
    pub fn command(&self, command: &Document) -> Result<Document, Error> {
        if let Some((name, _)) = command.iter().next() {
            log::debug!("command {} on {}", name, self.name);
        }
        let reply = self.driver.command(&self.name, command)?;
        if !reply_ok(&reply) {
            log::warn!("command failed on {}: {:?}", self.name, reply.get("errmsg"));
            return Err(Error::from_reply(reply));
        }
        Ok(reply)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish_non_exhaustive()
    }
}
