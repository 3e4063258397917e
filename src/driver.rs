use crate::errors::Error;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Static description of which legacy option renames the active driver
/// understands. Decided once at driver construction time; the option
/// normalizer consults these flags instead of parsing version strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCapabilities {
    /// `safe` -> `w` (booleans coerced to 0/1).
    pub write_concern_rename: bool,
    /// `wtimeout` -> `wTimeoutMS`.
    pub write_timeout_rename: bool,
    /// `timeout` -> `socketTimeoutMS`.
    pub socket_timeout_rename: bool,
    /// `multi` -> `multiple`.
    pub multi_rename: bool,
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        DriverCapabilities {
            write_concern_rename: true,
            write_timeout_rename: true,
            socket_timeout_rename: true,
            multi_rename: true,
        }
    }
}

impl DriverCapabilities {
    /// Profile of a driver that predates every rename; options pass through
    /// unchanged.
    pub fn legacy() -> Self {
        DriverCapabilities {
            write_concern_rename: false,
            write_timeout_rename: false,
            socket_timeout_rename: false,
            multi_rename: false,
        }
    }
}

/// Parameters for opening a cursor over a plain (non-command) find.
#[derive(Debug, Clone, Default)]
pub struct FindSpec {
    pub criteria: Document,
    pub projection: Document,
    pub sort: Document,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    /// Cursor-level options: hint, snapshot, immortal, readPreference and
    /// whatever the caller's option bag carried through.
    pub options: Document,
}

/// The transport boundary. Implementations execute wire commands and open
/// cursors; they never interpret replies beyond returning them verbatim.
///
/// Reply contract: command replies carry an `ok` flag plus, depending on the
/// command, `value`, `result`, `results` or `retval` members. Write
/// operations return the store's write reply document as-is.
pub trait Driver: Send + Sync {
    fn capabilities(&self) -> DriverCapabilities;

    /// Executes a command document against a database and returns the raw
    /// reply. Transport failures are `Error::Driver`; a reply with a falsy
    /// `ok` flag is NOT an error at this level.
    fn command(&self, db: &str, command: &Document) -> Result<Document, Error>;

    /// Opens a cursor for a filter + projection + sort + skip/limit read and
    /// materializes the matching batch in order.
    fn find(&self, db: &str, collection: &str, spec: &FindSpec) -> Result<Vec<Document>, Error>;

    fn count(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        limit: Option<i64>,
        skip: Option<i64>,
        options: &Document,
    ) -> Result<i64, Error>;

    fn insert(
        &self,
        db: &str,
        collection: &str,
        document: &Document,
        options: &Document,
    ) -> Result<Document, Error>;

    fn update(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        new_obj: &Document,
        options: &Document,
    ) -> Result<Document, Error>;

    fn remove(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        options: &Document,
    ) -> Result<Document, Error>;
}

/// True when the reply's `ok` member is present and truthy.
pub fn reply_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Bson::Double(d)) => *d != 0.0,
        Some(Bson::Int32(i)) => *i != 0,
        Some(Bson::Int64(i)) => *i != 0,
        Some(Bson::Boolean(b)) => *b,
        _ => false,
    }
}
