use crate::Database;
use crate::driver::FindSpec;
use crate::errors::Error;
use crate::options::normalize_options;
use crate::query::{Aggregate, Builder, Cursor};
use bson::{Bson, Document};

/// Handle to one named record set of a database. Cheap to clone; carries no
/// connection state of its own.
#[derive(Debug, Clone)]
pub struct Collection {
    database: Database,
    name: String,
}

impl Collection {
    pub(crate) fn new(database: Database, name: impl Into<String>) -> Self {
        Collection { database, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Start a fluent query against this collection.
    pub fn query(&self) -> Builder {
        Builder::new(self.clone())
    }

    /// Start a staged aggregation against this collection.
    pub fn aggregation(&self) -> Aggregate {
        Aggregate::new(self.clone())
    }

    /// Open a cursor over a plain filter + projection read.
    pub fn find(&self, criteria: &Document, projection: &Document) -> Result<Cursor, Error> {
        let spec = FindSpec {
            criteria: criteria.clone(),
            projection: projection.clone(),
            ..FindSpec::default()
        };
        self.find_with(&spec)
    }

    pub(crate) fn find_with(&self, spec: &FindSpec) -> Result<Cursor, Error> {
        let docs = self
            .database
            .driver()
            .find(self.database.name(), &self.name, spec)?;
        Ok(Cursor::new(docs))
    }

    /// Return the first match, or `None` when nothing matches.
    pub fn find_one(
        &self,
        criteria: &Document,
        projection: &Document,
    ) -> Result<Option<Document>, Error> {
        let spec = FindSpec {
            criteria: criteria.clone(),
            projection: projection.clone(),
            limit: Some(1),
            ..FindSpec::default()
        };
        let mut cursor = self.find_with(&spec)?;
        Ok(cursor.advance())
    }

    pub fn count(
        &self,
        criteria: &Document,
        limit: Option<i64>,
        skip: Option<i64>,
        options: &Document,
    ) -> Result<i64, Error> {
        let options = self.normalize(options);
        self.database
            .driver()
            .count(self.database.name(), &self.name, criteria, limit, skip, &options)
    }

    pub fn insert(&self, document: &Document, options: &Document) -> Result<Document, Error> {
        let options = self.normalize(options);
        log::debug!("insert into {}.{}", self.database.name(), self.name);
        self.database
            .driver()
            .insert(self.database.name(), &self.name, document, &options)
    }

    pub fn update(
        &self,
        criteria: &Document,
        new_obj: &Document,
        options: &Document,
    ) -> Result<Document, Error> {
        let options = self.normalize(options);
        log::debug!("update on {}.{}", self.database.name(), self.name);
        self.database
            .driver()
            .update(self.database.name(), &self.name, criteria, new_obj, &options)
    }

    pub fn remove(&self, criteria: &Document, options: &Document) -> Result<Document, Error> {
        let options = self.normalize(options);
        log::debug!("remove on {}.{}", self.database.name(), self.name);
        self.database
            .driver()
            .remove(self.database.name(), &self.name, criteria, &options)
    }

    /// Run a distinct command directly, without going through the builder.
    pub fn distinct(
        &self,
        field: &str,
        criteria: &Document,
        options: &Document,
    ) -> Result<Vec<Bson>, Error> {
        let options = self.normalize(options);
        let mut command = Document::new();
        command.insert("distinct", self.name.as_str());
        command.insert("key", field);
        command.insert("query", criteria.clone());
        for (key, value) in &options {
            command.insert(key.clone(), value.clone());
        }
        let reply = self.database.command(&command)?;
        Ok(match reply.get("result") {
            Some(Bson::Array(values)) => values.clone(),
            _ => Vec::new(),
        })
    }

    /// Run an aggregation pipeline; the reply's `result` member defaults to
    /// an empty array.
    pub fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, Error> {
        let mut command = Document::new();
        command.insert("aggregate", self.name.as_str());
        command.insert(
            "pipeline",
            Bson::Array(pipeline.into_iter().map(Bson::Document).collect()),
        );
        let reply = self.database.command(&command)?;
        Ok(match reply.get("result") {
            Some(Bson::Array(values)) => values
                .iter()
                .filter_map(|value| match value {
                    Bson::Document(doc) => Some(doc.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    fn normalize(&self, options: &Document) -> Document {
        normalize_options(options, &self.database.driver().capabilities())
    }
}
