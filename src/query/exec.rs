use crate::collection::Collection;
use crate::driver::FindSpec;
use crate::errors::Error;
use crate::query::cursor::Cursor;
use crate::query::types::{QueryDescriptor, QueryType, ReadPreference, ReadPreferenceMode};
use bson::{Bson, Document};

/// The caller-visible result of executing a compiled query, shaped per type.
#[derive(Debug)]
pub enum QueryResult {
    /// find, and mapReduce runs that point at an output collection.
    Cursor(Cursor),
    Count(i64),
    /// distinct values.
    Values(Vec<Bson>),
    /// findAndModify family; "not found" is `None`, not an error.
    Document(Option<Document>),
    /// geoNear results, group retval, inline mapReduce results.
    Documents(Vec<Document>),
    /// Raw write reply for insert/update/remove.
    Reply(Document),
}

impl QueryResult {
    pub fn into_cursor(self) -> Option<Cursor> {
        match self {
            QueryResult::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn into_documents(self) -> Option<Vec<Document>> {
        match self {
            QueryResult::Documents(docs) => Some(docs),
            QueryResult::Cursor(cursor) => Some(cursor.to_vec()),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            QueryResult::Document(doc) => doc,
            _ => None,
        }
    }
}

/// An immutable, fully compiled logical operation: the descriptor snapshot,
/// the owning collection handle and the normalized option bag. Consumed by
/// [`Query::execute`], which maps the type to its wire command, dispatches
/// it, validates the reply and reshapes the result.
#[derive(Debug, Clone)]
pub struct Query {
    collection: Collection,
    descriptor: QueryDescriptor,
    options: Document,
}

impl Query {
    pub(crate) fn new(collection: Collection, descriptor: QueryDescriptor, options: Document) -> Self {
        Query { collection, descriptor, options }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &Document {
        &self.options
    }

    /// The literal command document this query compiles to, or `None` for
    /// the cursor/write types that do not go through a command.
    pub fn to_command(&self) -> Result<Option<Document>, Error> {
        match self.descriptor.query_type {
            QueryType::Distinct => self.distinct_command().map(Some),
            QueryType::FindAndUpdate | QueryType::FindAndRemove => {
                self.find_and_modify_command().map(Some)
            }
            QueryType::GeoNear => self.geo_near_command().map(Some),
            QueryType::MapReduce => self.map_reduce_command().map(Some),
            QueryType::Group => self.group_command().map(Some),
            _ => Ok(None),
        }
    }

    pub fn execute(&self) -> Result<QueryResult, Error> {
        log::debug!(
            "executing {:?} on {}.{}",
            self.descriptor.query_type,
            self.collection.database().name(),
            self.collection.name()
        );
        match self.descriptor.query_type {
            QueryType::Find => self.execute_find(),
            QueryType::Count => {
                let count = self.collection.count(
                    &self.descriptor.criteria,
                    self.descriptor.limit,
                    self.descriptor.skip,
                    &self.options,
                )?;
                Ok(QueryResult::Count(count))
            }
            QueryType::Distinct => {
                let command = self.distinct_command()?;
                let reply = self.collection.database().command(&command)?;
                Ok(QueryResult::Values(array_member(&reply, "result")))
            }
            QueryType::Insert => {
                let reply =
                    self.collection.insert(&self.descriptor.new_obj, &self.options)?;
                Ok(QueryResult::Reply(reply))
            }
            QueryType::Update => {
                let mut options = self.options.clone();
                if let Some(multiple) = self.descriptor.multiple {
                    options.insert("multiple", multiple);
                }
                if let Some(upsert) = self.descriptor.upsert {
                    options.insert("upsert", upsert);
                }
                let reply = self.collection.update(
                    &self.descriptor.criteria,
                    &self.descriptor.new_obj,
                    &options,
                )?;
                Ok(QueryResult::Reply(reply))
            }
            QueryType::Remove => {
                let reply =
                    self.collection.remove(&self.descriptor.criteria, &self.options)?;
                Ok(QueryResult::Reply(reply))
            }
            QueryType::FindAndUpdate | QueryType::FindAndRemove => {
                let command = self.find_and_modify_command()?;
                let reply = self.collection.database().command(&command)?;
                let value = match reply.get("value") {
                    Some(Bson::Document(doc)) => Some(doc.clone()),
                    _ => None,
                };
                Ok(QueryResult::Document(value))
            }
            QueryType::GeoNear => {
                let command = self.geo_near_command()?;
                let reply = self.collection.database().command(&command)?;
                Ok(QueryResult::Documents(document_array_member(&reply, "results")))
            }
            QueryType::MapReduce => self.execute_map_reduce(),
            QueryType::Group => {
                let command = self.group_command()?;
                let reply = self.collection.database().command(&command)?;
                // Absence of retval is unexpected and propagates as a
                // command failure, unlike the defaulting members above.
                match reply.get("retval") {
                    Some(Bson::Array(_)) => {
                        Ok(QueryResult::Documents(document_array_member(&reply, "retval")))
                    }
                    _ => Err(Error::from_reply(reply)),
                }
            }
        }
    }

    fn execute_find(&self) -> Result<QueryResult, Error> {
        let mut options = self.options.clone();
        if let Some(hint) = &self.descriptor.hint {
            options.insert("hint", hint.clone());
        }
        if let Some(immortal) = self.descriptor.immortal {
            options.insert("immortal", immortal);
        }
        if let Some(snapshot) = self.descriptor.snapshot {
            options.insert("snapshot", snapshot);
        }
        if let Some(read_preference) = self.effective_read_preference() {
            options.insert("readPreference", read_preference.to_document());
        }
        let spec = FindSpec {
            criteria: self.descriptor.criteria.clone(),
            projection: self.descriptor.select.clone(),
            sort: self.descriptor.sort.clone(),
            skip: self.descriptor.skip,
            limit: self.descriptor.limit,
            options,
        };
        let cursor = self.collection.find_with(&spec)?;
        Ok(QueryResult::Cursor(cursor))
    }

    /// An explicit read preference wins; otherwise the slaveOkay flag maps
    /// to secondaryPreferred/primary.
    fn effective_read_preference(&self) -> Option<ReadPreference> {
        if let Some(read_preference) = &self.descriptor.read_preference {
            return Some(read_preference.clone());
        }
        self.descriptor.slave_okay.map(|slave_okay| {
            let mode = if slave_okay {
                ReadPreferenceMode::SecondaryPreferred
            } else {
                ReadPreferenceMode::Primary
            };
            ReadPreference::new(mode)
        })
    }

    fn execute_map_reduce(&self) -> Result<QueryResult, Error> {
        let command = self.map_reduce_command()?;
        let reply = self.collection.database().command(&command)?;

        // A string result names an output collection in the current
        // database; a {db, collection} document switches database context;
        // anything else is inline output.
        match reply.get("result") {
            Some(Bson::String(output)) => {
                let collection = self.collection.database().collection(output);
                let cursor = collection.find(&Document::new(), &Document::new())?;
                Ok(QueryResult::Cursor(cursor))
            }
            Some(Bson::Document(output))
                if output.get_str("db").is_ok() && output.get_str("collection").is_ok() =>
            {
                let db = output.get_str("db").unwrap_or_default();
                let name = output.get_str("collection").unwrap_or_default();
                let collection = self.collection.database().sibling(db).collection(name);
                let cursor = collection.find(&Document::new(), &Document::new())?;
                Ok(QueryResult::Cursor(cursor))
            }
            _ => Ok(QueryResult::Documents(document_array_member(&reply, "results"))),
        }
    }

    // --- command builders ---

    fn distinct_command(&self) -> Result<Document, Error> {
        let field = self.descriptor.distinct_field.as_ref().ok_or_else(|| {
            Error::Argument("distinct requires a field (call distinct() first)".into())
        })?;
        let mut command = Document::new();
        command.insert("distinct", self.collection.name());
        command.insert("key", field.as_str());
        command.insert("query", self.descriptor.criteria.clone());
        merge_options(&mut command, &self.options);
        Ok(command)
    }

    fn find_and_modify_command(&self) -> Result<Document, Error> {
        let mut command = Document::new();
        command.insert("findandmodify", self.collection.name());
        command.insert("query", self.descriptor.criteria.clone());
        match self.descriptor.query_type {
            QueryType::FindAndRemove => {
                command.insert("remove", true);
            }
            _ => {
                command.insert("update", self.descriptor.new_obj.clone());
            }
        }
        if !self.descriptor.sort.is_empty() {
            command.insert("sort", self.descriptor.sort.clone());
        }
        if !self.descriptor.select.is_empty() {
            command.insert("fields", self.descriptor.select.clone());
        }
        if self.descriptor.query_type == QueryType::FindAndUpdate {
            if let Some(return_new) = self.descriptor.return_new {
                command.insert("new", return_new);
            }
            if let Some(upsert) = self.descriptor.upsert {
                command.insert("upsert", upsert);
            }
        }
        merge_options(&mut command, &self.options);
        Ok(command)
    }

    fn geo_near_command(&self) -> Result<Document, Error> {
        let args = self.descriptor.geo_near.as_ref().ok_or_else(|| {
            Error::Argument("geoNear requires a near point (call geo_near() first)".into())
        })?;
        let mut options = args.options.clone();
        let spherical = options.remove("spherical").unwrap_or(Bson::Boolean(false));

        let mut command = Document::new();
        command.insert("geoNear", self.collection.name());
        command.insert("near", args.near.to_bson());
        command.insert("spherical", spherical);
        command.insert("query", self.descriptor.criteria.clone());
        if let Some(limit) = self.descriptor.limit {
            command.insert("num", limit);
        }
        merge_options(&mut command, &options);
        merge_options(&mut command, &self.options);
        Ok(command)
    }

    fn map_reduce_command(&self) -> Result<Document, Error> {
        let args = self.descriptor.map_reduce.as_ref().ok_or_else(|| {
            Error::Argument("mapReduce requires a map function (call map() or map_reduce() first)".into())
        })?;
        let reduce = args.reduce.clone().ok_or_else(|| {
            Error::Argument("mapReduce requires a reduce function (call reduce() first)".into())
        })?;

        let mut command = Document::new();
        command.insert("mapreduce", self.collection.name());
        command.insert("map", wrap_code(args.map.clone()));
        command.insert("reduce", wrap_code(reduce));
        command.insert("query", self.descriptor.criteria.clone());
        command.insert("out", args.out.to_bson());

        let mut options = args.options.clone();
        if !self.descriptor.sort.is_empty() {
            options.insert("sort", self.descriptor.sort.clone());
        }
        if let Some(limit) = self.descriptor.limit {
            options.insert("limit", limit);
        }
        if let Some(finalize) = options.remove("finalize") {
            options.insert("finalize", wrap_code(finalize));
        }
        merge_options(&mut command, &options);
        merge_options(&mut command, &self.options);
        Ok(command)
    }

    fn group_command(&self) -> Result<Document, Error> {
        let args = self.descriptor.group.as_ref().ok_or_else(|| {
            Error::Argument("group requires keys and an initial value (call group() first)".into())
        })?;
        let reduce = args.reduce.clone().ok_or_else(|| {
            Error::Argument("group requires a reduce function (call reduce() first)".into())
        })?;

        let mut group = Document::new();
        group.insert("ns", self.collection.name());
        group.insert("initial", args.initial.clone());
        group.insert("$reduce", wrap_code(reduce));
        match &args.keys {
            // A key function (code or plain text) compiles to $keyf; a key
            // document passes through as-is.
            Bson::JavaScriptCode(_) | Bson::String(_) => {
                group.insert("$keyf", wrap_code(args.keys.clone()));
            }
            keys => {
                group.insert("key", keys.clone());
            }
        }
        // Criteria become the cond option, passed through as a document.
        if !self.descriptor.criteria.is_empty() {
            group.insert("cond", self.descriptor.criteria.clone());
        }
        let mut options = args.options.clone();
        if let Some(finalize) = options.remove("finalize") {
            options.insert("finalize", wrap_code(finalize));
        }
        merge_options(&mut group, &options);
        merge_options(&mut group, &self.options);

        let mut command = Document::new();
        command.insert("group", group);
        Ok(command)
    }
}

/// Plain text becomes a code value; everything else passes through.
pub(crate) fn wrap_code(value: Bson) -> Bson {
    match value {
        Bson::String(source) => Bson::JavaScriptCode(source),
        other => other,
    }
}

/// Merge an option bag into a command; options win over existing keys, and
/// overwritten keys keep their original position.
pub(crate) fn merge_options(command: &mut Document, options: &Document) {
    for (key, value) in options {
        command.insert(key.clone(), value.clone());
    }
}

/// `member` as a Bson array, defaulting to empty.
fn array_member(reply: &Document, member: &str) -> Vec<Bson> {
    match reply.get(member) {
        Some(Bson::Array(values)) => values.clone(),
        _ => Vec::new(),
    }
}

/// `member` as an array of documents, defaulting to empty; non-document
/// entries are skipped.
fn document_array_member(reply: &Document, member: &str) -> Vec<Document> {
    match reply.get(member) {
        Some(Bson::Array(values)) => values
            .iter()
            .filter_map(|value| match value {
                Bson::Document(doc) => Some(doc.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
