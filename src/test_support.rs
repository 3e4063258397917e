//! Test-only in-memory driver: records every dispatched command and write,
//! replays canned replies, and serves finds from queued batches.

use crate::driver::{Driver, DriverCapabilities, FindSpec};
use crate::errors::Error;
use bson::{Bson, Document};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A recorded find call: database, collection and the full spec.
#[derive(Debug, Clone)]
pub struct FindCall {
    pub db: String,
    pub collection: String,
    pub spec: FindSpec,
}

/// A recorded write call.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub kind: &'static str,
    pub db: String,
    pub collection: String,
    pub criteria: Option<Document>,
    pub document: Option<Document>,
    pub options: Document,
}

#[derive(Default)]
pub struct RecordingDriver {
    capabilities: DriverCapabilities,
    commands: Mutex<Vec<(String, Document)>>,
    finds: Mutex<Vec<FindCall>>,
    writes: Mutex<Vec<WriteCall>>,
    replies: Mutex<VecDeque<Document>>,
    find_results: Mutex<VecDeque<Vec<Document>>>,
    counts: Mutex<VecDeque<i64>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        RecordingDriver::default()
    }

    pub fn with_capabilities(capabilities: DriverCapabilities) -> Self {
        RecordingDriver { capabilities, ..RecordingDriver::default() }
    }

    /// Queue the reply for the next command.
    pub fn push_reply(&self, reply: Document) {
        self.replies.lock().push_back(reply);
    }

    /// Queue the batch for the next find.
    pub fn push_find_result(&self, docs: Vec<Document>) {
        self.find_results.lock().push_back(docs);
    }

    pub fn push_count(&self, count: i64) {
        self.counts.lock().push_back(count);
    }

    pub fn commands(&self) -> Vec<(String, Document)> {
        self.commands.lock().clone()
    }

    pub fn last_command(&self) -> Option<Document> {
        self.commands.lock().last().map(|(_, command)| command.clone())
    }

    pub fn find_calls(&self) -> Vec<FindCall> {
        self.finds.lock().clone()
    }

    pub fn write_calls(&self) -> Vec<WriteCall> {
        self.writes.lock().clone()
    }

    fn record_write(
        &self,
        kind: &'static str,
        db: &str,
        collection: &str,
        criteria: Option<&Document>,
        document: Option<&Document>,
        options: &Document,
    ) {
        self.writes.lock().push(WriteCall {
            kind,
            db: db.to_string(),
            collection: collection.to_string(),
            criteria: criteria.cloned(),
            document: document.cloned(),
            options: options.clone(),
        });
    }
}

fn ok_reply() -> Document {
    let mut reply = Document::new();
    reply.insert("ok", Bson::Double(1.0));
    reply
}

impl Driver for RecordingDriver {
    fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    fn command(&self, db: &str, command: &Document) -> Result<Document, Error> {
        self.commands.lock().push((db.to_string(), command.clone()));
        Ok(self.replies.lock().pop_front().unwrap_or_else(ok_reply))
    }

    fn find(&self, db: &str, collection: &str, spec: &FindSpec) -> Result<Vec<Document>, Error> {
        self.finds.lock().push(FindCall {
            db: db.to_string(),
            collection: collection.to_string(),
            spec: spec.clone(),
        });
        Ok(self.find_results.lock().pop_front().unwrap_or_default())
    }

    fn count(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        _limit: Option<i64>,
        _skip: Option<i64>,
        options: &Document,
    ) -> Result<i64, Error> {
        self.record_write("count", db, collection, Some(criteria), None, options);
        Ok(self.counts.lock().pop_front().unwrap_or(0))
    }

    fn insert(
        &self,
        db: &str,
        collection: &str,
        document: &Document,
        options: &Document,
    ) -> Result<Document, Error> {
        self.record_write("insert", db, collection, None, Some(document), options);
        Ok(ok_reply())
    }

    fn update(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        new_obj: &Document,
        options: &Document,
    ) -> Result<Document, Error> {
        self.record_write("update", db, collection, Some(criteria), Some(new_obj), options);
        Ok(ok_reply())
    }

    fn remove(
        &self,
        db: &str,
        collection: &str,
        criteria: &Document,
        options: &Document,
    ) -> Result<Document, Error> {
        self.record_write("remove", db, collection, Some(criteria), None, options);
        Ok(ok_reply())
    }
}
