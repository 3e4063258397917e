use bson::Document;

/// A forward-only, single-owner cursor over query results.
///
/// The batch is materialized in order; iteration never re-fetches. A cursor
/// is not restartable and must not be shared across concurrent consumers.
#[derive(Debug, Clone)]
pub struct Cursor {
    items: Vec<Document>,
    pos: usize,
    current: Option<Document>,
}

impl Cursor {
    pub fn new(items: Vec<Document>) -> Self {
        Cursor { items, pos: 0, current: None }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.items.len()
    }

    /// Move forward and return the next document, if any.
    pub fn advance(&mut self) -> Option<Document> {
        if self.pos >= self.items.len() {
            self.current = None;
            return None;
        }
        let doc = self.items[self.pos].clone();
        self.pos += 1;
        self.current = Some(doc.clone());
        Some(doc)
    }

    /// The document the cursor currently points at (the last one returned by
    /// [`Cursor::advance`]).
    pub fn current(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    /// Drain the remaining documents, preserving order.
    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        self.items.split_off(self.pos)
    }

    pub fn len_remaining(&self) -> usize {
        self.items.len() - self.pos
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
