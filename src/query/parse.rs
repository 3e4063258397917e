use crate::errors::Error;
use bson::{Bson, Document};

/// Parses caller-supplied JSON into a criteria document.
///
/// # Errors
/// Returns an error if the string is not valid JSON or its top level is not
/// an object.
pub fn parse_criteria_json(json: &str) -> Result<Document, Error> {
    parse_document(json)
}

/// Parses caller-supplied JSON into a "new object" document (update
/// operators or a full replacement document).
///
/// # Errors
/// Returns an error if the string is not valid JSON or its top level is not
/// an object.
pub fn parse_new_obj_json(json: &str) -> Result<Document, Error> {
    parse_document(json)
}

fn parse_document(json: &str) -> Result<Document, Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(Error::Argument(format!(
            "expected a JSON object, got {:?}",
            other.element_type()
        ))),
        Err(e) => Err(Error::Argument(e.to_string())),
    }
}
