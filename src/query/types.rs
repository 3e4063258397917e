use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    Find,
    Count,
    Distinct,
    Insert,
    Update,
    Remove,
    FindAndUpdate,
    FindAndRemove,
    GeoNear,
    MapReduce,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_i32(self) -> i32 {
        match self {
            Order::Asc => 1,
            Order::Desc => -1,
        }
    }
}

impl From<i32> for Order {
    fn from(order: i32) -> Self {
        if order < 0 { Order::Desc } else { Order::Asc }
    }
}

impl From<&str> for Order {
    fn from(order: &str) -> Self {
        if order.eq_ignore_ascii_case("asc") { Order::Asc } else { Order::Desc }
    }
}

/// A near-point: either a legacy coordinate pair or a GeoJSON object.
/// The two compile to physically different positions in criteria and
/// command documents, so the distinction is kept explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Point {
    Legacy(f64, f64),
    GeoJson(Document),
}

impl Point {
    pub fn is_geo_json(&self) -> bool {
        matches!(self, Point::GeoJson(_))
    }

    /// The geoNear command defaults `spherical` to true only for a GeoJSON
    /// object that actually carries a `type` member.
    pub(crate) fn default_spherical(&self) -> bool {
        matches!(self, Point::GeoJson(doc) if doc.contains_key("type"))
    }

    /// Value for the geoNear command's `near` member: the raw coordinate
    /// pair or the GeoJSON object as-is.
    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            Point::Legacy(x, y) => Bson::Array(vec![Bson::Double(*x), Bson::Double(*y)]),
            Point::GeoJson(doc) => Bson::Document(doc.clone()),
        }
    }

    /// Operand for `$near`/`$nearSphere` criteria: GeoJSON points nest under
    /// `$geometry`, legacy pairs do not.
    pub(crate) fn to_operand(&self) -> Bson {
        match self {
            Point::Legacy(x, y) => Bson::Array(vec![Bson::Double(*x), Bson::Double(*y)]),
            Point::GeoJson(doc) => {
                let mut wrapper = Document::new();
                wrapper.insert("$geometry", doc.clone());
                Bson::Document(wrapper)
            }
        }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::Legacy(x, y)
    }
}

impl From<Document> for Point {
    fn from(doc: Document) -> Self {
        Point::GeoJson(doc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadPreferenceMode {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreferenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadPreferenceMode::Primary => "primary",
            ReadPreferenceMode::PrimaryPreferred => "primaryPreferred",
            ReadPreferenceMode::Secondary => "secondary",
            ReadPreferenceMode::SecondaryPreferred => "secondaryPreferred",
            ReadPreferenceMode::Nearest => "nearest",
        }
    }
}

/// Read preference plus optional tag sets, serialized into cursor options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadPreference {
    pub mode: ReadPreferenceMode,
    pub tags: Vec<Document>,
}

impl ReadPreference {
    pub fn new(mode: ReadPreferenceMode) -> Self {
        ReadPreference { mode, tags: Vec::new() }
    }

    pub fn with_tags(mode: ReadPreferenceMode, tags: Vec<Document>) -> Self {
        ReadPreference { mode, tags }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("type", self.mode.as_str());
        if !self.tags.is_empty() {
            doc.insert(
                "tagsets",
                Bson::Array(self.tags.iter().cloned().map(Bson::Document).collect()),
            );
        }
        doc
    }
}

/// Output target for a mapReduce command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutTarget {
    /// Results come back inline in the reply.
    Inline,
    /// Results replace the named collection in the current database.
    Collection(String),
    /// Caller-supplied out document, e.g. `{merge: "x", db: "y"}`.
    Custom(Document),
}

impl OutTarget {
    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            OutTarget::Inline => {
                let mut doc = Document::new();
                doc.insert("inline", true);
                Bson::Document(doc)
            }
            OutTarget::Collection(name) => Bson::String(name.clone()),
            OutTarget::Custom(doc) => Bson::Document(doc.clone()),
        }
    }
}

/// geoNear command parameters: the near point plus its option bag. The
/// option bag always carries `spherical` (inferred from the point at
/// creation, overridable later).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoNearArgs {
    pub near: Point,
    pub options: Document,
}

impl GeoNearArgs {
    pub(crate) fn new(near: Point) -> Self {
        let mut options = Document::new();
        options.insert("spherical", near.default_spherical());
        GeoNearArgs { near, options }
    }
}

/// mapReduce command parameters. `map`/`reduce` hold either code values or
/// plain strings; strings are wrapped into code at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapReduceArgs {
    pub map: Bson,
    pub reduce: Option<Bson>,
    pub out: OutTarget,
    pub options: Document,
}

/// group command parameters. `keys` is either a key document or a key
/// function (code or plain string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupArgs {
    pub keys: Bson,
    pub initial: Document,
    pub reduce: Option<Bson>,
    pub options: Document,
}

/// Immutable snapshot of one fully described logical operation, produced by
/// the builder and consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub query_type: QueryType,
    pub criteria: Document,
    pub new_obj: Document,
    pub select: Document,
    pub sort: Document,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub hint: Option<Bson>,
    pub immortal: Option<bool>,
    pub snapshot: Option<bool>,
    pub slave_okay: Option<bool>,
    pub return_new: Option<bool>,
    pub upsert: Option<bool>,
    pub multiple: Option<bool>,
    pub read_preference: Option<ReadPreference>,
    pub distinct_field: Option<String>,
    pub geo_near: Option<GeoNearArgs>,
    pub map_reduce: Option<MapReduceArgs>,
    pub group: Option<GroupArgs>,
}
