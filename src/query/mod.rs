// Submodules for separation of concerns
mod aggregate;
mod builder;
mod cursor;
mod exec;
mod expr;
mod parse;
mod types;

// Public API re-exports
pub use aggregate::Aggregate;
pub use builder::Builder;
pub use cursor::Cursor;
pub use exec::{Query, QueryResult};
pub use expr::Expr;
pub use parse::{parse_criteria_json, parse_new_obj_json};
pub use types::{
    GeoNearArgs, GroupArgs, MapReduceArgs, Order, OutTarget, Point, QueryDescriptor, QueryType,
    ReadPreference, ReadPreferenceMode,
};
