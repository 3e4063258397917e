use crate::driver::DriverCapabilities;
use bson::{Bson, Document};

/// Maps legacy option names to the names the active driver expects.
///
/// Pure: the input is never mutated. Each rename applies only when the
/// matching capability flag is set and the target name is not already
/// present; the legacy key is dropped and the new key appended.
pub fn normalize_options(options: &Document, capabilities: &DriverCapabilities) -> Document {
    let mut out = options.clone();

    if capabilities.write_concern_rename
        && out.contains_key("safe")
        && !out.contains_key("w")
        && let Some(safe) = out.remove("safe")
    {
        out.insert("w", coerce_write_concern(safe));
    }

    if capabilities.write_timeout_rename
        && out.contains_key("wtimeout")
        && !out.contains_key("wTimeoutMS")
        && let Some(wtimeout) = out.remove("wtimeout")
    {
        out.insert("wTimeoutMS", wtimeout);
    }

    if capabilities.socket_timeout_rename
        && out.contains_key("timeout")
        && !out.contains_key("socketTimeoutMS")
        && let Some(timeout) = out.remove("timeout")
    {
        out.insert("socketTimeoutMS", timeout);
    }

    if capabilities.multi_rename
        && out.contains_key("multi")
        && !out.contains_key("multiple")
        && let Some(multi) = out.remove("multi")
    {
        out.insert("multiple", multi);
    }

    out
}

fn coerce_write_concern(safe: Bson) -> Bson {
    match safe {
        Bson::Boolean(b) => Bson::Int32(i32::from(b)),
        other => other,
    }
}
