use crate::errors::Error;
use crate::query::types::{Order, Point};
use bson::{Bson, Document};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// `$type` accepts historical name aliases; unrecognized names pass through
/// unchanged.
static TYPE_ALIASES: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    HashMap::from([
        ("double", 1),
        ("string", 2),
        ("object", 3),
        ("array", 4),
        ("binary", 5),
        ("undefined", 6),
        ("objectid", 7),
        ("boolean", 8),
        ("date", 9),
        ("null", 10),
        ("regex", 11),
        ("jscode", 13),
        ("symbol", 14),
        ("jscodewithscope", 15),
        ("integer32", 16),
        ("timestamp", 17),
        ("integer64", 18),
        ("maxkey", 127),
        ("minkey", 255),
    ])
});

/// Accumulates fluent calls into a criteria tree (filter predicates) and a
/// "new object" (update operators or a full replacement document).
///
/// Field-scoped operators apply to the current field set with [`Expr::field`];
/// calls that require one fail with a sequencing error when it is unset.
/// Repeated calls to the same operator on the same field overwrite the
/// previous value; logical combinators append instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    current_field: Option<String>,
    criteria: Document,
    new_obj: Document,
}

impl Expr {
    pub fn new() -> Self {
        Expr::default()
    }

    /// Set the current field for building the expression. The field's
    /// existence is not validated.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.current_field = Some(field.into());
        self
    }

    pub fn current_field(&self) -> Option<&str> {
        self.current_field.as_deref()
    }

    pub fn criteria(&self) -> &Document {
        &self.criteria
    }

    pub fn into_criteria(self) -> Document {
        self.criteria
    }

    pub fn set_criteria(&mut self, criteria: Document) {
        self.criteria = criteria;
    }

    /// The "new object": update operators keyed by operator symbol, or a
    /// full replacement document when built non-atomically.
    pub fn new_obj(&self) -> &Document {
        &self.new_obj
    }

    pub fn into_new_obj(self) -> Document {
        self.new_obj
    }

    pub fn set_new_obj(&mut self, new_obj: Document) {
        self.new_obj = new_obj;
    }

    /// Specify an equality match for the current field. Without a current
    /// field the value replaces the entire criteria tree, which therefore
    /// must be a document.
    pub fn equals(mut self, value: impl Into<Bson>) -> Result<Self, Error> {
        let value = value.into();
        match &self.current_field {
            Some(field) => {
                let field = field.clone();
                self.criteria.insert(field, value);
            }
            None => match value {
                Bson::Document(doc) => self.criteria = doc,
                other => {
                    return Err(Error::Argument(format!(
                        "top-level criteria must be a document, got {:?}",
                        other.element_type()
                    )));
                }
            },
        }
        Ok(self)
    }

    /// The general operator primitive: scoped to the current field when one
    /// is set, top-level otherwise. An existing non-document entry for the
    /// field (a prior equality literal) is replaced by a fresh operator map.
    pub fn operator(mut self, operator: &str, value: impl Into<Bson>) -> Self {
        let value = value.into();
        match &self.current_field {
            Some(field) => match self.criteria.get_mut(field.as_str()) {
                Some(Bson::Document(map)) => {
                    map.insert(operator, value);
                }
                _ => {
                    let mut map = Document::new();
                    map.insert(operator, value);
                    let field = field.clone();
                    self.criteria.insert(field, map);
                }
            },
            None => {
                self.criteria.insert(operator, value);
            }
        }
        self
    }

    pub fn gt(self, value: impl Into<Bson>) -> Self {
        self.operator("$gt", value)
    }

    pub fn gte(self, value: impl Into<Bson>) -> Self {
        self.operator("$gte", value)
    }

    pub fn lt(self, value: impl Into<Bson>) -> Self {
        self.operator("$lt", value)
    }

    pub fn lte(self, value: impl Into<Bson>) -> Self {
        self.operator("$lte", value)
    }

    pub fn not_equal(self, value: impl Into<Bson>) -> Self {
        self.operator("$ne", value)
    }

    pub fn in_(self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.operator("$in", collect_array(values))
    }

    pub fn not_in(self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.operator("$nin", collect_array(values))
    }

    pub fn all(self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.operator("$all", collect_array(values))
    }

    pub fn size(self, size: i32) -> Self {
        self.operator("$size", size)
    }

    pub fn exists(self, exists: bool) -> Self {
        self.operator("$exists", exists)
    }

    pub fn mod_(self, divisor: impl Into<Bson>, remainder: impl Into<Bson>) -> Self {
        self.operator("$mod", Bson::Array(vec![divisor.into(), remainder.into()]))
    }

    /// Specify `$type` criteria. String type names resolve through a fixed
    /// alias table; unknown names pass through unchanged.
    pub fn type_(self, type_spec: impl Into<Bson>) -> Self {
        let operand = match type_spec.into() {
            Bson::String(name) => match TYPE_ALIASES.get(name.as_str()) {
                Some(code) => Bson::Int32(*code),
                None => Bson::String(name),
            },
            other => other,
        };
        self.operator("$type", operand)
    }

    /// Specify `$elemMatch` criteria; accepts a raw document or another
    /// expression's criteria.
    pub fn elem_match(self, expression: impl Into<Bson>) -> Self {
        self.operator("$elemMatch", expression)
    }

    /// Negates an expression for the current field.
    pub fn not(self, expression: impl Into<Bson>) -> Self {
        self.operator("$not", expression)
    }

    /// Shorthand for `$gte` on the lower bound and `$lt` on the upper bound
    /// (half-open interval).
    pub fn range(self, start: impl Into<Bson>, end: impl Into<Bson>) -> Self {
        self.operator("$gte", start).operator("$lt", end)
    }

    /// `$each` modifier for a push expression.
    pub fn each(self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.operator("$each", collect_array(values))
    }

    /// `$slice` modifier for a push expression. Projection slices belong on
    /// the builder (`select_slice`), not here.
    pub fn slice(self, slice: i32) -> Self {
        self.operator("$slice", slice)
    }

    /// `$sort` modifier for a push expression. Result sorting belongs on the
    /// builder (`sort`), not here.
    pub fn sort(
        self,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<Order>)>,
    ) -> Self {
        let mut sort = Document::new();
        for (field, order) in fields {
            sort.insert(field.into(), order.into().as_i32());
        }
        self.operator("$sort", sort)
    }

    // --- logical combinators (top-level; the current field is not consulted) ---

    pub fn add_and(self, expression: impl Into<Bson>) -> Self {
        self.add_clause("$and", expression.into())
    }

    pub fn add_or(self, expression: impl Into<Bson>) -> Self {
        self.add_clause("$or", expression.into())
    }

    pub fn add_nor(self, expression: impl Into<Bson>) -> Self {
        self.add_clause("$nor", expression.into())
    }

    fn add_clause(mut self, combinator: &str, expression: Bson) -> Self {
        match self.criteria.get_mut(combinator) {
            Some(Bson::Array(clauses)) => clauses.push(expression),
            _ => {
                self.criteria.insert(combinator, Bson::Array(vec![expression]));
            }
        }
        self
    }

    // --- text search ---

    /// Specify `$text` criteria for the current query (always top-level).
    pub fn text(mut self, search: impl Into<String>) -> Self {
        let mut text = Document::new();
        text.insert("$search", search.into());
        self.criteria.insert("$text", text);
        self
    }

    /// Set the `$language` option for `$text` criteria; requires a prior
    /// [`Expr::text`] call.
    pub fn language(mut self, language: impl Into<String>) -> Result<Self, Error> {
        match self.criteria.get_mut("$text") {
            Some(Bson::Document(text)) => {
                text.insert("$language", language.into());
                Ok(self)
            }
            _ => Err(Error::Sequencing(
                "a $text operator is required (call text() first)".into(),
            )),
        }
    }

    /// Specify a JavaScript expression for matching documents (`$where`).
    pub fn where_js(mut self, javascript: impl Into<String>) -> Self {
        self.criteria.insert("$where", Bson::JavaScriptCode(javascript.into()));
        self
    }

    // --- geo criteria ---

    pub fn near(self, point: impl Into<Point>) -> Self {
        let point = point.into();
        self.operator("$near", point.to_operand())
    }

    pub fn near_sphere(self, point: impl Into<Point>) -> Self {
        let point = point.into();
        self.operator("$nearSphere", point.to_operand())
    }

    pub fn geo_intersects(self, geometry: Document) -> Self {
        let mut operand = Document::new();
        operand.insert("$geometry", geometry);
        self.operator("$geoIntersects", operand)
    }

    pub fn geo_within(self, geometry: Document) -> Self {
        let mut operand = Document::new();
        operand.insert("$geometry", geometry);
        self.operator("$geoWithin", operand)
    }

    /// `$geoWithin` with a `$box` shape built from the bottom-left and
    /// top-right corners. Legacy coordinate pairs and 2d indexes only.
    pub fn geo_within_box(self, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let mut shape = Document::new();
        shape.insert(
            "$box",
            Bson::Array(vec![legacy_point(x1, y1), legacy_point(x2, y2)]),
        );
        self.operator("$geoWithin", shape)
    }

    /// `$geoWithin` with a `$center` shape. Legacy coordinate pairs and 2d
    /// indexes only.
    pub fn geo_within_center(self, x: f64, y: f64, radius: f64) -> Self {
        let mut shape = Document::new();
        shape.insert("$center", Bson::Array(vec![legacy_point(x, y), Bson::Double(radius)]));
        self.operator("$geoWithin", shape)
    }

    /// `$geoWithin` with a `$centerSphere` shape; supports both 2d and
    /// 2dsphere indexes.
    pub fn geo_within_center_sphere(self, x: f64, y: f64, radius: f64) -> Self {
        let mut shape = Document::new();
        shape.insert(
            "$centerSphere",
            Bson::Array(vec![legacy_point(x, y), Bson::Double(radius)]),
        );
        self.operator("$geoWithin", shape)
    }

    /// `$geoWithin` with a `$polygon` shape. Point coordinates are in x, y
    /// order; the last point is implicitly connected with the first.
    pub fn geo_within_polygon(self, points: &[(f64, f64)]) -> Result<Self, Error> {
        if points.len() < 3 {
            return Err(Error::Argument(
                "a polygon must be defined by three or more points".into(),
            ));
        }
        let mut shape = Document::new();
        shape.insert(
            "$polygon",
            Bson::Array(points.iter().map(|(x, y)| legacy_point(*x, *y)).collect()),
        );
        Ok(self.operator("$geoWithin", shape))
    }

    /// Set `$maxDistance` for prior `$near`/`$nearSphere` criteria. Must be
    /// called after `near()`/`near_sphere()`: the option's placement depends
    /// on whether a GeoJSON point or legacy coordinates were provided.
    pub fn max_distance(mut self, distance: f64) -> Result<Self, Error> {
        let query = self.near_query_mut()?;
        place_distance(query, "$maxDistance", distance)?;
        Ok(self)
    }

    /// Set `$minDistance` for prior `$near`/`$nearSphere` criteria; same
    /// placement rules as [`Expr::max_distance`].
    pub fn min_distance(mut self, distance: f64) -> Result<Self, Error> {
        let query = self.near_query_mut()?;
        place_distance(query, "$minDistance", distance)?;
        Ok(self)
    }

    fn near_query_mut(&mut self) -> Result<&mut Document, Error> {
        match &self.current_field {
            Some(field) => match self.criteria.get_mut(field.as_str()) {
                Some(Bson::Document(query)) => Ok(query),
                _ => Err(near_required()),
            },
            None => Ok(&mut self.criteria),
        }
    }

    // --- update operators (all require a current field) ---

    /// Set the current field to a value. With `atomic` the assignment goes
    /// under `$set`; otherwise the value is written directly into a full
    /// replacement document, creating intermediate documents for dotted
    /// paths.
    pub fn set(mut self, value: impl Into<Bson>, atomic: bool) -> Result<Self, Error> {
        let field = self.require_current_field()?;
        let value = value.into();

        if atomic {
            return self.update_op("$set", value);
        }

        if !field.contains('.') {
            self.new_obj.insert(field, value);
            return Ok(self);
        }

        set_path(&mut self.new_obj, &field, value);
        Ok(self)
    }

    /// Increment the current field; sets it to the value if absent.
    pub fn inc(self, value: impl Into<Bson>) -> Result<Self, Error> {
        self.update_op("$inc", value.into())
    }

    /// Remove the current field from the document (not set to null).
    pub fn unset_field(self) -> Result<Self, Error> {
        self.update_op("$unset", Bson::Int32(1))
    }

    /// Rename the current field.
    pub fn rename(self, name: impl Into<String>) -> Result<Self, Error> {
        self.update_op("$rename", Bson::String(name.into()))
    }

    /// Append a value to the current array field.
    pub fn push(self, value: impl Into<Bson>) -> Result<Self, Error> {
        self.update_op("$push", value.into())
    }

    /// Append with modifiers: the expression's criteria (built with
    /// [`Expr::each`], [`Expr::slice`], [`Expr::sort`]) merge over a default
    /// `{$each: []}`.
    pub fn push_with(self, expression: Expr) -> Result<Self, Error> {
        let mut value = Document::new();
        value.insert("$each", Bson::Array(Vec::new()));
        for (key, entry) in expression.into_criteria() {
            value.insert(key, entry);
        }
        self.update_op("$push", Bson::Document(value))
    }

    /// Remove all elements matching the value or expression from the current
    /// array field.
    pub fn pull(self, value_or_expression: impl Into<Bson>) -> Result<Self, Error> {
        self.update_op("$pull", value_or_expression.into())
    }

    /// Remove all elements matching any of the values from the current array
    /// field.
    pub fn pull_all(self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Result<Self, Error> {
        self.update_op("$pullAll", collect_array(values))
    }

    /// Remove the first element from the current array field.
    pub fn pop_first(self) -> Result<Self, Error> {
        self.update_op("$pop", Bson::Int32(1))
    }

    /// Remove the last element from the current array field.
    pub fn pop_last(self) -> Result<Self, Error> {
        self.update_op("$pop", Bson::Int32(-1))
    }

    /// Append unique value(s) to the current array field; multiple values
    /// may be supplied via an expression using [`Expr::each`].
    pub fn add_to_set(self, value_or_expression: impl Into<Bson>) -> Result<Self, Error> {
        self.update_op("$addToSet", value_or_expression.into())
    }

    fn update_op(mut self, operator: &str, value: Bson) -> Result<Self, Error> {
        let field = self.require_current_field()?;
        match self.new_obj.get_mut(operator) {
            Some(Bson::Document(map)) => {
                map.insert(field, value);
            }
            _ => {
                let mut map = Document::new();
                map.insert(field, value);
                self.new_obj.insert(operator, map);
            }
        }
        Ok(self)
    }

    fn require_current_field(&self) -> Result<String, Error> {
        self.current_field
            .clone()
            .ok_or_else(|| Error::Sequencing("no current field set (call field() first)".into()))
    }
}

/// An expression used as a value contributes its criteria tree.
impl From<Expr> for Bson {
    fn from(expr: Expr) -> Self {
        Bson::Document(expr.into_criteria())
    }
}

fn collect_array(values: impl IntoIterator<Item = impl Into<Bson>>) -> Bson {
    Bson::Array(values.into_iter().map(Into::into).collect())
}

fn legacy_point(x: f64, y: f64) -> Bson {
    Bson::Array(vec![Bson::Double(x), Bson::Double(y)])
}

fn near_required() -> Error {
    Error::Sequencing(
        "a $near or $nearSphere operator is required (call near() or near_sphere() first)".into(),
    )
}

/// GeoJSON nears keep their distance bound inside the operator document;
/// legacy nears put it alongside at the query level.
fn place_distance(query: &mut Document, key: &str, distance: f64) -> Result<(), Error> {
    if !query.contains_key("$near") && !query.contains_key("$nearSphere") {
        return Err(near_required());
    }
    if let Some(Bson::Document(near)) = query.get_mut("$near")
        && near.contains_key("$geometry")
    {
        near.insert(key, distance);
        return Ok(());
    }
    if let Some(Bson::Document(near)) = query.get_mut("$nearSphere")
        && near.contains_key("$geometry")
    {
        near.insert(key, distance);
        return Ok(());
    }
    query.insert(key, distance);
    Ok(())
}

/// Writes a value at a dotted path, creating intermediate documents.
fn set_path(doc: &mut Document, path: &str, value: Bson) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut cur = doc;
    for key in &parts[..parts.len() - 1] {
        let key: &str = key;
        if !matches!(cur.get(key), Some(Bson::Document(_))) {
            cur.insert(key.to_string(), Bson::Document(Document::new()));
        }
        match cur.get_mut(key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return,
        }
    }
    if let Some(last) = parts.last() {
        cur.insert((*last).to_string(), value);
    }
}
