use crate::collection::Collection;
use crate::errors::Error;
use crate::options::normalize_options;
use crate::query::exec::Query;
use crate::query::expr::Expr;
use crate::query::types::{
    GeoNearArgs, GroupArgs, MapReduceArgs, Order, OutTarget, Point, QueryDescriptor, QueryType,
    ReadPreference, ReadPreferenceMode,
};
use bson::{Bson, Document};

/// Fluent builder for one logical query or mutation against a collection.
///
/// The builder owns one [`Expr`] for criteria/update accumulation and tracks
/// the query type plus type-specific parameters. It is mutated only by the
/// caller building the query and compiles into an immutable [`Query`] with
/// [`Builder::query`]. Switching the type mid-build is allowed and does not
/// reset parameter blocks set for a previous type.
#[derive(Debug, Clone)]
pub struct Builder {
    collection: Collection,
    expr: Expr,
    query_type: QueryType,
    select: Document,
    sort: Document,
    limit: Option<i64>,
    skip: Option<i64>,
    hint: Option<Bson>,
    immortal: Option<bool>,
    snapshot: Option<bool>,
    slave_okay: Option<bool>,
    return_new: Option<bool>,
    upsert: Option<bool>,
    multiple: Option<bool>,
    read_preference: Option<ReadPreference>,
    distinct_field: Option<String>,
    geo_near: Option<GeoNearArgs>,
    map_reduce: Option<MapReduceArgs>,
    group: Option<GroupArgs>,
}

impl Builder {
    pub(crate) fn new(collection: Collection) -> Self {
        Builder {
            collection,
            expr: Expr::new(),
            query_type: QueryType::Find,
            select: Document::new(),
            sort: Document::new(),
            limit: None,
            skip: None,
            hint: None,
            immortal: None,
            snapshot: None,
            slave_okay: None,
            return_new: None,
            upsert: None,
            multiple: None,
            read_preference: None,
            distinct_field: None,
            geo_near: None,
            map_reduce: None,
            group: None,
        }
    }

    /// A fresh expression for building partial criteria to feed into
    /// combinator or operator methods.
    pub fn expr(&self) -> Expr {
        Expr::new()
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Snapshot of the accumulated state, for debugging.
    pub fn debug(&self) -> Document {
        let mut state = Document::new();
        state.insert("type", format!("{:?}", self.query_type));
        state.insert("query", self.expr.criteria().clone());
        state.insert("newObj", self.expr.new_obj().clone());
        state.insert("select", self.select.clone());
        state.insert("sort", self.sort.clone());
        if let Some(limit) = self.limit {
            state.insert("limit", limit);
        }
        if let Some(skip) = self.skip {
            state.insert("skip", skip);
        }
        state
    }

    // --- query type switches ---

    pub fn find(mut self) -> Self {
        self.query_type = QueryType::Find;
        self
    }

    pub fn count(mut self) -> Self {
        self.query_type = QueryType::Count;
        self
    }

    /// Change the query type to a distinct command over the given field.
    pub fn distinct(mut self, field: impl Into<String>) -> Self {
        self.query_type = QueryType::Distinct;
        self.distinct_field = Some(field.into());
        self
    }

    pub fn insert(mut self) -> Self {
        self.query_type = QueryType::Insert;
        self
    }

    pub fn update(mut self) -> Self {
        self.query_type = QueryType::Update;
        self
    }

    pub fn remove(mut self) -> Self {
        self.query_type = QueryType::Remove;
        self
    }

    /// Change the query type to findAndUpdate (uses the findandmodify
    /// command).
    pub fn find_and_update(mut self) -> Self {
        self.query_type = QueryType::FindAndUpdate;
        self
    }

    /// Change the query type to findAndRemove (uses the findandmodify
    /// command).
    pub fn find_and_remove(mut self) -> Self {
        self.query_type = QueryType::FindAndRemove;
        self
    }

    /// Change the query type to a geoNear command. The `spherical` option
    /// defaults to true when a GeoJSON point is supplied; the `num` option is
    /// taken from [`Builder::limit`]. Additional criteria become the
    /// command's `query` option.
    pub fn geo_near(mut self, point: impl Into<Point>) -> Self {
        self.query_type = QueryType::GeoNear;
        self.geo_near = Some(GeoNearArgs::new(point.into()));
        self
    }

    /// Change the query type to a mapReduce command with an inline output
    /// target; `reduce` must be supplied via [`Builder::reduce`].
    pub fn map(mut self, map: impl Into<Bson>) -> Self {
        self.query_type = QueryType::MapReduce;
        self.map_reduce = Some(MapReduceArgs {
            map: map.into(),
            reduce: None,
            out: OutTarget::Inline,
            options: Document::new(),
        });
        self
    }

    /// Change the query type to a mapReduce command.
    pub fn map_reduce(
        mut self,
        map: impl Into<Bson>,
        reduce: impl Into<Bson>,
        out: OutTarget,
        options: Document,
    ) -> Self {
        self.query_type = QueryType::MapReduce;
        self.map_reduce = Some(MapReduceArgs {
            map: map.into(),
            reduce: Some(reduce.into()),
            out,
            options,
        });
        self
    }

    /// Change the query type to a group command. The reduce function may be
    /// set later with [`Builder::reduce`].
    pub fn group(mut self, keys: impl Into<Bson>, initial: Document) -> Self {
        self.query_type = QueryType::Group;
        self.group = Some(GroupArgs {
            keys: keys.into(),
            initial,
            reduce: None,
            options: Document::new(),
        });
        self
    }

    // --- type-guarded setters ---

    /// Set the "distanceMultiplier" option for a geoNear command query.
    pub fn distance_multiplier(mut self, multiplier: f64) -> Result<Self, Error> {
        self.geo_near_options_mut()?.insert("distanceMultiplier", multiplier);
        Ok(self)
    }

    /// Set the "spherical" option for a geoNear command query.
    pub fn spherical(mut self, spherical: bool) -> Result<Self, Error> {
        self.geo_near_options_mut()?.insert("spherical", spherical);
        Ok(self)
    }

    /// Set the "maxDistance" option for a geoNear command, or add
    /// `$maxDistance` criteria to the current expression otherwise.
    pub fn max_distance(mut self, distance: f64) -> Result<Self, Error> {
        if self.query_type == QueryType::GeoNear {
            self.geo_near_options_mut()?.insert("maxDistance", distance);
            Ok(self)
        } else {
            self.expr = self.expr.max_distance(distance)?;
            Ok(self)
        }
    }

    /// Set the "minDistance" option for a geoNear command, or add
    /// `$minDistance` criteria to the current expression otherwise.
    pub fn min_distance(mut self, distance: f64) -> Result<Self, Error> {
        if self.query_type == QueryType::GeoNear {
            self.geo_near_options_mut()?.insert("minDistance", distance);
            Ok(self)
        } else {
            self.expr = self.expr.min_distance(distance)?;
            Ok(self)
        }
    }

    fn geo_near_options_mut(&mut self) -> Result<&mut Document, Error> {
        if self.query_type != QueryType::GeoNear {
            return Err(Error::Sequencing(
                "a geoNear command is required (call geo_near() first)".into(),
            ));
        }
        match &mut self.geo_near {
            Some(args) => Ok(&mut args.options),
            None => Err(Error::Sequencing(
                "a geoNear command is required (call geo_near() first)".into(),
            )),
        }
    }

    /// Set the "out" option for a mapReduce command.
    pub fn out(mut self, out: OutTarget) -> Result<Self, Error> {
        self.map_reduce_mut()?.out = out;
        Ok(self)
    }

    /// Replace the option bag of a mapReduce command.
    pub fn map_reduce_options(mut self, options: Document) -> Result<Self, Error> {
        self.map_reduce_mut()?.options = options;
        Ok(self)
    }

    fn map_reduce_mut(&mut self) -> Result<&mut MapReduceArgs, Error> {
        if self.query_type != QueryType::MapReduce {
            return Err(Error::Sequencing(
                "a mapReduce command is required (call map() or map_reduce() first)".into(),
            ));
        }
        self.map_reduce.as_mut().ok_or_else(|| {
            Error::Sequencing("a mapReduce command is required (call map() or map_reduce() first)".into())
        })
    }

    /// Set the "reduce" option for a mapReduce or group command.
    pub fn reduce(mut self, reduce: impl Into<Bson>) -> Result<Self, Error> {
        let reduce = reduce.into();
        match self.query_type {
            QueryType::MapReduce => {
                self.map_reduce_mut()?.reduce = Some(reduce);
            }
            QueryType::Group => {
                self.group_mut()?.reduce = Some(reduce);
            }
            _ => {
                return Err(Error::Sequencing(
                    "map_reduce(), map() or group() must be called before reduce()".into(),
                ));
            }
        }
        Ok(self)
    }

    /// Set the "finalize" option for a mapReduce or group command.
    pub fn finalize(mut self, finalize: impl Into<Bson>) -> Result<Self, Error> {
        let finalize = finalize.into();
        match self.query_type {
            QueryType::MapReduce => {
                self.map_reduce_mut()?.options.insert("finalize", finalize);
            }
            QueryType::Group => {
                self.group_mut()?.options.insert("finalize", finalize);
            }
            _ => {
                return Err(Error::Sequencing(
                    "map_reduce(), map() or group() must be called before finalize()".into(),
                ));
            }
        }
        Ok(self)
    }

    /// Replace the option bag of a group command.
    pub fn group_options(mut self, options: Document) -> Result<Self, Error> {
        self.group_mut()?.options = options;
        Ok(self)
    }

    fn group_mut(&mut self) -> Result<&mut GroupArgs, Error> {
        if self.query_type != QueryType::Group {
            return Err(Error::Sequencing(
                "a group command is required (call group() first)".into(),
            ));
        }
        self.group.as_mut().ok_or_else(|| {
            Error::Sequencing("a group command is required (call group() first)".into())
        })
    }

    // --- projection ---

    /// Set one or more fields to be included in the query projection.
    ///
    /// Mixing inclusions and exclusions (beyond excluding `_id`) is left to
    /// caller discipline and not validated here.
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for field in fields {
            self.select.insert(field.into(), Bson::Int32(1));
        }
        self
    }

    /// Set one or more fields to be excluded from the query projection.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for field in fields {
            self.select.insert(field.into(), Bson::Int32(0));
        }
        self
    }

    /// Project only matching embedded documents of an array field.
    pub fn select_elem_match(mut self, field: impl Into<String>, expression: impl Into<Bson>) -> Self {
        let mut projection = Document::new();
        projection.insert("$elemMatch", expression.into());
        self.select.insert(field.into(), projection);
        self
    }

    /// Project a metadata field.
    pub fn select_meta(mut self, field: impl Into<String>, keyword: impl Into<String>) -> Self {
        let mut projection = Document::new();
        projection.insert("$meta", keyword.into());
        self.select.insert(field.into(), projection);
        self
    }

    /// Project a slice of an array field. `count_or_skip` is a count when
    /// `limit` is absent, a skip otherwise.
    pub fn select_slice(
        mut self,
        field: impl Into<String>,
        count_or_skip: i32,
        limit: Option<i32>,
    ) -> Self {
        let slice = match limit {
            Some(limit) => Bson::Array(vec![Bson::Int32(count_or_skip), Bson::Int32(limit)]),
            None => Bson::Int32(count_or_skip),
        };
        let mut projection = Document::new();
        projection.insert("$slice", slice);
        self.select.insert(field.into(), projection);
        self
    }

    // --- sort / cursor options ---

    /// Add a field/order pair to the sort specification. String orders
    /// "asc"/"desc" normalize to 1/-1.
    pub fn sort(mut self, field: impl Into<String>, order: impl Into<Order>) -> Self {
        self.sort.insert(field.into(), order.into().as_i32());
        self
    }

    /// Add several field/order pairs at once.
    pub fn sort_all(
        mut self,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<Order>)>,
    ) -> Self {
        for (field, order) in fields {
            self.sort.insert(field.into(), order.into().as_i32());
        }
        self
    }

    /// Sort by a projected metadata field; registers the `$meta` projection
    /// if the field is not already projected.
    pub fn sort_meta(mut self, field: impl Into<String>, keyword: impl Into<String>) -> Self {
        let field = field.into();
        let keyword = keyword.into();
        // An existing projection for the field is assumed intentional and is
        // not overridden.
        if !self.select.contains_key(&field) {
            self = self.select_meta(field.clone(), keyword.clone());
        }
        let mut meta = Document::new();
        meta.insert("$meta", keyword);
        self.sort.insert(field, meta);
        self
    }

    /// Set the limit for the query; doubles as the `num` option of a geoNear
    /// command and passes through to mapReduce options.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn hint(mut self, index: impl Into<Bson>) -> Self {
        self.hint = Some(index.into());
        self
    }

    /// Set the immortal cursor flag.
    pub fn immortal(mut self, immortal: bool) -> Self {
        self.immortal = Some(immortal);
        self
    }

    /// Set the snapshot cursor flag.
    pub fn snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Allow the query to be directed to replica set secondaries: compiles
    /// to a "secondaryPreferred" read preference unless one was set
    /// explicitly.
    pub fn slave_okay(mut self, slave_okay: bool) -> Self {
        self.slave_okay = Some(slave_okay);
        self
    }

    /// Set the "new" option for a findAndUpdate query.
    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = Some(return_new);
        self
    }

    /// Set the "upsert" option for an update or findAndUpdate query.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    /// Set the "multiple" option for an update query.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    /// Set the read preference for read-only queries and commands.
    pub fn read_preference(mut self, mode: ReadPreferenceMode, tags: Vec<Document>) -> Self {
        self.read_preference = Some(ReadPreference::with_tags(mode, tags));
        self
    }

    // --- expression delegation ---

    /// Set the current field for building the expression.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.expr = self.expr.field(field);
        self
    }

    pub fn equals(mut self, value: impl Into<Bson>) -> Result<Self, Error> {
        self.expr = self.expr.equals(value)?;
        Ok(self)
    }

    pub fn operator(mut self, operator: &str, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.operator(operator, value);
        self
    }

    pub fn gt(mut self, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.gt(value);
        self
    }

    pub fn gte(mut self, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.gte(value);
        self
    }

    pub fn lt(mut self, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.lt(value);
        self
    }

    pub fn lte(mut self, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.lte(value);
        self
    }

    pub fn not_equal(mut self, value: impl Into<Bson>) -> Self {
        self.expr = self.expr.not_equal(value);
        self
    }

    pub fn in_(mut self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.expr = self.expr.in_(values);
        self
    }

    pub fn not_in(mut self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.expr = self.expr.not_in(values);
        self
    }

    pub fn all(mut self, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.expr = self.expr.all(values);
        self
    }

    pub fn size(mut self, size: i32) -> Self {
        self.expr = self.expr.size(size);
        self
    }

    pub fn exists(mut self, exists: bool) -> Self {
        self.expr = self.expr.exists(exists);
        self
    }

    pub fn mod_(mut self, divisor: impl Into<Bson>, remainder: impl Into<Bson>) -> Self {
        self.expr = self.expr.mod_(divisor, remainder);
        self
    }

    pub fn type_(mut self, type_spec: impl Into<Bson>) -> Self {
        self.expr = self.expr.type_(type_spec);
        self
    }

    pub fn elem_match(mut self, expression: impl Into<Bson>) -> Self {
        self.expr = self.expr.elem_match(expression);
        self
    }

    pub fn not(mut self, expression: impl Into<Bson>) -> Self {
        self.expr = self.expr.not(expression);
        self
    }

    pub fn range(mut self, start: impl Into<Bson>, end: impl Into<Bson>) -> Self {
        self.expr = self.expr.range(start, end);
        self
    }

    pub fn add_and(mut self, expression: impl Into<Bson>) -> Self {
        self.expr = self.expr.add_and(expression);
        self
    }

    pub fn add_or(mut self, expression: impl Into<Bson>) -> Self {
        self.expr = self.expr.add_or(expression);
        self
    }

    pub fn add_nor(mut self, expression: impl Into<Bson>) -> Self {
        self.expr = self.expr.add_nor(expression);
        self
    }

    pub fn text(mut self, search: impl Into<String>) -> Self {
        self.expr = self.expr.text(search);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Result<Self, Error> {
        self.expr = self.expr.language(language)?;
        Ok(self)
    }

    pub fn where_js(mut self, javascript: impl Into<String>) -> Self {
        self.expr = self.expr.where_js(javascript);
        self
    }

    pub fn near(mut self, point: impl Into<Point>) -> Self {
        self.expr = self.expr.near(point);
        self
    }

    pub fn near_sphere(mut self, point: impl Into<Point>) -> Self {
        self.expr = self.expr.near_sphere(point);
        self
    }

    pub fn geo_intersects(mut self, geometry: Document) -> Self {
        self.expr = self.expr.geo_intersects(geometry);
        self
    }

    pub fn geo_within(mut self, geometry: Document) -> Self {
        self.expr = self.expr.geo_within(geometry);
        self
    }

    pub fn geo_within_box(mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        self.expr = self.expr.geo_within_box(x1, y1, x2, y2);
        self
    }

    pub fn geo_within_center(mut self, x: f64, y: f64, radius: f64) -> Self {
        self.expr = self.expr.geo_within_center(x, y, radius);
        self
    }

    pub fn geo_within_center_sphere(mut self, x: f64, y: f64, radius: f64) -> Self {
        self.expr = self.expr.geo_within_center_sphere(x, y, radius);
        self
    }

    pub fn geo_within_polygon(mut self, points: &[(f64, f64)]) -> Result<Self, Error> {
        self.expr = self.expr.geo_within_polygon(points)?;
        Ok(self)
    }

    /// Set the current field to a value. For update and findAndUpdate
    /// queries `atomic` selects a `$set` operator; inserts always write the
    /// full document.
    pub fn set(mut self, value: impl Into<Bson>, atomic: bool) -> Result<Self, Error> {
        let atomic = atomic && self.query_type != QueryType::Insert;
        self.expr = self.expr.set(value, atomic)?;
        Ok(self)
    }

    pub fn inc(mut self, value: impl Into<Bson>) -> Result<Self, Error> {
        self.expr = self.expr.inc(value)?;
        Ok(self)
    }

    pub fn unset_field(mut self) -> Result<Self, Error> {
        self.expr = self.expr.unset_field()?;
        Ok(self)
    }

    pub fn rename(mut self, name: impl Into<String>) -> Result<Self, Error> {
        self.expr = self.expr.rename(name)?;
        Ok(self)
    }

    pub fn push(mut self, value: impl Into<Bson>) -> Result<Self, Error> {
        self.expr = self.expr.push(value)?;
        Ok(self)
    }

    pub fn push_with(mut self, expression: Expr) -> Result<Self, Error> {
        self.expr = self.expr.push_with(expression)?;
        Ok(self)
    }

    pub fn pull(mut self, value_or_expression: impl Into<Bson>) -> Result<Self, Error> {
        self.expr = self.expr.pull(value_or_expression)?;
        Ok(self)
    }

    pub fn pull_all(
        mut self,
        values: impl IntoIterator<Item = impl Into<Bson>>,
    ) -> Result<Self, Error> {
        self.expr = self.expr.pull_all(values)?;
        Ok(self)
    }

    pub fn pop_first(mut self) -> Result<Self, Error> {
        self.expr = self.expr.pop_first()?;
        Ok(self)
    }

    pub fn pop_last(mut self) -> Result<Self, Error> {
        self.expr = self.expr.pop_last()?;
        Ok(self)
    }

    pub fn add_to_set(mut self, value_or_expression: impl Into<Bson>) -> Result<Self, Error> {
        self.expr = self.expr.add_to_set(value_or_expression)?;
        Ok(self)
    }

    /// Direct access to the accumulated criteria.
    pub fn criteria(&self) -> &Document {
        self.expr.criteria()
    }

    /// Replace the accumulated criteria wholesale.
    pub fn set_criteria(mut self, criteria: Document) -> Self {
        self.expr.set_criteria(criteria);
        self
    }

    /// Direct access to the accumulated "new object".
    pub fn new_obj(&self) -> &Document {
        self.expr.new_obj()
    }

    /// Replace the accumulated "new object" wholesale.
    pub fn set_new_obj(mut self, new_obj: Document) -> Self {
        self.expr.set_new_obj(new_obj);
        self
    }

    // --- compilation ---

    /// Compile the accumulated state into an immutable [`Query`]. The option
    /// bag is normalized against the driver's capability profile and merged
    /// into every compiled command.
    pub fn query(self, options: Document) -> Query {
        let capabilities = self.collection.database().driver().capabilities();
        let options = normalize_options(&options, &capabilities);
        let descriptor = QueryDescriptor {
            query_type: self.query_type,
            criteria: self.expr.criteria().clone(),
            new_obj: self.expr.new_obj().clone(),
            select: self.select,
            sort: self.sort,
            limit: self.limit,
            skip: self.skip,
            hint: self.hint,
            immortal: self.immortal,
            snapshot: self.snapshot,
            slave_okay: self.slave_okay,
            return_new: self.return_new,
            upsert: self.upsert,
            multiple: self.multiple,
            read_preference: self.read_preference,
            distinct_field: self.distinct_field,
            geo_near: self.geo_near,
            map_reduce: self.map_reduce,
            group: self.group,
        };
        Query::new(self.collection, descriptor, options)
    }
}
