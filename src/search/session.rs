// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search session: resolves fields, collects clauses, renders the query.
//!
//! ```text
//! where("age").gte(30)        →  (@age:[30 +inf])
//!   .and("tags").eq("x")      →  (@age:[30 +inf]) (@tags:{x})
//!   .and("emb").knn(5, v)     →  ((@age:[30 +inf]) (@tags:{x}))=>[KNN 5 @emb $BLOB]
//! ```
//!
//! Clauses render in call order and are joined by a single space (implicit
//! AND). A nearest-neighbour clause is lifted out of the chain and appended as
//! a suffix; the last one wins.

use std::collections::BTreeMap;

use super::builders::{range_param, FieldBuilder, Rejection, VectorMode};
use super::geo::Circle;
use crate::config::StorageKind;
use crate::error::QueryResolutionError;
use crate::schema::{CanonicalSchema, ElementType, FieldKind, FieldMap, ScalarKind};
use crate::value::Value;

/// Parameter name bound to the KNN query vector.
pub const KNN_PARAM: &str = "BLOB";

/// Lowest query dialect that accepts parameters and vector clauses.
pub const VECTOR_DIALECT: u32 = 2;

type QueryResult<T> = Result<T, QueryResolutionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Output of [`Search::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: String,
    pub dialect: Option<u32>,
    /// Binary parameter bindings (query vectors), by name.
    pub params: BTreeMap<String, Vec<u8>>,
    pub sort_by: Option<(String, SortOrder)>,
    /// `(offset, count)`
    pub limit: Option<(usize, usize)>,
}

impl CompiledQuery {
    /// Arguments for `FT.SEARCH`, index name first.
    pub fn to_ft_search_args(&self, index: &str) -> Vec<Vec<u8>> {
        let text = |s: &str| s.as_bytes().to_vec();
        let mut args = vec![text(index), text(&self.query)];

        if let Some((field, order)) = &self.sort_by {
            args.push(text("SORTBY"));
            args.push(text(field));
            args.push(text(order.as_str()));
        }

        if let Some((offset, count)) = self.limit {
            args.push(text("LIMIT"));
            args.push(text(&offset.to_string()));
            args.push(text(&count.to_string()));
        }

        if !self.params.is_empty() {
            args.push(text("PARAMS"));
            args.push(text(&(self.params.len() * 2).to_string()));
            for (name, blob) in &self.params {
                args.push(text(name));
                args.push(blob.clone());
            }
        }

        if let Some(dialect) = self.dialect {
            args.push(text("DIALECT"));
            args.push(text(&dialect.to_string()));
        }

        args
    }
}

#[derive(Debug, Clone)]
struct ClauseEntry {
    path: String,
    alias: String,
    kind: &'static str,
    negated: bool,
    builder: FieldBuilder,
}

/// One query under construction.
///
/// A session borrows its schema and is owned by a single caller; build one
/// per query.
#[derive(Debug, Clone)]
pub struct Search<'s> {
    schema: &'s CanonicalSchema,
    storage: StorageKind,
    clauses: Vec<ClauseEntry>,
    dialect: Option<u32>,
    sort_by: Option<(String, SortOrder)>,
    limit: Option<(usize, usize)>,
}

/// Handle on the clause most recently appended to a [`Search`].
///
/// Operators consume and return the handle so calls chain with `?`.
#[derive(Debug)]
pub struct Clause<'a, 's> {
    search: &'a mut Search<'s>,
    index: usize,
}

/// Path segments that name schema fields; wildcards are dropped.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('.')
        .map(|s| s.strip_suffix("[*]").unwrap_or(s))
        .filter(|s| !s.is_empty() && *s != "*")
        .collect()
}

/// Index alias for a field path: `address.city` → `address_city`.
pub fn alias_for(path: &str) -> String {
    segments(path).join("_")
}

enum Cursor<'a> {
    Fields(&'a FieldMap),
    Kind(&'a FieldKind),
    Element(ScalarKind),
}

fn descend<'a>(cursor: Cursor<'a>, segment: &str, path: &str) -> QueryResult<Cursor<'a>> {
    let unknown = || QueryResolutionError::UnknownField { path: path.to_string() };
    let not_traversable = || QueryResolutionError::NotTraversable {
        path: path.to_string(),
        segment: segment.to_string(),
    };
    match cursor {
        Cursor::Fields(fields) => {
            let field = fields.get(segment).ok_or_else(unknown)?;
            // Unindexed fields (arrays of objects included) have no alias in the index.
            if !field.indexed {
                return Err(QueryResolutionError::NotSearchable {
                    path: path.to_string(),
                    kind: "non-indexed field",
                });
            }
            Ok(Cursor::Kind(&field.kind))
        }
        Cursor::Kind(FieldKind::Object(properties)) => descend(Cursor::Fields(properties), segment, path),
        Cursor::Kind(FieldKind::Tuple(elements)) => {
            let position = segment.parse::<usize>().map_err(|_| not_traversable())?;
            Ok(match elements.get(position).ok_or_else(unknown)? {
                ElementType::Scalar(kind) => Cursor::Element(*kind),
                ElementType::Object(properties) => Cursor::Fields(properties),
            })
        }
        _ => Err(not_traversable()),
    }
}

/// Resolve a field path to its kind name and a fresh builder.
fn resolve(
    schema: &CanonicalSchema,
    storage: StorageKind,
    path: &str,
) -> QueryResult<(&'static str, FieldBuilder)> {
    let segs = segments(path);
    let Some(first) = segs.first() else {
        return Err(QueryResolutionError::UnknownField { path: path.to_string() });
    };
    if schema.references().contains_key(*first) {
        return Err(QueryResolutionError::NotSearchable {
            path: path.to_string(),
            kind: "reference",
        });
    }
    if schema.relations().contains_key(*first) {
        return Err(QueryResolutionError::NotSearchable {
            path: path.to_string(),
            kind: "relation",
        });
    }

    let mut cursor = Cursor::Fields(schema.data());
    for segment in &segs {
        cursor = descend(cursor, segment, path)?;
    }

    // Hash indexes only carry top-level fields.
    if storage == StorageKind::Hash && segs.len() > 1 {
        return Err(QueryResolutionError::NotSearchable {
            path: path.to_string(),
            kind: "nested field in hash storage",
        });
    }

    let not_leaf = || QueryResolutionError::NotALeaf { path: path.to_string() };
    match cursor {
        Cursor::Fields(_) => Err(not_leaf()),
        Cursor::Kind(kind) => FieldBuilder::for_kind(kind, storage)
            .map(|builder| (kind.type_name(), builder))
            .ok_or_else(not_leaf),
        Cursor::Element(kind) => FieldBuilder::for_kind(&kind.to_kind(), storage)
            .map(|builder| (kind.as_str(), builder))
            .ok_or_else(not_leaf),
    }
}

impl<'s> Search<'s> {
    pub fn new(schema: &'s CanonicalSchema, storage: StorageKind) -> Self {
        Self {
            schema,
            storage,
            clauses: Vec::new(),
            dialect: None,
            sort_by: None,
            limit: None,
        }
    }

    /// Start a clause on `field`. Dotted paths reach into objects
    /// (`address.city`) and tuple positions (`pair.0`); `[*]` on a scalar
    /// array (`tags[*]`) is accepted and dropped from the alias.
    ///
    /// Fields the index does not carry fail with
    /// [`QueryResolutionError::NotSearchable`]: `index: false` fields, arrays
    /// of objects, and anything below the top level with hash storage.
    pub fn r#where(&mut self, field: &str) -> QueryResult<Clause<'_, 's>> {
        let (kind, builder) = resolve(self.schema, self.storage, field)?;
        self.clauses.push(ClauseEntry {
            path: field.to_string(),
            alias: alias_for(field),
            kind,
            negated: false,
            builder,
        });
        Ok(Clause {
            index: self.clauses.len() - 1,
            search: self,
        })
    }

    /// Query dialect to request. Vector clauses raise it to at least 2.
    pub fn dialect(&mut self, dialect: u32) -> &mut Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn sort_by(&mut self, field: &str, order: SortOrder) -> QueryResult<&mut Self> {
        let (kind, builder) = resolve(self.schema, self.storage, field)?;
        if let FieldBuilder::Vector(_) = builder {
            return Err(QueryResolutionError::UnsupportedOperator {
                field: field.to_string(),
                kind,
                operator: "sort_by",
            });
        }
        self.sort_by = Some((alias_for(field), order));
        Ok(self)
    }

    pub fn limit(&mut self, offset: usize, count: usize) -> &mut Self {
        self.limit = Some((offset, count));
        self
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Query string only.
    pub fn render(&self) -> QueryResult<String> {
        self.compile().map(|compiled| compiled.query)
    }

    pub fn compile(&self) -> QueryResult<CompiledQuery> {
        let mut chain = Vec::with_capacity(self.clauses.len());
        let mut params = BTreeMap::new();
        let mut nearest: Option<(&str, usize, &[u8])> = None;
        let mut has_vector = false;

        for entry in &self.clauses {
            let incomplete = || QueryResolutionError::IncompleteClause { field: entry.path.clone() };
            if !entry.builder.is_complete() {
                return Err(incomplete());
            }

            if let FieldBuilder::Vector(vector) = &entry.builder {
                has_vector = true;
                if let Some(VectorMode::Range { blob, .. }) = vector.mode() {
                    params.insert(range_param(&entry.alias), blob.clone());
                }
            }

            if let Some((k, blob)) = entry.builder.nearest() {
                if entry.negated {
                    return Err(QueryResolutionError::InvalidValue {
                        field: entry.path.clone(),
                        reason: "nearest-neighbour clauses cannot be negated".to_string(),
                    });
                }
                nearest = Some((entry.alias.as_str(), k, blob));
                continue;
            }

            let token = entry.builder.render(&entry.alias).ok_or_else(incomplete)?;
            if entry.negated {
                chain.push(format!("(-(@{}:{}))", entry.alias, token));
            } else {
                chain.push(format!("(@{}:{})", entry.alias, token));
            }
        }

        let joined = chain.join(" ");
        let query = match nearest {
            None if chain.is_empty() => "*".to_string(),
            None => joined,
            Some((alias, k, blob)) => {
                params.insert(KNN_PARAM.to_string(), blob.to_vec());
                let base = match chain.len() {
                    0 => "*".to_string(),
                    1 => joined,
                    _ => format!("({})", joined),
                };
                format!("{}=>[KNN {} @{} ${}]", base, k, alias, KNN_PARAM)
            }
        };

        let dialect = if has_vector {
            Some(self.dialect.map_or(VECTOR_DIALECT, |d| d.max(VECTOR_DIALECT)))
        } else {
            self.dialect
        };

        Ok(CompiledQuery {
            query,
            dialect,
            params,
            sort_by: self.sort_by.clone(),
            limit: self.limit,
        })
    }
}

impl<'a, 's> Clause<'a, 's> {
    fn apply(
        self,
        operator: &'static str,
        op: impl FnOnce(&mut FieldBuilder) -> Result<(), Rejection>,
    ) -> QueryResult<Self> {
        let outcome = {
            let entry = &mut self.search.clauses[self.index];
            op(&mut entry.builder).map_err(|rejection| match rejection {
                Rejection::Unsupported => QueryResolutionError::UnsupportedOperator {
                    field: entry.path.clone(),
                    kind: entry.kind,
                    operator,
                },
                Rejection::Invalid(reason) => QueryResolutionError::InvalidValue {
                    field: entry.path.clone(),
                    reason,
                },
            })
        };
        outcome.map(|()| self)
    }

    /// Match a value. On numeric fields this is the range `[v v]`.
    pub fn eq(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("eq", |b| b.equals(&value))
    }

    /// Add an alternative value to this clause (TAG and TEXT).
    pub fn or(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("or", |b| b.or(&value))
    }

    pub fn gt(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("gt", |b| b.gt(&value))
    }

    pub fn gte(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("gte", |b| b.gte(&value))
    }

    pub fn lt(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("lt", |b| b.lt(&value))
    }

    pub fn lte(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("lte", |b| b.lte(&value))
    }

    /// Inclusive range `[low high]`.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> QueryResult<Self> {
        let (low, high) = (low.into(), high.into());
        self.apply("between", |b| b.between(&low, &high))
    }

    /// Exact phrase match on a text field.
    pub fn exact(self, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        self.apply("exact", |b| b.exact(&value))
    }

    /// Points inside `circle`.
    pub fn within(self, circle: Circle) -> QueryResult<Self> {
        self.apply("within", |b| b.within(circle))
    }

    /// The `k` nearest neighbours of `vector`.
    pub fn knn(self, k: usize, vector: impl IntoIterator<Item = impl Into<f64>>) -> QueryResult<Self> {
        let vector: Vec<f64> = vector.into_iter().map(Into::into).collect();
        self.apply("knn", |b| b.knn(k, &vector))
    }

    /// Vectors within `radius` of `vector`.
    pub fn range(self, radius: f64, vector: impl IntoIterator<Item = impl Into<f64>>) -> QueryResult<Self> {
        let vector: Vec<f64> = vector.into_iter().map(Into::into).collect();
        self.apply("range", |b| b.range(radius, &vector))
    }

    /// Toggle negation. Two calls cancel out.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let entry = &mut self.search.clauses[self.index];
        entry.negated = !entry.negated;
        self
    }

    /// Start the next clause.
    pub fn and(self, field: &str) -> QueryResult<Clause<'a, 's>> {
        let search = self.search;
        search.r#where(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Point;
    use serde_json::json;

    fn schema() -> CanonicalSchema {
        CanonicalSchema::from_json(json!({
            "name": "string",
            "age": "number",
            "active": "boolean",
            "big": "bigint",
            "bio": "text",
            "born": "date",
            "home": "point",
            "tags": { "type": "array" },
            "address": {
                "type": "object",
                "properties": { "city": "string", "geo": "point" }
            },
            "comments": { "type": "array", "elements": { "author": "string" } },
            "pair": { "type": "tuple", "elements": ["number", { "label": "text" }] },
            "embedding": {
                "type": "vector", "algorithm": "HNSW", "distance": "COSINE",
                "vectorType": "FLOAT32", "dimension": 3
            },
            "friends": { "type": "reference", "schema": "self" },
        }))
        .unwrap()
    }

    #[test]
    fn test_end_to_end_example() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("age").unwrap().gte(30).unwrap().and("tags").unwrap().eq("x").unwrap();
        assert_eq!(search.render().unwrap(), "(@age:[30 +inf]) (@tags:{x})");
    }

    #[test]
    fn test_empty_session_matches_all() {
        let schema = schema();
        let compiled = Search::new(&schema, StorageKind::Json).compile().unwrap();
        assert_eq!(compiled.query, "*");
        assert_eq!(compiled.dialect, None);
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_clause_order_is_call_order() {
        let schema = schema();
        let mut a = Search::new(&schema, StorageKind::Json);
        a.r#where("name").unwrap().eq("x").unwrap().and("age").unwrap().lt(3).unwrap();
        let mut b = Search::new(&schema, StorageKind::Json);
        b.r#where("age").unwrap().lt(3).unwrap().and("name").unwrap().eq("x").unwrap();
        assert_eq!(a.render().unwrap(), "(@name:{x}) (@age:[-inf (3])");
        assert_eq!(b.render().unwrap(), "(@age:[-inf (3]) (@name:{x})");
    }

    #[test]
    fn test_negation_parity() {
        let schema = schema();
        for toggles in 0..5 {
            let mut search = Search::new(&schema, StorageKind::Json);
            let mut clause = search.r#where("age").unwrap().between(1, 2).unwrap();
            for _ in 0..toggles {
                clause = clause.not();
            }
            let expected = if toggles % 2 == 1 { "(-(@age:[1 2]))" } else { "(@age:[1 2])" };
            assert_eq!(search.render().unwrap(), expected);
        }
    }

    #[test]
    fn test_nested_and_wildcard_paths() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search
            .r#where("address.city")
            .unwrap()
            .eq("Paris")
            .unwrap()
            .and("tags[*]")
            .unwrap()
            .eq("x")
            .unwrap();
        assert_eq!(search.render().unwrap(), "(@address_city:{Paris}) (@tags:{x})");
    }

    #[test]
    fn test_unindexed_fields_not_searchable() {
        let schema = CanonicalSchema::from_json(json!({
            "hidden": { "type": "string", "index": false },
            "comments": { "type": "array", "elements": { "author": "string" } },
            "address": {
                "type": "object",
                "index": false,
                "properties": { "city": "string" }
            },
        }))
        .unwrap();

        for storage in [StorageKind::Json, StorageKind::Hash] {
            let mut search = Search::new(&schema, storage);
            for path in ["hidden", "comments", "comments.author", "comments[*].author", "address.city"] {
                assert!(
                    matches!(
                        search.r#where(path).unwrap_err(),
                        QueryResolutionError::NotSearchable { kind: "non-indexed field", .. }
                    ),
                    "{} should not be searchable",
                    path
                );
            }
            assert!(search.sort_by("hidden", SortOrder::Ascending).is_err());
            assert!(search.is_empty());
        }
    }

    #[test]
    fn test_hash_storage_only_searches_top_level() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Hash);
        for path in ["address.city", "pair.0", "pair.1.label"] {
            assert!(matches!(
                search.r#where(path).unwrap_err(),
                QueryResolutionError::NotSearchable { kind: "nested field in hash storage", .. }
            ));
        }
        search.r#where("name").unwrap().eq("x").unwrap();
        assert_eq!(search.render().unwrap(), "(@name:{x})");
    }

    #[test]
    fn test_hash_arrays_match_as_tags() {
        let schema = CanonicalSchema::from_json(json!({
            "scores": { "type": "array", "elements": "number" },
            "seen": { "type": "array", "elements": "date" },
            "flags": { "type": "array", "elements": "boolean" },
            "ids": { "type": "array", "elements": "bigint" },
            "notes": { "type": "array", "elements": "text", "separator": "|" },
            "spots": { "type": "array", "elements": "point", "separator": "|" },
        }))
        .unwrap();

        let mut hash = Search::new(&schema, StorageKind::Hash);
        hash.r#where("scores")
            .unwrap()
            .eq(3)
            .unwrap()
            .or(2.5)
            .unwrap()
            .and("seen")
            .unwrap()
            .eq("1970-01-01T00:00:01.500Z")
            .unwrap()
            .and("flags")
            .unwrap()
            .eq(false)
            .unwrap()
            .and("ids")
            .unwrap()
            .eq(Value::BigInt(-9))
            .unwrap()
            .and("notes")
            .unwrap()
            .eq("hi there")
            .unwrap()
            .and("spots")
            .unwrap()
            .eq(Point::new(1.5, 2.0))
            .unwrap();
        assert_eq!(
            hash.render().unwrap(),
            "(@scores:{3 | 2\\.5}) (@seen:{1\\.5}) (@flags:{0}) (@ids:{\\-9}) \
             (@notes:{hi\\ there}) (@spots:{1\\.5\\,2})"
        );
        assert!(matches!(
            hash.r#where("scores").unwrap().gt(1).unwrap_err(),
            QueryResolutionError::UnsupportedOperator { operator: "gt", .. }
        ));

        let mut json = Search::new(&schema, StorageKind::Json);
        json.r#where("scores").unwrap().eq(3).unwrap();
        assert_eq!(json.render().unwrap(), "(@scores:[3 3])");
    }

    #[test]
    fn test_tuple_positions() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("pair.0").unwrap().gt(1).unwrap().and("pair.1.label").unwrap().eq("hi").unwrap();
        assert_eq!(search.render().unwrap(), "(@pair_0:[(1 +inf]) (@pair_1_label:hi)");

        let err = search.r#where("pair.2").unwrap_err();
        assert!(matches!(err, QueryResolutionError::UnknownField { .. }));
        let err = search.r#where("pair.x").unwrap_err();
        assert!(matches!(err, QueryResolutionError::NotTraversable { .. }));
    }

    #[test]
    fn test_resolution_errors() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);

        assert!(matches!(
            search.r#where("nope").unwrap_err(),
            QueryResolutionError::UnknownField { .. }
        ));
        assert!(matches!(
            search.r#where("address").unwrap_err(),
            QueryResolutionError::NotALeaf { .. }
        ));
        assert!(matches!(
            search.r#where("comments").unwrap_err(),
            QueryResolutionError::NotSearchable { .. }
        ));
        assert!(matches!(
            search.r#where("pair").unwrap_err(),
            QueryResolutionError::NotALeaf { .. }
        ));
        assert!(matches!(
            search.r#where("name.first").unwrap_err(),
            QueryResolutionError::NotTraversable { .. }
        ));
        assert!(matches!(
            search.r#where("address.zip").unwrap_err(),
            QueryResolutionError::UnknownField { .. }
        ));
        assert!(matches!(
            search.r#where("friends").unwrap_err(),
            QueryResolutionError::NotSearchable { kind: "reference", .. }
        ));
        assert!(search.is_empty());
    }

    #[test]
    fn test_unsupported_operator_names_kind() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        let err = search.r#where("name").unwrap().gt(1).unwrap_err();
        assert_eq!(
            err,
            QueryResolutionError::UnsupportedOperator {
                field: "name".into(),
                kind: "string",
                operator: "gt",
            }
        );
    }

    #[test]
    fn test_incomplete_clause() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("age").unwrap();
        assert!(matches!(
            search.compile().unwrap_err(),
            QueryResolutionError::IncompleteClause { .. }
        ));
    }

    #[test]
    fn test_clauses_line_up_with_index() {
        use crate::config::ModelConfig;
        use crate::search::IndexDefinition;

        let schema = CanonicalSchema::from_json(json!({
            "name": "string",
            "age": "number",
            "active": "boolean",
            "big": "bigint",
            "bio": "text",
            "born": "date",
            "home": "point",
            "tags": { "type": "array" },
            "scores": { "type": "array", "elements": "number" },
            "notes": { "type": "array", "elements": "text" },
            "hidden": { "type": "string", "index": false },
            "address": {
                "type": "object",
                "properties": { "city": "string", "geo": "point", "zip": { "type": "number", "index": false } }
            },
            "comments": { "type": "array", "elements": { "author": "string" } },
            "pair": { "type": "tuple", "elements": ["number", { "label": "text" }] },
            "embedding": {
                "type": "vector", "algorithm": "FLAT", "distance": "L2",
                "vectorType": "FLOAT32", "dimension": 2
            },
        }))
        .unwrap();
        let paths = [
            "name", "age", "active", "big", "bio", "born", "home", "tags", "tags[*]", "scores",
            "notes", "hidden", "address.city", "address.geo", "address.zip", "comments.author",
            "pair.0", "pair.1.label", "embedding",
        ];

        for storage in [StorageKind::Hash, StorageKind::Json] {
            let config = ModelConfig {
                storage,
                ..Default::default()
            };
            let index = IndexDefinition::from_schema("t", &schema, &config);
            let mut reached = Vec::new();

            for path in paths {
                let alias = alias_for(path);
                let declared = index.fields.iter().find(|f| f.alias == alias);
                match resolve(&schema, storage, path) {
                    Ok((_, builder)) => {
                        let field = declared.unwrap_or_else(|| panic!("{:?}: '{}' has no index field", storage, path));
                        assert_eq!(builder.family(), field.attributes[0], "{:?}: '{}'", storage, path);
                        reached.push(alias);
                    }
                    Err(QueryResolutionError::NotSearchable { .. }) => {
                        assert!(declared.is_none(), "{:?}: '{}' is indexed but refused", storage, path);
                    }
                    Err(other) => panic!("{:?}: '{}' failed with {:?}", storage, path, other),
                }
            }

            for field in &index.fields {
                assert!(reached.contains(&field.alias), "{:?}: '{}' unreachable", storage, field.alias);
            }
        }
    }

    #[test]
    fn test_tag_family() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Hash);
        search
            .r#where("active")
            .unwrap()
            .eq(true)
            .unwrap()
            .and("big")
            .unwrap()
            .eq(7)
            .unwrap()
            .or(8)
            .unwrap()
            .and("name")
            .unwrap()
            .eq("a.b")
            .unwrap();
        assert_eq!(search.render().unwrap(), "(@active:{1}) (@big:{7 | 8}) (@name:{a\\.b})");
    }

    #[test]
    fn test_date_and_geo() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search
            .r#where("born")
            .unwrap()
            .lte("1970-01-01T00:00:01Z")
            .unwrap()
            .and("address.geo")
            .unwrap()
            .within(Circle::new().origin(Point::new(-73.9, 40.7)).radius(2.0).kilometers())
            .unwrap();
        assert_eq!(
            search.render().unwrap(),
            "(@born:[-inf 1000]) (@address_geo:[-73.9 40.7 2 km])"
        );
    }

    #[test]
    fn test_knn_alone() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("embedding").unwrap().knn(4, [0.1f32, 0.2, 0.3]).unwrap();
        let compiled = search.compile().unwrap();
        assert_eq!(compiled.query, "*=>[KNN 4 @embedding $BLOB]");
        assert_eq!(compiled.dialect, Some(2));
        assert_eq!(compiled.params[KNN_PARAM].len(), 12);
    }

    #[test]
    fn test_knn_suffix_wraps_chain() {
        let schema = schema();
        let mut single = Search::new(&schema, StorageKind::Json);
        single
            .r#where("embedding")
            .unwrap()
            .knn(2, [1.0, 0.0, 0.0])
            .unwrap()
            .and("age")
            .unwrap()
            .gt(18)
            .unwrap();
        assert_eq!(single.render().unwrap(), "(@age:[(18 +inf])=>[KNN 2 @embedding $BLOB]");

        let mut double = Search::new(&schema, StorageKind::Json);
        double
            .r#where("age")
            .unwrap()
            .gt(18)
            .unwrap()
            .and("tags")
            .unwrap()
            .eq("x")
            .unwrap()
            .and("embedding")
            .unwrap()
            .knn(2, [1.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(
            double.render().unwrap(),
            "((@age:[(18 +inf]) (@tags:{x}))=>[KNN 2 @embedding $BLOB]"
        );
    }

    #[test]
    fn test_second_knn_replaces_first() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search
            .r#where("embedding")
            .unwrap()
            .knn(2, [1.0, 0.0, 0.0])
            .unwrap()
            .and("embedding")
            .unwrap()
            .knn(9, [0.0, 1.0, 0.0])
            .unwrap();
        let compiled = search.compile().unwrap();
        assert_eq!(compiled.query, "*=>[KNN 9 @embedding $BLOB]");
        assert_eq!(compiled.params[KNN_PARAM][4..8], 1.0f32.to_le_bytes());
    }

    #[test]
    fn test_negated_knn_rejected() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("embedding").unwrap().knn(2, [1.0, 0.0, 0.0]).unwrap().not();
        assert!(matches!(
            search.compile().unwrap_err(),
            QueryResolutionError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_vector_range_binds_param() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.dialect(3);
        search.r#where("embedding").unwrap().range(0.25, [1.0, 0.0, 0.0]).unwrap();
        let compiled = search.compile().unwrap();
        assert_eq!(compiled.query, "(@embedding:[VECTOR_RANGE 0.25 $embedding_range])");
        assert!(compiled.params.contains_key("embedding_range"));
        assert_eq!(compiled.dialect, Some(3));
    }

    #[test]
    fn test_ft_search_args() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        search.r#where("embedding").unwrap().knn(1, [1.0, 0.0, 0.0]).unwrap();
        search.sort_by("age", SortOrder::Descending).unwrap().limit(10, 5);
        let args = search.compile().unwrap().to_ft_search_args("idx:users");

        let text: Vec<String> = args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect();
        assert_eq!(text[0], "idx:users");
        assert_eq!(text[1], "*=>[KNN 1 @embedding $BLOB]");
        assert_eq!(&text[2..5], ["SORTBY", "age", "DESC"]);
        assert_eq!(&text[5..8], ["LIMIT", "10", "5"]);
        assert_eq!(&text[8..11], ["PARAMS", "2", "BLOB"]);
        assert_eq!(args[11].len(), 12);
        assert_eq!(&text[12..], ["DIALECT", "2"]);
    }

    #[test]
    fn test_sort_by_rejects_vectors() {
        let schema = schema();
        let mut search = Search::new(&schema, StorageKind::Json);
        assert!(search.sort_by("embedding", SortOrder::Ascending).is_err());
        assert!(search.sort_by("address", SortOrder::Ascending).is_err());
    }

    #[test]
    fn test_alias_for() {
        assert_eq!(alias_for("a.b.c"), "a_b_c");
        assert_eq!(alias_for("list[*].x"), "list_x");
        assert_eq!(alias_for("name"), "name");
    }
}
