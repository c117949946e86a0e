use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

/// A driver-neutral scalar value.
///
/// Selectors, patches and update payloads are expressed in terms of [Value]
/// so the router never needs to know which store backend ultimately executes
/// the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Orders two values of the same family, mixing ints and floats.
    ///
    /// Returns `None` for incomparable families, mirroring SQL's refusal
    /// to order across types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

macro_rules! value_from_int {
    ($($tp:ty),*) => {
        $(
            impl From<$tp> for Value {
                fn from(v: $tp) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, u8, u16, u32);

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// The statically-typed binding between a row type and the router.
///
/// Implementing [Entity] is all a type needs to be served by an
/// [EntityGateway](crate::EntityGateway). The `field`/`apply` accessors give
/// store implementations column-level access without any runtime reflection.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The primary key type.
    type Id: Clone + Eq + Hash + Into<Value> + fmt::Debug + Send + Sync + 'static;

    /// The logical table name, unique per entity type.
    fn table() -> &'static str;

    fn id(&self) -> Self::Id;

    /// Reads one column by name, `None` if the column does not exist.
    fn field(&self, column: &str) -> Option<Value>;

    /// Applies a set of column assignments to this instance.
    fn apply(&mut self, patch: &Patch);
}

/// A conjunction of column-equality clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    clauses: Vec<(String, Value)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` clause.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((column.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates the selector against an entity instance.
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        self.clauses
            .iter()
            .all(|(column, expected)| entity.field(column).as_ref() == Some(expected))
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Shaping options for list reads, the analog of a find-many options object.
///
/// Ordering, limit and offset apply per store; the merged fan-out result
/// remains concatenated in store-iteration order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub selector: Option<Selector>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl From<Selector> for Query {
    fn from(selector: Selector) -> Self {
        Query::new().filter(selector)
    }
}

/// The row-targeting union accepted by update and delete operations:
/// either an explicit id set or a selector.
pub enum Criteria<E: Entity> {
    Ids(Vec<E::Id>),
    Matching(Selector),
}

impl<E: Entity> Clone for Criteria<E> {
    fn clone(&self) -> Self {
        match self {
            Criteria::Ids(ids) => Criteria::Ids(ids.clone()),
            Criteria::Matching(selector) => Criteria::Matching(selector.clone()),
        }
    }
}

impl<E: Entity> fmt::Debug for Criteria<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Criteria::Matching(selector) => f.debug_tuple("Matching").field(selector).finish(),
        }
    }
}

impl<E: Entity> Criteria<E> {
    pub fn id(id: E::Id) -> Self {
        Criteria::Ids(vec![id])
    }

    /// Evaluates the criteria against an entity instance.
    pub fn selects(&self, entity: &E) -> bool {
        match self {
            Criteria::Ids(ids) => ids.contains(&entity.id()),
            Criteria::Matching(selector) => selector.matches(entity),
        }
    }
}

/// An ordered list of column assignments applied by update operations.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    assignments: Vec<(String, Value)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// The outcome of an update, reducible across shards.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// Rows changed, `None` when the driver could not report a count.
    pub affected: Option<u64>,
    /// Driver-specific payloads, concatenated across shards.
    pub raw: Vec<Value>,
    /// Store-generated column values, concatenated across shards.
    pub generated: Vec<Vec<(String, Value)>>,
}

impl UpdateOutcome {
    /// Folds another shard-local outcome into this one.
    ///
    /// An absent `affected` count is treated as zero.
    pub fn absorb(&mut self, other: UpdateOutcome) {
        self.affected = Some(self.affected.unwrap_or(0) + other.affected.unwrap_or(0));
        self.raw.extend(other.raw);
        self.generated.extend(other.generated);
    }
}

/// The outcome of a delete, reducible across shards.
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    /// Rows removed, `None` when the driver could not report a count.
    pub affected: Option<u64>,
    /// Driver-specific payloads, concatenated across shards.
    pub raw: Vec<Value>,
}

impl DeleteOutcome {
    /// Folds another shard-local outcome into this one.
    pub fn absorb(&mut self, other: DeleteOutcome) {
        self.affected = Some(self.affected.unwrap_or(0) + other.affected.unwrap_or(0));
        self.raw.extend(other.raw);
    }
}
