//! Observed values and objects.
//!
//! [`Value`] is the dynamic value model the engine observes: scalars plus
//! shared object handles. [`Obj`] is the observed object itself — a map
//! with insertion-ordered fields, or an array — shared behind an `Arc` so
//! that identity is pointer identity and clones observe the same state.
//!
//! Every object carries the [`Token`] the dependency store keys on, plus a
//! marker flag distinguishing ref boxes from ordinary objects.
//!
//! # Equality
//!
//! [`Value::same`] is the write-dedupe rule: a write that produces a
//! `same`-equal value must not trigger anything. It differs from ordinary
//! float equality in one place — NaN is equal to NaN, so repeatedly writing
//! NaN does not re-run effects. Objects compare by identity, never by
//! content.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use super::store::{Key, Token};

/// A dynamic value held by an observed object.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Obj(Obj),
}

impl Value {
    /// The trigger-dedupe equality: NaN equals NaN, integers and floats
    /// compare numerically, objects compare by identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => Obj::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose truthiness, for data-driven branch conditions: `Null` and
    /// `false` are false, zero and NaN are false, everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Obj(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    /// Build a value tree from JSON. Numbers become `Int` when they fit in
    /// an `i64`, `Float` otherwise; objects and arrays become fresh [`Obj`]
    /// instances.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                let obj = Obj::array();
                for item in items {
                    obj.push_raw(Value::from_json(item));
                }
                Value::Obj(obj)
            }
            serde_json::Value::Object(fields) => {
                let obj = Obj::map();
                for (k, v) in fields {
                    obj.insert_raw(k.clone(), Value::from_json(v));
                }
                Value::Obj(obj)
            }
        }
    }

    /// Snapshot this value as JSON. Cycles in the object graph serialize as
    /// `null` at the point of re-entry.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        to_json_inner(self, &mut seen)
    }
}

fn to_json_inner(value: &Value, seen: &mut HashSet<Token>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Obj(obj) => {
            if !seen.insert(obj.token()) {
                return serde_json::Value::Null;
            }
            let out = match &*obj.data.cells.read() {
                Repr::Map(fields) => serde_json::Value::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), to_json_inner(v, seen)))
                        .collect(),
                ),
                Repr::Array(items) => serde_json::Value::Array(
                    items.iter().map(|v| to_json_inner(v, seen)).collect(),
                ),
            };
            seen.remove(&obj.token());
            out
        }
    }
}

/// `PartialEq` delegates to [`Value::same`], so assertions in tests follow
/// the engine's own notion of change.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Obj(o) => write!(f, "Obj({:?})", o.token()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Obj> for Value {
    fn from(o: Obj) -> Self {
        Value::Obj(o)
    }
}

/// Interior representation of an observed object.
pub(crate) enum Repr {
    Map(IndexMap<String, Value>),
    Array(Vec<Value>),
}

pub(crate) struct ObjectData {
    token: Token,
    is_ref: bool,
    pub(crate) cells: RwLock<Repr>,
}

/// Shared handle to an observed object. Clones share state; identity is
/// pointer identity.
#[derive(Clone)]
pub struct Obj {
    data: Arc<ObjectData>,
}

impl Obj {
    fn with_repr(repr: Repr, is_ref: bool) -> Self {
        Self {
            data: Arc::new(ObjectData {
                token: Token::new(),
                is_ref,
                cells: RwLock::new(repr),
            }),
        }
    }

    /// Create an empty map object.
    pub fn map() -> Self {
        Self::with_repr(Repr::Map(IndexMap::new()), false)
    }

    /// Create an empty array object.
    pub fn array() -> Self {
        Self::with_repr(Repr::Array(Vec::new()), false)
    }

    /// Create an array object from a vector of values.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self::with_repr(Repr::Array(items), false)
    }

    /// Create the `{ value }` box backing a ref, flagged with the ref
    /// marker.
    pub(crate) fn ref_box(value: Value) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("value".to_owned(), value);
        Self::with_repr(Repr::Map(fields), true)
    }

    /// Parse JSON into an object. Returns `None` when the JSON root is a
    /// scalar.
    pub fn from_json(json: &serde_json::Value) -> Option<Obj> {
        match Value::from_json(json) {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    /// Snapshot the object tree as JSON (cycle-guarded).
    pub fn to_json(&self) -> serde_json::Value {
        Value::Obj(self.clone()).to_json()
    }

    /// Builder-style raw insert, for constructing test fixtures and initial
    /// state before the object is placed under reactive control.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.insert_raw(key.to_owned(), value.into());
        self
    }

    /// Insert a field without tracking or triggering.
    pub fn insert_raw(&self, key: String, value: Value) {
        if let Repr::Map(fields) = &mut *self.data.cells.write() {
            fields.insert(key, value);
        }
    }

    /// Append an element without tracking or triggering.
    pub fn push_raw(&self, value: Value) {
        if let Repr::Array(items) = &mut *self.data.cells.write() {
            items.push(value);
        }
    }

    /// Read a key without tracking. Absent keys read as `Null`.
    pub(crate) fn raw_get(&self, key: &Key) -> Value {
        match (&*self.data.cells.read(), key) {
            (Repr::Map(fields), Key::Prop(name)) => {
                fields.get(name).cloned().unwrap_or(Value::Null)
            }
            (Repr::Array(items), Key::Index(i)) => {
                items.get(*i).cloned().unwrap_or(Value::Null)
            }
            (Repr::Array(items), Key::Length) => Value::Int(items.len() as i64),
            _ => Value::Null,
        }
    }

    pub(crate) fn cells(&self) -> &RwLock<Repr> {
        &self.data.cells
    }

    /// The dependency-store token of this object.
    pub fn token(&self) -> Token {
        self.data.token
    }

    /// Whether this object is a ref box.
    pub fn is_ref(&self) -> bool {
        self.data.is_ref
    }

    pub fn is_array(&self) -> bool {
        matches!(&*self.data.cells.read(), Repr::Array(_))
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Obj, b: &Obj) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        Obj::ptr_eq(self, other)
    }
}

impl Eq for Obj {}

impl std::hash::Hash for Obj {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.data.token.hash(state);
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Obj");
        d.field("token", &self.data.token);
        match &*self.data.cells.read() {
            Repr::Map(fields) => d.field("kind", &"map").field("fields", &fields.len()),
            Repr::Array(items) => d.field("kind", &"array").field("len", &items.len()),
        };
        if self.data.is_ref {
            d.field("is_ref", &true);
        }
        d.finish()
    }
}

impl Serialize for Obj {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
