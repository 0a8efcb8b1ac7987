//! Ref Adapters
//!
//! A [`Ref`] gives a single value the same reactive read/write surface an
//! object property has. Two shapes exist behind one type: a boxed ref
//! (`Runtime::create_ref`) wraps a standalone value in a one-field
//! container, and a projection (`to_ref`) forwards to an existing key of a
//! reactive object, so destructured fields stay live instead of becoming
//! stale copies.

use indexmap::IndexMap;

use crate::error::ReactiveError;

use super::container::Reactive;
use super::runtime::Runtime;
use super::store::Key;
use super::value::{Obj, Repr, Value};

enum RefInner {
    Boxed(Reactive),
    Projection { source: Reactive, key: Key },
}

/// A reactive single-value cell. Clones share the underlying target.
pub struct Ref {
    inner: RefInner,
}

impl Runtime {
    /// Box a standalone value into a ref.
    pub fn create_ref(&self, value: impl Into<Value>) -> Ref {
        Ref {
            inner: RefInner::Boxed(self.reactive(Obj::ref_box(value.into()))),
        }
    }
}

/// Project one key of a reactive object into a ref. Reads and writes go
/// through `source`, so they track and trigger there.
pub fn to_ref(source: &Reactive, key: impl Into<Key>) -> Ref {
    Ref {
        inner: RefInner::Projection {
            source: source.clone(),
            key: key.into(),
        },
    }
}

/// Project every current own key of a reactive map into refs, preserving
/// key order. The enumeration itself is untracked; keys added later need a
/// fresh call.
pub fn to_refs(source: &Reactive) -> IndexMap<String, Ref> {
    let names: Vec<String> = match &*source.raw().cells().read() {
        Repr::Map(fields) => fields.keys().cloned().collect(),
        Repr::Array(_) => Vec::new(),
    };
    names
        .into_iter()
        .map(|name| {
            let r = to_ref(source, name.as_str());
            (name, r)
        })
        .collect()
}

impl Ref {
    /// Tracked read of the current value.
    pub fn get(&self) -> Value {
        match &self.inner {
            RefInner::Boxed(cell) => cell.get("value"),
            RefInner::Projection { source, key } => source.get(key.clone()),
        }
    }

    /// Write the value, triggering dependents on change.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), ReactiveError> {
        match &self.inner {
            RefInner::Boxed(cell) => cell.set("value", value),
            RefInner::Projection { source, key } => source.set(key.clone(), value),
        }
    }

    /// Whether this ref is a standalone box rather than a projection.
    pub fn is_boxed(&self) -> bool {
        matches!(self.inner, RefInner::Boxed(_))
    }
}

impl Clone for Ref {
    fn clone(&self) -> Self {
        Self {
            inner: match &self.inner {
                RefInner::Boxed(cell) => RefInner::Boxed(cell.clone()),
                RefInner::Projection { source, key } => RefInner::Projection {
                    source: source.clone(),
                    key: key.clone(),
                },
            },
        }
    }
}

impl std::fmt::Debug for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            RefInner::Boxed(cell) => f.debug_tuple("Ref").field(&cell.raw()).finish(),
            RefInner::Projection { source, key } => f
                .debug_struct("Ref")
                .field("source", &source.raw())
                .field("key", key)
                .finish(),
        }
    }
}
