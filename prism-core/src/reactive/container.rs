//! Reactive Container Layer
//!
//! A [`Reactive`] handle wraps an observed object behind an explicit
//! capability interface: every read operation (`get`, `has`, `keys`,
//! `len`, `child`, array searches) calls track, and every mutation (`set`,
//! `remove`, the array mutators) classifies the change and calls trigger.
//!
//! # Wrap modes
//!
//! Four public variants — deep reactive, shallow reactive, deep readonly,
//! shallow readonly — plus [`WrapMode::Raw`], the untracked passthrough a
//! shallow parent hands out for object-valued children: reads through a
//! raw handle are not tracked and writes mutate without triggering.
//!
//! Deep handles wrap object-valued reads lazily, on each access, via
//! [`Reactive::child`]: readonly children stay readonly, mutable children
//! become reactive. Wrapping is canonical — handles are plain data over
//! (target identity, mode), dependencies key on the target's token, and
//! handle equality is identity equality — so wrapping the same object
//! twice can never fragment tracking.
//!
//! # Array mutators
//!
//! `push`/`pop`/`shift`/`unshift`/`splice` both read and write array state
//! internally. Their bookkeeping reads run under a pause-tracking guard so
//! they never become dependencies of the calling effect (the classic
//! push-reads-length feedback loop), and each mutator dispatches one
//! deduplicated trigger covering every changed index plus the length.

use tracing::warn;

use crate::error::ReactiveError;

use super::runtime::{Runtime, TriggerOp};
use super::store::{Key, Token};
use super::value::{Obj, Repr, Value};

/// How a [`Reactive`] handle mediates access to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Deep reactive: reads track, writes trigger, object children wrap
    /// reactive.
    Reactive,
    /// Shallow reactive: top-level reads track and writes trigger; object
    /// children come back raw.
    ShallowReactive,
    /// Deep readonly: writes are rejected with a warning; children wrap
    /// readonly.
    Readonly,
    /// Shallow readonly: top-level writes rejected; children come back raw.
    ShallowReadonly,
    /// Untracked passthrough: no tracking, no triggering, no rejection.
    Raw,
}

impl WrapMode {
    fn tracks_reads(self) -> bool {
        matches!(self, WrapMode::Reactive | WrapMode::ShallowReactive)
    }

    fn is_readonly(self) -> bool {
        matches!(self, WrapMode::Readonly | WrapMode::ShallowReadonly)
    }

    fn child_mode(self) -> WrapMode {
        match self {
            WrapMode::Reactive => WrapMode::Reactive,
            WrapMode::Readonly => WrapMode::Readonly,
            WrapMode::ShallowReactive | WrapMode::ShallowReadonly | WrapMode::Raw => WrapMode::Raw,
        }
    }
}

impl Runtime {
    /// Wrap an object for deep reactive access.
    pub fn reactive(&self, target: Obj) -> Reactive {
        Reactive::wrap(self, target, WrapMode::Reactive)
    }

    /// Wrap an object so only top-level access is reactive.
    pub fn shallow_reactive(&self, target: Obj) -> Reactive {
        Reactive::wrap(self, target, WrapMode::ShallowReactive)
    }

    /// Wrap an object as a deep readonly view.
    pub fn readonly(&self, target: Obj) -> Reactive {
        Reactive::wrap(self, target, WrapMode::Readonly)
    }

    /// Wrap an object as a top-level-only readonly view.
    pub fn shallow_readonly(&self, target: Obj) -> Reactive {
        Reactive::wrap(self, target, WrapMode::ShallowReadonly)
    }

    /// Wrap an object for untracked raw access.
    pub fn raw(&self, target: Obj) -> Reactive {
        Reactive::wrap(self, target, WrapMode::Raw)
    }
}

/// Capability handle over an observed object.
#[derive(Clone)]
pub struct Reactive {
    rt: Runtime,
    target: Obj,
    mode: WrapMode,
}

/// Outcome of a write, decided while the cell lock is held and dispatched
/// after it is released.
enum Change {
    None,
    Key(Key, TriggerOp),
    Length(usize),
}

impl Reactive {
    pub(crate) fn wrap(rt: &Runtime, target: Obj, mode: WrapMode) -> Self {
        Self {
            rt: rt.clone(),
            target,
            mode,
        }
    }

    /// The unwrapped raw target.
    pub fn raw(&self) -> Obj {
        self.target.clone()
    }

    pub fn mode(&self) -> WrapMode {
        self.mode
    }

    pub fn token(&self) -> Token {
        self.target.token()
    }

    pub fn is_readonly(&self) -> bool {
        self.mode.is_readonly()
    }

    pub fn is_array(&self) -> bool {
        self.target.is_array()
    }

    /// Whether the target is a ref box.
    pub fn is_ref(&self) -> bool {
        self.target.is_ref()
    }

    fn track(&self, key: Key) {
        if self.mode.tracks_reads() {
            self.rt.track(self.target.token(), key);
        }
    }

    fn triggers(&self) -> bool {
        self.mode != WrapMode::Raw
    }

    /// Read a key. Absent keys read as `Null`; arrays answer `Length` with
    /// their current length.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.track(key.clone());
        self.target.raw_get(&key)
    }

    /// Read a key and, when the value is an object, wrap it for continued
    /// access: deep handles propagate their mode, shallow handles hand out
    /// a raw child.
    pub fn child(&self, key: impl Into<Key>) -> Option<Reactive> {
        match self.get(key) {
            Value::Obj(obj) => Some(Reactive {
                rt: self.rt.clone(),
                target: obj,
                mode: self.mode.child_mode(),
            }),
            _ => None,
        }
    }

    /// Membership test; tracked like a read of the key.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.track(key.clone());
        match (&*self.target.cells().read(), &key) {
            (Repr::Map(fields), Key::Prop(name)) => fields.contains_key(name),
            (Repr::Array(items), Key::Index(i)) => *i < items.len(),
            (Repr::Array(_), Key::Length) => true,
            _ => false,
        }
    }

    /// Enumerate own keys. Tracks the enumeration sentinel: `Iterate` for
    /// maps, `Length` for arrays (array membership is governed by length).
    pub fn keys(&self) -> Vec<Key> {
        let is_array = self.target.is_array();
        self.track(if is_array { Key::Length } else { Key::Iterate });
        match &*self.target.cells().read() {
            Repr::Map(fields) => fields.keys().cloned().map(Key::Prop).collect(),
            Repr::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Element count (arrays) or field count (maps); tracked like an
    /// enumeration.
    pub fn len(&self) -> usize {
        let is_array = self.target.is_array();
        self.track(if is_array { Key::Length } else { Key::Iterate });
        match &*self.target.cells().read() {
            Repr::Map(fields) => fields.len(),
            Repr::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a key.
    ///
    /// Classifies the write as set-existing vs add-new, performs it, and
    /// triggers only when the new value differs from the old under
    /// [`Value::same`] (so NaN-over-NaN and identical rewrites are no-ops).
    /// On readonly handles the write is logged and dropped, and the call
    /// still reports success.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let key = key.into();
        let value = value.into();
        if self.mode.is_readonly() {
            warn!(key = ?key, "write to readonly target dropped");
            return Ok(());
        }

        let change = {
            let mut cells = self.target.cells().write();
            match (&mut *cells, key) {
                (Repr::Map(fields), Key::Prop(name)) => {
                    let op = if fields.contains_key(&name) {
                        TriggerOp::Set
                    } else {
                        TriggerOp::Add
                    };
                    let old = fields.insert(name.clone(), value.clone());
                    match old {
                        Some(old) if old.same(&value) => Change::None,
                        _ => Change::Key(Key::Prop(name), op),
                    }
                }
                (Repr::Array(items), Key::Index(i)) => {
                    if i < items.len() {
                        let old = std::mem::replace(&mut items[i], value.clone());
                        if old.same(&value) {
                            Change::None
                        } else {
                            Change::Key(Key::Index(i), TriggerOp::Set)
                        }
                    } else {
                        // Writing past the end extends the array, Null
                        // filling any gap.
                        items.resize(i, Value::Null);
                        items.push(value);
                        Change::Key(Key::Index(i), TriggerOp::Add)
                    }
                }
                (Repr::Array(items), Key::Length) => {
                    let n = match value {
                        Value::Int(n) if n >= 0 => n as usize,
                        other => return Err(ReactiveError::InvalidLength(other)),
                    };
                    if n == items.len() {
                        Change::None
                    } else {
                        items.resize(n, Value::Null);
                        Change::Length(n)
                    }
                }
                (Repr::Map(_), key @ (Key::Index(_) | Key::Length)) => {
                    return Err(ReactiveError::KeyMismatch(key))
                }
                (Repr::Array(_), key @ Key::Prop(_)) => {
                    return Err(ReactiveError::KeyMismatch(key))
                }
                (_, Key::Iterate) => return Err(ReactiveError::KeyMismatch(Key::Iterate)),
            }
        };

        if self.triggers() {
            let token = self.target.token();
            match change {
                Change::None => {}
                Change::Key(key, op) => {
                    self.rt
                        .trigger_keys(token, vec![(key, op)], None, self.target.is_array());
                }
                Change::Length(n) => {
                    self.rt
                        .trigger_keys(token, vec![(Key::Length, TriggerOp::Set)], Some(n), true);
                }
            }
        }
        Ok(())
    }

    /// Delete an own map field. Deleting an absent key is a no-op; on
    /// readonly handles the delete is logged and dropped.
    pub fn remove(&self, key: impl Into<Key>) -> Result<bool, ReactiveError> {
        let key = key.into();
        if self.mode.is_readonly() {
            warn!(key = ?key, "delete on readonly target dropped");
            return Ok(false);
        }
        let name = match key {
            Key::Prop(name) => name,
            other => return Err(ReactiveError::KeyMismatch(other)),
        };
        let removed = {
            let mut cells = self.target.cells().write();
            match &mut *cells {
                Repr::Map(fields) => fields.shift_remove(&name).is_some(),
                Repr::Array(_) => return Err(ReactiveError::ExpectedMap),
            }
        };
        if removed && self.triggers() {
            self.rt.trigger_keys(
                self.target.token(),
                vec![(Key::Prop(name), TriggerOp::Delete)],
                None,
                false,
            );
        }
        Ok(removed)
    }

    fn raw_len(&self) -> Result<usize, ReactiveError> {
        match &*self.target.cells().read() {
            Repr::Array(items) => Ok(items.len()),
            Repr::Map(_) => Err(ReactiveError::ExpectedArray),
        }
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        if self.mode.is_readonly() {
            let len = self.raw_len()?;
            warn!("push on readonly target dropped");
            return Ok(len);
        }
        let (index, len) = {
            let _pause = self.rt.pause_tracking();
            let mut cells = self.target.cells().write();
            let Repr::Array(items) = &mut *cells else {
                return Err(ReactiveError::ExpectedArray);
            };
            items.push(value.into());
            (items.len() - 1, items.len())
        };
        if self.triggers() {
            self.rt.trigger_keys(
                self.target.token(),
                vec![(Key::Index(index), TriggerOp::Add)],
                Some(len),
                true,
            );
        }
        Ok(len)
    }

    /// Remove and return the last element (`Null` when empty).
    pub fn pop(&self) -> Result<Value, ReactiveError> {
        if self.mode.is_readonly() {
            self.raw_len()?;
            warn!("pop on readonly target dropped");
            return Ok(Value::Null);
        }
        let (removed, new_len) = {
            let _pause = self.rt.pause_tracking();
            let mut cells = self.target.cells().write();
            let Repr::Array(items) = &mut *cells else {
                return Err(ReactiveError::ExpectedArray);
            };
            match items.pop() {
                Some(value) => (value, items.len()),
                None => return Ok(Value::Null),
            }
        };
        if self.triggers() {
            // The popped index sits at or beyond the new length, so the
            // length trigger picks it up.
            self.rt.trigger_keys(
                self.target.token(),
                vec![(Key::Length, TriggerOp::Set)],
                Some(new_len),
                true,
            );
        }
        Ok(removed)
    }

    /// Remove and return the first element (`Null` when empty).
    pub fn shift(&self) -> Result<Value, ReactiveError> {
        if self.mode.is_readonly() {
            self.raw_len()?;
            warn!("shift on readonly target dropped");
            return Ok(Value::Null);
        }
        let (removed, changed, new_len) = {
            let _pause = self.rt.pause_tracking();
            let mut cells = self.target.cells().write();
            let Repr::Array(items) = &mut *cells else {
                return Err(ReactiveError::ExpectedArray);
            };
            if items.is_empty() {
                return Ok(Value::Null);
            }
            let old = items.clone();
            let value = items.remove(0);
            // Surviving elements moved down one slot; only slots whose
            // value actually changed trigger.
            let changed: Vec<usize> = (0..items.len())
                .filter(|&i| !old[i].same(&items[i]))
                .collect();
            (value, changed, items.len())
        };
        if self.triggers() {
            let mut keys: Vec<(Key, TriggerOp)> = changed
                .into_iter()
                .map(|i| (Key::Index(i), TriggerOp::Set))
                .collect();
            keys.push((Key::Length, TriggerOp::Set));
            self.rt
                .trigger_keys(self.target.token(), keys, Some(new_len), true);
        }
        Ok(removed)
    }

    /// Insert an element at the front. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        if self.mode.is_readonly() {
            let len = self.raw_len()?;
            warn!("unshift on readonly target dropped");
            return Ok(len);
        }
        let (changed, new_len) = {
            let _pause = self.rt.pause_tracking();
            let mut cells = self.target.cells().write();
            let Repr::Array(items) = &mut *cells else {
                return Err(ReactiveError::ExpectedArray);
            };
            let old = items.clone();
            items.insert(0, value.into());
            // Pre-existing elements moved up one slot; only slots whose
            // value actually changed trigger. The last slot is always new.
            let changed: Vec<usize> = (0..old.len())
                .filter(|&i| !old[i].same(&items[i]))
                .collect();
            (changed, items.len())
        };
        if self.triggers() {
            let mut keys: Vec<(Key, TriggerOp)> = changed
                .into_iter()
                .map(|i| (Key::Index(i), TriggerOp::Set))
                .collect();
            keys.push((Key::Index(new_len - 1), TriggerOp::Add));
            self.rt
                .trigger_keys(self.target.token(), keys, Some(new_len), true);
        }
        Ok(new_len)
    }

    /// Replace `delete_count` elements starting at `start` with
    /// `replacement`, returning the removed elements. Out-of-range bounds
    /// clamp.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        replacement: Vec<Value>,
    ) -> Result<Vec<Value>, ReactiveError> {
        if self.mode.is_readonly() {
            self.raw_len()?;
            warn!("splice on readonly target dropped");
            return Ok(Vec::new());
        }
        let (removed, mut keys, old_len, new_len) = {
            let _pause = self.rt.pause_tracking();
            let mut cells = self.target.cells().write();
            let Repr::Array(items) = &mut *cells else {
                return Err(ReactiveError::ExpectedArray);
            };
            let old = items.clone();
            let at = start.min(old.len());
            let delete = delete_count.min(old.len() - at);
            let removed: Vec<Value> = items.splice(at..at + delete, replacement).collect();
            // Slots in the rewritten region trigger only when the value
            // actually changed; slots past the old end are new.
            let keys: Vec<(Key, TriggerOp)> = (at..items.len())
                .filter_map(|i| {
                    if i >= old.len() {
                        Some((Key::Index(i), TriggerOp::Add))
                    } else if old[i].same(&items[i]) {
                        None
                    } else {
                        Some((Key::Index(i), TriggerOp::Set))
                    }
                })
                .collect();
            (removed, keys, old.len(), items.len())
        };
        if self.triggers() {
            if new_len != old_len {
                keys.push((Key::Length, TriggerOp::Set));
            }
            if !keys.is_empty() {
                self.rt
                    .trigger_keys(self.target.token(), keys, Some(new_len), true);
            }
        }
        Ok(removed)
    }

    /// Position of the first element `same`-equal to `needle`. Object
    /// elements match by identity. Tracked as a read of the length and of
    /// every index, since the answer depends on all of them.
    pub fn index_of(&self, needle: &Value) -> Result<Option<usize>, ReactiveError> {
        let snapshot = self.search_snapshot()?;
        Ok(snapshot.iter().position(|v| v.same(needle)))
    }

    /// Position of the last element `same`-equal to `needle`.
    pub fn last_index_of(&self, needle: &Value) -> Result<Option<usize>, ReactiveError> {
        let snapshot = self.search_snapshot()?;
        Ok(snapshot.iter().rposition(|v| v.same(needle)))
    }

    /// Whether any element is `same`-equal to `needle`.
    pub fn contains(&self, needle: &Value) -> Result<bool, ReactiveError> {
        Ok(self.index_of(needle)?.is_some())
    }

    fn search_snapshot(&self) -> Result<Vec<Value>, ReactiveError> {
        let snapshot = {
            match &*self.target.cells().read() {
                Repr::Array(items) => items.clone(),
                Repr::Map(_) => return Err(ReactiveError::ExpectedArray),
            }
        };
        if self.mode.tracks_reads() {
            let token = self.target.token();
            self.rt.track(token, Key::Length);
            for i in 0..snapshot.len() {
                self.rt.track(token, Key::Index(i));
            }
        }
        Ok(snapshot)
    }

    /// Untracked JSON snapshot of the target.
    pub fn snapshot(&self) -> serde_json::Value {
        self.target.to_json()
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Obj::ptr_eq(&self.target, &other.target) && self.mode == other.mode
    }
}

impl Eq for Reactive {}

impl std::hash::Hash for Reactive {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.target.token().hash(state);
        self.mode.hash(state);
    }
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.target)
            .field("mode", &self.mode)
            .finish()
    }
}
