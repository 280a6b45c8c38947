//! Flat resource state
//!
//! `ResourceState` is the declarative, snake_case view of a single cloud
//! resource: an identifier plus an attribute map. CRUD handlers expand it
//! into wire JSON for requests and flatten API responses back into it.
//!
//! Absence is meaningful: an attribute that was never set (or was flattened
//! from a missing wire field) has no entry at all, while an explicit zero or
//! `false` is stored as-is. Setting an attribute to `Null` removes it.

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    id: Option<String>,
    attrs: BTreeMap<String, Value>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with an import identifier
    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            attrs: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Drop the resource from state (drift removal after a 404)
    pub fn clear(&mut self) {
        self.id = None;
        self.attrs.clear();
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    /// Integer attribute; wire int64s sometimes arrive as decimal strings
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_list(&self, key: &str) -> Option<&Vec<Value>> {
        self.attrs.get(key).and_then(|v| v.as_array())
    }

    pub fn get_map(&self, key: &str) -> Option<&serde_json::Map<String, Value>> {
        self.attrs.get(key).and_then(|v| v.as_object())
    }

    /// Set an attribute. `Null` removes the entry, keeping "absent" and
    /// "explicitly zero" distinguishable.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            self.attrs.remove(key);
        } else {
            self.attrs.insert(key.to_string(), value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    /// Whether the attribute is present with a non-empty value
    pub fn is_set(&self, key: &str) -> bool {
        match self.attrs.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(|k| k.as_str())
    }

    /// Attributes that differ from `prior`, in either direction.
    /// Update handlers map these to wire field paths for the `updateMask`.
    pub fn changed_keys(&self, prior: &ResourceState) -> Vec<String> {
        let mut changed = Vec::new();
        for key in self.attrs.keys() {
            if prior.attrs.get(key) != self.attrs.get(key) {
                changed.push(key.clone());
            }
        }
        for key in prior.attrs.keys() {
            if !self.attrs.contains_key(key) {
                changed.push(key.clone());
            }
        }
        changed
    }

    pub fn has_change(&self, prior: &ResourceState, key: &str) -> bool {
        self.attrs.get(key) != prior.attrs.get(key)
    }
}
