//! Object Arena
//!
//! Append-only storage for every runtime value. Handles index into one
//! `Vec`; the well-known handles (null, true, false, disabler) are seeded at
//! construction so they can be compared without a lookup. There is no
//! per-object free; everything lives until workspace teardown.

use indexmap::IndexMap;

use crate::object::strings::{StrId, StringPool};
use crate::object::types::{FeatureState, Obj, ObjType, Value};

#[derive(Debug)]
pub struct ObjStore {
    objects: Vec<Value>,
    pub strings: StringPool,
}

impl Default for ObjStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjStore {
    pub fn new() -> Self {
        Self {
            // Seed order must match the well-known handle constants.
            objects: vec![Value::Null, Value::Bool(true), Value::Bool(false), Value::Disabler],
            strings: StringPool::new(),
        }
    }

    pub fn push(&mut self, value: Value) -> Obj {
        let id = Obj(self.objects.len() as u32);
        self.objects.push(value);
        id
    }

    pub fn get(&self, obj: Obj) -> &Value {
        &self.objects[obj.0 as usize]
    }

    pub fn get_mut(&mut self, obj: Obj) -> &mut Value {
        &mut self.objects[obj.0 as usize]
    }

    pub fn obj_type(&self, obj: Obj) -> ObjType {
        self.get(obj).obj_type()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    // ---- constructors ----

    pub fn new_str(&mut self, s: &str) -> Obj {
        let id = self.strings.intern(s);
        self.push(Value::Str(id))
    }

    pub fn new_file(&mut self, path: &str) -> Obj {
        let id = self.strings.intern(path);
        self.push(Value::File(id))
    }

    pub fn new_number(&mut self, n: i64) -> Obj {
        self.push(Value::Number(n))
    }

    pub fn new_bool(&mut self, b: bool) -> Obj {
        if b {
            Obj::TRUE
        } else {
            Obj::FALSE
        }
    }

    pub fn new_array(&mut self, items: Vec<Obj>) -> Obj {
        self.push(Value::Array(items))
    }

    pub fn new_dict(&mut self, map: IndexMap<String, Obj>) -> Obj {
        self.push(Value::Dict(map))
    }

    pub fn new_feature(&mut self, state: FeatureState) -> Obj {
        self.push(Value::FeatureOpt(state))
    }

    // ---- typed accessors ----

    pub fn str_value(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    /// Contents of a string value. Callers must have typechecked first.
    pub fn get_str(&self, obj: Obj) -> &str {
        match self.get(obj) {
            Value::Str(id) => self.strings.get(*id),
            other => panic!("get_str on {:?}", other.obj_type()),
        }
    }

    pub fn as_str(&self, obj: Obj) -> Option<&str> {
        match self.get(obj) {
            Value::Str(id) => Some(self.strings.get(*id)),
            _ => None,
        }
    }

    /// Path of a file value, or the contents of a string.
    pub fn path_like(&self, obj: Obj) -> Option<&str> {
        match self.get(obj) {
            Value::Str(id) | Value::File(id) => Some(self.strings.get(*id)),
            _ => None,
        }
    }

    pub fn file_path(&self, obj: Obj) -> &str {
        match self.get(obj) {
            Value::File(id) => self.strings.get(*id),
            other => panic!("file_path on {:?}", other.obj_type()),
        }
    }

    pub fn as_number(&self, obj: Obj) -> Option<i64> {
        match self.get(obj) {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self, obj: Obj) -> Option<bool> {
        match self.get(obj) {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self, obj: Obj) -> Option<&[Obj]> {
        match self.get(obj) {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self, obj: Obj) -> Option<&IndexMap<String, Obj>> {
        match self.get(obj) {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Flatten nested arrays into `out`, preserving order. Non-array values
    /// are pushed as-is.
    pub fn flatten_into(&self, obj: Obj, out: &mut Vec<Obj>) {
        match self.get(obj) {
            Value::Array(items) => {
                for &item in items {
                    self.flatten_into(item, out);
                }
            }
            _ => out.push(obj),
        }
    }

    // ---- structural equality ----

    /// Deep equality: identical type and payload at every position. The
    /// disabler compares equal only to itself.
    pub fn obj_equal(&self, a: Obj, b: Obj) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y || self.strings.get(*x) == self.strings.get(*y),
            (Value::File(x), Value::File(y)) => x == y || self.strings.get(*x) == self.strings.get(*y),
            (Value::FeatureOpt(x), Value::FeatureOpt(y)) => x == y,
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(&x, &y)| self.obj_equal(x, y))
            }
            (Value::Dict(xm), Value::Dict(ym)) => {
                xm.len() == ym.len()
                    && xm.iter().all(|(k, &v)| match ym.get(k) {
                        Some(&w) => self.obj_equal(v, w),
                        None => false,
                    })
            }
            // Non-container objects compare by identity only.
            _ => false,
        }
    }

    // ---- rendering ----

    /// Canonical rendering with strings quoted, for containers and repr
    /// positions.
    pub fn render(&self, obj: Obj) -> String {
        match self.get(obj) {
            Value::Null => "(null)".to_string(),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(id) => format!("'{}'", self.strings.get(*id)),
            Value::File(id) => format!("'{}'", self.strings.get(*id)),
            Value::FeatureOpt(state) => state.as_str().to_string(),
            Value::Disabler => "disabler()".to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|&o| self.render(o)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> =
                    map.iter().map(|(k, &v)| format!("'{}': {}", k, self.render(v))).collect();
                format!("{{{}}}", parts.join(", "))
            }
            other => format!("<{}>", other.obj_type().as_str()),
        }
    }

    /// Rendering for message()/f-strings: top-level strings are unquoted.
    pub fn render_plain(&self, obj: Obj) -> String {
        match self.get(obj) {
            Value::Str(id) | Value::File(id) => self.strings.get(*id).to_string(),
            _ => self.render(obj),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_handles() {
        let store = ObjStore::new();
        assert!(matches!(store.get(Obj::NULL), Value::Null));
        assert_eq!(store.as_bool(Obj::TRUE), Some(true));
        assert_eq!(store.as_bool(Obj::FALSE), Some(false));
        assert!(matches!(store.get(Obj::DISABLER), Value::Disabler));
    }

    #[test]
    fn test_structural_equality_deep() {
        let mut store = ObjStore::new();
        let a1 = store.new_str("x");
        let a2 = store.new_str("x");
        let arr1 = store.new_array(vec![a1, Obj::TRUE]);
        let arr2 = store.new_array(vec![a2, Obj::TRUE]);
        assert!(store.obj_equal(arr1, arr2));

        let n = store.new_number(3);
        let arr3 = store.new_array(vec![n, Obj::TRUE]);
        assert!(!store.obj_equal(arr1, arr3));
    }

    #[test]
    fn test_disabler_equals_only_itself() {
        let store = ObjStore::new();
        assert!(store.obj_equal(Obj::DISABLER, Obj::DISABLER));
        assert!(!store.obj_equal(Obj::DISABLER, Obj::NULL));
        assert!(!store.obj_equal(Obj::DISABLER, Obj::TRUE));
    }

    #[test]
    fn test_dict_order_preserved() {
        let mut store = ObjStore::new();
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Obj::TRUE);
        map.insert("a".to_string(), Obj::FALSE);
        let d = store.new_dict(map);
        let keys: Vec<&String> = store.as_dict(d).unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_render() {
        let mut store = ObjStore::new();
        let s = store.new_str("hi");
        let n = store.new_number(7);
        let arr = store.new_array(vec![s, n, Obj::FALSE]);
        assert_eq!(store.render(arr), "['hi', 7, false]");
        assert_eq!(store.render_plain(s), "hi");
    }
}
