//! Operator Semantics
//!
//! Binary and unary operator dispatch by operand type. Everything here is
//! pure over the object store; the machine anchors errors to the operator's
//! source location.

use indexmap::IndexMap;

use crate::diagnostics::{arith_error, bounds_error, type_error, InterpResult};
use crate::object::{Obj, ObjStore, Value};
use crate::typecheck::bounds_adjust;

fn type_name(store: &ObjStore, obj: Obj) -> &'static str {
    store.obj_type(obj).as_str()
}

/// Join two path fragments; an absolute right side wins.
pub fn path_join(lhs: &str, rhs: &str) -> String {
    if rhs.starts_with('/') {
        rhs.to_string()
    } else if lhs.is_empty() {
        rhs.to_string()
    } else {
        format!("{}/{}", lhs.trim_end_matches('/'), rhs)
    }
}

pub fn add(store: &mut ObjStore, lhs: Obj, rhs: Obj) -> InterpResult<Obj> {
    match (store.get(lhs).clone(), store.get(rhs).clone()) {
        (Value::Number(a), Value::Number(b)) => Ok(store.new_number(a.wrapping_add(b))),
        (Value::Str(a), Value::Str(b)) => {
            let joined = format!("{}{}", store.str_value(a), store.str_value(b));
            Ok(store.new_str(&joined))
        }
        (Value::Array(mut items), rhs_val) => {
            // Append an element, or extend when the right side is an array.
            match rhs_val {
                Value::Array(other) => items.extend(other),
                _ => items.push(rhs),
            }
            Ok(store.new_array(items))
        }
        (Value::Dict(mut map), Value::Dict(other)) => {
            for (k, v) in other {
                map.insert(k, v);
            }
            Ok(store.new_dict(map))
        }
        _ => Err(type_error(format!(
            "cannot add {} and {}",
            type_name(store, lhs),
            type_name(store, rhs)
        ))),
    }
}

pub fn sub(store: &mut ObjStore, lhs: Obj, rhs: Obj) -> InterpResult<Obj> {
    match (store.get(lhs), store.get(rhs)) {
        (Value::Number(a), Value::Number(b)) => {
            let r = a.wrapping_sub(*b);
            Ok(store.new_number(r))
        }
        _ => Err(type_error(format!(
            "cannot subtract {} from {}",
            type_name(store, rhs),
            type_name(store, lhs)
        ))),
    }
}

pub fn mul(store: &mut ObjStore, lhs: Obj, rhs: Obj) -> InterpResult<Obj> {
    match (store.get(lhs), store.get(rhs)) {
        (Value::Number(a), Value::Number(b)) => {
            let r = a.wrapping_mul(*b);
            Ok(store.new_number(r))
        }
        _ => Err(type_error(format!(
            "cannot multiply {} and {}",
            type_name(store, lhs),
            type_name(store, rhs)
        ))),
    }
}

pub fn div(store: &mut ObjStore, lhs: Obj, rhs: Obj) -> InterpResult<Obj> {
    match (store.get(lhs).clone(), store.get(rhs).clone()) {
        (Value::Number(a), Value::Number(b)) => {
            if b == 0 {
                return Err(arith_error("division by zero"));
            }
            Ok(store.new_number(a / b))
        }
        (Value::Str(a), Value::Str(b)) => {
            let (a, b) = (store.str_value(a).to_string(), store.str_value(b).to_string());
            if a.contains('\0') || b.contains('\0') {
                return Err(arith_error("path segments must not contain NUL"));
            }
            let joined = path_join(&a, &b);
            Ok(store.new_str(&joined))
        }
        _ => Err(type_error(format!(
            "cannot divide {} by {}",
            type_name(store, lhs),
            type_name(store, rhs)
        ))),
    }
}

pub fn modulo(store: &mut ObjStore, lhs: Obj, rhs: Obj) -> InterpResult<Obj> {
    match (store.get(lhs), store.get(rhs)) {
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0 {
                return Err(arith_error("modulo by zero"));
            }
            let r = a % b;
            Ok(store.new_number(r))
        }
        _ => Err(type_error(format!(
            "cannot take {} modulo {}",
            type_name(store, lhs),
            type_name(store, rhs)
        ))),
    }
}

/// `< <= > >=`, defined only for numbers.
pub fn relational(
    store: &ObjStore,
    lhs: Obj,
    rhs: Obj,
    check: fn(std::cmp::Ordering) -> bool,
) -> InterpResult<bool> {
    match (store.get(lhs), store.get(rhs)) {
        (Value::Number(a), Value::Number(b)) => Ok(check(a.cmp(b))),
        _ => Err(type_error(format!(
            "cannot order {} and {}",
            type_name(store, lhs),
            type_name(store, rhs)
        ))),
    }
}

/// Membership: array element, dict key, or substring.
pub fn contains(store: &ObjStore, item: Obj, container: Obj) -> InterpResult<bool> {
    match store.get(container) {
        Value::Array(items) => Ok(items.iter().any(|&o| store.obj_equal(o, item))),
        Value::Dict(map) => match store.as_str(item) {
            Some(key) => Ok(map.contains_key(key)),
            None => Err(type_error("dict membership tests require a string key")),
        },
        Value::Str(id) => match store.as_str(item) {
            Some(needle) => Ok(store.str_value(*id).contains(needle)),
            None => Err(type_error("substring tests require a string")),
        },
        _ => Err(type_error(format!(
            "'in' is not defined for {}",
            type_name(store, container)
        ))),
    }
}

/// Subscript semantics per receiver type.
pub fn index(store: &mut ObjStore, receiver: Obj, idx: Obj) -> InterpResult<Obj> {
    match store.get(receiver).clone() {
        Value::Disabler => Ok(Obj::DISABLER),
        Value::Array(items) => {
            let n = store
                .as_number(idx)
                .ok_or_else(|| type_error("array index must be a number"))?;
            match bounds_adjust(items.len(), n) {
                Some(i) => Ok(items[i]),
                None => Err(bounds_error(format!(
                    "index {} out of bounds for array of length {}",
                    n,
                    items.len()
                ))),
            }
        }
        Value::Dict(map) => {
            let key = store
                .as_str(idx)
                .ok_or_else(|| type_error("dict key must be a string"))?;
            match map.get(key) {
                Some(&v) => Ok(v),
                None => Err(bounds_error(format!("key '{}' not found in dict", key))),
            }
        }
        Value::Str(id) => {
            let n = store
                .as_number(idx)
                .ok_or_else(|| type_error("string index must be a number"))?;
            let s: Vec<char> = store.str_value(id).chars().collect();
            match bounds_adjust(s.len(), n) {
                Some(i) => {
                    let c = s[i].to_string();
                    Ok(store.new_str(&c))
                }
                None => Err(bounds_error(format!(
                    "index {} out of bounds for string of length {}",
                    n,
                    s.len()
                ))),
            }
        }
        Value::CustomTarget(ct) => {
            let n = store
                .as_number(idx)
                .ok_or_else(|| type_error("custom target index must be a number"))?;
            match bounds_adjust(ct.outputs.len(), n) {
                Some(i) => Ok(ct.outputs[i]),
                None => Err(bounds_error(format!(
                    "index {} out of bounds for custom target with {} outputs",
                    n,
                    ct.outputs.len()
                ))),
            }
        }
        _ => Err(type_error(format!(
            "{} is not subscriptable",
            type_name(store, receiver)
        ))),
    }
}

/// Build a dict from popped key/value pairs, rejecting duplicate keys.
pub fn build_dict(store: &mut ObjStore, pairs: Vec<(Obj, Obj)>) -> InterpResult<Obj> {
    let mut map = IndexMap::new();
    for (key, value) in pairs {
        let key = store
            .as_str(key)
            .ok_or_else(|| type_error("dict keys must be strings"))?
            .to_string();
        if map.insert(key.clone(), value).is_some() {
            return Err(type_error(format!("duplicate dict key '{}'", key)));
        }
    }
    Ok(store.new_dict(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_arithmetic() {
        let mut store = ObjStore::new();
        let a = store.new_number(7);
        let b = store.new_number(3);
        let r = add(&mut store, a, b).unwrap();
        assert_eq!(store.as_number(r), Some(10));
        let r = sub(&mut store, a, b).unwrap();
        assert_eq!(store.as_number(r), Some(4));
        let r = mul(&mut store, a, b).unwrap();
        assert_eq!(store.as_number(r), Some(21));
        let r = div(&mut store, a, b).unwrap();
        assert_eq!(store.as_number(r), Some(2));
        let r = modulo(&mut store, a, b).unwrap();
        assert_eq!(store.as_number(r), Some(1));
    }

    #[test]
    fn test_division_by_zero() {
        let mut store = ObjStore::new();
        let a = store.new_number(1);
        let z = store.new_number(0);
        assert!(div(&mut store, a, z).is_err());
        assert!(modulo(&mut store, a, z).is_err());
    }

    #[test]
    fn test_string_concat_and_join() {
        let mut store = ObjStore::new();
        let a = store.new_str("foo");
        let b = store.new_str("bar");
        let cat = add(&mut store, a, b).unwrap();
        assert_eq!(store.as_str(cat), Some("foobar"));
        let joined = div(&mut store, a, b).unwrap();
        assert_eq!(store.as_str(joined), Some("foo/bar"));
        let abs = store.new_str("/abs");
        let joined = div(&mut store, a, abs).unwrap();
        assert_eq!(store.as_str(joined), Some("/abs"));
    }

    #[test]
    fn test_array_append_and_extend() {
        let mut store = ObjStore::new();
        let one = store.new_number(1);
        let arr = store.new_array(vec![one]);
        let two = store.new_number(2);
        let appended = add(&mut store, arr, two).unwrap();
        assert_eq!(store.as_array(appended).unwrap().len(), 2);
        let more = store.new_array(vec![one, two]);
        let extended = add(&mut store, appended, more).unwrap();
        assert_eq!(store.as_array(extended).unwrap().len(), 4);
        // The original array is untouched.
        assert_eq!(store.as_array(arr).unwrap().len(), 1);
    }

    #[test]
    fn test_dict_merge_rhs_wins() {
        let mut store = ObjStore::new();
        let one = store.new_number(1);
        let two = store.new_number(2);
        let mut m1 = IndexMap::new();
        m1.insert("a".to_string(), one);
        let d1 = store.new_dict(m1);
        let mut m2 = IndexMap::new();
        m2.insert("a".to_string(), two);
        let d2 = store.new_dict(m2);
        let merged = add(&mut store, d1, d2).unwrap();
        let map = store.as_dict(merged).unwrap();
        assert_eq!(store.as_number(map["a"]), Some(2));
    }

    #[test]
    fn test_contains() {
        let mut store = ObjStore::new();
        let a = store.new_str("a");
        let ab = store.new_str("ab");
        let arr = store.new_array(vec![a]);
        assert!(contains(&store, a, arr).unwrap());
        assert!(contains(&store, a, ab).unwrap());
        let mut m = IndexMap::new();
        m.insert("a".to_string(), Obj::TRUE);
        let d = store.new_dict(m);
        assert!(contains(&store, a, d).unwrap());
    }

    #[test]
    fn test_index_negative() {
        let mut store = ObjStore::new();
        let one = store.new_number(1);
        let two = store.new_number(2);
        let arr = store.new_array(vec![one, two]);
        let minus_one = store.new_number(-1);
        let got = index(&mut store, arr, minus_one).unwrap();
        assert_eq!(store.as_number(got), Some(2));
        let oob = store.new_number(5);
        assert!(index(&mut store, arr, oob).is_err());
    }

    #[test]
    fn test_dict_key_miss_is_bounds_error() {
        let mut store = ObjStore::new();
        let d = store.new_dict(IndexMap::new());
        let k = store.new_str("missing");
        assert!(index(&mut store, d, k).is_err());
    }

    #[test]
    fn test_duplicate_dict_key_rejected() {
        let mut store = ObjStore::new();
        let k = store.new_str("x");
        let k2 = store.new_str("x");
        let err = build_dict(&mut store, vec![(k, Obj::TRUE), (k2, Obj::FALSE)]);
        assert!(err.is_err());
    }
}
