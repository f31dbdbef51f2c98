//! No-op detection.
//!
//! Decides whether an old/new pair is a real change. Comparison is shallow:
//! containers are equal when their elements are identical, never recursively.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::host::{TypeTag, Value};

/// True when `old -> new` is a no-op update.
///
/// Rules, in order:
/// 1. both undefined: a first assignment, not a no-op
/// 2. both null: no-op
/// 3. strictly equal: no-op
/// 4. exactly one undefined: not a no-op
/// 5. different types (after unwrapping wrappers): not a no-op
/// 6. arrays of equal length: no-op iff elements are pairwise strictly equal
/// 7. objects with the same key set: no-op iff values are strictly equal
/// 8. anything else: not a no-op
pub fn detect_no_op(old: &Value, new: &Value) -> bool {
    if old.is_undefined() && new.is_undefined() {
        return false;
    }
    if old.is_null() && new.is_null() {
        return true;
    }
    if old.strict_eq(new) {
        return true;
    }
    if old.is_undefined() || new.is_undefined() {
        return false;
    }

    let old = old.unwrap_raw();
    let new = new.unwrap_raw();
    if old.type_tag() != new.type_tag() {
        return false;
    }

    match (old.type_tag(), &old, &new) {
        (TypeTag::Array, Value::Array(a), Value::Array(b)) => shallow_arrays_equal(a, b),
        (TypeTag::Object, Value::Object(a), Value::Object(b)) => shallow_objects_equal(a, b),
        _ => false,
    }
}

fn shallow_arrays_equal(a: &RefCell<Vec<Value>>, b: &RefCell<Vec<Value>>) -> bool {
    let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
        return false;
    };
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.strict_eq(y))
}

fn shallow_objects_equal(
    a: &RefCell<BTreeMap<String, Value>>,
    b: &RefCell<BTreeMap<String, Value>>,
) -> bool {
    let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
        return false;
    };
    a.len() == b.len()
        && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| x.strict_eq(y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TrackedObject;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_undefined_and_null() {
        assert!(!detect_no_op(&Value::Undefined, &Value::Undefined));
        assert!(detect_no_op(&Value::Null, &Value::Null));
        assert!(!detect_no_op(&Value::Undefined, &Value::Null));
        assert!(!detect_no_op(&Value::Undefined, &Value::from(0)));
        assert!(!detect_no_op(&Value::from(0), &Value::Undefined));
    }

    #[test]
    fn test_primitives() {
        assert!(detect_no_op(&Value::from(5), &Value::from(5)));
        assert!(!detect_no_op(&Value::from(5), &Value::from(6)));
        assert!(!detect_no_op(&Value::from(1), &Value::from("1")));
        assert!(!detect_no_op(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }

    #[test]
    fn test_arrays_are_shallow() {
        let shared = Value::from(json!({"id": 1}));
        let a = Value::array([Value::from(1), shared.clone()]);
        let b = Value::array([Value::from(1), shared]);
        assert!(detect_no_op(&a, &b));

        // Structurally equal but a different nested reference
        let c = Value::from(json!([1, {"id": 1}]));
        let d = Value::from(json!([1, {"id": 1}]));
        assert!(!detect_no_op(&c, &d));

        let short = Value::from(json!([1]));
        assert!(!detect_no_op(&a, &short));
    }

    #[test]
    fn test_objects_need_identical_key_sets() {
        let a = Value::from(json!({"x": 1, "y": "z"}));
        let b = Value::from(json!({"x": 1, "y": "z"}));
        let extra = Value::from(json!({"x": 1, "y": "z", "w": null}));
        let renamed = Value::from(json!({"x": 1, "q": "z"}));

        assert!(detect_no_op(&a, &b));
        assert!(!detect_no_op(&a, &extra));
        assert!(!detect_no_op(&extra, &a));
        assert!(!detect_no_op(&a, &renamed));
    }

    #[test]
    fn test_array_vs_object() {
        let arr = Value::from(json!([]));
        let obj = Value::from(json!({}));
        assert!(!detect_no_op(&arr, &obj));
    }

    #[test]
    fn test_wrappers_are_unwrapped() {
        let raw = Value::from(json!([1, 2, 3]));
        let wrapped = Value::from(TrackedObject::wrap(raw.clone()));
        let other_wrapper = Value::from(TrackedObject::wrap(raw.clone()));
        let copy = Value::from(json!([1, 2, 3]));

        assert!(detect_no_op(&wrapped, &raw));
        assert!(detect_no_op(&wrapped, &other_wrapper));
        assert!(detect_no_op(&wrapped, &copy));
    }

    fn arb_primitive() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1_000_000i64..1_000_000).prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_identical_values_are_no_ops(v in arb_primitive()) {
            prop_assert!(detect_no_op(&v, &v.clone()));
        }

        #[test]
        fn prop_defined_vs_undefined_is_change(v in arb_primitive()) {
            prop_assert!(!detect_no_op(&Value::Undefined, &v));
            prop_assert!(!detect_no_op(&v, &Value::Undefined));
        }

        #[test]
        fn prop_pairwise_identical_arrays(items in prop::collection::vec(arb_primitive(), 1..8), at in any::<prop::sample::Index>()) {
            let a = Value::array(items.clone());
            let b = Value::array(items.clone());
            prop_assert!(detect_no_op(&a, &b));

            let mut changed = items;
            let i = at.index(changed.len());
            changed[i] = Value::from(json!({}));
            prop_assert!(!detect_no_op(&a, &Value::array(changed)));
        }

        #[test]
        fn prop_key_sets_must_match(keys in prop::collection::btree_set("[a-z]{1,6}", 1..6)) {
            let entries: Vec<(String, Value)> = keys.iter().map(|k| (k.clone(), Value::from(k.len() as i64))).collect();
            let a = Value::object(entries.clone());
            let b = Value::object(entries.clone());
            prop_assert!(detect_no_op(&a, &b));

            let mut grown = entries.clone();
            grown.push(("ZZ".to_string(), Value::Null));
            prop_assert!(!detect_no_op(&a, &Value::object(grown)));

            let shrunk: Vec<_> = entries.into_iter().skip(1).collect();
            prop_assert!(!detect_no_op(&a, &Value::object(shrunk)));
        }
    }
}
