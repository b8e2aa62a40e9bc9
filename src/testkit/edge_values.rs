//! Strategy helpers for boundary and edge-case values.

use proptest::prelude::*;

use crate::bytecode::{Object, Value};

/// Include explicit `None` cases with normal values.
pub fn with_none<T>(strategy: T) -> impl Strategy<Value = Option<T::Value>>
where
    T: Strategy,
    T::Value: Clone + std::fmt::Debug,
{
    prop_oneof![
        1 => Just(Option::<T::Value>::None),
        3 => strategy.prop_map(Some),
    ]
}

/// Edge-case `i32` values, weighted towards the replacement formula's pivots.
pub fn i32_edge_values() -> impl Strategy<Value = i32> {
    prop_oneof![
        1 => Just(i32::MIN),
        1 => Just(-1_i32),
        1 => Just(0_i32),
        2 => Just(1_i32),
        1 => Just(2_i32),
        1 => Just(i32::MAX),
        3 => any::<i32>(),
    ]
}

/// Edge-case `i64` values including bounds and common special values.
pub fn i64_edge_values() -> impl Strategy<Value = i64> {
    prop_oneof![
        1 => Just(i64::MIN),
        1 => Just(-1_i64),
        1 => Just(0_i64),
        1 => Just(1_i64),
        1 => Just(i64::MAX),
        3 => any::<i64>(),
    ]
}

/// Edge-case `f32` values including signed zeros, infinities and NaN.
pub fn f32_edge_values() -> impl Strategy<Value = f32> {
    prop_oneof![
        1 => Just(-0.0_f32),
        1 => Just(0.0_f32),
        1 => Just(1.0_f32),
        1 => Just(-1.0_f32),
        1 => Just(f32::MAX),
        1 => Just(f32::MIN),
        1 => Just(f32::MIN_POSITIVE),
        1 => Just(f32::INFINITY),
        1 => Just(f32::NEG_INFINITY),
        1 => Just(f32::NAN),
        4 => (-1_000_000.0_f32)..=1_000_000.0_f32,
    ]
}

/// Edge-case `f64` values including signed zeros, infinities and NaN.
pub fn f64_edge_values() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(-0.0_f64),
        1 => Just(0.0_f64),
        1 => Just(1.0_f64),
        1 => Just(-1.0_f64),
        1 => Just(f64::MAX),
        1 => Just(f64::MIN),
        1 => Just(f64::MIN_POSITIVE),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
        1 => Just(f64::NAN),
        4 => (-1_000_000.0_f64)..=1_000_000.0_f64,
    ]
}

/// Heap objects of every runtime class except type literals.
pub fn objects() -> impl Strategy<Value = Object> {
    prop_oneof![
        any::<bool>().prop_map(Object::Boolean),
        i32_edge_values().prop_map(Object::Integer),
        "[a-z]{0,8}".prop_map(Object::Str),
    ]
}

/// Runtime values of every kind, nulls included.
pub fn values() -> impl Strategy<Value = Value> {
    prop_oneof![
        i32_edge_values().prop_map(Value::Int),
        i64_edge_values().prop_map(Value::Long),
        f32_edge_values().prop_map(Value::Float),
        f64_edge_values().prop_map(Value::Double),
        with_none(objects()).prop_map(Value::Ref),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn float_strategies_reach_nan() {
        let mut runner = TestRunner::deterministic();
        let strategy = f64_edge_values();
        let saw_nan = (0..2_000).any(|_| {
            strategy
                .new_tree(&mut runner)
                .expect("strategy should generate")
                .current()
                .is_nan()
        });
        assert!(saw_nan);
    }

    proptest! {
        #[test]
        fn values_agree_with_themselves(value in values()) {
            prop_assert!(value.same_as(&value));
        }
    }
}
