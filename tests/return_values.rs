#![cfg(feature = "testkit")]

use std::collections::BTreeSet;
use std::sync::OnceLock;

use bytemut::bytecode::{
    CancelToken, ClassUnit, Instruction, MethodUnit, NumKind, Object, ReturnKind, SlotKind, Value,
    Vm,
};
use bytemut::engine::{EngineError, Mutater, Selector};
use bytemut::testkit::fixtures::{self, RETURNS_CLASS, method_ref, returns_class};
use bytemut::testkit::{
    assert_analysis_deterministic, assert_single_site_mutation, f32_edge_values, f64_edge_values,
    i32_edge_values, i64_edge_values,
};
use proptest::prelude::*;

/// Runtime with every return site of the fixture class mutated.
fn mutated() -> &'static Vm {
    static VM: OnceLock<Vm> = OnceLock::new();
    VM.get_or_init(|| {
        let class = returns_class();
        let every_site: BTreeSet<usize> = (0..8).collect();
        let rewrite = Mutater::default()
            .rewrite(&class, Selector::Indices(every_site))
            .expect("rewrite should succeed");
        assert_eq!(rewrite.applied.len(), 8);
        let vm = Vm::default();
        vm.load_class(&rewrite.class)
            .expect("mutated class should load");
        vm
    })
}

fn call(name: &str, descriptor: &str, arg: Value) -> Value {
    mutated()
        .invoke(
            &method_ref(RETURNS_CLASS, name, descriptor),
            vec![arg],
            &CancelToken::new(),
        )
        .expect("mutated method should run")
        .expect("mutated method should return a value")
}

fn expected_int(x: i32) -> i32 {
    if x == 1 { 0 } else { x.wrapping_add(1) }
}

proptest! {
    #[test]
    fn prop_int_returns_follow_formula(x in i32_edge_values()) {
        prop_assert_eq!(call("ints", "(I)I", Value::Int(x)), Value::Int(expected_int(x)));
    }

    #[test]
    fn prop_long_returns_are_incremented(x in i64_edge_values()) {
        prop_assert_eq!(call("longs", "(J)J", Value::Long(x)), Value::Long(x.wrapping_add(1)));
    }

    #[test]
    fn prop_float_returns_follow_formula(x in f32_edge_values()) {
        let expected = if x.is_nan() { -1.0_f32 } else { -(x + 1.0) };
        let returned = call("floats", "(F)F", Value::Float(x));
        prop_assert!(returned.same_as(&Value::Float(expected)), "{x} -> {returned:?}");
    }

    #[test]
    fn prop_double_returns_follow_formula(x in f64_edge_values()) {
        let expected = if x.is_nan() { -1.0_f64 } else { -(x + 1.0) };
        let returned = call("doubles", "(D)D", Value::Double(x));
        prop_assert!(returned.same_as(&Value::Double(expected)), "{x} -> {returned:?}");
    }

    #[test]
    fn prop_boxed_integers_follow_formula(x in i32_edge_values()) {
        let returned = call("integers", "(Llang/Integer;)Llang/Integer;", Value::boxed_int(x));
        prop_assert_eq!(returned, Value::boxed_int(expected_int(x)));
    }
}

#[test]
fn booleans_flip() {
    assert_eq!(call("booleans", "(Z)Z", Value::boolean(false)), Value::boolean(true));
    assert_eq!(call("booleans", "(Z)Z", Value::boolean(true)), Value::boolean(false));
}

#[test]
fn floating_edge_cases_are_distinguishable() {
    let double = |x: f64| call("doubles", "(D)D", Value::Double(x));
    assert!(double(f64::NAN).same_as(&Value::Double(-1.0)));
    assert!(double(0.0).same_as(&Value::Double(-1.0)));
    assert!(double(-0.0).same_as(&Value::Double(-1.0)));
    assert!(double(f64::INFINITY).same_as(&Value::Double(f64::NEG_INFINITY)));
    assert!(double(f64::NEG_INFINITY).same_as(&Value::Double(f64::INFINITY)));

    let float = |x: f32| call("floats", "(F)F", Value::Float(x));
    assert!(float(f32::NAN).same_as(&Value::Float(-1.0)));
    assert!(float(-0.0).same_as(&Value::Float(-1.0)));
    assert!(float(f32::INFINITY).same_as(&Value::Float(f32::NEG_INFINITY)));
}

#[test]
fn object_references_are_replaced_by_declared_type() {
    let integers = |v: Value| call("integers", "(Llang/Integer;)Llang/Integer;", v);
    assert_eq!(integers(Value::boxed_int(5)), Value::boxed_int(6));
    assert_eq!(integers(Value::boxed_int(1)), Value::boxed_int(0));
    assert_eq!(integers(Value::null()), Value::boxed_int(1));

    let flags = |v: Value| call("flags", "(Llang/Boolean;)Llang/Boolean;", v);
    assert_eq!(flags(Value::boxed_bool(true)), Value::boxed_bool(false));
    assert_eq!(flags(Value::boxed_bool(false)), Value::boxed_bool(true));

    let strings = |v: Value| call("strings", "(Llang/String;)Llang/String;", v);
    assert_eq!(strings(Value::string("hello")), Value::null());
    assert_eq!(
        strings(Value::Ref(Some(Object::Str(String::new())))),
        Value::null()
    );
}

#[test]
fn analysis_is_deterministic_and_mutants_touch_one_site() {
    let class = returns_class();
    let mutater = Mutater::default();
    assert_analysis_deterministic(&mutater, &class);

    let found = mutater.find_mutations(&class).expect("analysis should succeed");
    for details in &found {
        assert_single_site_mutation(&mutater, &class, &details.id);
        let again = mutater
            .get_mutation(&class, &details.id)
            .expect("mutant should materialize");
        assert_eq!(
            again.bytes,
            mutater
                .get_mutation(&class, &details.id)
                .expect("mutant should materialize")
                .bytes
        );
    }
    let descriptions: Vec<_> = found.iter().map(|d| d.description()).collect();
    assert_eq!(
        descriptions,
        vec![
            "replaced return of primitive boolean/byte/short/integer value with (x == 1) ? 0 : x + 1",
            "replaced return of primitive boolean/byte/short/integer value with (x == 1) ? 0 : x + 1",
            "replaced return of primitive long value with x + 1",
            "replaced return of primitive float value with (x != NaN)? -(x + 1) : -1",
            "replaced return of primitive double value with (x != NaN)? -(x + 1) : -1",
            "replaced return of object reference value with [see docs for details]",
            "replaced return of object reference value with [see docs for details]",
            "replaced return of object reference value with [see docs for details]",
        ]
    );
}

#[test]
fn return_x_end_to_end() {
    let class = ClassUnit::new("demo/Calc").with_method(MethodUnit::new(
        "f",
        fixtures::descriptor("(I)I"),
        vec![
            Instruction::Load {
                kind: SlotKind::Num(NumKind::Int),
                slot: 0,
            },
            Instruction::Return(ReturnKind::Int),
        ],
    ));
    let mutater = Mutater::default();
    let found = mutater.find_mutations(&class).expect("analysis should succeed");
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].description(),
        "replaced return of primitive boolean/byte/short/integer value with (x == 1) ? 0 : x + 1"
    );

    let vm = Vm::default();
    vm.load_class(&class).expect("class should load");
    let original = vm.class_bytes("demo/Calc").expect("class is loaded");
    let mutant = mutater
        .get_mutation(&class, &found[0].id)
        .expect("mutant should materialize");
    vm.redefine("demo/Calc", &mutant.bytes)
        .expect("redefinition should succeed");

    let f = method_ref("demo/Calc", "f", "(I)I");
    let run = |x: i32| {
        vm.invoke(&f, vec![Value::Int(x)], &CancelToken::new())
            .expect("call should succeed")
    };
    assert_eq!(run(5), Some(Value::Int(6)));
    assert_eq!(run(1), Some(Value::Int(0)));

    vm.redefine("demo/Calc", &original)
        .expect("restore should succeed");
    assert_eq!(run(5), Some(Value::Int(5)));
}

#[test]
fn unresolvable_reference_return_aborts_the_unit() {
    let class = ClassUnit::new("demo/Broken").with_method(MethodUnit::new(
        "f",
        fixtures::descriptor("()I"),
        vec![
            Instruction::Push(bytemut::bytecode::Constant::Null),
            Instruction::Return(ReturnKind::Reference),
        ],
    ));
    let err = Mutater::default()
        .find_mutations(&class)
        .expect_err("analysis should fail");
    assert!(matches!(err, EngineError::UnresolvableReturnType { .. }));
}
