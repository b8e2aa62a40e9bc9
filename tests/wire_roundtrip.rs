#![cfg(all(feature = "worker", feature = "testkit"))]

use std::io::Cursor;

use bytemut::bytecode::Value;
use bytemut::engine::{EngineConfig, MutationIdentifier};
use bytemut::testkit::fixtures::method_ref;
use bytemut::testkit::values;
use bytemut::worker::{
    ExitCode, Expectation, Frame, MutationResult, MutationStatus, SlaveArguments, TestCase,
    TestId, TimeoutStrategy, read_frame, write_frame,
};
use bytemut::worker::protocol::read_arguments;
use proptest::prelude::*;

fn identifiers() -> impl Strategy<Value = MutationIdentifier> {
    (
        "[a-z]{1,6}/[A-Z][a-z]{0,6}",
        "[a-z]{1,8}",
        prop_oneof![Just("(I)I"), Just("(D)D"), Just("(Llang/Integer;)Llang/Integer;")],
        0usize..64,
        "[a-z. ]{0,24}",
    )
        .prop_map(|(class, method, descriptor, index, description)| {
            MutationIdentifier::new(
                class,
                method,
                &descriptor.parse().expect("descriptor should parse"),
                index,
                "bytemut.ReturnValuesMutator",
                description,
            )
        })
}

fn timeout_strategies() -> impl Strategy<Value = TimeoutStrategy> {
    prop_oneof![
        (0u64..120_000).prop_map(|millis| TimeoutStrategy::Fixed { millis }),
        (0.5f32..4.0, 0u64..60_000).prop_map(|(factor, constant_millis)| {
            TimeoutStrategy::PercentAndConstant {
                factor,
                constant_millis,
            }
        }),
    ]
}

fn test_cases() -> impl Strategy<Value = TestCase> {
    (
        "[a-z-]{1,12}",
        prop::collection::vec(values(), 0..4),
        prop::option::of(values()),
        0u64..10_000,
    )
        .prop_map(|(id, args, expected, expected_millis)| TestCase {
            id: TestId(id),
            target: method_ref("fixture/Returns", "doubles", "(D)D"),
            args,
            expect: expected.map_or(Expectation::Completes, Expectation::Returns),
            expected_millis,
        })
}

fn slave_arguments() -> impl Strategy<Value = SlaveArguments> {
    (
        any::<bool>(),
        timeout_strategies(),
        prop::collection::vec(identifiers(), 0..6),
        prop::collection::vec(test_cases(), 0..4),
        prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..3),
    )
        .prop_map(|(verbose, timeout_strategy, mutations, tests, classpath)| SlaveArguments {
            verbose,
            timeout_strategy,
            mutations,
            tests,
            config: EngineConfig::default(),
            classpath,
        })
}

fn statuses() -> impl Strategy<Value = MutationStatus> {
    prop_oneof![
        Just(MutationStatus::Killed),
        Just(MutationStatus::Survived),
        Just(MutationStatus::TimedOut),
        Just(MutationStatus::RunError),
        Just(MutationStatus::MemoryError),
    ]
}

fn exit_codes() -> impl Strategy<Value = ExitCode> {
    prop_oneof![
        Just(ExitCode::Ok),
        Just(ExitCode::OutOfMemory),
        Just(ExitCode::UnknownError),
    ]
}

fn framed(frame: &Frame) -> Cursor<Vec<u8>> {
    let mut buf = Vec::new();
    write_frame(&mut buf, frame).expect("write should succeed");
    Cursor::new(buf)
}

/// Field equality where NaN payloads compare bit-for-bit.
fn assert_same_arguments(decoded: &SlaveArguments, sent: &SlaveArguments) {
    assert_eq!(
        bincode::serialize(decoded).expect("bincode serialization should succeed"),
        bincode::serialize(sent).expect("bincode serialization should succeed"),
    );
    assert_eq!(decoded.verbose, sent.verbose);
    assert_eq!(decoded.mutations, sent.mutations);
    assert_eq!(decoded.classpath, sent.classpath);
    assert_eq!(decoded.config, sent.config);
    assert_eq!(decoded.tests.len(), sent.tests.len());
    for (got, want) in decoded.tests.iter().zip(&sent.tests) {
        assert_eq!(got.id, want.id);
        assert_eq!(got.target, want.target);
        assert!(got.args.iter().zip(&want.args).all(|(a, b)| a.same_as(b)));
        match (&got.expect, &want.expect) {
            (Expectation::Returns(a), Expectation::Returns(b)) => assert!(a.same_as(b)),
            (Expectation::Completes, Expectation::Completes) => {}
            other => panic!("expectation changed in transit: {other:?}"),
        }
    }
}

proptest! {
    #[test]
    fn prop_arguments_survive_the_wire(args in slave_arguments()) {
        let mut input = framed(&Frame::Arguments(args.clone()));
        let decoded = read_arguments(&mut input).expect("arguments should decode");
        assert_same_arguments(&decoded, &args);
        prop_assert_eq!(read_frame(&mut input).expect("eof should be clean"), None);
    }

    #[test]
    fn prop_status_frames_survive_the_wire(id in identifiers(), status in statuses()) {
        let frame = Frame::Status(MutationResult::new(id, status));
        let decoded = read_frame(&mut framed(&frame)).expect("status should decode");
        prop_assert_eq!(decoded, Some(frame));
    }

    #[test]
    fn prop_done_frames_survive_the_wire(code in exit_codes()) {
        let decoded = read_frame(&mut framed(&Frame::Done(code))).expect("done should decode");
        prop_assert_eq!(decoded, Some(Frame::Done(code)));
    }
}

#[test]
fn nan_expectations_keep_their_meaning() {
    let nan_case = TestCase::returns(
        "nan",
        method_ref("fixture/Returns", "doubles", "(D)D"),
        vec![Value::Double(f64::NAN)],
        Value::Double(f64::NAN),
    );
    let args = SlaveArguments {
        verbose: false,
        timeout_strategy: TimeoutStrategy::default(),
        mutations: Vec::new(),
        tests: vec![nan_case],
        config: EngineConfig::default(),
        classpath: Vec::new(),
    };

    let decoded =
        read_arguments(&mut framed(&Frame::Arguments(args.clone()))).expect("arguments should decode");
    assert_same_arguments(&decoded, &args);
    assert!(decoded.tests[0].expect.matches(Some(&Value::Double(f64::NAN))));
    assert!(!decoded.tests[0].expect.matches(Some(&Value::Double(0.0))));
}
