//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust,ignore
//! use bytemut::prelude::*;
//! ```

pub use crate::bytecode::{
    CancelToken, ClassUnit, Instruction, MethodDescriptor, MethodRef, MethodUnit, Object,
    TypeDesc, Value, Vm, VmOptions, decode_class, encode_class,
};
pub use crate::engine::{
    EngineConfig, EngineError, Mutant, Mutater, MutationContext, MutationDetails,
    MutationIdentifier, ReturnValuesMutator, Selector,
};

#[cfg(feature = "worker")]
pub use crate::worker::{
    ExitCode, MutationResult, MutationStatus, SlaveArguments, TestCase, TimeoutStrategy,
    WorkerConfig,
};

#[cfg(feature = "testkit")]
pub use crate::testkit::{
    assert_analysis_deterministic, assert_bincode_roundtrip, assert_single_site_mutation,
    f32_edge_values, f64_edge_values, i32_edge_values, i64_edge_values,
};

#[cfg(feature = "testkit")]
pub use proptest::prelude::*;
