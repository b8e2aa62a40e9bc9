//! Property-testing support: edge-value strategies, law assertions and
//! fixture classes.

pub mod edge_values;
pub mod fixtures;
pub mod laws;

pub use edge_values::{
    f32_edge_values, f64_edge_values, i32_edge_values, i64_edge_values, objects, values, with_none,
};
pub use laws::{
    assert_analysis_deterministic, assert_bincode_deterministic, assert_bincode_roundtrip,
    assert_class_roundtrip, assert_single_site_mutation,
};
