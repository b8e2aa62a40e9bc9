//! Law assertions for wire payloads, class codecs and mutant structure.

use std::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

use crate::bytecode::{ClassUnit, Instruction, decode_class, encode_class};
use crate::engine::{Mutater, MutationIdentifier, Selector};

/// Assert bincode roundtrip identity.
pub fn assert_bincode_roundtrip<T>(value: &T)
where
    T: Serialize + DeserializeOwned + PartialEq + Debug,
{
    let bytes = bincode::serialize(value).expect("bincode serialization should succeed");
    let decoded: T = bincode::deserialize(&bytes).expect("bincode deserialization should succeed");
    assert_eq!(*value, decoded, "bincode roundtrip should preserve value");
}

/// Assert bincode determinism.
pub fn assert_bincode_deterministic<T>(value: &T)
where
    T: Serialize + Debug,
{
    let first = bincode::serialize(value).expect("bincode serialization should succeed");
    let second = bincode::serialize(value).expect("bincode serialization should succeed");
    assert_eq!(
        first, second,
        "bincode serialization should be deterministic"
    );
}

/// Assert that a class survives encode/decode unchanged.
pub fn assert_class_roundtrip(class: &ClassUnit) {
    let bytes = encode_class(class).expect("class encoding should succeed");
    let decoded = decode_class(&bytes).expect("class decoding should succeed");
    assert_eq!(*class, decoded, "class roundtrip should preserve the unit");
}

/// Assert that two analyses of the same class agree on every id and description.
pub fn assert_analysis_deterministic(mutater: &Mutater, class: &ClassUnit) {
    let first = mutater
        .find_mutations(class)
        .expect("analysis should succeed");
    let second = mutater
        .find_mutations(class)
        .expect("analysis should succeed");
    assert_eq!(first, second, "analysis should be deterministic");
    for (index, details) in first.iter().enumerate() {
        assert_eq!(details.id.index(), index, "ids should be sequential");
    }
}

/// Assert that materializing `id` changes exactly one return site and leaves
/// everything else byte-for-byte identical.
pub fn assert_single_site_mutation(mutater: &Mutater, class: &ClassUnit, id: &MutationIdentifier) {
    let rewrite = mutater
        .rewrite(class, Selector::Target(id.clone()))
        .expect("rewrite should succeed");
    assert_eq!(rewrite.applied.as_slice(), std::slice::from_ref(id));

    let changed: Vec<_> = class
        .methods
        .iter()
        .zip(&rewrite.class.methods)
        .filter(|(before, after)| before != after)
        .collect();
    assert_eq!(changed.len(), 1, "exactly one method should change");

    let (before, after) = changed[0];
    assert_eq!(before.name, id.location.method);
    let site = before
        .code
        .iter()
        .zip(&after.code)
        .take_while(|(a, b)| a == b)
        .count();
    assert!(
        matches!(before.code.get(site), Some(Instruction::Return(_))),
        "the first difference should be a return site"
    );
    assert!(
        after.code.ends_with(&before.code[site + 1..]),
        "code after the site should be untouched"
    );
    assert_ne!(before.code, after.code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::fixtures;

    #[test]
    fn fixture_class_obeys_the_laws() {
        let class = fixtures::returns_class();
        let mutater = Mutater::default();
        assert_class_roundtrip(&class);
        assert_analysis_deterministic(&mutater, &class);
        for details in mutater.find_mutations(&class).expect("analysis should succeed") {
            assert_single_site_mutation(&mutater, &class, &details.id);
            assert_bincode_roundtrip(&details);
        }
    }
}
