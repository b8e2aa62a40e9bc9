//! Mutation identity shared by analysis, orchestrator and worker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bytecode::MethodDescriptor;

/// Where a candidate lives: class, method and the unit-wide sequential index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Class internal name.
    pub class: String,
    /// Method name.
    pub method: String,
    /// Method descriptor text.
    pub descriptor: String,
    /// Sequential candidate index within the class.
    pub index: usize,
}

/// Stable key naming one candidate mutation. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationIdentifier {
    /// Site.
    pub location: Location,
    /// Globally unique operator id.
    pub mutator: String,
    /// Human-readable replacement description.
    pub description: String,
}

impl MutationIdentifier {
    /// Build an identifier.
    pub fn new(
        class: impl Into<String>,
        method: impl Into<String>,
        descriptor: &MethodDescriptor,
        index: usize,
        mutator: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            location: Location {
                class: class.into(),
                method: method.into(),
                descriptor: descriptor.to_string(),
                index,
            },
            mutator: mutator.into(),
            description: description.into(),
        }
    }

    /// Class the mutation applies to.
    pub fn class(&self) -> &str {
        &self.location.class
    }

    /// Sequential index within the class.
    pub fn index(&self) -> usize {
        self.location.index
    }
}

impl fmt::Display for MutationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}#{} [{}] {}",
            self.location.class,
            self.location.method,
            self.location.descriptor,
            self.location.index,
            self.mutator,
            self.description
        )
    }
}

/// A discovered candidate with its source attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationDetails {
    /// Identity.
    pub id: MutationIdentifier,
    /// Source file of the class, when known.
    pub file: Option<String>,
    /// Last source line seen before the site, when known.
    pub line: Option<u32>,
}

impl MutationDetails {
    /// Replacement description.
    pub fn description(&self) -> &str {
        &self.id.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_compare_structurally_and_print_readably() {
        let desc: MethodDescriptor = "(I)I".parse().expect("descriptor should parse");
        let a = MutationIdentifier::new("demo/A", "f", &desc, 0, "returns", "x + 1");
        let b = MutationIdentifier::new("demo/A", "f", &desc, 0, "returns", "x + 1");
        let c = MutationIdentifier::new("demo/A", "f", &desc, 1, "returns", "x + 1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "demo/A.f(I)I#0 [returns] x + 1");
    }
}
