//! Per-class candidate registry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::identifier::{MutationDetails, MutationIdentifier};
use crate::bytecode::MethodDescriptor;

/// Which registered candidates get materialized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selector {
    /// Analysis pass: register everything, rewrite nothing.
    #[default]
    Nothing,
    /// Materialize exactly this candidate.
    Target(MutationIdentifier),
    /// Materialize every candidate whose index is in the set.
    Indices(BTreeSet<usize>),
}

impl Selector {
    fn selects(&self, id: &MutationIdentifier) -> bool {
        match self {
            Self::Nothing => false,
            Self::Target(target) => target == id,
            Self::Indices(indices) => indices.contains(&id.location.index),
        }
    }
}

/// Assigns sequential ids to candidates of one class and answers `should_mutate`.
///
/// Ids depend only on traversal order, so analysing byte-identical input twice
/// yields identical ids.
#[derive(Debug)]
pub struct MutationContext {
    class: String,
    source_file: Option<String>,
    selector: Selector,
    method: Option<(String, MethodDescriptor)>,
    line: Option<u32>,
    next_index: usize,
    found: Vec<MutationDetails>,
}

impl MutationContext {
    /// Context for one analysis of `class`.
    pub fn new(class: impl Into<String>, source_file: Option<String>, selector: Selector) -> Self {
        Self {
            class: class.into(),
            source_file,
            selector,
            method: None,
            line: None,
            next_index: 0,
            found: Vec::new(),
        }
    }

    /// Class being analysed.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Start attributing candidates to a method.
    pub fn enter_method(&mut self, name: &str, descriptor: &MethodDescriptor) {
        self.method = Some((name.to_string(), descriptor.clone()));
        self.line = None;
    }

    /// Record the current source line.
    pub fn register_line(&mut self, line: u32) {
        self.line = Some(line);
    }

    /// Register a candidate at the current position and return its id.
    ///
    /// # Panics
    ///
    /// Panics if called before `enter_method`.
    pub fn register_mutation(
        &mut self,
        mutator: &str,
        description: impl Into<String>,
    ) -> MutationIdentifier {
        let (method, descriptor) = self
            .method
            .as_ref()
            .expect("register_mutation called outside a method");
        let id = MutationIdentifier::new(
            self.class.clone(),
            method.clone(),
            descriptor,
            self.next_index,
            mutator,
            description,
        );
        self.next_index += 1;
        self.found.push(MutationDetails {
            id: id.clone(),
            file: self.source_file.clone(),
            line: self.line,
        });
        id
    }

    /// Whether the candidate should be rewritten in this pass.
    pub fn should_mutate(&self, id: &MutationIdentifier) -> bool {
        self.selector.selects(id)
    }

    /// Candidates registered so far, in registration order.
    pub fn found(&self) -> &[MutationDetails] {
        &self.found
    }

    /// Finish the analysis, yielding every registered candidate.
    pub fn into_found(self) -> Vec<MutationDetails> {
        self.found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> MethodDescriptor {
        "()I".parse().expect("descriptor should parse")
    }

    #[test]
    fn ids_are_sequential_across_methods() {
        let mut ctx = MutationContext::new("demo/A", Some("A.src".into()), Selector::Nothing);
        ctx.enter_method("f", &desc());
        ctx.register_line(10);
        let first = ctx.register_mutation("m", "one");
        ctx.enter_method("g", &desc());
        let second = ctx.register_mutation("m", "two");

        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(second.location.method, "g");
        assert_eq!(ctx.found()[0].line, Some(10));
        assert_eq!(ctx.found()[1].line, None);
        assert_eq!(ctx.found()[1].file.as_deref(), Some("A.src"));
    }

    #[test]
    fn selectors_choose_targets() {
        let mut analysis = MutationContext::new("demo/A", None, Selector::Nothing);
        analysis.enter_method("f", &desc());
        let id = analysis.register_mutation("m", "one");
        assert!(!analysis.should_mutate(&id));

        let mut targeted = MutationContext::new("demo/A", None, Selector::Target(id.clone()));
        targeted.enter_method("f", &desc());
        let again = targeted.register_mutation("m", "one");
        let other = targeted.register_mutation("m", "one");
        assert!(targeted.should_mutate(&again));
        assert!(!targeted.should_mutate(&other));

        let mut by_index =
            MutationContext::new("demo/A", None, Selector::Indices(BTreeSet::from([1])));
        by_index.enter_method("f", &desc());
        let zero = by_index.register_mutation("m", "one");
        let one = by_index.register_mutation("m", "one");
        assert!(!by_index.should_mutate(&zero));
        assert!(by_index.should_mutate(&one));
    }
}
