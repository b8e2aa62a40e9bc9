//! Rewriter pipeline: drives operators over every method of a class.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::EngineError;
use super::context::{MutationContext, Selector};
use super::identifier::{MutationDetails, MutationIdentifier};
use super::operator::{MethodInfo, MethodMutator, MethodWriter};
use super::returns::ReturnValuesMutator;
use crate::bytecode::{ClassUnit, Instruction, MethodUnit, encode_class};

/// Operators that can be named in a serialized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutatorKind {
    /// [`ReturnValuesMutator`].
    ReturnValues,
}

impl MutatorKind {
    /// Every known operator.
    pub fn all() -> Vec<Self> {
        vec![Self::ReturnValues]
    }

    fn create(self) -> Box<dyn MethodMutator> {
        match self {
            Self::ReturnValues => Box::new(ReturnValuesMutator),
        }
    }
}

/// Operator configuration shipped to workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Operators in chain order.
    pub mutators: Vec<MutatorKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mutators: MutatorKind::all(),
        }
    }
}

impl EngineConfig {
    /// Build the pipeline this configuration describes.
    pub fn create_mutater(&self) -> Mutater {
        Mutater::new(self.mutators.iter().map(|kind| kind.create()).collect())
    }
}

/// Output of one pass over a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// The class after rewriting (identical to the input when nothing was selected).
    pub class: ClassUnit,
    /// Every registered candidate, in registration order.
    pub found: Vec<MutationDetails>,
    /// Candidates whose replacement was emitted.
    pub applied: Vec<MutationIdentifier>,
}

/// One materialized mutant.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutant {
    /// The applied candidate.
    pub details: MutationDetails,
    /// Mutated class.
    pub class: ClassUnit,
    /// Encoded mutated class.
    pub bytes: Vec<u8>,
}

/// Chains operators around the instruction stream.
///
/// Per instruction, every claiming operator registers a candidate in chain
/// order; the first selected one emits its replacement and all other
/// instructions pass through unchanged. Line numbers are forwarded as-is and
/// attributed to subsequent candidates.
pub struct Mutater {
    mutators: Vec<Box<dyn MethodMutator>>,
}

impl std::fmt::Debug for Mutater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.mutators.iter().map(|m| m.id()))
            .finish()
    }
}

impl Default for Mutater {
    fn default() -> Self {
        EngineConfig::default().create_mutater()
    }
}

impl Mutater {
    /// Pipeline over the given operators, in chain order.
    pub fn new(mutators: Vec<Box<dyn MethodMutator>>) -> Self {
        Self { mutators }
    }

    /// Run one pass with the given selector.
    pub fn rewrite(&self, class: &ClassUnit, selector: Selector) -> Result<Rewrite, EngineError> {
        let mut context =
            MutationContext::new(class.name.clone(), class.source_file.clone(), selector);
        let mut applied = Vec::new();
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(self.rewrite_method(&class.name, method, &mut context, &mut applied)?);
        }
        Ok(Rewrite {
            class: ClassUnit {
                methods,
                ..class.clone()
            },
            found: context.into_found(),
            applied,
        })
    }

    /// Every candidate in the class, rewriting nothing.
    pub fn find_mutations(&self, class: &ClassUnit) -> Result<Vec<MutationDetails>, EngineError> {
        Ok(self.rewrite(class, Selector::Nothing)?.found)
    }

    /// Materialize exactly the candidate `id`.
    pub fn get_mutation(
        &self,
        class: &ClassUnit,
        id: &MutationIdentifier,
    ) -> Result<Mutant, EngineError> {
        let rewrite = self.rewrite(class, Selector::Target(id.clone()))?;
        let not_found = || EngineError::MutationNotFound(Box::new(id.clone()));
        if rewrite.applied.as_slice() != std::slice::from_ref(id) {
            return Err(not_found());
        }
        let details = rewrite
            .found
            .into_iter()
            .find(|d| &d.id == id)
            .ok_or_else(not_found)?;
        let bytes = encode_class(&rewrite.class)?;
        Ok(Mutant {
            details,
            class: rewrite.class,
            bytes,
        })
    }

    fn rewrite_method(
        &self,
        owner: &str,
        method: &MethodUnit,
        context: &mut MutationContext,
        applied: &mut Vec<MutationIdentifier>,
    ) -> Result<MethodUnit, EngineError> {
        validate_labels(owner, method)?;
        let info = MethodInfo::of(owner, method);
        context.enter_method(&method.name, &method.descriptor);

        let mut out = MethodWriter::for_method(&method.code);
        for insn in &method.code {
            if let Instruction::LineNumber(line) = insn {
                context.register_line(*line);
                out.emit(insn.clone());
                continue;
            }

            let mut chosen: Option<&dyn MethodMutator> = None;
            for mutator in self.mutators.iter().filter(|m| m.claims(insn)) {
                if let Some(id) = mutator.register(insn, &info, context)? {
                    if chosen.is_none() {
                        chosen = Some(&**mutator);
                        applied.push(id);
                    }
                }
            }
            match chosen {
                Some(mutator) => mutator.rewrite(insn, &info, &mut out)?,
                None => out.emit(insn.clone()),
            }
        }

        Ok(MethodUnit {
            code: out.into_code(),
            ..method.clone()
        })
    }
}

fn validate_labels(owner: &str, method: &MethodUnit) -> Result<(), EngineError> {
    let malformed = |reason: String| EngineError::MalformedMethod {
        class: owner.to_string(),
        method: format!("{}{}", method.name, method.descriptor),
        reason,
    };
    let mut defined = HashSet::new();
    for insn in &method.code {
        if let Instruction::Label(label) = insn {
            if !defined.insert(*label) {
                return Err(malformed(format!("label {} defined twice", label.0)));
            }
        }
    }
    for insn in &method.code {
        if let Some(target) = insn.branch_target() {
            if !defined.contains(&target) {
                return Err(malformed(format!("branch to undefined label {}", target.0)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Label, ReturnKind};

    fn class_with(code: Vec<Instruction>) -> ClassUnit {
        ClassUnit::new("demo/A").with_method(MethodUnit::new(
            "f",
            "(I)I".parse().expect("descriptor should parse"),
            code,
        ))
    }

    #[test]
    fn malformed_streams_abort_the_unit() {
        let dangling = class_with(vec![
            Instruction::Goto(Label(4)),
            Instruction::Return(ReturnKind::Int),
        ]);
        assert!(matches!(
            Mutater::default().find_mutations(&dangling),
            Err(EngineError::MalformedMethod { .. })
        ));

        let twice = class_with(vec![
            Instruction::Label(Label(0)),
            Instruction::Label(Label(0)),
            Instruction::Return(ReturnKind::Int),
        ]);
        assert!(matches!(
            Mutater::default().find_mutations(&twice),
            Err(EngineError::MalformedMethod { .. })
        ));
    }

    #[test]
    fn stale_identifiers_are_not_found() {
        let class = class_with(vec![Instruction::Return(ReturnKind::Int)]);
        let mutater = Mutater::default();
        let mut id = mutater.find_mutations(&class).expect("analysis should succeed")[0]
            .id
            .clone();
        id.location.index = 9;
        assert!(matches!(
            mutater.get_mutation(&class, &id),
            Err(EngineError::MutationNotFound(_))
        ));
    }

    #[test]
    fn default_config_names_every_operator() {
        let config = EngineConfig::default();
        assert_eq!(config.mutators, vec![MutatorKind::ReturnValues]);
        assert_eq!(format!("{:?}", config.create_mutater()), "[\"bytemut.ReturnValuesMutator\"]");
    }
}
