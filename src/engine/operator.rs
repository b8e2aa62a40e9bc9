//! Operator contract.

use super::EngineError;
use super::context::MutationContext;
use crate::bytecode::{Instruction, Label, MethodDescriptor, MethodUnit, TypeDesc};

/// Static facts about the method being rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Owning class.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Signature.
    pub descriptor: MethodDescriptor,
}

impl MethodInfo {
    /// Info for a method of `owner`.
    pub fn of(owner: &str, method: &MethodUnit) -> Self {
        Self {
            owner: owner.to_string(),
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
        }
    }

    /// Declared return type.
    pub fn return_type(&self) -> &TypeDesc {
        &self.descriptor.ret
    }
}

/// Output side of a rewrite: collects instructions and hands out fresh labels.
#[derive(Debug)]
pub struct MethodWriter {
    code: Vec<Instruction>,
    next_label: u32,
}

impl MethodWriter {
    /// Writer whose fresh labels never collide with labels in `original`.
    pub fn for_method(original: &[Instruction]) -> Self {
        let next_label = original
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Label(Label(n)) => Some(n + 1),
                _ => insn.branch_target().map(|Label(n)| n + 1),
            })
            .max()
            .unwrap_or(0);
        Self {
            code: Vec::with_capacity(original.len()),
            next_label,
        }
    }

    /// Allocate an unused label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Append one instruction.
    pub fn emit(&mut self, insn: Instruction) {
        self.code.push(insn);
    }

    /// Append several instructions.
    pub fn emit_all(&mut self, insns: impl IntoIterator<Item = Instruction>) {
        self.code.extend(insns);
    }

    /// Instructions written so far.
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Finish writing.
    pub fn into_code(self) -> Vec<Instruction> {
        self.code
    }
}

/// A mutation operator: claims instruction kinds, registers candidates and
/// emits replacements for the selected ones.
pub trait MethodMutator: Send + Sync {
    /// Globally unique operator id, recorded in every identifier it produces.
    fn id(&self) -> &'static str;

    /// Whether this operator handles `insn`.
    fn claims(&self, insn: &Instruction) -> bool;

    /// Register a candidate for a claimed instruction.
    ///
    /// Returns `Some(id)` when the candidate is selected and `rewrite` must be
    /// called, `None` otherwise. Registration must happen whatever the outcome.
    fn register(
        &self,
        insn: &Instruction,
        method: &MethodInfo,
        context: &mut MutationContext,
    ) -> Result<Option<super::MutationIdentifier>, EngineError>;

    /// Emit the replacement for a selected candidate.
    fn rewrite(
        &self,
        insn: &Instruction,
        method: &MethodInfo,
        out: &mut MethodWriter,
    ) -> Result<(), EngineError>;
}
