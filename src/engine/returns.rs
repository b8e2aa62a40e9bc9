//! Return-value mutation operator.
//!
//! Every non-void return registers one candidate. Selected candidates are
//! replaced with a type-compatible sequence returning a different value:
//!
//! | return kind         | replacement                      |
//! |---------------------|----------------------------------|
//! | boolean/byte/short/int | `x == 1 ? 0 : x + 1`          |
//! | long                | `x + 1`                          |
//! | float/double        | `isNaN(x) ? -1 : -(x + 1)`       |
//! | object reference    | [`replace_object_instance`]      |
//!
//! `-(NaN + 1)` is still NaN, so the float kinds detect NaN first with a
//! self-compare (`x cmpg x` is non-zero only for NaN) and substitute `0`
//! before the shared `-(x + 1)` tail.

use super::EngineError;
use super::context::MutationContext;
use super::identifier::MutationIdentifier;
use super::operator::{MethodInfo, MethodMutator, MethodWriter};
use crate::bytecode::{
    BOOLEAN_CLASS, CLASS_CLASS, Condition, Constant, INTEGER_CLASS, Instruction, MethodDescriptor,
    MethodRef, NanOrdering, NumKind, OBJECT_CLASS, Object, ReturnKind, TypeDesc,
};

/// Owner of the object-reference replacement native.
pub const REPLACER_OWNER: &str = "bytemut/ReturnValues";
/// Name of the object-reference replacement native.
pub const REPLACER_NAME: &str = "mutateObjectInstance";

const INTEGER_KIND: &str = "primitive boolean/byte/short/integer";
const INTEGER_FORMULA: &str = "(x == 1) ? 0 : x + 1";
const LONG_KIND: &str = "primitive long";
const LONG_FORMULA: &str = "x + 1";
const FLOAT_KIND: &str = "primitive float";
const DOUBLE_KIND: &str = "primitive double";
const FLOATING_FORMULA: &str = "(x != NaN)? -(x + 1) : -1";
const OBJECT_KIND: &str = "object reference";
const OBJECT_FORMULA: &str = "[see docs for details]";

/// Description recorded for a return site.
pub fn describe(kind: &str, formula: &str) -> String {
    format!("replaced return of {kind} value with {formula}")
}

/// Reference to the replacement native, `(Object, Class) -> Object`.
pub fn replacer_ref() -> MethodRef {
    MethodRef::new(
        REPLACER_OWNER,
        REPLACER_NAME,
        MethodDescriptor::new(
            vec![TypeDesc::object(OBJECT_CLASS), TypeDesc::object(CLASS_CLASS)],
            TypeDesc::object(OBJECT_CLASS),
        ),
    )
}

/// Replace a returned reference according to its declared type.
///
/// `value` may be null and is an instance of `declared` or one of its
/// subtypes. The result is always an instance of `declared` or null:
/// - boxed boolean: `TRUE` becomes `FALSE`, anything else becomes `TRUE`;
/// - boxed integer: null becomes `1`, `1` becomes `0`, otherwise `x + 1`;
/// - any other type: null.
pub fn replace_object_instance(value: Option<&Object>, declared: &TypeDesc) -> Option<Object> {
    match declared.internal_name().as_deref() {
        Some(BOOLEAN_CLASS) => Some(Object::Boolean(!matches!(
            value,
            Some(Object::Boolean(true))
        ))),
        Some(INTEGER_CLASS) => match value {
            None => Some(Object::Integer(1)),
            Some(Object::Integer(1)) => Some(Object::Integer(0)),
            Some(Object::Integer(v)) => Some(Object::Integer(v.wrapping_add(1))),
            // Not an instance of the declared wrapper.
            Some(_) => None,
        },
        _ => None,
    }
}

/// The return-value operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReturnValuesMutator;

impl ReturnValuesMutator {
    /// Operator id.
    pub const ID: &'static str = "bytemut.ReturnValuesMutator";

    fn resolve_reference_type(method: &MethodInfo) -> Result<TypeDesc, EngineError> {
        let declared = method.return_type();
        match declared.internal_name() {
            Some(_) => Ok(declared.clone()),
            None => Err(EngineError::UnresolvableReturnType {
                class: method.owner.clone(),
                method: format!("{}{}", method.name, method.descriptor),
            }),
        }
    }

    fn integer_sequence(out: &mut MethodWriter) {
        let one = out.new_label();
        out.emit_all([
            Instruction::Dup,
            Instruction::Push(Constant::Int(1)),
            Instruction::IfIcmp {
                cond: Condition::Eq,
                target: one,
            },
            Instruction::Push(Constant::Int(1)),
            Instruction::Add(NumKind::Int),
            Instruction::Return(ReturnKind::Int),
            Instruction::Label(one),
            Instruction::Push(Constant::Int(0)),
            Instruction::Return(ReturnKind::Int),
        ]);
    }

    fn floating_sequence(out: &mut MethodWriter, kind: NumKind) {
        let (zero, one, ret) = match kind {
            NumKind::Float => (
                Constant::Float(0.0),
                Constant::Float(1.0),
                ReturnKind::Float,
            ),
            _ => (
                Constant::Double(0.0),
                Constant::Double(1.0),
                ReturnKind::Double,
            ),
        };
        let not_nan = out.new_label();
        out.emit_all([
            Instruction::Dup,
            Instruction::Dup,
            Instruction::Compare {
                kind,
                nan: NanOrdering::Greater,
            },
            Instruction::If {
                cond: Condition::Eq,
                target: not_nan,
            },
            Instruction::Pop,
            Instruction::Push(zero),
            // NaN falls through to here with 0 on the stack.
            Instruction::Label(not_nan),
            Instruction::Push(one),
            Instruction::Add(kind),
            Instruction::Neg(kind),
            Instruction::Return(ret),
        ]);
    }
}

impl MethodMutator for ReturnValuesMutator {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn claims(&self, insn: &Instruction) -> bool {
        matches!(insn, Instruction::Return(kind) if *kind != ReturnKind::Void)
    }

    fn register(
        &self,
        insn: &Instruction,
        method: &MethodInfo,
        context: &mut MutationContext,
    ) -> Result<Option<MutationIdentifier>, EngineError> {
        let (kind, formula) = match insn {
            Instruction::Return(ReturnKind::Int) => (INTEGER_KIND, INTEGER_FORMULA),
            Instruction::Return(ReturnKind::Long) => (LONG_KIND, LONG_FORMULA),
            Instruction::Return(ReturnKind::Float) => (FLOAT_KIND, FLOATING_FORMULA),
            Instruction::Return(ReturnKind::Double) => (DOUBLE_KIND, FLOATING_FORMULA),
            Instruction::Return(ReturnKind::Reference) => {
                Self::resolve_reference_type(method)?;
                (OBJECT_KIND, OBJECT_FORMULA)
            }
            _ => return Ok(None),
        };
        let id = context.register_mutation(Self::ID, describe(kind, formula));
        Ok(context.should_mutate(&id).then_some(id))
    }

    fn rewrite(
        &self,
        insn: &Instruction,
        method: &MethodInfo,
        out: &mut MethodWriter,
    ) -> Result<(), EngineError> {
        match insn {
            Instruction::Return(ReturnKind::Int) => Self::integer_sequence(out),
            Instruction::Return(ReturnKind::Long) => out.emit_all([
                Instruction::Push(Constant::Long(1)),
                Instruction::Add(NumKind::Long),
                Instruction::Return(ReturnKind::Long),
            ]),
            Instruction::Return(ReturnKind::Float) => Self::floating_sequence(out, NumKind::Float),
            Instruction::Return(ReturnKind::Double) => {
                Self::floating_sequence(out, NumKind::Double)
            }
            Instruction::Return(ReturnKind::Reference) => {
                let declared = Self::resolve_reference_type(method)?;
                out.emit_all([
                    Instruction::Push(Constant::Class(declared.clone())),
                    Instruction::InvokeStatic(replacer_ref()),
                    Instruction::CheckCast(declared),
                    Instruction::Return(ReturnKind::Reference),
                ]);
            }
            other => out.emit(other.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::STRING_CLASS;
    use crate::engine::context::Selector;

    fn info(descriptor: &str) -> MethodInfo {
        MethodInfo {
            owner: "demo/A".to_string(),
            name: "f".to_string(),
            descriptor: descriptor.parse().expect("descriptor should parse"),
        }
    }

    #[test]
    fn object_replacement_follows_declared_type() {
        let boolean = TypeDesc::object(BOOLEAN_CLASS);
        let integer = TypeDesc::object(INTEGER_CLASS);
        let string = TypeDesc::object(STRING_CLASS);

        assert_eq!(
            replace_object_instance(Some(&Object::Boolean(true)), &boolean),
            Some(Object::Boolean(false))
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Boolean(false)), &boolean),
            Some(Object::Boolean(true))
        );
        assert_eq!(
            replace_object_instance(None, &boolean),
            Some(Object::Boolean(true))
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Integer(5)), &integer),
            Some(Object::Integer(6))
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Integer(1)), &integer),
            Some(Object::Integer(0))
        );
        assert_eq!(
            replace_object_instance(None, &integer),
            Some(Object::Integer(1))
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Integer(i32::MAX)), &integer),
            Some(Object::Integer(i32::MIN))
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Str("hello".into())), &string),
            None
        );
        assert_eq!(
            replace_object_instance(Some(&Object::Integer(5)), &TypeDesc::object(OBJECT_CLASS)),
            None
        );
    }

    #[test]
    fn descriptions_name_the_kind_and_formula() {
        let mut ctx = MutationContext::new("demo/A", None, Selector::Nothing);
        let method = info("(I)I");
        ctx.enter_method(&method.name, &method.descriptor);
        let selected = ReturnValuesMutator
            .register(&Instruction::Return(ReturnKind::Int), &method, &mut ctx)
            .expect("registration should succeed");
        assert!(selected.is_none());
        assert_eq!(
            ctx.found()[0].description(),
            "replaced return of primitive boolean/byte/short/integer value with (x == 1) ? 0 : x + 1"
        );
    }

    #[test]
    fn void_returns_are_not_claimed() {
        assert!(!ReturnValuesMutator.claims(&Instruction::Return(ReturnKind::Void)));
        assert!(ReturnValuesMutator.claims(&Instruction::Return(ReturnKind::Double)));
        assert!(!ReturnValuesMutator.claims(&Instruction::Pop));
    }

    #[test]
    fn unresolvable_reference_type_fails_loudly() {
        let mut ctx = MutationContext::new("demo/A", None, Selector::Nothing);
        let method = info("()I");
        ctx.enter_method(&method.name, &method.descriptor);
        let err = ReturnValuesMutator
            .register(&Instruction::Return(ReturnKind::Reference), &method, &mut ctx)
            .expect_err("primitive declared type cannot back an object return");
        assert!(matches!(err, EngineError::UnresolvableReturnType { .. }));
        assert!(ctx.found().is_empty());
    }

    #[test]
    fn reference_rewrite_narrows_back_to_declared_type() {
        let method = info("()Llang/Integer;");
        let mut out = MethodWriter::for_method(&[]);
        ReturnValuesMutator
            .rewrite(&Instruction::Return(ReturnKind::Reference), &method, &mut out)
            .expect("rewrite should succeed");
        assert_eq!(
            out.code(),
            &[
                Instruction::Push(Constant::Class(TypeDesc::object(INTEGER_CLASS))),
                Instruction::InvokeStatic(replacer_ref()),
                Instruction::CheckCast(TypeDesc::object(INTEGER_CLASS)),
                Instruction::Return(ReturnKind::Reference),
            ]
        );
    }
}
