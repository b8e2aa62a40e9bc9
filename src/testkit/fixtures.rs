//! Ready-made classes for exercising the engine and the worker.

use crate::bytecode::{
    ClassUnit, Condition, Constant, Instruction, Label, MethodDescriptor, MethodRef, MethodUnit,
    NumKind, ReturnKind, SlotKind, TypeDesc,
};
use crate::engine::{Mutater, MutationIdentifier};

/// Class holding one identity method per return kind.
pub const RETURNS_CLASS: &str = "fixture/Returns";
/// Class whose test entry points misbehave once `id` is mutated.
pub const GUARD_CLASS: &str = "fixture/Guard";

/// Parse a descriptor.
pub fn descriptor(text: &str) -> MethodDescriptor {
    text.parse().expect("fixture descriptor should parse")
}

/// Reference to a static method.
pub fn method_ref(owner: &str, name: &str, descriptor_text: &str) -> MethodRef {
    MethodRef::new(owner, name, descriptor(descriptor_text))
}

fn slot_kind(ty: &TypeDesc) -> SlotKind {
    match ty {
        TypeDesc::Long => SlotKind::Num(NumKind::Long),
        TypeDesc::Float => SlotKind::Num(NumKind::Float),
        TypeDesc::Double => SlotKind::Num(NumKind::Double),
        TypeDesc::Object(_) | TypeDesc::Array(_) => SlotKind::Reference,
        _ => SlotKind::Num(NumKind::Int),
    }
}

fn return_kind(ty: &TypeDesc) -> ReturnKind {
    match ty {
        TypeDesc::Void => ReturnKind::Void,
        TypeDesc::Long => ReturnKind::Long,
        TypeDesc::Float => ReturnKind::Float,
        TypeDesc::Double => ReturnKind::Double,
        TypeDesc::Object(_) | TypeDesc::Array(_) => ReturnKind::Reference,
        _ => ReturnKind::Int,
    }
}

/// `return x;` for a one-parameter descriptor, preceded by a line marker.
pub fn identity(name: &str, descriptor_text: &str, line: u32) -> MethodUnit {
    let descriptor = descriptor(descriptor_text);
    let param = descriptor
        .params
        .first()
        .cloned()
        .expect("identity fixture needs one parameter");
    let ret = return_kind(&descriptor.ret);
    MethodUnit::new(
        name,
        descriptor,
        vec![
            Instruction::LineNumber(line),
            Instruction::Load {
                kind: slot_kind(&param),
                slot: 0,
            },
            Instruction::Return(ret),
        ],
    )
}

/// One identity method per return kind, plus a void method with no candidate.
pub fn returns_class() -> ClassUnit {
    ClassUnit::new(RETURNS_CLASS)
        .with_source_file("Returns.src")
        .with_method(identity("ints", "(I)I", 10))
        .with_method(identity("booleans", "(Z)Z", 20))
        .with_method(identity("longs", "(J)J", 30))
        .with_method(identity("floats", "(F)F", 40))
        .with_method(identity("doubles", "(D)D", 50))
        .with_method(identity("integers", "(Llang/Integer;)Llang/Integer;", 60))
        .with_method(identity("flags", "(Llang/Boolean;)Llang/Boolean;", 70))
        .with_method(identity("strings", "(Llang/String;)Llang/String;", 80))
        .with_method(MethodUnit::new(
            "noop",
            descriptor("()V"),
            vec![Instruction::Return(ReturnKind::Void)],
        ))
}

fn load_x() -> Instruction {
    Instruction::Load {
        kind: SlotKind::Num(NumKind::Int),
        slot: 0,
    }
}

/// Prologue shared by the guard methods: `if (id(x) == x) return x;`.
fn guarded(done: Label, body: Vec<Instruction>) -> Vec<Instruction> {
    let mut code = vec![
        load_x(),
        Instruction::InvokeStatic(method_ref(GUARD_CLASS, "id", "(I)I")),
        load_x(),
        Instruction::IfIcmp {
            cond: Condition::Eq,
            target: done,
        },
    ];
    code.extend(body);
    code.extend([
        Instruction::Label(done),
        load_x(),
        Instruction::Return(ReturnKind::Int),
    ]);
    code
}

/// `id(x)` is the identity. When it misbehaves, `wait(x)` spins forever and
/// `hog(x)` pushes `fill` operands before spinning.
pub fn guard_class(fill: i32) -> ClassUnit {
    let wait = guarded(
        Label(0),
        vec![Instruction::Label(Label(1)), Instruction::Goto(Label(1))],
    );
    let hog = guarded(
        Label(0),
        vec![
            Instruction::Push(Constant::Int(0)),
            Instruction::Store {
                kind: SlotKind::Num(NumKind::Int),
                slot: 1,
            },
            Instruction::Label(Label(2)),
            Instruction::Push(Constant::Int(1)),
            Instruction::Load {
                kind: SlotKind::Num(NumKind::Int),
                slot: 1,
            },
            Instruction::Push(Constant::Int(1)),
            Instruction::Add(NumKind::Int),
            Instruction::Dup,
            Instruction::Store {
                kind: SlotKind::Num(NumKind::Int),
                slot: 1,
            },
            Instruction::Push(Constant::Int(fill)),
            Instruction::IfIcmp {
                cond: Condition::Lt,
                target: Label(2),
            },
            Instruction::Label(Label(1)),
            Instruction::Goto(Label(1)),
        ],
    );
    ClassUnit::new(GUARD_CLASS)
        .with_method(identity("id", "(I)I", 1))
        .with_method(MethodUnit::new("wait", descriptor("(I)I"), wait))
        .with_method(MethodUnit::new("hog", descriptor("(I)I"), hog).with_max_locals(2))
}

/// First candidate registered in `method`.
pub fn site(mutater: &Mutater, class: &ClassUnit, method: &str) -> MutationIdentifier {
    mutater
        .find_mutations(class)
        .expect("fixture analysis should succeed")
        .into_iter()
        .find(|details| details.id.location.method == method)
        .map(|details| details.id)
        .expect("fixture method should have a candidate")
}
