//! Stack-based intermediate code: types, instructions and class units.
//!
//! Every value occupies exactly one operand-stack slot, whatever its width.

pub mod codec;
pub mod value;
pub mod vm;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{CodecError, decode_class, encode_class};
pub use value::{Object, Value};
pub use vm::{CancelToken, HeapPool, Vm, VmError, VmOptions};

/// Internal name of the boxed boolean type.
pub const BOOLEAN_CLASS: &str = "lang/Boolean";
/// Internal name of the boxed integer type.
pub const INTEGER_CLASS: &str = "lang/Integer";
/// Internal name of the string type.
pub const STRING_CLASS: &str = "lang/String";
/// Internal name of the root reference type.
pub const OBJECT_CLASS: &str = "lang/Object";
/// Internal name of the type-literal type.
pub const CLASS_CLASS: &str = "lang/Class";

/// Static type of a value, local, parameter or return.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `V`
    Void,
    /// `L<internal name>;`
    Object(String),
    /// `[<element>`
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Shorthand for an object type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }

    /// True for object and array types.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    /// Internal name used by `CheckCast`, if this is a reference type.
    pub fn internal_name(&self) -> Option<String> {
        match self {
            Self::Object(name) if !name.is_empty() => Some(name.clone()),
            Self::Array(_) => Some(self.to_string()),
            _ => None,
        }
    }

    fn parse_prefix(input: &str) -> Result<(TypeDesc, &str), DescriptorError> {
        let mut chars = input.chars();
        let head = chars
            .next()
            .ok_or_else(|| DescriptorError::Truncated(input.to_string()))?;
        let rest = chars.as_str();
        let desc = match head {
            'Z' => TypeDesc::Boolean,
            'B' => TypeDesc::Byte,
            'C' => TypeDesc::Char,
            'S' => TypeDesc::Short,
            'I' => TypeDesc::Int,
            'J' => TypeDesc::Long,
            'F' => TypeDesc::Float,
            'D' => TypeDesc::Double,
            'V' => TypeDesc::Void,
            'L' => {
                let end = rest
                    .find(';')
                    .ok_or_else(|| DescriptorError::Truncated(input.to_string()))?;
                return Ok((TypeDesc::Object(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (element, rest) = Self::parse_prefix(rest)?;
                return Ok((TypeDesc::Array(Box::new(element)), rest));
            }
            other => return Err(DescriptorError::UnknownTag(other)),
        };
        Ok((desc, rest))
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("Z"),
            Self::Byte => f.write_str("B"),
            Self::Char => f.write_str("C"),
            Self::Short => f.write_str("S"),
            Self::Int => f.write_str("I"),
            Self::Long => f.write_str("J"),
            Self::Float => f.write_str("F"),
            Self::Double => f.write_str("D"),
            Self::Void => f.write_str("V"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(element) => write!(f, "[{element}"),
        }
    }
}

impl FromStr for TypeDesc {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (desc, rest) = Self::parse_prefix(s)?;
        if !rest.is_empty() {
            return Err(DescriptorError::Trailing(rest.to_string()));
        }
        Ok(desc)
    }
}

/// Descriptor parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Descriptor ended early.
    #[error("truncated descriptor `{0}`")]
    Truncated(String),
    /// Unknown type tag.
    #[error("unknown descriptor tag `{0}`")]
    UnknownTag(char),
    /// Unparsed characters remained.
    #[error("trailing characters `{0}` in descriptor")]
    Trailing(String),
    /// Method descriptor did not start with `(`.
    #[error("method descriptor must start with `(`: `{0}`")]
    NotAMethod(String),
}

/// `(params)ret` method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Parameter types in order.
    pub params: Vec<TypeDesc>,
    /// Declared return type.
    pub ret: TypeDesc,
}

impl MethodDescriptor {
    /// Build a descriptor from parts.
    pub fn new(params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        Self { params, ret }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl FromStr for MethodDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s
            .strip_prefix('(')
            .ok_or_else(|| DescriptorError::NotAMethod(s.to_string()))?;
        let mut params = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            let (param, after) = TypeDesc::parse_prefix(rest)?;
            params.push(param);
            rest = after;
        }
        let ret: TypeDesc = rest.parse()?;
        Ok(Self { params, ret })
    }
}

/// Fully qualified static method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Owning class internal name.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Signature.
    pub descriptor: MethodDescriptor,
}

impl MethodRef {
    /// Build a reference.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: MethodDescriptor,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Jump target marker, unique within one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub u32);

/// Operand kind for loads, stores and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumKind {
    /// 32-bit integer family.
    Int,
    /// 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
}

/// Load/store slot kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// Numeric slot.
    Num(NumKind),
    /// Reference slot.
    Reference,
}

/// Result of comparing a NaN operand in `Compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NanOrdering {
    /// NaN compares as `1` (`fcmpg`/`dcmpg`).
    Greater,
    /// NaN compares as `-1` (`fcmpl`/`dcmpl`).
    Less,
}

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
}

impl Condition {
    /// Evaluate `left <cond> right`.
    pub fn holds(self, left: i32, right: i32) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Le => left <= right,
        }
    }
}

/// Return instruction flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnKind {
    /// boolean/byte/char/short/int (`ireturn`).
    Int,
    /// `lreturn`
    Long,
    /// `freturn`
    Float,
    /// `dreturn`
    Double,
    /// `areturn`
    Reference,
    /// `return`
    Void,
}

/// Constant pushed by `Push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// Integer-family constant.
    Int(i32),
    /// Long constant.
    Long(i64),
    /// Float constant.
    Float(f32),
    /// Double constant.
    Double(f64),
    /// The null reference.
    Null,
    /// String literal.
    Str(String),
    /// Type literal.
    Class(TypeDesc),
}

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation.
    Nop,
    /// Source line attribution for the following instructions.
    LineNumber(u32),
    /// Jump target.
    Label(Label),
    /// Push a constant.
    Push(Constant),
    /// Push a local slot.
    Load {
        /// Expected slot kind.
        kind: SlotKind,
        /// Slot index.
        slot: u16,
    },
    /// Pop into a local slot.
    Store {
        /// Expected slot kind.
        kind: SlotKind,
        /// Slot index.
        slot: u16,
    },
    /// Duplicate the top value.
    Dup,
    /// Discard the top value.
    Pop,
    /// `a + b`
    Add(NumKind),
    /// `a - b`
    Sub(NumKind),
    /// `a * b`
    Mul(NumKind),
    /// `-a`
    Neg(NumKind),
    /// Three-way compare pushing `-1`, `0` or `1`.
    Compare {
        /// Operand kind; `Int` is rejected.
        kind: NumKind,
        /// NaN treatment for float kinds.
        nan: NanOrdering,
    },
    /// Branch when `value <cond> 0`.
    If {
        /// Condition.
        cond: Condition,
        /// Target.
        target: Label,
    },
    /// Branch when `a <cond> b`.
    IfIcmp {
        /// Condition.
        cond: Condition,
        /// Target.
        target: Label,
    },
    /// Branch when the reference is null.
    IfNull(Label),
    /// Branch when the reference is not null.
    IfNonNull(Label),
    /// Unconditional branch.
    Goto(Label),
    /// Call a static method or native.
    InvokeStatic(MethodRef),
    /// Narrow a reference, failing on incompatible objects.
    CheckCast(TypeDesc),
    /// Return from the method.
    Return(ReturnKind),
}

impl Instruction {
    /// Jump target referenced by this instruction, if any.
    pub fn branch_target(&self) -> Option<Label> {
        match self {
            Self::If { target, .. } | Self::IfIcmp { target, .. } => Some(*target),
            Self::IfNull(target) | Self::IfNonNull(target) | Self::Goto(target) => Some(*target),
            _ => None,
        }
    }
}

/// One method of a class unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodUnit {
    /// Method name.
    pub name: String,
    /// Signature.
    pub descriptor: MethodDescriptor,
    /// Number of local slots, including parameters.
    pub max_locals: u16,
    /// Instruction stream.
    pub code: Vec<Instruction>,
}

impl MethodUnit {
    /// Build a method whose locals are exactly its parameters.
    pub fn new(
        name: impl Into<String>,
        descriptor: MethodDescriptor,
        code: Vec<Instruction>,
    ) -> Self {
        let max_locals = descriptor.params.len() as u16;
        Self {
            name: name.into(),
            descriptor,
            max_locals,
            code,
        }
    }

    /// Override the local slot count.
    pub fn with_max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = max_locals;
        self
    }
}

/// A compilation unit: the granule of analysis and of redefinition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassUnit {
    /// Internal name.
    pub name: String,
    /// Source file for reporting.
    pub source_file: Option<String>,
    /// Sealed classes are refused by redefinition unless a transformer clears the flag.
    pub sealed: bool,
    /// Methods in declaration order.
    pub methods: Vec<MethodUnit>,
}

impl ClassUnit {
    /// Empty, unsealed class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_file: None,
            sealed: false,
            methods: Vec::new(),
        }
    }

    /// Set the source file.
    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    /// Set the sealed flag.
    pub fn sealed(mut self, sealed: bool) -> Self {
        self.sealed = sealed;
        self
    }

    /// Append a method.
    pub fn with_method(mut self, method: MethodUnit) -> Self {
        self.methods.push(method);
        self
    }

    /// Find a method by name and descriptor.
    pub fn method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&MethodUnit> {
        self.methods
            .iter()
            .find(|m| m.name == name && &m.descriptor == descriptor)
    }
}
