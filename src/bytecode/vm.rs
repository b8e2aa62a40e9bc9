//! A small interpreter that plays the host runtime: it loads class units,
//! redefines them in place and executes static methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

use super::codec::{CodecError, decode_class, encode_class};
use super::value::{Object, Value};
use super::{
    BOOLEAN_CLASS, ClassUnit, Condition, INTEGER_CLASS, Instruction, Label, MethodRef, MethodUnit,
    NanOrdering, NumKind, ReturnKind, SlotKind, TypeDesc,
};
use crate::engine::returns::{REPLACER_NAME, REPLACER_OWNER, replace_object_instance};

/// Bytes charged per operand-stack or local slot.
pub const SLOT_BYTES: u64 = 16;
/// Fixed bytes charged per activation.
const FRAME_BYTES: u64 = 64;

/// Runtime errors. Inside a test these play the role of a thrown exception.
#[derive(Debug, Error)]
pub enum VmError {
    /// Class not present in the runtime.
    #[error("class `{0}` is not loaded")]
    NotLoaded(String),
    /// Class already present.
    #[error("class `{0}` is already loaded")]
    AlreadyLoaded(String),
    /// Redefinition refused.
    #[error("cannot redefine `{class}`: {reason}")]
    Incompatible {
        /// Class name.
        class: String,
        /// Why it was refused.
        reason: String,
    },
    /// Class bytes could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Unknown method.
    #[error("no such method `{0}`")]
    NoSuchMethod(String),
    /// Wrong number of arguments for an invocation.
    #[error("`{method}` expects {expected} argument(s), got {found}")]
    WrongArgCount {
        /// Method.
        method: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied count.
        found: usize,
    },
    /// Pop from an empty operand stack.
    #[error("operand stack underflow in `{0}`")]
    StackUnderflow(String),
    /// Operand of the wrong kind.
    #[error("type mismatch in `{method}`: expected {expected}")]
    TypeMismatch {
        /// Method.
        method: String,
        /// What the instruction wanted.
        expected: &'static str,
    },
    /// Local slot out of range or unset.
    #[error("invalid local slot {slot} in `{method}`")]
    BadLocal {
        /// Method.
        method: String,
        /// Slot index.
        slot: u16,
    },
    /// Branch to a label not present in the method.
    #[error("undefined label {label:?} in `{method}`")]
    UndefinedLabel {
        /// Method.
        method: String,
        /// Missing label.
        label: Label,
    },
    /// Failed reference narrowing.
    #[error("cannot cast `{found}` to `{expected}`")]
    ClassCast {
        /// Target type.
        expected: String,
        /// Runtime class.
        found: String,
    },
    /// Null dereference in a native.
    #[error("null reference passed to `{0}`")]
    NullPointer(String),
    /// Call depth limit hit.
    #[error("stack overflow at call depth {0}")]
    StackOverflow(usize),
    /// Heap pool exhausted.
    #[error("out of memory: requested {requested} byte(s) with {used}/{max} in use")]
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes in use before the request.
        used: u64,
        /// Pool capacity.
        max: u64,
    },
    /// Execution ran past the last instruction.
    #[error("execution fell off the end of `{0}`")]
    FellOffEnd(String),
    /// The invocation was cancelled from outside.
    #[error("execution cancelled")]
    Cancelled,
}

/// Interpreter limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Heap pool capacity.
    pub heap_limit_bytes: u64,
    /// Maximum nested invocation depth.
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            heap_limit_bytes: 256 * 1024 * 1024,
            max_call_depth: 1024,
        }
    }
}

/// Shared cancellation flag, checked on every taken branch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Accounted heap with a usage threshold counter.
///
/// The threshold count increments every time usage crosses the threshold
/// upwards, which is what a memory watchdog observes.
#[derive(Debug)]
pub struct HeapPool {
    name: String,
    max: u64,
    used: AtomicU64,
    threshold: AtomicU64,
    threshold_count: AtomicU64,
}

impl HeapPool {
    /// New empty pool.
    pub fn new(name: impl Into<String>, max: u64) -> Self {
        Self {
            name: name.into(),
            max,
            used: AtomicU64::new(0),
            threshold: AtomicU64::new(0),
            threshold_count: AtomicU64::new(0),
        }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes in use.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    /// Capacity.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Set the usage threshold in bytes; `0` disables it.
    pub fn set_usage_threshold(&self, bytes: u64) {
        self.threshold.store(bytes, Ordering::SeqCst);
    }

    /// Number of upward threshold crossings so far.
    pub fn usage_threshold_count(&self) -> u64 {
        self.threshold_count.load(Ordering::SeqCst)
    }

    fn allocate(&self, bytes: u64) -> Result<(), VmError> {
        let before = self.used.fetch_add(bytes, Ordering::SeqCst);
        let after = before.saturating_add(bytes);
        if after > self.max {
            self.used.fetch_sub(bytes, Ordering::SeqCst);
            return Err(VmError::OutOfMemory {
                requested: bytes,
                used: before,
                max: self.max,
            });
        }
        let threshold = self.threshold.load(Ordering::SeqCst);
        if threshold > 0 && before < threshold && after >= threshold {
            self.threshold_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }
}

/// Hook applied to every class on load and on redefinition.
pub trait ClassTransformer: Send + Sync {
    /// Adjust the class in place; return `true` when it was changed.
    fn transform(&self, class: &mut ClassUnit) -> bool;
}

struct PreparedMethod {
    method: MethodUnit,
    labels: HashMap<Label, usize>,
}

impl PreparedMethod {
    fn new(method: MethodUnit) -> Self {
        let labels = method
            .code
            .iter()
            .enumerate()
            .filter_map(|(pc, insn)| match insn {
                Instruction::Label(label) => Some((*label, pc)),
                _ => None,
            })
            .collect();
        Self { method, labels }
    }
}

struct LoadedClass {
    unit: ClassUnit,
    bytes: Vec<u8>,
    methods: HashMap<(String, String), Arc<PreparedMethod>>,
}

impl LoadedClass {
    fn new(unit: ClassUnit, bytes: Vec<u8>) -> Self {
        let methods = unit
            .methods
            .iter()
            .map(|m| {
                (
                    (m.name.clone(), m.descriptor.to_string()),
                    Arc::new(PreparedMethod::new(m.clone())),
                )
            })
            .collect();
        Self {
            unit,
            bytes,
            methods,
        }
    }

    fn signatures(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.methods.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// The interpreter and its loaded-class table.
pub struct Vm {
    options: VmOptions,
    heap: Arc<HeapPool>,
    classes: RwLock<HashMap<String, Arc<LoadedClass>>>,
    transformers: RwLock<Vec<Box<dyn ClassTransformer>>>,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("options", &self.options)
            .field("heap_used", &self.heap.used())
            .field("classes", &self.classes.read().len())
            .finish()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

impl Vm {
    /// Empty runtime.
    pub fn new(options: VmOptions) -> Self {
        Self {
            options,
            heap: Arc::new(HeapPool::new("interpreter heap", options.heap_limit_bytes)),
            classes: RwLock::new(HashMap::new()),
            transformers: RwLock::new(Vec::new()),
        }
    }

    /// Heap pool shared with memory monitors.
    pub fn heap(&self) -> &Arc<HeapPool> {
        &self.heap
    }

    /// Register a transformer for subsequent loads and redefinitions.
    pub fn add_transformer(&self, transformer: Box<dyn ClassTransformer>) {
        self.transformers.write().push(transformer);
    }

    fn apply_transformers(&self, unit: &mut ClassUnit) -> bool {
        let mut changed = false;
        for transformer in self.transformers.read().iter() {
            changed |= transformer.transform(unit);
        }
        changed
    }

    /// Load encoded class bytes, returning the class name.
    pub fn load(&self, bytes: &[u8]) -> Result<String, VmError> {
        let mut unit = decode_class(bytes)?;
        let bytes = if self.apply_transformers(&mut unit) {
            encode_class(&unit)?
        } else {
            bytes.to_vec()
        };
        let name = unit.name.clone();
        let mut classes = self.classes.write();
        if classes.contains_key(&name) {
            return Err(VmError::AlreadyLoaded(name));
        }
        classes.insert(name.clone(), Arc::new(LoadedClass::new(unit, bytes)));
        tracing::debug!(class = %name, "loaded class");
        Ok(name)
    }

    /// Encode and load a class unit.
    pub fn load_class(&self, unit: &ClassUnit) -> Result<String, VmError> {
        self.load(&encode_class(unit)?)
    }

    /// Bytes of the currently installed definition.
    pub fn class_bytes(&self, name: &str) -> Result<Vec<u8>, VmError> {
        self.classes
            .read()
            .get(name)
            .map(|c| c.bytes.clone())
            .ok_or_else(|| VmError::NotLoaded(name.to_string()))
    }

    /// Replace the method bodies of a loaded class without touching any other state.
    ///
    /// The replacement must keep the class name and its exact set of method
    /// signatures; sealed classes are refused.
    pub fn redefine(&self, name: &str, bytes: &[u8]) -> Result<(), VmError> {
        let mut unit = decode_class(bytes)?;
        let bytes = if self.apply_transformers(&mut unit) {
            encode_class(&unit)?
        } else {
            bytes.to_vec()
        };
        let incompatible = |reason: String| VmError::Incompatible {
            class: name.to_string(),
            reason,
        };
        if unit.name != name {
            return Err(incompatible(format!("bytes define `{}`", unit.name)));
        }

        let mut classes = self.classes.write();
        let current = classes
            .get(name)
            .ok_or_else(|| VmError::NotLoaded(name.to_string()))?;
        if current.unit.sealed {
            return Err(incompatible("class is sealed".to_string()));
        }
        let replacement = LoadedClass::new(unit, bytes);
        if replacement.signatures() != current.signatures() {
            return Err(incompatible("method signatures differ".to_string()));
        }
        classes.insert(name.to_string(), Arc::new(replacement));
        tracing::debug!(class = %name, "redefined class");
        Ok(())
    }

    /// Invoke a static method.
    pub fn invoke(
        &self,
        target: &MethodRef,
        args: Vec<Value>,
        cancel: &CancelToken,
    ) -> Result<Option<Value>, VmError> {
        self.call(target, args, 0, cancel)
    }

    fn call(
        &self,
        target: &MethodRef,
        args: Vec<Value>,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<Option<Value>, VmError> {
        if args.len() != target.descriptor.params.len() {
            return Err(VmError::WrongArgCount {
                method: target.to_string(),
                expected: target.descriptor.params.len(),
                found: args.len(),
            });
        }
        if let Some(result) = self.call_native(target, &args) {
            return result;
        }
        if depth >= self.options.max_call_depth {
            return Err(VmError::StackOverflow(depth));
        }
        let method = {
            let classes = self.classes.read();
            let class = classes
                .get(&target.owner)
                .ok_or_else(|| VmError::NotLoaded(target.owner.clone()))?;
            class
                .methods
                .get(&(target.name.clone(), target.descriptor.to_string()))
                .cloned()
                .ok_or_else(|| VmError::NoSuchMethod(target.to_string()))?
        };
        self.execute(&method, target, args, depth, cancel)
    }

    fn call_native(
        &self,
        target: &MethodRef,
        args: &[Value],
    ) -> Option<Result<Option<Value>, VmError>> {
        let mismatch = |expected| VmError::TypeMismatch {
            method: target.to_string(),
            expected,
        };
        let result = match (target.owner.as_str(), target.name.as_str(), args) {
            (INTEGER_CLASS, "valueOf", [Value::Int(v)]) => Ok(Value::boxed_int(*v)),
            (INTEGER_CLASS, "intValue", [Value::Ref(r)]) => match r {
                Some(Object::Integer(v)) => Ok(Value::Int(*v)),
                Some(_) => Err(mismatch("lang/Integer")),
                None => Err(VmError::NullPointer(target.to_string())),
            },
            (BOOLEAN_CLASS, "valueOf", [Value::Int(v)]) => Ok(Value::boxed_bool(*v != 0)),
            (BOOLEAN_CLASS, "booleanValue", [Value::Ref(r)]) => match r {
                Some(Object::Boolean(b)) => Ok(Value::boolean(*b)),
                Some(_) => Err(mismatch("lang/Boolean")),
                None => Err(VmError::NullPointer(target.to_string())),
            },
            (REPLACER_OWNER, REPLACER_NAME, [Value::Ref(object), Value::Ref(class)]) => {
                let declared = match class {
                    Some(Object::Class(declared)) => declared,
                    _ => return Some(Err(mismatch("lang/Class"))),
                };
                if let (Some(object), Some(name)) = (object, declared.internal_name()) {
                    if !object.is_instance_of(&name) {
                        return Some(Err(VmError::ClassCast {
                            expected: name,
                            found: object.class_name().to_string(),
                        }));
                    }
                }
                Ok(Value::Ref(replace_object_instance(object.as_ref(), declared)))
            }
            (INTEGER_CLASS | BOOLEAN_CLASS | REPLACER_OWNER, _, _) => {
                Err(VmError::NoSuchMethod(target.to_string()))
            }
            _ => return None,
        };
        Some(result.map(Some))
    }

    fn execute(
        &self,
        prepared: &PreparedMethod,
        target: &MethodRef,
        args: Vec<Value>,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<Option<Value>, VmError> {
        let name = || target.to_string();
        let mut frame = Frame::new(&self.heap, prepared.method.max_locals, args)?;
        let code = &prepared.method.code;
        let jump = |label: &Label| {
            prepared
                .labels
                .get(label)
                .copied()
                .ok_or_else(|| VmError::UndefinedLabel {
                    method: name(),
                    label: *label,
                })
        };

        let mut pc = 0;
        while let Some(insn) = code.get(pc) {
            let mut next = pc + 1;
            match insn {
                Instruction::Nop | Instruction::LineNumber(_) | Instruction::Label(_) => {}
                Instruction::Push(constant) => frame.push(Value::from_constant(constant))?,
                Instruction::Load { kind, slot } => {
                    let value = frame.local(*slot).ok_or_else(|| VmError::BadLocal {
                        method: name(),
                        slot: *slot,
                    })?;
                    check_slot(*kind, &value, target)?;
                    frame.push(value)?;
                }
                Instruction::Store { kind, slot } => {
                    let value = frame.pop(target)?;
                    check_slot(*kind, &value, target)?;
                    if !frame.set_local(*slot, value)? {
                        return Err(VmError::BadLocal {
                            method: name(),
                            slot: *slot,
                        });
                    }
                }
                Instruction::Dup => {
                    let top = frame.peek(target)?;
                    frame.push(top)?;
                }
                Instruction::Pop => {
                    frame.pop(target)?;
                }
                Instruction::Add(kind) => frame.binary(target, *kind, Arith::Add)?,
                Instruction::Sub(kind) => frame.binary(target, *kind, Arith::Sub)?,
                Instruction::Mul(kind) => frame.binary(target, *kind, Arith::Mul)?,
                Instruction::Neg(kind) => {
                    let value = match (frame.pop(target)?, kind) {
                        (Value::Int(a), NumKind::Int) => Value::Int(a.wrapping_neg()),
                        (Value::Long(a), NumKind::Long) => Value::Long(a.wrapping_neg()),
                        (Value::Float(a), NumKind::Float) => Value::Float(-a),
                        (Value::Double(a), NumKind::Double) => Value::Double(-a),
                        _ => return Err(kind_mismatch(target, *kind)),
                    };
                    frame.push(value)?;
                }
                Instruction::Compare { kind, nan } => {
                    let right = frame.pop(target)?;
                    let left = frame.pop(target)?;
                    let ordering = match (left, right, kind) {
                        (Value::Long(a), Value::Long(b), NumKind::Long) => a.cmp(&b) as i32,
                        (Value::Float(a), Value::Float(b), NumKind::Float) => {
                            float_compare(f64::from(a), f64::from(b), *nan)
                        }
                        (Value::Double(a), Value::Double(b), NumKind::Double) => {
                            float_compare(a, b, *nan)
                        }
                        _ => return Err(kind_mismatch(target, *kind)),
                    };
                    frame.push(Value::Int(ordering))?;
                }
                Instruction::If { cond, target: to } => {
                    let value = frame.pop_int(target)?;
                    if cond.holds(value, 0) {
                        next = jump(to)?;
                    }
                }
                Instruction::IfIcmp { cond, target: to } => {
                    let right = frame.pop_int(target)?;
                    let left = frame.pop_int(target)?;
                    if cond.holds(left, right) {
                        next = jump(to)?;
                    }
                }
                Instruction::IfNull(to) | Instruction::IfNonNull(to) => {
                    let is_null = match frame.pop(target)? {
                        Value::Ref(r) => r.is_none(),
                        _ => {
                            return Err(VmError::TypeMismatch {
                                method: name(),
                                expected: "reference",
                            });
                        }
                    };
                    if is_null == matches!(insn, Instruction::IfNull(_)) {
                        next = jump(to)?;
                    }
                }
                Instruction::Goto(to) => next = jump(to)?,
                Instruction::InvokeStatic(callee) => {
                    let args = frame.pop_n(callee.descriptor.params.len(), target)?;
                    if let Some(result) = self.call(callee, args, depth + 1, cancel)? {
                        frame.push(result)?;
                    }
                }
                Instruction::CheckCast(ty) => {
                    let value = frame.peek(target)?;
                    if !is_assignable(&value, ty) {
                        return Err(VmError::ClassCast {
                            expected: ty.internal_name().unwrap_or_else(|| ty.to_string()),
                            found: match &value {
                                Value::Ref(Some(object)) => object.class_name().to_string(),
                                other => format!("{other:?}"),
                            },
                        });
                    }
                }
                Instruction::Return(ReturnKind::Void) => return Ok(None),
                Instruction::Return(kind) => {
                    let value = frame.pop(target)?;
                    if !value.fits_return(*kind) {
                        return Err(VmError::TypeMismatch {
                            method: name(),
                            expected: "value matching the return instruction",
                        });
                    }
                    return Ok(Some(value));
                }
            }
            if next != pc + 1 && cancel.is_cancelled() {
                return Err(VmError::Cancelled);
            }
            pc = next;
        }
        Err(VmError::FellOffEnd(name()))
    }
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
}

fn float_compare(a: f64, b: f64, nan: NanOrdering) -> i32 {
    if a.is_nan() || b.is_nan() {
        return match nan {
            NanOrdering::Greater => 1,
            NanOrdering::Less => -1,
        };
    }
    if a < b {
        -1
    } else if a > b {
        1
    } else {
        0
    }
}

fn kind_mismatch(target: &MethodRef, kind: NumKind) -> VmError {
    VmError::TypeMismatch {
        method: target.to_string(),
        expected: match kind {
            NumKind::Int => "int operands",
            NumKind::Long => "long operands",
            NumKind::Float => "float operands",
            NumKind::Double => "double operands",
        },
    }
}

fn check_slot(kind: SlotKind, value: &Value, target: &MethodRef) -> Result<(), VmError> {
    let ok = match kind {
        SlotKind::Num(num) => value.num_kind() == Some(num),
        SlotKind::Reference => matches!(value, Value::Ref(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(VmError::TypeMismatch {
            method: target.to_string(),
            expected: "slot of the declared kind",
        })
    }
}

/// One activation. Every byte charged to the heap is released on drop.
struct Frame<'h> {
    heap: &'h HeapPool,
    charged: u64,
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
}

impl<'h> Frame<'h> {
    fn new(heap: &'h HeapPool, max_locals: u16, args: Vec<Value>) -> Result<Self, VmError> {
        let slots = usize::from(max_locals).max(args.len());
        let payload: u64 = args.iter().map(|v| v.footprint() - SLOT_BYTES).sum();
        let bytes = FRAME_BYTES + SLOT_BYTES * slots as u64 + payload;
        heap.allocate(bytes)?;
        let mut locals: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        locals.resize(slots, None);
        Ok(Self {
            heap,
            charged: bytes,
            stack: Vec::new(),
            locals,
        })
    }

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        let bytes = value.footprint();
        self.heap.allocate(bytes)?;
        self.charged += bytes;
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, target: &MethodRef) -> Result<Value, VmError> {
        let value = self
            .stack
            .pop()
            .ok_or_else(|| VmError::StackUnderflow(target.to_string()))?;
        let bytes = value.footprint();
        self.heap.release(bytes);
        self.charged -= bytes;
        Ok(value)
    }

    fn pop_int(&mut self, target: &MethodRef) -> Result<i32, VmError> {
        match self.pop(target)? {
            Value::Int(v) => Ok(v),
            _ => Err(kind_mismatch(target, NumKind::Int)),
        }
    }

    fn pop_n(&mut self, n: usize, target: &MethodRef) -> Result<Vec<Value>, VmError> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.pop(target)?);
        }
        values.reverse();
        Ok(values)
    }

    fn peek(&self, target: &MethodRef) -> Result<Value, VmError> {
        self.stack
            .last()
            .cloned()
            .ok_or_else(|| VmError::StackUnderflow(target.to_string()))
    }

    fn local(&self, slot: u16) -> Option<Value> {
        self.locals.get(usize::from(slot)).cloned().flatten()
    }

    fn set_local(&mut self, slot: u16, value: Value) -> Result<bool, VmError> {
        let Some(entry) = self.locals.get_mut(usize::from(slot)) else {
            return Ok(false);
        };
        // Slot cost is prepaid; only object payloads are charged here.
        let new_extra = value.footprint() - SLOT_BYTES;
        self.heap.allocate(new_extra)?;
        if let Some(old) = entry.replace(value) {
            let old_extra = old.footprint() - SLOT_BYTES;
            self.heap.release(old_extra);
            self.charged -= old_extra;
        }
        self.charged += new_extra;
        Ok(true)
    }

    fn binary(&mut self, target: &MethodRef, kind: NumKind, op: Arith) -> Result<(), VmError> {
        let right = self.pop(target)?;
        let left = self.pop(target)?;
        let value = match (left, right, kind) {
            (Value::Int(a), Value::Int(b), NumKind::Int) => Value::Int(match op {
                Arith::Add => a.wrapping_add(b),
                Arith::Sub => a.wrapping_sub(b),
                Arith::Mul => a.wrapping_mul(b),
            }),
            (Value::Long(a), Value::Long(b), NumKind::Long) => Value::Long(match op {
                Arith::Add => a.wrapping_add(b),
                Arith::Sub => a.wrapping_sub(b),
                Arith::Mul => a.wrapping_mul(b),
            }),
            (Value::Float(a), Value::Float(b), NumKind::Float) => Value::Float(match op {
                Arith::Add => a + b,
                Arith::Sub => a - b,
                Arith::Mul => a * b,
            }),
            (Value::Double(a), Value::Double(b), NumKind::Double) => Value::Double(match op {
                Arith::Add => a + b,
                Arith::Sub => a - b,
                Arith::Mul => a * b,
            }),
            _ => return Err(kind_mismatch(target, kind)),
        };
        self.push(value)
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.heap.release(self.charged);
    }
}

/// Whether `value` survives a `CheckCast` to `ty`. Null narrows to any reference type.
pub fn is_assignable(value: &Value, ty: &TypeDesc) -> bool {
    match (value, ty.internal_name()) {
        (Value::Ref(None), Some(_)) => true,
        (Value::Ref(Some(object)), Some(name)) => object.is_instance_of(&name),
        _ => false,
    }
}
