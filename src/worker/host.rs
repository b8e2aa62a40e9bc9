//! Host runtime capability consumed by the worker.

use thiserror::Error;

use crate::bytecode::vm::ClassTransformer;
use crate::bytecode::{CancelToken, ClassUnit, MethodRef, Value, Vm, VmError};

/// Host capability errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// Class not loaded.
    #[error("class `{0}` is not loaded")]
    NotLoaded(String),
    /// The replacement was refused.
    #[error("cannot redefine `{class}`: {reason}")]
    Incompatible {
        /// Class name.
        class: String,
        /// Reason given by the host.
        reason: String,
    },
    /// The invoked code exhausted a memory pool.
    #[error("out of memory: requested {requested} byte(s) with {used}/{max} in use")]
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes in use before the request.
        used: u64,
        /// Pool capacity.
        max: u64,
    },
    /// The invoked code raised.
    #[error("{0}")]
    Raised(String),
}

impl From<VmError> for HostError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::NotLoaded(class) => Self::NotLoaded(class),
            VmError::Incompatible { class, reason } => Self::Incompatible { class, reason },
            VmError::OutOfMemory {
                requested,
                used,
                max,
            } => Self::OutOfMemory {
                requested,
                used,
                max,
            },
            other => Self::Raised(other.to_string()),
        }
    }
}

/// What the worker needs from the process it runs in: read and replace the
/// bytes of a loaded class without restarting, and run test code.
pub trait HostRuntime: Send + Sync {
    /// Bytes of the currently installed definition of `class`.
    fn class_bytes(&self, class: &str) -> Result<Vec<u8>, HostError>;

    /// Replace the method bodies of the already-loaded `class`.
    fn redefine(&self, class: &str, bytes: &[u8]) -> Result<(), HostError>;

    /// Invoke a static method. Must return soon after `cancel` fires.
    fn invoke(
        &self,
        target: &MethodRef,
        args: Vec<Value>,
        cancel: &CancelToken,
    ) -> Result<Option<Value>, HostError>;
}

impl HostRuntime for Vm {
    fn class_bytes(&self, class: &str) -> Result<Vec<u8>, HostError> {
        Ok(Vm::class_bytes(self, class)?)
    }

    fn redefine(&self, class: &str, bytes: &[u8]) -> Result<(), HostError> {
        Ok(Vm::redefine(self, class, bytes)?)
    }

    fn invoke(
        &self,
        target: &MethodRef,
        args: Vec<Value>,
        cancel: &CancelToken,
    ) -> Result<Option<Value>, HostError> {
        Ok(Vm::invoke(self, target, args, cancel)?)
    }
}

/// Generated mock and proxy classes the host would otherwise refuse to redefine.
pub const DEFAULT_PROXY_PATTERNS: &[&str] = &[
    "*$$EnhancerByMockito*",
    "*$MockitoMock$*",
    "*$$EnhancerByCGLIB$$*",
    "*$ByteBuddy$*",
    "*$Proxy*",
];

/// Load-time transformer that unseals generated proxy classes so that
/// redefinition of the classes they wrap keeps working.
#[derive(Debug, Clone)]
pub struct MockSupportShim {
    patterns: Vec<String>,
}

impl Default for MockSupportShim {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_PATTERNS.iter().copied())
    }
}

impl MockSupportShim {
    /// Shim matching class names against `*`-globs.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `class` is a generated proxy.
    pub fn matches(&self, class: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, class))
    }
}

impl ClassTransformer for MockSupportShim {
    fn transform(&self, class: &mut ClassUnit) -> bool {
        if class.sealed && self.matches(&class.name) {
            tracing::debug!(class = %class.name, "unsealing generated proxy");
            class.sealed = false;
            return true;
        }
        false
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globs_match_like_shell_wildcards() {
        assert!(glob_match("*$Proxy*", "demo/Service$Proxy12"));
        assert!(glob_match("demo/*", "demo/A"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "abc"));
        assert!(!glob_match("a*b*c", "acb"));
        assert!(!glob_match("exact", "exact-not"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("ab*ba", "aba"));
    }

    #[test]
    fn shim_unseals_only_proxies() {
        let shim = MockSupportShim::default();
        let mut proxy = ClassUnit::new("demo/Repo$MockitoMock$1234").sealed(true);
        let mut plain = ClassUnit::new("demo/Repo").sealed(true);

        assert!(shim.transform(&mut proxy));
        assert!(!proxy.sealed);
        assert!(!shim.transform(&mut plain));
        assert!(plain.sealed);
        assert!(!shim.transform(&mut proxy));
    }

    #[test]
    fn vm_errors_map_onto_host_errors() {
        assert!(matches!(
            HostError::from(VmError::NotLoaded("x".into())),
            HostError::NotLoaded(_)
        ));
        assert!(matches!(
            HostError::from(VmError::Cancelled),
            HostError::Raised(msg) if msg == "execution cancelled"
        ));
        assert!(matches!(
            HostError::from(VmError::OutOfMemory {
                requested: 16,
                used: 4_090,
                max: 4_096,
            }),
            HostError::OutOfMemory { max: 4_096, .. }
        ));
    }
}
