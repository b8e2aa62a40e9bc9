//! Mutation operator framework.
//!
//! A [`Mutater`] walks every method of a [`ClassUnit`](crate::bytecode::ClassUnit),
//! lets each operator register candidates with a [`MutationContext`] and
//! rewrites only the candidates the context selects.

pub mod context;
pub mod identifier;
pub mod operator;
pub mod pipeline;
pub mod returns;

use thiserror::Error;

use crate::bytecode::CodecError;

pub use context::{MutationContext, Selector};
pub use identifier::{Location, MutationDetails, MutationIdentifier};
pub use operator::{MethodInfo, MethodMutator, MethodWriter};
pub use pipeline::{EngineConfig, Mutant, Mutater, MutatorKind, Rewrite};
pub use returns::{ReturnValuesMutator, replace_object_instance};

/// Analysis-time errors. Any of them aborts the rewrite of the whole class.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The declared return type cannot back an object-reference replacement.
    #[error("cannot resolve declared return type of `{class}.{method}`")]
    UnresolvableReturnType {
        /// Class.
        class: String,
        /// Method name and descriptor.
        method: String,
    },
    /// The instruction stream is not well formed.
    #[error("malformed method `{class}.{method}`: {reason}")]
    MalformedMethod {
        /// Class.
        class: String,
        /// Method name and descriptor.
        method: String,
        /// What is wrong.
        reason: String,
    },
    /// The identifier does not designate a site of this class.
    #[error("mutation `{0}` not found")]
    MutationNotFound(Box<MutationIdentifier>),
    /// Class bytes could not be read or written.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
