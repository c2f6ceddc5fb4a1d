//! Fatal compilation errors.
//!
//! Every variant reflects malformed IR or an incomplete built-in catalog, so
//! none is retried: the first error aborts the run and its partial output.

use nesl_ir::{ExecutionModel, IlError};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("method id {0} is not defined in the assembly")]
    UnresolvedMethod(u64),

    #[error("field id {0} is not defined in the assembly")]
    UnresolvedField(u64),

    #[error("type id {0} is not defined in the assembly")]
    UnresolvedType(u32),

    #[error("`{method}` has no local slot {slot}")]
    UnresolvedSlot { method: String, slot: u32 },

    #[error("`{method}` returns a value from an unbound slot")]
    MissingResultBinding { method: String },

    #[error("malformed IL in `{method}`: {source}")]
    MalformedIl {
        method: String,
        #[source]
        source: IlError,
    },

    #[error("type `{type_name}` has a platform-dependent representation without a SPIR-V target name")]
    MissingSpirVTargetName { type_name: String },

    #[error("type `{type_name}` uses unsupported built-in representation `{representation}`")]
    UnsupportedBuiltInType {
        type_name: String,
        representation: String,
    },

    #[error("cyclic construction of {key}")]
    CyclicConstruction { key: String },

    #[error("construction of {key} failed")]
    ConstructionFailed { key: String },

    #[error("entry point `{method}` has no materialized function")]
    UnreachableEntryPoint { method: String },

    #[error("execution model {0:?} is not supported")]
    UnsupportedExecutionModel(ExecutionModel),

    #[error("call to `{callee}` passes {given} arguments, expected {expected}")]
    ArgumentCountMismatch {
        callee: String,
        given: usize,
        expected: usize,
    },

    #[error("generic parameter `{parameter}` is not bound to a concrete type")]
    UnboundGenericParameter { parameter: String },

    #[error("generic parameter `{parameter}` of `{method}` is bound to two different types")]
    ConflictingGenericBinding { method: String, parameter: String },

    #[error("field `{field}` is not static and has no global storage")]
    NonStaticField { field: String },

    #[error("failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
