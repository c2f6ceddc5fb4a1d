//! NESL IR - Front-end model consumed by the SPIR-V backend
//!
//! This crate contains the data the backend reads but never produces:
//! - Typed ids for types, fields and methods
//! - Attributes (platform representation, static, storage, location)
//! - The immutable [`NeslAssembly`] arena and its entry points
//! - IL containers with big-endian operand tails
//!
//! # Local Slots
//!
//! IL instructions address values through local slots. Slots `0..n` are the
//! effective parameters of a method (the implicit receiver first, for
//! non-static methods), followed by the declared locals. [`NO_SLOT`]
//! encodes an absent binding.

mod assembly;
mod attributes;
mod builder;
mod ids;
mod il;

pub use assembly::{
    ExecutionModel, NeslAssembly, NeslEntryPoint, NeslField, NeslMethod, NeslType, NeslTypeKind,
};
pub use attributes::{FieldStorage, NeslAttribute, PlatformDependentTypeRepresentation};
pub use builder::{AssemblyBuilder, MethodBuilder};
pub use ids::{FieldId, MethodId, TypeId};
pub use il::{IlContainer, IlError, Instruction, OpCode, TailReader, NO_SLOT};
