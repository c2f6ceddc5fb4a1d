//! Attributes attached to types, fields and methods.

/// Marks a type whose binary representation is supplied by the target
/// platform instead of being laid out from its fields.
///
/// The SPIR-V target name is a backtick-separated shape, e.g.
/// ``OpTypeFloat`32`` or ``OpTypeVector`System.Float32`3``.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlatformDependentTypeRepresentation {
    pub spirv_target_name: Option<String>,
}

/// Where the storage backing a static field lives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldStorage {
    #[default]
    Private,
    Input,
    Output,
    Uniform,
    StorageBuffer,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NeslAttribute {
    PlatformDependentTypeRepresentation(PlatformDependentTypeRepresentation),
    /// Method without an implicit receiver, or a field backed by global storage.
    Static,
    Storage(FieldStorage),
    Location(u32),
}

impl NeslAttribute {
    /// Shorthand for a platform representation with a SPIR-V target name.
    pub fn spirv_representation(name: impl Into<String>) -> Self {
        NeslAttribute::PlatformDependentTypeRepresentation(PlatformDependentTypeRepresentation {
            spirv_target_name: Some(name.into()),
        })
    }
}

pub(crate) fn has_static(attributes: &[NeslAttribute]) -> bool {
    attributes.iter().any(|a| matches!(a, NeslAttribute::Static))
}
