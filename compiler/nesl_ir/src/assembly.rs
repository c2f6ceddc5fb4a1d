//! The immutable assembly arena handed to the backend.

use crate::attributes::has_static;
use crate::{
    FieldId, FieldStorage, IlContainer, Instruction, MethodId, NeslAttribute,
    PlatformDependentTypeRepresentation, TypeId,
};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NeslTypeKind {
    Plain,
    /// Placeholder bound to a concrete type at each call site.
    GenericParameter,
}

#[derive(Clone, Debug)]
pub struct NeslType {
    pub id: TypeId,
    pub full_name: String,
    pub kind: NeslTypeKind,
    pub attributes: Vec<NeslAttribute>,
    /// Fields in declaration order.
    pub fields: Vec<FieldId>,
}

impl NeslType {
    pub fn platform_dependent_representation(&self) -> Option<&PlatformDependentTypeRepresentation> {
        self.attributes.iter().find_map(|attribute| match attribute {
            NeslAttribute::PlatformDependentTypeRepresentation(repr) => Some(repr),
            _ => None,
        })
    }

    pub fn is_generic_parameter(&self) -> bool {
        self.kind == NeslTypeKind::GenericParameter
    }
}

#[derive(Clone, Debug)]
pub struct NeslField {
    pub id: FieldId,
    pub owner: TypeId,
    pub name: String,
    pub field_type: TypeId,
    pub attributes: Vec<NeslAttribute>,
}

impl NeslField {
    pub fn is_static(&self) -> bool {
        has_static(&self.attributes)
    }

    pub fn storage(&self) -> FieldStorage {
        self.attributes
            .iter()
            .find_map(|attribute| match attribute {
                NeslAttribute::Storage(storage) => Some(*storage),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn location(&self) -> Option<u32> {
        self.attributes.iter().find_map(|attribute| match attribute {
            NeslAttribute::Location(location) => Some(*location),
            _ => None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NeslMethod {
    pub id: MethodId,
    pub owner: TypeId,
    pub name: String,
    /// `Owner::name`, used as the entry-point name.
    pub full_name: String,
    /// `None` is void.
    pub return_type: Option<TypeId>,
    pub parameter_types: Vec<TypeId>,
    pub local_types: Vec<TypeId>,
    pub attributes: Vec<NeslAttribute>,
    pub il: IlContainer,
}

impl NeslMethod {
    /// Whether the method is invoked without an implicit receiver.
    pub fn is_static(&self) -> bool {
        has_static(&self.attributes)
    }

    /// Parameter types including the implicit receiver.
    pub fn effective_parameter_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        let receiver = (!self.is_static()).then_some(self.owner);
        receiver.into_iter().chain(self.parameter_types.iter().copied())
    }

    pub fn effective_parameter_count(&self) -> usize {
        self.parameter_types.len() + usize::from(!self.is_static())
    }

    /// Declared type of a local slot (parameters first, then locals).
    pub fn slot_type(&self, slot: u32) -> Option<TypeId> {
        let slot = slot as usize;
        let parameters = self.effective_parameter_count();
        if slot < parameters {
            self.effective_parameter_types().nth(slot)
        } else {
            self.local_types.get(slot - parameters).copied()
        }
    }

    pub fn slot_count(&self) -> usize {
        self.effective_parameter_count() + self.local_types.len()
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction<'_>> + '_ {
        self.il.instructions()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    Vertex,
    Fragment,
    GLCompute,
}

/// A method designated as a module-level invocation target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NeslEntryPoint {
    pub method: MethodId,
    pub execution_model: ExecutionModel,
}

impl NeslEntryPoint {
    pub fn new(method: MethodId, execution_model: ExecutionModel) -> Self {
        Self {
            method,
            execution_model,
        }
    }
}

#[derive(Debug)]
pub struct NeslAssembly {
    pub(crate) name: String,
    pub(crate) types: Vec<NeslType>,
    pub(crate) fields: Vec<NeslField>,
    pub(crate) methods: Vec<NeslMethod>,
    pub(crate) type_names: FxHashMap<String, TypeId>,
}

impl NeslAssembly {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_type(&self, id: TypeId) -> Option<&NeslType> {
        self.types.get(id.index())
    }

    pub fn get_field(&self, id: FieldId) -> Option<&NeslField> {
        self.fields.get(id.index())
    }

    pub fn get_method(&self, id: MethodId) -> Option<&NeslMethod> {
        self.methods.get(id.index())
    }

    /// Look up a type by its full name.
    pub fn find_type(&self, full_name: &str) -> Option<&NeslType> {
        self.type_names
            .get(full_name)
            .and_then(|&id| self.get_type(id))
    }

    /// Non-static fields of a type, in declaration order.
    pub fn instance_fields<'a>(
        &'a self,
        owner: &'a NeslType,
    ) -> impl Iterator<Item = &'a NeslField> + 'a {
        owner
            .fields
            .iter()
            .filter_map(|&id| self.get_field(id))
            .filter(|field| !field.is_static())
    }

    pub fn methods(&self) -> impl Iterator<Item = &NeslMethod> + '_ {
        self.methods.iter()
    }
}
