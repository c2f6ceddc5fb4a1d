//! Builders producing a [`NeslAssembly`] and method IL.
//!
//! The front end proper is out of scope for this workspace; the builders are
//! the smallest surface that produces well-formed input for the backend.

use crate::attributes::has_static;
use crate::il::TailWriter;
use crate::{
    FieldId, IlContainer, MethodId, NeslAssembly, NeslAttribute, NeslField, NeslMethod, NeslType,
    NeslTypeKind, OpCode, TypeId, NO_SLOT,
};
use rustc_hash::FxHashMap;

pub struct AssemblyBuilder {
    name: String,
    types: Vec<NeslType>,
    fields: Vec<NeslField>,
    methods: Vec<NeslMethod>,
    type_names: FxHashMap<String, TypeId>,
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "assemblies never approach u32::MAX entities"
)]
fn next_index<T>(items: &[T]) -> u32 {
    items.len() as u32
}

impl AssemblyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            type_names: FxHashMap::default(),
        }
    }

    fn push_type(
        &mut self,
        full_name: String,
        kind: NeslTypeKind,
        attributes: Vec<NeslAttribute>,
    ) -> TypeId {
        let id = TypeId::new(next_index(&self.types));
        self.type_names.insert(full_name.clone(), id);
        self.types.push(NeslType {
            id,
            full_name,
            kind,
            attributes,
            fields: Vec::new(),
        });
        id
    }

    pub fn define_type(
        &mut self,
        full_name: impl Into<String>,
        attributes: impl IntoIterator<Item = NeslAttribute>,
    ) -> TypeId {
        self.push_type(
            full_name.into(),
            NeslTypeKind::Plain,
            attributes.into_iter().collect(),
        )
    }

    pub fn define_generic_parameter(&mut self, name: impl Into<String>) -> TypeId {
        self.push_type(name.into(), NeslTypeKind::GenericParameter, Vec::new())
    }

    /// Declare a field on `owner`. Returns `None` if `owner` was not defined
    /// by this builder.
    pub fn define_field(
        &mut self,
        owner: TypeId,
        name: impl Into<String>,
        field_type: TypeId,
        attributes: impl IntoIterator<Item = NeslAttribute>,
    ) -> Option<FieldId> {
        let id = FieldId::new(next_index(&self.fields));
        self.types.get_mut(owner.index())?.fields.push(id);
        self.fields.push(NeslField {
            id,
            owner,
            name: name.into(),
            field_type,
            attributes: attributes.into_iter().collect(),
        });
        Some(id)
    }

    /// Declare a method; its body is written later through [`Self::method`],
    /// so methods can call each other regardless of declaration order.
    /// Returns `None` if `owner` was not defined by this builder.
    pub fn define_method(
        &mut self,
        owner: TypeId,
        name: impl Into<String>,
        return_type: Option<TypeId>,
        parameter_types: &[TypeId],
        attributes: impl IntoIterator<Item = NeslAttribute>,
    ) -> Option<MethodId> {
        let id = MethodId::new(next_index(&self.methods));
        let name = name.into();
        let full_name = format!("{}::{}", self.types.get(owner.index())?.full_name, name);
        self.methods.push(NeslMethod {
            id,
            owner,
            name,
            full_name,
            return_type,
            parameter_types: parameter_types.to_vec(),
            local_types: Vec::new(),
            attributes: attributes.into_iter().collect(),
            il: IlContainer::new(),
        });
        Some(id)
    }

    /// Body writer for `id`, or `None` if the method is not defined here.
    pub fn method(&mut self, id: MethodId) -> Option<MethodBuilder<'_>> {
        let method = self.methods.get_mut(id.index())?;
        Some(MethodBuilder { method })
    }

    pub fn build(self) -> NeslAssembly {
        NeslAssembly {
            name: self.name,
            types: self.types,
            fields: self.fields,
            methods: self.methods,
            type_names: self.type_names,
        }
    }
}

/// Writes locals and IL for one method.
pub struct MethodBuilder<'a> {
    method: &'a mut NeslMethod,
}

impl MethodBuilder<'_> {
    /// Declare a local and return its slot.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot counts are bounded by method size"
    )]
    pub fn define_variable(&mut self, local_type: TypeId) -> u32 {
        let receiver = usize::from(!has_static(&self.method.attributes));
        let slot = receiver + self.method.parameter_types.len() + self.method.local_types.len();
        self.method.local_types.push(local_type);
        slot as u32
    }

    fn emit(&mut self, opcode: OpCode, tail: &TailWriter) -> &mut Self {
        self.method.il.emit(opcode, tail.finish());
        self
    }

    pub fn call(&mut self, result: Option<u32>, callee: MethodId, arguments: &[u32]) -> &mut Self {
        let tail = TailWriter::default()
            .u32(result.unwrap_or(NO_SLOT))
            .method(callee)
            .slots(arguments);
        self.emit(OpCode::Call, &tail)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(OpCode::Return, &TailWriter::default())
    }

    pub fn ret_value(&mut self, value: u32) -> &mut Self {
        self.emit(OpCode::ReturnValue, &TailWriter::default().u32(value))
    }

    pub fn load(&mut self, destination: u32, source: u32) -> &mut Self {
        let tail = TailWriter::default().u32(destination).u32(source);
        self.emit(OpCode::Load, &tail)
    }

    pub fn load_field(&mut self, destination: u32, field: FieldId) -> &mut Self {
        let tail = TailWriter::default().u32(destination).field(field);
        self.emit(OpCode::LoadField, &tail)
    }

    pub fn store_field(&mut self, field: FieldId, source: u32) -> &mut Self {
        let tail = TailWriter::default().field(field).u32(source);
        self.emit(OpCode::StoreField, &tail)
    }

    pub fn load_uint32(&mut self, destination: u32, value: u32) -> &mut Self {
        let tail = TailWriter::default().u32(destination).u32(value);
        self.emit(OpCode::LoadUInt32, &tail)
    }

    pub fn load_float32(&mut self, destination: u32, value: f32) -> &mut Self {
        let tail = TailWriter::default().u32(destination).u32(value.to_bits());
        self.emit(OpCode::LoadFloat32, &tail)
    }
}
