//! SPIR-V types: structural keys and front-end type resolution.

use crate::generator::Operands;
use crate::{CompileError, Result, SpirVCompiler, SpirVId};
use nesl_ir::{NeslType, TypeId};
use smallvec::{smallvec, SmallVec};
use spirv::{Op, StorageClass};

/// A declared SPIR-V type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpirVType {
    pub id: SpirVId,
}

/// Structural identity of a built-in type. Composite shapes refer to their
/// components by id, and components are interned first, so two keys are
/// equal exactly when the declared types would be identical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Void,
    Int {
        width: u32,
        signed: bool,
    },
    Float {
        width: u32,
    },
    Vector {
        element: SpirVId,
        size: u32,
    },
    Pointer {
        storage: StorageClass,
        pointee: SpirVId,
    },
    Function {
        return_type: SpirVId,
        parameters: SmallVec<[SpirVId; 4]>,
    },
}

impl TypeKey {
    pub(crate) fn opcode(&self) -> Op {
        match self {
            TypeKey::Void => Op::TypeVoid,
            TypeKey::Int { .. } => Op::TypeInt,
            TypeKey::Float { .. } => Op::TypeFloat,
            TypeKey::Vector { .. } => Op::TypeVector,
            TypeKey::Pointer { .. } => Op::TypePointer,
            TypeKey::Function { .. } => Op::TypeFunction,
        }
    }

    pub(crate) fn operands(&self, id: SpirVId) -> Operands {
        let mut operands: Operands = smallvec![id.raw()];
        match self {
            TypeKey::Void => {}
            TypeKey::Int { width, signed } => operands.extend([*width, u32::from(*signed)]),
            TypeKey::Float { width } => operands.push(*width),
            TypeKey::Vector { element, size } => operands.extend([element.raw(), *size]),
            TypeKey::Pointer { storage, pointee } => {
                operands.extend([*storage as u32, pointee.raw()]);
            }
            TypeKey::Function {
                return_type,
                parameters,
            } => {
                operands.push(return_type.raw());
                operands.extend(parameters.iter().map(|p| p.raw()));
            }
        }
        operands
    }
}

impl SpirVCompiler<'_> {
    /// Resolve a front-end type. `None` is void.
    pub(crate) fn get_spirv_type(&self, id: Option<TypeId>) -> Result<SpirVType> {
        let Some(id) = id else {
            return self.built_ins().void();
        };
        let nesl_type = self.nesl_type(id)?;
        self.types
            .get_or_try_insert_with(&id, &self.tracker, || self.construct_type(nesl_type))
    }

    fn construct_type(&self, nesl_type: &NeslType) -> Result<SpirVType> {
        if nesl_type.is_generic_parameter() {
            return Err(CompileError::UnboundGenericParameter {
                parameter: nesl_type.full_name.clone(),
            });
        }

        if let Some(repr) = nesl_type.platform_dependent_representation() {
            let name = repr.spirv_target_name.as_deref().ok_or_else(|| {
                CompileError::MissingSpirVTargetName {
                    type_name: nesl_type.full_name.clone(),
                }
            })?;
            return self
                .built_ins()
                .try_get_type_by_name(nesl_type, name)?
                .ok_or_else(|| CompileError::UnsupportedBuiltInType {
                    type_name: nesl_type.full_name.clone(),
                    representation: name.to_string(),
                });
        }

        self.construct_struct(nesl_type)
    }

    /// User-defined types become structs of their instance fields.
    fn construct_struct(&self, nesl_type: &NeslType) -> Result<SpirVType> {
        let members = self
            .assembly
            .instance_fields(nesl_type)
            .map(|field| self.get_spirv_type(Some(field.field_type)))
            .collect::<Result<SmallVec<[SpirVType; 8]>>>()?;

        let id = self.declare(Op::TypeStruct, |id| {
            let mut operands: Operands = smallvec![id.raw()];
            operands.extend(members.iter().map(|member| member.id.raw()));
            operands
        });
        tracing::debug!(?id, name = %nesl_type.full_name, members = members.len(), "declared struct");
        Ok(SpirVType { id })
    }
}
