//! Global variables backed by static fields.

use crate::types::SpirVType;
use crate::{CompileError, Result, SpirVCompiler, SpirVId};
use nesl_ir::{FieldId, FieldStorage};
use smallvec::smallvec;
use spirv::{Decoration, Op, StorageClass};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpirVVariable {
    pub id: SpirVId,
    /// The static field backing the variable.
    pub field: FieldId,
    pub storage_class: StorageClass,
    /// Type of the value behind the pointer.
    pub value_type: SpirVType,
}

fn storage_class(storage: FieldStorage) -> StorageClass {
    match storage {
        FieldStorage::Private => StorageClass::Private,
        FieldStorage::Input => StorageClass::Input,
        FieldStorage::Output => StorageClass::Output,
        FieldStorage::Uniform => StorageClass::Uniform,
        FieldStorage::StorageBuffer => StorageClass::StorageBuffer,
    }
}

impl SpirVCompiler<'_> {
    /// The global variable for a static field, declared on first use and
    /// registered in the entry-point interface.
    pub(crate) fn get_spirv_variable(&self, field_id: FieldId) -> Result<SpirVVariable> {
        let field = self.field(field_id)?;
        if !field.is_static() {
            return Err(CompileError::NonStaticField {
                field: field.name.clone(),
            });
        }

        self.variables
            .get_or_try_insert_with(&field_id, &self.tracker, || {
                let storage_class = storage_class(field.storage());
                let value_type = self.get_spirv_type(Some(field.field_type))?;
                let pointer = self.built_ins().pointer(storage_class, value_type)?;

                let id = self.declare(Op::Variable, |id| {
                    smallvec![pointer.id.raw(), id.raw(), storage_class as u32]
                });
                if let Some(location) = field.location() {
                    self.annotations.lock().emit(
                        Op::Decorate,
                        &[id.raw(), Decoration::Location as u32, location],
                    );
                }

                let variable = SpirVVariable {
                    id,
                    field: field_id,
                    storage_class,
                    value_type,
                };
                self.all_variables.lock().push(variable);
                tracing::debug!(?id, field = %field.name, ?storage_class, "declared variable");
                Ok(variable)
            })
    }
}
