//! Slot copies, global variable access and constants.

use super::IlCompiler;
use crate::{CompileError, Result};
use nesl_ir::{FieldId, TailReader};
use spirv::Op;

impl IlCompiler<'_, '_> {
    pub(super) fn load(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let destination = self.read(tail, TailReader::read_u32)?;
        let source = self.read(tail, TailReader::read_u32)?;
        let value = self.load_slot(source)?;
        self.store_slot(destination, value)
    }

    pub(super) fn load_field(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let destination = self.read(tail, TailReader::read_u32)?;
        let field = self.read(tail, TailReader::read_u64)?;
        let variable = self.compiler.get_spirv_variable(field_id(field)?)?;

        let value = self.compiler.next_id();
        self.body.emit(
            Op::Load,
            &[variable.value_type.id.raw(), value.raw(), variable.id.raw()],
        );
        self.store_slot(destination, value)
    }

    pub(super) fn store_field(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let field = self.read(tail, TailReader::read_u64)?;
        let source = self.read(tail, TailReader::read_u32)?;
        let variable = self.compiler.get_spirv_variable(field_id(field)?)?;

        let value = self.load_slot(source)?;
        self.body
            .emit(Op::Store, &[variable.id.raw(), value.raw()]);
        Ok(())
    }

    /// A 32-bit payload becomes a constant of the destination slot's type.
    pub(super) fn load_constant(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let destination = self.read(tail, TailReader::read_u32)?;
        let bits = self.read(tail, TailReader::read_u32)?;
        let value_type = self.slot(destination)?.value_type;
        let constant = self.compiler.get_constant(value_type, bits)?;
        self.store_slot(destination, constant)
    }
}

fn field_id(wire: u64) -> Result<FieldId> {
    FieldId::from_wire(wire).ok_or(CompileError::UnresolvedField(wire))
}
