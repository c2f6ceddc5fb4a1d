//! Instruction translator.
//!
//! An [`IlCompiler`] lowers one method body for one [`FunctionKey`]. Every
//! local slot is backed by a Function-storage variable; instructions move
//! values between slots with `OpLoad`/`OpStore`.

mod branch;
mod load;

use crate::function::{FunctionKey, Specialization, SpirVFunction};
use crate::generator::SpirVGenerator;
use crate::types::SpirVType;
use crate::{CompileError, Result, SpirVCompiler, SpirVId};
use nesl_ir::{IlError, NeslMethod, OpCode, TailReader, TypeId};
use smallvec::SmallVec;
use spirv::{FunctionControl, Op, StorageClass};
use std::sync::Arc;

/// A local slot of the method being compiled.
struct LocalSlot {
    /// The Function-storage `OpVariable` holding the slot.
    pointer: SpirVId,
    /// Concrete front-end type, after specialization.
    nesl_type: TypeId,
    value_type: SpirVType,
}

pub(crate) struct IlCompiler<'c, 'a> {
    compiler: &'c SpirVCompiler<'a>,
    method: &'a NeslMethod,
    specialization: Specialization,
    body: SpirVGenerator,
    slots: Vec<LocalSlot>,
    callees: Vec<Arc<SpirVFunction>>,
}

impl<'c, 'a> IlCompiler<'c, 'a> {
    pub(crate) fn new(
        compiler: &'c SpirVCompiler<'a>,
        method: &'a NeslMethod,
        specialization: Specialization,
    ) -> Self {
        IlCompiler {
            compiler,
            method,
            specialization,
            body: SpirVGenerator::new(),
            slots: Vec::with_capacity(method.slot_count()),
            callees: Vec::new(),
        }
    }

    pub(crate) fn compile(mut self, key: FunctionKey) -> Result<SpirVFunction> {
        let compiler = self.compiler;
        let return_type = compiler.get_spirv_type(
            self.method
                .return_type
                .map(|declared| self.specialization.apply(declared)),
        )?;
        let parameter_types = key
            .parameters
            .iter()
            .map(|&parameter| compiler.get_spirv_type(Some(parameter)))
            .collect::<Result<SmallVec<[SpirVType; 4]>>>()?;
        let function_type = compiler.built_ins().function(return_type, &parameter_types)?;

        let id = compiler.next_id();
        self.body.emit(
            Op::Function,
            &[
                return_type.id.raw(),
                id.raw(),
                FunctionControl::NONE.bits(),
                function_type.id.raw(),
            ],
        );
        let parameters: SmallVec<[SpirVId; 4]> = parameter_types
            .iter()
            .map(|parameter| {
                let value = compiler.next_id();
                self.body
                    .emit(Op::FunctionParameter, &[parameter.id.raw(), value.raw()]);
                value
            })
            .collect();
        self.body.emit(Op::Label, &[compiler.next_id().raw()]);

        self.declare_slots()?;
        for (slot, value) in self.slots.iter().zip(&parameters) {
            self.body.emit(Op::Store, &[slot.pointer.raw(), value.raw()]);
        }

        let method = self.method;
        for instruction in method.instructions() {
            tracing::trace!(method = %method.full_name, opcode = ?instruction.opcode, "translating");
            let mut tail = instruction.reader();
            match instruction.opcode {
                OpCode::Call => self.call(&mut tail)?,
                OpCode::Return => self.ret(),
                OpCode::ReturnValue => self.ret_value(&mut tail)?,
                OpCode::Load => self.load(&mut tail)?,
                OpCode::LoadField => self.load_field(&mut tail)?,
                OpCode::StoreField => self.store_field(&mut tail)?,
                OpCode::LoadUInt32 | OpCode::LoadFloat32 => self.load_constant(&mut tail)?,
            }
        }
        self.body.emit(Op::FunctionEnd, &[]);
        tracing::trace!(?id, words = self.body.words().len(), "function body complete");

        Ok(SpirVFunction {
            id,
            key,
            return_type,
            body: self.body.into_words(),
            callees: self.callees,
        })
    }

    /// One Function-storage variable per slot, parameters first.
    fn declare_slots(&mut self) -> Result<()> {
        let compiler = self.compiler;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot indices are encoded as u32 in the IL"
        )]
        let slot_count = self.method.slot_count() as u32;
        for slot in 0..slot_count {
            let declared = self
                .method
                .slot_type(slot)
                .ok_or_else(|| self.unresolved_slot(slot))?;
            let nesl_type = self.specialization.apply(declared);
            let value_type = compiler.get_spirv_type(Some(nesl_type))?;
            let pointer_type = compiler
                .built_ins()
                .pointer(StorageClass::Function, value_type)?;

            let pointer = compiler.next_id();
            self.body.emit(
                Op::Variable,
                &[
                    pointer_type.id.raw(),
                    pointer.raw(),
                    StorageClass::Function as u32,
                ],
            );
            self.slots.push(LocalSlot {
                pointer,
                nesl_type,
                value_type,
            });
        }
        Ok(())
    }

    fn slot(&self, slot: u32) -> Result<&LocalSlot> {
        self.slots
            .get(slot as usize)
            .ok_or_else(|| self.unresolved_slot(slot))
    }

    fn unresolved_slot(&self, slot: u32) -> CompileError {
        CompileError::UnresolvedSlot {
            method: self.method.full_name.clone(),
            slot,
        }
    }

    /// Load the current value of a slot.
    fn load_slot(&mut self, slot: u32) -> Result<SpirVId> {
        let (value_type, pointer) = {
            let slot = self.slot(slot)?;
            (slot.value_type, slot.pointer)
        };
        let value = self.compiler.next_id();
        self.body.emit(
            Op::Load,
            &[value_type.id.raw(), value.raw(), pointer.raw()],
        );
        Ok(value)
    }

    fn store_slot(&mut self, slot: u32, value: SpirVId) -> Result<()> {
        let pointer = self.slot(slot)?.pointer;
        self.body.emit(Op::Store, &[pointer.raw(), value.raw()]);
        Ok(())
    }

    /// Attach the method name to a tail decoding error.
    fn read<'t, T>(
        &self,
        tail: &mut TailReader<'t>,
        read: impl FnOnce(&mut TailReader<'t>) -> Result<T, IlError>,
    ) -> Result<T> {
        read(tail).map_err(|source| CompileError::MalformedIl {
            method: self.method.full_name.clone(),
            source,
        })
    }
}
