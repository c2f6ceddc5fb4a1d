//! Calls and returns.

use super::IlCompiler;
use crate::function::FunctionKey;
use crate::{CompileError, Result, SpirVId};
use nesl_ir::{MethodId, TailReader};
use smallvec::SmallVec;
use spirv::Op;

impl IlCompiler<'_, '_> {
    /// `OpFunctionCall` to the callee specialized for the argument types,
    /// storing the result when a slot is bound.
    pub(super) fn call(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let result = self.read(tail, TailReader::read_optional_slot)?;
        let callee = self.read(tail, TailReader::read_u64)?;
        let arguments = self.read(tail, TailReader::read_slots)?;

        let compiler = self.compiler;
        let callee = MethodId::from_wire(callee)
            .ok_or(CompileError::UnresolvedMethod(callee))
            .and_then(|id| compiler.method(id))?;
        let expected = callee.effective_parameter_count();
        if arguments.len() != expected {
            return Err(CompileError::ArgumentCountMismatch {
                callee: callee.full_name.clone(),
                given: arguments.len(),
                expected,
            });
        }

        let mut parameters = SmallVec::with_capacity(expected);
        for (declared, &argument) in callee.effective_parameter_types().zip(&arguments) {
            let concrete = if compiler.nesl_type(declared)?.is_generic_parameter() {
                self.slot(argument)?.nesl_type
            } else {
                declared
            };
            parameters.push(concrete);
        }
        let function = compiler.get_spirv_function(&FunctionKey {
            method: callee.id,
            parameters,
        })?;

        let values = arguments
            .iter()
            .map(|&argument| self.load_slot(argument))
            .collect::<Result<SmallVec<[SpirVId; 8]>>>()?;
        let value = compiler.next_id();
        let mut operands = SmallVec::<[u32; 8]>::new();
        operands.extend([function.return_type.id.raw(), value.raw(), function.id.raw()]);
        operands.extend(values.iter().map(|v| v.raw()));
        self.body.emit(Op::FunctionCall, &operands);
        self.callees.push(function);

        if let Some(result) = result {
            self.store_slot(result, value)?;
        }
        Ok(())
    }

    pub(super) fn ret(&mut self) {
        self.body.emit(Op::Return, &[]);
    }

    pub(super) fn ret_value(&mut self, tail: &mut TailReader<'_>) -> Result<()> {
        let slot = self
            .read(tail, TailReader::read_optional_slot)?
            .ok_or_else(|| CompileError::MissingResultBinding {
                method: self.method.full_name.clone(),
            })?;
        let value = self.load_slot(slot)?;
        self.body.emit(Op::ReturnValue, &[value.raw()]);
        Ok(())
    }
}
