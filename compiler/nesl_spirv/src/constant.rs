//! Interned scalar constants.

use crate::types::SpirVType;
use crate::{Result, SpirVCompiler, SpirVId};
use smallvec::smallvec;
use spirv::Op;

/// A 32-bit constant of a given type, compared by bit pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ConstantKey {
    value_type: SpirVId,
    bits: u32,
}

impl SpirVCompiler<'_> {
    pub(crate) fn get_constant(&self, value_type: SpirVType, bits: u32) -> Result<SpirVId> {
        let key = ConstantKey {
            value_type: value_type.id,
            bits,
        };
        self.constants.get_or_try_insert_with(&key, &self.tracker, || {
            let id = self.declare(Op::Constant, |id| {
                smallvec![value_type.id.raw(), id.raw(), bits]
            });
            tracing::debug!(?id, ?key, "declared constant");
            Ok(id)
        })
    }
}
