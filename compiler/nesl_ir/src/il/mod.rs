//! IL containers and big-endian operand tails.
//!
//! A method body is a flat byte buffer of operand tails plus an index of
//! `(opcode, tail range)` entries. Instructions borrow their tail from the
//! container and are decoded on demand through a [`TailReader`].

use crate::{FieldId, MethodId};
use smallvec::SmallVec;
use std::ops::Range;

/// Sentinel slot encoding "no binding".
pub const NO_SLOT: u32 = u32::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    /// `result: u32, callee: u64, count: u32, args: u32*`
    Call,
    Return,
    /// `value: u32`
    ReturnValue,
    /// `destination: u32, source: u32`
    Load,
    /// `destination: u32, field: u64`
    LoadField,
    /// `field: u64, source: u32`
    StoreField,
    /// `destination: u32, value: u32`
    LoadUInt32,
    /// `destination: u32, bits: u32`
    LoadFloat32,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IlError {
    #[error("{opcode:?} tail truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        opcode: OpCode,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

#[derive(Clone, Debug, Default)]
pub struct IlContainer {
    tail: Vec<u8>,
    index: Vec<(OpCode, Range<usize>)>,
}

impl IlContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction with an already encoded tail.
    pub fn emit(&mut self, opcode: OpCode, tail: &[u8]) {
        let start = self.tail.len();
        self.tail.extend_from_slice(tail);
        self.index.push((opcode, start..self.tail.len()));
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction<'_>> + '_ {
        self.index.iter().map(|(opcode, range)| Instruction {
            opcode: *opcode,
            tail: &self.tail[range.clone()],
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// One IL instruction: an opcode and its raw operand tail.
#[derive(Copy, Clone, Debug)]
pub struct Instruction<'a> {
    pub opcode: OpCode,
    pub tail: &'a [u8],
}

impl<'a> Instruction<'a> {
    pub fn reader(&self) -> TailReader<'a> {
        TailReader {
            opcode: self.opcode,
            tail: self.tail,
            offset: 0,
        }
    }
}

/// Sequential big-endian decoder over an instruction tail.
pub struct TailReader<'a> {
    opcode: OpCode,
    tail: &'a [u8],
    offset: usize,
}

impl TailReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], IlError> {
        let bytes = self
            .tail
            .get(self.offset..self.offset + N)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(IlError::Truncated {
                opcode: self.opcode,
                offset: self.offset,
                needed: N,
                available: self.tail.len().saturating_sub(self.offset),
            })?;
        self.offset += N;
        Ok(bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, IlError> {
        self.take::<4>().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, IlError> {
        self.take::<8>().map(u64::from_be_bytes)
    }

    /// Read a slot that may be [`NO_SLOT`].
    pub fn read_optional_slot(&mut self) -> Result<Option<u32>, IlError> {
        let slot = self.read_u32()?;
        Ok((slot != NO_SLOT).then_some(slot))
    }

    /// Read a count-prefixed list of slots.
    pub fn read_slots(&mut self) -> Result<SmallVec<[u32; 8]>, IlError> {
        let count = self.read_u32()?;
        (0..count).map(|_| self.read_u32()).collect()
    }
}

/// Encoder used by the builders; mirrors [`TailReader`].
#[derive(Default)]
pub(crate) struct TailWriter {
    bytes: SmallVec<[u8; 32]>,
}

impl TailWriter {
    pub(crate) fn u32(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn method(mut self, id: MethodId) -> Self {
        self.bytes.extend_from_slice(&id.to_wire().to_be_bytes());
        self
    }

    pub(crate) fn field(mut self, id: FieldId) -> Self {
        self.bytes.extend_from_slice(&id.to_wire().to_be_bytes());
        self
    }

    pub(crate) fn slots(self, slots: &[u32]) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "argument lists are bounded by parameter counts"
        )]
        let mut writer = self.u32(slots.len() as u32);
        for &slot in slots {
            writer = writer.u32(slot);
        }
        writer
    }

    pub(crate) fn finish(&self) -> &[u8] {
        &self.bytes
    }
}
