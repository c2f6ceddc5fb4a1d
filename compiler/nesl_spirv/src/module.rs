//! The finished binary module.

use spirv::Op;

/// Number of words before the first instruction.
const HEADER_WORDS: usize = 5;

/// An immutable SPIR-V module: little-endian words, header first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpirVModule {
    code: Vec<u8>,
}

impl SpirVModule {
    pub(crate) fn new(code: Vec<u8>) -> Self {
        SpirVModule { code }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    pub fn words(&self) -> Vec<u32> {
        self.code
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    /// One past the highest id used in the module.
    pub fn bound(&self) -> u32 {
        self.words().get(3).copied().unwrap_or(0)
    }

    /// Instructions following the header, in module order.
    pub fn instructions(&self) -> Vec<RawInstruction> {
        let words = self.words();
        decode(words.get(HEADER_WORDS..).unwrap_or_default())
    }
}

/// A decoded instruction: opcode and operand words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInstruction {
    pub opcode: u16,
    pub operands: Vec<u32>,
}

impl RawInstruction {
    pub fn op(&self) -> Option<Op> {
        Op::from_u32(u32::from(self.opcode))
    }
}

/// Split an instruction stream. Stops at a zero word count or a truncated
/// instruction.
pub(crate) fn decode(mut words: &[u32]) -> Vec<RawInstruction> {
    let mut instructions = Vec::new();
    while let Some(&first) = words.first() {
        let word_count = (first >> 16) as usize;
        if word_count == 0 || word_count > words.len() {
            break;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the opcode occupies the low 16 bits"
        )]
        let opcode = (first & 0xFFFF) as u16;
        instructions.push(RawInstruction {
            opcode,
            operands: words[1..word_count].to_vec(),
        });
        words = &words[word_count..];
    }
    instructions
}
