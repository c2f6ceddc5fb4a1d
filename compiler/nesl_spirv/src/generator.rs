//! Append-only instruction buffers, one per module section.

use smallvec::SmallVec;
use spirv::Op;

/// Operand list for a single instruction.
pub(crate) type Operands = SmallVec<[u32; 8]>;

#[derive(Default)]
pub(crate) struct SpirVGenerator {
    words: Vec<u32>,
}

impl SpirVGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one instruction: `word_count << 16 | opcode`, then operands.
    pub(crate) fn emit(&mut self, op: Op, operands: &[u32]) {
        let word_count = operands.len() + 1;
        debug_assert!(word_count <= 0xFFFF, "{op:?} has {word_count} words");
        #[expect(
            clippy::cast_possible_truncation,
            reason = "word count is bounded by the 16-bit instruction header"
        )]
        let header = ((word_count as u32) << 16) | (op as u32);
        self.words.push(header);
        self.words.extend_from_slice(operands);
    }

    pub(crate) fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn into_words(self) -> Vec<u32> {
        self.words
    }
}

/// Encode a literal string: UTF-8, nul-terminated, zero-padded to a word
/// boundary, packed little-endian.
pub(crate) fn literal_string(value: &str) -> Operands {
    let bytes = value.as_bytes();
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .chain((bytes.len() % 4 == 0).then_some(0))
        .collect()
}
