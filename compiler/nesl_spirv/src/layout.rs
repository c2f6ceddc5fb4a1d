//! Canonical module layout.
//!
//! Workers reach the types section and the id allocator in whatever order
//! the pool schedules them. Once every function is materialized the module
//! is laid out again from the entry points alone: functions in depth-first
//! call order, each declaration right after the declarations it refers to
//! and before its first use, and ids renumbered by first appearance. Two
//! runs over the same assembly and entry-point list produce the same bytes
//! whatever the pool size.

use crate::module::{decode, RawInstruction};
use crate::SpirVFunction;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};
use spirv::Op;
use std::sync::Arc;

/// Module-level sections as emitted during materialization.
pub(crate) struct Sections<'s> {
    pub(crate) header: &'s [u32],
    pub(crate) annotations: &'s [u32],
    pub(crate) declarations: &'s [u32],
}

/// Functions reachable from `entries`, in depth-first preorder.
pub(crate) fn function_order(entries: &[Arc<SpirVFunction>]) -> Vec<Arc<SpirVFunction>> {
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    let mut stack: Vec<&Arc<SpirVFunction>> = entries.iter().rev().collect();
    while let Some(function) = stack.pop() {
        if !seen.insert(function.id) {
            continue;
        }
        stack.extend(function.callees.iter().rev());
        order.push(Arc::clone(function));
    }
    order
}

/// Lay out everything after the five header words. Returns the words and
/// the id bound of the renumbered module.
pub(crate) fn canonicalize(
    sections: &Sections<'_>,
    functions: &[Arc<SpirVFunction>],
) -> (Vec<u32>, u32) {
    let mut header = decode(sections.header);
    let mut annotations = decode(sections.annotations);
    let mut bodies: Vec<Vec<RawInstruction>> =
        functions.iter().map(|function| decode(&function.body)).collect();

    let declarations = decode(sections.declarations);
    let order = {
        let mut placer = Placer::new(&declarations);
        for instruction in header.iter().chain(bodies.iter().flatten()) {
            for position in id_positions(instruction) {
                placer.place(instruction.operands[position]);
            }
        }
        // Declarations nothing refers to keep their section order.
        for index in 0..declarations.len() {
            placer.place_index(index);
        }
        placer.order
    };
    let mut declarations: Vec<Option<RawInstruction>> =
        declarations.into_iter().map(Some).collect();
    let mut declarations: Vec<RawInstruction> = order
        .iter()
        .filter_map(|&index| declarations[index].take())
        .collect();

    let mut renumbering = Renumbering::default();
    for instruction in header
        .iter_mut()
        .chain(declarations.iter_mut())
        .chain(bodies.iter_mut().flatten())
        .chain(annotations.iter_mut())
    {
        renumbering.rewrite(instruction);
    }
    annotations.sort_by(|a, b| (a.opcode, &a.operands).cmp(&(b.opcode, &b.operands)));

    let mut words = Vec::with_capacity(
        sections.header.len() + sections.annotations.len() + sections.declarations.len(),
    );
    for instruction in header
        .iter()
        .chain(&annotations)
        .chain(&declarations)
        .chain(bodies.iter().flatten())
    {
        encode(instruction, &mut words);
    }
    (words, renumbering.next)
}

/// Orders declarations so each follows every declaration it refers to.
struct Placer<'d> {
    declarations: &'d [RawInstruction],
    by_result: FxHashMap<u32, usize>,
    placed: Vec<bool>,
    order: Vec<usize>,
}

impl<'d> Placer<'d> {
    fn new(declarations: &'d [RawInstruction]) -> Self {
        let by_result = declarations
            .iter()
            .enumerate()
            .filter_map(|(index, declaration)| Some((result_id(declaration)?, index)))
            .collect();
        Placer {
            declarations,
            by_result,
            placed: vec![false; declarations.len()],
            order: Vec::with_capacity(declarations.len()),
        }
    }

    fn place(&mut self, id: u32) {
        if let Some(&index) = self.by_result.get(&id) {
            self.place_index(index);
        }
    }

    fn place_index(&mut self, index: usize) {
        if std::mem::replace(&mut self.placed[index], true) {
            return;
        }
        let declarations = self.declarations;
        let declaration = &declarations[index];
        for position in id_positions(declaration) {
            self.place(declaration.operands[position]);
        }
        self.order.push(index);
    }
}

/// Maps run ids to dense ids in order of first appearance, starting at 1.
struct Renumbering {
    ids: FxHashMap<u32, u32>,
    next: u32,
}

impl Default for Renumbering {
    fn default() -> Self {
        Renumbering {
            ids: FxHashMap::default(),
            next: 1,
        }
    }
}

impl Renumbering {
    fn rewrite(&mut self, instruction: &mut RawInstruction) {
        for position in id_positions(instruction) {
            let next = &mut self.next;
            let id = *self
                .ids
                .entry(instruction.operands[position])
                .or_insert_with(|| {
                    let id = *next;
                    *next += 1;
                    id
                });
            instruction.operands[position] = id;
        }
    }
}

/// Result id of a types-section declaration.
fn result_id(declaration: &RawInstruction) -> Option<u32> {
    match declaration.op()? {
        Op::Constant | Op::Variable => declaration.operands.get(1).copied(),
        _ => declaration.operands.first().copied(),
    }
}

/// Operand positions holding ids, for every instruction the backend emits.
fn id_positions(instruction: &RawInstruction) -> SmallVec<[usize; 8]> {
    let count = instruction.operands.len();
    let positions: SmallVec<[usize; 8]> = match instruction.op() {
        Some(
            Op::TypeVoid
            | Op::TypeInt
            | Op::TypeFloat
            | Op::Label
            | Op::ReturnValue
            | Op::Decorate
            | Op::ExecutionMode,
        ) => smallvec![0],
        Some(
            Op::TypeVector | Op::Constant | Op::Variable | Op::FunctionParameter | Op::Store,
        ) => smallvec![0, 1],
        Some(Op::TypePointer) => smallvec![0, 2],
        Some(Op::Function) => smallvec![0, 1, 3],
        Some(Op::Load) => smallvec![0, 1, 2],
        Some(Op::TypeStruct | Op::TypeFunction | Op::FunctionCall) => (0..count).collect(),
        Some(Op::EntryPoint) => {
            // Model, function, nul-terminated name, interface ids.
            let interface = instruction
                .operands
                .iter()
                .skip(2)
                .position(|word| word.to_le_bytes().contains(&0))
                .map_or(count, |last| last + 3);
            std::iter::once(1).chain(interface..count).collect()
        }
        _ => SmallVec::new(),
    };
    positions.into_iter().filter(|&position| position < count).collect()
}

fn encode(instruction: &RawInstruction, words: &mut Vec<u32>) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "decoded instructions fit the 16-bit word count"
    )]
    let word_count = (instruction.operands.len() + 1) as u32;
    words.push((word_count << 16) | u32::from(instruction.opcode));
    words.extend_from_slice(&instruction.operands);
}
