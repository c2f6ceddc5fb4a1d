//! Compilation-run context and module assembly.
//!
//! One [`SpirVCompiler`] exists per run and owns every piece of shared state
//! (id allocator, registries, section buffers), so nothing survives between
//! runs. Assembly proceeds in four stages:
//!
//! 1. capability and memory model go into the header section;
//! 2. entry-point functions are materialized on a bounded rayon pool;
//! 3. `OpEntryPoint` and `OpExecutionMode` declarations are emitted;
//! 4. sections are laid out canonically (see [`crate::layout`]), concatenated,
//!    and the id bound is patched into the header.

use crate::constant::ConstantKey;
use crate::function::{FunctionKey, SpirVFunction};
use crate::generator::{literal_string, Operands, SpirVGenerator};
use crate::id::IdAllocator;
use crate::layout::{self, Sections};
use crate::registry::{ConstructionTracker, Registry};
use crate::types::{SpirVType, TypeKey};
use crate::variable::SpirVVariable;
use crate::{CompileError, CompilerConfig, Result, SpirVId, SpirVModule};
use nesl_ir::{
    ExecutionModel, FieldId, MethodId, NeslAssembly, NeslEntryPoint, NeslField, NeslMethod,
    NeslType, TypeId,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use spirv::{AddressingModel, Capability, ExecutionMode, MemoryModel, Op};
use std::sync::Arc;

/// Index of the id bound within the module header.
const BOUND_WORD: usize = 3;

pub struct SpirVCompiler<'a> {
    pub(crate) assembly: &'a NeslAssembly,
    /// Requested entry points, duplicates removed.
    entry_points: Vec<NeslEntryPoint>,
    config: CompilerConfig,

    pub(crate) ids: IdAllocator,
    pub(crate) tracker: ConstructionTracker,

    pub(crate) types: Registry<TypeId, SpirVType>,
    pub(crate) built_in_types: Registry<TypeKey, SpirVType>,
    pub(crate) constants: Registry<ConstantKey, SpirVId>,
    pub(crate) variables: Registry<FieldId, SpirVVariable>,
    pub(crate) functions: Registry<FunctionKey, Arc<SpirVFunction>>,
    /// Every global variable, in creation order; the entry-point interface.
    pub(crate) all_variables: Mutex<Vec<SpirVVariable>>,

    header: SpirVGenerator,
    pub(crate) annotations: Mutex<SpirVGenerator>,
    pub(crate) types_and_variables: Mutex<SpirVGenerator>,
}

impl<'a> SpirVCompiler<'a> {
    pub(crate) fn new(
        assembly: &'a NeslAssembly,
        entry_points: &'a [NeslEntryPoint],
        config: CompilerConfig,
    ) -> Self {
        let mut seen = FxHashSet::default();
        let entry_points = entry_points
            .iter()
            .copied()
            .filter(|entry_point| seen.insert(*entry_point))
            .collect();
        SpirVCompiler {
            assembly,
            entry_points,
            config,
            ids: IdAllocator::new(),
            tracker: ConstructionTracker::new(),
            types: Registry::new("type"),
            built_in_types: Registry::new("built-in type"),
            constants: Registry::new("constant"),
            variables: Registry::new("variable"),
            functions: Registry::new("function"),
            all_variables: Mutex::new(Vec::new()),
            header: SpirVGenerator::new(),
            annotations: Mutex::new(SpirVGenerator::new()),
            types_and_variables: Mutex::new(SpirVGenerator::new()),
        }
    }

    /// Compile the given entry points into a finished SPIR-V module.
    #[tracing::instrument(level = "debug", skip_all, fields(
        assembly = assembly.name(),
        entry_points = entry_points.len(),
    ))]
    pub fn compile(
        assembly: &'a NeslAssembly,
        entry_points: &'a [NeslEntryPoint],
        config: CompilerConfig,
    ) -> Result<SpirVModule> {
        let mut compiler = SpirVCompiler::new(assembly, entry_points, config);
        compiler.emit_header();
        compiler.materialize_entry_points()?;
        let entries = compiler.emit_entry_points()?;
        Ok(compiler.assemble(&entries))
    }

    #[inline]
    pub(crate) fn next_id(&self) -> SpirVId {
        self.ids.next()
    }

    /// Emit a declaration into the types-and-variables section. The id is
    /// allocated under the section lock, so declarations appear in id order.
    pub(crate) fn declare(&self, op: Op, operands: impl FnOnce(SpirVId) -> Operands) -> SpirVId {
        let mut section = self.types_and_variables.lock();
        let id = self.ids.next();
        section.emit(op, &operands(id));
        id
    }

    pub(crate) fn method(&self, id: MethodId) -> Result<&'a NeslMethod> {
        self.assembly
            .get_method(id)
            .ok_or(CompileError::UnresolvedMethod(id.to_wire()))
    }

    pub(crate) fn nesl_type(&self, id: TypeId) -> Result<&'a NeslType> {
        self.assembly
            .get_type(id)
            .ok_or(CompileError::UnresolvedType(id.raw()))
    }

    pub(crate) fn field(&self, id: FieldId) -> Result<&'a NeslField> {
        self.assembly
            .get_field(id)
            .ok_or(CompileError::UnresolvedField(id.to_wire()))
    }

    fn emit_header(&mut self) {
        self.header
            .emit(Op::Capability, &[Capability::Shader as u32]);
        self.header.emit(
            Op::MemoryModel,
            &[AddressingModel::Logical as u32, MemoryModel::GLSL450 as u32],
        );
    }

    fn materialize_entry_points(&self) -> Result<()> {
        for entry_point in &self.entry_points {
            execution_mode(entry_point.execution_model)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()?;

        pool.install(|| {
            self.entry_points.par_iter().try_for_each(|entry_point| {
                let method = self.method(entry_point.method)?;
                self.get_spirv_function(&FunctionKey::for_method(method))
                    .map(drop)
            })
        })
    }

    /// Returns the entry-point functions in request order.
    fn emit_entry_points(&mut self) -> Result<Vec<Arc<SpirVFunction>>> {
        let mut interface = self.all_variables.lock().clone();
        interface.sort_by_key(|variable| (variable.storage_class as u32, variable.field));

        let mut entries = Vec::with_capacity(self.entry_points.len());
        let mut declared = Vec::with_capacity(self.entry_points.len());
        for entry_point in &self.entry_points {
            let method = self.method(entry_point.method)?;
            let function = self
                .functions
                .get(&FunctionKey::for_method(method))
                .ok_or_else(|| CompileError::UnreachableEntryPoint {
                    method: method.full_name.clone(),
                })?;

            let mut operands = Operands::new();
            operands.push(execution_model(entry_point.execution_model) as u32);
            operands.push(function.id.raw());
            operands.extend(literal_string(&method.full_name));
            operands.extend(interface.iter().map(|variable| variable.id.raw()));
            self.header.emit(Op::EntryPoint, &operands);

            declared.push((function.id, execution_mode(entry_point.execution_model)?));
            entries.push(function);
        }

        // All OpEntryPoint declarations precede the first OpExecutionMode.
        for (function, mode) in declared {
            self.header
                .emit(Op::ExecutionMode, &[function.raw(), mode as u32]);
        }
        Ok(entries)
    }

    fn assemble(self, entries: &[Arc<SpirVFunction>]) -> SpirVModule {
        let functions = layout::function_order(entries);
        tracing::debug!(
            functions = self.functions.len(),
            types = self.types.len() + self.built_in_types.len(),
            constants = self.constants.len(),
            variables = self.variables.len(),
            issued = self.ids.bound() - 1,
            "assembling module"
        );

        let header = self.header.into_words();
        let annotations = self.annotations.into_inner().into_words();
        let declarations = self.types_and_variables.into_inner().into_words();
        let (body, bound) = layout::canonicalize(
            &Sections {
                header: &header,
                annotations: &annotations,
                declarations: &declarations,
            },
            &functions,
        );

        let mut words = vec![
            spirv::MAGIC_NUMBER,
            self.config.version,
            self.config.generator,
            0, // Bound, patched below.
            0,
        ];
        words.extend(body);
        words[BOUND_WORD] = bound;
        SpirVModule::new(words.iter().flat_map(|word| word.to_le_bytes()).collect())
    }
}

fn execution_model(model: ExecutionModel) -> spirv::ExecutionModel {
    match model {
        ExecutionModel::Vertex => spirv::ExecutionModel::Vertex,
        ExecutionModel::Fragment => spirv::ExecutionModel::Fragment,
        ExecutionModel::GLCompute => spirv::ExecutionModel::GLCompute,
    }
}

/// Only fragment shaders are supported; they get an upper-left origin.
fn execution_mode(model: ExecutionModel) -> Result<ExecutionMode> {
    match model {
        ExecutionModel::Fragment => Ok(ExecutionMode::OriginUpperLeft),
        ExecutionModel::Vertex | ExecutionModel::GLCompute => {
            Err(CompileError::UnsupportedExecutionModel(model))
        }
    }
}
