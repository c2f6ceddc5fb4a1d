//! End-to-end compilation of small assemblies.

#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use nesl_ir::{
    AssemblyBuilder, ExecutionModel, FieldStorage, MethodId, NeslAssembly, NeslAttribute,
    NeslEntryPoint, TypeId, NO_SLOT,
};
use nesl_spirv::{CompileError, CompilerConfig, RawInstruction, SpirVCompiler, SpirVModule};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rustc_hash::FxHashMap;
use spirv::{Decoration, ExecutionMode, Op, StorageClass};

struct Types {
    float: TypeId,
    uint: TypeId,
    shader: TypeId,
}

fn builder() -> (AssemblyBuilder, Types) {
    let mut builder = AssemblyBuilder::new("Shaders");
    let float = builder.define_type(
        "System.Float32",
        [NeslAttribute::spirv_representation("OpTypeFloat`32")],
    );
    let uint = builder.define_type(
        "System.UInt32",
        [NeslAttribute::spirv_representation("OpTypeInt`32`0")],
    );
    let shader = builder.define_type("Shader", []);
    (
        builder,
        Types {
            float,
            uint,
            shader,
        },
    )
}

fn static_method(
    builder: &mut AssemblyBuilder,
    owner: TypeId,
    name: &str,
    return_type: Option<TypeId>,
    parameters: &[TypeId],
) -> MethodId {
    builder
        .define_method(owner, name, return_type, parameters, [NeslAttribute::Static])
        .unwrap()
}

fn fragment(methods: &[MethodId]) -> Vec<NeslEntryPoint> {
    methods
        .iter()
        .map(|&method| NeslEntryPoint::new(method, ExecutionModel::Fragment))
        .collect()
}

fn compile(
    assembly: &NeslAssembly,
    entry_points: &[NeslEntryPoint],
) -> Result<SpirVModule, CompileError> {
    SpirVCompiler::compile(assembly, entry_points, CompilerConfig::single_threaded())
}

fn ops(module: &SpirVModule, op: Op) -> Vec<RawInstruction> {
    module
        .instructions()
        .into_iter()
        .filter(|instruction| instruction.op() == Some(op))
        .collect()
}

fn histogram(module: &SpirVModule) -> FxHashMap<u16, usize> {
    let mut counts = FxHashMap::default();
    for instruction in module.instructions() {
        *counts.entry(instruction.opcode).or_default() += 1;
    }
    counts
}

/// Every result id declared in the module.
fn result_ids(module: &SpirVModule) -> Vec<u32> {
    module
        .instructions()
        .iter()
        .filter_map(|instruction| {
            let op = instruction.op()?;
            let position = match op {
                Op::TypeVoid
                | Op::TypeInt
                | Op::TypeFloat
                | Op::TypeVector
                | Op::TypeStruct
                | Op::TypePointer
                | Op::TypeFunction
                | Op::Label => 0,
                Op::Constant
                | Op::Variable
                | Op::Function
                | Op::FunctionParameter
                | Op::FunctionCall
                | Op::Load => 1,
                _ => return None,
            };
            instruction.operands.get(position).copied()
        })
        .collect()
}

#[test]
fn single_return_entry_point() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    let words = module.words();
    assert_eq!(words[0], spirv::MAGIC_NUMBER);
    assert_eq!(words[1], 0x0001_0300);
    assert_eq!(words[2], 0x1ec5_712d);
    assert_eq!(words[4], 0);

    let opcodes: Vec<Option<Op>> = module.instructions().iter().map(RawInstruction::op).collect();
    assert_eq!(
        opcodes,
        [
            Op::Capability,
            Op::MemoryModel,
            Op::EntryPoint,
            Op::ExecutionMode,
            Op::TypeVoid,
            Op::TypeFunction,
            Op::Function,
            Op::Label,
            Op::Return,
            Op::FunctionEnd,
        ]
        .map(Some)
        .to_vec()
    );
    // void, function type, function, label.
    assert_eq!(module.bound(), 5);
}

#[test]
fn bound_is_one_past_the_highest_result_id() {
    let (mut builder, types) = builder();
    let helper = static_method(&mut builder, types.shader, "scale", Some(types.float), &[types.float]);
    builder.method(helper).unwrap().ret_value(0);
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    let mut body = builder.method(main).unwrap();
    let value = body.define_variable(types.float);
    body.load_float32(value, 0.5)
        .call(Some(value), helper, &[value])
        .ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    let ids = result_ids(&module);
    let highest = ids.iter().copied().max().unwrap();
    assert_eq!(module.bound(), highest + 1);

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len(), "result ids are unique");
    assert_eq!(unique, (1..module.bound()).collect::<Vec<_>>());
}

#[test]
fn parallel_run_issues_every_id_below_the_bound() {
    let (assembly, entry_points) = layered(12);

    let module =
        SpirVCompiler::compile(&assembly, &entry_points, CompilerConfig::with_threads(4)).unwrap();

    let mut ids = result_ids(&module);
    ids.sort_unstable();
    assert_eq!(ids, (1..module.bound()).collect::<Vec<_>>());
}

#[test]
fn entry_point_and_execution_mode_reference_the_function() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    let function = ops(&module, Op::Function)[0].operands[1];
    let entry_point = &ops(&module, Op::EntryPoint)[0];
    assert_eq!(entry_point.operands[0], spirv::ExecutionModel::Fragment as u32);
    assert_eq!(entry_point.operands[1], function);
    // "Shader::main" plus terminator, packed into four words.
    assert_eq!(entry_point.operands.len(), 2 + 4);

    let mode = &ops(&module, Op::ExecutionMode)[0];
    assert_eq!(
        mode.operands,
        vec![function, ExecutionMode::OriginUpperLeft as u32]
    );
}

#[test]
fn shared_helper_is_defined_once() {
    let (mut builder, types) = builder();
    let helper = static_method(&mut builder, types.shader, "helper", None, &[]);
    builder.method(helper).unwrap().ret();
    let first = static_method(&mut builder, types.shader, "first", None, &[]);
    builder.method(first).unwrap().call(None, helper, &[]).ret();
    let second = static_method(&mut builder, types.shader, "second", None, &[]);
    builder.method(second).unwrap().call(None, helper, &[]).ret();
    let assembly = builder.build();

    let module = SpirVCompiler::compile(
        &assembly,
        &fragment(&[first, second]),
        CompilerConfig::with_threads(4),
    )
    .unwrap();

    let functions = ops(&module, Op::Function);
    assert_eq!(functions.len(), 3);
    let calls = ops(&module, Op::FunctionCall);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].operands[2], calls[1].operands[2]);
    assert!(functions
        .iter()
        .any(|function| function.operands[1] == calls[0].operands[2]));
    assert_eq!(ops(&module, Op::TypeVoid).len(), 1);
    assert_eq!(ops(&module, Op::TypeFunction).len(), 1);
}

#[test]
fn entry_points_precede_execution_modes() {
    let (mut builder, types) = builder();
    let first = static_method(&mut builder, types.shader, "first", None, &[]);
    builder.method(first).unwrap().ret();
    let second = static_method(&mut builder, types.shader, "second", None, &[]);
    builder.method(second).unwrap().ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[first, second])).unwrap();

    let header: Vec<Option<Op>> = module
        .instructions()
        .iter()
        .map(RawInstruction::op)
        .skip(2)
        .take(4)
        .collect();
    assert_eq!(
        header,
        vec![
            Some(Op::EntryPoint),
            Some(Op::EntryPoint),
            Some(Op::ExecutionMode),
            Some(Op::ExecutionMode),
        ]
    );
}

#[test]
fn interface_lists_variables_by_storage_class() {
    let (mut builder, types) = builder();
    let counter = builder.define_field(
        types.shader,
        "counter",
        types.uint,
        [NeslAttribute::Static],
    )
    .unwrap();
    let color = builder.define_field(
        types.shader,
        "color",
        types.float,
        [
            NeslAttribute::Static,
            NeslAttribute::Storage(FieldStorage::Output),
            NeslAttribute::Location(0),
        ],
    )
    .unwrap();
    let depth = builder.define_field(
        types.shader,
        "depth",
        types.float,
        [
            NeslAttribute::Static,
            NeslAttribute::Storage(FieldStorage::Input),
            NeslAttribute::Location(1),
        ],
    )
    .unwrap();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    let mut body = builder.method(main).unwrap();
    let count = body.define_variable(types.uint);
    let value = body.define_variable(types.float);
    body.load_field(count, counter)
        .store_field(color, value)
        .load_field(value, depth)
        .store_field(color, value)
        .ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    let variables: FxHashMap<u32, u32> = ops(&module, Op::Variable)
        .iter()
        .filter(|variable| variable.operands[2] != StorageClass::Function as u32)
        .map(|variable| (variable.operands[1], variable.operands[2]))
        .collect();
    assert_eq!(variables.len(), 3);

    let entry_point = &ops(&module, Op::EntryPoint)[0];
    let interface = &entry_point.operands[entry_point.operands.len() - 3..];
    let classes: Vec<u32> = interface.iter().map(|id| variables[id]).collect();
    assert_eq!(
        classes,
        vec![
            StorageClass::Input as u32,
            StorageClass::Output as u32,
            StorageClass::Private as u32,
        ]
    );

    let decorations = ops(&module, Op::Decorate);
    assert_eq!(decorations.len(), 2);
    assert!(decorations
        .iter()
        .all(|decoration| decoration.operands[1] == Decoration::Location as u32));
}

/// Interface operands of an `OpEntryPoint`, after its nul-terminated name.
fn interface(entry_point: &RawInstruction) -> Vec<u32> {
    let name_end = entry_point.operands[2..]
        .iter()
        .position(|word| word.to_le_bytes().contains(&0))
        .unwrap();
    entry_point.operands[name_end + 3..].to_vec()
}

#[test]
fn interface_covers_fields_reached_through_callees() {
    let (mut builder, types) = builder();
    let light = builder
        .define_field(
            types.shader,
            "light",
            types.float,
            [
                NeslAttribute::Static,
                NeslAttribute::Storage(FieldStorage::Input),
                NeslAttribute::Location(0),
            ],
        )
        .unwrap();
    let color = builder
        .define_field(
            types.shader,
            "color",
            types.float,
            [
                NeslAttribute::Static,
                NeslAttribute::Storage(FieldStorage::Output),
                NeslAttribute::Location(0),
            ],
        )
        .unwrap();

    let sample = static_method(&mut builder, types.shader, "sample", Some(types.float), &[]);
    let mut body = builder.method(sample).unwrap();
    let value = body.define_variable(types.float);
    body.load_field(value, light).ret_value(value);

    let lit = static_method(&mut builder, types.shader, "lit", None, &[]);
    let mut body = builder.method(lit).unwrap();
    let value = body.define_variable(types.float);
    body.call(Some(value), sample, &[]).ret();

    let flat = static_method(&mut builder, types.shader, "flat", None, &[]);
    let mut body = builder.method(flat).unwrap();
    let value = body.define_variable(types.float);
    body.load_float32(value, 1.0).store_field(color, value).ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[lit, flat])).unwrap();

    let globals: FxHashMap<u32, u32> = ops(&module, Op::Variable)
        .iter()
        .filter(|variable| variable.operands[2] != StorageClass::Function as u32)
        .map(|variable| (variable.operands[1], variable.operands[2]))
        .collect();
    let entry_points = ops(&module, Op::EntryPoint);
    assert_eq!(entry_points.len(), 2);
    for entry_point in &entry_points {
        let classes: Vec<u32> = interface(entry_point)
            .iter()
            .map(|id| globals[id])
            .collect();
        assert_eq!(
            classes,
            vec![StorageClass::Input as u32, StorageClass::Output as u32]
        );
    }
}

#[test]
fn repeated_entry_point_is_declared_once() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main, main])).unwrap();

    assert_eq!(ops(&module, Op::EntryPoint).len(), 1);
    assert_eq!(ops(&module, Op::ExecutionMode).len(), 1);
    assert_eq!(ops(&module, Op::Function).len(), 1);
}

#[test]
fn same_method_under_two_models_is_not_a_duplicate() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let error = compile(
        &assembly,
        &[
            NeslEntryPoint::new(main, ExecutionModel::Fragment),
            NeslEntryPoint::new(main, ExecutionModel::Vertex),
        ],
    )
    .unwrap_err();
    assert!(
        matches!(
            error,
            CompileError::UnsupportedExecutionModel(ExecutionModel::Vertex)
        ),
        "{error}"
    );
}

#[test]
fn generic_callee_is_specialized_per_argument_type() {
    let (mut builder, types) = builder();
    let t = builder.define_generic_parameter("T");
    let identity = static_method(&mut builder, types.shader, "identity", Some(t), &[t]);
    builder.method(identity).unwrap().ret_value(0);
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    let mut body = builder.method(main).unwrap();
    let float = body.define_variable(types.float);
    let uint = body.define_variable(types.uint);
    let again = body.define_variable(types.float);
    body.load_float32(float, 1.0)
        .load_uint32(uint, 7)
        .call(Some(float), identity, &[float])
        .call(Some(uint), identity, &[uint])
        .call(Some(again), identity, &[float])
        .ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    assert_eq!(ops(&module, Op::Function).len(), 3);
    let calls = ops(&module, Op::FunctionCall);
    assert_eq!(calls.len(), 3);
    assert_ne!(calls[0].operands[2], calls[1].operands[2]);
    assert_eq!(calls[0].operands[2], calls[2].operands[2]);
    assert_ne!(calls[0].operands[0], calls[1].operands[0]);
    assert_eq!(ops(&module, Op::Constant).len(), 2);
}

#[test]
fn instance_method_receives_its_owner() {
    let (mut builder, types) = builder();
    builder.define_field(types.shader, "intensity", types.float, []).unwrap();
    let scale = builder
        .define_method(types.shader, "scale", None, &[types.float], [])
        .unwrap();
    builder.method(scale).unwrap().ret();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    let mut body = builder.method(main).unwrap();
    let receiver = body.define_variable(types.shader);
    let factor = body.define_variable(types.float);
    body.call(None, scale, &[receiver, factor]).ret();
    let assembly = builder.build();

    let module = compile(&assembly, &fragment(&[main])).unwrap();

    assert_eq!(ops(&module, Op::TypeStruct).len(), 1);
    assert_eq!(ops(&module, Op::FunctionParameter).len(), 2);
    assert_eq!(ops(&module, Op::FunctionCall)[0].operands.len(), 3 + 2);
}

#[test]
fn recursion_is_cyclic_construction() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().call(None, main, &[]).ret();
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(
        matches!(error, CompileError::CyclicConstruction { ref key } if key.starts_with("function")),
        "{error}"
    );
}

#[test]
fn unresolved_callee_aborts_compilation() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().call(None, MethodId::new(99), &[]).ret();
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(matches!(error, CompileError::UnresolvedMethod(99)), "{error}");
}

#[test]
fn argument_count_must_match_callee() {
    let (mut builder, types) = builder();
    let helper = static_method(&mut builder, types.shader, "helper", None, &[types.float]);
    builder.method(helper).unwrap().ret();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().call(None, helper, &[]).ret();
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(
        matches!(
            error,
            CompileError::ArgumentCountMismatch {
                given: 0,
                expected: 1,
                ..
            }
        ),
        "{error}"
    );
}

#[test]
fn unknown_slot_is_unresolved() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().load(3, 0).ret();
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(
        matches!(error, CompileError::UnresolvedSlot { slot: 0, .. }),
        "{error}"
    );
}

#[test]
fn return_value_requires_a_bound_slot() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", Some(types.float), &[]);
    builder.method(main).unwrap().ret_value(NO_SLOT);
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(
        matches!(error, CompileError::MissingResultBinding { ref method } if method == "Shader::main"),
        "{error}"
    );
}

#[test]
fn instance_field_has_no_global_variable() {
    let (mut builder, types) = builder();
    let intensity = builder.define_field(types.shader, "intensity", types.float, []).unwrap();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    let mut body = builder.method(main).unwrap();
    let value = body.define_variable(types.float);
    body.load_field(value, intensity).ret();
    let assembly = builder.build();

    let error = compile(&assembly, &fragment(&[main])).unwrap_err();
    assert!(matches!(error, CompileError::NonStaticField { .. }), "{error}");
}

#[test]
fn only_fragment_shaders_are_supported() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let error = compile(
        &assembly,
        &[NeslEntryPoint::new(main, ExecutionModel::Vertex)],
    )
    .unwrap_err();
    assert!(
        matches!(
            error,
            CompileError::UnsupportedExecutionModel(ExecutionModel::Vertex)
        ),
        "{error}"
    );
}

#[test]
fn header_words_follow_configuration() {
    let (mut builder, types) = builder();
    let main = static_method(&mut builder, types.shader, "main", None, &[]);
    builder.method(main).unwrap().ret();
    let assembly = builder.build();

    let config = CompilerConfig::single_threaded()
        .version(0x0001_0000)
        .generator(0xdead_beef);
    let module = SpirVCompiler::compile(&assembly, &fragment(&[main]), config).unwrap();

    assert_eq!(module.words()[1], 0x0001_0000);
    assert_eq!(module.words()[2], 0xdead_beef);
}

/// `count` fragment entry points, each calling a chain of shared helpers.
fn layered(count: usize) -> (NeslAssembly, Vec<NeslEntryPoint>) {
    let (mut builder, types) = builder();
    let leaf = static_method(&mut builder, types.shader, "leaf", Some(types.float), &[types.float]);
    builder.method(leaf).unwrap().ret_value(0);
    let middle = static_method(&mut builder, types.shader, "middle", Some(types.float), &[types.float]);
    let mut body = builder.method(middle).unwrap();
    let result = body.define_variable(types.float);
    body.call(Some(result), leaf, &[0]).ret_value(result);

    let output = builder.define_field(
        types.shader,
        "output",
        types.float,
        [
            NeslAttribute::Static,
            NeslAttribute::Storage(FieldStorage::Output),
        ],
    )
    .unwrap();
    let mut entry_points = Vec::with_capacity(count);
    for index in 0..count {
        let main = static_method(&mut builder, types.shader, &format!("main{index}"), None, &[]);
        let mut body = builder.method(main).unwrap();
        let value = body.define_variable(types.float);
        #[expect(clippy::cast_precision_loss, reason = "small test indices")]
        let payload = index as f32;
        body.load_float32(value, payload)
            .call(Some(value), if index % 2 == 0 { middle } else { leaf }, &[value])
            .store_field(output, value)
            .ret();
        entry_points.push(NeslEntryPoint::new(main, ExecutionModel::Fragment));
    }
    (builder.build(), entry_points)
}

#[test]
fn single_threaded_output_is_deterministic() {
    let (assembly, entry_points) = layered(6);

    let first = compile(&assembly, &entry_points).unwrap();
    let second = compile(&assembly, &entry_points).unwrap();

    assert_eq!(first.code(), second.code());
}

#[test]
fn independent_entry_points_compile_identically_on_a_pool() {
    let (mut builder, types) = builder();
    let mut methods = Vec::new();
    for index in 0..16u8 {
        let main = static_method(&mut builder, types.shader, &format!("main{index}"), None, &[]);
        let mut body = builder.method(main).unwrap();
        let value = body.define_variable(types.float);
        body.load_float32(value, f32::from(index)).ret();
        methods.push(main);
    }
    let assembly = builder.build();
    let entry_points = fragment(&methods);

    let reference = compile(&assembly, &entry_points).unwrap();
    for _ in 0..8 {
        let parallel =
            SpirVCompiler::compile(&assembly, &entry_points, CompilerConfig::with_threads(8))
                .unwrap();
        assert_eq!(reference.code(), parallel.code());
    }

    // Constants follow entry-point order.
    let payloads: Vec<u32> = ops(&reference, Op::Constant)
        .iter()
        .map(|constant| constant.operands[2])
        .collect();
    let expected: Vec<u32> = (0..16u8).map(|index| f32::from(index).to_bits()).collect();
    assert_eq!(payloads, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn pool_size_does_not_change_the_module(threads in 1usize..8, count in 1usize..10) {
        let (assembly, entry_points) = layered(count);

        let reference = compile(&assembly, &entry_points).unwrap();
        let parallel = SpirVCompiler::compile(
            &assembly,
            &entry_points,
            CompilerConfig::with_threads(threads),
        )
        .unwrap();

        prop_assert_eq!(reference.bound(), parallel.bound());
        prop_assert_eq!(histogram(&reference), histogram(&parallel));
        prop_assert_eq!(reference.code(), parallel.code());
    }
}
