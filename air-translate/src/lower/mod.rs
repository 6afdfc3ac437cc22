//! AIR → SPIR-V lowering: turns one parsed `llvm_ir::Function` plus its
//! already-extracted [`crate::metadata::FunctionInfo`] into a complete
//! SPIR-V module (spec.md §1, §3).
//!
//! The driving loop here mirrors `AIR::Function::analyze` +
//! `AIR::Library::buildModule` (`src/iridium/air.cpp`): metadata drives
//! which global resource/builtin variables a function needs, then its
//! basic blocks are walked in order and each instruction lowered in place.
//! Unlike the original, metadata extraction ([`crate::metadata`]) and
//! instruction lowering stay in separate modules here — friendlier to unit
//! test in isolation, same overall shape.

mod air_metadata;
mod cfg;
mod instr;
mod intrinsics;
mod value;

use air_types::{BindingType, FunctionType};
use llvm_ir::{Name, Terminator};
use rustc_hash::FxHashMap;

use crate::error::TranslationError;
use crate::metadata::FunctionInfo;
use crate::spirv::{Builder, FunctionWriter, Instruction, ScalarKind};

pub use air_metadata::{find_function_root, parameter_metadata_tuples, parameter_tuples_to_positional};

/// A fully lowered entry point: its SPIR-V words plus the entry point name
/// SPIR-V's `OpEntryPoint` records it under (not necessarily the AIR
/// function's mangled name once name-mangling stripping is added).
pub struct LoweredFunction {
    pub words: Vec<u32>,
    pub entry_point_name: String,
}

/// Lowers a single AIR function to a standalone SPIR-V module.
///
/// Each translated function gets its own module (its own capability/type
/// arena) rather than packing every function from a library into one
/// binary: the Runtime creates one `VkShaderModule` per `Function` (spec.md
/// §4.5), so there's no benefit to sharing SPIR-V ids across functions and
/// real cost (id-space bloat) to doing so.
pub fn lower_function(
    function: &llvm_ir::Function,
    stage: FunctionType,
    info: &FunctionInfo,
) -> Result<LoweredFunction, TranslationError> {
    let name = function.name.clone();
    let mut builder = Builder::new();
    let mut values = value::ValueMap::default();

    let (interface, pending_buffers) = declare_interface(&mut builder, &mut values, function, stage, info)?;

    let void_ty = builder.type_void();
    let void_fn_ty = builder.type_function(void_ty, Vec::new());
    let entry_id = builder.alloc_id();
    builder.name(entry_id, &name);

    let execution_model = match stage {
        FunctionType::Vertex => spirv::ExecutionModel::Vertex,
        FunctionType::Fragment => spirv::ExecutionModel::Fragment,
        FunctionType::Kernel => spirv::ExecutionModel::GLCompute,
    };
    builder.entry_point(execution_model, entry_id, &name, &interface);
    match stage {
        FunctionType::Fragment => {
            builder.execution_mode(entry_id, spirv::ExecutionMode::OriginUpperLeft, &[]);
        }
        FunctionType::Kernel => {
            // Three `SpecId`-decorated scalars (0, 1, 2) composed into the
            // `WorkgroupSize` builtin, not a fixed `LocalSize`: the Runtime
            // supplies the real per-dispatch threadgroup size through these
            // three specialization constants (spec.md §4.11, §6).
            let x = builder.spec_constant_uint(1, 32);
            let y = builder.spec_constant_uint(1, 32);
            let z = builder.spec_constant_uint(1, 32);
            builder.decorate(x, spirv::Decoration::SpecId, &[0]);
            builder.decorate(y, spirv::Decoration::SpecId, &[1]);
            builder.decorate(z, spirv::Decoration::SpecId, &[2]);
            let vec3_uint = builder.type_vector(3, ScalarKind::Uint, 32);
            let workgroup_size = builder.spec_constant_composite(vec3_uint, &[x, y, z]);
            builder.decorate(workgroup_size, spirv::Decoration::BuiltIn, &[spirv::BuiltIn::WorkgroupSize as u32]);
        }
        FunctionType::Vertex => {}
    }

    let mut writer = FunctionWriter::new(entry_id, void_fn_ty, void_ty);
    let entry_block = writer.new_block(&mut builder);
    bind_buffer_addresses(&mut builder, &mut values, &mut writer, entry_block, &pending_buffers);

    let block_count = function.basic_blocks.len().max(1);
    let mut block_labels = vec![entry_block];
    for _ in 1..block_count {
        block_labels.push(writer.new_block(&mut builder));
    }

    let name_to_index = build_name_index(function);
    let edges = build_edges(function, &name_to_index);
    let cfg = cfg::ControlFlowGraph::build(&name, block_count, &edges)?;

    for (index, block) in function.basic_blocks.iter().enumerate() {
        let label = block_labels[index];
        lower_block(&name, &mut builder, &mut values, &mut writer, label, block)?;
        lower_terminator(
            &name,
            &mut builder,
            &mut values,
            &mut writer,
            &cfg,
            &block_labels,
            &name_to_index,
            index,
            label,
            &block.term,
        )?;
    }

    writer.finish(&mut builder);
    Ok(LoweredFunction { words: builder.finish(), entry_point_name: name })
}

fn build_name_index(function: &llvm_ir::Function) -> FxHashMap<Name, usize> {
    function
        .basic_blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.clone(), i))
        .collect()
}

fn target_index(name_to_index: &FxHashMap<Name, usize>, name: &Name) -> usize {
    *name_to_index.get(name).expect("branch target references an unknown basic block")
}

fn build_edges(function: &llvm_ir::Function, name_to_index: &FxHashMap<Name, usize>) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for (index, block) in function.basic_blocks.iter().enumerate() {
        match &block.term {
            Terminator::Br(br) => edges.push((index, target_index(name_to_index, &br.dest))),
            Terminator::CondBr(br) => {
                edges.push((index, target_index(name_to_index, &br.true_dest)));
                edges.push((index, target_index(name_to_index, &br.false_dest)));
            }
            _ => {}
        }
    }
    edges
}

fn lower_block(
    function_name: &str,
    builder: &mut Builder,
    values: &mut value::ValueMap,
    writer: &mut FunctionWriter,
    label: spirv::Word,
    block: &llvm_ir::BasicBlock,
) -> Result<(), TranslationError> {
    let mut words = Vec::new();
    for instr in &block.instrs {
        if let llvm_ir::instruction::Instruction::Store(store) = instr {
            instr::lower_store(builder, values, &mut words, store);
            continue;
        }
        instr::lower_instruction(function_name, builder, values, &mut words, instr)?;
    }
    for inst in words {
        writer.block_mut(label).push(inst);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn lower_terminator(
    function_name: &str,
    builder: &mut Builder,
    values: &mut value::ValueMap,
    writer: &mut FunctionWriter,
    cfg: &cfg::ControlFlowGraph,
    block_labels: &[spirv::Word],
    name_to_index: &FxHashMap<Name, usize>,
    current_index: usize,
    current_label: spirv::Word,
    term: &Terminator,
) -> Result<(), TranslationError> {
    match term {
        Terminator::Ret(_) => {
            writer.ret(current_label);
            Ok(())
        }
        Terminator::Br(br) => {
            let target = block_labels[target_index(name_to_index, &br.dest)];
            writer.branch(current_label, target);
            Ok(())
        }
        Terminator::CondBr(br) => {
            let then_index = target_index(name_to_index, &br.true_dest);
            let else_index = target_index(name_to_index, &br.false_dest);
            let then_label = block_labels[then_index];
            let else_label = block_labels[else_index];

            if cfg.is_back_edge(current_index, then_index) || cfg.is_back_edge(current_index, else_index) {
                // loop back edge: the loop header already emitted its
                // OpLoopMerge when it was visited as a block in program
                // order, since AIR/clang always places the header before
                // its body in the basic-block list.
                let merge = cfg
                    .nearest_common_successor(then_index, else_index)
                    .map(|i| block_labels[i])
                    .unwrap_or(then_label);
                writer.loop_merge(current_label, merge, current_label);
            } else if let Some(merge_index) = cfg.nearest_common_successor(then_index, else_index) {
                let merge_label = block_labels[merge_index];
                writer.selection_merge(current_label, merge_label);
            }

            let condition = values.resolve(builder, &br.condition);
            writer.branch_conditional(current_label, condition, then_label, else_label);
            Ok(())
        }
        Terminator::Unreachable(_) => {
            writer.unreachable(current_label);
            Ok(())
        }
        other => Err(TranslationError::UnsupportedInstruction {
            name: function_name.to_string(),
            what: format!("{other:?} terminator"),
        }),
    }
}

/// A `Buffer` binding whose `PhysicalStorageBuffer` pointer can't be
/// materialized until the entry block exists (spec.md §4.6); collected here
/// and resolved by [`bind_buffer_addresses`] once `lower_function` has one.
struct PendingBuffer {
    param_name: Option<Name>,
    external_index: u32,
}

/// Declares the global `Input`/`Output`/`UniformConstant` variables a
/// function's texture/sampler/vertex-input bindings and stage builtins need,
/// and seeds `ValueMap` with each AIR function parameter's id (resources are
/// accessed through these global pointers, not SPIR-V function parameters,
/// since shader-stage entry points in the logical addressing model take
/// none). `Buffer` bindings are collected into the returned `PendingBuffer`
/// list instead, since their pointer is a computed value, not a variable.
fn declare_interface(
    builder: &mut Builder,
    values: &mut value::ValueMap,
    function: &llvm_ir::Function,
    stage: FunctionType,
    info: &FunctionInfo,
) -> Result<(Vec<spirv::Word>, Vec<PendingBuffer>), TranslationError> {
    let mut interface = Vec::new();
    let mut pending_buffers = Vec::new();
    let float_ty = builder.type_float(32);
    let vec4_ty = builder.type_vector(4, ScalarKind::Float, 32);

    for binding in &info.bindings {
        let param_name = function
            .parameters
            .get(binding.external_index as usize)
            .map(|p| p.name.clone());

        if binding.ty == BindingType::Buffer {
            pending_buffers.push(PendingBuffer { param_name, external_index: binding.external_index });
            continue;
        }

        let (storage_class, pointee) = match binding.ty {
            BindingType::Texture => {
                let image_ty = builder.declare_sampled_image_type(float_ty);
                (spirv::StorageClass::UniformConstant, image_ty)
            }
            BindingType::Sampler => {
                let sampler_ty = builder.declare_sampler_type();
                (spirv::StorageClass::UniformConstant, sampler_ty)
            }
            BindingType::VertexInput => (spirv::StorageClass::Input, vec4_ty),
            BindingType::Buffer => unreachable!("handled above"),
        };

        let ptr_ty = builder.type_pointer(storage_class, pointee);
        let var = builder.alloc_id();
        let mut inst = Instruction::new(spirv::Op::Variable);
        inst.set_type(ptr_ty);
        inst.set_result(var);
        inst.add_operand(storage_class as u32);
        builder.push_global_variable(inst);

        if !matches!(storage_class, spirv::StorageClass::Input) {
            builder.decorate(var, spirv::Decoration::DescriptorSet, &[0]);
            builder.decorate(var, spirv::Decoration::Binding, &[binding.internal_index]);
        } else {
            interface.push(var);
        }

        if let Some(param_name) = param_name {
            values.bind(param_name, var, value::ValueKind::Pointer(pointee));
        }
    }

    match stage {
        FunctionType::Vertex => {
            let ptr_ty = builder.type_pointer(spirv::StorageClass::Output, vec4_ty);
            let position = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Variable);
            inst.set_type(ptr_ty);
            inst.set_result(position);
            inst.add_operand(spirv::StorageClass::Output as u32);
            builder.push_global_variable(inst);
            builder.decorate(position, spirv::Decoration::BuiltIn, &[spirv::BuiltIn::Position as u32]);
            interface.push(position);
        }
        FunctionType::Fragment => {
            let ptr_ty = builder.type_pointer(spirv::StorageClass::Input, vec4_ty);
            let frag_coord = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Variable);
            inst.set_type(ptr_ty);
            inst.set_result(frag_coord);
            inst.add_operand(spirv::StorageClass::Input as u32);
            builder.push_global_variable(inst);
            builder.decorate(frag_coord, spirv::Decoration::BuiltIn, &[spirv::BuiltIn::FragCoord as u32]);
            interface.push(frag_coord);
        }
        FunctionType::Kernel => {
            let vec3_uint = builder.type_vector(3, ScalarKind::Uint, 32);
            let ptr_ty = builder.type_pointer(spirv::StorageClass::Input, vec3_uint);
            let invocation_id = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Variable);
            inst.set_type(ptr_ty);
            inst.set_result(invocation_id);
            inst.add_operand(spirv::StorageClass::Input as u32);
            builder.push_global_variable(inst);
            builder.decorate(invocation_id, spirv::Decoration::BuiltIn, &[spirv::BuiltIn::GlobalInvocationId as u32]);
            interface.push(invocation_id);
        }
    }

    Ok((interface, pending_buffers))
}

/// Materializes each pending buffer parameter's `PhysicalStorageBuffer`
/// pointer at the top of the entry block: loads the 64-bit device address
/// out of the binding-0 address UBO at word offset `external_index`
/// (spec.md §4.6, §8 — "the emitted UBO contains, at offset 8·i, the 64-bit
/// device address ... at external index i") and converts it to a pointer
/// over the same buffer layout every AIR buffer binding uses (spec.md §4.6).
fn bind_buffer_addresses(
    builder: &mut Builder,
    values: &mut value::ValueMap,
    writer: &mut FunctionWriter,
    entry_block: spirv::Word,
    pending: &[PendingBuffer],
) {
    if pending.is_empty() {
        return;
    }

    let count = pending.iter().map(|b| b.external_index).max().unwrap_or(0) + 1;

    let uint_ty = builder.type_int(32, false);
    let ulong_ty = builder.type_int(64, false);
    let runtime_array_ty = builder.type_runtime_array(uint_ty, 4);
    let buffer_struct_ty = builder.type_struct(vec![runtime_array_ty], vec![0]);
    let physical_ptr_ty = builder.type_pointer(spirv::StorageClass::PhysicalStorageBuffer, buffer_struct_ty);

    let address_array_ty = builder.type_array(ulong_ty, count, 8);
    let ubo_struct_ty = builder.type_struct(vec![address_array_ty], vec![0]);
    let ubo_ptr_ty = builder.type_pointer(spirv::StorageClass::Uniform, ubo_struct_ty);
    let element_ptr_ty = builder.type_pointer(spirv::StorageClass::Uniform, ulong_ty);

    let ubo_var = builder.alloc_id();
    let mut var_inst = Instruction::new(spirv::Op::Variable);
    var_inst.set_type(ubo_ptr_ty);
    var_inst.set_result(ubo_var);
    var_inst.add_operand(spirv::StorageClass::Uniform as u32);
    builder.push_global_variable(var_inst);
    builder.decorate(ubo_var, spirv::Decoration::DescriptorSet, &[0]);
    builder.decorate(ubo_var, spirv::Decoration::Binding, &[0]);

    let zero = builder.constant_uint(0, 32);

    for buf in pending {
        let index = builder.constant_uint(buf.external_index as u64, 32);

        let access_id = builder.alloc_id();
        let mut access = Instruction::new(spirv::Op::AccessChain);
        access.set_type(element_ptr_ty);
        access.set_result(access_id);
        access.add_operand(ubo_var);
        access.add_operand(zero);
        access.add_operand(index);
        writer.block_mut(entry_block).push(access);

        let loaded = builder.alloc_id();
        let mut load = Instruction::new(spirv::Op::Load);
        load.set_type(ulong_ty);
        load.set_result(loaded);
        load.add_operand(access_id);
        writer.block_mut(entry_block).push(load);

        let ptr_value = builder.alloc_id();
        let mut convert = Instruction::new(spirv::Op::ConvertUToPtr);
        convert.set_type(physical_ptr_ty);
        convert.set_result(ptr_value);
        convert.add_operand(loaded);
        writer.block_mut(entry_block).push(convert);

        if let Some(name) = &buf.param_name {
            values.bind(name.clone(), ptr_value, value::ValueKind::PhysicalPointer(buffer_struct_ty));
        }
    }
}
