//! Per-function instruction stream: `OpFunction` through `OpFunctionEnd`,
//! built up block by block as the lowering pass walks the reconstructed CFG.

use spirv::Word;

use super::builder::Builder;
use super::layout::Instruction;

pub struct Block {
    pub label: Word,
    instructions: Vec<Instruction>,
    terminated: bool,
}

impl Block {
    pub fn new(label: Word) -> Self {
        Self { label, instructions: Vec::new(), terminated: false }
    }

    pub fn push(&mut self, inst: Instruction) {
        debug_assert!(!self.terminated, "pushed an instruction after a block terminator");
        self.instructions.push(inst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn terminate(&mut self, inst: Instruction) {
        self.instructions.push(inst);
        self.terminated = true;
    }
}

pub struct FunctionWriter {
    function_id: Word,
    function_type: Word,
    return_type: Word,
    params: Vec<(Word, Word)>,
    blocks: Vec<Block>,
}

impl FunctionWriter {
    pub fn new(function_id: Word, function_type: Word, return_type: Word) -> Self {
        Self {
            function_id,
            function_type,
            return_type,
            params: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn add_param(&mut self, ty: Word, id: Word) {
        self.params.push((ty, id));
    }

    pub fn new_block(&mut self, builder: &mut Builder) -> Word {
        let label = builder.alloc_id();
        self.blocks.push(Block::new(label));
        label
    }

    pub fn block_mut(&mut self, label: Word) -> &mut Block {
        self.blocks
            .iter_mut()
            .find(|b| b.label == label)
            .expect("unknown block label")
    }

    pub fn branch(&mut self, from: Word, to: Word) {
        let block = self.block_mut(from);
        let mut inst = Instruction::new(spirv::Op::Branch);
        inst.add_operand(to);
        block.terminate(inst);
    }

    pub fn branch_conditional(&mut self, from: Word, condition: Word, then_label: Word, else_label: Word) {
        let block = self.block_mut(from);
        let mut inst = Instruction::new(spirv::Op::BranchConditional);
        inst.add_operand(condition);
        inst.add_operand(then_label);
        inst.add_operand(else_label);
        block.terminate(inst);
    }

    pub fn selection_merge(&mut self, label: Word, merge_block: Word) {
        let block = self.block_mut(label);
        let mut inst = Instruction::new(spirv::Op::SelectionMerge);
        inst.add_operand(merge_block);
        inst.add_operand(spirv::SelectionControl::NONE.bits());
        block.push(inst);
    }

    pub fn loop_merge(&mut self, label: Word, merge_block: Word, continue_target: Word) {
        let block = self.block_mut(label);
        let mut inst = Instruction::new(spirv::Op::LoopMerge);
        inst.add_operand(merge_block);
        inst.add_operand(continue_target);
        inst.add_operand(spirv::LoopControl::NONE.bits());
        block.push(inst);
    }

    pub fn ret(&mut self, label: Word) {
        let block = self.block_mut(label);
        block.terminate(Instruction::new(spirv::Op::Return));
    }

    pub fn ret_value(&mut self, label: Word, value: Word) {
        let block = self.block_mut(label);
        let mut inst = Instruction::new(spirv::Op::ReturnValue);
        inst.add_operand(value);
        block.terminate(inst);
    }

    pub fn unreachable(&mut self, label: Word) {
        let block = self.block_mut(label);
        block.terminate(Instruction::new(spirv::Op::Unreachable));
    }

    /// Flushes `OpFunction` .. `OpFunctionEnd` into the builder's function
    /// section. The caller must have terminated every block first.
    pub fn finish(self, builder: &mut Builder) {
        let mut words = Vec::new();

        let mut header = Instruction::new(spirv::Op::Function);
        header.set_type(self.return_type);
        header.set_result(self.function_id);
        header.add_operand(spirv::FunctionControl::NONE.bits());
        header.add_operand(self.function_type);
        header.to_words(&mut words);

        for (ty, id) in &self.params {
            let mut inst = Instruction::new(spirv::Op::FunctionParameter);
            inst.set_type(*ty);
            inst.set_result(*id);
            inst.to_words(&mut words);
        }

        for block in &self.blocks {
            debug_assert!(block.is_terminated(), "block {} has no terminator", block.label);
            let mut label = Instruction::new(spirv::Op::Label);
            label.set_result(block.label);
            label.to_words(&mut words);
            for inst in &block.instructions {
                inst.to_words(&mut words);
            }
        }

        Instruction::new(spirv::Op::FunctionEnd).to_words(&mut words);
        builder.push_function_words(&words);
    }
}
