use super::{Instruction, SynLabel, SynLabelGenerator};
use crate::errors::{fit, MixinError};
use crate::jvm::BinaryName;

/// Entry in the exception table of a method body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected range (inclusive)
    pub start: SynLabel,

    /// End of the protected range (exclusive)
    pub end: SynLabel,

    /// Start of the exception handler
    pub handler: SynLabel,

    /// Exception class caught, or `None` for all throwables
    pub catch_type: Option<BinaryName>,
}

/// Semantic representation of a method body
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBody {
    /// Instructions, in order
    pub instructions: Vec<Instruction>,

    /// Exception table
    pub try_catch: Vec<TryCatchBlock>,

    /// Maximum size of locals through the method
    pub max_locals: u16,

    /// Maximum size of stack through the method
    pub max_stack: u16,
}

impl MethodBody {
    pub fn new(instructions: Vec<Instruction>, max_locals: u16, max_stack: u16) -> MethodBody {
        MethodBody {
            instructions,
            try_catch: vec![],
            max_locals,
            max_stack,
        }
    }

    /// Index of the `Label` pseudo-instruction marking the given label
    pub fn position_of(&self, label: SynLabel) -> Option<usize> {
        self.instructions
            .iter()
            .position(|insn| matches!(insn, Instruction::Label(l) if *l == label))
    }

    /// Every label declared in the body
    pub fn labels(&self) -> Vec<SynLabel> {
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Label(l) => Some(*l),
                _ => None,
            })
            .collect()
    }

    /// Generator for labels not yet used in this body
    pub fn label_generator(&self) -> SynLabelGenerator {
        let mut used = self.labels();
        used.extend(self.instructions.iter().flat_map(Instruction::jump_targets));
        for block in &self.try_catch {
            used.extend([block.start, block.end, block.handler]);
        }
        SynLabelGenerator::after(&used)
    }

    /// Index of the next real (non-pseudo) instruction at or after `from`
    pub fn next_real(&self, from: usize) -> Option<usize> {
        (from..self.instructions.len()).find(|&idx| !self.instructions[idx].is_pseudo())
    }

    /// Bump the declared maximum number of locals, if needed
    pub fn ensure_max_locals(&mut self, locals: usize) -> Result<(), MixinError> {
        let locals: u16 = fit(locals, "Local variable count")?;
        if locals > self.max_locals {
            self.max_locals = locals;
        }
        Ok(())
    }
}
