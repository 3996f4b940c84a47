use super::{Frame, ValueRef};
use crate::errors::{SimulationError, SimulationErrorKind};
use crate::jvm::code::{Instruction, MethodBody, SynLabel};
use crate::jvm::BinaryName;
use std::collections::HashMap;

/// Compute the frame right before the instruction at index `target`
///
/// Instructions are replayed in body order starting from `initial` (the frame on entry to the
/// method). Nothing is known about the frame after an unconditional transfer (`goto`, a return,
/// `athrow` or a switch) until the next `Frame` marker, or until a label that some jump targets.
/// There the frame recorded at the first jump to that label takes over. Handlers of protected
/// ranges start with the locals found on entry to the range and the caught exception on the stack.
pub fn simulate(
    body: &MethodBody,
    target: usize,
    initial: &Frame,
    this_class: &BinaryName,
) -> Result<Frame, SimulationError> {
    let len = body.instructions.len();
    if target > len {
        return Err(SimulationError {
            index: target,
            instruction: String::from("<end of method>"),
            kind: SimulationErrorKind::OutOfBounds,
        });
    }

    // Backward jumps into code after an unconditional transfer need another pass
    let mut recorded: HashMap<SynLabel, Frame> = HashMap::new();
    loop {
        let known = recorded.len();
        let at_target = linear_pass(body, target, initial, this_class, &mut recorded)?;
        if let Some(frame) = at_target {
            return Ok(frame);
        }
        if recorded.len() == known {
            return Err(SimulationError {
                index: target,
                instruction: body
                    .instructions
                    .get(target)
                    .map_or_else(|| String::from("<end of method>"), |insn| format!("{:?}", insn)),
                kind: SimulationErrorKind::Unreachable,
            });
        }
    }
}

/// One replay of the whole body, recording the frame at the first jump to every label
fn linear_pass(
    body: &MethodBody,
    target: usize,
    initial: &Frame,
    this_class: &BinaryName,
    recorded: &mut HashMap<SynLabel, Frame>,
) -> Result<Option<Frame>, SimulationError> {
    let mut current = Some(initial.clone());
    let mut at_target = None;

    for (index, insn) in body.instructions.iter().enumerate() {
        if index == target {
            at_target = current.clone();
        }
        match insn {
            Instruction::Frame(marker) => current = Some(Frame::clone(marker)),
            Instruction::Label(label) if current.is_none() => {
                current = recorded.get(label).cloned();
            }
            _ => (),
        }

        let frame = match current.as_mut() {
            Some(frame) => frame,
            None => continue,
        };
        if let Instruction::Label(label) = insn {
            for block in body.try_catch.iter().filter(|block| block.start == *label) {
                let exception = block.catch_type.clone().unwrap_or(BinaryName::THROWABLE);
                recorded.entry(block.handler).or_insert_with(|| Frame {
                    locals: frame.locals.clone(),
                    stack: [ValueRef::object(exception)].into_iter().collect(),
                });
            }
        }

        frame
            .step(insn, index, this_class)
            .map_err(|kind| SimulationError {
                index,
                instruction: format!("{:?}", insn),
                kind,
            })?;
        for label in insn.jump_targets() {
            recorded.entry(label).or_insert_with(|| frame.clone());
        }
        if !insn.falls_through() {
            current = None;
        }
    }

    if target == body.instructions.len() {
        at_target = current;
    }
    Ok(at_target)
}

/// Which instructions get replayed when computing a frame
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimulationStrategy {
    /// Preceding instructions in body order, following the frames of jumps (see [`simulate`])
    Linear,

    /// Only the blocks dominating the target (see [`super::simulate_dominated`])
    Dominated,
}

impl SimulationStrategy {
    pub fn simulate(
        &self,
        body: &MethodBody,
        target: usize,
        initial: &Frame,
        this_class: &BinaryName,
    ) -> Result<Frame, SimulationError> {
        match self {
            SimulationStrategy::Linear => simulate(body, target, initial, this_class),
            SimulationStrategy::Dominated => {
                super::simulate_dominated(body, target, initial, this_class)
            }
        }
    }
}

/// Step the frame through the instructions at the given indices, in order
pub(crate) fn replay(
    frame: &mut Frame,
    body: &MethodBody,
    indices: impl IntoIterator<Item = usize>,
    this_class: &BinaryName,
) -> Result<(), SimulationError> {
    for index in indices {
        let insn = body
            .instructions
            .get(index)
            .ok_or_else(|| SimulationError {
                index,
                instruction: String::from("<end of method>"),
                kind: SimulationErrorKind::OutOfBounds,
            })?;
        frame
            .step(insn, index, this_class)
            .map_err(|kind| SimulationError {
                index,
                instruction: format!("{:?}", insn),
                kind,
            })?;
    }
    Ok(())
}
