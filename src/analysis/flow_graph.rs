use super::simulate::replay;
use super::Frame;
use crate::errors::{SimulationError, SimulationErrorKind};
use crate::jvm::code::{Instruction, MethodBody, SynLabel};
use crate::jvm::BinaryName;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Straight-line run of instructions
///
/// Instruction indices are listed in execution order, which need not be the order in the method
/// body (a `goto` into code that is only reachable through it gets merged in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicBlock {
    pub instructions: Vec<usize>,
    pub successors: BTreeSet<usize>,
    pub predecessors: BTreeSet<usize>,
}

/// Control flow graph of a method body, along with its dominators
///
/// Blocks live in an arena and refer to each other by index. A block is identified by the index
/// of its first instruction, and the entry block is always `FlowGraph::ROOT`.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// Blocks, indexed by their first instruction (`None` once merged into another block)
    blocks: Vec<Option<BasicBlock>>,

    /// Block containing each instruction
    block_of: Vec<usize>,

    /// Dominators of every reachable block (including the block itself)
    dominators: BTreeMap<usize, BTreeSet<usize>>,
}

impl FlowGraph {
    pub const ROOT: usize = 0;

    pub fn new(body: &MethodBody) -> FlowGraph {
        let instructions = &body.instructions;
        let labels: BTreeMap<SynLabel, usize> = instructions
            .iter()
            .enumerate()
            .filter_map(|(idx, insn)| match insn {
                Instruction::Label(label) => Some((*label, idx)),
                _ => None,
            })
            .collect();

        let mut graph = FlowGraph {
            blocks: (0..instructions.len())
                .map(|idx| {
                    Some(BasicBlock {
                        instructions: vec![idx],
                        ..BasicBlock::default()
                    })
                })
                .collect(),
            block_of: (0..instructions.len()).collect(),
            dominators: BTreeMap::new(),
        };

        for (idx, insn) in instructions.iter().enumerate() {
            if insn.falls_through() && idx + 1 < instructions.len() {
                graph.add_edge(idx, idx + 1);
            }
            for target in insn.jump_targets() {
                if let Some(&target) = labels.get(&target) {
                    graph.add_edge(idx, target);
                }
            }
        }

        // Anything in a protected range may jump to the handler
        for block in &body.try_catch {
            let start = labels.get(&block.start);
            let end = labels.get(&block.end);
            let handler = labels.get(&block.handler);
            if let (Some(&start), Some(&end), Some(&handler)) = (start, end, handler) {
                for idx in start..end {
                    graph.add_edge(idx, handler);
                }
            }
        }

        graph.contract();
        graph.dominators = graph.compute_dominators();
        log::trace!(
            "Flow graph has {} blocks",
            graph.blocks.iter().flatten().count()
        );
        graph
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if let Some(block) = self.blocks[from].as_mut() {
            block.successors.insert(to);
        }
        if let Some(block) = self.blocks[to].as_mut() {
            block.predecessors.insert(from);
        }
    }

    /// Successor that the block can absorb: its only successor, of which it is the only
    /// predecessor
    fn mergeable_successor(&self, id: usize) -> Option<usize> {
        let block = self.blocks.get(id)?.as_ref()?;
        if block.successors.len() != 1 {
            return None;
        }
        let successor = *block.successors.iter().next()?;
        if successor == id || successor == FlowGraph::ROOT {
            return None;
        }
        let successor_block = self.blocks.get(successor)?.as_ref()?;
        if successor_block.predecessors.len() == 1 {
            Some(successor)
        } else {
            None
        }
    }

    /// Merge chains of singly-linked nodes into basic blocks
    fn contract(&mut self) {
        for id in 0..self.blocks.len() {
            while let Some(successor) = self.mergeable_successor(id) {
                let absorbed = match self.blocks[successor].take() {
                    Some(absorbed) => absorbed,
                    None => break,
                };
                for &next in &absorbed.successors {
                    if let Some(next_block) = self.blocks[next].as_mut() {
                        next_block.predecessors.remove(&successor);
                        next_block.predecessors.insert(id);
                    }
                }
                for &idx in &absorbed.instructions {
                    self.block_of[idx] = id;
                }
                if let Some(block) = self.blocks[id].as_mut() {
                    block.successors = absorbed.successors;
                    block.instructions.extend(absorbed.instructions);
                }
            }
        }
    }

    fn reachable(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        if self.blocks.is_empty() {
            return seen;
        }
        let mut queue = VecDeque::from([FlowGraph::ROOT]);
        seen.insert(FlowGraph::ROOT);
        while let Some(id) = queue.pop_front() {
            for &next in self.successors(id) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Iterative dataflow: `dom(root) = {root}` and `dom(n) = {n} ∪ ⋂ dom(p)` over predecessors
    fn compute_dominators(&self) -> BTreeMap<usize, BTreeSet<usize>> {
        let reachable = self.reachable();
        let mut dominators: BTreeMap<usize, BTreeSet<usize>> = reachable
            .iter()
            .map(|&id| {
                if id == FlowGraph::ROOT {
                    (id, BTreeSet::from([id]))
                } else {
                    (id, reachable.clone())
                }
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for &id in reachable.iter().filter(|id| **id != FlowGraph::ROOT) {
                let mut updated: Option<BTreeSet<usize>> = None;
                for pred in self.predecessors(id) {
                    if let Some(pred_dominators) = dominators.get(pred) {
                        updated = Some(match updated {
                            None => pred_dominators.clone(),
                            Some(acc) => acc.intersection(pred_dominators).copied().collect(),
                        });
                    }
                }
                let mut updated = updated.unwrap_or_default();
                updated.insert(id);
                if dominators.get(&id) != Some(&updated) {
                    dominators.insert(id, updated);
                    changed = true;
                }
            }
        }

        dominators
    }

    pub fn block(&self, id: usize) -> Option<&BasicBlock> {
        self.blocks.get(id).and_then(Option::as_ref)
    }

    /// Identifiers of all the blocks, in order
    pub fn blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(id, block)| block.as_ref().map(|_| id))
    }

    /// Block containing the instruction at the given index
    pub fn block_of(&self, instruction: usize) -> Option<usize> {
        self.block_of.get(instruction).copied()
    }

    fn successors(&self, id: usize) -> impl Iterator<Item = &usize> + '_ {
        self.block(id).into_iter().flat_map(|block| block.successors.iter())
    }

    fn predecessors(&self, id: usize) -> impl Iterator<Item = &usize> + '_ {
        self.block(id)
            .into_iter()
            .flat_map(|block| block.predecessors.iter())
    }

    /// Dominators of a block, including itself (`None` if the block is unreachable)
    pub fn dominators(&self, id: usize) -> Option<&BTreeSet<usize>> {
        self.dominators.get(&id)
    }

    /// Does every path from the entry to `block` go through `dominator`?
    pub fn dominates(&self, dominator: usize, block: usize) -> bool {
        self.dominators(block)
            .map_or(false, |dominators| dominators.contains(&dominator))
    }

    /// Strict dominator of the block that is dominated by all of its other strict dominators
    pub fn immediate_dominator(&self, id: usize) -> Option<usize> {
        let strict: Vec<usize> = self
            .dominators(id)?
            .iter()
            .copied()
            .filter(|dominator| *dominator != id)
            .collect();
        strict.iter().copied().find(|&candidate| {
            strict
                .iter()
                .all(|&other| other == candidate || !self.dominates(candidate, other))
        })
    }

    /// Chain of immediate dominators from the entry down to the block (inclusive)
    pub fn dominance_path(&self, id: usize) -> Option<Vec<usize>> {
        self.dominators(id)?;
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.immediate_dominator(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Fewest-edges path between two blocks, both ends included
    pub fn shortest_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        self.block(from)?;
        let mut came_from: BTreeMap<usize, usize> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);

        while let Some(id) = queue.pop_front() {
            if id == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&prev) = came_from.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in self.successors(id) {
                if seen.insert(next) {
                    came_from.insert(next, id);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

/// Compute the frame right before the instruction at index `target`, replaying only the blocks
/// that dominate it
///
/// Every replayed instruction is certain to have executed before the target, whichever branches
/// were taken. Values pushed or stored on only some of the paths leading to the target are not
/// reflected in the result.
pub fn simulate_dominated(
    body: &MethodBody,
    target: usize,
    initial: &Frame,
    this_class: &BinaryName,
) -> Result<Frame, SimulationError> {
    let error = |kind| SimulationError {
        index: target,
        instruction: body
            .instructions
            .get(target)
            .map_or_else(|| String::from("<end of method>"), |insn| format!("{:?}", insn)),
        kind,
    };

    let graph = FlowGraph::new(body);
    let target_block = graph
        .block_of(target)
        .ok_or_else(|| error(SimulationErrorKind::OutOfBounds))?;
    let path = graph
        .dominance_path(target_block)
        .ok_or_else(|| error(SimulationErrorKind::Unreachable))?;

    let mut frame = initial.clone();
    for id in path {
        let instructions = graph
            .block(id)
            .map(|block| block.instructions.clone())
            .unwrap_or_default();
        if id == target_block {
            let before_target = instructions.into_iter().take_while(|idx| *idx != target);
            replay(&mut frame, body, before_target, this_class)?;
        } else {
            replay(&mut frame, body, instructions, this_class)?;
        }
    }
    Ok(frame)
}
