use super::{ClassTransformer, OperationOrder, OperationParent, StageId};
use crate::errors::{MixinError, MixinErrorCause};
use crate::tag::Tag;
use std::sync::Arc;

/// Stages mapped to the stages that must run before them, in insertion order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageTree {
    nodes: Vec<(StageId, Vec<StageId>)>,
}

impl StageTree {
    /// Ensure the stage has a node, and get its dependencies
    fn node_mut(&mut self, stage: StageId) -> &mut Vec<StageId> {
        let idx = match self.nodes.iter().position(|(id, _)| *id == stage) {
            Some(idx) => idx,
            None => {
                self.nodes.push((stage, vec![]));
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[idx].1
    }

    /// Stages that must run before the given stage
    pub fn dependencies(&self, stage: StageId) -> &[StageId] {
        self.nodes
            .iter()
            .find(|(id, _)| *id == stage)
            .map_or(&[], |(_, dependencies)| dependencies.as_slice())
    }

    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.nodes.iter().map(|(id, _)| *id)
    }
}

fn push_unique(list: &mut Vec<StageId>, stage: StageId) {
    if !list.contains(&stage) {
        list.push(stage);
    }
}

/// Turn each stage's parents into dependency edges
///
/// A parent with `Before` becomes a dependency of the stage; a parent with `After` gets the stage
/// as a dependency.
pub fn build_stage_tree(stages: &[(StageId, Vec<OperationParent>)]) -> StageTree {
    let mut tree = StageTree::default();
    for (stage, parents) in stages {
        tree.node_mut(*stage);
        for parent in parents {
            match parent.order {
                OperationOrder::Before => push_unique(tree.node_mut(*stage), parent.stage),
                OperationOrder::After => push_unique(tree.node_mut(parent.stage), *stage),
            }
        }
    }
    tree
}

/// Close every stage's dependencies under transitivity
pub fn expand_tree(tree: &StageTree) -> StageTree {
    fn visit(tree: &StageTree, stage: StageId, into: &mut Vec<StageId>) {
        for dependency in tree.dependencies(stage) {
            if !into.contains(dependency) {
                into.push(*dependency);
                visit(tree, *dependency, into);
            }
        }
    }

    let nodes = tree
        .nodes
        .iter()
        .map(|(stage, _)| {
            let mut dependencies = vec![];
            visit(tree, *stage, &mut dependencies);
            (*stage, dependencies)
        })
        .collect();
    StageTree { nodes }
}

/// Find a dependency cycle, returned as the stages along it
pub fn find_cycle(tree: &StageTree) -> Option<Vec<StageId>> {
    fn walk(tree: &StageTree, stage: StageId, trace: &mut Vec<StageId>) -> Option<Vec<StageId>> {
        if let Some(start) = trace.iter().position(|id| *id == stage) {
            return Some(trace[start..].to_vec());
        }
        trace.push(stage);
        for dependency in tree.dependencies(stage) {
            if let Some(cycle) = walk(tree, *dependency, trace) {
                return Some(cycle);
            }
        }
        trace.pop();
        None
    }

    tree.stages()
        .find_map(|stage| walk(tree, stage, &mut vec![]))
}

/// Linear order of stages in which every stage comes after its dependencies
///
/// Each stage is inserted right after the last of its dependencies placed so far (or at the
/// front if there is none).
pub fn stage_order(tree: &StageTree) -> Vec<StageId> {
    let expanded = expand_tree(tree);
    let mut order: Vec<StageId> = vec![];
    for (stage, dependencies) in &expanded.nodes {
        let idx = dependencies
            .iter()
            .filter_map(|dependency| order.iter().position(|id| id == dependency))
            .map(|position| position + 1)
            .max()
            .unwrap_or(0);
        order.insert(idx, *stage);
    }
    order
}

/// Order stages, failing if their parents are circular
pub fn order_stages(stages: &[(StageId, Vec<OperationParent>)]) -> Result<Vec<StageId>, MixinError> {
    let tree = build_stage_tree(stages);
    if let Some(cycle) = find_cycle(&tree) {
        let cycle: Vec<String> = cycle.iter().map(StageId::to_string).collect();
        return Err(MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::CircularOperations,
            vec![cycle.join(" -> ")],
        ));
    }
    let order = stage_order(&tree);
    log::debug!("Stage order: {:?}", order);
    Ok(order)
}

/// List of stages that keeps itself ordered
#[derive(Default)]
pub struct StageList {
    stages: Vec<Arc<dyn ClassTransformer>>,
}

impl StageList {
    pub fn new() -> StageList {
        StageList::default()
    }

    /// Add a stage and re-order the list (the list is left untouched on error)
    pub fn add(&mut self, stage: Arc<dyn ClassTransformer>) -> Result<(), MixinError> {
        let mut stages = self.stages.clone();
        stages.push(stage);

        let parents: Vec<(StageId, Vec<OperationParent>)> = stages
            .iter()
            .map(|stage| (stage.id(), stage.parents()))
            .collect();
        let order = order_stages(&parents)?;

        self.stages = order
            .into_iter()
            .filter_map(|id| stages.iter().find(|stage| stage.id() == id).cloned())
            .collect();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ClassTransformer>> {
        self.stages.iter()
    }

    pub fn ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }
}
