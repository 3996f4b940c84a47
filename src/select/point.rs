use super::Selector;
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::model::{Class, Method};
use crate::tag::Tag;

/// Where injected code goes relative to a group
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InjectionKind {
    /// Right before the first instruction of the group
    Before,

    /// Right after the last instruction of the group
    After,

    /// In place of the whole group
    Overwrite,
}

/// Resolved range of instructions (both ends inclusive)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Group {
    pub start: usize,
    pub end: usize,
}

impl Group {
    /// Group made of a single instruction
    pub fn at(index: usize) -> Group {
        Group {
            start: index,
            end: index,
        }
    }

    /// Instruction whose frame the injected code observes
    pub fn anchor(&self, kind: InjectionKind) -> usize {
        match kind {
            InjectionKind::Before | InjectionKind::Overwrite => self.start,
            InjectionKind::After => self.end + 1,
        }
    }
}

/// Resolvable injection point
#[derive(Clone, Debug)]
pub enum InjectionPoint {
    /// Every match is its own group
    Single {
        selector: Selector,
        ordinal: usize,
        count: usize,
    },

    /// Groups span from a match of `start` to the nearest later match of `end`
    Block {
        start: Selector,
        end: Selector,
        ordinal: usize,
        count: usize,
    },
}

impl InjectionPoint {
    /// Resolve the point into groups, keeping only the `count` of them starting at `ordinal`
    pub fn groups(&self, method: &Method, class: &Class) -> Result<Vec<Group>, MixinError> {
        match self {
            InjectionPoint::Single {
                selector,
                ordinal,
                count,
            } => {
                let matches = selector.select(method, class)?;
                let groups: Vec<Group> = matches.into_iter().map(Group::at).collect();
                window(groups, *ordinal, *count, selector, method)
            }

            InjectionPoint::Block {
                start,
                end,
                ordinal,
                count,
            } => {
                let starts = start.select(method, class)?;
                let ends = end.select(method, class)?;
                let groups: Vec<Group> = starts
                    .into_iter()
                    .filter_map(|start| {
                        ends.iter()
                            .copied()
                            .find(|end| *end > start)
                            .map(|end| Group { start, end })
                    })
                    .collect();
                window(groups, *ordinal, *count, start, method)
            }
        }
    }
}

fn window(
    groups: Vec<Group>,
    ordinal: usize,
    count: usize,
    selector: &Selector,
    method: &Method,
) -> Result<Vec<Group>, MixinError> {
    if groups.len() < ordinal.saturating_add(count) {
        return Err(MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::FailedToMatchPoints,
            vec![
                selector.to_string(),
                groups.len().to_string(),
                method.signature().to_string(),
                count.to_string(),
                ordinal.to_string(),
            ],
        ));
    }
    Ok(groups.into_iter().skip(ordinal).take(count).collect())
}
