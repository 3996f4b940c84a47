use crate::errors::MixinError;
use crate::jvm::model::Class;
use crate::jvm::BinaryName;
use crate::settings::Settings;
use crate::tag::Tag;
use std::fmt;

/// Identity of a transformation stage
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub &'static str);

impl StageId {
    /// Injection of code into existing method bodies
    pub const INSTRUCTIONS: StageId = StageId("instructions");

    /// Addition (or redefinition) of injected methods
    pub const METHODS: StageId = StageId("methods");
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Position of a stage relative to one of its parents
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperationOrder {
    /// The parent runs before the stage
    Before,

    /// The parent runs after the stage
    After,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationParent {
    pub stage: StageId,
    pub order: OperationOrder,
}

impl OperationParent {
    pub fn new(stage: StageId, order: OperationOrder) -> OperationParent {
        OperationParent { stage, order }
    }
}

/// One pass over a class
pub trait ClassTransformer: Send + Sync {
    fn id(&self) -> StageId;

    /// Stages this one must be ordered against
    fn parents(&self) -> Vec<OperationParent>;

    /// Apply every registered operation that targets the class
    fn transform(&self, class: &mut Class, settings: &Settings) -> Result<(), MixinError>;
}

/// Source of classes that do not exist until a declaration asks for them
///
/// Generated classes then go through the stages like any other class.
pub trait ClassGenerator: Send + Sync {
    fn can_generate(&self, class: &BinaryName) -> bool;

    fn generate(&self, class: &BinaryName) -> Result<Class, MixinError>;

    /// Forget everything the declaration asked to generate
    fn unregister(&self, owner: &Tag);
}
