use crate::tag::Tag;
use std::fmt;

/// Failure to apply a mixin
///
/// Every failure names the declaration responsible for it, a cause, and context strings that
/// get interpolated into the cause's message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixinError {
    pub declaration: Tag,
    pub cause: MixinErrorCause,
    pub context: Vec<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MixinErrorCause {
    // Configuration
    CircularOperations,
    SelectorExclusivity,
    NoSelectorsDefined,
    DoubleInjectionPoints,
    InvalidBlockSize,
    UnknownCustomSelector,
    MalformedName,
    ConflictingGenerators,

    // Resolution
    FailedToMatchPoints,
    MethodOverloadAmbiguity,
    NoMethodFound,

    // Validity
    ShouldBeStatic,
    WrongReturnType,
    InvalidParameterType,
    WrongNumLocals,
    WrongLocalType,
    LocalParameterMismatch,
    WrongNumCaptureTypes,
    ConflictingInjections,
    CannotApplyToInterfaces,

    // Internal consistency
    InconsistentFrame,
    MissingCode,
    ExceededLimit,
}

impl MixinErrorCause {
    /// Message, with one `{}` per context string
    pub fn template(&self) -> &'static str {
        use MixinErrorCause::*;
        match self {
            CircularOperations => "The following operations are circular: {}.",
            SelectorExclusivity => {
                "An injection point selector sets more than one kind of selector ({})."
            }
            NoSelectorsDefined => "An injection point selector does not set any kind of selector.",
            DoubleInjectionPoints => {
                "Code injection into '{}' defines both a point and a block, only one is allowed."
            }
            InvalidBlockSize => {
                "Code injection into '{}' has a block of {} selectors, but blocks need exactly 2."
            }
            UnknownCustomSelector => "No custom selector named '{}' is registered.",
            MalformedName => "Name '{}' is malformed: {}.",
            ConflictingGenerators => "Only one generator can generate '{}', but {} generators can.",
            FailedToMatchPoints => {
                "Selector '{}' matched {} instructions in '{}', but {} were requested starting at ordinal {}."
            }
            MethodOverloadAmbiguity => "Target method '{}' is ambiguous between: {}.",
            NoMethodFound => "No method matching '{}' was found in '{}'.",
            ShouldBeStatic => {
                "Code injection '{}' targets the static method '{}', so it must be static too."
            }
            WrongReturnType => {
                "Code injection '{}' must return void or a flow result, but it returns '{}'."
            }
            InvalidParameterType => {
                "Code injection '{}' has a parameter of type '{}', but only flows, stacks, and captured locals are allowed."
            }
            WrongNumLocals => {
                "Code injection '{}' captures local {}, which does not exist at this point in '{}'."
            }
            WrongLocalType => {
                "Code injection '{}' captures local {} as '{}', but its type is '{}'."
            }
            LocalParameterMismatch => {
                "Code injection '{}' declares {} captured parameters, but requests {} locals."
            }
            WrongNumCaptureTypes => {
                "Code injection '{}' declares types for {} captured locals, but requests {} locals."
            }
            ConflictingInjections => {
                "Method '{}' has {} code injections at the same point and one of them overwrites. An overwrite has to be alone."
            }
            CannotApplyToInterfaces => "Code injections cannot be applied to the interface '{}'.",
            InconsistentFrame => "Simulating '{}' failed at instruction {} ({}): {}.",
            MissingCode => "Method '{}' has no code.",
            ExceededLimit => "{} {} does not fit in its bytecode encoding.",
        }
    }
}

impl MixinError {
    pub fn new(declaration: Tag, cause: MixinErrorCause, context: Vec<String>) -> MixinError {
        MixinError {
            declaration,
            cause,
            context,
        }
    }

    /// Attribute the error to a declaration (only if it was not attributed yet)
    pub fn attributed_to(mut self, declaration: &Tag) -> MixinError {
        if self.declaration == Tag::ENGINE {
            self.declaration = declaration.clone();
        }
        self
    }

    /// Message of the cause, with the context interpolated
    pub fn message(&self) -> String {
        let mut pieces = self.cause.template().split("{}");
        let mut context = self.context.iter();
        let mut message = String::new();
        if let Some(first) = pieces.next() {
            message.push_str(first);
        }
        for piece in pieces {
            match context.next() {
                Some(value) => message.push_str(value),
                None => message.push_str("<?>"),
            }
            message.push_str(piece);
        }
        message
    }
}

impl fmt::Display for MixinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mixin: '{}' is invalid. {}",
            self.declaration,
            self.message()
        )
    }
}

impl std::error::Error for MixinError {}

/// Narrow a count or an index to the width bytecode stores it in
///
/// `what` names the quantity in the error (`"Local slot"`, ...).
pub fn fit<S, T>(value: S, what: &str) -> Result<T, MixinError>
where
    S: Copy + fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| {
        MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::ExceededLimit,
            vec![String::from(what), value.to_string()],
        )
    })
}

/// Failure of the frame simulator to step over an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationError {
    /// Index of the offending instruction in the method body
    pub index: usize,

    /// Rendering of the offending instruction
    pub instruction: String,

    pub kind: SimulationErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    NotArrayType,
    InvalidIndex,
    InvalidType,

    /// Simulation target lies outside of the method body
    OutOfBounds,

    /// Simulation target cannot be reached from the start of the method
    Unreachable,
}

impl SimulationError {
    /// Convert into a mixin error, naming the method being simulated
    pub fn in_method(self, method: impl fmt::Display) -> MixinError {
        MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::InconsistentFrame,
            vec![
                method.to_string(),
                self.index.to_string(),
                self.instruction,
                format!("{:?}", self.kind),
            ],
        )
    }
}

impl From<SimulationError> for MixinError {
    fn from(err: SimulationError) -> MixinError {
        err.in_method("<unknown>")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_interpolation() {
        let err = MixinError::new(
            Tag::new("com/example/Mixin"),
            MixinErrorCause::NoMethodFound,
            vec![String::from("run()V"), String::from("com/example/Target")],
        );
        assert_eq!(
            err.to_string(),
            "Mixin: 'com/example/Mixin' is invalid. No method matching 'run()V' was found in 'com/example/Target'."
        );
    }

    #[test]
    fn narrowing() {
        assert_eq!(fit::<usize, u16>(65535, "Local slot"), Ok(65535));
        let err = fit::<u32, i32>(1 << 31, "Dispatch index").unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::ExceededLimit);
        assert_eq!(
            err.message(),
            "Dispatch index 2147483648 does not fit in its bytecode encoding."
        );
    }

    #[test]
    fn missing_context() {
        let err = MixinError::new(Tag::ENGINE, MixinErrorCause::MissingCode, vec![]);
        assert_eq!(err.message(), "Method '<?>' has no code.");
        let err = err.attributed_to(&Tag::new("a"));
        assert_eq!(err.declaration, Tag::new("a"));
        let err = err.attributed_to(&Tag::new("b"));
        assert_eq!(err.declaration, Tag::new("a"));
    }
}
