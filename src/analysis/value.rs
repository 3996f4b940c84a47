use crate::jvm::code::Instruction;
use crate::jvm::{BaseType, BinaryName, FieldType, RefType, UnqualifiedName};
use crate::util::Width;

/// Coarse category of a value, which determines how it is loaded, stored, returned, and boxed
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum TypeSort {
    Int,
    Long,
    Float,
    Double,
    Object,
}

impl TypeSort {
    /// Number of local variable (or stack) slots a value of this sort occupies
    pub fn size(&self) -> usize {
        match self {
            TypeSort::Long | TypeSort::Double => 2,
            TypeSort::Int | TypeSort::Float | TypeSort::Object => 1,
        }
    }

    pub fn from_field_type(field_type: &FieldType) -> TypeSort {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => TypeSort::Int,
            FieldType::Base(BaseType::Float) => TypeSort::Float,
            FieldType::Base(BaseType::Long) => TypeSort::Long,
            FieldType::Base(BaseType::Double) => TypeSort::Double,
            FieldType::Ref(_) => TypeSort::Object,
        }
    }

    /// Name of the matching constant in the runtime `TypeSort` enum
    pub fn constant_name(&self) -> UnqualifiedName {
        match self {
            TypeSort::Int => UnqualifiedName::INT,
            TypeSort::Long => UnqualifiedName::LONG,
            TypeSort::Float => UnqualifiedName::FLOAT,
            TypeSort::Double => UnqualifiedName::DOUBLE,
            TypeSort::Object => UnqualifiedName::OBJECT,
        }
    }

    /// Primitive type behind this sort (`None` for objects)
    pub fn primitive(&self) -> Option<BaseType> {
        match self {
            TypeSort::Int => Some(BaseType::Int),
            TypeSort::Long => Some(BaseType::Long),
            TypeSort::Float => Some(BaseType::Float),
            TypeSort::Double => Some(BaseType::Double),
            TypeSort::Object => None,
        }
    }

    /// Wrapper class used when boxing a primitive of this sort
    pub fn wrapper(&self) -> Option<BinaryName> {
        match self {
            TypeSort::Int => Some(BinaryName::INTEGER),
            TypeSort::Long => Some(BinaryName::LONG),
            TypeSort::Float => Some(BinaryName::FLOAT),
            TypeSort::Double => Some(BinaryName::DOUBLE),
            TypeSort::Object => None,
        }
    }

    /// Method on the wrapper class that extracts the primitive value
    pub fn unwrap_method(&self) -> Option<UnqualifiedName> {
        match self {
            TypeSort::Int => Some(UnqualifiedName::INTVALUE),
            TypeSort::Long => Some(UnqualifiedName::LONGVALUE),
            TypeSort::Float => Some(UnqualifiedName::FLOATVALUE),
            TypeSort::Double => Some(UnqualifiedName::DOUBLEVALUE),
            TypeSort::Object => None,
        }
    }

    pub fn load(&self, slot: u16) -> Instruction {
        match self {
            TypeSort::Int => Instruction::ILoad(slot),
            TypeSort::Long => Instruction::LLoad(slot),
            TypeSort::Float => Instruction::FLoad(slot),
            TypeSort::Double => Instruction::DLoad(slot),
            TypeSort::Object => Instruction::ALoad(slot),
        }
    }

    pub fn store(&self, slot: u16) -> Instruction {
        match self {
            TypeSort::Int => Instruction::IStore(slot),
            TypeSort::Long => Instruction::LStore(slot),
            TypeSort::Float => Instruction::FStore(slot),
            TypeSort::Double => Instruction::DStore(slot),
            TypeSort::Object => Instruction::AStore(slot),
        }
    }

    pub fn return_instruction(&self) -> Instruction {
        match self {
            TypeSort::Int => Instruction::IReturn,
            TypeSort::Long => Instruction::LReturn,
            TypeSort::Float => Instruction::FReturn,
            TypeSort::Double => Instruction::DReturn,
            TypeSort::Object => Instruction::AReturn,
        }
    }
}

/// Abstract value tracked on the operand stack and in local variables
///
/// This is close to the verification types of the [JVM specification][0], with two
/// differences: `Sort` stands in for both primitives and references of an unknown class, and
/// `Top` marks local slots that hold nothing usable.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum ValueRef {
    /// Primitive value (or reference of an unknown class when the sort is `Object`)
    Sort(TypeSort),

    /// Initialized reference of a known type
    Object(RefType),

    /// State of an object after `new` has been called but `<init>` has not
    Uninitialized {
        /// Once the type is initialized, what will it be?
        class: BinaryName,

        /// Index of the `new` instruction in the method body
        site: usize,
    },

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    Null,

    /// Unusable local variable slot
    Top,
}

impl ValueRef {
    pub const INT: ValueRef = ValueRef::Sort(TypeSort::Int);
    pub const LONG: ValueRef = ValueRef::Sort(TypeSort::Long);
    pub const FLOAT: ValueRef = ValueRef::Sort(TypeSort::Float);
    pub const DOUBLE: ValueRef = ValueRef::Sort(TypeSort::Double);

    pub fn object(class: BinaryName) -> ValueRef {
        ValueRef::Object(RefType::Object(class))
    }

    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            ValueRef::Sort(sort) => *sort == TypeSort::Object,
            ValueRef::Object(_)
            | ValueRef::Uninitialized { .. }
            | ValueRef::UninitializedThis
            | ValueRef::Null => true,
            ValueRef::Top => false,
        }
    }

    pub fn is_uninitialized(&self) -> bool {
        matches!(
            self,
            ValueRef::Uninitialized { .. } | ValueRef::UninitializedThis
        )
    }

    /// Category used to load, store, box, or return this value
    pub fn sort(&self) -> TypeSort {
        match self {
            ValueRef::Sort(sort) => *sort,
            _ => TypeSort::Object,
        }
    }

    /// Can a value of this type be used where `expected` is required?
    ///
    /// Primitives must match exactly. References are all considered compatible with each other:
    /// without a class hierarchy at hand there is no sound way to reject one.
    pub fn is_compatible(&self, expected: &ValueRef) -> bool {
        match (self, expected) {
            (ValueRef::Top, _) | (_, ValueRef::Top) => false,
            (found, expected) if expected.is_reference() => found.is_reference(),
            (found, expected) => found == expected,
        }
    }

    /// Can a value of this type be converted into `other` by (un)boxing?
    ///
    /// This holds when the types are equal, or when one is a primitive and the other its
    /// wrapper class (`int` and `java/lang/Integer`, ...). A reference of unknown class is
    /// treated as matching any other reference.
    pub fn boxable_to(&self, other: &ValueRef) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (ValueRef::Sort(sort), ValueRef::Object(RefType::Object(class)))
            | (ValueRef::Object(RefType::Object(class)), ValueRef::Sort(sort))
                if *sort != TypeSort::Object =>
            {
                sort.wrapper().as_ref() == Some(class)
            }
            (ValueRef::Sort(TypeSort::Object), other) | (other, ValueRef::Sort(TypeSort::Object)) => {
                other.is_reference()
            }
            _ => false,
        }
    }
}

impl From<&FieldType> for ValueRef {
    fn from(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Ref(ref_type) => ValueRef::Object(ref_type.clone()),
            base => ValueRef::Sort(TypeSort::from_field_type(base)),
        }
    }
}

impl From<FieldType> for ValueRef {
    fn from(field_type: FieldType) -> Self {
        ValueRef::from(&field_type)
    }
}

impl Width for ValueRef {
    fn width(&self) -> usize {
        match self {
            ValueRef::Sort(sort) => sort.size(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(ValueRef::LONG.width(), 2);
        assert_eq!(ValueRef::DOUBLE.width(), 2);
        assert_eq!(ValueRef::INT.width(), 1);
        assert_eq!(ValueRef::Null.width(), 1);
        assert_eq!(ValueRef::Top.width(), 1);
    }

    #[test]
    fn field_types() {
        assert_eq!(ValueRef::from(FieldType::boolean()), ValueRef::INT);
        assert_eq!(ValueRef::from(FieldType::char()), ValueRef::INT);
        assert_eq!(ValueRef::from(FieldType::long()), ValueRef::LONG);
        assert_eq!(
            ValueRef::from(FieldType::object(BinaryName::STRING)),
            ValueRef::object(BinaryName::STRING)
        );
    }

    #[test]
    fn compatibility() {
        let string = ValueRef::object(BinaryName::STRING);
        let integer = ValueRef::object(BinaryName::INTEGER);
        assert!(string.is_compatible(&integer));
        assert!(ValueRef::Null.is_compatible(&string));
        assert!(ValueRef::UninitializedThis.is_compatible(&ValueRef::Sort(TypeSort::Object)));
        assert!(!ValueRef::INT.is_compatible(&string));
        assert!(!ValueRef::INT.is_compatible(&ValueRef::FLOAT));
        assert!(!ValueRef::Top.is_compatible(&ValueRef::Top));
    }

    #[test]
    fn boxing() {
        let integer = ValueRef::object(BinaryName::INTEGER);
        let long = ValueRef::object(BinaryName::LONG);
        assert!(ValueRef::INT.boxable_to(&integer));
        assert!(integer.boxable_to(&ValueRef::INT));
        assert!(ValueRef::LONG.boxable_to(&long));
        assert!(!ValueRef::INT.boxable_to(&long));
        assert!(!ValueRef::INT.boxable_to(&ValueRef::LONG));
        assert!(ValueRef::object(BinaryName::STRING).boxable_to(&ValueRef::object(BinaryName::STRING)));
        assert!(!ValueRef::object(BinaryName::STRING).boxable_to(&integer));
    }

    #[test]
    fn sorts() {
        use crate::jvm::Name;

        assert_eq!(TypeSort::Double.store(3), Instruction::DStore(3));
        assert_eq!(TypeSort::Object.load(0), Instruction::ALoad(0));
        assert_eq!(TypeSort::Int.wrapper(), Some(BinaryName::INTEGER));
        assert_eq!(TypeSort::Int.constant_name().as_str(), "INT");
        assert!(ValueRef::Sort(TypeSort::Object).boxable_to(&ValueRef::object(BinaryName::STRING)));
    }
}
