//! Conversions between values of any sort and `java/lang/Object`

use crate::analysis::{TypeSort, ValueRef};
use crate::jvm::code::{Instruction, InvokeType, MethodRef};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};

/// Turn the value on top of the stack into an object (no-op for references)
pub fn box_value(sort: TypeSort) -> Option<Instruction> {
    let primitive = sort.primitive()?;
    let wrapper = sort.wrapper()?;
    Some(Instruction::Invoke(
        InvokeType::Static,
        MethodRef::new(
            wrapper.clone(),
            UnqualifiedName::VALUEOF,
            MethodDescriptor {
                parameters: vec![FieldType::Base(primitive)],
                return_type: Some(FieldType::object(wrapper)),
            },
        ),
    ))
}

/// Turn the object on top of the stack back into a value of the given type
///
/// Primitives are cast to their wrapper then unwrapped, references are cast to their class
/// (unless that class is `java/lang/Object` or unknown).
pub fn unbox_value(value: &ValueRef) -> Vec<Instruction> {
    match value {
        ValueRef::Sort(sort) => match (sort.primitive(), sort.wrapper(), sort.unwrap_method()) {
            (Some(primitive), Some(wrapper), Some(unwrap)) => vec![
                Instruction::CheckCast(RefType::Object(wrapper.clone())),
                Instruction::Invoke(
                    InvokeType::Virtual,
                    MethodRef::new(
                        wrapper,
                        unwrap,
                        MethodDescriptor {
                            parameters: vec![],
                            return_type: Some(FieldType::Base(primitive)),
                        },
                    ),
                ),
            ],
            _ => vec![],
        },
        ValueRef::Object(RefType::Object(class)) if *class == BinaryName::OBJECT => vec![],
        ValueRef::Object(ref_type) => vec![Instruction::CheckCast(ref_type.clone())],
        ValueRef::Uninitialized { .. } | ValueRef::UninitializedThis | ValueRef::Null | ValueRef::Top => {
            vec![]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::RenderDescriptor;

    #[test]
    fn primitives() {
        match box_value(TypeSort::Long) {
            Some(Instruction::Invoke(InvokeType::Static, method)) => {
                assert_eq!(method.owner, BinaryName::LONG);
                assert_eq!(method.descriptor.render(), "(J)Ljava/lang/Long;");
            }
            other => panic!("unexpected boxing {:?}", other),
        }
        assert_eq!(box_value(TypeSort::Object), None);

        let unbox = unbox_value(&ValueRef::DOUBLE);
        assert_eq!(unbox[0], Instruction::CheckCast(RefType::Object(BinaryName::DOUBLE)));
        match &unbox[1] {
            Instruction::Invoke(InvokeType::Virtual, method) => {
                assert_eq!(method.name, UnqualifiedName::DOUBLEVALUE);
                assert_eq!(method.descriptor.render(), "()D");
            }
            other => panic!("unexpected unboxing {:?}", other),
        }
    }

    #[test]
    fn references() {
        assert!(unbox_value(&ValueRef::object(BinaryName::OBJECT)).is_empty());
        assert!(unbox_value(&ValueRef::Sort(TypeSort::Object)).is_empty());
        assert_eq!(
            unbox_value(&ValueRef::object(BinaryName::STRING)),
            vec![Instruction::CheckCast(RefType::Object(BinaryName::STRING))]
        );
    }
}
