use super::{Boundary, CustomSelectorCache, FieldAccess, InjectionKind, InjectionPoint, Selector};
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::code::InvokeType;
use crate::jvm::{BinaryName, UnqualifiedName};
use crate::tag::Tag;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokeSpec {
    pub owner: BinaryName,
    pub name: UnqualifiedName,

    /// Parameter part of the descriptor, parentheses included
    pub parameters: String,
    pub invoke_type: Option<InvokeType>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub access: FieldAccess,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpcodeSpec {
    /// Defaults to `ldc`
    pub opcode: Option<u8>,
    pub literal: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomSpec {
    pub name: String,
    pub options: Vec<String>,
}

/// Selector as declared, with at most one kind set
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorSpec {
    pub boundary: Option<Boundary>,
    pub invoke: Option<InvokeSpec>,
    pub field: Option<FieldSpec>,
    pub opcode: Option<OpcodeSpec>,
    pub custom: Option<CustomSpec>,
}

impl SelectorSpec {
    pub fn boundary(boundary: Boundary) -> SelectorSpec {
        SelectorSpec {
            boundary: Some(boundary),
            ..SelectorSpec::default()
        }
    }

    /// Check that exactly one kind is set, and turn it into a selector
    ///
    /// `static_injection` tells whether the injected code is static, which decides where the
    /// head of a constructor is.
    pub fn build(
        &self,
        customs: &CustomSelectorCache,
        static_injection: bool,
    ) -> Result<Selector, MixinError> {
        let kinds: Vec<&str> = [
            ("boundary", self.boundary.is_some()),
            ("invoke", self.invoke.is_some()),
            ("field", self.field.is_some()),
            ("opcode", self.opcode.is_some()),
            ("custom", self.custom.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(kind, _)| kind)
        .collect();

        if kinds.len() > 1 {
            return Err(MixinError::new(
                Tag::ENGINE,
                MixinErrorCause::SelectorExclusivity,
                vec![kinds.join(", ")],
            ));
        }

        if let Some(boundary) = self.boundary {
            Ok(Selector::Boundary {
                boundary,
                static_injection,
            })
        } else if let Some(invoke) = &self.invoke {
            Ok(Selector::Invocation {
                owner: invoke.owner.clone(),
                name: invoke.name.clone(),
                parameters: invoke.parameters.clone(),
                invoke_type: invoke.invoke_type,
            })
        } else if let Some(field) = &self.field {
            Ok(Selector::Field {
                owner: field.owner.clone(),
                name: field.name.clone(),
                access: field.access,
            })
        } else if let Some(opcode) = &self.opcode {
            Ok(Selector::Opcode {
                opcode: opcode.opcode.unwrap_or(Selector::LDC),
                literal: opcode.literal.clone(),
            })
        } else if let Some(custom) = &self.custom {
            Ok(Selector::Custom(customs.get(&custom.name, &custom.options)?))
        } else {
            Err(MixinError::new(
                Tag::ENGINE,
                MixinErrorCause::NoSelectorsDefined,
                vec![],
            ))
        }
    }
}

/// Injection point as declared
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionPointSpec {
    pub kind: InjectionKind,

    /// Single point (defaults to the head when neither this nor `block` is set)
    pub point: Option<SelectorSpec>,

    /// Start and end selectors of a block
    pub block: Option<Vec<SelectorSpec>>,

    pub ordinal: usize,
    pub count: usize,
}

impl Default for InjectionPointSpec {
    fn default() -> InjectionPointSpec {
        InjectionPointSpec {
            kind: InjectionKind::Before,
            point: None,
            block: None,
            ordinal: 0,
            count: 1,
        }
    }
}

impl InjectionPointSpec {
    /// Validate the declaration and build the point
    ///
    /// `target` is only used to describe the injection in errors.
    pub fn build(
        &self,
        target: impl fmt::Display,
        customs: &CustomSelectorCache,
        static_injection: bool,
    ) -> Result<InjectionPoint, MixinError> {
        match (&self.point, &self.block) {
            (Some(_), Some(_)) => Err(MixinError::new(
                Tag::ENGINE,
                MixinErrorCause::DoubleInjectionPoints,
                vec![target.to_string()],
            )),

            (_, Some(block)) => match block.as_slice() {
                [start, end] => Ok(InjectionPoint::Block {
                    start: start.build(customs, static_injection)?,
                    end: end.build(customs, static_injection)?,
                    ordinal: self.ordinal,
                    count: self.count,
                }),
                _ => Err(MixinError::new(
                    Tag::ENGINE,
                    MixinErrorCause::InvalidBlockSize,
                    vec![target.to_string(), block.len().to_string()],
                )),
            },

            (point, None) => {
                let selector = match point {
                    Some(point) => point.build(customs, static_injection)?,
                    None => Selector::Boundary {
                        boundary: Boundary::Head,
                        static_injection,
                    },
                };
                Ok(InjectionPoint::Single {
                    selector,
                    ordinal: self.ordinal,
                    count: self.count,
                })
            }
        }
    }
}
