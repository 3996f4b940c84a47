use super::CustomSelector;
use crate::analysis::{simulate, Frame, ValueRef};
use crate::errors::{MixinError, SimulationErrorKind};
use crate::jvm::code::{Instruction, InvokeType, MethodBody};
use crate::jvm::model::{Class, Method};
use crate::jvm::{BinaryName, UnqualifiedName};
use std::fmt;
use std::sync::Arc;

/// Boundaries of a method body
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// First instruction (in a constructor, the one following the delegated constructor call)
    Head,

    /// Last return instruction
    Tail,

    /// Every return instruction
    Return,
}

/// Direction of a field access
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    Get,
    Set,
    Either,
}

impl FieldAccess {
    fn matches(&self, insn: &Instruction) -> bool {
        let is_get = matches!(insn, Instruction::GetField(_) | Instruction::GetStatic(_));
        let is_set = matches!(insn, Instruction::PutField(_) | Instruction::PutStatic(_));
        match self {
            FieldAccess::Get => is_get,
            FieldAccess::Set => is_set,
            FieldAccess::Either => is_get || is_set,
        }
    }
}

/// Strategy for finding instructions in a method body
#[derive(Clone)]
pub enum Selector {
    Boundary {
        boundary: Boundary,

        /// Static injected code can run before `this` is initialized, so the head of a
        /// constructor is not moved past the delegated constructor call for it
        static_injection: bool,
    },

    /// Method call, matched on the owner, the name, and the parameter part of the descriptor
    Invocation {
        owner: BinaryName,
        name: UnqualifiedName,

        /// Rendered parameters, parentheses included (eg. `(ILjava/lang/String;)`)
        parameters: String,

        /// Only match calls using this kind of invoke
        invoke_type: Option<InvokeType>,
    },

    Field {
        owner: BinaryName,
        name: UnqualifiedName,
        access: FieldAccess,
    },

    /// Instruction with the given opcode, and (for `ldc`) optionally a given constant
    Opcode { opcode: u8, literal: Option<String> },

    Custom(Arc<dyn CustomSelector>),
}

impl Selector {
    /// Opcode of `ldc`, which is what an opcode selector looks for by default
    pub const LDC: u8 = 0x12;

    /// Indices of the matching instructions, in body order
    pub fn select(&self, method: &Method, class: &Class) -> Result<Vec<usize>, MixinError> {
        let body = match &method.body {
            Some(body) => body,
            None => return Ok(vec![]),
        };

        let selected = match self {
            Selector::Boundary {
                boundary,
                static_injection,
            } => match boundary {
                Boundary::Head if method.is_constructor() && !static_injection => {
                    match constructor_initialization(method, class)? {
                        Some(call) => body.next_real(call + 1).into_iter().collect(),
                        None => vec![],
                    }
                }
                Boundary::Head => body.next_real(0).into_iter().collect(),
                Boundary::Tail => returns(body).last().into_iter().collect(),
                Boundary::Return => returns(body).collect(),
            },

            Selector::Invocation {
                owner,
                name,
                parameters,
                invoke_type,
            } => positions(body, |insn| match insn {
                Instruction::Invoke(typ, method_ref) => {
                    invoke_type.map_or(true, |expected| expected == *typ)
                        && method_ref.owner == *owner
                        && method_ref.name == *name
                        && method_ref.descriptor.parameter_prefix() == *parameters
                }
                _ => false,
            }),

            Selector::Field {
                owner,
                name,
                access,
            } => positions(body, |insn| match insn {
                Instruction::GetField(field)
                | Instruction::GetStatic(field)
                | Instruction::PutField(field)
                | Instruction::PutStatic(field) => {
                    access.matches(insn) && field.owner == *owner && field.name == *name
                }
                _ => false,
            }),

            Selector::Opcode { opcode, literal } => positions(body, |insn| {
                insn.opcode() == Some(*opcode)
                    && match (literal, insn) {
                        (None, _) => true,
                        (Some(literal), Instruction::Ldc(constant)) => {
                            constant.to_string() == *literal
                        }
                        (Some(_), _) => false,
                    }
            }),

            Selector::Custom(custom) => custom.select(method, class)?,
        };

        log::trace!("{} selected {:?} in {}", self, selected, method.signature());
        Ok(selected)
    }
}

fn positions(body: &MethodBody, predicate: impl Fn(&Instruction) -> bool) -> Vec<usize> {
    body.instructions
        .iter()
        .enumerate()
        .filter(|(_, insn)| predicate(insn))
        .map(|(idx, _)| idx)
        .collect()
}

fn returns(body: &MethodBody) -> impl Iterator<Item = usize> + '_ {
    body.instructions
        .iter()
        .enumerate()
        .filter(|(_, insn)| insn.is_return())
        .map(|(idx, _)| idx)
}

/// Index of the call through which a constructor delegates to a superclass (or sibling)
/// constructor
///
/// That is the first `invokespecial <init>` on the superclass or on the class itself whose
/// receiver is still the uninitialized `this`. Calls initializing other objects (`new` followed
/// by `<init>`) are skipped.
pub fn constructor_initialization(method: &Method, class: &Class) -> Result<Option<usize>, MixinError> {
    let body = match &method.body {
        Some(body) => body,
        None => return Ok(None),
    };
    let super_name = class.super_name_or_object();
    let initial = Frame::method_entry(&class.name, method);

    for (idx, insn) in body.instructions.iter().enumerate() {
        let method_ref = match insn {
            Instruction::Invoke(InvokeType::Special, method_ref)
                if method_ref.name == UnqualifiedName::INIT
                    && (method_ref.owner == super_name || method_ref.owner == class.name) =>
            {
                method_ref
            }
            _ => continue,
        };

        let frame = match simulate(body, idx, &initial, &class.name) {
            Ok(frame) => frame,
            Err(err) if err.kind == SimulationErrorKind::Unreachable => continue,
            Err(err) => return Err(err.in_method(method.signature())),
        };
        let stack = frame.stack_values();
        let receiver = stack
            .len()
            .checked_sub(method_ref.descriptor.parameters.len() + 1)
            .and_then(|receiver_idx| stack.get(receiver_idx));
        if receiver == Some(&ValueRef::UninitializedThis) {
            return Ok(Some(idx));
        }
    }

    Ok(None)
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Boundary { boundary, .. } => write!(f, "{:?}", boundary),
            Selector::Invocation {
                owner,
                name,
                parameters,
                ..
            } => write!(f, "Invocation @ {}.{}{}", owner, name, parameters),
            Selector::Field {
                owner,
                name,
                access,
            } => write!(f, "Field {:?} @ {}.{}", access, owner, name),
            Selector::Opcode {
                opcode,
                literal: None,
            } => write!(f, "Opcode 0x{:02x}", opcode),
            Selector::Opcode {
                opcode,
                literal: Some(literal),
            } => write!(f, "Opcode 0x{:02x} '{}'", opcode, literal),
            Selector::Custom(custom) => write!(f, "Custom {:?}", custom),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Constant, FieldRef, MethodRef};
    use crate::jvm::{
        ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
    };

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(String::from(s)).unwrap()
    }

    fn method_name(s: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(String::from(s)).unwrap()
    }

    fn class() -> Class {
        Class::new(
            name("com/example/Target"),
            Some(name("com/example/Base")),
            ClassAccessFlags::PUBLIC,
        )
    }

    fn method(name: UnqualifiedName, desc: &str, instructions: Vec<Instruction>) -> Method {
        Method::new(
            MethodAccessFlags::PUBLIC,
            name,
            MethodDescriptor::parse(desc).unwrap(),
            Some(MethodBody::new(instructions, 4, 4)),
        )
    }

    fn println(text: &str) -> Vec<Instruction> {
        vec![
            Instruction::GetStatic(FieldRef {
                owner: name("java/lang/System"),
                name: method_name("out"),
                descriptor: FieldType::object(name("java/io/PrintStream")),
            }),
            Instruction::Ldc(Constant::String(String::from(text))),
            Instruction::Invoke(
                InvokeType::Virtual,
                MethodRef::new(
                    name("java/io/PrintStream"),
                    method_name("println"),
                    MethodDescriptor::parse("(Ljava/lang/String;)V").unwrap(),
                ),
            ),
        ]
    }

    #[test]
    fn boundaries() {
        let mut code = vec![Instruction::LineNumber(1)];
        code.extend(println("a"));
        code.push(Instruction::Return);
        code.extend(println("b"));
        code.push(Instruction::Return);
        let method = method(method_name("run"), "()V", code);

        let select = |boundary| {
            Selector::Boundary {
                boundary,
                static_injection: false,
            }
            .select(&method, &class())
            .unwrap()
        };
        assert_eq!(select(Boundary::Head), vec![1]);
        assert_eq!(select(Boundary::Tail), vec![8]);
        assert_eq!(select(Boundary::Return), vec![4, 8]);
    }

    #[test]
    fn constructor_head() {
        let base_init = MethodRef::new(
            name("com/example/Base"),
            UnqualifiedName::INIT,
            MethodDescriptor::parse("(I)V").unwrap(),
        );
        let code = vec![
            // An unrelated object gets built first
            Instruction::New(name("com/example/Base")),
            Instruction::Dup,
            Instruction::IConst0,
            Instruction::Invoke(InvokeType::Special, base_init.clone()),
            Instruction::Pop,
            // Then the super constructor gets called
            Instruction::ALoad(0),
            Instruction::IConst1,
            Instruction::Invoke(InvokeType::Special, base_init),
            Instruction::Return,
        ];
        let init = method(UnqualifiedName::INIT, "()V", code);

        let head = |static_injection| {
            Selector::Boundary {
                boundary: Boundary::Head,
                static_injection,
            }
            .select(&init, &class())
            .unwrap()
        };
        assert_eq!(head(false), vec![8]);
        assert_eq!(head(true), vec![0]);
        assert_eq!(constructor_initialization(&init, &class()).unwrap(), Some(7));
    }

    #[test]
    fn invocations_fields_and_opcodes() {
        let mut code = println("first");
        code.push(Instruction::ALoad(0));
        code.push(Instruction::IConst3);
        code.push(Instruction::PutField(FieldRef {
            owner: name("com/example/Target"),
            name: method_name("count"),
            descriptor: FieldType::int(),
        }));
        code.extend(println("second"));
        code.push(Instruction::Return);
        let method = method(method_name("run"), "()V", code);

        let println = Selector::Invocation {
            owner: name("java/io/PrintStream"),
            name: method_name("println"),
            parameters: String::from("(Ljava/lang/String;)"),
            invoke_type: None,
        };
        assert_eq!(println.select(&method, &class()).unwrap(), vec![2, 8]);

        let static_println = Selector::Invocation {
            owner: name("java/io/PrintStream"),
            name: method_name("println"),
            parameters: String::from("(Ljava/lang/String;)"),
            invoke_type: Some(InvokeType::Static),
        };
        assert!(static_println.select(&method, &class()).unwrap().is_empty());

        let field = |access| Selector::Field {
            owner: name("com/example/Target"),
            name: method_name("count"),
            access,
        };
        assert_eq!(field(FieldAccess::Set).select(&method, &class()).unwrap(), vec![5]);
        assert_eq!(field(FieldAccess::Either).select(&method, &class()).unwrap(), vec![5]);
        assert!(field(FieldAccess::Get).select(&method, &class()).unwrap().is_empty());

        let ldc = |literal: Option<&str>| Selector::Opcode {
            opcode: Selector::LDC,
            literal: literal.map(String::from),
        };
        assert_eq!(ldc(None).select(&method, &class()).unwrap(), vec![1, 7]);
        assert_eq!(ldc(Some("second")).select(&method, &class()).unwrap(), vec![7]);
    }
}
