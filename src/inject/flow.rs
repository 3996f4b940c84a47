//! Synthesis of the code that surrounds injected calls
//!
//! The generated block looks like this:
//!
//!   1. the operand stack is saved into locals and wrapped in a `Stack` view (only if some
//!      injected method asks for it)
//!   2. every requested local is wrapped in a `Captured` cell
//!   3. a flow handle and a "continue" result accumulator get created
//!   4. injected methods are called in order, their results folded into the accumulator
//!   5. if the accumulator yields, the enclosing method returns its value
//!   6. otherwise the locals and stack are restored from the cells and the view

use super::boxing::{box_value, unbox_value};
use super::{InjectionRequest, LocalTracker, ParameterRole};
use crate::analysis::{Frame, TypeSort, ValueRef};
use crate::errors::{fit, MixinError, MixinErrorCause};
use crate::jvm::code::{
    Constant, FieldRef, Instruction, InvokeType, LabelGenerator, MethodRef, OrdComparison,
    SynLabel,
};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use crate::select::InjectionKind;
use crate::settings::RuntimeClasses;
use std::collections::HashSet;

/// Message of the exception thrown when injected code yields before `this` is initialized
pub const ILLEGAL_YIELD: &str =
    "Invalid yield! You cannot return yet at this point in the constructor.";

/// Everything needed to build the block for one injection point
pub struct FlowHarness<'a> {
    pub runtime: &'a RuntimeClasses,

    /// Class that owns both the enclosing method and the injected methods
    pub class: &'a BinaryName,

    pub kind: InjectionKind,

    /// Frame right before the block
    pub frame: &'a Frame,

    /// Whether the enclosing method is static
    pub is_static: bool,

    /// Return type of the enclosing method
    pub return_type: Option<&'a FieldType>,

    /// Whether the block may return from the enclosing method (it throws otherwise)
    pub allow_return: bool,

    /// Requests sharing the point, in declared order
    pub requests: &'a [&'a InjectionRequest],
}

/// Stack values saved into locals
struct SavedStack {
    /// Local holding the `Stack` view
    view: u16,

    /// Saved values, from the bottom up
    values: Vec<ValueRef>,
}

/// A local variable wrapped in a capture cell
struct Cell {
    original: u16,
    cell: u16,
    value: ValueRef,
}

fn method_ref(
    owner: &BinaryName,
    name: UnqualifiedName,
    parameters: Vec<FieldType>,
    return_type: Option<FieldType>,
) -> MethodRef {
    MethodRef::new(
        owner.clone(),
        name,
        MethodDescriptor {
            parameters,
            return_type,
        },
    )
}

fn object() -> FieldType {
    FieldType::object(BinaryName::OBJECT)
}

impl FlowHarness<'_> {
    pub fn build(
        &self,
        locals: &mut LocalTracker,
        labels: &mut impl LabelGenerator<SynLabel>,
    ) -> Result<Vec<Instruction>, MixinError> {
        let mut code = vec![];

        let roles = self
            .requests
            .iter()
            .map(|request| request.injected.roles(self.runtime, &request.declaration))
            .collect::<Result<Vec<_>, _>>()?;
        let captures_stack = roles.iter().flatten().any(|role| *role == ParameterRole::Stack);

        let saved_stack = if captures_stack {
            Some(self.capture_stack(locals, &mut code)?)
        } else {
            None
        };

        let mut cells: Vec<Cell> = vec![];
        for request in self.requests {
            for slot in &request.locals {
                if cells.iter().any(|cell| cell.original == *slot) {
                    continue;
                }
                let value = self.frame.local(*slot).cloned().ok_or_else(|| {
                    MixinError::new(
                        request.declaration.clone(),
                        MixinErrorCause::WrongNumLocals,
                        vec![
                            request.injected.method.signature().to_string(),
                            slot.to_string(),
                            request.target.to_string(),
                        ],
                    )
                })?;
                let cell = locals.allocate(TypeSort::Object)?;
                self.capture_local(*slot, &value, &mut code);
                code.push(Instruction::AStore(cell));
                cells.push(Cell {
                    original: *slot,
                    cell,
                    value,
                });
            }
        }

        let flow = locals.allocate(TypeSort::Object)?;
        let internal_flow = &self.runtime.internal_flow;
        code.extend([
            Instruction::New(internal_flow.clone()),
            Instruction::Dup,
            Instruction::Invoke(
                InvokeType::Special,
                method_ref(internal_flow, UnqualifiedName::INIT, vec![], None),
            ),
            Instruction::AStore(flow),
        ]);

        let accumulator = locals.allocate(TypeSort::Object)?;
        let flow_result = &self.runtime.flow_result;
        code.extend([
            Instruction::New(flow_result.clone()),
            Instruction::Dup,
            Instruction::IConst0,
            Instruction::AConstNull,
            Instruction::AConstNull,
            Instruction::Invoke(
                InvokeType::Special,
                method_ref(
                    flow_result,
                    UnqualifiedName::INIT,
                    vec![
                        FieldType::boolean(),
                        object(),
                        FieldType::object(self.runtime.type_sort.clone()),
                    ],
                    None,
                ),
            ),
            Instruction::AStore(accumulator),
        ]);

        for (request, roles) in self.requests.iter().zip(&roles) {
            let injected = &request.injected;
            let returns_result = injected.returns_result(self.runtime);

            if returns_result {
                code.push(Instruction::ALoad(accumulator));
            }
            if !injected.is_static() {
                code.push(Instruction::ALoad(0));
            }

            let mut captured = request.locals.iter();
            for role in roles {
                let slot = match role {
                    ParameterRole::Flow => Some(flow),
                    ParameterRole::Stack => saved_stack.as_ref().map(|saved| saved.view),
                    ParameterRole::Captured => captured.next().and_then(|original| {
                        cells
                            .iter()
                            .find(|cell| cell.original == *original)
                            .map(|cell| cell.cell)
                    }),
                };
                let slot = slot.ok_or_else(|| {
                    MixinError::new(
                        request.declaration.clone(),
                        MixinErrorCause::LocalParameterMismatch,
                        vec![
                            injected.method.signature().to_string(),
                            roles
                                .iter()
                                .filter(|role| **role == ParameterRole::Captured)
                                .count()
                                .to_string(),
                            request.locals.len().to_string(),
                        ],
                    )
                })?;
                code.push(Instruction::ALoad(slot));
            }

            let invoke_type = if injected.is_static() {
                InvokeType::Static
            } else {
                InvokeType::Virtual
            };
            code.push(Instruction::Invoke(
                invoke_type,
                MethodRef::new(
                    self.class.clone(),
                    injected.method.name.clone(),
                    injected.method.descriptor.clone(),
                ),
            ));

            if returns_result {
                let result = FieldType::object(flow_result.clone());
                code.push(Instruction::Invoke(
                    InvokeType::Virtual,
                    method_ref(
                        flow_result,
                        UnqualifiedName::FOLD,
                        vec![result.clone()],
                        Some(result),
                    ),
                ));
                code.push(Instruction::AStore(accumulator));
            }
        }

        let resume = labels.fresh_label();
        code.extend([
            Instruction::ALoad(accumulator),
            Instruction::GetField(FieldRef {
                owner: flow_result.clone(),
                name: UnqualifiedName::YIELDING,
                descriptor: FieldType::boolean(),
            }),
            Instruction::If(OrdComparison::EQ, resume),
        ]);
        if self.allow_return {
            self.yield_return(accumulator, &mut code);
        } else {
            throw_exception(ILLEGAL_YIELD, &mut code);
        }
        code.push(Instruction::Label(resume));

        for cell in &cells {
            self.release_local(cell, &mut code);
        }
        if let Some(saved) = &saved_stack {
            self.release_stack(saved, &mut code)?;
        }

        Ok(code)
    }

    /// Pop the stack into fresh locals, then bundle them into a `Stack` view
    ///
    /// When overwriting code in an instance method, a `this` at the bottom of the stack stays
    /// where it is.
    fn capture_stack(
        &self,
        locals: &mut LocalTracker,
        code: &mut Vec<Instruction>,
    ) -> Result<SavedStack, MixinError> {
        let mut values = self.frame.stack_values();
        let keeps_receiver = self.kind == InjectionKind::Overwrite
            && !self.is_static
            && values.first() == Some(&ValueRef::object(self.class.clone()));
        if keeps_receiver {
            values.remove(0);
        }

        let mut slots = vec![(0, TypeSort::Object); values.len()];
        for (idx, value) in values.iter().enumerate().rev() {
            if value.is_uninitialized() {
                let class = match value {
                    ValueRef::Uninitialized { class, .. } => class,
                    _ => self.class,
                };
                let wrapper = &self.runtime.uninitialized_type;
                code.extend([
                    Instruction::Pop,
                    Instruction::New(wrapper.clone()),
                    Instruction::Dup,
                    Instruction::Ldc(Constant::String(class.to_string())),
                    Instruction::Invoke(
                        InvokeType::Special,
                        method_ref(
                            wrapper,
                            UnqualifiedName::INIT,
                            vec![FieldType::object(BinaryName::STRING)],
                            None,
                        ),
                    ),
                ]);
            }
            let sort = value.sort();
            let slot = locals.allocate(sort)?;
            code.push(sort.store(slot));
            slots[idx] = (slot, sort);
        }

        let view = locals.allocate(TypeSort::Object)?;
        let internal_stack = &self.runtime.internal_stack;
        code.extend([
            Instruction::New(internal_stack.clone()),
            Instruction::Dup,
            Instruction::iconst(fit(values.len(), "Stack size")?),
            Instruction::ANewArray(RefType::Object(BinaryName::OBJECT)),
        ]);
        for (idx, (slot, sort)) in slots.iter().enumerate() {
            code.push(Instruction::Dup);
            code.push(Instruction::iconst(fit(idx, "Stack index")?));
            code.push(sort.load(*slot));
            code.extend(box_value(*sort));
            code.push(Instruction::AAStore);
        }
        code.extend([
            Instruction::Invoke(
                InvokeType::Special,
                method_ref(
                    internal_stack,
                    UnqualifiedName::INIT,
                    vec![FieldType::array(object())],
                    None,
                ),
            ),
            Instruction::AStore(view),
        ]);

        Ok(SavedStack { view, values })
    }

    /// Push the saved stack back, skipping placeholders of uninitialized objects
    fn release_stack(
        &self,
        saved: &SavedStack,
        code: &mut Vec<Instruction>,
    ) -> Result<(), MixinError> {
        let mut sites = HashSet::new();
        for (idx, value) in saved.values.iter().enumerate() {
            match value {
                ValueRef::Uninitialized { class, site } => {
                    if sites.insert(*site) {
                        code.push(Instruction::New(class.clone()));
                    } else {
                        code.push(Instruction::Dup);
                    }
                }
                ValueRef::UninitializedThis => code.push(Instruction::ALoad(0)),
                value => {
                    code.extend([
                        Instruction::ALoad(saved.view),
                        Instruction::iconst(fit(idx, "Stack index")?),
                        Instruction::Invoke(
                            InvokeType::Interface,
                            MethodRef::interface(
                                self.runtime.stack.clone(),
                                UnqualifiedName::GET,
                                MethodDescriptor {
                                    parameters: vec![FieldType::int()],
                                    return_type: Some(object()),
                                },
                            ),
                        ),
                    ]);
                    code.extend(unbox_value(value));
                }
            }
        }
        Ok(())
    }

    /// Push a new capture cell holding the value of a local
    fn capture_local(&self, slot: u16, value: &ValueRef, code: &mut Vec<Instruction>) {
        let sort = value.sort();
        let internal_captured = &self.runtime.internal_captured;
        let type_sort = FieldType::object(self.runtime.type_sort.clone());

        code.extend([
            Instruction::New(internal_captured.clone()),
            Instruction::Dup,
            sort.load(slot),
        ]);
        code.extend(box_value(sort));
        code.extend([
            Instruction::GetStatic(FieldRef {
                owner: self.runtime.type_sort.clone(),
                name: sort.constant_name(),
                descriptor: type_sort.clone(),
            }),
            Instruction::Invoke(
                InvokeType::Special,
                method_ref(
                    internal_captured,
                    UnqualifiedName::INIT,
                    vec![object(), type_sort],
                    None,
                ),
            ),
        ]);
    }

    /// Write the (possibly updated) value of a capture cell back into its local
    fn release_local(&self, cell: &Cell, code: &mut Vec<Instruction>) {
        let captured = &self.runtime.captured;
        code.extend([
            Instruction::ALoad(cell.cell),
            Instruction::CheckCast(RefType::Object(captured.clone())),
            Instruction::Invoke(
                InvokeType::Interface,
                MethodRef::interface(
                    captured.clone(),
                    UnqualifiedName::GET,
                    MethodDescriptor {
                        parameters: vec![],
                        return_type: Some(object()),
                    },
                ),
            ),
        ]);
        code.extend(unbox_value(&cell.value));
        code.push(cell.value.sort().store(cell.original));
    }

    /// Return the value yielded by the accumulator
    fn yield_return(&self, accumulator: u16, code: &mut Vec<Instruction>) {
        match self.return_type {
            None => code.push(Instruction::Return),
            Some(return_type) => {
                code.extend([
                    Instruction::ALoad(accumulator),
                    Instruction::GetField(FieldRef {
                        owner: self.runtime.flow_result.clone(),
                        name: UnqualifiedName::VALUE,
                        descriptor: object(),
                    }),
                ]);
                code.extend(unbox_value(&ValueRef::from(return_type)));
                code.push(TypeSort::from_field_type(return_type).return_instruction());
            }
        }
    }
}

/// Throw a `java/lang/Exception` with the given message
pub fn throw_exception(message: &str, code: &mut Vec<Instruction>) {
    code.extend([
        Instruction::New(BinaryName::EXCEPTION),
        Instruction::Dup,
        Instruction::Ldc(Constant::String(String::from(message))),
        Instruction::Invoke(
            InvokeType::Special,
            method_ref(
                &BinaryName::EXCEPTION,
                UnqualifiedName::INIT,
                vec![FieldType::object(BinaryName::STRING)],
                None,
            ),
        ),
        Instruction::AThrow,
    ]);
}
