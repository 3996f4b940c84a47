use super::{TypeSort, ValueRef};
use crate::errors::SimulationErrorKind;
use crate::jvm::code::{Constant, Instruction, InvokeType};
use crate::jvm::model::Method;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName};
use crate::util::{SlotVec, Width};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Both halves are addressed by slot: `long` and `double` take up two slots. Local slots
/// that hold nothing usable (never written, or the other half of a split wide value) contain
/// `ValueRef::Top`.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame {
    /// Local variables in scope
    pub locals: SlotVec<ValueRef>,

    /// Types of values on the stack (top of the stack is last)
    pub stack: SlotVec<ValueRef>,
}

impl Frame {
    pub fn new(
        locals: impl IntoIterator<Item = ValueRef>,
        stack: impl IntoIterator<Item = ValueRef>,
    ) -> Frame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    /// Frame on entry to a method: the receiver (if any) followed by the parameters
    ///
    /// Inside a constructor, the receiver starts off as `UninitializedThis`.
    pub fn method_entry(class: &BinaryName, method: &Method) -> Frame {
        let mut locals = SlotVec::new();
        if !method.is_static() {
            locals.push(if method.is_constructor() {
                ValueRef::UninitializedThis
            } else {
                ValueRef::object(class.clone())
            });
        }
        locals.extend(method.descriptor.parameters.iter().map(ValueRef::from));
        Frame {
            locals,
            stack: SlotVec::new(),
        }
    }

    /// Type of a usable local variable
    pub fn local(&self, slot: u16) -> Option<&ValueRef> {
        self.locals
            .get(usize::from(slot))
            .filter(|value| **value != ValueRef::Top)
    }

    /// Overwrite a local variable (possibly splitting a wide value or extending the locals)
    pub fn set_local(&mut self, slot: u16, value: ValueRef) {
        self.locals.set(usize::from(slot), value, || ValueRef::Top);
    }

    /// Values on the stack, from the bottom up
    pub fn stack_values(&self) -> Vec<ValueRef> {
        self.stack.values().cloned().collect()
    }

    /// Update the frame to reflect the effects of the given instruction
    ///
    /// `index` is the position of the instruction in the method body and `this_class` the class
    /// declaring the method (it becomes the type of `this` once the super constructor is called).
    pub fn step(
        &mut self,
        insn: &Instruction,
        index: usize,
        this_class: &BinaryName,
    ) -> Result<(), SimulationErrorKind> {
        let result = step_instruction(self, insn, index, this_class);
        log::trace!("#{} {:?} => {:?}", index, insn, self.stack);
        result
    }
}

fn step_instruction(
    frame: &mut self::Frame,
    insn: &Instruction,
    index: usize,
    this_class: &BinaryName,
) -> Result<(), SimulationErrorKind> {
    use Instruction::*;
    use ValueRef::{Null, Sort, UninitializedThis};

    const INT: ValueRef = ValueRef::INT;
    const LONG: ValueRef = ValueRef::LONG;
    const FLOAT: ValueRef = ValueRef::FLOAT;
    const DOUBLE: ValueRef = ValueRef::DOUBLE;
    const REFERENCE: ValueRef = ValueRef::Sort(TypeSort::Object);

    let stack = &mut frame.stack;
    let locals = &mut frame.locals;

    match insn {
        Nop | Label(_) | Frame(_) | LineNumber(_) => (),
        AConstNull => {
            stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            stack.push(INT);
        }
        LConst0 | LConst1 => {
            stack.push(LONG);
        }
        FConst0 | FConst1 | FConst2 => {
            stack.push(FLOAT);
        }
        DConst0 | DConst1 => {
            stack.push(DOUBLE);
        }
        BiPush(_) | SiPush(_) => {
            stack.push(INT);
        }
        Ldc(constant) => {
            stack.push(match constant {
                Constant::Integer(_) => INT,
                Constant::Long(_) => LONG,
                Constant::Float(_) => FLOAT,
                Constant::Double(_) => DOUBLE,
                Constant::String(_) => ValueRef::object(BinaryName::STRING),
                Constant::Class(_) => ValueRef::object(BinaryName::CLASS),
                Constant::MethodType(_) => ValueRef::object(BinaryName::METHODTYPE),
            });
        }

        ILoad(offset) => {
            get_local_expecting_type(locals, *offset, &INT)?;
            stack.push(INT);
        }
        LLoad(offset) => {
            get_local_expecting_type(locals, *offset, &LONG)?;
            stack.push(LONG);
        }
        FLoad(offset) => {
            get_local_expecting_type(locals, *offset, &FLOAT)?;
            stack.push(FLOAT);
        }
        DLoad(offset) => {
            get_local_expecting_type(locals, *offset, &DOUBLE)?;
            stack.push(DOUBLE);
        }
        ALoad(offset) => {
            let typ = get_local(locals, *offset)?;
            if !typ.is_reference() {
                return Err(SimulationErrorKind::InvalidType);
            }
            stack.push(typ);
        }

        IALoad | BALoad | CALoad | SALoad => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(INT);
        }
        LALoad => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(LONG);
        }
        FALoad => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(FLOAT);
        }
        DALoad => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(DOUBLE);
        }
        AALoad => {
            pop_expecting_type(stack, &INT)?;
            let array_type = pop(stack)?;
            let element_type = match array_type {
                ValueRef::Object(ref_type @ RefType::ObjectArray(_)) => ref_type
                    .element()
                    .map(ValueRef::from)
                    .ok_or(SimulationErrorKind::NotArrayType)?,
                ValueRef::Object(_) => return Err(SimulationErrorKind::NotArrayType),
                Null | Sort(TypeSort::Object) => REFERENCE,
                _ => return Err(SimulationErrorKind::InvalidType),
            };
            stack.push(element_type);
        }

        IStore(offset) => {
            pop_expecting_type(stack, &INT)?;
            update_local_type(locals, *offset, INT);
        }
        LStore(offset) => {
            pop_expecting_type(stack, &LONG)?;
            update_local_type(locals, *offset, LONG);
        }
        FStore(offset) => {
            pop_expecting_type(stack, &FLOAT)?;
            update_local_type(locals, *offset, FLOAT);
        }
        DStore(offset) => {
            pop_expecting_type(stack, &DOUBLE)?;
            update_local_type(locals, *offset, DOUBLE);
        }
        AStore(offset) => {
            let popped_type = pop(stack)?;
            if !popped_type.is_reference() {
                return Err(SimulationErrorKind::InvalidType);
            }
            update_local_type(locals, *offset, popped_type);
        }

        IAStore | BAStore | CAStore | SAStore => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }
        LAStore => {
            pop_expecting_type(stack, &LONG)?;
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }
        FAStore => {
            pop_expecting_type(stack, &FLOAT)?;
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }
        DAStore => {
            pop_expecting_type(stack, &DOUBLE)?;
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }
        AAStore => {
            pop_expecting_type(stack, &REFERENCE)?;
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }

        Pop => {
            let _ = pop_expecting_width(stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let _ = pop_expecting_width(stack, 1)?;
                }

                // Form 2
                2 => (),

                other => return Err(SimulationErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = pop_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg1);
        }

        DupX1 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg2);
            stack.push(arg1);
        }

        DupX2 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop(stack)?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                other => return Err(SimulationErrorKind::InvalidWidth(other)),
            }
        }

        Dup2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    stack.push(arg1.clone());
                    stack.push(arg1);
                }

                other => return Err(SimulationErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X1 => {
            let arg1 = pop(stack)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                other => return Err(SimulationErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    let arg3 = pop(stack)?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = pop_expecting_width(stack, 1)?;
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg4);
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 3
                        2 => {
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        other => return Err(SimulationErrorKind::InvalidWidth(other)),
                    }
                }

                2 => {
                    let arg2 = pop(stack)?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = pop_expecting_width(stack, 1)?;
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 4
                        2 => {
                            stack.push(arg1.clone());
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        other => return Err(SimulationErrorKind::InvalidWidth(other)),
                    }
                }

                other => return Err(SimulationErrorKind::InvalidWidth(other)),
            }
        }

        Swap => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.push(arg1);
            stack.push(arg2);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &INT)?;
            stack.push(INT);
        }

        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => {
            pop_expecting_type(stack, &LONG)?;
            pop_expecting_type(stack, &LONG)?;
            stack.push(LONG);
        }

        FAdd | FSub | FDiv | FMul | FRem => {
            pop_expecting_type(stack, &FLOAT)?;
            pop_expecting_type(stack, &FLOAT)?;
            stack.push(FLOAT);
        }

        DAdd | DSub | DDiv | DMul | DRem => {
            pop_expecting_type(stack, &DOUBLE)?;
            pop_expecting_type(stack, &DOUBLE)?;
            stack.push(DOUBLE);
        }

        INeg | I2B | I2C | I2S => {
            pop_expecting_type(stack, &INT)?;
            stack.push(INT);
        }

        LNeg => {
            pop_expecting_type(stack, &LONG)?;
            stack.push(LONG);
        }

        FNeg => {
            pop_expecting_type(stack, &FLOAT)?;
            stack.push(FLOAT);
        }

        DNeg => {
            pop_expecting_type(stack, &DOUBLE)?;
            stack.push(DOUBLE);
        }

        LSh(_) => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &LONG)?;
            stack.push(LONG);
        }

        IInc(offset, _) => {
            get_local_expecting_type(locals, *offset, &INT)?;
        }

        I2L | F2L | D2L => {
            pop_expecting_type(stack, &conversion_source(insn))?;
            stack.push(LONG);
        }
        I2F | L2F | D2F => {
            pop_expecting_type(stack, &conversion_source(insn))?;
            stack.push(FLOAT);
        }
        I2D | L2D | F2D => {
            pop_expecting_type(stack, &conversion_source(insn))?;
            stack.push(DOUBLE);
        }
        L2I | F2I | D2I => {
            pop_expecting_type(stack, &conversion_source(insn))?;
            stack.push(INT);
        }

        LCmp => {
            pop_expecting_type(stack, &LONG)?;
            pop_expecting_type(stack, &LONG)?;
            stack.push(INT);
        }
        FCmp(_) => {
            pop_expecting_type(stack, &FLOAT)?;
            pop_expecting_type(stack, &FLOAT)?;
            stack.push(INT);
        }
        DCmp(_) => {
            pop_expecting_type(stack, &DOUBLE)?;
            pop_expecting_type(stack, &DOUBLE)?;
            stack.push(INT);
        }

        If(_, _) | TableSwitch { .. } | LookupSwitch { .. } => {
            pop_expecting_type(stack, &INT)?;
        }
        IfICmp(_, _) => {
            pop_expecting_type(stack, &INT)?;
            pop_expecting_type(stack, &INT)?;
        }
        IfACmp(_, _) => {
            pop_expecting_type(stack, &REFERENCE)?;
            pop_expecting_type(stack, &REFERENCE)?;
        }
        IfNull(_, _) | MonitorEnter | MonitorExit => {
            pop_expecting_type(stack, &REFERENCE)?;
        }
        Goto(_) | Return => (),
        IReturn => pop_expecting_type(stack, &INT)?,
        LReturn => pop_expecting_type(stack, &LONG)?,
        FReturn => pop_expecting_type(stack, &FLOAT)?,
        DReturn => pop_expecting_type(stack, &DOUBLE)?,
        AReturn => pop_expecting_type(stack, &REFERENCE)?,
        AThrow => {
            pop_expecting_type(stack, &REFERENCE)?;
            stack.clear();
        }

        GetStatic(field) => {
            stack.push(ValueRef::from(&field.descriptor));
        }
        PutStatic(field) => {
            pop_expecting_type(stack, &ValueRef::from(&field.descriptor))?;
        }
        GetField(field) => {
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(ValueRef::from(&field.descriptor));
        }
        PutField(field) => {
            pop_expecting_type(stack, &ValueRef::from(&field.descriptor))?;
            pop_expecting_type(stack, &REFERENCE)?;
        }

        Invoke(invoke_type, method) => {
            let desc = &method.descriptor;
            pop_arguments(stack, desc)?;

            if *invoke_type == InvokeType::Special && method.name == UnqualifiedName::INIT {
                // Initialize
                match pop(stack)? {
                    UninitializedThis => {
                        let initialized = ValueRef::object(this_class.clone());
                        replace_all(stack, &UninitializedThis, &initialized);
                        replace_all(locals, &UninitializedThis, &initialized);
                    }

                    uninitialized @ ValueRef::Uninitialized { .. } => {
                        let initialized = match &uninitialized {
                            ValueRef::Uninitialized { class, .. } => {
                                ValueRef::object(class.clone())
                            }
                            _ => REFERENCE,
                        };
                        replace_all(stack, &uninitialized, &initialized);
                        replace_all(locals, &uninitialized, &initialized);
                    }

                    _ => return Err(SimulationErrorKind::InvalidType),
                }
            } else {
                // Pop off the receiver type
                if *invoke_type != InvokeType::Static {
                    let found_receiver = pop(stack)?;
                    if !found_receiver.is_reference() {
                        log::error!(
                            "Incompatible receiver: found {:?} (for {}.{}{})",
                            found_receiver,
                            method.owner,
                            method.name,
                            desc.render(),
                        );
                        return Err(SimulationErrorKind::InvalidType);
                    }
                }

                // Push the return type
                if let Some(return_type) = &desc.return_type {
                    stack.push(ValueRef::from(return_type));
                }
            }
        }

        InvokeDynamic(invoke_dynamic) => {
            pop_arguments(stack, &invoke_dynamic.descriptor)?;
            if let Some(return_type) = &invoke_dynamic.descriptor.return_type {
                stack.push(ValueRef::from(return_type));
            }
        }

        New(class) => {
            stack.push(ValueRef::Uninitialized {
                class: class.clone(),
                site: index,
            });
        }
        NewArray(base_type) => {
            pop_expecting_type(stack, &INT)?;
            stack.push(ValueRef::Object(RefType::array(FieldType::Base(*base_type))));
        }
        ANewArray(ref_type) => {
            pop_expecting_type(stack, &INT)?;
            stack.push(ValueRef::Object(RefType::array(FieldType::Ref(
                ref_type.clone(),
            ))));
        }
        MultiANewArray(ref_type, dimensions) => {
            for _ in 0..*dimensions {
                pop_expecting_type(stack, &INT)?;
            }
            stack.push(ValueRef::Object(ref_type.clone()));
        }
        ArrayLength => {
            match pop(stack)? {
                ValueRef::Object(RefType::PrimitiveArray(_) | RefType::ObjectArray(_))
                | Null
                | Sort(TypeSort::Object) => (),
                _ => return Err(SimulationErrorKind::NotArrayType),
            }
            stack.push(INT);
        }

        CheckCast(ref_type) => {
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(ValueRef::Object(ref_type.clone()));
        }
        InstanceOf(_) => {
            pop_expecting_type(stack, &REFERENCE)?;
            stack.push(INT);
        }
    }

    Ok(())
}

/// Input type of a primitive conversion instruction
fn conversion_source(insn: &Instruction) -> ValueRef {
    match insn {
        Instruction::L2I | Instruction::L2F | Instruction::L2D => ValueRef::LONG,
        Instruction::F2I | Instruction::F2L | Instruction::F2D => ValueRef::FLOAT,
        Instruction::D2I | Instruction::D2L | Instruction::D2F => ValueRef::DOUBLE,
        _ => ValueRef::INT,
    }
}

fn pop_arguments(
    stack: &mut SlotVec<ValueRef>,
    desc: &MethodDescriptor,
) -> Result<(), SimulationErrorKind> {
    for expected_arg_type in desc.parameters.iter().rev() {
        let expected = ValueRef::from(expected_arg_type);
        let found_arg_type = pop(stack)?;
        if !found_arg_type.is_compatible(&expected) {
            log::error!(
                "Incompatible argument types: found {:?} but expected {:?} (for {})",
                found_arg_type,
                expected,
                desc.render(),
            );
            return Err(SimulationErrorKind::InvalidType);
        }
    }
    Ok(())
}

fn replace_all(slots: &mut SlotVec<ValueRef>, original: &ValueRef, updated: &ValueRef) {
    slots.map_in_place(|value| (value == original).then(|| updated.clone()));
}

fn get_local(locals: &SlotVec<ValueRef>, offset: u16) -> Result<ValueRef, SimulationErrorKind> {
    match locals.get(usize::from(offset)) {
        None | Some(ValueRef::Top) => Err(SimulationErrorKind::InvalidIndex),
        Some(found) => Ok(found.clone()),
    }
}

fn get_local_expecting_type(
    locals: &SlotVec<ValueRef>,
    offset: u16,
    expected_type: &ValueRef,
) -> Result<(), SimulationErrorKind> {
    let found = get_local(locals, offset)?;
    if found.is_compatible(expected_type) {
        Ok(())
    } else {
        log::error!(
            "Incompatible local #{}: found {:?} but expected {:?}",
            offset,
            found,
            expected_type
        );
        Err(SimulationErrorKind::InvalidType)
    }
}

fn update_local_type(locals: &mut SlotVec<ValueRef>, offset: u16, new_type: ValueRef) {
    locals.set(usize::from(offset), new_type, || ValueRef::Top);
}

fn pop(stack: &mut SlotVec<ValueRef>) -> Result<ValueRef, SimulationErrorKind> {
    stack.pop().ok_or(SimulationErrorKind::EmptyStack)
}

fn pop_expecting_width(
    stack: &mut SlotVec<ValueRef>,
    expected_width: usize,
) -> Result<ValueRef, SimulationErrorKind> {
    let typ = pop(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(SimulationErrorKind::InvalidWidth(found_width))
    }
}

fn pop_expecting_type(
    stack: &mut SlotVec<ValueRef>,
    expected_type: &ValueRef,
) -> Result<(), SimulationErrorKind> {
    let typ = pop(stack)?;
    if typ.is_compatible(expected_type) {
        Ok(())
    } else {
        log::error!(
            "Incompatible operand: found {:?} but expected {:?}",
            typ,
            expected_type
        );
        Err(SimulationErrorKind::InvalidType)
    }
}
