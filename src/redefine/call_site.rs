use super::RedefinedMethod;
use crate::analysis::{TypeSort, ValueRef};
use crate::errors::{fit, MixinError};
use crate::inject::{box_value, unbox_value, LocalTracker};
use crate::jvm::code::{Instruction, InvokeType, MethodRef};
use crate::jvm::model::Method;
use crate::jvm::{BinaryName, FieldType, RefType};
use crate::settings::Settings;

/// Rewrite calls to redefined methods of `class` into calls to the matching dispatcher
///
/// The instance dispatcher is private, so it is always called with `invokespecial`.
///
/// Arguments on the stack get packed into a fresh `Object[]`, the dispatch index is pushed, and
/// the dispatcher's result is unboxed back into the original return type (or popped for `void`
/// methods). Returns the number of rewritten call sites.
pub fn rewrite_call_sites(
    method: &mut Method,
    class: &BinaryName,
    redefined: &[&RedefinedMethod],
    settings: &Settings,
) -> Result<usize, MixinError> {
    let mut locals = LocalTracker::for_method(method);
    let body = match method.body.as_mut() {
        Some(body) => body,
        None => return Ok(0),
    };

    let mut rewritten = 0;
    let mut code = Vec::with_capacity(body.instructions.len());
    for insn in body.instructions.drain(..) {
        let (invoke_type, callee) = match &insn {
            Instruction::Invoke(invoke_type, callee) if callee.owner == *class => {
                (*invoke_type, callee)
            }
            _ => {
                code.push(insn);
                continue;
            }
        };
        let is_static = invoke_type == InvokeType::Static;
        let target = redefined.iter().find(|redefined| {
            redefined.method.name == callee.name
                && redefined.method.descriptor == callee.descriptor
                && redefined.method.is_static() == is_static
        });
        let target = match target {
            Some(target) => target,
            None => {
                code.push(insn);
                continue;
            }
        };

        let array = pack_arguments(&callee.descriptor.parameters, &mut locals, &mut code)?;
        code.push(Instruction::iconst(fit(target.dispatch_index, "Dispatch index")?));
        code.push(Instruction::ALoad(array));
        let dispatch_type = if is_static {
            InvokeType::Static
        } else {
            InvokeType::Special
        };
        code.push(Instruction::Invoke(
            dispatch_type,
            MethodRef::new(
                class.clone(),
                settings.dispatcher_name(class, is_static),
                Settings::dispatcher_descriptor(),
            ),
        ));
        match &callee.descriptor.return_type {
            None => code.push(Instruction::Pop),
            Some(return_type) => code.extend(unbox_value(&ValueRef::from(return_type))),
        }
        rewritten += 1;
    }
    body.instructions = code;
    body.ensure_max_locals(locals.max_locals())?;
    Ok(rewritten)
}

/// Pop the arguments off the stack into a new `Object[]`, stored in a fresh local
fn pack_arguments(
    parameters: &[FieldType],
    locals: &mut LocalTracker,
    code: &mut Vec<Instruction>,
) -> Result<u16, MixinError> {
    let array = locals.allocate(TypeSort::Object)?;
    code.push(Instruction::iconst(fit(parameters.len(), "Parameter count")?));
    code.push(Instruction::ANewArray(RefType::Object(BinaryName::OBJECT)));
    code.push(Instruction::AStore(array));

    // The last argument is on top of the stack
    for (idx, parameter) in parameters.iter().enumerate().rev() {
        let sort = TypeSort::from_field_type(parameter);
        let current = locals.allocate(sort)?;
        code.push(sort.store(current));
        code.push(Instruction::ALoad(array));
        code.push(Instruction::iconst(fit(idx, "Parameter index")?));
        code.push(sort.load(current));
        code.extend(box_value(sort));
        code.push(Instruction::AAStore);
    }
    Ok(array)
}
