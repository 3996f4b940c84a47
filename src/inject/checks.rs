use super::{InjectionRequest, ParameterRole};
use crate::analysis::{Frame, ValueRef};
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::model::Method;
use crate::jvm::RenderDescriptor;
use crate::select::InjectionKind;
use crate::settings::RuntimeClasses;

/// Check that requests sharing an injection point can all be honoured there
///
/// `frame` is the frame observed by the injected code and `target` the method it goes into.
pub fn check_validity(
    requests: &[&InjectionRequest],
    target: &Method,
    frame: &Frame,
    runtime: &RuntimeClasses,
) -> Result<(), MixinError> {
    if requests.len() > 1 {
        if let Some(overwrite) = requests
            .iter()
            .find(|request| request.kind == InjectionKind::Overwrite)
        {
            return Err(MixinError::new(
                overwrite.declaration.clone(),
                MixinErrorCause::ConflictingInjections,
                vec![target.signature().to_string(), requests.len().to_string()],
            ));
        }
    }

    for request in requests {
        let injected = &request.injected;
        let injected_sig = injected.method.signature().to_string();
        let fail = |cause, context| MixinError::new(request.declaration.clone(), cause, context);

        if target.is_static() && !injected.is_static() {
            return Err(fail(
                MixinErrorCause::ShouldBeStatic,
                vec![injected_sig, target.signature().to_string()],
            ));
        }

        if let Some(return_type) = &injected.method.descriptor.return_type {
            if !injected.returns_result(runtime) {
                return Err(fail(
                    MixinErrorCause::WrongReturnType,
                    vec![injected_sig, return_type.render()],
                ));
            }
        }

        let roles = injected.roles(runtime, &request.declaration)?;

        let mut locals = vec![];
        for slot in &request.locals {
            match frame.local(*slot) {
                Some(value) => locals.push(value),
                None => {
                    return Err(fail(
                        MixinErrorCause::WrongNumLocals,
                        vec![
                            injected_sig,
                            slot.to_string(),
                            target.signature().to_string(),
                        ],
                    ))
                }
            }
        }

        let captured = roles
            .iter()
            .filter(|role| **role == ParameterRole::Captured)
            .count();
        if captured != request.locals.len() {
            return Err(fail(
                MixinErrorCause::LocalParameterMismatch,
                vec![
                    injected_sig,
                    captured.to_string(),
                    request.locals.len().to_string(),
                ],
            ));
        }

        if injected.capture_types.len() != request.locals.len() {
            return Err(fail(
                MixinErrorCause::WrongNumCaptureTypes,
                vec![
                    injected_sig,
                    injected.capture_types.len().to_string(),
                    request.locals.len().to_string(),
                ],
            ));
        }

        for ((slot, found), declared) in request
            .locals
            .iter()
            .zip(&locals)
            .zip(&injected.capture_types)
        {
            let expected = ValueRef::from(declared);
            let compatible = !found.is_uninitialized()
                && (found.boxable_to(&expected)
                    || (found.is_reference() && expected.is_reference()));
            if !compatible {
                return Err(fail(
                    MixinErrorCause::WrongLocalType,
                    vec![
                        injected_sig,
                        slot.to_string(),
                        declared.render(),
                        format!("{:?}", found),
                    ],
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inject::{InjectedMethod, TargetMethod};
    use crate::jvm::code::{Instruction, MethodBody};
    use crate::jvm::{FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};
    use crate::select::{Boundary, InjectionPoint, Selector};
    use crate::settings::Settings;
    use crate::tag::Tag;
    use std::sync::Arc;

    const CAPTURES_TWO: &str = "(Ljmixin/runtime/Captured;Ljmixin/runtime/Captured;)V";

    fn name(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(String::from(name)).unwrap()
    }

    fn target() -> Method {
        Method::new(
            MethodAccessFlags::STATIC,
            name("run"),
            MethodDescriptor::parse("(IJ)V").unwrap(),
            Some(MethodBody::new(vec![Instruction::Return], 3, 0)),
        )
    }

    fn request(locals: Vec<u16>, capture_types: Vec<FieldType>) -> InjectionRequest {
        InjectionRequest {
            declaration: Tag::new("com/example/Mixin"),
            target: TargetMethod::inferred(name("run"), vec![]),
            kind: InjectionKind::Before,
            point: InjectionPoint::Single {
                selector: Selector::Boundary {
                    boundary: Boundary::Head,
                    static_injection: true,
                },
                ordinal: 0,
                count: 1,
            },
            locals,
            injected: Arc::new(InjectedMethod {
                method: Method::new(
                    MethodAccessFlags::STATIC,
                    name("hook"),
                    MethodDescriptor::parse(CAPTURES_TWO).unwrap(),
                    None,
                ),
                capture_types,
                dispatch_index: 0,
            }),
            targets: vec![],
        }
    }

    fn check(request: &InjectionRequest) -> Result<(), MixinError> {
        let frame = Frame::new([ValueRef::INT, ValueRef::LONG], []);
        check_validity(&[request], &target(), &frame, &Settings::default().runtime)
    }

    #[test]
    fn captured_locals_are_typed() {
        let valid = request(vec![0, 1], vec![FieldType::int(), FieldType::long()]);
        assert_eq!(check(&valid), Ok(()));

        let swapped = request(vec![0, 1], vec![FieldType::long(), FieldType::int()]);
        let err = check(&swapped).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::WrongLocalType);
        assert_eq!(err.context[1], "0");

        let missing = request(vec![0, 5], vec![FieldType::int(), FieldType::int()]);
        assert_eq!(check(&missing).unwrap_err().cause, MixinErrorCause::WrongNumLocals);
    }

    #[test]
    fn every_captured_local_needs_a_type() {
        let short = request(vec![0, 1], vec![FieldType::int()]);
        let err = check(&short).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::WrongNumCaptureTypes);
        assert_eq!(
            err.message(),
            "Code injection 'hook(Ljmixin/runtime/Captured;Ljmixin/runtime/Captured;)V' declares types for 1 captured locals, but requests 2 locals."
        );
    }
}
