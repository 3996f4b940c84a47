use super::TargetMethod;
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::model::Method;
use crate::jvm::BinaryName;
use crate::tag::Tag;

/// Find the index of the method a request targets
///
/// Candidates are the methods with the right name. A lone candidate is taken as is (with a warning
/// if its descriptor differs from a declared one); otherwise an
/// exact descriptor match wins, and failing that the candidates whose parameters start with the
/// target's parameter hint are considered (exactly one of them must remain).
pub fn find_target_method(
    target: &TargetMethod,
    methods: &[Method],
    class: &BinaryName,
) -> Result<usize, MixinError> {
    let not_found = || {
        MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::NoMethodFound,
            vec![target.to_string(), class.to_string()],
        )
    };

    let candidates: Vec<usize> = methods
        .iter()
        .enumerate()
        .filter(|(_, method)| method.name == target.name)
        .map(|(idx, _)| idx)
        .collect();

    match candidates.as_slice() {
        [] => return Err(not_found()),
        [only] => {
            let found = &methods[*only];
            if let Some(descriptor) = &target.descriptor {
                if found.descriptor != *descriptor {
                    log::warn!(
                        "Target {} resolved to {} in {}, the only method with that name",
                        target,
                        found.signature(),
                        class
                    );
                }
            }
            return Ok(*only);
        }
        _ => (),
    }

    if let Some(descriptor) = &target.descriptor {
        if let Some(exact) = candidates
            .iter()
            .find(|idx| methods[**idx].descriptor == *descriptor)
        {
            return Ok(*exact);
        }
    }

    let hinted: Vec<usize> = candidates
        .into_iter()
        .filter(|idx| {
            methods[*idx]
                .descriptor
                .parameters
                .starts_with(&target.parameter_hint)
        })
        .collect();

    match hinted.as_slice() {
        [] => Err(not_found()),
        [only] => Ok(*only),
        _ => Err(MixinError::new(
            Tag::ENGINE,
            MixinErrorCause::MethodOverloadAmbiguity,
            vec![
                target.to_string(),
                hinted
                    .iter()
                    .map(|idx| methods[*idx].signature().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ],
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::MethodSignature;
    use crate::jvm::{FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

    fn name(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(String::from(name)).unwrap()
    }

    fn method(method_name: &str, desc: &str) -> Method {
        Method::new(
            MethodAccessFlags::PUBLIC,
            name(method_name),
            MethodDescriptor::parse(desc).unwrap(),
            None,
        )
    }

    fn methods() -> Vec<Method> {
        vec![
            method("run", "()V"),
            method("run", "(I)V"),
            method("run", "(IJ)V"),
            method("stop", "(Ljava/lang/String;)Z"),
        ]
    }

    #[test]
    fn single_candidate() {
        let target = TargetMethod::inferred(name("stop"), vec![FieldType::int()]);
        assert_eq!(find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap(), 3);
    }

    #[test]
    fn single_candidate_with_other_descriptor() {
        let _ = env_logger::builder().is_test(true).try_init();

        let target = TargetMethod::exact(MethodSignature {
            name: name("stop"),
            descriptor: MethodDescriptor::parse("()Z").unwrap(),
        });
        assert_eq!(find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap(), 3);
    }

    #[test]
    fn exact_descriptor_wins() {
        let target = TargetMethod::exact(MethodSignature {
            name: name("run"),
            descriptor: MethodDescriptor::parse("(I)V").unwrap(),
        });
        assert_eq!(find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap(), 1);
    }

    #[test]
    fn parameter_hint() {
        let target = TargetMethod::inferred(name("run"), vec![FieldType::int(), FieldType::long()]);
        assert_eq!(find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap(), 2);

        let target = TargetMethod::inferred(name("run"), vec![FieldType::int()]);
        let err = find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::MethodOverloadAmbiguity);
        assert_eq!(err.context, vec!["run(I...)", "run(I)V, run(IJ)V"]);
    }

    #[test]
    fn missing_method() {
        let target = TargetMethod::inferred(name("walk"), vec![]);
        let err = find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::NoMethodFound);
        assert_eq!(err.context, vec!["walk(...)", "java/lang/Object"]);

        let target = TargetMethod::inferred(name("run"), vec![FieldType::long()]);
        let err = find_target_method(&target, &methods(), &BinaryName::OBJECT).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::NoMethodFound);
    }
}
