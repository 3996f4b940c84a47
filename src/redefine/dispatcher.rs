use super::RedefinedMethod;
use crate::analysis::{TypeSort, ValueRef};
use crate::errors::{fit, MixinError, MixinErrorCause};
use crate::inject::{box_value, throw_exception, unbox_value};
use crate::jvm::code::{
    Instruction, LabelGenerator, MethodBody, SynLabel, SynLabelGenerator, TryCatchBlock,
};
use crate::jvm::model::Method;
use crate::jvm::{MethodAccessFlags, UnqualifiedName};
use crate::settings::Settings;
use crate::tag::Tag;
use crate::util::Width;
use std::collections::HashMap;
use std::sync::Arc;

/// Message of the exception thrown by a dispatcher given an unknown index
pub const INVALID_METHOD_CALL: &str = "Invalid method call";

/// Build a dispatcher with one case per method
///
/// All the methods must have the staticness of the dispatcher. The dispatcher switches on the
/// index, and its default case throws.
pub fn build_dispatcher(
    name: UnqualifiedName,
    is_static: bool,
    methods: &[Arc<RedefinedMethod>],
) -> Result<Method, MixinError> {
    let mut methods: Vec<&RedefinedMethod> = methods.iter().map(Arc::as_ref).collect();
    methods.sort_by_key(|method| method.dispatch_index);

    let index_slot: u16 = if is_static { 0 } else { 1 };
    let array_slot = index_slot + 1;

    let mut labels = SynLabelGenerator::new(SynLabel::START);
    let default = labels.fresh_label();
    let cases: Vec<SynLabel> = methods.iter().map(|_| labels.fresh_label()).collect();

    let mut keyed: Vec<(i32, SynLabel)> = Vec::with_capacity(methods.len());
    for (method, case) in methods.iter().zip(&cases) {
        keyed.push((fit(method.dispatch_index, "Dispatch index")?, *case));
    }

    let mut code = vec![Instruction::ILoad(index_slot), switch(default, keyed)];
    let mut try_catch = vec![];
    let mut max_locals = usize::from(array_slot) + 1;
    let mut max_stack = 3;

    for (redefined, case) in methods.iter().zip(&cases) {
        let method = &redefined.method;
        let body = method.body.as_ref().ok_or_else(|| {
            MixinError::new(
                Tag::ENGINE,
                MixinErrorCause::MissingCode,
                vec![method.signature().to_string()],
            )
        })?;
        code.push(Instruction::Label(*case));

        // Unpack the arguments where the copied body expects its parameters
        let mut slot = array_slot + 1;
        for (idx, parameter) in method.descriptor.parameters.iter().enumerate() {
            let value = ValueRef::from(parameter);
            code.push(Instruction::ALoad(array_slot));
            code.push(Instruction::iconst(fit(idx, "Parameter index")?));
            code.push(Instruction::AALoad);
            code.extend(unbox_value(&value));
            code.push(value.sort().store(slot));
            slot += parameter.width() as u16;
        }

        let mut renamed: HashMap<SynLabel, SynLabel> = HashMap::new();
        for label in body
            .labels()
            .into_iter()
            .chain(body.instructions.iter().flat_map(Instruction::jump_targets))
            .chain(body.try_catch.iter().flat_map(|block| [block.start, block.end, block.handler]))
        {
            renamed.entry(label).or_insert_with(|| labels.fresh_label());
        }
        let rename = |label: SynLabel| renamed.get(&label).copied().unwrap_or(label);

        for insn in &body.instructions {
            if let Instruction::Frame(_) = insn {
                continue;
            }
            let mut insn = insn.map_labels(rename);
            insn.map_local(|slot| if is_static || slot > 0 { slot + 2 } else { slot });
            match insn {
                Instruction::Return => {
                    code.push(Instruction::AConstNull);
                    code.push(Instruction::AReturn);
                }
                Instruction::IReturn => boxed_return(TypeSort::Int, &mut code),
                Instruction::LReturn => boxed_return(TypeSort::Long, &mut code),
                Instruction::FReturn => boxed_return(TypeSort::Float, &mut code),
                Instruction::DReturn => boxed_return(TypeSort::Double, &mut code),
                insn => code.push(insn),
            }
        }

        try_catch.extend(body.try_catch.iter().map(|block| TryCatchBlock {
            start: rename(block.start),
            end: rename(block.end),
            handler: rename(block.handler),
            catch_type: block.catch_type.clone(),
        }));

        max_locals = max_locals
            .max(usize::from(body.max_locals) + 2)
            .max(usize::from(slot));
        max_stack = max_stack.max(usize::from(body.max_stack)).max(3);
    }

    code.push(Instruction::Label(default));
    throw_exception(INVALID_METHOD_CALL, &mut code);

    log::debug!("Built dispatcher {} with {} cases", name, methods.len());

    let access_flags = MethodAccessFlags::generated(is_static);
    let mut body = MethodBody::new(
        code,
        fit(max_locals, "Local variable count")?,
        fit(max_stack, "Stack size")?,
    );
    body.try_catch = try_catch;
    Ok(Method::new(
        access_flags,
        name,
        Settings::dispatcher_descriptor(),
        Some(body),
    ))
}

/// Switch over keys in ascending order
///
/// Keys close enough together get a `tableswitch`, with the gaps going to `default`. Sparse keys
/// get a `lookupswitch`. The threshold weighs size against comparisons the same way javac does.
fn switch(default: SynLabel, keyed: Vec<(i32, SynLabel)>) -> Instruction {
    let (low, high) = match (keyed.first(), keyed.last()) {
        (Some((low, _)), Some((high, _))) => (*low, *high),
        _ => {
            return Instruction::LookupSwitch {
                default,
                targets: keyed,
            }
        }
    };

    let cases = keyed.len() as i64;
    let table_cost = 4 + (i64::from(high) - i64::from(low) + 1) + 3 * 3;
    let lookup_cost = 3 + 2 * cases + 3 * cases;
    if table_cost > lookup_cost {
        return Instruction::LookupSwitch {
            default,
            targets: keyed,
        };
    }

    let mut targets = vec![default; (high - low) as usize + 1];
    for (key, case) in keyed {
        targets[(key - low) as usize] = case;
    }
    Instruction::TableSwitch {
        default,
        low,
        targets,
    }
}

/// Box the primitive on top of the stack and return it
fn boxed_return(sort: TypeSort, code: &mut Vec<Instruction>) {
    code.extend(box_value(sort));
    code.push(Instruction::AReturn);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::OrdComparison;
    use crate::jvm::{BinaryName, MethodDescriptor, Name, ParseDescriptor};

    fn redefined(name: &str, desc: &str, index: u32, code: Vec<Instruction>) -> Arc<RedefinedMethod> {
        Arc::new(RedefinedMethod {
            method: Method::new(
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                UnqualifiedName::from_string(String::from(name)).unwrap(),
                MethodDescriptor::parse(desc).unwrap(),
                Some(MethodBody::new(code, 3, 4)),
            ),
            dispatch_index: index,
            targets: vec![BinaryName::OBJECT],
        })
    }

    #[test]
    fn dense_switch_with_default() {
        // Past every label the dispatcher generates itself
        let label = (0..50).fold(SynLabel::START, |label, _| label.next());
        let methods = [
            redefined(
                "abs",
                "(I)I",
                8,
                vec![
                    Instruction::ILoad(0),
                    Instruction::If(OrdComparison::GE, label),
                    Instruction::ILoad(0),
                    Instruction::INeg,
                    Instruction::IReturn,
                    Instruction::Label(label),
                    Instruction::ILoad(0),
                    Instruction::IReturn,
                ],
            ),
            redefined("nothing", "()V", 5, vec![Instruction::Return]),
            redefined("still_nothing", "()V", 6, vec![Instruction::Return]),
        ];
        let name = UnqualifiedName::from_string(String::from("static_uber")).unwrap();
        let dispatcher = build_dispatcher(name, true, &methods).unwrap();
        assert!(dispatcher.is_static());
        let body = dispatcher.body.unwrap();

        let (default, low, targets) = match &body.instructions[1] {
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => (*default, *low, targets.clone()),
            other => panic!("expected a switch, got {:?}", other),
        };
        assert_eq!(body.instructions[0], Instruction::ILoad(0));
        assert_eq!(low, 5);
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[2], default);
        assert!(targets.iter().filter(|target| **target != default).count() == 3);

        // Index 5 returns null
        let case = body.position_of(targets[0]).unwrap();
        assert_eq!(
            &body.instructions[case + 1..case + 3],
            &[Instruction::AConstNull, Instruction::AReturn]
        );

        // Index 8 unpacks its argument into slot 2, and its own label got renamed
        let case = body.position_of(targets[3]).unwrap();
        assert_eq!(body.instructions[case + 1], Instruction::ALoad(1));
        assert_eq!(body.instructions[case + 6], Instruction::IStore(2));
        assert_eq!(body.instructions[case + 7], Instruction::ILoad(2));
        assert!(!body.instructions.contains(&Instruction::Label(label)));
        assert!(!body.instructions.contains(&Instruction::IReturn));

        let default = body.position_of(default).unwrap();
        assert_eq!(body.instructions.last(), Some(&Instruction::AThrow));
        assert!(default > case);
        assert_eq!(body.max_locals, 5);
    }

    #[test]
    fn sparse_indices() {
        let methods = [
            redefined("first", "()V", 0, vec![Instruction::Return]),
            redefined("later", "()V", 1_000_000, vec![Instruction::Return]),
        ];
        let name = UnqualifiedName::from_string(String::from("static_uber")).unwrap();
        let body = build_dispatcher(name, true, &methods).unwrap().body.unwrap();

        match &body.instructions[1] {
            Instruction::LookupSwitch { default, targets } => {
                let keys: Vec<i32> = targets.iter().map(|(key, _)| *key).collect();
                assert_eq!(keys, vec![0, 1_000_000]);
                assert!(targets.iter().all(|(_, target)| target != default));
            }
            other => panic!("expected a lookup switch, got {:?}", other),
        }
    }

    #[test]
    fn index_past_switch_keys() {
        let methods = [redefined("last", "()V", u32::MAX, vec![Instruction::Return])];
        let name = UnqualifiedName::from_string(String::from("static_uber")).unwrap();
        let err = build_dispatcher(name, true, &methods).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::ExceededLimit);
        assert_eq!(err.context, vec!["Dispatch index", "4294967295"]);
    }

    #[test]
    fn missing_code() {
        let method = Arc::new(RedefinedMethod {
            method: Method::new(
                MethodAccessFlags::ABSTRACT,
                UnqualifiedName::from_string(String::from("f")).unwrap(),
                MethodDescriptor::parse("()V").unwrap(),
                None,
            ),
            dispatch_index: 0,
            targets: vec![],
        });
        let name = UnqualifiedName::from_string(String::from("uber")).unwrap();
        let err = build_dispatcher(name, false, &[method]).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::MissingCode);
    }
}
