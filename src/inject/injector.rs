use super::flow::FlowHarness;
use super::{check_validity, find_target_method, InjectionRequest, LocalTracker};
use crate::analysis::Frame;
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::code::{Instruction, MethodBody};
use crate::jvm::model::{Class, Method};
use crate::jvm::BinaryName;
use crate::operation::{
    ClassTransformer, OperationOrder, OperationParent, OperationRegistry, StageId, Targeted,
    TargetedRegistry,
};
use crate::redefine::RedefinedMethod;
use crate::select::{constructor_initialization, Group, InjectionKind};
use crate::settings::Settings;
use crate::tag::Tag;
use std::sync::Arc;

impl Targeted for InjectionRequest {
    fn targets(&self) -> &[BinaryName] {
        &self.targets
    }
}

/// Requests sharing a group and kind, in declared order
struct Placement<'a> {
    group: Group,
    kind: InjectionKind,
    requests: Vec<&'a InjectionRequest>,
}

/// Synthesized block, ready to be spliced into the body
struct Block {
    group: Group,
    kind: InjectionKind,
    code: Vec<Instruction>,
}

impl Block {
    /// Index the code gets inserted at, in the unmodified body
    fn insert_at(&self) -> usize {
        match self.kind {
            InjectionKind::Before => self.group.start,
            InjectionKind::After | InjectionKind::Overwrite => self.group.end + 1,
        }
    }

    /// Order in which blocks inserted at the same index get applied
    ///
    /// Later insertions at an index end up before earlier ones, so `After` code for the previous
    /// instruction lands ahead of `Before` code for the next one. Overwrites go last since they
    /// remove instructions before the insertion index.
    fn rank(&self) -> u8 {
        match self.kind {
            InjectionKind::Before => 0,
            InjectionKind::After => 1,
            InjectionKind::Overwrite => 2,
        }
    }
}

/// Stage injecting code into the methods of target classes
pub struct InstructionInjector {
    registry: TargetedRegistry<InjectionRequest>,
}

impl InstructionInjector {
    /// Injector whose requests also register their injected method with the method registry
    pub fn new(methods: Arc<TargetedRegistry<RedefinedMethod>>) -> InstructionInjector {
        let methods: Arc<dyn OperationRegistry<RedefinedMethod>> = methods;
        let registry = TargetedRegistry::new().with_dependency(methods, |request: &InjectionRequest| {
            vec![RedefinedMethod {
                method: request.injected.method.clone(),
                dispatch_index: request.injected.dispatch_index,
                targets: request.targets.clone(),
            }]
        });
        InstructionInjector { registry }
    }

    pub fn registry(&self) -> &TargetedRegistry<InjectionRequest> {
        &self.registry
    }

    /// Build the new body of a method, with every request targeting it applied
    fn inject_into(
        class: &Class,
        method: &Method,
        requests: &[Arc<InjectionRequest>],
        settings: &Settings,
    ) -> Result<MethodBody, MixinError> {
        let signature = method.signature();
        let first_declaration = requests
            .first()
            .map(|request| request.declaration.clone())
            .unwrap_or(Tag::ENGINE);
        let body = method.body.as_ref().ok_or_else(|| {
            MixinError::new(
                first_declaration.clone(),
                MixinErrorCause::MissingCode,
                vec![signature.to_string()],
            )
        })?;

        let entry = Frame::method_entry(&class.name, method);
        let initialization = if method.is_constructor() && !method.is_static() {
            constructor_initialization(method, class)
                .map_err(|err| err.attributed_to(&first_declaration))?
        } else {
            None
        };

        let mut placements: Vec<Placement> = vec![];
        for request in requests {
            let request: &InjectionRequest = request;
            let groups = request
                .point
                .groups(method, class)
                .map_err(|err| err.attributed_to(&request.declaration))?;
            for group in groups {
                let existing = placements
                    .iter_mut()
                    .find(|placement| placement.group == group && placement.kind == request.kind);
                match existing {
                    Some(placement) => placement.requests.push(request),
                    None => placements.push(Placement {
                        group,
                        kind: request.kind,
                        requests: vec![request],
                    }),
                }
            }
        }

        let mut locals = LocalTracker::for_method(method);
        let mut labels = body.label_generator();
        let mut blocks = vec![];
        for placement in &placements {
            let declaration = &placement.requests[0].declaration;
            let anchor = placement.group.anchor(placement.kind);
            let frame = settings
                .simulation
                .simulate(body, anchor, &entry, &class.name)
                .map_err(|err| err.in_method(&signature).attributed_to(declaration))?;

            check_validity(&placement.requests, method, &frame, &settings.runtime)?;

            let allow_return = match initialization {
                None => true,
                Some(init) => match placement.kind {
                    InjectionKind::After => init <= placement.group.end,
                    InjectionKind::Before | InjectionKind::Overwrite => {
                        init < placement.group.start
                    }
                },
            };
            let harness = FlowHarness {
                runtime: &settings.runtime,
                class: &class.name,
                kind: placement.kind,
                frame: &frame,
                is_static: method.is_static(),
                return_type: method.descriptor.return_type.as_ref(),
                allow_return,
                requests: &placement.requests,
            };
            let code = harness.build(&mut locals, &mut labels)?;
            log::debug!(
                "Injecting {} calls {:?} {}..={} of {} in {} ({} instructions)",
                placement.requests.len(),
                placement.kind,
                placement.group.start,
                placement.group.end,
                signature,
                class.name,
                code.len()
            );
            blocks.push(Block {
                group: placement.group,
                kind: placement.kind,
                code,
            });
        }

        // Highest insertion index first, so pending indices stay valid
        blocks.sort_by(|a, b| {
            b.insert_at()
                .cmp(&a.insert_at())
                .then(a.rank().cmp(&b.rank()))
        });

        let mut body = body.clone();
        for block in blocks {
            let at = block.insert_at().min(body.instructions.len());
            body.instructions.splice(at..at, block.code);
            if block.kind == InjectionKind::Overwrite {
                body.instructions.drain(block.group.start..=block.group.end);
            }
        }
        body.ensure_max_locals(locals.max_locals())?;
        Ok(body)
    }
}

impl ClassTransformer for InstructionInjector {
    fn id(&self) -> StageId {
        StageId::INSTRUCTIONS
    }

    /// Calls to injected methods must exist before the method stage rewrites call sites
    fn parents(&self) -> Vec<OperationParent> {
        vec![OperationParent::new(StageId::METHODS, OperationOrder::After)]
    }

    fn transform(&self, class: &mut Class, settings: &Settings) -> Result<(), MixinError> {
        let requests = self.registry.applicable(&class.name);
        let first = match requests.first() {
            Some(first) => first,
            None => return Ok(()),
        };
        if class.is_interface() {
            return Err(MixinError::new(
                first.declaration.clone(),
                MixinErrorCause::CannotApplyToInterfaces,
                vec![class.name.to_string()],
            ));
        }

        let mut by_method: Vec<(usize, Vec<Arc<InjectionRequest>>)> = vec![];
        for request in &requests {
            let idx = find_target_method(&request.target, &class.methods, &class.name)
                .map_err(|err| err.attributed_to(&request.declaration))?;
            match by_method.iter_mut().find(|(method, _)| *method == idx) {
                Some((_, list)) => list.push(request.clone()),
                None => by_method.push((idx, vec![request.clone()])),
            }
        }

        for (idx, requests) in by_method {
            let body = InstructionInjector::inject_into(
                &*class,
                &class.methods[idx],
                &requests,
                settings,
            )?;
            class.methods[idx].body = Some(body);
        }
        Ok(())
    }
}
