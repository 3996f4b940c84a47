use crate::analysis::TypeSort;
use crate::errors::{fit, MixinError};
use crate::jvm::model::Method;

/// Hands out fresh local variable slots past every slot a method already uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTracker {
    next: usize,
}

impl LocalTracker {
    pub fn starting_at(next: usize) -> LocalTracker {
        LocalTracker { next }
    }

    /// Tracker for a method: past the receiver and parameters, and past any local accessed
    pub fn for_method(method: &Method) -> LocalTracker {
        let parameters = method.descriptor.parameter_length(!method.is_static());
        let accessed = method
            .body
            .iter()
            .flat_map(|body| body.instructions.iter())
            .filter_map(|insn| insn.local_access())
            .map(|(slot, width)| slot as usize + width)
            .max()
            .unwrap_or(0);
        LocalTracker::starting_at(parameters.max(accessed))
    }

    /// Reserve a slot for a value of the given sort
    ///
    /// Fails once the method would need more locals than `max_locals` can declare.
    pub fn allocate(&mut self, sort: TypeSort) -> Result<u16, MixinError> {
        fit::<_, u16>(self.next + sort.size(), "Local variable count")?;
        let slot = fit(self.next, "Local slot")?;
        self.next += sort.size();
        Ok(slot)
    }

    /// Number of local slots needed to hold everything allocated so far
    pub fn max_locals(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::MixinErrorCause;
    use crate::jvm::code::{Instruction, MethodBody};
    use crate::jvm::{MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

    fn method(flags: MethodAccessFlags, desc: &str, code: Vec<Instruction>) -> Method {
        Method::new(
            flags,
            UnqualifiedName::from_string(String::from("f")).unwrap(),
            MethodDescriptor::parse(desc).unwrap(),
            Some(MethodBody::new(code, 10, 10)),
        )
    }

    #[test]
    fn starts_after_parameters() {
        let instance = method(MethodAccessFlags::PUBLIC, "(IJ)V", vec![Instruction::Return]);
        assert_eq!(LocalTracker::for_method(&instance).max_locals(), 4);

        let stat = method(MethodAccessFlags::STATIC, "(IJ)V", vec![Instruction::Return]);
        assert_eq!(LocalTracker::for_method(&stat).max_locals(), 3);
    }

    #[test]
    fn starts_after_accessed_locals() {
        let code = vec![
            Instruction::DConst0,
            Instruction::DStore(5),
            Instruction::IInc(2, 1),
            Instruction::Return,
        ];
        let mut tracker = LocalTracker::for_method(&method(MethodAccessFlags::STATIC, "()V", code));
        assert_eq!(tracker.allocate(TypeSort::Long), Ok(7));
        assert_eq!(tracker.allocate(TypeSort::Object), Ok(9));
        assert_eq!(tracker.allocate(TypeSort::Int), Ok(10));
        assert_eq!(tracker.max_locals(), 11);
    }

    #[test]
    fn running_out_of_slots() {
        let mut tracker = LocalTracker::starting_at(65532);
        assert_eq!(tracker.allocate(TypeSort::Long), Ok(65532));
        let err = tracker.allocate(TypeSort::Long).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::ExceededLimit);
        assert_eq!(err.context, vec!["Local variable count", "65536"]);

        // A failed allocation reserves nothing
        assert_eq!(tracker.allocate(TypeSort::Int), Ok(65534));
        assert!(tracker.allocate(TypeSort::Int).is_err());
        assert_eq!(tracker.max_locals(), 65535);
    }
}
