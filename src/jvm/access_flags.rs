use bitflags::bitflags;

bitflags! {
    /// Modifiers of a class (JVMS 4.1)
    ///
    /// Only `INTERFACE` changes what the engine does: injections into interfaces are rejected.
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Modifiers of a method (JVMS 4.6)
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccessFlags {
    /// Flags of a method the engine generates itself
    pub fn generated(is_static: bool) -> MethodAccessFlags {
        let flags = MethodAccessFlags::PRIVATE | MethodAccessFlags::SYNTHETIC;
        if is_static {
            flags | MethodAccessFlags::STATIC
        } else {
            flags
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_flags() {
        assert_eq!(MethodAccessFlags::generated(false).bits(), 0x1002);
        assert_eq!(MethodAccessFlags::generated(true).bits(), 0x100a);
    }
}
