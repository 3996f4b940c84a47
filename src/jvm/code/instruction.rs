//! This module contains the AST of JVM bytecode as the mixin engine manipulates it. Unlike a
//! serialized code array, a method body is a flat list of instructions in which jump targets are
//! symbolic labels and a handful of pseudo-instructions carry positional metadata:
//!
//!   - `Label` marks a jump or exception-table target
//!
//!   - `Frame` carries a verified stack map frame, which the simulator uses as a starting point
//!
//!   - `LineNumber` is debug metadata, and has no effect on execution
//!
//! Like in the class-file model, the "wide" instruction doesn't show up at all and the short
//! forms (`iload_0`, `ldc_w`, ...) get merged into their general forms.

use super::{Constant, SynLabel};
use crate::analysis::Frame;
use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use std::ops::Not;

/// Reference to a field, as found in the operand of `getfield` and friends
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// Reference to a method, as found in the operand of the `invoke*` instructions
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Whether `owner` is an interface
    pub is_interface: bool,
}

impl MethodRef {
    pub fn new(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodRef {
        MethodRef {
            owner,
            name,
            descriptor,
            is_interface: false,
        }
    }

    pub fn interface(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodRef {
        MethodRef {
            owner,
            name,
            descriptor,
            is_interface: true,
        }
    }
}

/// Call site of an `invokedynamic`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct IndyRef {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

/// JVM bytecode instruction (or pseudo-instruction)
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),    // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, SynLabel), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, SynLabel), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, SynLabel), // covers `if_acmpeq`, `if_acmpne`
    Goto(SynLabel),                 // covers `goto` and `goto_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: SynLabel,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<SynLabel>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: SynLabel,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, SynLabel)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    InvokeDynamic(IndyRef),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    AThrow,
    CheckCast(RefType),
    InstanceOf(RefType),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(RefType, u8),
    IfNull(EqComparison, SynLabel), // covers `ifnull`, `ifnonnull`

    /// Marks the position a label refers to
    Label(SynLabel),

    /// Verified frame at this point in the code
    Frame(Box<Frame>),

    /// Source line number of the code that follows
    LineNumber(u16),
}

impl Instruction {
    /// Raw opcode of the instruction, or `None` for pseudo-instructions
    ///
    /// Instructions with several encodings report their general form (eg. `iload` and not
    /// `iload_1`, `ldc` and not `ldc_w`).
    pub fn opcode(&self) -> Option<u8> {
        use Instruction::*;
        let opcode = match self {
            Nop => 0x00,
            AConstNull => 0x01,
            IConstM1 => 0x02,
            IConst0 => 0x03,
            IConst1 => 0x04,
            IConst2 => 0x05,
            IConst3 => 0x06,
            IConst4 => 0x07,
            IConst5 => 0x08,
            LConst0 => 0x09,
            LConst1 => 0x0a,
            FConst0 => 0x0b,
            FConst1 => 0x0c,
            FConst2 => 0x0d,
            DConst0 => 0x0e,
            DConst1 => 0x0f,
            BiPush(_) => 0x10,
            SiPush(_) => 0x11,
            Ldc(_) => 0x12,
            ILoad(_) => 0x15,
            LLoad(_) => 0x16,
            FLoad(_) => 0x17,
            DLoad(_) => 0x18,
            ALoad(_) => 0x19,
            IALoad => 0x2e,
            LALoad => 0x2f,
            FALoad => 0x30,
            DALoad => 0x31,
            AALoad => 0x32,
            BALoad => 0x33,
            CALoad => 0x34,
            SALoad => 0x35,
            IStore(_) => 0x36,
            LStore(_) => 0x37,
            FStore(_) => 0x38,
            DStore(_) => 0x39,
            AStore(_) => 0x3a,
            IAStore => 0x4f,
            LAStore => 0x50,
            FAStore => 0x51,
            DAStore => 0x52,
            AAStore => 0x53,
            BAStore => 0x54,
            CAStore => 0x55,
            SAStore => 0x56,
            Pop => 0x57,
            Pop2 => 0x58,
            Dup => 0x59,
            DupX1 => 0x5a,
            DupX2 => 0x5b,
            Dup2 => 0x5c,
            Dup2X1 => 0x5d,
            Dup2X2 => 0x5e,
            Swap => 0x5f,
            IAdd => 0x60,
            LAdd => 0x61,
            FAdd => 0x62,
            DAdd => 0x63,
            ISub => 0x64,
            LSub => 0x65,
            FSub => 0x66,
            DSub => 0x67,
            IMul => 0x68,
            LMul => 0x69,
            FMul => 0x6a,
            DMul => 0x6b,
            IDiv => 0x6c,
            LDiv => 0x6d,
            FDiv => 0x6e,
            DDiv => 0x6f,
            IRem => 0x70,
            LRem => 0x71,
            FRem => 0x72,
            DRem => 0x73,
            INeg => 0x74,
            LNeg => 0x75,
            FNeg => 0x76,
            DNeg => 0x77,
            ISh(ShiftType::Left) => 0x78,
            LSh(ShiftType::Left) => 0x79,
            ISh(ShiftType::ArithmeticRight) => 0x7a,
            LSh(ShiftType::ArithmeticRight) => 0x7b,
            ISh(ShiftType::LogicalRight) => 0x7c,
            LSh(ShiftType::LogicalRight) => 0x7d,
            IAnd => 0x7e,
            LAnd => 0x7f,
            IOr => 0x80,
            LOr => 0x81,
            IXor => 0x82,
            LXor => 0x83,
            IInc(_, _) => 0x84,
            I2L => 0x85,
            I2F => 0x86,
            I2D => 0x87,
            L2I => 0x88,
            L2F => 0x89,
            L2D => 0x8a,
            F2I => 0x8b,
            F2L => 0x8c,
            F2D => 0x8d,
            D2I => 0x8e,
            D2L => 0x8f,
            D2F => 0x90,
            I2B => 0x91,
            I2C => 0x92,
            I2S => 0x93,
            LCmp => 0x94,
            FCmp(CompareMode::L) => 0x95,
            FCmp(CompareMode::G) => 0x96,
            DCmp(CompareMode::L) => 0x97,
            DCmp(CompareMode::G) => 0x98,
            If(comp, _) => match comp {
                OrdComparison::EQ => 0x99,
                OrdComparison::NE => 0x9a,
                OrdComparison::LT => 0x9b,
                OrdComparison::GE => 0x9c,
                OrdComparison::GT => 0x9d,
                OrdComparison::LE => 0x9e,
            },
            IfICmp(comp, _) => match comp {
                OrdComparison::EQ => 0x9f,
                OrdComparison::NE => 0xa0,
                OrdComparison::LT => 0xa1,
                OrdComparison::GE => 0xa2,
                OrdComparison::GT => 0xa3,
                OrdComparison::LE => 0xa4,
            },
            IfACmp(EqComparison::EQ, _) => 0xa5,
            IfACmp(EqComparison::NE, _) => 0xa6,
            Goto(_) => 0xa7,
            TableSwitch { .. } => 0xaa,
            LookupSwitch { .. } => 0xab,
            IReturn => 0xac,
            LReturn => 0xad,
            FReturn => 0xae,
            DReturn => 0xaf,
            AReturn => 0xb0,
            Return => 0xb1,
            GetStatic(_) => 0xb2,
            PutStatic(_) => 0xb3,
            GetField(_) => 0xb4,
            PutField(_) => 0xb5,
            Invoke(InvokeType::Virtual, _) => 0xb6,
            Invoke(InvokeType::Special, _) => 0xb7,
            Invoke(InvokeType::Static, _) => 0xb8,
            Invoke(InvokeType::Interface, _) => 0xb9,
            InvokeDynamic(_) => 0xba,
            New(_) => 0xbb,
            NewArray(_) => 0xbc,
            ANewArray(_) => 0xbd,
            ArrayLength => 0xbe,
            AThrow => 0xbf,
            CheckCast(_) => 0xc0,
            InstanceOf(_) => 0xc1,
            MonitorEnter => 0xc2,
            MonitorExit => 0xc3,
            MultiANewArray(_, _) => 0xc5,
            IfNull(EqComparison::EQ, _) => 0xc6,
            IfNull(EqComparison::NE, _) => 0xc7,
            Label(_) | Frame(_) | LineNumber(_) => return None,
        };
        Some(opcode)
    }

    /// Is this a label, frame, or line number marker?
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            Instruction::Label(_) | Instruction::Frame(_) | Instruction::LineNumber(_)
        )
    }

    /// Is this one of the `*return` instructions?
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
        )
    }

    /// Can execution continue onto the next instruction in the list?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }

    /// Labels the instruction may jump to (excluding fallthrough)
    pub fn jump_targets(&self) -> Vec<SynLabel> {
        match self {
            Instruction::If(_, lbl)
            | Instruction::IfICmp(_, lbl)
            | Instruction::IfACmp(_, lbl)
            | Instruction::IfNull(_, lbl)
            | Instruction::Goto(lbl) => vec![*lbl],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().copied());
                ts
            }
            Instruction::LookupSwitch { default, targets } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().map(|(_, target)| *target));
                ts
            }
            _ => vec![],
        }
    }

    /// Rewrite every label mentioned by the instruction (including the one declared by a
    /// `Label` pseudo-instruction)
    pub fn map_labels(&self, map_label: impl Fn(SynLabel) -> SynLabel) -> Instruction {
        use Instruction::*;

        match self {
            If(op, lbl) => If(*op, map_label(*lbl)),
            IfICmp(op, lbl) => IfICmp(*op, map_label(*lbl)),
            IfACmp(op, lbl) => IfACmp(*op, map_label(*lbl)),
            IfNull(op, lbl) => IfNull(*op, map_label(*lbl)),
            Goto(lbl) => Goto(map_label(*lbl)),
            TableSwitch {
                default,
                low,
                targets,
            } => TableSwitch {
                default: map_label(*default),
                low: *low,
                targets: targets.iter().map(|lbl| map_label(*lbl)).collect(),
            },
            LookupSwitch { default, targets } => LookupSwitch {
                default: map_label(*default),
                targets: targets
                    .iter()
                    .map(|(key, lbl)| (*key, map_label(*lbl)))
                    .collect(),
            },
            Label(lbl) => Label(map_label(*lbl)),
            other => other.clone(),
        }
    }

    /// Local variable slot accessed by the instruction, along with the width of the value
    pub fn local_access(&self) -> Option<(u16, usize)> {
        use Instruction::*;
        match self {
            ILoad(idx) | FLoad(idx) | ALoad(idx) | IStore(idx) | FStore(idx) | AStore(idx)
            | IInc(idx, _) => Some((*idx, 1)),
            LLoad(idx) | DLoad(idx) | LStore(idx) | DStore(idx) => Some((*idx, 2)),
            _ => None,
        }
    }

    /// Rewrite the local variable slot accessed by the instruction (if any)
    pub fn map_local(&mut self, map_slot: impl FnOnce(u16) -> u16) {
        use Instruction::*;
        match self {
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) | IStore(idx)
            | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) | IInc(idx, _) => {
                *idx = map_slot(*idx);
            }
            _ => (),
        }
    }

    /// Push an integer constant using the shortest form available
    pub fn iconst(value: i32) -> Instruction {
        match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => {
                if let Ok(b) = i8::try_from(value) {
                    Instruction::BiPush(b)
                } else if let Ok(s) = i16::try_from(value) {
                    Instruction::SiPush(s)
                } else {
                    Instruction::Ldc(Constant::Integer(value))
                }
            }
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because its operand is a call site and not a method
/// reference.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn general_opcodes() {
        assert_eq!(Instruction::ILoad(0).opcode(), Some(0x15));
        assert_eq!(Instruction::Ldc(Constant::Long(3)).opcode(), Some(0x12));
        assert_eq!(Instruction::If(OrdComparison::NE, SynLabel::START).opcode(), Some(0x9a));
        assert_eq!(Instruction::Label(SynLabel::START).opcode(), None);
        assert_eq!(Instruction::LineNumber(3).opcode(), None);
    }

    #[test]
    fn control_flow() {
        let l1 = SynLabel::START.next();
        let switch = Instruction::TableSwitch {
            default: SynLabel::START,
            low: 0,
            targets: vec![l1],
        };
        assert!(!switch.falls_through());
        assert_eq!(switch.jump_targets(), vec![SynLabel::START, l1]);
        assert!(Instruction::IfNull(EqComparison::EQ, l1).falls_through());
        assert!(Instruction::AReturn.is_return());
        assert!(!Instruction::AThrow.is_return());

        let shifted = Instruction::Goto(SynLabel::START).map_labels(|l| l.next());
        assert_eq!(shifted, Instruction::Goto(l1));
    }

    #[test]
    fn locals() {
        let mut load = Instruction::DLoad(3);
        assert_eq!(load.local_access(), Some((3, 2)));
        load.map_local(|slot| slot + 2);
        assert_eq!(load, Instruction::DLoad(5));

        let mut inc = Instruction::IInc(1, 4);
        inc.map_local(|slot| slot + 2);
        assert_eq!(inc, Instruction::IInc(3, 4));
        assert_eq!(Instruction::Pop.local_access(), None);
    }

    #[test]
    fn integer_constants() {
        assert_eq!(Instruction::iconst(3), Instruction::IConst3);
        assert_eq!(Instruction::iconst(100), Instruction::BiPush(100));
        assert_eq!(Instruction::iconst(1000), Instruction::SiPush(1000));
        assert_eq!(
            Instruction::iconst(100_000),
            Instruction::Ldc(Constant::Integer(100_000))
        );
    }
}
