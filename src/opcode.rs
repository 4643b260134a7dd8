/// A Bitcoin Script opcode.
///
/// A fieldless enum mapping 1:1 to the protocol byte values of the full
/// pre-SegWit instruction set. Push-data bytes (`0x01`-`0x4e`) are not
/// opcodes; the script parser consumes them and produces
/// [`crate::script::Instruction::Push`] instead. It derives `Copy` because
/// it carries no heap data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    // Constants
    Op0 = 0x00,
    Op1Negate = 0x4f,
    OpReserved = 0x50,
    Op1 = 0x51,
    Op2 = 0x52,
    Op3 = 0x53,
    Op4 = 0x54,
    Op5 = 0x55,
    Op6 = 0x56,
    Op7 = 0x57,
    Op8 = 0x58,
    Op9 = 0x59,
    Op10 = 0x5a,
    Op11 = 0x5b,
    Op12 = 0x5c,
    Op13 = 0x5d,
    Op14 = 0x5e,
    Op15 = 0x5f,
    Op16 = 0x60,

    // Flow control
    OpNop = 0x61,
    OpVer = 0x62,
    OpIf = 0x63,
    OpNotIf = 0x64,
    OpVerIf = 0x65,
    OpVerNotIf = 0x66,
    OpElse = 0x67,
    OpEndIf = 0x68,
    OpVerify = 0x69,
    OpReturn = 0x6a,

    // Stack manipulation
    OpToAltStack = 0x6b,
    OpFromAltStack = 0x6c,
    Op2Drop = 0x6d,
    Op2Dup = 0x6e,
    Op3Dup = 0x6f,
    Op2Over = 0x70,
    Op2Rot = 0x71,
    Op2Swap = 0x72,
    OpIfDup = 0x73,
    OpDepth = 0x74,
    OpDrop = 0x75,
    OpDup = 0x76,
    OpNip = 0x77,
    OpOver = 0x78,
    OpPick = 0x79,
    OpRoll = 0x7a,
    OpRot = 0x7b,
    OpSwap = 0x7c,
    OpTuck = 0x7d,

    // Splice
    OpCat = 0x7e,
    OpSubstr = 0x7f,
    OpLeft = 0x80,
    OpRight = 0x81,
    OpSize = 0x82,

    // Bitwise logic
    OpInvert = 0x83,
    OpAnd = 0x84,
    OpOr = 0x85,
    OpXor = 0x86,
    OpEqual = 0x87,
    OpEqualVerify = 0x88,
    OpReserved1 = 0x89,
    OpReserved2 = 0x8a,

    // Arithmetic
    Op1Add = 0x8b,
    Op1Sub = 0x8c,
    Op2Mul = 0x8d,
    Op2Div = 0x8e,
    OpNegate = 0x8f,
    OpAbs = 0x90,
    OpNot = 0x91,
    Op0NotEqual = 0x92,
    OpAdd = 0x93,
    OpSub = 0x94,
    OpMul = 0x95,
    OpDiv = 0x96,
    OpMod = 0x97,
    OpLShift = 0x98,
    OpRShift = 0x99,
    OpBoolAnd = 0x9a,
    OpBoolOr = 0x9b,
    OpNumEqual = 0x9c,
    OpNumEqualVerify = 0x9d,
    OpNumNotEqual = 0x9e,
    OpLessThan = 0x9f,
    OpGreaterThan = 0xa0,
    OpLessThanOrEqual = 0xa1,
    OpGreaterThanOrEqual = 0xa2,
    OpMin = 0xa3,
    OpMax = 0xa4,
    OpWithin = 0xa5,

    // Crypto
    OpRipemd160 = 0xa6,
    OpSha1 = 0xa7,
    OpSha256 = 0xa8,
    OpHash160 = 0xa9,
    OpHash256 = 0xaa,
    OpCodeSeparator = 0xab,
    OpCheckSig = 0xac,
    OpCheckSigVerify = 0xad,
    OpCheckMultisig = 0xae,
    OpCheckMultisigVerify = 0xaf,

    // Upgradable no-ops
    OpNop1 = 0xb0,
    OpNop2 = 0xb1,
    OpNop3 = 0xb2,
    OpNop4 = 0xb3,
    OpNop5 = 0xb4,
    OpNop6 = 0xb5,
    OpNop7 = 0xb6,
    OpNop8 = 0xb7,
    OpNop9 = 0xb8,
    OpNop10 = 0xb9,
}

impl Opcode {
    /// Convert a byte to an `Opcode`, if it maps to one.
    ///
    /// Returns `None` for push-data bytes (`0x01`-`0x4e`) and for byte
    /// values above the defined instruction set. Push-data is handled by
    /// the script parser; undefined bytes are rejected by the interpreter.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        let opcode = match byte {
            0x00 => Op0,
            0x4f => Op1Negate,
            0x50 => OpReserved,
            0x51 => Op1,
            0x52 => Op2,
            0x53 => Op3,
            0x54 => Op4,
            0x55 => Op5,
            0x56 => Op6,
            0x57 => Op7,
            0x58 => Op8,
            0x59 => Op9,
            0x5a => Op10,
            0x5b => Op11,
            0x5c => Op12,
            0x5d => Op13,
            0x5e => Op14,
            0x5f => Op15,
            0x60 => Op16,
            0x61 => OpNop,
            0x62 => OpVer,
            0x63 => OpIf,
            0x64 => OpNotIf,
            0x65 => OpVerIf,
            0x66 => OpVerNotIf,
            0x67 => OpElse,
            0x68 => OpEndIf,
            0x69 => OpVerify,
            0x6a => OpReturn,
            0x6b => OpToAltStack,
            0x6c => OpFromAltStack,
            0x6d => Op2Drop,
            0x6e => Op2Dup,
            0x6f => Op3Dup,
            0x70 => Op2Over,
            0x71 => Op2Rot,
            0x72 => Op2Swap,
            0x73 => OpIfDup,
            0x74 => OpDepth,
            0x75 => OpDrop,
            0x76 => OpDup,
            0x77 => OpNip,
            0x78 => OpOver,
            0x79 => OpPick,
            0x7a => OpRoll,
            0x7b => OpRot,
            0x7c => OpSwap,
            0x7d => OpTuck,
            0x7e => OpCat,
            0x7f => OpSubstr,
            0x80 => OpLeft,
            0x81 => OpRight,
            0x82 => OpSize,
            0x83 => OpInvert,
            0x84 => OpAnd,
            0x85 => OpOr,
            0x86 => OpXor,
            0x87 => OpEqual,
            0x88 => OpEqualVerify,
            0x89 => OpReserved1,
            0x8a => OpReserved2,
            0x8b => Op1Add,
            0x8c => Op1Sub,
            0x8d => Op2Mul,
            0x8e => Op2Div,
            0x8f => OpNegate,
            0x90 => OpAbs,
            0x91 => OpNot,
            0x92 => Op0NotEqual,
            0x93 => OpAdd,
            0x94 => OpSub,
            0x95 => OpMul,
            0x96 => OpDiv,
            0x97 => OpMod,
            0x98 => OpLShift,
            0x99 => OpRShift,
            0x9a => OpBoolAnd,
            0x9b => OpBoolOr,
            0x9c => OpNumEqual,
            0x9d => OpNumEqualVerify,
            0x9e => OpNumNotEqual,
            0x9f => OpLessThan,
            0xa0 => OpGreaterThan,
            0xa1 => OpLessThanOrEqual,
            0xa2 => OpGreaterThanOrEqual,
            0xa3 => OpMin,
            0xa4 => OpMax,
            0xa5 => OpWithin,
            0xa6 => OpRipemd160,
            0xa7 => OpSha1,
            0xa8 => OpSha256,
            0xa9 => OpHash160,
            0xaa => OpHash256,
            0xab => OpCodeSeparator,
            0xac => OpCheckSig,
            0xad => OpCheckSigVerify,
            0xae => OpCheckMultisig,
            0xaf => OpCheckMultisigVerify,
            0xb0 => OpNop1,
            0xb1 => OpNop2,
            0xb2 => OpNop3,
            0xb3 => OpNop4,
            0xb4 => OpNop5,
            0xb5 => OpNop6,
            0xb6 => OpNop7,
            0xb7 => OpNop8,
            0xb8 => OpNop9,
            0xb9 => OpNop10,
            _ => return None,
        };
        Some(opcode)
    }

    /// Convert an `Opcode` back to its canonical byte value.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Opcodes disabled by the protocol.
    ///
    /// These fail evaluation unconditionally, even inside a dead
    /// conditional branch.
    pub fn is_disabled(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            OpCat | OpSubstr | OpLeft | OpRight | OpInvert | OpAnd | OpOr | OpXor | Op2Mul
                | Op2Div | OpMul | OpDiv | OpMod | OpLShift | OpRShift
        )
    }

    /// The four conditional-flow opcodes, which are processed even while
    /// execution is suspended inside a false branch.
    pub fn is_conditional(self) -> bool {
        use Opcode::*;
        matches!(self, OpIf | OpNotIf | OpElse | OpEndIf)
    }

    /// Reserved opcodes. OP_VERIF and OP_VERNOTIF fail a script wherever
    /// they appear; the rest fail only when actually executed.
    pub fn is_reserved(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            OpReserved | OpVer | OpVerIf | OpVerNotIf | OpReserved1 | OpReserved2
        )
    }

    /// The number pushed by a small-integer constant opcode.
    ///
    /// `Some(-1)` for OP_1NEGATE, `Some(0)` for OP_0, `Some(1..=16)` for
    /// OP_1 through OP_16, `None` for everything else.
    pub fn small_int_value(self) -> Option<i64> {
        let byte = self.to_byte();
        match self {
            Opcode::Op0 => Some(0),
            Opcode::Op1Negate => Some(-1),
            _ if (0x51..=0x60).contains(&byte) => Some((byte - 0x50) as i64),
            _ => None,
        }
    }

    /// Canonical `OP_*` name.
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Op0 => "OP_0",
            Op1Negate => "OP_1NEGATE",
            OpReserved => "OP_RESERVED",
            Op1 => "OP_1",
            Op2 => "OP_2",
            Op3 => "OP_3",
            Op4 => "OP_4",
            Op5 => "OP_5",
            Op6 => "OP_6",
            Op7 => "OP_7",
            Op8 => "OP_8",
            Op9 => "OP_9",
            Op10 => "OP_10",
            Op11 => "OP_11",
            Op12 => "OP_12",
            Op13 => "OP_13",
            Op14 => "OP_14",
            Op15 => "OP_15",
            Op16 => "OP_16",
            OpNop => "OP_NOP",
            OpVer => "OP_VER",
            OpIf => "OP_IF",
            OpNotIf => "OP_NOTIF",
            OpVerIf => "OP_VERIF",
            OpVerNotIf => "OP_VERNOTIF",
            OpElse => "OP_ELSE",
            OpEndIf => "OP_ENDIF",
            OpVerify => "OP_VERIFY",
            OpReturn => "OP_RETURN",
            OpToAltStack => "OP_TOALTSTACK",
            OpFromAltStack => "OP_FROMALTSTACK",
            Op2Drop => "OP_2DROP",
            Op2Dup => "OP_2DUP",
            Op3Dup => "OP_3DUP",
            Op2Over => "OP_2OVER",
            Op2Rot => "OP_2ROT",
            Op2Swap => "OP_2SWAP",
            OpIfDup => "OP_IFDUP",
            OpDepth => "OP_DEPTH",
            OpDrop => "OP_DROP",
            OpDup => "OP_DUP",
            OpNip => "OP_NIP",
            OpOver => "OP_OVER",
            OpPick => "OP_PICK",
            OpRoll => "OP_ROLL",
            OpRot => "OP_ROT",
            OpSwap => "OP_SWAP",
            OpTuck => "OP_TUCK",
            OpCat => "OP_CAT",
            OpSubstr => "OP_SUBSTR",
            OpLeft => "OP_LEFT",
            OpRight => "OP_RIGHT",
            OpSize => "OP_SIZE",
            OpInvert => "OP_INVERT",
            OpAnd => "OP_AND",
            OpOr => "OP_OR",
            OpXor => "OP_XOR",
            OpEqual => "OP_EQUAL",
            OpEqualVerify => "OP_EQUALVERIFY",
            OpReserved1 => "OP_RESERVED1",
            OpReserved2 => "OP_RESERVED2",
            Op1Add => "OP_1ADD",
            Op1Sub => "OP_1SUB",
            Op2Mul => "OP_2MUL",
            Op2Div => "OP_2DIV",
            OpNegate => "OP_NEGATE",
            OpAbs => "OP_ABS",
            OpNot => "OP_NOT",
            Op0NotEqual => "OP_0NOTEQUAL",
            OpAdd => "OP_ADD",
            OpSub => "OP_SUB",
            OpMul => "OP_MUL",
            OpDiv => "OP_DIV",
            OpMod => "OP_MOD",
            OpLShift => "OP_LSHIFT",
            OpRShift => "OP_RSHIFT",
            OpBoolAnd => "OP_BOOLAND",
            OpBoolOr => "OP_BOOLOR",
            OpNumEqual => "OP_NUMEQUAL",
            OpNumEqualVerify => "OP_NUMEQUALVERIFY",
            OpNumNotEqual => "OP_NUMNOTEQUAL",
            OpLessThan => "OP_LESSTHAN",
            OpGreaterThan => "OP_GREATERTHAN",
            OpLessThanOrEqual => "OP_LESSTHANOREQUAL",
            OpGreaterThanOrEqual => "OP_GREATERTHANOREQUAL",
            OpMin => "OP_MIN",
            OpMax => "OP_MAX",
            OpWithin => "OP_WITHIN",
            OpRipemd160 => "OP_RIPEMD160",
            OpSha1 => "OP_SHA1",
            OpSha256 => "OP_SHA256",
            OpHash160 => "OP_HASH160",
            OpHash256 => "OP_HASH256",
            OpCodeSeparator => "OP_CODESEPARATOR",
            OpCheckSig => "OP_CHECKSIG",
            OpCheckSigVerify => "OP_CHECKSIGVERIFY",
            OpCheckMultisig => "OP_CHECKMULTISIG",
            OpCheckMultisigVerify => "OP_CHECKMULTISIGVERIFY",
            OpNop1 => "OP_NOP1",
            OpNop2 => "OP_NOP2",
            OpNop3 => "OP_NOP3",
            OpNop4 => "OP_NOP4",
            OpNop5 => "OP_NOP5",
            OpNop6 => "OP_NOP6",
            OpNop7 => "OP_NOP7",
            OpNop8 => "OP_NOP8",
            OpNop9 => "OP_NOP9",
            OpNop10 => "OP_NOP10",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_defined_bytes() {
        let mut defined = 0;
        for byte in 0x00..=0xff_u8 {
            if let Some(opcode) = Opcode::from_byte(byte) {
                assert_eq!(opcode.to_byte(), byte, "roundtrip failed for {opcode}");
                defined += 1;
            }
        }
        // OP_0 plus 0x4f..=0xb9 inclusive.
        assert_eq!(defined, 1 + (0xb9 - 0x4f + 1));
    }

    #[test]
    fn push_data_bytes_are_not_opcodes() {
        for byte in 0x01..=0x4e_u8 {
            assert_eq!(Opcode::from_byte(byte), None, "byte 0x{byte:02x}");
        }
    }

    #[test]
    fn undefined_high_bytes() {
        assert_eq!(Opcode::from_byte(0xba), None);
        assert_eq!(Opcode::from_byte(0xff), None);
    }

    #[test]
    fn disabled_set() {
        assert!(Opcode::OpCat.is_disabled());
        assert!(Opcode::OpMul.is_disabled());
        assert!(Opcode::OpLShift.is_disabled());
        assert!(!Opcode::OpSize.is_disabled());
        assert!(!Opcode::OpAdd.is_disabled());
    }

    #[test]
    fn conditional_set() {
        assert!(Opcode::OpIf.is_conditional());
        assert!(Opcode::OpNotIf.is_conditional());
        assert!(Opcode::OpElse.is_conditional());
        assert!(Opcode::OpEndIf.is_conditional());
        assert!(!Opcode::OpVerify.is_conditional());
        assert!(!Opcode::OpVerIf.is_conditional());
    }

    #[test]
    fn reserved_set() {
        for opcode in [
            Opcode::OpReserved,
            Opcode::OpVer,
            Opcode::OpVerIf,
            Opcode::OpVerNotIf,
            Opcode::OpReserved1,
            Opcode::OpReserved2,
        ] {
            assert!(opcode.is_reserved(), "{opcode} should be reserved");
        }
        assert!(!Opcode::OpNop1.is_reserved());
    }

    #[test]
    fn small_int_values() {
        assert_eq!(Opcode::Op0.small_int_value(), Some(0));
        assert_eq!(Opcode::Op1Negate.small_int_value(), Some(-1));
        assert_eq!(Opcode::Op1.small_int_value(), Some(1));
        assert_eq!(Opcode::Op16.small_int_value(), Some(16));
        assert_eq!(Opcode::OpDup.small_int_value(), None);
        assert_eq!(Opcode::OpReserved.small_int_value(), None);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(format!("{}", Opcode::OpDup), "OP_DUP");
        assert_eq!(format!("{}", Opcode::OpCheckMultisig), "OP_CHECKMULTISIG");
        assert_eq!(format!("{}", Opcode::Op1Negate), "OP_1NEGATE");
        assert_eq!(format!("{}", Opcode::Op0NotEqual), "OP_0NOTEQUAL");
    }
}
