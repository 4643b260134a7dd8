use crate::encoding::encode_script_number;
use crate::error::Error;
use crate::opcode::Opcode;

/// Maximum size of a single stack element, and therefore of a push.
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Maximum serialized script size accepted by the interpreter.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// A single script element: pushed data or an opcode.
///
/// `Push` records the push opcode byte actually used in the serialized
/// form (`0x01`-`0x4b` direct, or one of the PUSHDATA markers) so the
/// MINIMALDATA rule can be enforced during evaluation and serialization
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Push { opcode: u8, data: Vec<u8> },
    Op(Opcode),
}

impl Instruction {
    /// Wraps `data` in its minimal push form.
    ///
    /// The empty string and the single bytes `0x01`-`0x10` and `0x81`
    /// become constant opcodes; everything else picks the shortest
    /// length-prefix encoding. Fails for data above [`MAX_ELEMENT_SIZE`].
    pub fn minimal_push(data: Vec<u8>) -> Result<Instruction, Error> {
        if data.len() > MAX_ELEMENT_SIZE {
            return Err(Error::InvalidPush("data exceeds the 520-byte element limit"));
        }
        if data.is_empty() {
            return Ok(Instruction::Op(Opcode::Op0));
        }
        if data.len() == 1 {
            if (0x01..=0x10).contains(&data[0]) {
                let opcode = Opcode::from_byte(0x50 + data[0]).expect("OP_1..OP_16 exist");
                return Ok(Instruction::Op(opcode));
            }
            if data[0] == 0x81 {
                return Ok(Instruction::Op(Opcode::Op1Negate));
            }
        }
        let opcode = match data.len() {
            1..=75 => data.len() as u8,
            76..=255 => OP_PUSHDATA1,
            // Lengths above 65535 cannot occur behind the element limit.
            _ => OP_PUSHDATA2,
        };
        Ok(Instruction::Push { opcode, data })
    }

    /// Whether this instruction uses the canonical minimal encoding for
    /// the data it pushes. Non-push instructions are trivially minimal.
    pub fn is_minimal_push(&self) -> bool {
        let (opcode, data) = match self {
            Instruction::Push { opcode, data } => (*opcode, data.as_slice()),
            Instruction::Op(_) => return true,
        };
        if data.is_empty() {
            // Could have used OP_0.
            return false;
        }
        if data.len() == 1 && ((0x01..=0x10).contains(&data[0]) || data[0] == 0x81) {
            // Could have used OP_1..OP_16 or OP_1NEGATE.
            return false;
        }
        if data.len() <= 75 {
            opcode as usize == data.len()
        } else if data.len() <= 255 {
            opcode == OP_PUSHDATA1
        } else if data.len() <= 65535 {
            opcode == OP_PUSHDATA2
        } else {
            true
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Push { data, .. } => write!(f, "<{}>", hex::encode(data)),
            Instruction::Op(opcode) => write!(f, "{opcode}"),
        }
    }
}

/// Source element for [`Script::compile`]: an opcode by name, a byte
/// string, or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Op(Opcode),
    Data(Vec<u8>),
    Num(i64),
}

impl From<Opcode> for Element {
    fn from(opcode: Opcode) -> Self {
        Element::Op(opcode)
    }
}

/// The standard templates a script can match.
///
/// [`Script::kind`] checks these in order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PubkeyHashOut,
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    ScriptHashOut,
    /// `<m> <pubkey>... <n> OP_CHECKMULTISIG`
    MultisigRedeem,
    /// `OP_RETURN` with at most one trailing push
    OpReturnOut,
    /// `<signature> <pubkey>`
    PubkeyHashIn,
    /// `<signature>... <serialized redeem script>`
    ScriptHashIn,
    /// Anything else
    Generic,
}

/// An immutable, ordered sequence of instructions.
///
/// Scripts are plain values: compiling, parsing, and the template
/// constructors all produce an owned `Script`, and serializing then
/// re-parsing yields an equal sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    instructions: Vec<Instruction>,
}

impl Script {
    /// The empty script.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions (not bytes).
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Compiles a symbolic element list, choosing minimal push encodings.
    pub fn compile(elements: &[Element]) -> Result<Script, Error> {
        let mut instructions = Vec::with_capacity(elements.len());
        for element in elements {
            let instruction = match element {
                Element::Op(opcode) => Instruction::Op(*opcode),
                Element::Data(data) => Instruction::minimal_push(data.clone())?,
                Element::Num(n) => Instruction::minimal_push(encode_script_number(*n))?,
            };
            instructions.push(instruction);
        }
        Ok(Script { instructions })
    }

    /// Parses serialized script bytes.
    ///
    /// Walks the bytes left to right: `0x01`-`0x4b` directly push that
    /// many bytes, the PUSHDATA markers carry a 1/2/4-byte little-endian
    /// length, and every other byte must map to a defined opcode. A push
    /// running past the end of the slice is a hard failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Script, Error> {
        let mut instructions = Vec::new();
        let mut pos = 0;
        let len = bytes.len();

        while pos < len {
            let byte = bytes[pos];
            pos += 1;

            let data_len = match byte {
                0x01..=0x4b => byte as usize,
                OP_PUSHDATA1 => {
                    if pos >= len {
                        return Err(Error::InvalidPush("missing PUSHDATA1 length"));
                    }
                    let n = bytes[pos] as usize;
                    pos += 1;
                    n
                }
                OP_PUSHDATA2 => {
                    if pos + 2 > len {
                        return Err(Error::InvalidPush("missing PUSHDATA2 length"));
                    }
                    let n = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
                    pos += 2;
                    n
                }
                OP_PUSHDATA4 => {
                    if pos + 4 > len {
                        return Err(Error::InvalidPush("missing PUSHDATA4 length"));
                    }
                    let n = u32::from_le_bytes([
                        bytes[pos],
                        bytes[pos + 1],
                        bytes[pos + 2],
                        bytes[pos + 3],
                    ]) as usize;
                    pos += 4;
                    n
                }
                _ => {
                    match Opcode::from_byte(byte) {
                        Some(opcode) => instructions.push(Instruction::Op(opcode)),
                        None => return Err(Error::UndefinedOpcode(byte)),
                    }
                    continue;
                }
            };

            if pos + data_len > len {
                return Err(Error::InvalidPush("push data runs past end of script"));
            }
            instructions.push(Instruction::Push {
                opcode: byte,
                data: bytes[pos..pos + data_len].to_vec(),
            });
            pos += data_len;
        }

        Ok(Script { instructions })
    }

    /// Serializes to the flat byte encoding; the exact inverse of
    /// [`Script::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for instruction in &self.instructions {
            match instruction {
                Instruction::Op(opcode) => bytes.push(opcode.to_byte()),
                Instruction::Push { opcode, data } => {
                    bytes.push(*opcode);
                    match *opcode {
                        OP_PUSHDATA1 => bytes.push(data.len() as u8),
                        OP_PUSHDATA2 => {
                            bytes.extend_from_slice(&(data.len() as u16).to_le_bytes())
                        }
                        OP_PUSHDATA4 => {
                            bytes.extend_from_slice(&(data.len() as u32).to_le_bytes())
                        }
                        _ => {}
                    }
                    bytes.extend_from_slice(data);
                }
            }
        }
        bytes
    }

    pub fn from_hex(hex_str: &str) -> Result<Script, Error> {
        Script::from_bytes(&hex::decode(hex_str)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether every instruction only pushes data. Constant opcodes up to
    /// OP_16 (and OP_1NEGATE) count as pushes.
    pub fn is_push_only(&self) -> bool {
        self.instructions.iter().all(|instruction| match instruction {
            Instruction::Push { .. } => true,
            Instruction::Op(opcode) => opcode.small_int_value().is_some(),
        })
    }

    /// Classifies the script against the standard templates.
    pub fn kind(&self) -> ScriptKind {
        if self.is_pubkey_hash_out() {
            ScriptKind::PubkeyHashOut
        } else if self.is_script_hash_out() {
            ScriptKind::ScriptHashOut
        } else if self.multisig_threshold().is_some() {
            ScriptKind::MultisigRedeem
        } else if self.is_op_return_out() {
            ScriptKind::OpReturnOut
        } else if self.is_pubkey_hash_in() {
            ScriptKind::PubkeyHashIn
        } else if self.is_script_hash_in() {
            ScriptKind::ScriptHashIn
        } else {
            ScriptKind::Generic
        }
    }

    fn is_pubkey_hash_out(&self) -> bool {
        matches!(
            self.instructions.as_slice(),
            [
                Instruction::Op(Opcode::OpDup),
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { data, .. },
                Instruction::Op(Opcode::OpEqualVerify),
                Instruction::Op(Opcode::OpCheckSig),
            ] if data.len() == 20
        )
    }

    fn is_script_hash_out(&self) -> bool {
        matches!(
            self.instructions.as_slice(),
            [
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { data, .. },
                Instruction::Op(Opcode::OpEqual),
            ] if data.len() == 20
        )
    }

    fn is_op_return_out(&self) -> bool {
        match self.instructions.as_slice() {
            [Instruction::Op(Opcode::OpReturn)] => true,
            [Instruction::Op(Opcode::OpReturn), Instruction::Push { .. }] => true,
            _ => false,
        }
    }

    fn is_pubkey_hash_in(&self) -> bool {
        matches!(
            self.instructions.as_slice(),
            [Instruction::Push { .. }, Instruction::Push { .. }]
        )
    }

    fn is_script_hash_in(&self) -> bool {
        if self.instructions.is_empty() || !self.is_push_only() {
            return false;
        }
        match self.instructions.last() {
            Some(Instruction::Push { data, .. }) if !data.is_empty() => {
                Script::from_bytes(data).is_ok()
            }
            _ => false,
        }
    }

    /// The 20-byte hash committed to by a P2PKH or P2SH output script.
    pub fn address_hash(&self) -> Option<[u8; 20]> {
        let data = match self.instructions.as_slice() {
            [
                Instruction::Op(Opcode::OpDup),
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { data, .. },
                Instruction::Op(Opcode::OpEqualVerify),
                Instruction::Op(Opcode::OpCheckSig),
            ] => data,
            [
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { data, .. },
                Instruction::Op(Opcode::OpEqual),
            ] => data,
            _ => return None,
        };
        let mut hash = [0u8; 20];
        if data.len() != 20 {
            return None;
        }
        hash.copy_from_slice(data);
        Some(hash)
    }

    /// `(m, n)` of a multisig redeem script, if this is one.
    pub fn multisig_threshold(&self) -> Option<(usize, usize)> {
        let instructions = self.instructions.as_slice();
        if instructions.len() < 4 {
            return None;
        }
        let m = match instructions.first() {
            Some(Instruction::Op(opcode)) => match opcode.small_int_value() {
                Some(v) if v >= 1 => v as usize,
                _ => return None,
            },
            _ => return None,
        };
        let n = match &instructions[instructions.len() - 2] {
            Instruction::Op(opcode) => match opcode.small_int_value() {
                Some(v) if v >= 1 => v as usize,
                _ => return None,
            },
            _ => return None,
        };
        match instructions.last() {
            Some(Instruction::Op(Opcode::OpCheckMultisig)) => {}
            _ => return None,
        }
        let keys = &instructions[1..instructions.len() - 2];
        if keys.len() != n || m > n || n > 16 {
            return None;
        }
        if !keys.iter().all(|i| matches!(i, Instruction::Push { .. })) {
            return None;
        }
        Some((m, n))
    }

    /// The public keys of a multisig redeem script, in script order.
    pub fn multisig_pubkeys(&self) -> Option<Vec<Vec<u8>>> {
        self.multisig_threshold()?;
        let keys = &self.instructions[1..self.instructions.len() - 2];
        Some(
            keys.iter()
                .map(|instruction| match instruction {
                    Instruction::Push { data, .. } => data.clone(),
                    Instruction::Op(_) => unreachable!("threshold check admits pushes only"),
                })
                .collect(),
        )
    }

    // ── Standard templates ───────────────────────────────────────────

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn pay_to_pubkey_hash_out(pubkey_hash: &[u8; 20]) -> Script {
        Script {
            instructions: vec![
                Instruction::Op(Opcode::OpDup),
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { opcode: 20, data: pubkey_hash.to_vec() },
                Instruction::Op(Opcode::OpEqualVerify),
                Instruction::Op(Opcode::OpCheckSig),
            ],
        }
    }

    /// `<signature> <pubkey>`, spending a P2PKH output.
    pub fn pay_to_pubkey_hash_in(signature: &[u8], pubkey: &[u8]) -> Result<Script, Error> {
        Ok(Script {
            instructions: vec![
                Instruction::minimal_push(signature.to_vec())?,
                Instruction::minimal_push(pubkey.to_vec())?,
            ],
        })
    }

    /// `OP_HASH160 <hash> OP_EQUAL`
    pub fn pay_to_script_hash_out(script_hash: &[u8; 20]) -> Script {
        Script {
            instructions: vec![
                Instruction::Op(Opcode::OpHash160),
                Instruction::Push { opcode: 20, data: script_hash.to_vec() },
                Instruction::Op(Opcode::OpEqual),
            ],
        }
    }

    /// `<signature>... <serialized redeem script>`, spending a P2SH output.
    pub fn pay_to_script_in(signatures: &[Vec<u8>], redeem: &Script) -> Result<Script, Error> {
        let mut instructions = Vec::with_capacity(signatures.len() + 1);
        for signature in signatures {
            instructions.push(Instruction::minimal_push(signature.clone())?);
        }
        instructions.push(Instruction::minimal_push(redeem.to_bytes())?);
        Ok(Script { instructions })
    }

    /// `OP_0 <signature>... <serialized redeem script>`.
    ///
    /// The leading OP_0 feeds the extra element OP_CHECKMULTISIG pops.
    pub fn pay_to_multisig_in(signatures: &[Vec<u8>], redeem: &Script) -> Result<Script, Error> {
        let mut instructions = Vec::with_capacity(signatures.len() + 2);
        instructions.push(Instruction::Op(Opcode::Op0));
        for signature in signatures {
            instructions.push(Instruction::minimal_push(signature.clone())?);
        }
        instructions.push(Instruction::minimal_push(redeem.to_bytes())?);
        Ok(Script { instructions })
    }

    /// `<m> <pubkey>... <n> OP_CHECKMULTISIG`
    pub fn redeem_multisig(pubkeys: &[Vec<u8>], min_signatures: usize) -> Result<Script, Error> {
        let m = min_signatures;
        let n = pubkeys.len();
        if m < 1 || m > n || n > 16 {
            return Err(Error::InvalidThreshold { m, n });
        }
        let mut instructions = Vec::with_capacity(n + 3);
        let m_op = Opcode::from_byte(0x50 + m as u8).expect("OP_1..OP_16 exist");
        let n_op = Opcode::from_byte(0x50 + n as u8).expect("OP_1..OP_16 exist");
        instructions.push(Instruction::Op(m_op));
        for pubkey in pubkeys {
            instructions.push(Instruction::minimal_push(pubkey.clone())?);
        }
        instructions.push(Instruction::Op(n_op));
        instructions.push(Instruction::Op(Opcode::OpCheckMultisig));
        Ok(Script { instructions })
    }

    /// `OP_RETURN <data>`, a provably unspendable data carrier.
    pub fn op_return(data: &[u8]) -> Result<Script, Error> {
        let mut instructions = vec![Instruction::Op(Opcode::OpReturn)];
        if !data.is_empty() {
            instructions.push(Instruction::minimal_push(data.to_vec())?);
        }
        Ok(Script { instructions })
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}
