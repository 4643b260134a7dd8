use crate::encoding::{cast_to_bool, decode_script_number, encode_script_number};
use crate::error::Error;
use crate::hash;
use crate::opcode::Opcode;
use crate::script::{Instruction, Script, ScriptKind, MAX_ELEMENT_SIZE, MAX_SCRIPT_SIZE};
use crate::sighash::{signature_hash, SigHashType};
use crate::stack::Stack;
use crate::transaction::Transaction;

/// Evaluate the redeem script committed to by P2SH outputs.
pub const VERIFY_P2SH: u32 = 1 << 0;
/// Require strictly encoded pubkeys and defined sighash types.
pub const VERIFY_STRICTENC: u32 = 1 << 1;
/// Require strict DER signatures.
pub const VERIFY_DERSIG: u32 = 1 << 2;
/// Reject signatures with a high S value.
pub const VERIFY_LOW_S: u32 = 1 << 3;
/// Require the CHECKMULTISIG dummy element to be empty.
pub const VERIFY_NULLDUMMY: u32 = 1 << 4;
/// Reject spending scripts containing non-push opcodes.
pub const VERIFY_SIGPUSHONLY: u32 = 1 << 5;
/// Require minimal push encodings and minimal script numbers.
pub const VERIFY_MINIMALDATA: u32 = 1 << 6;
/// Require exactly one stack element at the end of verification.
pub const VERIFY_CLEANSTACK: u32 = 1 << 8;
/// Require OP_IF/OP_NOTIF operands to be exactly empty or `0x01`.
pub const VERIFY_MINIMALIF: u32 = 1 << 13;

/// Combined main and alt stack depth limit.
pub const MAX_STACK_SIZE: usize = 1_000;
/// Executed non-push opcode limit per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Why evaluation failed.
///
/// Rendered through [`ExecError::token`] into the stable strings exposed
/// by [`Interpreter::errstr`]; callers pattern-match the tokens, so the
/// spellings are part of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    EvalFalse,
    ScriptSize,
    PushSize,
    OpCount,
    StackSize,
    Verify,
    EqualVerify,
    NumEqualVerify,
    CheckSigVerify,
    CheckMultisigVerify,
    OpReturn,
    BadOpcode,
    DisabledOpcode,
    UnbalancedConditional,
    InvalidStackOperation,
    InvalidAltstackOperation,
    ScriptNumOverflow,
    MinimalData,
    MinimalIf,
    SigDer,
    SigHighS,
    SigHashType,
    SigPushOnly,
    SigNullDummy,
    SigCount,
    PubkeyCount,
    PubkeyType,
    CleanStack,
}

impl ExecError {
    /// The stable reason token.
    pub fn token(self) -> &'static str {
        match self {
            ExecError::EvalFalse => "EVAL_FALSE",
            ExecError::ScriptSize => "SCRIPT_SIZE",
            ExecError::PushSize => "PUSH_SIZE",
            ExecError::OpCount => "OP_COUNT",
            ExecError::StackSize => "STACK_SIZE",
            ExecError::Verify => "VERIFY",
            ExecError::EqualVerify => "EQUALVERIFY",
            ExecError::NumEqualVerify => "NUMEQUALVERIFY",
            ExecError::CheckSigVerify => "CHECKSIGVERIFY",
            ExecError::CheckMultisigVerify => "CHECKMULTISIGVERIFY",
            ExecError::OpReturn => "OP_RETURN",
            ExecError::BadOpcode => "BAD_OPCODE",
            ExecError::DisabledOpcode => "DISABLED_OPCODE",
            ExecError::UnbalancedConditional => "UNBALANCED_CONDITIONAL",
            ExecError::InvalidStackOperation => "INVALID_STACK_OPERATION",
            ExecError::InvalidAltstackOperation => "INVALID_ALTSTACK_OPERATION",
            ExecError::ScriptNumOverflow => "SCRIPTNUM_OVERFLOW",
            ExecError::MinimalData => "MINIMALDATA",
            ExecError::MinimalIf => "MINIMALIF",
            ExecError::SigDer => "SIG_DER",
            ExecError::SigHighS => "SIG_HIGH_S",
            ExecError::SigHashType => "SIG_HASHTYPE",
            ExecError::SigPushOnly => "SIG_PUSHONLY",
            ExecError::SigNullDummy => "SIG_NULLDUMMY",
            ExecError::SigCount => "SIG_COUNT",
            ExecError::PubkeyCount => "PUBKEY_COUNT",
            ExecError::PubkeyType => "PUBKEY_TYPE",
            ExecError::CleanStack => "CLEANSTACK",
        }
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// The Script virtual machine.
///
/// Owns the two byte-string stacks, the conditional-execution stack, the
/// program counter, and the cursor OP_CODESEPARATOR moves. One
/// interpreter verifies one (spending, previous-output) pair at a time;
/// it holds no shared state and is cheap to construct.
///
/// Evaluation never panics and never returns a structured error: any
/// anomaly records a stable reason token readable via
/// [`Interpreter::errstr`] and makes [`Interpreter::verify`] answer
/// `false`.
#[derive(Debug, Default)]
pub struct Interpreter {
    stack: Stack,
    altstack: Stack,
    vf_exec: Vec<bool>,
    pc: usize,
    pbegincodehash: usize,
    op_count: usize,
    errstr: &'static str,
    flags: u32,
    script: Script,
    tx: Option<Transaction>,
    input_index: usize,
}

impl Interpreter {
    /// An interpreter with no flags and no transaction context.
    ///
    /// Without a transaction, signature checks evaluate to false rather
    /// than erroring, so script-shape tests run without building
    /// transactions.
    pub fn new() -> Interpreter {
        Interpreter::default()
    }

    pub fn with_flags(flags: u32) -> Interpreter {
        Interpreter { flags, ..Interpreter::default() }
    }

    /// An interpreter able to verify real signatures over `tx`'s input
    /// at `input_index`.
    pub fn for_transaction(tx: Transaction, input_index: usize, flags: u32) -> Interpreter {
        Interpreter {
            flags,
            tx: Some(tx),
            input_index,
            ..Interpreter::default()
        }
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The reason token of the last failure, or the empty string.
    pub fn errstr(&self) -> &'static str {
        self.errstr
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn altstack_size(&self) -> usize {
        self.altstack.len()
    }

    pub fn stack_top(&self) -> Option<&[u8]> {
        self.stack.peek()
    }

    pub fn conditional_depth(&self) -> usize {
        self.vf_exec.len()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn pbegincodehash(&self) -> usize {
        self.pbegincodehash
    }

    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Installs a script, rewinding the program counter, the separator
    /// cursor, the opcode budget, and the conditional stack. The data
    /// stacks deliberately survive so a spending script's pushes remain
    /// for the previous-output script.
    pub fn set_script(&mut self, script: Script) {
        self.script = script;
        self.pc = 0;
        self.pbegincodehash = 0;
        self.op_count = 0;
        self.vf_exec.clear();
        self.errstr = "";
    }

    /// Executes one instruction.
    ///
    /// Returns `true` while progress was made; `false` once the script
    /// is exhausted or a failure has been recorded in [`Self::errstr`].
    pub fn step(&mut self) -> bool {
        if !self.errstr.is_empty() || self.pc >= self.script.len() {
            return false;
        }
        let instruction = self.script.instructions()[self.pc].clone();
        match self.exec_instruction(instruction) {
            Ok(()) => {
                self.pc += 1;
                true
            }
            Err(err) => {
                self.errstr = err.token();
                false
            }
        }
    }

    /// Runs the installed script to completion.
    pub fn evaluate(&mut self) -> bool {
        if self.script.to_bytes().len() > MAX_SCRIPT_SIZE {
            self.errstr = ExecError::ScriptSize.token();
            return false;
        }
        while self.step() {}
        if !self.errstr.is_empty() {
            return false;
        }
        if !self.vf_exec.is_empty() {
            self.errstr = ExecError::UnbalancedConditional.token();
            return false;
        }
        true
    }

    /// Verifies a spending script against a previous-output script.
    ///
    /// Runs the spending script on a fresh state, carries the stack into
    /// the previous-output script, checks the final truth value, and if
    /// the previous script is a P2SH output (and the flag is on) pops
    /// the serialized redeem script from a snapshot of the spending
    /// stack and evaluates it as the final stage.
    pub fn verify(&mut self, script_sig: &Script, script_pubkey: &Script) -> bool {
        self.stack.clear();
        self.altstack.clear();
        self.set_script(Script::new());

        if self.flag(VERIFY_SIGPUSHONLY) && !script_sig.is_push_only() {
            self.errstr = ExecError::SigPushOnly.token();
            return false;
        }
        let evaluate_redeem =
            self.flag(VERIFY_P2SH) && script_pubkey.kind() == ScriptKind::ScriptHashOut;
        if evaluate_redeem && !script_sig.is_push_only() {
            self.errstr = ExecError::SigPushOnly.token();
            return false;
        }

        self.set_script(script_sig.clone());
        if !self.evaluate() {
            return false;
        }
        let snapshot = self.stack.clone();

        self.altstack.clear();
        self.set_script(script_pubkey.clone());
        if !self.evaluate() {
            return false;
        }

        if !self.top_is_true() {
            self.errstr = ExecError::EvalFalse.token();
            return false;
        }

        if evaluate_redeem {
            self.stack = snapshot;
            let serialized = match self.stack.pop() {
                Some(bytes) => bytes,
                None => {
                    self.errstr = ExecError::EvalFalse.token();
                    return false;
                }
            };
            let redeem = match Script::from_bytes(&serialized) {
                Ok(script) => script,
                Err(_) => {
                    self.errstr = ExecError::BadOpcode.token();
                    return false;
                }
            };
            self.altstack.clear();
            self.set_script(redeem);
            if !self.evaluate() {
                return false;
            }
            if !self.top_is_true() {
                self.errstr = ExecError::EvalFalse.token();
                return false;
            }
        }

        if self.flag(VERIFY_CLEANSTACK) && self.stack.len() != 1 {
            self.errstr = ExecError::CleanStack.token();
            return false;
        }

        true
    }

    fn top_is_true(&self) -> bool {
        match self.stack.peek() {
            Some(top) => cast_to_bool(top),
            None => false,
        }
    }

    fn flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    fn pop(&mut self) -> Result<Vec<u8>, ExecError> {
        self.stack.pop().ok_or(ExecError::InvalidStackOperation)
    }

    fn pop_num(&mut self) -> Result<i64, ExecError> {
        let bytes = self.pop()?;
        decode_script_number(&bytes, self.flag(VERIFY_MINIMALDATA), 4).map_err(|err| match err {
            Error::ScriptNumberOverflow { .. } => ExecError::ScriptNumOverflow,
            _ => ExecError::MinimalData,
        })
    }

    fn push_num(&mut self, n: i64) {
        self.stack.push(encode_script_number(n));
    }

    fn exec_instruction(&mut self, instruction: Instruction) -> Result<(), ExecError> {
        let executing = self.vf_exec.iter().all(|&v| v);

        match &instruction {
            Instruction::Push { data, .. } => {
                if data.len() > MAX_ELEMENT_SIZE {
                    return Err(ExecError::PushSize);
                }
                if executing {
                    if self.flag(VERIFY_MINIMALDATA) && !instruction.is_minimal_push() {
                        return Err(ExecError::MinimalData);
                    }
                    self.stack.push(data.clone());
                }
            }
            &Instruction::Op(opcode) => {
                if opcode.to_byte() > Opcode::Op16.to_byte() {
                    self.op_count += 1;
                    if self.op_count > MAX_OPS_PER_SCRIPT {
                        return Err(ExecError::OpCount);
                    }
                }
                if opcode.is_disabled() {
                    return Err(ExecError::DisabledOpcode);
                }
                if !executing && !opcode.is_conditional() {
                    // These two poison a script even inside a dead branch.
                    if matches!(opcode, Opcode::OpVerIf | Opcode::OpVerNotIf) {
                        return Err(ExecError::BadOpcode);
                    }
                    return Ok(());
                }
                self.exec_opcode(opcode, executing)?;
            }
        }

        if self.stack.len() + self.altstack.len() > MAX_STACK_SIZE {
            return Err(ExecError::StackSize);
        }
        Ok(())
    }

    fn exec_opcode(&mut self, opcode: Opcode, executing: bool) -> Result<(), ExecError> {
        use Opcode::*;

        if let Some(n) = opcode.small_int_value() {
            self.push_num(n);
            return Ok(());
        }

        match opcode {
            // ── Flow control ─────────────────────────────────────────
            OpNop | OpNop1 | OpNop2 | OpNop3 | OpNop4 | OpNop5 | OpNop6 | OpNop7 | OpNop8
            | OpNop9 | OpNop10 => {}

            OpVer | OpReserved | OpReserved1 | OpReserved2 => {
                return Err(ExecError::BadOpcode);
            }
            OpVerIf | OpVerNotIf => return Err(ExecError::BadOpcode),

            OpIf | OpNotIf => {
                let mut value = false;
                if executing {
                    let top = self
                        .stack
                        .pop()
                        .ok_or(ExecError::UnbalancedConditional)?;
                    if self.flag(VERIFY_MINIMALIF) && !(top.is_empty() || top == [0x01]) {
                        return Err(ExecError::MinimalIf);
                    }
                    value = cast_to_bool(&top);
                    if opcode == OpNotIf {
                        value = !value;
                    }
                }
                self.vf_exec.push(value);
            }
            OpElse => {
                let top = self
                    .vf_exec
                    .last_mut()
                    .ok_or(ExecError::UnbalancedConditional)?;
                *top = !*top;
            }
            OpEndIf => {
                if self.vf_exec.pop().is_none() {
                    return Err(ExecError::UnbalancedConditional);
                }
            }
            OpVerify => {
                let top = self.pop()?;
                if !cast_to_bool(&top) {
                    return Err(ExecError::Verify);
                }
            }
            OpReturn => return Err(ExecError::OpReturn),

            // ── Stack ────────────────────────────────────────────────
            OpToAltStack => {
                let top = self.pop()?;
                self.altstack.push(top);
            }
            OpFromAltStack => {
                let top = self
                    .altstack
                    .pop()
                    .ok_or(ExecError::InvalidAltstackOperation)?;
                self.stack.push(top);
            }
            Op2Drop => {
                self.pop()?;
                self.pop()?;
            }
            Op2Dup => {
                let a = self.peek_cloned(1)?;
                let b = self.peek_cloned(0)?;
                self.stack.push(a);
                self.stack.push(b);
            }
            Op3Dup => {
                let a = self.peek_cloned(2)?;
                let b = self.peek_cloned(1)?;
                let c = self.peek_cloned(0)?;
                self.stack.push(a);
                self.stack.push(b);
                self.stack.push(c);
            }
            Op2Over => {
                let a = self.peek_cloned(3)?;
                let b = self.peek_cloned(2)?;
                self.stack.push(a);
                self.stack.push(b);
            }
            Op2Rot => {
                let a = self.remove_at(5)?;
                let b = self.remove_at(4)?;
                self.stack.push(a);
                self.stack.push(b);
            }
            Op2Swap => {
                let a = self.remove_at(3)?;
                let b = self.remove_at(2)?;
                self.stack.push(a);
                self.stack.push(b);
            }
            OpIfDup => {
                let top = self.peek_cloned(0)?;
                if cast_to_bool(&top) {
                    self.stack.push(top);
                }
            }
            OpDepth => {
                let depth = self.stack.len();
                self.push_num(depth as i64);
            }
            OpDrop => {
                self.pop()?;
            }
            OpDup => {
                let top = self.peek_cloned(0)?;
                self.stack.push(top);
            }
            OpNip => {
                self.remove_at(1)?;
            }
            OpOver => {
                let second = self.peek_cloned(1)?;
                self.stack.push(second);
            }
            OpPick | OpRoll => {
                let n = self.pop_num()?;
                if n < 0 || n as usize >= self.stack.len() {
                    return Err(ExecError::InvalidStackOperation);
                }
                let item = if opcode == OpPick {
                    self.peek_cloned(n as usize)?
                } else {
                    self.remove_at(n as usize)?
                };
                self.stack.push(item);
            }
            OpRot => {
                let third = self.remove_at(2)?;
                self.stack.push(third);
            }
            OpSwap => {
                let second = self.remove_at(1)?;
                self.stack.push(second);
            }
            OpTuck => {
                if self.stack.len() < 2 {
                    return Err(ExecError::InvalidStackOperation);
                }
                let top = self.peek_cloned(0)?;
                self.stack.insert_at(2, top);
            }

            // ── Splice ───────────────────────────────────────────────
            OpSize => {
                let len = match self.stack.peek() {
                    Some(top) => top.len(),
                    None => return Err(ExecError::InvalidStackOperation),
                };
                self.push_num(len as i64);
            }

            // ── Bitwise ──────────────────────────────────────────────
            OpEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push_bool(a == b);
            }
            OpEqualVerify => {
                let b = self.pop()?;
                let a = self.pop()?;
                if a != b {
                    return Err(ExecError::EqualVerify);
                }
            }

            // ── Arithmetic ───────────────────────────────────────────
            Op1Add => {
                let n = self.pop_num()?;
                self.push_num(n + 1);
            }
            Op1Sub => {
                let n = self.pop_num()?;
                self.push_num(n - 1);
            }
            OpNegate => {
                let n = self.pop_num()?;
                self.push_num(-n);
            }
            OpAbs => {
                let n = self.pop_num()?;
                self.push_num(n.abs());
            }
            OpNot => {
                let n = self.pop_num()?;
                self.stack.push_bool(n == 0);
            }
            Op0NotEqual => {
                let n = self.pop_num()?;
                self.stack.push_bool(n != 0);
            }
            OpAdd => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a + b);
            }
            OpSub => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a - b);
            }
            OpBoolAnd => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a != 0 && b != 0);
            }
            OpBoolOr => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a != 0 || b != 0);
            }
            OpNumEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a == b);
            }
            OpNumEqualVerify => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                if a != b {
                    return Err(ExecError::NumEqualVerify);
                }
            }
            OpNumNotEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a != b);
            }
            OpLessThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a < b);
            }
            OpGreaterThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a > b);
            }
            OpLessThanOrEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a <= b);
            }
            OpGreaterThanOrEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.stack.push_bool(a >= b);
            }
            OpMin => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.min(b));
            }
            OpMax => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.max(b));
            }
            OpWithin => {
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let x = self.pop_num()?;
                self.stack.push_bool(min <= x && x < max);
            }

            // ── Crypto ───────────────────────────────────────────────
            OpRipemd160 => {
                let data = self.pop()?;
                self.stack.push(hash::ripemd160(&data).to_vec());
            }
            OpSha1 => {
                let data = self.pop()?;
                self.stack.push(hash::sha1(&data).to_vec());
            }
            OpSha256 => {
                let data = self.pop()?;
                self.stack.push(hash::sha256(&data).to_vec());
            }
            OpHash160 => {
                let data = self.pop()?;
                self.stack.push(hash::hash160(&data).to_vec());
            }
            OpHash256 => {
                let data = self.pop()?;
                self.stack.push(hash::hash256(&data).to_vec());
            }
            OpCodeSeparator => {
                self.pbegincodehash = self.pc + 1;
            }
            OpCheckSig | OpCheckSigVerify => {
                let pubkey = self.pop()?;
                let signature = self.pop()?;
                self.check_signature_encoding(&signature)?;
                self.check_pubkey_encoding(&pubkey)?;
                let subscript = self.subscript(&[signature.as_slice()]);
                let success = self.verify_signature(&signature, &pubkey, &subscript);
                self.stack.push_bool(success);
                if opcode == OpCheckSigVerify {
                    let _ = self.stack.pop();
                    if !success {
                        return Err(ExecError::CheckSigVerify);
                    }
                }
            }
            OpCheckMultisig | OpCheckMultisigVerify => {
                let success = self.exec_checkmultisig()?;
                self.stack.push_bool(success);
                if opcode == OpCheckMultisigVerify {
                    let _ = self.stack.pop();
                    if !success {
                        return Err(ExecError::CheckMultisigVerify);
                    }
                }
            }

            // Disabled opcodes are rejected before dispatch; the arms
            // exist to keep the match exhaustive.
            OpCat | OpSubstr | OpLeft | OpRight | OpInvert | OpAnd | OpOr | OpXor | Op2Mul
            | Op2Div | OpMul | OpDiv | OpMod | OpLShift | OpRShift => {
                return Err(ExecError::DisabledOpcode);
            }

            // Small-int constants were handled above.
            Op0 | Op1Negate | Op1 | Op2 | Op3 | Op4 | Op5 | Op6 | Op7 | Op8 | Op9 | Op10
            | Op11 | Op12 | Op13 | Op14 | Op15 | Op16 => {}
        }

        Ok(())
    }

    fn exec_checkmultisig(&mut self) -> Result<bool, ExecError> {
        let key_count = self.pop_num()?;
        if !(0..=20).contains(&key_count) {
            return Err(ExecError::PubkeyCount);
        }
        let key_count = key_count as usize;
        self.op_count += key_count;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(ExecError::OpCount);
        }

        // Popped top-first, so index 0 is the *last* key in script order;
        // the same holds for the signatures. The cursors therefore walk
        // both lists from the end, which is the order the protocol
        // matches them in.
        let mut pubkeys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            pubkeys.push(self.pop()?);
        }

        let sig_count = self.pop_num()?;
        if sig_count < 0 || sig_count as usize > key_count {
            return Err(ExecError::SigCount);
        }
        let sig_count = sig_count as usize;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            signatures.push(self.pop()?);
        }

        // The extra element CHECKMULTISIG pops by mistake, kept for
        // compatibility forever.
        let dummy = self.pop()?;
        if self.flag(VERIFY_NULLDUMMY) && !dummy.is_empty() {
            return Err(ExecError::SigNullDummy);
        }

        let sig_slices: Vec<&[u8]> = signatures.iter().map(|s| s.as_slice()).collect();
        let subscript = self.subscript(&sig_slices);

        let mut success = true;
        let mut isig = 0;
        let mut ikey = 0;
        while success && isig < signatures.len() {
            self.check_signature_encoding(&signatures[isig])?;
            self.check_pubkey_encoding(&pubkeys[ikey])?;
            if self.verify_signature(&signatures[isig], &pubkeys[ikey], &subscript) {
                isig += 1;
            }
            ikey += 1;
            // More signatures left than keys to try them against.
            if signatures.len() - isig > pubkeys.len() - ikey {
                success = false;
            }
        }

        Ok(success)
    }

    fn peek_cloned(&self, depth: usize) -> Result<Vec<u8>, ExecError> {
        self.stack
            .peek_at(depth)
            .map(|item| item.to_vec())
            .ok_or(ExecError::InvalidStackOperation)
    }

    fn remove_at(&mut self, depth: usize) -> Result<Vec<u8>, ExecError> {
        self.stack
            .remove_at(depth)
            .ok_or(ExecError::InvalidStackOperation)
    }

    /// The code the next signature commits to: the current script from
    /// the last OP_CODESEPARATOR onward, with every occurrence of the
    /// presented signatures and every separator removed.
    fn subscript(&self, signatures: &[&[u8]]) -> Script {
        let instructions = self.script.instructions()[self.pbegincodehash..]
            .iter()
            .filter(|instruction| match instruction {
                Instruction::Op(Opcode::OpCodeSeparator) => false,
                Instruction::Push { data, .. } => !signatures.contains(&data.as_slice()),
                Instruction::Op(_) => true,
            })
            .cloned()
            .collect();
        Script::from_instructions(instructions)
    }

    fn strict_der(&self) -> bool {
        self.flag(VERIFY_DERSIG) || self.flag(VERIFY_LOW_S) || self.flag(VERIFY_STRICTENC)
    }

    /// Hard encoding checks gated on the strictness flags. An empty
    /// signature is always acceptable here; it is the canonical way to
    /// make CHECK(MULTI)SIG push false.
    fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), ExecError> {
        if sig.is_empty() {
            return Ok(());
        }
        if self.strict_der() && !is_valid_signature_encoding(sig) {
            return Err(ExecError::SigDer);
        }
        if self.flag(VERIFY_LOW_S) {
            let der = &sig[..sig.len() - 1];
            let parsed = secp256k1::ecdsa::Signature::from_der(der)
                .map_err(|_| ExecError::SigDer)?;
            let mut normalized = parsed;
            normalized.normalize_s();
            if normalized.serialize_compact() != parsed.serialize_compact() {
                return Err(ExecError::SigHighS);
            }
        }
        if self.flag(VERIFY_STRICTENC) && !is_defined_hashtype_signature(sig) {
            return Err(ExecError::SigHashType);
        }
        Ok(())
    }

    fn check_pubkey_encoding(&self, pubkey: &[u8]) -> Result<(), ExecError> {
        if self.flag(VERIFY_STRICTENC) && !is_public_key(pubkey) {
            return Err(ExecError::PubkeyType);
        }
        Ok(())
    }

    /// Cryptographic signature check. False on any malformation or when
    /// no transaction context is attached.
    fn verify_signature(&self, sig_with_type: &[u8], pubkey: &[u8], subscript: &Script) -> bool {
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return false,
        };
        if sig_with_type.is_empty() {
            return false;
        }
        let (der, type_byte) = sig_with_type.split_at(sig_with_type.len() - 1);
        let sighash_type = SigHashType::from_byte_lenient(type_byte[0]);
        let digest = match signature_hash(tx, self.input_index, subscript, sighash_type) {
            Ok(digest) => digest,
            Err(_) => return false,
        };
        verify_ecdsa(der, pubkey, &digest, self.strict_der())
    }
}

/// ECDSA verification against a 32-byte digest.
///
/// High-S signatures are accepted here; LOW_S rejection happens in the
/// encoding checks so that the flag, not the backend, decides.
fn verify_ecdsa(der: &[u8], pubkey_bytes: &[u8], digest: &[u8; 32], strict_der: bool) -> bool {
    use secp256k1::ecdsa::Signature;
    use secp256k1::{Message, PublicKey, SECP256K1};

    let parsed = if strict_der {
        Signature::from_der(der)
    } else {
        Signature::from_der_lax(der)
    };
    let mut signature = match parsed {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    signature.normalize_s();

    let public_key = match PublicKey::from_slice(pubkey_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let message = Message::from_digest(*digest);
    SECP256K1.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

fn is_public_key(bytes: &[u8]) -> bool {
    match bytes.len() {
        33 => bytes[0] == 0x02 || bytes[0] == 0x03,
        65 => bytes[0] == 0x04,
        _ => false,
    }
}

/// Lax-DER shape check for `<30> <len> <02> <len R> <R> <02> <len S> <S>
/// <hashtype>`: correct framing, no negative or padded integers.
/// Consensus-critical since BIP66.
fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 {
        return false;
    }
    if sig[1] as usize != sig.len() - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if len_r + 5 >= sig.len() {
        return false;
    }
    let len_s = sig[len_r + 5] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 {
        return false;
    }
    if sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 {
        return false;
    }
    if sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }

    true
}

fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    if sig.is_empty() {
        return false;
    }
    let hashtype = sig[sig.len() - 1] & !0x80;
    (0x01..=0x03).contains(&hashtype)
}
