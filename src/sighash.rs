use crate::error::Error;
use crate::hash;
use crate::input::Input;
use crate::opcode::Opcode;
use crate::script::{Instruction, Script};
use crate::transaction::{Output, Transaction};

/// The sighash flag appended to every signature.
///
/// The base mode picks which outputs a signature commits to; the
/// ANYONECANPAY bit restricts the committed inputs to the one being
/// signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigHashType {
    /// Commit to all inputs and all outputs. The default everywhere.
    All,
    /// Commit to no outputs.
    None,
    /// Commit only to the output paired with the signed input.
    Single,
    AllAnyoneCanPay,
    NoneAnyoneCanPay,
    SingleAnyoneCanPay,
}

const ANYONE_CAN_PAY: u8 = 0x80;

impl SigHashType {
    pub fn to_byte(self) -> u8 {
        match self {
            SigHashType::All => 0x01,
            SigHashType::None => 0x02,
            SigHashType::Single => 0x03,
            SigHashType::AllAnyoneCanPay => 0x81,
            SigHashType::NoneAnyoneCanPay => 0x82,
            SigHashType::SingleAnyoneCanPay => 0x83,
        }
    }

    /// Strict parse; returns `None` for undefined flag bytes.
    pub fn from_byte(byte: u8) -> Option<SigHashType> {
        match byte {
            0x01 => Some(SigHashType::All),
            0x02 => Some(SigHashType::None),
            0x03 => Some(SigHashType::Single),
            0x81 => Some(SigHashType::AllAnyoneCanPay),
            0x82 => Some(SigHashType::NoneAnyoneCanPay),
            0x83 => Some(SigHashType::SingleAnyoneCanPay),
            _ => None,
        }
    }

    /// Lenient parse matching the legacy hashing code, where any
    /// unrecognized base mode behaves like ALL.
    pub fn from_byte_lenient(byte: u8) -> SigHashType {
        let anyone = byte & ANYONE_CAN_PAY != 0;
        match (byte & 0x1f, anyone) {
            (0x02, false) => SigHashType::None,
            (0x02, true) => SigHashType::NoneAnyoneCanPay,
            (0x03, false) => SigHashType::Single,
            (0x03, true) => SigHashType::SingleAnyoneCanPay,
            (_, false) => SigHashType::All,
            (_, true) => SigHashType::AllAnyoneCanPay,
        }
    }

    /// The base mode with the ANYONECANPAY bit cleared.
    pub fn base(self) -> SigHashType {
        match self {
            SigHashType::AllAnyoneCanPay => SigHashType::All,
            SigHashType::NoneAnyoneCanPay => SigHashType::None,
            SigHashType::SingleAnyoneCanPay => SigHashType::Single,
            base => base,
        }
    }

    pub fn anyone_can_pay(self) -> bool {
        self.to_byte() & ANYONE_CAN_PAY != 0
    }
}

impl Default for SigHashType {
    fn default() -> Self {
        SigHashType::All
    }
}

/// The digest returned for SIGHASH_SINGLE with no matching output, a
/// quirk the legacy algorithm preserves instead of failing.
fn one_digest() -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest[0] = 0x01;
    digest
}

/// Computes the 32-byte digest a signature over `tx`'s input at
/// `input_index` must commit to.
///
/// Builds a modified transaction in which every input script is blanked
/// except the subject input's, which carries `subject_script` with any
/// OP_CODESEPARATOR stripped; serializes it per consensus rules,
/// appends the sighash type as a little-endian u32, and double-SHA256s
/// the whole thing.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    subject_script: &Script,
    sighash_type: SigHashType,
) -> Result<[u8; 32], Error> {
    if input_index >= tx.inputs.len() {
        return Err(Error::InputIndexOutOfRange(input_index));
    }

    let base = sighash_type.base();
    if base == SigHashType::Single && input_index >= tx.outputs.len() {
        return Ok(one_digest());
    }

    let subject = strip_code_separators(subject_script);

    let inputs: Vec<Input> = if sighash_type.anyone_can_pay() {
        vec![tx.inputs[input_index].replace_script(subject)]
    } else {
        tx.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                if i == input_index {
                    input.replace_script(subject.clone())
                } else {
                    let blanked = input.remove_script();
                    // NONE and SINGLE free the other inputs' sequences.
                    if base == SigHashType::All {
                        blanked
                    } else {
                        blanked.with_seq_number(0)
                    }
                }
            })
            .collect()
    };

    let outputs: Vec<Output> = match base {
        SigHashType::All => tx.outputs.clone(),
        SigHashType::None => Vec::new(),
        _ => tx.outputs[..=input_index]
            .iter()
            .enumerate()
            .map(|(i, output)| {
                if i == input_index {
                    output.clone()
                } else {
                    // Blanked outputs keep their slot with a -1 amount.
                    Output::new(u64::MAX, Script::new())
                }
            })
            .collect(),
    };

    let modified = Transaction {
        version: tx.version,
        inputs,
        outputs,
        locktime: tx.locktime,
    };

    let mut preimage = modified.to_bytes();
    preimage.extend_from_slice(&(sighash_type.to_byte() as u32).to_le_bytes());
    Ok(hash::hash256(&preimage))
}

/// Drops every OP_CODESEPARATOR; they never appear in preimages.
fn strip_code_separators(script: &Script) -> Script {
    Script::from_instructions(
        script
            .instructions()
            .iter()
            .filter(|instruction| {
                !matches!(instruction, Instruction::Op(Opcode::OpCodeSeparator))
            })
            .cloned()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Element;
    use crate::transaction::TxId;

    fn sample_tx() -> Transaction {
        let inputs = vec![
            Input::address(TxId::from_bytes([0x01; 32]), 0, &[0x11; 20]),
            Input::address(TxId::from_bytes([0x02; 32]), 1, &[0x22; 20]),
        ];
        let outputs = vec![
            Output::to_pubkey_hash(1_000, &[0x33; 20]),
            Output::to_pubkey_hash(2_000, &[0x44; 20]),
        ];
        Transaction::new(inputs, outputs)
    }

    #[test]
    fn sighash_type_bytes() {
        assert_eq!(SigHashType::All.to_byte(), 0x01);
        assert_eq!(SigHashType::SingleAnyoneCanPay.to_byte(), 0x83);
        assert_eq!(SigHashType::from_byte(0x02), Some(SigHashType::None));
        assert_eq!(SigHashType::from_byte(0x04), None);
        assert_eq!(SigHashType::default(), SigHashType::All);
    }

    #[test]
    fn lenient_parse_defaults_to_all() {
        assert_eq!(SigHashType::from_byte_lenient(0x00), SigHashType::All);
        assert_eq!(SigHashType::from_byte_lenient(0x05), SigHashType::All);
        assert_eq!(
            SigHashType::from_byte_lenient(0x82),
            SigHashType::NoneAnyoneCanPay
        );
    }

    #[test]
    fn base_and_anyone_can_pay() {
        assert_eq!(SigHashType::SingleAnyoneCanPay.base(), SigHashType::Single);
        assert!(SigHashType::AllAnyoneCanPay.anyone_can_pay());
        assert!(!SigHashType::All.anyone_can_pay());
    }

    #[test]
    fn index_out_of_range() {
        let tx = sample_tx();
        let err = signature_hash(&tx, 5, &Script::new(), SigHashType::All).unwrap_err();
        assert_eq!(err, Error::InputIndexOutOfRange(5));
    }

    #[test]
    fn digest_depends_on_subject_script() {
        let tx = sample_tx();
        let a = signature_hash(&tx, 0, &tx.inputs[0].script, SigHashType::All).unwrap();
        let b = signature_hash(&tx, 0, &Script::new(), SigHashType::All).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_depends_on_input_index() {
        let tx = sample_tx();
        let script = tx.inputs[0].script.clone();
        let a = signature_hash(&tx, 0, &script, SigHashType::All).unwrap();
        let b = signature_hash(&tx, 1, &script, SigHashType::All).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn code_separators_do_not_change_digest() {
        let tx = sample_tx();
        let plain = Script::compile(&[Element::Op(crate::opcode::Opcode::OpDup)]).unwrap();
        let separated = Script::compile(&[
            Element::Op(crate::opcode::Opcode::OpCodeSeparator),
            Element::Op(crate::opcode::Opcode::OpDup),
            Element::Op(crate::opcode::Opcode::OpCodeSeparator),
        ])
        .unwrap();
        let a = signature_hash(&tx, 0, &plain, SigHashType::All).unwrap();
        let b = signature_hash(&tx, 0, &separated, SigHashType::All).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn none_ignores_outputs() {
        let mut tx = sample_tx();
        let script = tx.inputs[0].script.clone();
        let before = signature_hash(&tx, 0, &script, SigHashType::None).unwrap();
        tx.outputs[1].amount = 9_999;
        let after = signature_hash(&tx, 0, &script, SigHashType::None).unwrap();
        assert_eq!(before, after);

        // ALL would notice the change.
        let all_before = signature_hash(&sample_tx(), 0, &script, SigHashType::All).unwrap();
        let all_after = signature_hash(&tx, 0, &script, SigHashType::All).unwrap();
        assert_ne!(all_before, all_after);
    }

    #[test]
    fn single_ignores_later_outputs_only() {
        let mut tx = sample_tx();
        let script = tx.inputs[0].script.clone();
        let before = signature_hash(&tx, 0, &script, SigHashType::Single).unwrap();
        tx.outputs[1].amount = 9_999;
        let later_changed = signature_hash(&tx, 0, &script, SigHashType::Single).unwrap();
        assert_eq!(before, later_changed);

        tx.outputs[0].amount = 9_999;
        let own_changed = signature_hash(&tx, 0, &script, SigHashType::Single).unwrap();
        assert_ne!(before, own_changed);
    }

    #[test]
    fn single_out_of_range_is_the_one_digest() {
        let tx = Transaction::new(
            vec![
                Input::address(TxId::from_bytes([0x01; 32]), 0, &[0x11; 20]),
                Input::address(TxId::from_bytes([0x02; 32]), 0, &[0x22; 20]),
            ],
            vec![Output::to_pubkey_hash(1, &[0x33; 20])],
        );
        let digest = signature_hash(&tx, 1, &Script::new(), SigHashType::Single).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 0x01;
        assert_eq!(digest, expected);
    }

    #[test]
    fn anyone_can_pay_ignores_other_inputs() {
        let mut tx = sample_tx();
        let script = tx.inputs[0].script.clone();
        let before =
            signature_hash(&tx, 0, &script, SigHashType::AllAnyoneCanPay).unwrap();
        tx.inputs[1] = Input::address(TxId::from_bytes([0x09; 32]), 4, &[0x99; 20]);
        let after =
            signature_hash(&tx, 0, &script, SigHashType::AllAnyoneCanPay).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn sighash_byte_is_appended_as_u32() {
        // Manually rebuild the ALL preimage for a one-input transaction
        // and compare digests.
        let tx = Transaction::new(
            vec![Input::address(TxId::from_bytes([0x01; 32]), 0, &[0x11; 20])],
            vec![Output::to_pubkey_hash(5, &[0x22; 20])],
        );
        let subject = tx.inputs[0].script.clone();
        let mut preimage = tx.to_bytes();
        preimage.extend_from_slice(&1u32.to_le_bytes());
        let expected = crate::hash::hash256(&preimage);
        assert_eq!(
            signature_hash(&tx, 0, &subject, SigHashType::All).unwrap(),
            expected
        );
    }
}
