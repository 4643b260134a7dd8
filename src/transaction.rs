use crate::encoding::{encode_varint, ByteReader};
use crate::error::Error;
use crate::hash;
use crate::input::Input;
use crate::keys::PrivateKey;
use crate::script::Script;
use crate::sighash::{signature_hash, SigHashType};

/// A transaction id in display order.
///
/// The hex form shown to users is big-endian (the reverse of the
/// double-SHA256 output); the wire serialization reverses it back to
/// little-endian. The bytes held here are display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: [u8; 32]) -> TxId {
        TxId(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<TxId, Error> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        Ok(TxId(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The little-endian byte order used on the wire.
    pub(crate) fn wire_bytes(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    pub(crate) fn from_wire_bytes(mut bytes: [u8; 32]) -> TxId {
        bytes.reverse();
        TxId(bytes)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A transaction output: an amount in satoshis locked by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub amount: u64,
    pub script: Script,
}

impl Output {
    pub fn new(amount: u64, script: Script) -> Output {
        Output { amount, script }
    }

    /// An output paying `amount` to a public-key hash.
    pub fn to_pubkey_hash(amount: u64, pubkey_hash: &[u8; 20]) -> Output {
        Output::new(amount, Script::pay_to_pubkey_hash_out(pubkey_hash))
    }

    /// An output paying `amount` to a script hash.
    pub fn to_script_hash(amount: u64, script_hash: &[u8; 20]) -> Output {
        Output::new(amount, Script::pay_to_script_hash_out(script_hash))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let script = self.script.to_bytes();
        let mut bytes = Vec::with_capacity(8 + 9 + script.len());
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes.extend_from_slice(&encode_varint(script.len() as u64));
        bytes.extend_from_slice(&script);
        bytes
    }

    pub(crate) fn from_reader(reader: &mut ByteReader<'_>) -> Result<Output, Error> {
        let amount = reader.read_u64_le()?;
        let script_len = reader.read_varint()? as usize;
        let script = Script::from_bytes(reader.read(script_len)?)?;
        Ok(Output { amount, script })
    }
}

/// A complete transaction in the legacy (pre-SegWit) layout.
///
/// Values, not object graphs: inputs, outputs, and scripts are owned and
/// the signing helpers return modified copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Transaction {
        Transaction { version: 1, inputs, outputs, locktime: 0 }
    }

    /// Consensus serialization: version, varint-counted inputs and
    /// outputs, locktime; all integers little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&encode_varint(self.inputs.len() as u64));
        for input in &self.inputs {
            bytes.extend_from_slice(&input.to_bytes());
        }
        bytes.extend_from_slice(&encode_varint(self.outputs.len() as u64));
        for output in &self.outputs {
            bytes.extend_from_slice(&output.to_bytes());
        }
        bytes.extend_from_slice(&self.locktime.to_le_bytes());
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Transaction, Error> {
        let mut reader = ByteReader::new(bytes);
        let tx = Transaction::from_reader(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::TrailingBytes);
        }
        Ok(tx)
    }

    pub fn from_hex(hex_str: &str) -> Result<Transaction, Error> {
        Transaction::from_bytes(&hex::decode(hex_str)?)
    }

    pub(crate) fn from_reader(reader: &mut ByteReader<'_>) -> Result<Transaction, Error> {
        let version = reader.read_u32_le()? as i32;
        let input_count = reader.read_varint()? as usize;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(Input::from_reader(reader)?);
        }
        let output_count = reader.read_varint()? as usize;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(Output::from_reader(reader)?);
        }
        let locktime = reader.read_u32_le()?;
        Ok(Transaction { version, inputs, outputs, locktime })
    }

    /// The transaction id: double-SHA256 of the serialization, shown in
    /// display (big-endian) order.
    pub fn id(&self) -> TxId {
        TxId::from_wire_bytes(hash::hash256(&self.to_bytes()))
    }

    /// Returns a copy with the input at `index` signed.
    ///
    /// The digest is computed from the input's placeholder script per the
    /// sighash rules, then the placeholder is replaced by the final
    /// spending script the input variant assembles.
    pub fn signed_input(
        &self,
        index: usize,
        privkeys: &[PrivateKey],
        sighash_type: SigHashType,
    ) -> Result<Transaction, Error> {
        let input = self.inputs.get(index).ok_or(Error::InputIndexOutOfRange(index))?;
        let digest = signature_hash(self, index, &input.script, sighash_type)?;
        let signed = input.sign(privkeys, &digest, sighash_type)?;
        let mut tx = self.clone();
        tx.inputs[index] = signed;
        Ok(tx)
    }

    /// Returns a copy with every input the provided keys can sign, signed.
    pub fn sign(
        &self,
        privkeys: &[PrivateKey],
        sighash_type: SigHashType,
    ) -> Result<Transaction, Error> {
        let mut tx = self.clone();
        for index in 0..self.inputs.len() {
            if self.inputs[index].can_sign(privkeys) {
                tx = tx.signed_input(index, privkeys, sighash_type)?;
            }
        }
        Ok(tx)
    }
}
