use crate::encoding::{encode_varint, ByteReader};
use crate::error::Error;
use crate::keys::{PrivateKey, PublicKey};
use crate::script::{Script, ScriptKind};
use crate::sighash::SigHashType;
use crate::transaction::TxId;

/// Sequence number marking an input as final.
pub const FINAL_SEQ_NUMBER: u32 = 0xFFFF_FFFF;

/// How an input will produce its spending script.
///
/// The variant decides both the placeholder script present while the
/// signature digest is built and the shape of the final script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Spends a P2PKH output; placeholder is the previous output script.
    Address,
    /// Spends a P2SH output with an arbitrary redeem script; placeholder
    /// is the redeem script itself.
    Script,
    /// Spends a P2SH output whose redeem script is a multisig template.
    Multisig,
    /// Unknown template; cannot sign.
    Generic,
}

/// A transaction input.
///
/// Until signed, `script` holds the placeholder the digest is computed
/// over; [`Input::sign`] swaps in the final spending script. Inputs are
/// values: signing returns a modified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub prev_tx_id: TxId,
    pub txo_index: u32,
    pub script: Script,
    pub seq_number: u32,
    kind: InputKind,
}

impl Input {
    /// An input spending a P2PKH output. The placeholder is the canonical
    /// output script for the pubkey hash, so the previous transaction
    /// never needs to be fetched.
    pub fn address(prev_tx_id: TxId, txo_index: u32, pubkey_hash: &[u8; 20]) -> Input {
        Input {
            prev_tx_id,
            txo_index,
            script: Script::pay_to_pubkey_hash_out(pubkey_hash),
            seq_number: FINAL_SEQ_NUMBER,
            kind: InputKind::Address,
        }
    }

    /// An input spending a P2SH output with the given redeem script.
    pub fn script(prev_tx_id: TxId, txo_index: u32, redeem: Script) -> Input {
        Input {
            prev_tx_id,
            txo_index,
            script: redeem,
            seq_number: FINAL_SEQ_NUMBER,
            kind: InputKind::Script,
        }
    }

    /// An input spending a P2SH output whose redeem script is the
    /// standard `m <pubkey>... n OP_CHECKMULTISIG` template, built here
    /// from the key set and threshold.
    pub fn multisig(
        prev_tx_id: TxId,
        txo_index: u32,
        pubkeys: &[PublicKey],
        min_signatures: usize,
    ) -> Result<Input, Error> {
        let serialized: Vec<Vec<u8>> =
            pubkeys.iter().map(|pubkey| pubkey.serialize().to_vec()).collect();
        Ok(Input {
            prev_tx_id,
            txo_index,
            script: Script::redeem_multisig(&serialized, min_signatures)?,
            seq_number: FINAL_SEQ_NUMBER,
            kind: InputKind::Multisig,
        })
    }

    /// An input carrying an arbitrary script. Generic inputs serialize
    /// and round-trip but refuse to sign.
    pub fn generic(prev_tx_id: TxId, txo_index: u32, script: Script) -> Input {
        Input {
            prev_tx_id,
            txo_index,
            script,
            seq_number: FINAL_SEQ_NUMBER,
            kind: InputKind::Generic,
        }
    }

    /// Classifies `script` against the standard templates and builds the
    /// matching input variant. Unrecognized templates become
    /// [`InputKind::Generic`].
    pub fn classify(prev_tx_id: TxId, txo_index: u32, script: Script) -> Input {
        let kind = match script.kind() {
            ScriptKind::PubkeyHashOut | ScriptKind::PubkeyHashIn => InputKind::Address,
            ScriptKind::MultisigRedeem => InputKind::Multisig,
            ScriptKind::ScriptHashIn => InputKind::Script,
            _ => InputKind::Generic,
        };
        Input { prev_tx_id, txo_index, script, seq_number: FINAL_SEQ_NUMBER, kind }
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// A copy with a different script and everything else unchanged.
    pub fn replace_script(&self, script: Script) -> Input {
        Input { script, ..self.clone() }
    }

    /// A copy with an empty script; used while building sighash preimages.
    pub fn remove_script(&self) -> Input {
        self.replace_script(Script::new())
    }

    pub(crate) fn with_seq_number(&self, seq_number: u32) -> Input {
        Input { seq_number, ..self.clone() }
    }

    /// Whether the provided keys are exactly what this input needs.
    pub fn can_sign(&self, privkeys: &[PrivateKey]) -> bool {
        match self.kind {
            InputKind::Address => {
                privkeys.len() == 1
                    && self.script.address_hash()
                        == Some(privkeys[0].public_key().hash160())
            }
            InputKind::Multisig => {
                let (required, _) = match self.script.multisig_threshold() {
                    Some(threshold) => threshold,
                    None => return false,
                };
                if privkeys.len() != required {
                    return false;
                }
                let expected = match self.script.multisig_pubkeys() {
                    Some(pubkeys) => pubkeys,
                    None => return false,
                };
                privkeys.iter().all(|privkey| {
                    expected.contains(&privkey.public_key().serialize().to_vec())
                })
            }
            // A raw script input signs with whatever it is given.
            InputKind::Script => true,
            InputKind::Generic => false,
        }
    }

    /// Assembles the final spending script from signatures over `digest`.
    ///
    /// Every DER signature gets the sighash-type byte appended. The
    /// variant decides the script shape; see the module docs for the
    /// placeholder/final-script table.
    pub fn sign(
        &self,
        privkeys: &[PrivateKey],
        digest: &[u8; 32],
        sighash_type: SigHashType,
    ) -> Result<Input, Error> {
        let signed_script = match self.kind {
            InputKind::Address => {
                if privkeys.len() != 1 {
                    return Err(Error::InvalidSignatureCount {
                        required: 1,
                        provided: privkeys.len(),
                    });
                }
                let signature = signature_with_type(&privkeys[0], digest, sighash_type);
                let pubkey = privkeys[0].public_key().serialize();
                Script::pay_to_pubkey_hash_in(&signature, &pubkey)?
            }
            InputKind::Multisig => {
                let (required, _) =
                    self.script.multisig_threshold().ok_or(Error::InvalidScript)?;
                if privkeys.len() != required {
                    return Err(Error::InvalidSignatureCount {
                        required,
                        provided: privkeys.len(),
                    });
                }
                let signatures: Vec<Vec<u8>> = order_by_pubkey(&self.script, privkeys)
                    .iter()
                    .map(|privkey| signature_with_type(privkey, digest, sighash_type))
                    .collect();
                Script::pay_to_multisig_in(&signatures, &self.script)?
            }
            InputKind::Script => {
                let signatures: Vec<Vec<u8>> = privkeys
                    .iter()
                    .map(|privkey| signature_with_type(privkey, digest, sighash_type))
                    .collect();
                Script::pay_to_script_in(&signatures, &self.script)?
            }
            InputKind::Generic => return Err(Error::UnknownSignatureMethod),
        };
        Ok(self.replace_script(signed_script))
    }

    /// Wire serialization: reversed tx id, output index, varint-prefixed
    /// script, sequence number.
    pub fn to_bytes(&self) -> Vec<u8> {
        let script = self.script.to_bytes();
        let mut bytes = Vec::with_capacity(32 + 4 + 9 + script.len() + 4);
        bytes.extend_from_slice(&self.prev_tx_id.wire_bytes());
        bytes.extend_from_slice(&self.txo_index.to_le_bytes());
        bytes.extend_from_slice(&encode_varint(script.len() as u64));
        bytes.extend_from_slice(&script);
        bytes.extend_from_slice(&self.seq_number.to_le_bytes());
        bytes
    }

    pub(crate) fn from_reader(reader: &mut ByteReader<'_>) -> Result<Input, Error> {
        let mut txid_bytes = [0u8; 32];
        txid_bytes.copy_from_slice(reader.read(32)?);
        let prev_tx_id = TxId::from_wire_bytes(txid_bytes);
        let txo_index = reader.read_u32_le()?;
        let script_len = reader.read_varint()? as usize;
        let script = Script::from_bytes(reader.read(script_len)?)?;
        let seq_number = reader.read_u32_le()?;
        Ok(Input {
            prev_tx_id,
            txo_index,
            script,
            seq_number,
            kind: InputKind::Generic,
        })
    }
}

fn signature_with_type(
    privkey: &PrivateKey,
    digest: &[u8; 32],
    sighash_type: SigHashType,
) -> Vec<u8> {
    let mut signature = privkey.sign(digest);
    signature.push(sighash_type.to_byte());
    signature
}

/// Orders keys to match the redeem script's pubkey order, which is the
/// order CHECKMULTISIG consumes signatures in. Keys outside the script's
/// set go last; their signatures will simply fail verification.
fn order_by_pubkey(redeem: &Script, privkeys: &[PrivateKey]) -> Vec<PrivateKey> {
    let script_pubkeys = redeem.multisig_pubkeys().unwrap_or_default();
    let mut ordered: Vec<PrivateKey> = Vec::with_capacity(privkeys.len());
    let mut unmatched: Vec<PrivateKey> = Vec::new();
    let position_of = |privkey: &PrivateKey| {
        let serialized = privkey.public_key().serialize();
        script_pubkeys.iter().position(|pubkey| pubkey.as_slice() == serialized.as_slice())
    };
    for privkey in privkeys {
        match position_of(privkey) {
            Some(_) => ordered.push(privkey.clone()),
            None => unmatched.push(privkey.clone()),
        }
    }
    ordered.sort_by_key(position_of);
    ordered.extend(unmatched);
    ordered
}
