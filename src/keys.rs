use secp256k1::{Message, SecretKey, SECP256K1};

use crate::error::Error;
use crate::hash;

/// A secp256k1 private key acting as the signing oracle.
///
/// Signing is deterministic (RFC 6979) and produces plain DER bytes; the
/// sighash-type byte is appended by the input signer, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<PrivateKey, Error> {
        Ok(PrivateKey(SecretKey::from_slice(bytes)?))
    }

    pub fn from_hex(hex_str: &str) -> Result<PrivateKey, Error> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        PrivateKey::from_bytes(&bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(secp256k1::PublicKey::from_secret_key(&SECP256K1, &self.0))
    }

    /// Signs a 32-byte digest, returning the DER-encoded signature.
    pub fn sign(&self, digest: &[u8; 32]) -> Vec<u8> {
        let message = Message::from_digest(*digest);
        SECP256K1.sign_ecdsa(&message, &self.0).serialize_der().to_vec()
    }
}

/// A secp256k1 public key in SEC form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Accepts the 33-byte compressed or 65-byte uncompressed SEC encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<PublicKey, Error> {
        Ok(PublicKey(secp256k1::PublicKey::from_slice(bytes)?))
    }

    /// The 33-byte compressed SEC encoding.
    pub fn serialize(&self) -> [u8; 33] {
        self.0.serialize()
    }

    /// HASH160 of the compressed encoding; the payload of a P2PKH output.
    pub fn hash160(&self) -> [u8; 20] {
        hash::hash160(&self.serialize())
    }
}
