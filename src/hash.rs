use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of the input data.
///
/// The fundamental 32-byte digest used throughout Bitcoin, both directly
/// (OP_SHA256) and as the inner step of [`hash160`] and [`hash256`].
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the SHA-1 hash of the input data.
///
/// Only reachable through OP_SHA1; nothing else in the protocol uses it.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the RIPEMD-160 hash of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes HASH160: `ripemd160(sha256(data))`.
///
/// The 20-byte hash committed to by P2PKH and P2SH output scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Computes HASH256: `sha256(sha256(data))`.
///
/// The double-SHA256 used for transaction ids and sighash digests.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}
