/// Errors surfaced by the constructor and classifier layer.
///
/// These are raised to the caller and never swallowed. Script *evaluation*
/// is deliberately not represented here: the interpreter is a total
/// predicate that reports failures through its error token instead (see
/// [`crate::interpreter::Interpreter::errstr`]).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The input variant requires a fixed number of keys to sign.
    #[error("this input requires {required} keys to sign, but {provided} were provided")]
    InvalidSignatureCount { required: usize, provided: usize },

    /// A generic input has no signing procedure.
    #[error("this input does not match a known template and cannot sign itself")]
    UnknownSignatureMethod,

    /// A script did not match the template an operation expected.
    #[error("script does not match the expected template")]
    InvalidScript,

    /// A push is oversized, or its data runs past the end of the script.
    #[error("invalid push: {0}")]
    InvalidPush(&'static str),

    /// A byte value that is not part of the instruction set.
    #[error("undefined opcode: 0x{0:02x}")]
    UndefinedOpcode(u8),

    /// An integer does not fit in the requested encoding width.
    #[error("value {value} does not fit in {length} bytes")]
    NumberOverflow { value: u64, length: usize },

    /// A script number is longer than the permitted maximum.
    #[error("script number exceeds {max_len} bytes")]
    ScriptNumberOverflow { max_len: usize },

    /// A script number is not minimally encoded where minimality is required.
    #[error("script number is not minimally encoded")]
    NonMinimalNumber,

    /// A byte buffer ended before a read could complete.
    #[error("buffer ended before {wanted} more bytes could be read")]
    UnexpectedEnd { wanted: usize },

    /// A byte buffer kept going after the value it holds ended.
    #[error("unexpected trailing bytes after deserialization")]
    TrailingBytes,

    /// A multisig template with an impossible threshold.
    #[error("multisig requires 1 <= m <= n <= 16, got m={m} n={n}")]
    InvalidThreshold { m: usize, n: usize },

    /// An input index outside the transaction's input list.
    #[error("transaction input index {0} is out of range")]
    InputIndexOutOfRange(usize),

    /// A hex string could not be decoded.
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Key material rejected by secp256k1.
    #[error("invalid key material: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}
