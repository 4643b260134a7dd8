//! Bitcoin transaction signing and Script verification primitives.
//!
//! This crate covers the two halves of spending a Bitcoin output: building
//! and signing the transaction input that spends it, and evaluating the
//! Script programs that decide whether the spend is valid.
//!
//! # Consensus warning
//!
//! **This crate is NOT consensus-compatible with Bitcoin Core.**
//!
//! A reimplementation of Bitcoin Script cannot guarantee identical
//! behavior to Bitcoin Core's C++ interpreter across all edge cases —
//! number encoding boundaries, error ordering, and other subtle behaviors
//! that define Bitcoin's consensus rules.
//!
//! **Do not use this crate to validate real transactions or protect real
//! funds.**
//!
//! # What this crate implements
//!
//! - **Script model**: parse, serialize, and compile scripts with minimal
//!   push encodings, and classify them against the standard templates
//!   (P2PKH, P2SH, bare multisig, OP_RETURN).
//! - **Input signing**: classify a previous output, install the right
//!   placeholder script, build the legacy sighash preimage, and assemble
//!   the final spending script for P2PKH, P2SH, and multisig inputs.
//! - **Interpreter**: a stack-based virtual machine implementing the full
//!   pre-SegWit opcode set with conditional execution, resource bounds,
//!   the P2SH redeem stage, and flag-gated strictness rules. Failures are
//!   reported as stable reason tokens, never as panics or errors.
//! - **Transactions**: the legacy wire serialization, byte-for-byte.
//!
//! # What is NOT implemented
//!
//! - SegWit, Taproot, or any witness-based script types
//! - Timelock opcodes (OP_CHECKLOCKTIMEVERIFY, OP_CHECKSEQUENCEVERIFY)
//! - Block validation, mempool policy, or networking
//! - Address (base58) encoding; the signers consume 20-byte hashes
//!
//! # Quick example
//!
//! ```rust
//! use bitscript::interpreter::Interpreter;
//! use bitscript::opcode::Opcode;
//! use bitscript::script::{Element, Script};
//!
//! // OP_1 OP_1 OP_EQUAL leaves true on the stack.
//! let previous = Script::compile(&[
//!     Element::Op(Opcode::Op1),
//!     Element::Op(Opcode::OpEqual),
//! ]).unwrap();
//! let spending = Script::compile(&[Element::Op(Opcode::Op1)]).unwrap();
//!
//! let mut interpreter = Interpreter::new();
//! assert!(interpreter.verify(&spending, &previous));
//! ```
//!
//! Signing requires a transaction; see [`transaction::Transaction::signed_input`]
//! and the `demos/` directory for the end-to-end flow.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod input;
pub mod interpreter;
pub mod keys;
pub mod opcode;
pub mod script;
pub mod sighash;
pub(crate) mod stack;
pub mod transaction;
