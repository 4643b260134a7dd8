//! Signs a Pay-to-Public-Key-Hash input end to end and verifies the
//! resulting spending script with the interpreter.
//!
//! Run with: `cargo run --example sign_p2pkh`

use bitscript::input::Input;
use bitscript::interpreter::Interpreter;
use bitscript::keys::PrivateKey;
use bitscript::script::Script;
use bitscript::sighash::SigHashType;
use bitscript::transaction::{Output, Transaction, TxId};

fn main() {
    // 1. A private key and the 20-byte hash of its public key. In a real
    //    wallet the hash would come from decoding an address.
    let privkey = PrivateKey::from_bytes(&[0x42; 32]).expect("valid key bytes");
    let pubkey_hash = privkey.public_key().hash160();

    // 2. The output being spent locks funds to that hash.
    let previous_output = Script::pay_to_pubkey_hash_out(&pubkey_hash);

    // 3. Build a one-input, one-output transaction. The input installs
    //    the previous output script as its signing placeholder.
    let prev_tx = TxId::from_hex(&"11".repeat(32)).expect("valid tx id");
    let input = Input::address(prev_tx, 0, &pubkey_hash);
    let output = Output::to_pubkey_hash(90_000, &[0x99; 20]);
    let tx = Transaction::new(vec![input], vec![output]);

    // 4. Sign input 0. This hashes the modified transaction, signs the
    //    digest, and assembles `<sig> <pubkey>`.
    let signed = tx
        .signed_input(0, &[privkey], SigHashType::All)
        .expect("signable input");

    println!("spending script:  {}", signed.inputs[0].script);
    println!("previous output:  {previous_output}");
    println!("transaction hex:  {}", signed.to_hex());
    println!("transaction id:   {}", signed.id());
    println!();

    // 5. Verify the spend the way a node would.
    let mut interpreter = Interpreter::for_transaction(signed.clone(), 0, 0);
    let valid = interpreter.verify(&signed.inputs[0].script, &previous_output);
    println!("verification result: {valid}");
}
