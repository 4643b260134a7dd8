use bitscript::encoding::{
    cast_to_bool, decode_script_number, encode_script_number, encode_varint, ByteReader,
};
use bitscript::opcode::Opcode;
use bitscript::script::{Element, Script, ScriptKind};

// ---------------------------------------------------------------------------
// Codec round-trips
// ---------------------------------------------------------------------------

#[test]
fn script_number_corner_values_round_trip() {
    let corners: [i64; 9] = [
        0,
        1,
        -1,
        0x7F,
        0x80,
        0xFF,
        (1 << 16) - 1,
        (1 << 31) - 1,
        -((1 << 31) - 1),
    ];
    for value in corners {
        let bytes = encode_script_number(value);
        assert_eq!(
            decode_script_number(&bytes, true, 4).unwrap(),
            value,
            "round trip failed for {value}"
        );
    }
}

#[test]
fn varint_round_trips_across_widths() {
    for value in [0u64, 1, 0xFC, 0xFD, 0x1234, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, u64::MAX] {
        let bytes = encode_varint(value);
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_varint().unwrap(), value);
        assert!(reader.is_empty());
    }
}

#[test]
fn cast_to_bool_corners() {
    assert!(!cast_to_bool(b""));
    assert!(!cast_to_bool(&[0x00]));
    assert!(!cast_to_bool(&[0x00, 0x80]));
    assert!(cast_to_bool(&[0x01]));
    assert!(cast_to_bool(&[0x81]));
    assert!(cast_to_bool(&[0x00, 0x01]));
}

// ---------------------------------------------------------------------------
// Script round-trips
// ---------------------------------------------------------------------------

#[test]
fn compiled_scripts_survive_serialization() {
    let scripts = [
        Script::new(),
        Script::compile(&[Element::Op(Opcode::Op1)]).unwrap(),
        Script::pay_to_pubkey_hash_out(&[0xab; 20]),
        Script::pay_to_script_hash_out(&[0xcd; 20]),
        Script::op_return(b"some data").unwrap(),
        Script::compile(&[
            Element::Num(-1000),
            Element::Data(vec![0x42; 76]),
            Element::Data(vec![0x17; 300]),
            Element::Op(Opcode::OpCheckSig),
        ])
        .unwrap(),
        Script::redeem_multisig(&[vec![0x02; 33], vec![0x03; 33]], 1).unwrap(),
    ];
    for script in &scripts {
        let bytes = script.to_bytes();
        assert_eq!(&Script::from_bytes(&bytes).unwrap(), script);
        assert_eq!(Script::from_hex(&script.to_hex()).unwrap(), *script);
    }
}

#[test]
fn canonical_p2pkh_byte_layout() {
    // OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG
    let script = Script::pay_to_pubkey_hash_out(&[0xab; 20]);
    let bytes = script.to_bytes();
    assert_eq!(bytes.len(), 25);
    assert_eq!(bytes[0], 0x76);
    assert_eq!(bytes[1], 0xa9);
    assert_eq!(bytes[2], 0x14);
    assert_eq!(bytes[23], 0x88);
    assert_eq!(bytes[24], 0xac);
}

// ---------------------------------------------------------------------------
// Classification totality over the standard templates
// ---------------------------------------------------------------------------

#[test]
fn classification_of_compiled_templates() {
    assert_eq!(
        Script::pay_to_pubkey_hash_out(&[0x01; 20]).kind(),
        ScriptKind::PubkeyHashOut
    );
    assert_eq!(
        Script::pay_to_script_hash_out(&[0x02; 20]).kind(),
        ScriptKind::ScriptHashOut
    );
    assert_eq!(
        Script::redeem_multisig(&[vec![0x02; 33], vec![0x03; 33], vec![0x02; 33]], 2)
            .unwrap()
            .kind(),
        ScriptKind::MultisigRedeem
    );
    assert_eq!(Script::op_return(b"x").unwrap().kind(), ScriptKind::OpReturnOut);
    assert_eq!(Script::op_return(b"").unwrap().kind(), ScriptKind::OpReturnOut);
    assert_eq!(
        Script::pay_to_pubkey_hash_in(&[0x30; 71], &[0x02; 33])
            .unwrap()
            .kind(),
        ScriptKind::PubkeyHashIn
    );

    let redeem = Script::redeem_multisig(&[vec![0x02; 33], vec![0x03; 33]], 2).unwrap();
    assert_eq!(
        Script::pay_to_multisig_in(&[vec![0x30; 71], vec![0x30; 70]], &redeem)
            .unwrap()
            .kind(),
        ScriptKind::ScriptHashIn
    );

    assert_eq!(Script::new().kind(), ScriptKind::Generic);
    assert_eq!(
        Script::compile(&[Element::Op(Opcode::OpAdd)]).unwrap().kind(),
        ScriptKind::Generic
    );
}

#[test]
fn first_match_wins_for_two_pushes() {
    // Two plain pushes classify as a P2PKH input even though the second
    // push happens to parse as a script.
    let ambiguous = Script::compile(&[
        Element::Data(vec![0x30; 71]),
        Element::Data(vec![0x51]),
    ])
    .unwrap();
    assert_eq!(ambiguous.kind(), ScriptKind::PubkeyHashIn);
}

// ---------------------------------------------------------------------------
// Parse failures
// ---------------------------------------------------------------------------

#[test]
fn trailing_partial_push_is_rejected() {
    // Direct push announcing 5 bytes with only 2 present.
    assert!(Script::from_bytes(&[0x05, 0x01, 0x02]).is_err());
    // PUSHDATA2 with a truncated length field.
    assert!(Script::from_bytes(&[0x4d, 0x10]).is_err());
}

#[test]
fn hex_parse_rejects_bad_input() {
    assert!(Script::from_hex("zz").is_err());
    assert!(Script::from_hex("0").is_err());
}
