//! Golden-vector conformance tests for the canonical codec.
//!
//! These vectors pin the wire format byte-for-byte. Any change to any of
//! them is a breaking change to the encoding version and invalidates every
//! pinned manifest hash.

use dv_core::{
    canonical_clone, decode, encode, hex_lower, DvErrorKind, DvLimits, DvMap, DvValue,
};
use hex_literal::hex;

fn enc(value: &DvValue) -> Vec<u8> {
    encode(value, &DvLimits::DEFAULT).expect("encodes")
}

fn map(entries: Vec<(&str, DvValue)>) -> DvValue {
    DvValue::Map(
        DvMap::from_entries(entries.into_iter().map(|(k, v)| (k.to_string(), v)))
            .expect("unique keys"),
    )
}

// ============================================================================
// Golden Vectors
// ============================================================================

#[test]
fn golden_scalars() {
    assert_eq!(enc(&DvValue::Null), hex!("f6"));
    assert_eq!(enc(&DvValue::Bool(false)), hex!("f4"));
    assert_eq!(enc(&DvValue::Bool(true)), hex!("f5"));
    assert_eq!(enc(&DvValue::Int(0)), hex!("00"));
    assert_eq!(enc(&DvValue::Int(10)), hex!("0a"));
    assert_eq!(enc(&DvValue::Int(100)), hex!("1864"));
    assert_eq!(enc(&DvValue::Int(1000)), hex!("1903e8"));
    assert_eq!(enc(&DvValue::Int(1_000_000)), hex!("1a000f4240"));
    assert_eq!(
        enc(&DvValue::Int(9_007_199_254_740_991)),
        hex!("1b001fffffffffffff")
    );
    assert_eq!(enc(&DvValue::Int(-1)), hex!("20"));
    assert_eq!(enc(&DvValue::Int(-10)), hex!("29"));
    assert_eq!(enc(&DvValue::Int(-100)), hex!("3863"));
    assert_eq!(enc(&DvValue::Int(-1000)), hex!("3903e7"));
    assert_eq!(
        enc(&DvValue::Int(-9_007_199_254_740_991)),
        hex!("3b001ffffffffffffe")
    );
}

#[test]
fn golden_floats() {
    assert_eq!(enc(&DvValue::Float(1.5)), hex!("fb3ff8000000000000"));
    assert_eq!(enc(&DvValue::Float(0.25)), hex!("fb3fd0000000000000"));
    assert_eq!(enc(&DvValue::Float(-0.5)), hex!("fbbfe0000000000000"));
    // Integral beyond the safe range stays a float.
    assert_eq!(
        enc(&DvValue::Float(9_007_199_254_740_992.0)),
        hex!("fb4340000000000000")
    );
}

#[test]
fn golden_strings() {
    assert_eq!(enc(&DvValue::from("")), hex!("60"));
    assert_eq!(enc(&DvValue::from("a")), hex!("6161"));
    assert_eq!(enc(&DvValue::from("IETF")), hex!("6449455446"));
    // Two-byte UTF-8 payload.
    assert_eq!(enc(&DvValue::from("\u{00fc}")), hex!("62c3bc"));
}

#[test]
fn golden_containers() {
    assert_eq!(enc(&DvValue::Array(vec![])), hex!("80"));
    assert_eq!(
        enc(&DvValue::Array(vec![
            DvValue::Int(1),
            DvValue::Int(2),
            DvValue::Int(3)
        ])),
        hex!("83010203")
    );
    assert_eq!(enc(&map(vec![])), hex!("a0"));
    assert_eq!(
        enc(&map(vec![(
            "a",
            DvValue::Array(vec![DvValue::Int(2), DvValue::Int(3)])
        )])),
        hex!("a16161820203")
    );
}

#[test]
fn golden_map_key_order() {
    // {b: 2, aa: 1}: shorter key first, then bytewise.
    let value = map(vec![("aa", DvValue::Int(1)), ("b", DvValue::Int(2))]);
    assert_eq!(enc(&value), hex!("a261620262616101"));
    assert_eq!(hex_lower(&enc(&value)), "a261620262616101");
}

#[test]
fn golden_key_order_violation() {
    let err = decode(&hex!("a262616101616202"), &DvLimits::DEFAULT).unwrap_err();
    assert_eq!(err.kind, DvErrorKind::KeyOrder);
}

// ============================================================================
// Round-Trip Laws
// ============================================================================

#[test]
fn roundtrip_identity_on_valid_values() {
    let samples = vec![
        DvValue::Null,
        DvValue::Bool(true),
        DvValue::Int(-123456),
        DvValue::Float(3.14159),
        DvValue::from("deterministic"),
        DvValue::Array(vec![
            DvValue::Null,
            map(vec![("k", DvValue::from("v"))]),
            DvValue::Float(-2.5),
        ]),
        map(vec![
            ("steps", DvValue::Array(vec![DvValue::Int(1)])),
            ("event", map(vec![("type", DvValue::from("created"))])),
            ("id", DvValue::Int(9)),
        ]),
    ];

    for value in samples {
        let bytes = enc(&value);
        let decoded = decode(&bytes, &DvLimits::DEFAULT).expect("decodes");
        assert_eq!(decoded, value, "decode(encode(v)) == v");
        assert_eq!(enc(&decoded), bytes, "re-encode is byte-identical");
    }
}

#[test]
fn canonical_encode_is_idempotent() {
    let value = map(vec![
        ("b", DvValue::Int(2)),
        ("aa", DvValue::Array(vec![DvValue::Float(0.5)])),
    ]);
    let once = enc(&value);
    let twice = enc(&decode(&once, &DvLimits::DEFAULT).unwrap());
    assert_eq!(once, twice);
}

#[test]
fn canonical_clone_matches_wire_bytes() {
    let value = map(vec![
        ("x", DvValue::Float(2.0)), // canonicalizes to Int(2)
        ("y", DvValue::from("s")),
    ]);
    let clone = canonical_clone(&value, &DvLimits::DEFAULT).unwrap();
    assert_eq!(clone.as_map().unwrap().get("x"), Some(&DvValue::Int(2)));
    assert_eq!(enc(&clone), enc(&value));
}
