// Address and keypair tests for the identity module

use custody::identity::{Address, AddressError, Keypair, PublicKey};
use std::collections::HashSet;

// ============================================================================
// DERIVATION TESTS
// ============================================================================

#[test]
fn test_address_is_deterministic_for_a_key() {
    let keypair = Keypair::generate();

    assert_eq!(keypair.address(), keypair.public_key().address());
    assert_eq!(keypair.address(), Address::from_public_key(&keypair.public_key()));
}

#[test]
fn test_distinct_keys_give_distinct_addresses() {
    let addresses: HashSet<Address> = (0..50).map(|_| Keypair::generate().address()).collect();

    assert_eq!(addresses.len(), 50);
}

#[test]
fn test_address_survives_public_key_bytes() {
    let keypair = Keypair::generate();
    let public_key = PublicKey::from_bytes(keypair.public_key().as_bytes()).unwrap();

    assert_eq!(public_key.address(), keypair.address());
}

// ============================================================================
// PARSING TESTS
// ============================================================================

#[test]
fn test_display_format() {
    let address = Keypair::generate().address();
    let text = address.to_string();

    assert!(text.starts_with("0x"));
    assert_eq!(text.len(), 42);
    assert_eq!(text, text.to_lowercase());
}

#[test]
fn test_parse_accepts_bare_and_uppercase_hex() {
    let address = Keypair::generate().address();
    let bare = address.to_string()[2..].to_string();

    assert_eq!(Address::parse(&bare).unwrap(), address);
    assert_eq!(Address::parse(&bare.to_uppercase()).unwrap(), address);
    assert_eq!(format!("0x{}", bare).parse::<Address>().unwrap(), address);
}

#[test]
fn test_parse_rejects_wrong_length() {
    assert_eq!(
        Address::parse("0x1234"),
        Err(AddressError::InvalidLength {
            expected: 40,
            got: 4
        })
    );
}

#[test]
fn test_parse_rejects_non_hex() {
    let text = format!("0x{}", "zz".repeat(20));

    assert!(matches!(Address::parse(&text), Err(AddressError::InvalidHex(_))));
}

#[test]
fn test_zero_address_parses() {
    let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();

    assert_eq!(zero, Address::from_bytes([0u8; 20]));
    assert_eq!(zero.as_bytes(), &[0u8; 20]);
}
