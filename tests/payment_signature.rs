//! Contract tests for payment signature verification.

use blackbox::payments::{compute_signature, signature_matches, ProductType};

const KEY_SECRET: &str = "rzp_test_secret_9xKq";
const ORDER_ID: &str = "order_NfK8syqyZXbGMk";
const PAYMENT_ID: &str = "pay_NfKBQmPV2v6JLd";
// HMAC-SHA256(key_secret, "order_id|payment_id") as lowercase hex.
const SIGNATURE: &str = "645244253cee6076d23cf3b836271aec7edcae287a10246ed02cb9b45c55c5da";

#[test]
fn signature_is_hmac_sha256_over_order_pipe_payment() {
    assert_eq!(compute_signature(KEY_SECRET, ORDER_ID, PAYMENT_ID), SIGNATURE);
}

#[test]
fn exact_match_verifies() {
    assert!(signature_matches(KEY_SECRET, ORDER_ID, PAYMENT_ID, SIGNATURE));
}

#[test]
fn verification_fails_closed_on_any_difference() {
    // Truncated.
    assert!(!signature_matches(KEY_SECRET, ORDER_ID, PAYMENT_ID, &SIGNATURE[..63]));
    // One flipped nibble.
    let mut flipped = SIGNATURE.to_string();
    flipped.replace_range(0..1, if SIGNATURE.starts_with('0') { "1" } else { "0" });
    assert!(!signature_matches(KEY_SECRET, ORDER_ID, PAYMENT_ID, &flipped));
    // Uppercase hex of the correct digest is still a mismatch.
    assert!(!signature_matches(KEY_SECRET, ORDER_ID, PAYMENT_ID, &SIGNATURE.to_uppercase()));
    // Wrong secret.
    assert!(!signature_matches("other_secret", ORDER_ID, PAYMENT_ID, SIGNATURE));
    // Swapped ids change the signed message.
    assert!(!signature_matches(KEY_SECRET, PAYMENT_ID, ORDER_ID, SIGNATURE));
}

#[test]
fn the_separator_is_part_of_the_message() {
    // "a|bc" and "ab|c" must not collide.
    let one = compute_signature(KEY_SECRET, "a", "bc");
    let two = compute_signature(KEY_SECRET, "ab", "c");
    assert_ne!(one, two);
}

#[test]
fn known_products_parse_and_price() {
    let config = blackbox::config::Config::default_for_testing().payments;
    let product = ProductType::parse("promotion_package").unwrap();
    assert_eq!(product.price_inr(&config), 499);
    assert!(ProductType::parse("coffee").is_none());
}
