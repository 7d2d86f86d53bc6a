//! Contract tests for the one-time linking-code generator.

use std::collections::HashSet;

use blackbox::handlers::links::{generate_code, Provider, CODE_ALPHABET, LINK_CODE_LEN};

#[test]
fn codes_are_fixed_length_and_fixed_alphabet() {
    for _ in 0..100 {
        let code = generate_code(LINK_CODE_LEN);
        assert_eq!(code.len(), LINK_CODE_LEN);
        assert!(
            code.bytes().all(|b| CODE_ALPHABET.contains(&b)),
            "unexpected character in {}",
            code
        );
    }
}

#[test]
fn codes_avoid_lookalike_characters() {
    let forbidden: &[u8] = b"0O1IL";
    for b in forbidden {
        assert!(!CODE_ALPHABET.contains(b));
    }
    // Alphabet is deduplicated.
    let unique: HashSet<u8> = CODE_ALPHABET.iter().copied().collect();
    assert_eq!(unique.len(), CODE_ALPHABET.len());
}

#[test]
fn collisions_are_rare_enough_for_one_time_use() {
    let codes: HashSet<String> = (0..1000).map(|_| generate_code(LINK_CODE_LEN)).collect();
    // 31^8 possible codes; a duplicate within a thousand draws would point
    // at a broken generator.
    assert_eq!(codes.len(), 1000);
}

#[test]
fn provider_names_round_trip() {
    for (name, provider) in [("slack", Provider::Slack), ("github", Provider::Github)] {
        assert_eq!(Provider::parse(name), Some(provider));
        assert_eq!(provider.as_str(), name);
    }
    assert_eq!(Provider::parse("bitbucket"), None);
}
