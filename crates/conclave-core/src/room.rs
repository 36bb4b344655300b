use rand::Rng;

/// Room codes are drawn from the plain uppercase alphabet: 26^4 = 456,976
/// possible codes, enough that collision-rejection never degenerates.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of a room code in characters.
pub const CODE_LEN: usize = 4;

/// Generate a random room code using the process RNG.
///
/// Uniqueness against live rooms is the caller's concern (the room
/// directory rejects collisions and redraws).
pub fn generate_room_code() -> String {
    generate_room_code_with(&mut rand::rng())
}

/// Generate a random room code from the given RNG.
pub fn generate_room_code_with(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check that a string is a well-formed room code: exactly four uppercase
/// ASCII letters.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "Invalid room code: {code}");
        }
    }

    #[test]
    fn validation_rejects_malformed_codes() {
        assert!(is_valid_room_code("ABCD"));
        assert!(!is_valid_room_code("abcd"));
        assert!(!is_valid_room_code("ABC"));
        assert!(!is_valid_room_code("ABCDE"));
        assert!(!is_valid_room_code("AB1D"));
        assert!(!is_valid_room_code("AB-D"));
        assert!(!is_valid_room_code(""));
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_room_code_with(&mut StdRng::seed_from_u64(7));
        let b = generate_room_code_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn any_seed_yields_valid_code(seed in proptest::num::u64::ANY) {
            let code = generate_room_code_with(&mut StdRng::seed_from_u64(seed));
            prop_assert!(is_valid_room_code(&code));
        }
    }
}
