use proptest::prelude::*;

use modhub_types::{PublicKey, Timestamp};

proptest! {
    /// PublicKey hex roundtrip: new -> to_hex -> from_hex produces identical key.
    #[test]
    fn public_key_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let key = PublicKey::new(bytes);
        let parsed = PublicKey::from_hex(&key.to_hex()).unwrap();
        prop_assert_eq!(parsed, key);
        prop_assert_eq!(key.to_hex().len(), 64);
    }

    /// PublicKey ordering follows the raw byte ordering.
    #[test]
    fn public_key_ordering(
        a in prop::array::uniform32(0u8..),
        b in prop::array::uniform32(0u8..),
    ) {
        prop_assert_eq!(PublicKey::new(a) < PublicKey::new(b), a < b);
    }

    /// Any string that is not 64 characters long is rejected.
    #[test]
    fn public_key_rejects_bad_length(s in "[0-9a-f]{0,63}") {
        prop_assert!(PublicKey::from_hex(&s).is_err());
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Timestamp elapsed_since: elapsed_since(now) = now - self (saturating).
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        let now = Timestamp::new(base + offset);
        prop_assert_eq!(t.elapsed_since(now), offset);
    }

    /// Timestamp elapsed_since saturates to 0 when now < self.
    #[test]
    fn timestamp_elapsed_since_saturates(
        base in 1u64..1_000_000,
        deficit in 1u64..1_000_000,
    ) {
        let later = Timestamp::new(base + deficit);
        let earlier = Timestamp::new(base);
        prop_assert_eq!(later.elapsed_since(earlier), 0);
    }
}
