//! Property-based tests for Maidenhead locators.

use kst_proto::Locator;
use proptest::prelude::*;

/// Any well-formed locator, in mixed case.
fn valid_locator() -> impl Strategy<Value = String> {
    (0u8..18, 0u8..18, 0u8..10, 0u8..10, 0u8..24, 0u8..24, any::<bool>()).prop_map(
        |(f1, f2, d1, d2, s1, s2, lower)| {
            let sub = |n: u8| if lower { char::from(b'a' + n) } else { char::from(b'A' + n) };
            format!(
                "{}{}{}{}{}{}",
                char::from(b'A' + f1),
                char::from(b'A' + f2),
                char::from(b'0' + d1),
                char::from(b'0' + d2),
                sub(s1),
                sub(s2),
            )
        },
    )
}

/// Strings that break the pattern in at least one position.
fn invalid_locator() -> impl Strategy<Value = String> {
    prop_oneof![
        // Wrong length
        "[A-R]{2}[0-9]{2}",
        "[A-R]{2}[0-9]{2}[A-X]{2}[A-X0-9]{1,4}",
        // Field letters beyond R
        "[S-Z][A-R][0-9]{2}[A-X]{2}",
        // Subsquare letters beyond X
        "[A-R]{2}[0-9]{2}[YZ][A-X]",
        // Digits where letters belong and vice versa
        "[0-9]{2}[0-9]{2}[A-X]{2}",
        "[A-R]{2}[A-Z]{2}[A-X]{2}",
        Just(String::new()),
    ]
}

proptest! {
    #[test]
    fn prop_coordinates_round_trip(raw in valid_locator()) {
        let loc = Locator::parse(&raw);
        prop_assert!(loc.is_valid());

        let (lat, lon) = loc.to_coordinates();
        let back = Locator::from_coordinates(lat, lon);

        // PROPERTY: the subsquare centre resolves to the same locator
        prop_assert_eq!(back.raw(), raw.to_ascii_uppercase());
    }

    #[test]
    fn prop_invalid_locators_have_no_geometry(raw in invalid_locator(), other in valid_locator()) {
        let bad = Locator::parse(&raw);
        let good = Locator::parse(&other);

        prop_assert!(!bad.is_valid());
        prop_assert_eq!(bad.to_coordinates(), (0.0, 0.0));
        prop_assert!(bad.bearing_to(&good).is_none());
        prop_assert!(good.distance_km_to(&bad).is_none());
        prop_assert!(raw.parse::<Locator>().is_err());
    }

    #[test]
    fn prop_bearing_and_distance_are_bounded(a in valid_locator(), b in valid_locator()) {
        let a = Locator::parse(&a);
        let b = Locator::parse(&b);

        let bearing = a.bearing_to(&b).unwrap_or(f64::NAN);
        prop_assert!((0.0..360.0).contains(&bearing));

        let km = a.distance_km_to(&b).unwrap_or(f64::NAN);
        // Half the Earth's circumference is the longest great-circle path
        prop_assert!((0.0..=20_016.0).contains(&km));
    }
}
