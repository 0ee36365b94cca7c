//! Property-based tests for tag-set parsing and encoding

use baas_sdk::TagSet;
use proptest::prelude::*;

fn arb_tag() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_ ]{0,8}"
}

proptest! {
    #[test]
    fn prop_parse_encode_is_stable(tags in prop::collection::vec(arb_tag(), 0..8)) {
        let raw = tags.join(",");
        let parsed = TagSet::parse(&raw);
        let reparsed = TagSet::parse(&parsed.encode());
        prop_assert_eq!(&parsed, &reparsed);
        prop_assert_eq!(parsed.encode(), reparsed.encode());
    }

    #[test]
    fn prop_order_does_not_matter(mut tags in prop::collection::vec(arb_tag(), 0..8)) {
        let forward = TagSet::parse(&tags.join(","));
        tags.reverse();
        let backward = TagSet::parse(&tags.join(","));
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_encoding_has_no_blank_entries(tags in prop::collection::vec(arb_tag(), 0..8)) {
        let encoded = TagSet::parse(&tags.join(",")).encode();
        if !encoded.is_empty() {
            prop_assert!(encoded.split(',').all(|t| !t.trim().is_empty()));
        }
    }

    #[test]
    fn prop_from_tags_matches_parse(tags in prop::collection::vec("[a-z]{1,6}", 0..6)) {
        let built = TagSet::from_tags(&tags).unwrap();
        prop_assert_eq!(built, TagSet::parse(&tags.join(",")));
    }
}
