use proptest::prelude::*;
use replistate_types::{Path, Error};
use serde_json::json;

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn empty_string_is_root() {
    let p = Path::parse("");
    assert!(p.is_root());
    assert_eq!(p.len(), 0);
    assert_eq!(p.to_string(), "");
}

#[test]
fn parse_splits_on_delimiter() {
    let p = Path::parse("Resources/Cash");
    assert_eq!(p.segments(), &["Resources".to_string(), "Cash".to_string()]);
    assert_eq!(p.last(), Some("Cash"));
}

#[test]
fn parse_drops_empty_segments() {
    assert_eq!(Path::parse("/Resources//Cash/"), Path::parse("Resources/Cash"));
    assert!(Path::parse("///").is_root());
}

#[test]
fn from_segments_rejects_delimiter() {
    let err = Path::from_segments(["a", "b/c"]).unwrap_err();
    assert!(matches!(err, Error::InvalidSegment(s) if s == "b/c"));
}

#[test]
fn from_segments_rejects_empty() {
    assert!(Path::from_segments(["a", ""]).is_err());
}

// ── Structure ────────────────────────────────────────────────────

#[test]
fn parent_and_child() {
    let p = Path::parse("a/b/c");
    assert_eq!(p.parent(), Some(Path::parse("a/b")));
    assert_eq!(Path::parse("a/b").child("c"), p);
    assert_eq!(Path::root().parent(), None);
}

#[test]
fn ancestors_are_root_first_and_inclusive() {
    let p = Path::parse("Resources/Cash");
    let chain: Vec<String> = p.ancestors().map(|a| a.to_string()).collect();
    assert_eq!(chain, vec!["", "Resources", "Resources/Cash"]);
    assert_eq!(p.ancestors().len(), 3);
}

#[test]
fn root_ancestors_is_only_root() {
    let chain: Vec<Path> = Path::root().ancestors().collect();
    assert_eq!(chain, vec![Path::root()]);
}

#[test]
fn starts_with_is_segment_wise() {
    let p = Path::parse("Inventory/Sword");
    assert!(p.starts_with(&Path::parse("Inventory")));
    assert!(p.starts_with(&Path::root()));
    assert!(p.starts_with(&p));
    assert!(!Path::parse("InventoryX/Sword").starts_with(&Path::parse("Inventory")));
}

#[test]
fn strip_prefix_returns_remainder() {
    let p = Path::parse("Inventory/Sword/Level");
    assert_eq!(
        p.strip_prefix(&Path::parse("Inventory")),
        Some(Path::parse("Sword/Level"))
    );
    assert_eq!(p.strip_prefix(&Path::parse("Resources")), None);
}

// ── Resolution ───────────────────────────────────────────────────

#[test]
fn resolve_objects_and_arrays() {
    let data = json!({"Resources": {"Cash": 5}, "Slots": [10, 20]});
    assert_eq!(Path::parse("Resources/Cash").resolve(&data), Some(&json!(5)));
    assert_eq!(Path::parse("Slots/1").resolve(&data), Some(&json!(20)));
    assert_eq!(Path::parse("Slots/9").resolve(&data), None);
    assert_eq!(Path::parse("Resources/Cash/Deeper").resolve(&data), None);
    assert_eq!(Path::root().resolve(&data), Some(&data));
}

#[test]
fn resolve_mut_allows_in_place_edit() {
    let mut data = json!({"Resources": {"Cash": 5}});
    *Path::parse("Resources/Cash").resolve_mut(&mut data).unwrap() = json!(7);
    assert_eq!(data, json!({"Resources": {"Cash": 7}}));
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serializes_as_joined_string() {
    let p = Path::parse("a/b");
    assert_eq!(serde_json::to_string(&p).unwrap(), "\"a/b\"");
    let back: Path = serde_json::from_str("\"a/b\"").unwrap();
    assert_eq!(back, p);
}

proptest! {
    #[test]
    fn display_parse_is_identity(segs in prop::collection::vec("[A-Za-z0-9_]{1,8}", 0..6)) {
        let p = Path::from_segments(segs).unwrap();
        prop_assert_eq!(Path::parse(&p.to_string()), p);
    }

    #[test]
    fn every_ancestor_is_a_prefix(segs in prop::collection::vec("[a-z]{1,4}", 0..6)) {
        let p = Path::from_segments(segs).unwrap();
        for (depth, ancestor) in p.ancestors().enumerate() {
            prop_assert_eq!(ancestor.len(), depth);
            prop_assert!(p.starts_with(&ancestor));
        }
    }
}
