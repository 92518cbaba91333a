/// Unit tests for TypeKey

use lineage_di::{key_of_type, TypeKey};
use std::collections::HashMap;

struct Mailer;

#[test]
fn test_key_from_name() {
    let key = TypeKey::new("app::Mailer");
    assert_eq!(key.as_str(), "app::Mailer");
    assert_eq!(key.to_string(), "app::Mailer");
    assert_eq!(format!("{:?}", key), "TypeKey(app::Mailer)");
}

#[test]
fn test_key_conversions_agree() {
    let owned = String::from("mailer");
    let keys = [
        TypeKey::from("mailer"),
        TypeKey::from(owned.clone()),
        TypeKey::from(&owned),
        TypeKey::from(&TypeKey::new("mailer")),
    ];
    for key in &keys {
        assert_eq!(key, &keys[0]);
    }
}

#[test]
fn test_key_of_type_uses_type_name() {
    let key = key_of_type::<Mailer>();
    assert_eq!(key, TypeKey::of::<Mailer>());
    assert_eq!(key.as_str(), std::any::type_name::<Mailer>());
    assert_ne!(key, TypeKey::of::<String>());
}

#[test]
fn test_key_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(TypeKey::new("cache"), 1);
    assert_eq!(map.get("cache"), Some(&1));
    assert_eq!(map.get("other"), None);
}

#[test]
fn test_key_ordering_is_by_name() {
    let mut keys = vec![TypeKey::new("b"), TypeKey::new("a"), TypeKey::new("c")];
    keys.sort();
    let names: Vec<&str> = keys.iter().map(TypeKey::as_str).collect();
    assert_eq!(names, ["a", "b", "c"]);
}
