//! Key resolution and key assignment
//!
//! Run with: cargo test --test key_policy_tests

use memorepo::{
    DataSource, Entity, KeyKind, KeyResolver, KeyValue, RepoError, RepositoryService,
    TypedRepositoryService, entity::INVALID_KEY_MESSAGE,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Order {
    order_id: Uuid,
    total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Country {
    iso_id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Ticket {
    title: String,
    #[entity(key)]
    ticket_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Label {
    // First field is taken as the key and its name has no "id".
    text: String,
    label_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Reading {
    id: f64,
    value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(table = "Accounts")]
struct Account {
    id: i32,
    owner: String,
    #[entity(not_mapped)]
    #[serde(default)]
    session_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Draft {
    id: i32,
    body: String,
    #[serde(skip)]
    scratch: String,
}

fn source() -> DataSource {
    DataSource::in_memory("keys")
}

fn assert_invalid_key<T: Entity>() {
    match RepositoryService::<T>::new(&source()) {
        Err(RepoError::Validation(msg)) => assert_eq!(msg, INVALID_KEY_MESSAGE),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_guid_key_is_written_to_entity() {
    let repo = RepositoryService::<Order>::new(&source()).unwrap();
    let key = repo
        .insert(Order {
            order_id: Uuid::nil(),
            total: 12.5,
        })
        .unwrap();

    let KeyValue::Guid(id) = key else {
        panic!("expected a GUID key, got {key:?}");
    };
    assert!(!id.is_nil());

    let stored = repo.get(id).unwrap().unwrap();
    assert_eq!(stored.order_id, id);
    assert_eq!(stored.total, 12.5);
}

#[test]
fn test_guid_keys_are_distinct() {
    let repo = RepositoryService::<Order>::new(&source()).unwrap();
    let a = repo.insert(Order { order_id: Uuid::nil(), total: 1.0 }).unwrap();
    let b = repo.insert(Order { order_id: Uuid::nil(), total: 2.0 }).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_string_key_is_kept() {
    let repo = RepositoryService::<Country>::new(&source()).unwrap();
    let key = repo
        .insert(Country {
            iso_id: "PT".to_string(),
            name: "Portugal".to_string(),
        })
        .unwrap();

    assert_eq!(key, KeyValue::Text("PT".to_string()));
    assert_eq!(repo.get("PT").unwrap().unwrap().name, "Portugal");
}

#[test]
fn test_marked_key_wins_over_position() {
    let key = KeyResolver::resolve::<Ticket>().unwrap();
    assert_eq!(key.property_name(), "ticket_id");
    assert_eq!(key.property_type(), KeyKind::Int);

    let repo = RepositoryService::<Ticket>::new(&source()).unwrap();
    let key = repo
        .insert(Ticket {
            title: "broken build".to_string(),
            ticket_id: 0,
        })
        .unwrap();
    assert_eq!(key, KeyValue::Int(1));
}

#[test]
fn test_positional_key_without_id_in_name_is_rejected() {
    assert_invalid_key::<Label>();
}

#[test]
fn test_unsupported_key_type_is_rejected() {
    assert_invalid_key::<Reading>();
}

#[test]
fn test_not_mapped_field_is_not_persisted() {
    let repo = RepositoryService::<Account>::new(&source()).unwrap();
    assert_eq!(repo.table_name(), "Accounts");
    assert!(repo.table_schema().get_column("session_token").is_none());

    repo.insert(Account {
        id: 0,
        owner: "ada".to_string(),
        session_token: Some("secret".to_string()),
    })
    .unwrap();

    let stored = repo.get(1).unwrap().unwrap();
    assert_eq!(stored.owner, "ada");
    assert_eq!(stored.session_token, None);
}

#[test]
fn test_serde_skipped_field_is_not_mapped() {
    let repo = RepositoryService::<Draft>::new(&source()).unwrap();
    assert!(repo.table_schema().get_column("scratch").is_none());

    repo.insert(Draft {
        id: 0,
        body: "hello".to_string(),
        scratch: "work in progress".to_string(),
    })
    .unwrap();

    let stored = repo.get_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body, "hello");
    assert_eq!(stored[0].scratch, "");
}

#[test]
fn test_typed_repository_round_trip() {
    let repo = TypedRepositoryService::<Order, Uuid>::new(&source()).unwrap();
    let id: Uuid = repo.insert(Order { order_id: Uuid::nil(), total: 3.0 }).unwrap();

    assert_eq!(repo.get(id).unwrap().unwrap().total, 3.0);
    repo.delete(id).unwrap();
    assert!(repo.get(id).unwrap().is_none());
}

#[test]
fn test_typed_repository_rejects_mismatched_id_type() {
    let result = TypedRepositoryService::<Order, i32>::new(&source());
    assert!(matches!(result, Err(RepoError::Validation(_))));
}

#[test]
fn test_typed_repository_stubs() {
    let repo = TypedRepositoryService::<Country, String>::new(&source()).unwrap();
    let model = Country {
        iso_id: "NO".to_string(),
        name: "Norway".to_string(),
    };
    assert!(matches!(
        repo.update_where(|_| true, model),
        Err(RepoError::NotImplemented(_))
    ));
    assert!(matches!(repo.backup(None), Err(RepoError::NotImplemented(_))));
}
