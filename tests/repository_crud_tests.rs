//! Repository CRUD integration tests
//!
//! Run with: cargo test --test repository_crud_tests

use memorepo::{
    DB_CHANGES_NOT_SAVED, DataSource, Entity, KeyValue, RepoError, RepositoryService,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Person {
    id: i32,
    name: String,
    age: i32,
}

fn person(name: &str, age: i32) -> Person {
    Person {
        id: 0,
        name: name.to_string(),
        age,
    }
}

fn setup() -> RepositoryService<Person> {
    let source = DataSource::in_memory("crud");
    RepositoryService::<Person>::new(&source).unwrap()
}

fn assert_not_saved(err: RepoError) {
    match err {
        RepoError::Persistence(msg) => assert_eq!(msg, DB_CHANGES_NOT_SAVED),
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[test]
fn test_insert_assigns_sequential_int_keys() {
    let repo = setup();

    assert_eq!(repo.insert(person("Ada", 36)).unwrap(), KeyValue::Int(1));
    assert_eq!(repo.insert(person("Alan", 41)).unwrap(), KeyValue::Int(2));

    let ada = repo.get(1).unwrap().unwrap();
    assert_eq!(ada.name, "Ada");
    assert_eq!(repo.get_all().unwrap().len(), 2);
}

#[test]
fn test_insert_ignores_caller_supplied_int_key() {
    let repo = setup();
    let mut model = person("Grace", 85);
    model.id = 42;

    assert_eq!(repo.insert(model).unwrap(), KeyValue::Int(1));
    assert!(repo.get(42).unwrap().is_none());
}

#[test]
fn test_get_missing_returns_none() {
    let repo = setup();
    assert!(repo.get(7).unwrap().is_none());
}

#[test]
fn test_get_with_converter_sees_absence() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();

    let name = repo
        .get_with(1, |found| found.map(|p| p.name).unwrap_or_default())
        .unwrap();
    assert_eq!(name, "Ada");

    let missing = repo.get_with(9, |found| found.is_none()).unwrap();
    assert!(missing);
}

#[test]
fn test_get_where_returns_first_match() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();
    repo.insert(person("Grace", 85)).unwrap();

    let found = repo.get_where(|p| p.age > 40).unwrap().unwrap();
    assert_eq!(found.name, "Alan");
    assert!(repo.get_where(|p| p.age > 100).unwrap().is_none());
}

#[test]
fn test_filter_and_indexed_filter() {
    let repo = setup();
    for (name, age) in [("Ada", 36), ("Alan", 41), ("Grace", 85), ("Linus", 20)] {
        repo.insert(person(name, age)).unwrap();
    }

    let adults: Vec<String> = repo
        .filter(|p| p.age >= 30)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(adults, vec!["Ada", "Alan", "Grace"]);

    let even_positions = repo.filter_indexed(|_, index| index % 2 == 0).unwrap();
    assert_eq!(even_positions.len(), 2);
    assert_eq!(even_positions[1].name, "Grace");

    assert!(repo.first_or_default(|p| p.name == "Nobody").unwrap().is_none());
}

#[test]
fn test_update_overwrites_full_row() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();

    repo.update(Person {
        id: 1,
        name: "Ada Lovelace".to_string(),
        age: 37,
    })
    .unwrap();

    let stored = repo.get(1).unwrap().unwrap();
    assert_eq!(stored.name, "Ada Lovelace");
    assert_eq!(stored.age, 37);
}

#[test]
fn test_update_missing_entity_fails() {
    let repo = setup();
    let err = repo
        .update(Person {
            id: 5,
            name: "Ghost".to_string(),
            age: 0,
        })
        .unwrap_err();
    assert_not_saved(err);
}

#[test]
fn test_update_where_replaces_first_match() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();

    repo.update_where(
        |p| p.name == "Alan",
        Person {
            id: 2,
            name: "Alan Turing".to_string(),
            age: 41,
        },
    )
    .unwrap();
    assert_eq!(repo.get(2).unwrap().unwrap().name, "Alan Turing");

    let err = repo
        .update_where(|p| p.age > 100, person("Nobody", 0))
        .unwrap_err();
    assert_not_saved(err);
}

#[test]
fn test_delete_by_key() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();

    repo.delete(1).unwrap();

    assert!(repo.get(1).unwrap().is_none());
    assert_eq!(
        repo.get_all().unwrap(),
        vec![Person {
            id: 2,
            name: "Alan".to_string(),
            age: 41,
        }]
    );
}

#[test]
fn test_delete_missing_entity_fails() {
    let repo = setup();
    assert_not_saved(repo.delete(3).unwrap_err());
}

#[test]
fn test_delete_missing_entity_leaves_store_unchanged() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();
    let before = repo.get_all().unwrap();

    assert_not_saved(repo.delete(3).unwrap_err());

    assert_eq!(repo.get_all().unwrap(), before);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
struct Member {
    id: i32,
    name: String,
}

#[test]
fn test_serde_renamed_entity_round_trips() {
    let repo = RepositoryService::<Member>::new(&DataSource::in_memory("renamed")).unwrap();
    assert_eq!(repo.key_descriptor().property_name(), "Id");

    let a = repo.insert(Member { id: 0, name: "A".to_string() }).unwrap();
    let b = repo.insert(Member { id: 0, name: "B".to_string() }).unwrap();
    assert_eq!((a, b), (KeyValue::Int(1), KeyValue::Int(2)));

    repo.delete(1).unwrap();
    assert_eq!(
        repo.get_all().unwrap(),
        vec![Member { id: 2, name: "B".to_string() }]
    );
    assert!(repo.table_schema().get_column("Name").is_some());
}

#[test]
fn test_delete_where_removes_first_match_only() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();
    repo.insert(person("Grace", 85)).unwrap();

    repo.delete_where(|p| p.age > 40).unwrap();

    let names: Vec<String> = repo.get_all().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Ada", "Grace"]);

    assert_not_saved(repo.delete_where(|p| p.age > 100).unwrap_err());
}

#[test]
fn test_insert_after_delete_can_reuse_live_key() {
    let repo = setup();
    repo.insert(person("Ada", 36)).unwrap();
    repo.insert(person("Alan", 41)).unwrap();
    repo.insert(person("Grace", 85)).unwrap();
    repo.delete(1).unwrap();

    // Two rows remain, so the next key is 3 again.
    assert_eq!(repo.insert(person("Linus", 20)).unwrap(), KeyValue::Int(3));

    let holders: Vec<Person> = repo.filter(|p| p.id == 3).unwrap();
    assert_eq!(holders.len(), 2);
    // Lookups by key resolve to the first row in storage order.
    assert_eq!(repo.get(3).unwrap().unwrap().name, "Grace");
}

#[test]
fn test_services_share_storage_through_data_source() {
    let source = DataSource::in_memory("shared");
    let writer = RepositoryService::<Person>::new(&source).unwrap();
    let reader = RepositoryService::<Person>::new(&source).unwrap();

    writer.insert(person("Ada", 36)).unwrap();
    assert_eq!(reader.get_all().unwrap().len(), 1);

    let other = RepositoryService::<Person>::new(&DataSource::in_memory("shared")).unwrap();
    assert!(other.get_all().unwrap().is_empty());
}

#[test]
fn test_table_name_follows_type_name() {
    let repo = setup();
    assert_eq!(repo.table_name(), "Persons");
    assert_eq!(repo.key_descriptor().property_name(), "id");
}
