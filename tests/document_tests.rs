//! Document Tests
//!
//! Binding, mutation and save behavior of whole documents against bundled
//! and inline schemas.

use std::fs;
use std::sync::Arc;

use jsonwidget::bundled;
use jsonwidget::storage::{self, StorageFormat};
use jsonwidget::{
    Command, DocumentTree, EditSession, EditorConfig, JsonWidgetError, Key, NodePath, NodeView, OrderMap,
    OutputOptions, Renderable, SchemaFormat, SchemaSource, SchemaTree,
};
use serde_json::{json, Value};

fn schema(raw: Value) -> Arc<SchemaTree> {
    let order = OrderMap::from_value(&raw);
    Arc::new(SchemaTree::parse(&raw, &order, SchemaFormat::V2).unwrap())
}

fn string_list() -> Arc<SchemaTree> {
    schema(json!({"type": "array", "items": {"type": "string"}}))
}

fn addressbook() -> DocumentTree {
    let schema = bundled::bundled("addressbook")
        .unwrap()
        .load(SchemaFormat::V2)
        .unwrap();
    let (data, order) = storage::parse_str(include_str!("fixtures/addressbook.json"), StorageFormat::Json).unwrap();
    DocumentTree::new(&data, Arc::new(schema), Some(&order)).unwrap()
}

fn index_keys(tree: &DocumentTree) -> Vec<Option<Key>> {
    tree.children(tree.root())
        .unwrap()
        .into_iter()
        .map(|id| tree.node(id).unwrap().key().cloned())
        .collect()
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn test_binding_reproduces_compatible_document() {
    let schema = schema(json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "score": {"type": "number"},
            "labels": {"type": "array", "items": {"type": "string"}},
            "meta": {"type": "any"}
        }
    }));
    let data = json!({
        "id": 4,
        "score": 7,
        "labels": ["a", "b"],
        "meta": {"deep": [1, {"x": null}], "flag": true}
    });
    let tree = DocumentTree::new(&data, schema, None).unwrap();
    assert_eq!(tree.to_value().unwrap(), data);
}

#[test]
fn test_addressbook_completes_required_fields() {
    let tree = addressbook();
    let data = tree.to_value().unwrap();

    assert_eq!(data[1]["givenName"], "");
    assert_eq!(data[1]["familyName"], "Babbage");
    assert_eq!(data[0]["phoneNumber"][1], json!({"kind": "work", "number": ""}));
    assert_eq!(data[0]["pronouns"], "she/her");
}

#[test]
fn test_addressbook_titles_and_affordances() {
    let tree = addressbook();
    let root = tree.root();
    assert_eq!(tree.title(root).unwrap(), "Address Book");

    let first = tree.lookup(&NodePath::parse("/0")).unwrap();
    assert_eq!(tree.title(first).unwrap(), "Entry #1");
    let phone = tree.lookup(&NodePath::parse("/0/phoneNumber/1")).unwrap();
    assert_eq!(tree.title(phone).unwrap(), "Phone #2");

    let family = tree.lookup(&NodePath::parse("/1/familyName")).unwrap();
    let nickname = tree.lookup(&NodePath::parse("/1/nickname")).unwrap();
    assert!(!tree.is_deletable(family).unwrap());
    assert!(tree.is_deletable(nickname).unwrap());

    let second = tree.lookup(&NodePath::parse("/1")).unwrap();
    assert_eq!(
        tree.available_keys(second).unwrap(),
        vec![
            Key::field("phoneNumber"),
            Key::field("email"),
            Key::field("address"),
            Key::field("newkey"),
        ]
    );
}

#[test]
fn test_authored_order_survives_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.json");
    fs::write(&path, include_str!("fixtures/addressbook.json")).unwrap();

    let mut tree = addressbook();
    tree.save(&path, &OutputOptions::compact()).unwrap();

    let (saved, order) = storage::read(&path).unwrap();
    assert_eq!(
        order.item(0).unwrap().keys(),
        vec!["familyName", "givenName", "phoneNumber", "email", "pronouns"]
    );
    assert_eq!(order.item(1).unwrap().keys(), vec!["familyName", "nickname", "givenName"]);
    assert_eq!(saved, tree.to_value().unwrap());
}

#[test]
fn test_type_mismatch_names_path() {
    let schema = schema(json!({
        "type": "object",
        "properties": {"items": {"type": "array", "items": {"type": "integer"}}}
    }));
    let err = DocumentTree::new(&json!({"items": [1, "2"]}), schema, None).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Validation error at /items/1: found string, expected integer");
}

// =============================================================================
// Mutation
// =============================================================================

#[test]
fn test_insert_renumbers() {
    let mut tree = DocumentTree::new(&json!(["a", "b", "c"]), string_list(), None).unwrap();
    let root = tree.root();
    tree.insert_child(root, 1).unwrap();

    assert_eq!(tree.to_value().unwrap(), json!(["a", "", "b", "c"]));
    assert_eq!(index_keys(&tree), (0..4).map(|i| Some(Key::Index(i))).collect::<Vec<_>>());
}

#[test]
fn test_delete_renumbers() {
    let mut tree = DocumentTree::new(&json!(["a", "x", "b", "c"]), string_list(), None).unwrap();
    let root = tree.root();
    tree.delete_child(root, Key::Index(1)).unwrap();

    assert_eq!(tree.to_value().unwrap(), json!(["a", "b", "c"]));
    assert_eq!(index_keys(&tree), (0..3).map(|i| Some(Key::Index(i))).collect::<Vec<_>>());
}

#[test]
fn test_unchanged_set_is_not_an_edit() {
    let mut tree = addressbook();
    let nickname = tree.lookup(&NodePath::parse("/1/nickname")).unwrap();
    let current = tree.data(nickname).unwrap();

    assert!(!tree.set_data(nickname, current).unwrap());
    assert_eq!(tree.edit_count(), 0);
    assert!(tree.set_data(nickname, json!("Chuck")).unwrap());
    assert_eq!(tree.edit_count(), 1);
}

#[test]
fn test_saved_state_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.json");
    let mut tree = DocumentTree::new(&json!(["a"]), string_list(), None).unwrap();
    let root = tree.root();

    tree.save(&path, &OutputOptions::default()).unwrap();
    assert!(tree.is_saved());
    tree.add_child(root, Key::Index(1)).unwrap();
    assert!(!tree.is_saved());
    tree.save(&path, &OutputOptions::default()).unwrap();
    assert!(tree.is_saved());
}

#[test]
fn test_placeholder_keys_never_collide() {
    let schema = schema(json!({
        "type": "object",
        "properties": {"newkey1": {"type": "string"}},
        "additionalProperties": true
    }));
    let mut tree = DocumentTree::new(&json!({"newkey": 1}), schema, None).unwrap();
    let root = tree.root();

    for _ in 0..3 {
        let keys = tree.available_keys(root).unwrap();
        let present = tree.child_keys(root).unwrap();
        let fresh = keys.last().cloned().unwrap();
        assert!(!present.contains(&fresh));
        assert_ne!(fresh, Key::field("newkey1"));
        tree.add_child(root, fresh).unwrap();
    }
    assert_eq!(
        tree.child_keys(root).unwrap(),
        vec![
            Key::field("newkey"),
            Key::field("newkey2"),
            Key::field("newkey3"),
            Key::field("newkey4"),
        ]
    );
}

#[test]
fn test_sole_required_item_is_not_deletable() {
    let schema = schema(json!({"type": "array", "items": {"type": "string", "optional": false}}));
    let mut tree = DocumentTree::new(&json!(["only"]), schema, None).unwrap();
    let root = tree.root();
    let first = tree.children(root).unwrap()[0];

    assert!(!tree.is_deletable(first).unwrap());
    assert!(tree.delete_child(root, Key::Index(0)).is_err());

    tree.add_child(root, Key::Index(1)).unwrap();
    assert!(tree.is_deletable(first).unwrap());
}

#[test]
fn test_failed_command_leaves_document_untouched() {
    let mut tree = addressbook();
    let before = tree.to_value().unwrap();

    let command = Command::SetValue {
        path: NodePath::parse("/0/phoneNumber/0/kind"),
        value: json!("pager"),
    };
    let err = tree.apply(&command).unwrap_err();
    assert!(matches!(err, JsonWidgetError::EnumViolation { .. }));
    assert_eq!(tree.to_value().unwrap(), before);
    assert!(tree.is_saved());
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn test_session_edits_yaml_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.yaml");
    fs::write(&path, include_str!("fixtures/inventory.yaml")).unwrap();

    let mut session = EditSession::open(&path, SchemaSource::Generated, EditorConfig::default()).unwrap();
    let commands: Vec<Command> = serde_json::from_value(json!([
        {"op": "set_value", "path": "/bins/1/count", "value": 5},
        {"op": "insert_child", "path": "/bins", "index": 0},
        {"op": "set_value", "path": "/active", "value": false}
    ]))
    .unwrap();
    assert_eq!(session.apply_all(&commands).unwrap(), 3);
    session.save().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("warehouse: North\n"));
    let (saved, _) = storage::read(&path).unwrap();
    // generated schemas mark nothing required, so a new bin starts empty
    assert_eq!(saved["bins"][0], json!({}));
    assert_eq!(saved["bins"][2]["count"], 5);
    assert_eq!(saved["active"], false);
}

#[test]
fn test_outline_of_bundled_example() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.json");
    fs::write(&path, r#"{"name": "demo", "tags": ["x"], "note": "extra"}"#).unwrap();

    let session = EditSession::open(
        &path,
        SchemaSource::Named("datatype-example".to_string()),
        EditorConfig::default(),
    )
    .unwrap();
    let lines = NodeView::root(session.tree()).render().unwrap();
    assert_eq!(
        lines,
        vec![
            "Datatype example",
            "  Name: demo",
            "  Tags",
            "    Tag #1: x",
            "  Extra: extra",
        ]
    );
}
