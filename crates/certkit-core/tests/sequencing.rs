//! Sequence invariants across structural edits: after any chain of
//! add/delete/move operations, page sequences per template and element
//! sequences per page are exactly {1..N}.

use certkit_core::store::TemplateStore;
use certkit_core::{ElementFactory, MoveDirection, MoveKind, SqliteStore, Template};
use uuid::Uuid;

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("in-memory store should open")
}

fn text_data() -> serde_json::Value {
    serde_json::json!({"content": "hello", "y": 40.0})
}

fn page_sequences(store: &SqliteStore, template: &Template) -> Vec<u32> {
    store
        .list_pages(template.id())
        .expect("list_pages should succeed")
        .iter()
        .map(|p| p.sequence)
        .collect()
}

fn element_sequences(store: &SqliteStore, page_id: Uuid) -> Vec<u32> {
    store
        .list_elements(page_id)
        .expect("list_elements should succeed")
        .iter()
        .map(|e| e.sequence)
        .collect()
}

#[test]
fn add_page_starts_at_one_and_appends() {
    let mut store = store();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let first = template.add_page(&mut store).unwrap();
    assert_eq!(store.get_page(first).unwrap().unwrap().sequence, 1);

    let second = template.add_page(&mut store).unwrap();
    assert_eq!(store.get_page(second).unwrap().unwrap().sequence, 2);

    assert_eq!(page_sequences(&store, &template), vec![1, 2]);
}

#[test]
fn delete_page_compacts_and_boundary_move_is_noop() {
    // The concrete scenario: two pages, delete the first, the survivor
    // renumbers to 1 and cannot move further up.
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let first = template.add_page(&mut store).unwrap();
    let second = template.add_page(&mut store).unwrap();

    template.delete_page(&mut store, &factory, first).unwrap();

    let survivor = store.get_page(second).unwrap().unwrap();
    assert_eq!(survivor.sequence, 1);

    template
        .move_item(&mut store, MoveKind::Page, second, MoveDirection::Up)
        .unwrap();
    assert_eq!(store.get_page(second).unwrap().unwrap().sequence, 1);

    store.check_integrity().unwrap();
}

#[test]
fn delete_page_decrements_only_higher_siblings() {
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let p1 = template.add_page(&mut store).unwrap();
    let p2 = template.add_page(&mut store).unwrap();
    let p3 = template.add_page(&mut store).unwrap();
    let p4 = template.add_page(&mut store).unwrap();

    template.delete_page(&mut store, &factory, p2).unwrap();

    assert_eq!(store.get_page(p1).unwrap().unwrap().sequence, 1);
    assert!(store.get_page(p2).unwrap().is_none());
    assert_eq!(store.get_page(p3).unwrap().unwrap().sequence, 2);
    assert_eq!(store.get_page(p4).unwrap().unwrap().sequence, 3);
}

#[test]
fn delete_page_removes_its_elements() {
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let page = template.add_page(&mut store).unwrap();
    let e1 = template
        .add_element(&mut store, page, "text", text_data())
        .unwrap();
    let e2 = template
        .add_element(&mut store, page, "text", text_data())
        .unwrap();

    template.delete_page(&mut store, &factory, page).unwrap();

    assert!(store.get_element(e1).unwrap().is_none());
    assert!(store.get_element(e2).unwrap().is_none());
}

#[test]
fn delete_missing_page_is_not_found() {
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let result = template.delete_page(&mut store, &factory, Uuid::new_v4());
    assert!(matches!(result, Err(certkit_core::Error::NotFound(_))));
}

#[test]
fn move_page_swaps_exactly_two() {
    let mut store = store();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let p1 = template.add_page(&mut store).unwrap();
    let p2 = template.add_page(&mut store).unwrap();
    let p3 = template.add_page(&mut store).unwrap();

    template
        .move_item(&mut store, MoveKind::Page, p2, MoveDirection::Down)
        .unwrap();

    assert_eq!(store.get_page(p1).unwrap().unwrap().sequence, 1);
    assert_eq!(store.get_page(p2).unwrap().unwrap().sequence, 3);
    assert_eq!(store.get_page(p3).unwrap().unwrap().sequence, 2);

    store.check_integrity().unwrap();
}

#[test]
fn move_last_page_down_is_noop() {
    let mut store = store();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let p1 = template.add_page(&mut store).unwrap();
    let p2 = template.add_page(&mut store).unwrap();

    template
        .move_item(&mut store, MoveKind::Page, p2, MoveDirection::Down)
        .unwrap();

    assert_eq!(store.get_page(p1).unwrap().unwrap().sequence, 1);
    assert_eq!(store.get_page(p2).unwrap().unwrap().sequence, 2);
}

#[test]
fn element_sequencing_mirrors_page_sequencing() {
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();
    let page = template.add_page(&mut store).unwrap();

    let e1 = template
        .add_element(&mut store, page, "text", text_data())
        .unwrap();
    let e2 = template
        .add_element(&mut store, page, "text", text_data())
        .unwrap();
    let e3 = template
        .add_element(&mut store, page, "text", text_data())
        .unwrap();
    assert_eq!(element_sequences(&store, page), vec![1, 2, 3]);

    // Delete the middle element: the gap closes.
    template.delete_element(&mut store, &factory, e2).unwrap();
    assert_eq!(store.get_element(e1).unwrap().unwrap().sequence, 1);
    assert_eq!(store.get_element(e3).unwrap().unwrap().sequence, 2);

    // Swap the remaining two.
    template
        .move_item(&mut store, MoveKind::Element, e1, MoveDirection::Down)
        .unwrap();
    assert_eq!(store.get_element(e1).unwrap().unwrap().sequence, 2);
    assert_eq!(store.get_element(e3).unwrap().unwrap().sequence, 1);

    // Boundary moves change nothing.
    template
        .move_item(&mut store, MoveKind::Element, e3, MoveDirection::Up)
        .unwrap();
    assert_eq!(store.get_element(e3).unwrap().unwrap().sequence, 1);

    store.check_integrity().unwrap();
}

#[test]
fn element_sequences_are_scoped_per_page() {
    let mut store = store();
    let template = Template::create(&mut store, "T1", 1).unwrap();
    let page_a = template.add_page(&mut store).unwrap();
    let page_b = template.add_page(&mut store).unwrap();

    template
        .add_element(&mut store, page_a, "text", text_data())
        .unwrap();
    template
        .add_element(&mut store, page_b, "text", text_data())
        .unwrap();
    template
        .add_element(&mut store, page_b, "text", text_data())
        .unwrap();

    assert_eq!(element_sequences(&store, page_a), vec![1]);
    assert_eq!(element_sequences(&store, page_b), vec![1, 2]);
}

#[test]
fn mixed_edit_chain_keeps_sequences_dense() {
    let mut store = store();
    let factory = ElementFactory::with_builtins();
    let template = Template::create(&mut store, "T1", 1).unwrap();

    let mut pages = Vec::new();
    for _ in 0..5 {
        pages.push(template.add_page(&mut store).unwrap());
    }

    template.delete_page(&mut store, &factory, pages[1]).unwrap();
    template
        .move_item(&mut store, MoveKind::Page, pages[4], MoveDirection::Up)
        .unwrap();
    template.delete_page(&mut store, &factory, pages[0]).unwrap();
    template
        .move_item(&mut store, MoveKind::Page, pages[2], MoveDirection::Down)
        .unwrap();

    let mut sequences = page_sequences(&store, &template);
    sequences.sort_unstable();
    assert_eq!(sequences, vec![1, 2, 3]);

    store.check_integrity().unwrap();
}
