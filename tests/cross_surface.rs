//! Integration tests for convergence between editing surfaces.

use std::sync::Arc;

use attune::profile::{EditorState, ProfileKind};
use attune::sync::{ChangeCause, MemorySnapshotStore, SnapshotStore, SyncBus};
use attune::{Config, Session, migrate};
use serde_json::json;

fn surface(bus: &SyncBus, store: &MemorySnapshotStore) -> Session {
    Session::new(EditorState::default())
        .with_bus(bus.clone())
        .with_store(Arc::new(store.clone()))
}

#[test]
fn test_edit_on_one_surface_reaches_the_other() {
    let bus = Config::default().sync_bus();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    form.apply_edit("subject.identity.name", json!("Alex")).unwrap();
    form.apply_edit("subject.neurodivergence.+", json!("Night owl")).unwrap();

    assert!(text.poll_sync().unwrap());
    assert_eq!(text.get_model(ProfileKind::Subject).name(), "Alex");
    assert_eq!(text.serialize(ProfileKind::Subject), form.serialize(ProfileKind::Subject));
    assert_eq!(text.state(), form.state());

    // Nothing further pending; the form never sees its own notices.
    assert!(!text.poll_sync().unwrap());
    assert!(!form.poll_sync().unwrap());
}

#[test]
fn test_remote_changes_are_not_undoable() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    form.apply_edit("persona.identity.name", json!("Sage")).unwrap();
    assert!(text.poll_sync().unwrap());

    assert!(!text.history().can_undo());
    assert!(!text.undo());
    assert_eq!(text.get_model(ProfileKind::Persona).name(), "Sage");

    // The originating surface can still undo, and the undo propagates.
    assert!(form.undo());
    assert!(text.poll_sync().unwrap());
    assert_eq!(text.get_model(ProfileKind::Persona).name(), "");
}

#[test]
fn test_selection_is_not_clobbered() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    text.apply_edit("ui.section", json!("about")).unwrap();
    form.apply_edit("ui.section", json!("values")).unwrap();
    form.apply_edit("subject.about", json!("Likes maps.")).unwrap();

    assert!(text.poll_sync().unwrap());
    assert_eq!(text.state().ui.selected_section.as_deref(), Some("about"));
    assert_eq!(form.state().ui.selected_section.as_deref(), Some("values"));
    assert_eq!(text.get_model(ProfileKind::Subject).prose("about"), "Likes maps.");
}

#[test]
fn test_selection_alone_is_not_broadcast() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    let report = form.apply_edit("ui.section", json!("tone")).unwrap();
    assert!(!report.recorded);
    assert!(!text.poll_sync().unwrap());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_slow_surface_converges_on_latest() {
    let bus = SyncBus::with_capacity(4);
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    for i in 0..20 {
        form.apply_edit("subject.about", json!(format!("draft {}", i))).unwrap();
    }

    assert!(text.poll_sync().unwrap());
    assert_eq!(text.get_model(ProfileKind::Subject).prose("about"), "draft 19");
}

#[test]
fn test_store_holds_latest_snapshot_for_new_surfaces() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    form.apply_edit("subject.identity.name", json!("Alex")).unwrap();
    form.apply_edit("ui.kind", json!("persona")).unwrap();

    let late = Session::restore(Arc::new(store.clone())).unwrap().with_bus(bus.clone());
    assert_eq!(late.get_model(ProfileKind::Subject).name(), "Alex");
    assert_eq!(late.state().ui.active_kind, ProfileKind::Persona);

    let raw = store.load().unwrap().unwrap();
    assert_eq!(&migrate(raw).unwrap(), form.state());
}

#[test]
fn test_renderers_see_every_cause() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);
    let mut renderer = text.subscribe().unwrap();

    form.apply_edit("subject.identity.name", json!("Alex")).unwrap();
    text.poll_sync().unwrap();

    let causes: Vec<ChangeCause> = std::iter::from_fn(|| renderer.try_recv()).map(|n| n.cause).collect();
    assert_eq!(causes, vec![ChangeCause::Edit, ChangeCause::RemoteSync]);

    // A RemoteSync notice never triggers another merge on the form.
    assert!(!form.poll_sync().unwrap());
}

#[test]
fn test_custom_option_keys_survive_convergence() {
    let bus = SyncBus::new();
    let store = MemorySnapshotStore::new();
    let mut form = surface(&bus, &store);
    let mut text = surface(&bus, &store);

    form.apply_edit("subject.communication.+", json!("İzmir trips")).unwrap();
    assert!(text.poll_sync().unwrap());
    assert_eq!(text.state(), form.state());

    // The key the form derived still addresses the option on the other surface.
    let key = form
        .get_model(ProfileKind::Subject)
        .toggles("communication")
        .unwrap()
        .find_by_label("İzmir trips")
        .unwrap()
        .key
        .clone();
    text.apply_edit(&format!("subject.communication.{}", key), json!(false)).unwrap();
    assert!(!text.get_model(ProfileKind::Subject).toggles("communication").unwrap().is_active(&key));
}
