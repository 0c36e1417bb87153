//! Integration tests for editing sessions: history, import and deploy drift.

use std::sync::Arc;

use attune::deploy::{DeploymentStore, FileDeploymentStore, MemoryDeploymentStore};
use attune::drift::DriftStatus;
use attune::profile::{EditorState, ProfileKind};
use attune::sync::FileSnapshotStore;
use attune::{Config, Session};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_history_is_bounded_and_redo_clears() {
    let mut session = Session::new(EditorState::default()).with_history_depth(5);
    for i in 0..12 {
        session.apply_edit("subject.notes", json!(format!("note {}", i))).unwrap();
    }

    let mut undone = 0;
    while session.undo() {
        undone += 1;
    }
    assert_eq!(undone, 5);
    assert_eq!(session.get_model(ProfileKind::Subject).prose("notes"), "note 6");

    assert!(session.redo());
    assert_eq!(session.get_model(ProfileKind::Subject).prose("notes"), "note 7");

    session.apply_edit("subject.notes", json!("fresh")).unwrap();
    assert!(!session.history().can_redo());
    assert!(!session.redo());
}

#[test]
fn test_import_is_one_undoable_step() {
    let mut session = Session::new(EditorState::default());
    session.apply_edit("subject.identity.name", json!("Alex")).unwrap();

    let report = session.import_text(ProfileKind::Subject, "# Robin\n\n## About\nHi.\n");
    assert!(report.recorded);
    assert_eq!(session.get_model(ProfileKind::Subject).name(), "Robin");

    assert!(session.undo());
    assert_eq!(session.serialize(ProfileKind::Subject), "# Alex\n");
}

#[test]
fn test_reimporting_canonical_text_is_not_a_change() {
    let mut session = Session::new(EditorState::default());
    session.import_text(ProfileKind::Persona, "# Sage\n**Role:** Guide\n\n## Tone\nCalm, Curious\n");
    let revision = session.revision();

    let canonical = session.serialize(ProfileKind::Persona);
    let report = session.import_text(ProfileKind::Persona, &canonical);
    assert!(!report.recorded);
    assert_eq!(session.revision(), revision);
}

#[tokio::test]
async fn test_drift_lifecycle() {
    let store = MemoryDeploymentStore::new();
    let mut session = Session::new(EditorState::default());
    assert_eq!(session.drift_status(), DriftStatus::NoBaseline);

    session.apply_edit("subject.identity.name", json!("Alex")).unwrap();
    let status = session.deploy(&store).await.unwrap();
    assert!(status.is_in_sync());
    assert!(status.deployed_at().is_some());
    assert_eq!(store.deployed(ProfileKind::Subject).as_deref(), Some("# Alex\n"));

    session.apply_edit("subject.about", json!("Hi")).unwrap();
    assert!(matches!(session.drift_status(), DriftStatus::Differs { .. }));

    // Reverting the draft by hand brings it back in sync.
    session.apply_edit("subject.about", json!("")).unwrap();
    assert!(session.drift_status().is_in_sync());
}

#[tokio::test]
async fn test_rejected_deploy_changes_nothing() {
    let store = MemoryDeploymentStore::with_deployed("# Alex\n", "# Sage\n");
    let mut session = Session::new(EditorState::default());
    assert!(session.load_deployed(&store).await.unwrap());
    assert!(session.drift_status().is_in_sync());

    session.apply_edit("persona.identity.name", json!("Quill")).unwrap();
    store.set_rejection(Some("target offline"));
    let before = session.state().clone();

    assert!(session.deploy(&store).await.is_err());
    assert_eq!(session.state(), &before);
    assert!(matches!(session.drift_status(), DriftStatus::Differs { deployed_at: None }));
    assert_eq!(store.deployed(ProfileKind::Persona).as_deref(), Some("# Sage\n"));

    store.set_rejection(None);
    assert!(session.deploy(&store).await.unwrap().is_in_sync());
}

#[tokio::test]
async fn test_load_deployed_resets_history() {
    let store = MemoryDeploymentStore::with_deployed("# Alex\n\n## About\nHi.\n", "# Sage\n");
    let mut session = Session::new(EditorState::default());
    session.apply_edit("subject.identity.name", json!("Draft")).unwrap();

    assert!(session.load_deployed(&store).await.unwrap());
    assert_eq!(session.get_model(ProfileKind::Subject).name(), "Alex");
    assert!(!session.history().can_undo());
}

#[tokio::test]
async fn test_file_workspace_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        data_dir: temp.path().to_path_buf(),
        ..Config::default()
    };
    let deploy_store = FileDeploymentStore::new(config.deploy_dir());

    {
        let mut session = Session::from_config(&config).unwrap();
        session.apply_edit("subject.identity.name", json!("Alex")).unwrap();
        session.apply_edit("persona.identity.name", json!("Sage")).unwrap();
        session.deploy(&deploy_store).await.unwrap();
    }

    assert!(config.snapshot_path().exists());
    assert_eq!(
        deploy_store.load_deployed(ProfileKind::Subject).await.unwrap().as_deref(),
        Some("# Alex\n")
    );

    // A fresh process restores the workspace and picks the deploy up as its baseline.
    let mut session = Session::from_config(&config).unwrap();
    assert_eq!(session.get_model(ProfileKind::Persona).name(), "Sage");
    assert_eq!(session.drift_status(), DriftStatus::NoBaseline);
    assert!(session.track_deployed(&deploy_store).await.unwrap());
    assert!(session.drift_status().is_in_sync());
}

#[test]
fn test_corrupt_workspace_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("workspace.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Session::restore(Arc::new(FileSnapshotStore::new(&path))).is_err());
}
