//! Local project and model records against a temporary data directory

use causality_cli::store::{LocalStore, ModelForm, MODELS_FILE, PROJECTS_FILE};
use causality_cli::CliError;
use std::collections::HashSet;
use tempfile::TempDir;

fn store() -> (TempDir, LocalStore) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path().join("data"));
    (dir, store)
}

fn form(name: &str, project: Option<u64>) -> ModelForm {
    ModelForm {
        model_name: name.to_string(),
        image_url: "https://example.com/m.png".to_string(),
        description: "fine-tune".to_string(),
        project_id: project,
        ..ModelForm::default()
    }
}

#[test]
fn test_empty_store_lists_nothing() {
    let (_dir, store) = store();
    assert!(store.list_projects().unwrap().is_empty());
    assert!(store.list_models().unwrap().is_empty());
    assert!(matches!(store.get_project(1), Err(CliError::NotFound(_))));
}

#[test]
fn test_created_project_is_persisted_with_unique_id() {
    let (_dir, store) = store();

    let mut ids = HashSet::new();
    for i in 0..5 {
        let project = store
            .create_project(&format!("Project {}", i), "desc", None)
            .unwrap();
        assert!(ids.insert(project.id));
    }

    let raw = std::fs::read_to_string(store.dir().join(PROJECTS_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["name"], "Project 0");
    assert_eq!(entries[0]["description"], "desc");
    assert_eq!(entries[0]["imageUrl"], "/image.png");
    assert!(entries[0]["id"].is_u64());
    assert!(entries[0]["createdAt"].is_string());
    assert_eq!(entries[0]["models"], serde_json::json!([]));

    let listed: HashSet<u64> = store.list_projects().unwrap().iter().map(|p| p.id).collect();
    assert_eq!(listed, ids);
}

#[test]
fn test_project_requires_name() {
    let (_dir, store) = store();
    assert!(matches!(
        store.create_project("   ", "", None),
        Err(CliError::Validation { field: "name", .. })
    ));
}

#[test]
fn test_project_requires_description_and_valid_image() {
    let (_dir, store) = store();
    assert!(matches!(
        store.create_project("Vision", "  ", None),
        Err(CliError::Validation { field: "description", .. })
    ));
    assert!(matches!(
        store.create_project("Vision", "image models", Some("not a url")),
        Err(CliError::Validation { field: "image_url", .. })
    ));
    assert!(!store.dir().join(PROJECTS_FILE).exists());

    let project = store.create_project("Vision", "image models", Some("  ")).unwrap();
    assert_eq!(project.image_url, "/image.png");
}

#[test]
fn test_model_requires_description() {
    let (_dir, store) = store();
    let mut model = form("m", None);
    model.description = String::new();
    assert!(matches!(
        store.create_model(model),
        Err(CliError::Validation { field: "description", .. })
    ));
    assert!(!store.dir().join(MODELS_FILE).exists());
}

#[test]
fn test_model_attaches_to_project() {
    let (_dir, store) = store();
    let project = store
        .create_project("Vision", "image models", Some("https://example.com/p.png"))
        .unwrap();

    let attached = store.create_model(form("attached", Some(project.id))).unwrap();
    let loose = store.create_model(form("loose", None)).unwrap();
    assert_ne!(attached.id, loose.id);

    let models = store.list_models().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].project_id, Some(project.id));

    let reloaded = store.get_project(project.id).unwrap();
    assert_eq!(reloaded.image_url, "https://example.com/p.png");
    assert_eq!(reloaded.models.len(), 1);
    assert_eq!(reloaded.models[0].model_name, "attached");
}

#[test]
fn test_existing_files_are_appended_to() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(
        store.dir().join(MODELS_FILE),
        r#"[{"id":1,"model_name":"old","image_url":"https://x.io/a.png","description":"",
            "base_model":"qwen-7b","dataset":"dataset2","learning_rate":0.001,"num_epochs":1,
            "batch_size":4,"lora_rank":4,"lora_alpha":16,"createdAt":"2024-01-01T00:00:00.000Z"}]"#,
    )
    .unwrap();

    store.create_model(form("new", None)).unwrap();
    let models = store.list_models().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].model_name, "old");
    assert_eq!(models[0].project_id, None);
    assert_eq!(models[1].model_name, "new");
}

#[test]
fn test_corrupt_file_is_reported() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.dir().join(PROJECTS_FILE), "{not json").unwrap();
    assert!(matches!(store.list_projects(), Err(CliError::Storage(_))));
}
