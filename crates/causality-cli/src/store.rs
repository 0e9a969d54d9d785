//! Local project and model records
//!
//! Projects and fine-tuning jobs never leave the machine. Each collection is a JSON array
//! in the data directory, rewritten whole on every change; the last writer wins.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{CliError, Result};

pub const PROJECTS_FILE: &str = "userProjects.json";
pub const MODELS_FILE: &str = "userModels.json";
pub const DEFAULT_PROJECT_IMAGE: &str = "/image.png";

pub const BASE_MODELS: [&str; 4] = ["llama2-7b", "llama2-13b", "chatglm2-6b", "qwen-7b"];
pub const DATASETS: [&str; 3] = ["dataset1", "dataset2", "dataset3"];

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    /// RFC 3339 timestamp
    pub created_at: String,
    #[serde(default)]
    pub models: Vec<Model>,
}

/// Fine-tuning job as submitted from the model form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: u64,
    pub model_name: String,
    pub image_url: String,
    pub description: String,
    pub base_model: String,
    pub dataset: String,
    pub learning_rate: f64,
    pub num_epochs: u32,
    pub batch_size: u32,
    pub lora_rank: u32,
    pub lora_alpha: u32,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
}

/// Model form input, before an id and timestamp are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForm {
    pub model_name: String,
    pub image_url: String,
    pub description: String,
    pub base_model: String,
    pub dataset: String,
    pub learning_rate: f64,
    pub num_epochs: u32,
    pub batch_size: u32,
    pub lora_rank: u32,
    pub lora_alpha: u32,
    pub project_id: Option<u64>,
}

impl Default for ModelForm {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            image_url: String::new(),
            description: String::new(),
            base_model: BASE_MODELS[0].to_string(),
            dataset: DATASETS[0].to_string(),
            learning_rate: 0.0001,
            num_epochs: 3,
            batch_size: 8,
            lora_rank: 8,
            lora_alpha: 32,
            project_id: None,
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(CliError::validation(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

impl ModelForm {
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(CliError::validation("model_name", "must not be empty"));
        }
        Url::parse(self.image_url.trim())
            .map_err(|e| CliError::validation("image_url", e.to_string()))?;
        if self.description.trim().is_empty() {
            return Err(CliError::validation("description", "must not be empty"));
        }
        if !BASE_MODELS.contains(&self.base_model.as_str()) {
            return Err(CliError::validation(
                "base_model",
                format!("expected one of {}", BASE_MODELS.join(", ")),
            ));
        }
        if !DATASETS.contains(&self.dataset.as_str()) {
            return Err(CliError::validation(
                "dataset",
                format!("expected one of {}", DATASETS.join(", ")),
            ));
        }

        if !self.learning_rate.is_finite() {
            return Err(CliError::validation("learning_rate", "must be a number"));
        }
        check_range("learning_rate", self.learning_rate, 0.000001, 0.01)?;
        check_range("num_epochs", self.num_epochs, 1, 50)?;
        check_range("batch_size", self.batch_size, 1, 128)?;
        check_range("lora_rank", self.lora_rank, 1, 64)?;
        check_range("lora_alpha", self.lora_alpha, 1, 128)?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Store
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Millisecond timestamp, bumped until no existing id matches
fn next_id(taken: impl Iterator<Item = u64> + Clone) -> u64 {
    let mut id = now_millis();
    while taken.clone().any(|existing| existing == id) {
        id += 1;
    }
    id
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| CliError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| CliError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn save<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            CliError::Storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let path = self.path(file);
        let contents = serde_json::to_string_pretty(items)?;
        std::fs::write(&path, contents)
            .map_err(|e| CliError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }

    // ---- Projects ----

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.load(PROJECTS_FILE)
    }

    pub fn get_project(&self, id: u64) -> Result<Project> {
        self.list_projects()?
            .into_iter()
            .find(|project| project.id == id)
            .ok_or_else(|| CliError::NotFound(format!("Project {}", id)))
    }

    pub fn create_project(
        &self,
        name: &str,
        description: &str,
        image_url: Option<&str>,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::validation("name", "must not be empty"));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(CliError::validation("description", "must not be empty"));
        }
        let image_url = image_url.map(str::trim).filter(|url| !url.is_empty());
        if let Some(url) = image_url {
            Url::parse(url).map_err(|e| CliError::validation("image_url", e.to_string()))?;
        }

        let mut projects = self.list_projects()?;
        let project = Project {
            id: next_id(projects.iter().map(|p| p.id)),
            name: name.to_string(),
            description: description.to_string(),
            image_url: image_url.unwrap_or(DEFAULT_PROJECT_IMAGE).to_string(),
            created_at: now_rfc3339(),
            models: Vec::new(),
        };

        projects.push(project.clone());
        self.save(PROJECTS_FILE, &projects)?;
        debug!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    // ---- Models ----

    pub fn list_models(&self) -> Result<Vec<Model>> {
        self.load(MODELS_FILE)
    }

    /// Record a model; with a project id it is also attached to that project.
    ///
    /// Nothing is written if validation fails or the project does not exist.
    pub fn create_model(&self, form: ModelForm) -> Result<Model> {
        form.validate()?;

        let mut projects = self.list_projects()?;
        let project_index = match form.project_id {
            Some(id) => Some(
                projects
                    .iter()
                    .position(|project| project.id == id)
                    .ok_or_else(|| CliError::NotFound(format!("Project {}", id)))?,
            ),
            None => None,
        };

        let mut models = self.list_models()?;
        let model = Model {
            id: next_id(models.iter().map(|m| m.id)),
            model_name: form.model_name.trim().to_string(),
            image_url: form.image_url.trim().to_string(),
            description: form.description.trim().to_string(),
            base_model: form.base_model,
            dataset: form.dataset,
            learning_rate: form.learning_rate,
            num_epochs: form.num_epochs,
            batch_size: form.batch_size,
            lora_rank: form.lora_rank,
            lora_alpha: form.lora_alpha,
            created_at: now_rfc3339(),
            project_id: form.project_id,
        };

        models.push(model.clone());
        self.save(MODELS_FILE, &models)?;

        if let Some(index) = project_index {
            projects[index].models.push(model.clone());
            self.save(PROJECTS_FILE, &projects)?;
        }

        debug!("Recorded model {} ({})", model.model_name, model.id);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn form(name: &str) -> ModelForm {
        ModelForm {
            model_name: name.to_string(),
            image_url: "https://example.com/model.png".to_string(),
            description: "LoRA fine-tune".to_string(),
            ..ModelForm::default()
        }
    }

    #[test]
    fn test_ids_are_bumped_past_collisions() {
        let now = now_millis();
        let taken = vec![now, now + 1, now + 2];
        let id = next_id(taken.iter().copied());
        assert!(!taken.contains(&id));
    }

    #[test]
    fn test_form_defaults_are_valid() {
        let form = form("m");
        assert!(form.validate().is_ok());
        assert_eq!(form.learning_rate, 0.0001);
        assert_eq!(form.lora_alpha, 32);
    }

    #[test]
    fn test_form_validation() {
        let mut bad = form("m");
        bad.learning_rate = 0.5;
        assert!(matches!(
            bad.validate(),
            Err(CliError::Validation { field: "learning_rate", .. })
        ));

        let mut bad = form("m");
        bad.num_epochs = 0;
        assert!(bad.validate().is_err());

        let mut bad = form("m");
        bad.lora_rank = 65;
        assert!(bad.validate().is_err());

        let mut bad = form("m");
        bad.base_model = "gpt-4".to_string();
        assert!(matches!(
            bad.validate(),
            Err(CliError::Validation { field: "base_model", .. })
        ));

        let mut bad = form("m");
        bad.image_url = "not a url".to_string();
        assert!(bad.validate().is_err());

        let mut bad = form("m");
        bad.description = "  ".to_string();
        assert!(matches!(
            bad.validate(),
            Err(CliError::Validation { field: "description", .. })
        ));

        assert!(form("  ").validate().is_err());
    }

    #[test]
    fn test_invalid_model_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let mut bad = form("m");
        bad.batch_size = 500;
        assert!(store.create_model(bad).is_err());
        assert!(!dir.path().join(MODELS_FILE).exists());

        let mut orphan = form("m");
        orphan.project_id = Some(42);
        assert!(matches!(store.create_model(orphan), Err(CliError::NotFound(_))));
        assert!(!dir.path().join(MODELS_FILE).exists());
    }

    #[test]
    fn test_model_serializes_form_field_names() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.create_model(form("m")).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(MODELS_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["model_name"], "m");
        assert_eq!(json[0]["base_model"], "llama2-7b");
        assert!(json[0]["createdAt"].is_string());
        assert!(json[0].get("projectId").is_none());
    }
}
