//! Field schema model: the per-model contract the rest of the system is
//! parameterized over. Descriptors are pure data, built once at startup and
//! shared behind `Arc` with every handler that serves the model.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collection reserved for authentication accounts. User-defined models may
/// not claim it.
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Reference,
}

impl FieldType {
    /// Lowercase label used in validation messages ("name must be a string").
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    /// Records are scoped to the subject that created them.
    User,
    /// Readable by anyone; writes still require authentication.
    Public,
    /// Accepted in model files but with undefined semantics.
    /// Rejected at registration rather than silently treated as `User`.
    Team,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOpts {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Element type, set iff `field_type` is `Array`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<FieldType>,
    /// Target model name, set iff the field (or its elements) are references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub opts: FieldOpts,
}

impl FieldDescriptor {
    pub fn scalar(field_type: FieldType) -> Self {
        Self {
            field_type,
            list_type: None,
            reference_type: None,
            opts: FieldOpts::default(),
        }
    }

    pub fn array(list_type: FieldType) -> Self {
        Self {
            field_type: FieldType::Array,
            list_type: Some(list_type),
            reference_type: None,
            opts: FieldOpts::default(),
        }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Reference,
            list_type: None,
            reference_type: Some(target.into()),
            opts: FieldOpts::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.opts.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.opts.unique = true;
        self
    }
}

/// Field name to descriptor mapping for one model.
pub type FieldSchema = BTreeMap<String, FieldDescriptor>;

/// The contract for one manageable entity type. `name` doubles as the
/// storage collection name and the URL path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub access: AccessLevel,
    pub fields: FieldSchema,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("two or more models are named '{0}'")]
    DuplicateName(String),

    #[error("model name '{0}' must be a non-empty lowercase identifier")]
    InvalidName(String),

    #[error("model name '{0}' is reserved")]
    ReservedName(String),

    #[error("model '{0}' must declare at least one field")]
    NoFields(String),

    #[error("{model}.{field}: listType must be set for array fields")]
    MissingListType { model: String, field: String },

    #[error("{model}.{field}: listType '{list_type}' is not valid for array elements")]
    InvalidListType {
        model: String,
        field: String,
        list_type: &'static str,
    },

    #[error("{model}.{field}: referenceType must be set for reference fields")]
    MissingReferenceType { model: String, field: String },

    #[error("{model}.{field}: referenceType '{target}' does not name a registered model")]
    UnknownReference {
        model: String,
        field: String,
        target: String,
    },

    #[error("model '{0}': TEAM access semantics are undefined and not supported")]
    TeamAccessUnsupported(String),

    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    models: Vec<ModelDescriptor>,
}

/// The validated set of model descriptors for one deployment.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self, ModelError> {
        let names: BTreeSet<&str> = models.iter().map(|m| m.name.as_str()).collect();

        let mut seen = BTreeSet::new();
        for model in &models {
            if model.name.is_empty()
                || !model
                    .name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(ModelError::InvalidName(model.name.clone()));
            }
            if model.name == USERS_COLLECTION {
                return Err(ModelError::ReservedName(model.name.clone()));
            }
            if !seen.insert(model.name.as_str()) {
                return Err(ModelError::DuplicateName(model.name.clone()));
            }
            if matches!(model.access, AccessLevel::Team) {
                return Err(ModelError::TeamAccessUnsupported(model.name.clone()));
            }
            if model.fields.is_empty() {
                return Err(ModelError::NoFields(model.name.clone()));
            }

            for (field, descriptor) in &model.fields {
                Self::check_field(model, field, descriptor, &names)?;
            }
        }

        Ok(Self {
            models: models.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_yaml::from_str(source)?;
        Self::new(file.models)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.iter().find(|m| m.name == name)
    }

    fn check_field(
        model: &ModelDescriptor,
        field: &str,
        descriptor: &FieldDescriptor,
        names: &BTreeSet<&str>,
    ) -> Result<(), ModelError> {
        let element_type = match descriptor.field_type {
            FieldType::Array => match descriptor.list_type {
                Some(FieldType::Array) => {
                    return Err(ModelError::InvalidListType {
                        model: model.name.clone(),
                        field: field.to_string(),
                        list_type: "array",
                    });
                }
                Some(t) => t,
                None => {
                    return Err(ModelError::MissingListType {
                        model: model.name.clone(),
                        field: field.to_string(),
                    });
                }
            },
            t => t,
        };

        if element_type == FieldType::Reference {
            let target = descriptor.reference_type.as_deref().ok_or_else(|| {
                ModelError::MissingReferenceType {
                    model: model.name.clone(),
                    field: field.to_string(),
                }
            })?;
            // The account collection is a valid population target even
            // though it is not a registered model.
            if target != USERS_COLLECTION && !names.contains(target) {
                return Err(ModelError::UnknownReference {
                    model: model.name.clone(),
                    field: field.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_model() -> ModelDescriptor {
        let mut fields = FieldSchema::new();
        fields.insert(
            "name".to_string(),
            FieldDescriptor::scalar(FieldType::String).required(),
        );
        fields.insert(
            "points".to_string(),
            FieldDescriptor::scalar(FieldType::Number),
        );
        ModelDescriptor {
            name: "todo".to_string(),
            access: AccessLevel::User,
            fields,
        }
    }

    #[test]
    fn accepts_a_valid_model_set() {
        let registry = ModelRegistry::new(vec![todo_model()]).unwrap();
        assert!(registry.get("todo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ModelRegistry::new(vec![todo_model(), todo_model()]).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName(name) if name == "todo"));
    }

    #[test]
    fn rejects_team_access() {
        let mut model = todo_model();
        model.access = AccessLevel::Team;
        let err = ModelRegistry::new(vec![model]).unwrap_err();
        assert!(matches!(err, ModelError::TeamAccessUnsupported(_)));
    }

    #[test]
    fn rejects_the_reserved_users_collection() {
        let mut model = todo_model();
        model.name = "users".to_string();
        let err = ModelRegistry::new(vec![model]).unwrap_err();
        assert!(matches!(err, ModelError::ReservedName(_)));
    }

    #[test]
    fn rejects_arrays_without_an_element_type() {
        let mut model = todo_model();
        model.fields.insert("tags".to_string(), {
            let mut f = FieldDescriptor::array(FieldType::String);
            f.list_type = None;
            f
        });
        let err = ModelRegistry::new(vec![model]).unwrap_err();
        assert!(matches!(err, ModelError::MissingListType { .. }));
    }

    #[test]
    fn rejects_references_to_unregistered_models() {
        let mut model = todo_model();
        model
            .fields
            .insert("project".to_string(), FieldDescriptor::reference("project"));
        let err = ModelRegistry::new(vec![model]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownReference { target, .. } if target == "project"));
    }

    #[test]
    fn user_references_are_always_resolvable() {
        let mut model = todo_model();
        model
            .fields
            .insert("owner".to_string(), FieldDescriptor::reference("users"));
        assert!(ModelRegistry::new(vec![model]).is_ok());
    }

    #[test]
    fn loads_models_from_yaml() {
        let yaml = r#"
models:
  - name: project
    access: USER
    fields:
      title:
        type: string
        opts: { required: true }
  - name: todo
    access: PUBLIC
    fields:
      name:
        type: string
      tags:
        type: array
        listType: string
      project:
        type: reference
        referenceType: project
        opts: { unique: true }
"#;
        let registry = ModelRegistry::from_yaml(yaml).unwrap();
        let todo = registry.get("todo").unwrap();
        assert_eq!(todo.access, AccessLevel::Public);
        let project = &todo.fields["project"];
        assert_eq!(project.field_type, FieldType::Reference);
        assert_eq!(project.reference_type.as_deref(), Some("project"));
        assert!(project.opts.unique);
        assert_eq!(todo.fields["tags"].list_type, Some(FieldType::String));
    }
}
