// Tue Jan 20 2026 - Alex

use crate::profile::{Architecture, Profile, ProfileError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PROFILE_FILE_NAME: &str = "profile.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub architecture: Architecture,
    #[serde(default)]
    pub structures: HashMap<String, StructureLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureLayout {
    pub size: u64,
    #[serde(default)]
    pub fields: HashMap<String, u64>,
}

impl ProfileDocument {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            structures: HashMap::new(),
        }
    }

    pub fn with_structure(mut self, name: &str, size: u64, fields: &[(&str, u64)]) -> Self {
        let layout = StructureLayout {
            size,
            fields: fields.iter().map(|(f, o)| (f.to_string(), *o)).collect(),
        };
        self.structures.insert(name.to_string(), layout);
        self
    }

    pub fn save(&self, path: &Path) -> Result<(), ProfileError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ProfileError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// An offset database stored as `profile.json` inside a profile directory.
#[derive(Debug, Clone)]
pub struct JsonProfile {
    guid_age: String,
    document: ProfileDocument,
}

impl JsonProfile {
    pub fn new(guid_age: &str, document: ProfileDocument) -> Self {
        Self {
            guid_age: guid_age.to_string(),
            document,
        }
    }

    pub fn load(guid_age: &str, path: &Path) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path)?;
        let document = serde_json::from_str(&text).map_err(|source| ProfileError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(guid_age, document))
    }

    fn layout(&self, structure: &str) -> Result<&StructureLayout, ProfileError> {
        self.document
            .structures
            .get(structure)
            .ok_or_else(|| ProfileError::UnknownStructure(structure.to_string()))
    }
}

impl Profile for JsonProfile {
    fn guid_age(&self) -> &str {
        &self.guid_age
    }

    fn architecture(&self) -> Architecture {
        self.document.architecture
    }

    fn member_offset(&self, structure: &str, field: &str) -> Result<u64, ProfileError> {
        self.layout(structure)?
            .fields
            .get(field)
            .copied()
            .ok_or_else(|| ProfileError::UnknownField {
                structure: structure.to_string(),
                field: field.to_string(),
            })
    }

    fn structure_size(&self, structure: &str) -> Result<u64, ProfileError> {
        Ok(self.layout(structure)?.size)
    }
}

/// Resolves a GUID-age to a loadable offset database.
pub trait ProfileLoader: Send + Sync {
    fn profile_dir(&self, guid_age: &str) -> PathBuf;

    fn load(&self, guid_age: &str) -> Result<Arc<dyn Profile>, ProfileError>;
}

/// Profiles laid out as `<root>/<guid_age>/profile.json`.
#[derive(Debug, Clone)]
pub struct JsonProfileLoader {
    root: PathBuf,
}

impl JsonProfileLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ProfileLoader for JsonProfileLoader {
    fn profile_dir(&self, guid_age: &str) -> PathBuf {
        self.root.join(guid_age)
    }

    fn load(&self, guid_age: &str) -> Result<Arc<dyn Profile>, ProfileError> {
        let path = self.profile_dir(guid_age).join(PROFILE_FILE_NAME);
        if !path.is_file() {
            return Err(ProfileError::NotFound(path));
        }
        let profile = JsonProfile::load(guid_age, &path)?;
        log::info!("Loaded {} profile {}", profile.architecture(), guid_age);
        Ok(Arc::new(profile))
    }
}
