use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

pub const MISSING_FIELDS_STATUS: &str = "Error: Missing required fields (Title, Desc, Lang, File).";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        // `pad` so width and alignment apply in tables
        f.pad(name)
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(anyhow!("Unknown difficulty: {}", other)),
        }
    }
}

/// A project in the registry. The `id` is always assigned by the
/// registry when the project is added.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub file_structure: String,
    pub zip_file_name: String,
}

/// An admin submission. Same as `Project` minus the `id`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_file_structure")]
    pub file_structure: String,
    #[serde(default)]
    pub zip_file_name: String,
}

fn default_file_structure() -> String {
    "src/\n  index.js".to_string()
}

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", MISSING_FIELDS_STATUS)]
    MissingFields,
}

impl NewProject {
    /// Checks the required fields before anything is written to the
    /// registry. Tags are normalized in place.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        let required = [
            &self.title,
            &self.description,
            &self.language,
            &self.zip_file_name,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(ValidationError::MissingFields);
        }
        self.tags = dedup_tags(self.tags.iter().map(String::as_str));
        Ok(self)
    }

    pub fn with_id(self, id: &str) -> Project {
        Project {
            id: id.to_string(),
            title: self.title,
            description: self.description,
            language: self.language,
            difficulty: self.difficulty,
            tags: self.tags,
            file_structure: self.file_structure,
            zip_file_name: self.zip_file_name,
        }
    }
}

/// Splits a comma separated tag list as typed into the admin form.
pub fn parse_tags(raw: &str) -> Vec<String> {
    dedup_tags(raw.split(','))
}

// Trims, drops empties and duplicates while keeping the order the
// tags were entered in
fn dedup_tags<'a>(tags: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.map(str::trim).filter(|t| !t.is_empty()) {
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn deploy_status(zip_file_name: &str, downloads_path: &str) -> String {
    format!(
        "Success: Project deployed! Please ensure '{}' is placed in the {} folder.",
        zip_file_name, downloads_path
    )
}
