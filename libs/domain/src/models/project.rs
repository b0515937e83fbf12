//! Project and membership models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A volunteer activity with a participant capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub manager_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub required_participants: i32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New project creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub required_participants: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Project update payload
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub required_participants: Option<i32>,
    /// Absent keeps the image; `null` or an empty string removes it
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
}

/// Tell an explicit `null` apart from a missing field
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateProject {
    /// Apply the changes to a loaded project
    pub fn apply_to(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
        if let Some(is_active) = self.is_active {
            project.is_active = is_active;
        }
        if let Some(start_date) = self.start_date {
            project.start_date = start_date;
        }
        if let Some(required) = self.required_participants {
            project.required_participants = required;
        }
        if let Some(image_url) = self.image_url {
            project.image_url = image_url;
        }
    }
}

/// Project together with its current participant count
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub participant_count: i64,
}

/// Join record between a user and a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// Filter for project listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectFilter {
    pub manager_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
}
