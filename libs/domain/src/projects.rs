//! Project membership
//!
//! Joining is capacity-checked: a project accepts at most
//! `required_participants` members and only while it is active.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Actor, Membership, NewProject, Project, ProjectFilter, ProjectSummary, UpdateProject,
};
use crate::store::Store;
use crate::validation::{self, required_text};

/// Check whether a user may join `project`.
///
/// Inactive beats already-joined, which beats full.
pub fn check_join(
    project: &Project,
    already_joined: bool,
    participant_count: i64,
) -> WorkflowResult<()> {
    if !project.is_active {
        return Err(WorkflowError::State(format!(
            "Project '{}' is not active",
            project.name
        )));
    }

    if already_joined {
        return Err(WorkflowError::Conflict(
            "You have already joined this project".to_string(),
        ));
    }

    if participant_count >= i64::from(project.required_participants) {
        return Err(WorkflowError::Capacity(format!(
            "Project '{}' is full",
            project.name
        )));
    }

    Ok(())
}

/// Validate an edited project against its current participant count
pub fn check_update(project: Project, participant_count: i64) -> WorkflowResult<Project> {
    let name = required_text("Project name", &project.name)?;
    let description = required_text("Project description", &project.description)?;

    if project.required_participants < 1 {
        return Err(WorkflowError::Validation(
            "Required participants must be at least 1".to_string(),
        ));
    }

    if i64::from(project.required_participants) < participant_count {
        return Err(WorkflowError::Validation(format!(
            "Required participants cannot drop below the {} members already joined",
            participant_count
        )));
    }

    Ok(Project {
        name,
        description,
        image_url: project
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        ..project
    })
}

/// Project as seen by a particular viewer
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub joined: bool,
}

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a project managed by the actor
    pub async fn create(&self, actor: &Actor, project: NewProject) -> WorkflowResult<Project> {
        let project = validation::validate_project(project)?;
        let project = self.store.insert_project(actor, project).await?;
        info!("User {} created project {}", actor.user_id, project.id);
        Ok(project)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateProject,
    ) -> WorkflowResult<Project> {
        let project = self.store.update_project(actor, id, changes).await?;
        info!("User {} updated project {}", actor.user_id, id);
        Ok(project)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        self.store.delete_project(actor, id).await?;
        info!("User {} deleted project {}", actor.user_id, id);
        Ok(())
    }

    /// Project with its participant count and whether the viewer joined it
    pub async fn get(&self, viewer: Option<&Actor>, id: Uuid) -> WorkflowResult<ProjectDetail> {
        let summary = self
            .store
            .find_project(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("project", id))?;

        let joined = match viewer {
            Some(actor) => self.store.is_member(actor.user_id, id).await?,
            None => false,
        };

        Ok(ProjectDetail { summary, joined })
    }

    pub async fn list(&self) -> WorkflowResult<Vec<ProjectSummary>> {
        self.store.list_projects(ProjectFilter::default()).await
    }

    pub async fn managed_by(&self, user_id: Uuid) -> WorkflowResult<Vec<ProjectSummary>> {
        self.store
            .list_projects(ProjectFilter {
                manager_id: Some(user_id),
                member_id: None,
            })
            .await
    }

    pub async fn joined_by(&self, user_id: Uuid) -> WorkflowResult<Vec<ProjectSummary>> {
        self.store
            .list_projects(ProjectFilter {
                manager_id: None,
                member_id: Some(user_id),
            })
            .await
    }

    /// Join a project, competing atomically for its remaining slots
    pub async fn join(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<Membership> {
        match self.store.join_project(actor, project_id).await {
            Ok(membership) => {
                info!("User {} joined project {}", actor.user_id, project_id);
                Ok(membership)
            }
            Err(e) => {
                warn!("User {} could not join project {}: {}", actor.user_id, project_id, e);
                Err(e)
            }
        }
    }

    /// Leave a project; leaving one not joined is a no-op
    pub async fn leave(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<()> {
        self.store.leave_project(actor, project_id).await?;
        info!("User {} left project {}", actor.user_id, project_id);
        Ok(())
    }

    pub async fn participant_count(&self, project_id: Uuid) -> WorkflowResult<i64> {
        self.store.participant_count(project_id).await
    }
}
