//! PostgreSQL store
//!
//! Every state-changing method runs in one transaction and locks the row
//! that governs its precondition with `FOR UPDATE` before checking it. The
//! actor's roles are read inside the same transaction.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::Store;
use crate::authz;
use crate::donation_requests;
use crate::donations;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Actor, Donation, DonationFilter, DonationKind, DonationPayload, DonationRequest,
    DonationRequestFilter, Membership, NewDonationRequest, NewProject, NewRoleRequest, NewUser,
    Project, ProjectFilter, ProjectSummary, RoleKind, RoleRequest, RoleRequestFilter,
    UpdateDonationRequest, UpdateProject, User, UserWithRoles,
};
use crate::projects;
use crate::review::{Decision, ReviewStatus};
use crate::validation;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an initialized pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn role_request_from_row(row: &PgRow) -> WorkflowResult<RoleRequest> {
    Ok(RoleRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        requested_role: RoleKind::from_str(row.get("requested_role"))?,
        reason: row.get("reason"),
        status: ReviewStatus::from_str(row.get("status"))?,
        decided_by: row.get("decided_by"),
        decided_at: row.get("decided_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn project_from_row(row: &PgRow) -> Project {
    Project {
        id: row.get("id"),
        manager_id: row.get("manager_id"),
        name: row.get("name"),
        description: row.get("description"),
        is_active: row.get("is_active"),
        start_date: row.get("start_date"),
        required_participants: row.get("required_participants"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn donation_request_from_row(row: &PgRow) -> WorkflowResult<DonationRequest> {
    Ok(DonationRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        kind: DonationKind::from_str(row.get("kind"))?,
        target_amount: row.get("target_amount"),
        target_items: row.get("target_items"),
        status: ReviewStatus::from_str(row.get("status"))?,
        decided_by: row.get("decided_by"),
        decided_at: row.get("decided_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn donation_from_row(row: &PgRow) -> WorkflowResult<Donation> {
    Ok(Donation {
        id: row.get("id"),
        donation_request_id: row.get("donation_request_id"),
        user_id: row.get("user_id"),
        kind: DonationKind::from_str(row.get("kind"))?,
        amount: row.get("amount"),
        item_description: row.get("item_description"),
        quantity: row.get("quantity"),
        item_image: row.get("item_image"),
        status: ReviewStatus::from_str(row.get("status"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a unique violation to a conflict, anything else to a storage error
fn conflict_on_unique(err: sqlx::Error, message: &str) -> WorkflowError {
    let err = DatabaseError::Query(err);
    if err.is_unique_violation() {
        WorkflowError::Conflict(message.to_string())
    } else {
        WorkflowError::Storage(err)
    }
}

async fn roles_in(conn: &mut PgConnection, user_id: Uuid) -> WorkflowResult<Vec<RoleKind>> {
    let rows = sqlx::query(
        r#"
        SELECT r.name
        FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = $1
        ORDER BY r.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(DatabaseError::Query)?;

    Ok(rows
        .iter()
        .filter_map(|row| RoleKind::from_name(row.get("name")))
        .collect())
}

async fn user_exists(conn: &mut PgConnection, user_id: Uuid) -> WorkflowResult<bool> {
    let row = sqlx::query("SELECT 1 FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;
    Ok(row.is_some())
}

async fn grant_role(conn: &mut PgConnection, user_id: Uuid, role: RoleKind) -> WorkflowResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        SELECT $1, id FROM roles WHERE name = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role.name())
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::Query)?;
    Ok(())
}

async fn insert_role_request_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    request: NewRoleRequest,
) -> WorkflowResult<RoleRequest> {
    let row = sqlx::query(
        r#"
        INSERT INTO role_requests (id, user_id, requested_role, reason)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, requested_role, reason, status, decided_by, decided_at,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(request.requested_role.name())
    .bind(&request.reason)
    .fetch_one(&mut *conn)
    .await
    .map_err(DatabaseError::Query)?;

    role_request_from_row(&row)
}

async fn lock_project(conn: &mut PgConnection, id: Uuid) -> WorkflowResult<Project> {
    let row = sqlx::query(
        r#"
        SELECT id, manager_id, name, description, is_active, start_date,
               required_participants, image_url, created_at, updated_at
        FROM projects
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::Query)?;

    row.map(|row| project_from_row(&row))
        .ok_or_else(|| WorkflowError::not_found("project", id))
}

async fn count_members(conn: &mut PgConnection, project_id: Uuid) -> WorkflowResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM project_members WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;
    Ok(row.get("count"))
}

/// Load a donation request; `lock` is the row-locking clause and may be empty
async fn lock_donation_request(
    conn: &mut PgConnection,
    id: Uuid,
    lock: &str,
) -> WorkflowResult<DonationRequest> {
    let sql = format!(
        r#"
        SELECT id, user_id, title, description, category, kind, target_amount, target_items,
               status, decided_by, decided_at, created_at, updated_at
        FROM donation_requests
        WHERE id = $1
        {}
        "#,
        lock
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

    match row {
        Some(row) => donation_request_from_row(&row),
        None => Err(WorkflowError::not_found("donation request", id)),
    }
}

async fn lock_donation(conn: &mut PgConnection, id: Uuid) -> WorkflowResult<Donation> {
    let row = sqlx::query(
        r#"
        SELECT id, donation_request_id, user_id, kind, amount, item_description, quantity,
               item_image, status, created_at, updated_at
        FROM donations
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::Query)?;

    match row {
        Some(row) => donation_from_row(&row),
        None => Err(WorkflowError::not_found("donation", id)),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        user: NewUser,
        role_request: Option<NewRoleRequest>,
    ) -> WorkflowResult<(User, Option<RoleRequest>)> {
        info!("Creating new user: {}", user.email);

        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Email is already registered"))?;

        let user = user_from_row(&row);

        let request = match role_request {
            Some(request) => Some(insert_role_request_in(&mut tx, user.id, request).await?),
            None => None,
        };

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok((user, request))
    }

    async fn find_user(&self, id: Uuid) -> WorkflowResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| user_from_row(&row)))
    }

    async fn find_user_by_email(&self, email: &str) -> WorkflowResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| user_from_row(&row)))
    }

    async fn list_users(&self) -> WorkflowResult<Vec<UserWithRoles>> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        let users = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let assignments = sqlx::query(
            r#"
            SELECT ur.user_id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            ORDER BY r.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;

        let mut roles: HashMap<Uuid, Vec<RoleKind>> = HashMap::new();
        for row in &assignments {
            if let Some(role) = RoleKind::from_name(row.get("name")) {
                roles.entry(row.get("user_id")).or_default().push(role);
            }
        }

        Ok(users
            .iter()
            .map(|row| {
                let user = user_from_row(row);
                let roles = roles.remove(&user.id).unwrap_or_default();
                UserWithRoles { user, roles }
            })
            .collect())
    }

    async fn roles_of(&self, user_id: Uuid) -> WorkflowResult<Vec<RoleKind>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::Query)?;
        roles_in(&mut conn, user_id).await
    }

    async fn assign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: RoleKind,
    ) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_admin(&roles_in(&mut tx, actor.user_id).await?, "assign roles")?;

        if !user_exists(&mut tx, user_id).await? {
            return Err(WorkflowError::not_found("user", user_id));
        }

        grant_role(&mut tx, user_id, role).await?;
        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn unassign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: RoleKind,
    ) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_admin(&roles_in(&mut tx, actor.user_id).await?, "unassign roles")?;

        if !user_exists(&mut tx, user_id).await? {
            return Err(WorkflowError::not_found("user", user_id));
        }

        sqlx::query(
            r#"
            DELETE FROM user_roles
            WHERE user_id = $1
              AND role_id = (SELECT id FROM roles WHERE name = $2)
            "#,
        )
        .bind(user_id)
        .bind(role.name())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn bootstrap_admin(&self, user: NewUser) -> WorkflowResult<User> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET updated_at = users.updated_at
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let admin = user_from_row(&row);

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(admin.id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;
        grant_role(&mut tx, admin.id, RoleKind::Admin).await?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(admin)
    }

    async fn insert_role_request(
        &self,
        actor: &Actor,
        request: NewRoleRequest,
    ) -> WorkflowResult<RoleRequest> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        if !user_exists(&mut tx, actor.user_id).await? {
            return Err(WorkflowError::not_found("user", actor.user_id));
        }

        let request = insert_role_request_in(&mut tx, actor.user_id, request).await?;
        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(request)
    }

    async fn decide_role_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<RoleRequest> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_admin(
            &roles_in(&mut tx, actor.user_id).await?,
            "decide role requests",
        )?;

        let row = sqlx::query(
            r#"
            SELECT id, user_id, requested_role, reason, status, decided_by, decided_at,
                   created_at, updated_at
            FROM role_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let current = match row {
            Some(row) => role_request_from_row(&row)?,
            None => return Err(WorkflowError::not_found("role request", id)),
        };
        let status = current.status.decide(decision)?;

        let row = sqlx::query(
            r#"
            UPDATE role_requests
            SET status = $2, decided_by = $3, decided_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, requested_role, reason, status, decided_by, decided_at,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;
        let request = role_request_from_row(&row)?;

        if status == ReviewStatus::Approved {
            grant_role(&mut tx, request.user_id, request.requested_role).await?;
            info!(
                "Granted role '{}' to user {}",
                request.requested_role, request.user_id
            );
        }

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(request)
    }

    async fn list_role_requests(
        &self,
        filter: RoleRequestFilter,
    ) -> WorkflowResult<Vec<RoleRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, requested_role, reason, status, decided_by, decided_at,
                   created_at, updated_at
            FROM role_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status.map(ReviewStatus::as_str))
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter().map(role_request_from_row).collect()
    }

    async fn insert_project(&self, actor: &Actor, project: NewProject) -> WorkflowResult<Project> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_role(
            &roles_in(&mut tx, actor.user_id).await?,
            RoleKind::ProjectManager,
            "create projects",
        )?;

        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, manager_id, name, description, is_active, start_date,
                                  required_participants, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, manager_id, name, description, is_active, start_date,
                      required_participants, image_url, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.is_active)
        .bind(project.start_date)
        .bind(project.required_participants)
        .bind(&project.image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(project_from_row(&row))
    }

    async fn update_project(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateProject,
    ) -> WorkflowResult<Project> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let mut project = lock_project(&mut tx, id).await?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        authz::require_owner_or_admin(actor, project.manager_id, &roles, "edit this project")?;

        changes.apply_to(&mut project);
        let count = count_members(&mut tx, id).await?;
        let project = projects::check_update(project, count)?;

        let row = sqlx::query(
            r#"
            UPDATE projects
            SET name = $2, description = $3, is_active = $4, start_date = $5,
                required_participants = $6, image_url = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id, manager_id, name, description, is_active, start_date,
                      required_participants, image_url, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.is_active)
        .bind(project.start_date)
        .bind(project.required_participants)
        .bind(&project.image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(project_from_row(&row))
    }

    async fn delete_project(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let project = lock_project(&mut tx, id).await?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        authz::require_owner_or_admin(actor, project.manager_id, &roles, "delete this project")?;

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn find_project(&self, id: Uuid) -> WorkflowResult<Option<ProjectSummary>> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.manager_id, p.name, p.description, p.is_active, p.start_date,
                   p.required_participants, p.image_url, p.created_at, p.updated_at,
                   (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id)
                       AS participant_count
            FROM projects p
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| ProjectSummary {
            project: project_from_row(&row),
            participant_count: row.get("participant_count"),
        }))
    }

    async fn list_projects(&self, filter: ProjectFilter) -> WorkflowResult<Vec<ProjectSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.manager_id, p.name, p.description, p.is_active, p.start_date,
                   p.required_participants, p.image_url, p.created_at, p.updated_at,
                   (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id)
                       AS participant_count
            FROM projects p
            WHERE ($1::uuid IS NULL OR p.manager_id = $1)
              AND ($2::uuid IS NULL OR EXISTS (
                  SELECT 1 FROM project_members m
                  WHERE m.project_id = p.id AND m.user_id = $2
              ))
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(filter.manager_id)
        .bind(filter.member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(rows
            .iter()
            .map(|row| ProjectSummary {
                project: project_from_row(row),
                participant_count: row.get("participant_count"),
            })
            .collect())
    }

    async fn is_member(&self, user_id: Uuid, project_id: Uuid) -> WorkflowResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM project_members WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;
        Ok(row.is_some())
    }

    async fn join_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<Membership> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        // The project row lock serializes joins competing for the last slot
        let project = lock_project(&mut tx, project_id).await?;

        let already_joined = sqlx::query(
            "SELECT 1 FROM project_members WHERE user_id = $1 AND project_id = $2",
        )
        .bind(actor.user_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?
        .is_some();
        let count = count_members(&mut tx, project_id).await?;
        projects::check_join(&project, already_joined, count)?;

        let row = sqlx::query(
            r#"
            INSERT INTO project_members (user_id, project_id)
            VALUES ($1, $2)
            RETURNING user_id, project_id, joined_at
            "#,
        )
        .bind(actor.user_id)
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already joined this project"))?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(Membership {
            user_id: row.get("user_id"),
            project_id: row.get("project_id"),
            joined_at: row.get("joined_at"),
        })
    }

    async fn leave_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<()> {
        sqlx::query("DELETE FROM project_members WHERE user_id = $1 AND project_id = $2")
            .bind(actor.user_id)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn participant_count(&self, project_id: Uuid) -> WorkflowResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id) AS count
            FROM projects p
            WHERE p.id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.map(|row| row.get("count"))
            .ok_or_else(|| WorkflowError::not_found("project", project_id))
    }

    async fn insert_donation_request(
        &self,
        actor: &Actor,
        request: NewDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_role(
            &roles_in(&mut tx, actor.user_id).await?,
            RoleKind::DonationReceiver,
            "create donation requests",
        )?;

        let row = sqlx::query(
            r#"
            INSERT INTO donation_requests (id, user_id, title, description, category, kind,
                                           target_amount, target_items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, title, description, category, kind, target_amount,
                      target_items, status, decided_by, decided_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.kind.as_str())
        .bind(request.target_amount)
        .bind(request.target_items)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_request_from_row(&row)
    }

    async fn update_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let current = lock_donation_request(&mut tx, id, "FOR UPDATE").await?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        authz::require_owner_or_admin(
            actor,
            current.user_id,
            &roles,
            "edit this donation request",
        )?;
        donation_requests::check_editable(&current)?;

        let merged = validation::validate_donation_request(changes.merge(&current))?;

        let row = sqlx::query(
            r#"
            UPDATE donation_requests
            SET title = $2, description = $3, category = $4, kind = $5,
                target_amount = $6, target_items = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, title, description, category, kind, target_amount,
                      target_items, status, decided_by, decided_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&merged.title)
        .bind(&merged.description)
        .bind(&merged.category)
        .bind(merged.kind.as_str())
        .bind(merged.target_amount)
        .bind(merged.target_items)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_request_from_row(&row)
    }

    async fn delete_donation_request(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let current = lock_donation_request(&mut tx, id, "FOR UPDATE").await?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        authz::require_owner_or_admin(
            actor,
            current.user_id,
            &roles,
            "delete this donation request",
        )?;

        sqlx::query("DELETE FROM donation_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn decide_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<DonationRequest> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        authz::require_admin(
            &roles_in(&mut tx, actor.user_id).await?,
            "decide donation requests",
        )?;

        let current = lock_donation_request(&mut tx, id, "FOR UPDATE").await?;
        let status = current.status.decide(decision)?;

        let row = sqlx::query(
            r#"
            UPDATE donation_requests
            SET status = $2, decided_by = $3, decided_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, title, description, category, kind, target_amount,
                      target_items, status, decided_by, decided_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_request_from_row(&row)
    }

    async fn find_donation_request(&self, id: Uuid) -> WorkflowResult<Option<DonationRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, description, category, kind, target_amount, target_items,
                   status, decided_by, decided_at, created_at, updated_at
            FROM donation_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref().map(donation_request_from_row).transpose()
    }

    async fn list_donation_requests(
        &self,
        filter: DonationRequestFilter,
    ) -> WorkflowResult<Vec<DonationRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, description, category, kind, target_amount, target_items,
                   status, decided_by, decided_at, created_at, updated_at
            FROM donation_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status.map(ReviewStatus::as_str))
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter().map(donation_request_from_row).collect()
    }

    async fn insert_donation(
        &self,
        actor: &Actor,
        donation_request_id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        // A shared lock keeps the request approved until the insert commits
        let request = lock_donation_request(&mut tx, donation_request_id, "FOR SHARE").await?;
        donation_requests::check_accepts_donations(&request)?;

        let donation = payload
            .into_contribution(request.kind)?
            .into_donation(donation_request_id, actor.user_id);

        let row = sqlx::query(
            r#"
            INSERT INTO donations (id, donation_request_id, user_id, kind, amount,
                                   item_description, quantity, item_image, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, donation_request_id, user_id, kind, amount, item_description,
                      quantity, item_image, status, created_at, updated_at
            "#,
        )
        .bind(donation.id)
        .bind(donation.donation_request_id)
        .bind(donation.user_id)
        .bind(donation.kind.as_str())
        .bind(donation.amount)
        .bind(&donation.item_description)
        .bind(donation.quantity)
        .bind(&donation.item_image)
        .bind(donation.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_from_row(&row)
    }

    async fn review_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Donation> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        let donation = lock_donation(&mut tx, id).await?;
        let request =
            lock_donation_request(&mut tx, donation.donation_request_id, "FOR SHARE").await?;
        authz::require_owner_or_admin(actor, request.user_id, &roles, "review this donation")?;

        let status = donation.status.decide(decision)?;

        let row = sqlx::query(
            r#"
            UPDATE donations
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, donation_request_id, user_id, kind, amount, item_description,
                      quantity, item_image, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_from_row(&row)
    }

    async fn update_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        let mut donation = lock_donation(&mut tx, id).await?;
        authz::require_owner_or_admin(actor, donation.user_id, &roles, "edit this donation")?;
        donations::check_editable(&donation)?;

        let request =
            lock_donation_request(&mut tx, donation.donation_request_id, "FOR SHARE").await?;
        donation.apply(payload.into_contribution(request.kind)?);

        let row = sqlx::query(
            r#"
            UPDATE donations
            SET amount = $2, item_description = $3, quantity = $4, item_image = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, donation_request_id, user_id, kind, amount, item_description,
                      quantity, item_image, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(donation.amount)
        .bind(&donation.item_description)
        .bind(donation.quantity)
        .bind(&donation.item_image)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        donation_from_row(&row)
    }

    async fn delete_donation(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let roles = roles_in(&mut tx, actor.user_id).await?;
        let donation = lock_donation(&mut tx, id).await?;
        authz::require_owner_or_admin(actor, donation.user_id, &roles, "delete this donation")?;

        sqlx::query("DELETE FROM donations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn donation_ledger(
        &self,
        donation_request_id: Uuid,
    ) -> WorkflowResult<Option<(DonationRequest, Vec<Donation>)>> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

        let request = match lock_donation_request(&mut tx, donation_request_id, "").await {
            Ok(request) => request,
            Err(WorkflowError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let rows = sqlx::query(
            r#"
            SELECT id, donation_request_id, user_id, kind, amount, item_description, quantity,
                   item_image, status, created_at, updated_at
            FROM donations
            WHERE donation_request_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(donation_request_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;

        let donations = rows
            .iter()
            .map(donation_from_row)
            .collect::<WorkflowResult<Vec<_>>>()?;
        Ok(Some((request, donations)))
    }

    async fn list_donations(&self, filter: DonationFilter) -> WorkflowResult<Vec<Donation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, donation_request_id, user_id, kind, amount, item_description, quantity,
                   item_image, status, created_at, updated_at
            FROM donations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL OR donation_request_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.donation_request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter().map(donation_from_row).collect()
    }
}
