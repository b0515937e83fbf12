//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use domain::{Registration, WorkflowError};
use domain::models::{
    Actor, Dashboard, DonationPayload, NewDonationRequest, NewProject, UpdateDonationRequest,
    UpdateProject, User,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{BearerHeader, actor_from_bearer, auth_middleware},
    models::{
        AuthResponse, DecisionPayload, LoginRequest, MeResponse, RegisterResponse,
        RoleAssignmentPayload, RoleRequestPayload, StatusQuery,
    },
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/me/projects", get(my_projects))
        .route("/me/managed-projects", get(my_managed_projects))
        .route("/me/donations", get(my_donations))
        .route("/me/role-requests", get(my_role_requests))
        .route("/me/donation-requests", get(my_donation_requests))
        .route("/role-requests", post(submit_role_request))
        .route("/projects", post(create_project))
        .route("/projects/:id", axum::routing::put(update_project).delete(delete_project))
        .route("/projects/:id/join", post(join_project))
        .route("/projects/:id/leave", post(leave_project))
        .route("/donation-requests", post(create_donation_request))
        .route(
            "/donation-requests/:id",
            axum::routing::put(update_donation_request).delete(delete_donation_request),
        )
        .route("/donation-requests/:id/donations", post(add_donation))
        .route("/donations/:id/review", post(review_donation))
        .route(
            "/donations/:id",
            axum::routing::put(update_donation).delete(delete_donation),
        )
        .route("/admin/users", get(list_users))
        .route("/admin/roles/assign", post(assign_role))
        .route("/admin/roles/unassign", post(unassign_role))
        .route("/admin/role-requests", get(pending_role_requests))
        .route("/admin/role-requests/:id/decision", post(decide_role_request))
        .route("/admin/donation-requests", get(pending_donation_requests))
        .route(
            "/admin/donation-requests/:id/decision",
            post(decide_donation_request),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/roles", get(list_roles))
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
        .route("/donation-requests", get(list_donation_requests))
        .route("/donation-requests/:id", get(get_donation_request))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            _ => "unavailable",
        },
        None => "memory",
    };

    Json(json!({
        "status": "ok",
        "service": "gotong-api",
        "database": database,
    }))
}

/// Issue a token and bundle it with the user's roles
async fn auth_response(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let roles = state.identity.roles_of(user.id).await?;
    let access_token = state
        .jwt_service
        .generate_access_token(user.id)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        dashboard: Dashboard::for_roles(&roles),
        user,
        roles,
    })
}

/// Register a new user, optionally with a role request
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> ApiResult<impl IntoResponse> {
    let (user, role_request) = state.identity.register(payload).await?;
    let auth = auth_response(&state, user).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { auth, role_request })))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .identity
        .authenticate(&payload.email, &payload.password)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(auth_response(&state, user).await?))
}

/// The static role catalog
pub async fn list_roles(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.identity.catalog())
}

pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .identity
        .find_user(actor.user_id)
        .await
        .map_err(|e| match e {
            WorkflowError::NotFound(_) => ApiError::Unauthorized,
            e => e.into(),
        })?;
    let roles = state.identity.roles_of(actor.user_id).await?;

    Ok(Json(MeResponse {
        user,
        dashboard: Dashboard::for_roles(&roles),
        roles,
    }))
}

pub async fn my_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.projects.joined_by(actor.user_id).await?))
}

pub async fn my_managed_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.projects.managed_by(actor.user_id).await?))
}

pub async fn my_donations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.donations.own(&actor).await?))
}

pub async fn my_role_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.role_requests.own(&actor).await?))
}

pub async fn my_donation_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .donation_requests
            .own(&actor, query.status)
            .await?,
    ))
}

pub async fn submit_role_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RoleRequestPayload>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .role_requests
        .submit(&actor, &payload.role, &payload.reason)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.projects.list().await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let viewer = actor_from_bearer(&state.jwt_service, bearer.as_ref());
    Ok(Json(state.projects.get(viewer.as_ref(), id).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewProject>,
) -> ApiResult<impl IntoResponse> {
    let project = state.projects.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProject>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.projects.update(&actor, id, payload).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.projects.delete(&actor, id).await?;
    Ok(Json(json!({"message": "Project deleted successfully"})))
}

pub async fn join_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let membership = state.projects.join(&actor, id).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn leave_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.projects.leave(&actor, id).await?;
    Ok(Json(json!({"message": "Left project"})))
}

/// Approved donation requests
pub async fn list_donation_requests(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.donation_requests.public().await?))
}

/// Donation request with its progress and donations
pub async fn get_donation_request(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let viewer = actor_from_bearer(&state.jwt_service, bearer.as_ref());
    Ok(Json(state.donations.detail(viewer.as_ref(), id).await?))
}

pub async fn create_donation_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewDonationRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.donation_requests.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn update_donation_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDonationRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .donation_requests
            .update(&actor, id, payload)
            .await?,
    ))
}

pub async fn delete_donation_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.donation_requests.delete(&actor, id).await?;
    Ok(Json(json!({"message": "Donation request deleted successfully"})))
}

pub async fn add_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DonationPayload>,
) -> ApiResult<impl IntoResponse> {
    let donation = state.donations.add_donation(&actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn review_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .donations
            .review(&actor, id, payload.decision)
            .await?,
    ))
}

pub async fn update_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DonationPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.donations.update(&actor, id, payload).await?))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.donations.delete(&actor, id).await?;
    Ok(Json(json!({"message": "Donation deleted successfully"})))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.identity.list_users(&actor).await?))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RoleAssignmentPayload>,
) -> ApiResult<impl IntoResponse> {
    state
        .identity
        .assign_role(&actor, payload.user_id, &payload.role)
        .await?;
    Ok(Json(json!({"message": "Role assigned"})))
}

pub async fn unassign_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RoleAssignmentPayload>,
) -> ApiResult<impl IntoResponse> {
    state
        .identity
        .unassign_role(&actor, payload.user_id, &payload.role)
        .await?;
    Ok(Json(json!({"message": "Role unassigned"})))
}

pub async fn pending_role_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.role_requests.pending(&actor).await?))
}

pub async fn decide_role_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .role_requests
            .decide(&actor, id, payload.decision)
            .await?,
    ))
}

pub async fn pending_donation_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.donation_requests.pending(&actor).await?))
}

pub async fn decide_donation_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .donation_requests
            .decide(&actor, id, payload.decision)
            .await?,
    ))
}

#[cfg(test)]
mod tests;
