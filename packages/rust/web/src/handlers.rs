//! Route handlers. Each one resolves the caller's identity from headers and
//! delegates to `codestep_core`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use codestep_core::instructions::{
    self, CreateEmptyInstructionInput, DeleteInstructionInput, DuplicateInstructionInput,
    GetInstructionInput, InstructionTitlesInput, UpdateInstructionInput,
};
use codestep_core::page::{self, PageQuery, PageView};
use codestep_core::projects::{self, ProjectVariantInput, PurchasedProjectsInput};
use codestep_core::Identity;
use codestep_shared::{
    Instruction, InstructionDetail, InstructionTitle, ProjectVariant, PurchasedProject,
};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header set to `true` or `1` for admins.
pub const USER_IS_ADMIN_HEADER: &str = "x-user-is-admin";

pub(crate) fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let Some(user_id) = user_id else {
        return Identity::anonymous();
    };
    let is_admin = headers
        .get(USER_IS_ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches!(v.trim(), "true" | "1"));
    Identity {
        user_id: Some(user_id),
        is_admin,
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

pub async fn project_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Response> {
    let identity = identity_from_headers(&headers);
    let props =
        page::load_page_props(&state.storage, &state.page, &identity, Some(&project_id)).await?;
    let view = page::render_page(&state.storage, props, &identity, &project_id, &query).await?;

    let status = match view {
        PageView::NotFound => StatusCode::NOT_FOUND,
        PageView::Tutorial(_) => StatusCode::OK,
    };
    Ok((status, Json(view)).into_response())
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

pub async fn delete_instruction(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<DeleteInstructionInput>,
) -> ApiResult<Json<Instruction>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::delete(&state.storage, &identity, &input).await?,
    ))
}

pub async fn create_empty_instruction(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<CreateEmptyInstructionInput>,
) -> ApiResult<Json<Instruction>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::create_empty_instruction(&state.storage, &identity, &input).await?,
    ))
}

pub async fn duplicate_instruction(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<DuplicateInstructionInput>,
) -> ApiResult<Json<Instruction>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::duplicate_instruction(&state.storage, &identity, &input).await?,
    ))
}

pub async fn update_instruction(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<UpdateInstructionInput>,
) -> ApiResult<Json<Instruction>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::update(&state.storage, &identity, &input).await?,
    ))
}

pub async fn instruction_titles(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(input): ApiQuery<InstructionTitlesInput>,
) -> ApiResult<Json<Vec<InstructionTitle>>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::get_instruction_titles_for_project_variant_id(
            &state.storage,
            &identity,
            &input,
        )
        .await?,
    ))
}

pub async fn instruction_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(input): ApiQuery<GetInstructionInput>,
) -> ApiResult<Json<Option<InstructionDetail>>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        instructions::get_by_id(&state.storage, &identity, &input).await?,
    ))
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub async fn project_variant(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(input): ApiQuery<ProjectVariantInput>,
) -> ApiResult<Json<Option<ProjectVariant>>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        projects::get_project_variant_id(&state.storage, &identity, &input).await?,
    ))
}

pub async fn purchased_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(input): ApiQuery<PurchasedProjectsInput>,
) -> ApiResult<Json<Vec<PurchasedProject>>> {
    let identity = identity_from_headers(&headers);
    Ok(Json(
        projects::get_users_purchased_projects(&state.storage, &identity, &input).await?,
    ))
}
