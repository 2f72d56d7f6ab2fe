//! Project queries backing the tutorial page: variant resolution and purchases.

use codestep_shared::{
    BackendVariant, CodestepError, FrontendVariant, ProjectVariant, PurchasedProject, Result,
};
use codestep_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::endpoint::{log_completed, log_started, to_log_json};
use crate::identity::Identity;

const NAMESPACE: &str = "projects";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVariantInput {
    pub projects_id: String,
    pub frontend_variant: FrontendVariant,
    pub backend_variant: BackendVariant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedProjectsInput {
    /// Whose purchases to list; `None` lists nothing.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Resolve the variant of a project for one technology combination. Public.
#[instrument(skip_all, fields(projects_id = %input.projects_id))]
pub async fn get_project_variant_id(
    storage: &Storage,
    identity: &Identity,
    input: &ProjectVariantInput,
) -> Result<Option<ProjectVariant>> {
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "getProjectVariantId", &input_json);

    let result = storage
        .find_project_variant(
            &input.projects_id,
            input.frontend_variant,
            input.backend_variant,
        )
        .await?;

    log_completed(
        NAMESPACE,
        identity,
        "getProjectVariantId",
        &input_json,
        Some(&to_log_json(&result)),
    );
    Ok(result)
}

/// Purchases recorded for `input.user_id`. Private: callers list their own
/// purchases unless they are admins.
#[instrument(skip_all)]
pub async fn get_users_purchased_projects(
    storage: &Storage,
    identity: &Identity,
    input: &PurchasedProjectsInput,
) -> Result<Vec<PurchasedProject>> {
    let caller = identity.require_user()?;
    if let Some(user_id) = input.user_id.as_deref() {
        if user_id != caller && !identity.is_admin {
            return Err(CodestepError::Forbidden(
                "cannot list another user's purchases".into(),
            ));
        }
    }
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "getUsersPurchasedProjects", &input_json);

    let result = match input.user_id.as_deref() {
        Some(user_id) => storage.list_purchased_projects(user_id).await?,
        None => Vec::new(),
    };

    log_completed(
        NAMESPACE,
        identity,
        "getUsersPurchasedProjects",
        &input_json,
        Some(&to_log_json(&result)),
    );
    Ok(result)
}
