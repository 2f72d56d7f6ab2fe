//! Tutorial page controller for `/projectsv2/{projectId}`.
//!
//! Rendering happens in two steps, both run per request:
//!
//! 1. [`load_page_props`] resolves the configured project variant, its
//!    instruction titles, the Q&A feature flag, and authorship.
//! 2. [`render_page`] fetches the active instruction and the user's purchases
//!    concurrently, applies the access policy, and builds the navigation.
//!
//! Every failure to find something (project, variant, instruction, access)
//! collapses into [`PageView::NotFound`] so callers cannot tell "missing" from
//! "not yours".

use codestep_flags::FlagClient;
use codestep_shared::{
    AppConfig, BackendVariant, CodestepError, FeatureFlagSettings, FrontendVariant, InstructionDetail,
    InstructionTitle, PurchasedProject, Result,
};
use codestep_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::identity::Identity;
use crate::instructions::{self, GetInstructionInput, InstructionTitlesInput};
use crate::navigation::{find_next_instruction, find_previous_instruction};
use crate::projects::{self, ProjectVariantInput, PurchasedProjectsInput};

// ---------------------------------------------------------------------------
// Settings & props
// ---------------------------------------------------------------------------

/// Which variant the page serves and how flags are evaluated.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub frontend_variant: FrontendVariant,
    pub backend_variant: BackendVariant,
    pub flags: FeatureFlagSettings,
}

impl From<&AppConfig> for PageSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            frontend_variant: config.tutorial.frontend_variant,
            backend_variant: config.tutorial.backend_variant,
            flags: FeatureFlagSettings::from(config),
        }
    }
}

/// Server-side props computed before the view is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProps {
    /// The variant served for this project; `None` renders not-found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_variant_id: Option<String>,
    pub project_instruction_titles: Vec<InstructionTitle>,
    #[serde(rename = "isQAFeatureEnabled")]
    pub is_qa_feature_enabled: bool,
    pub is_author: bool,
}

/// Route query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub instruction_id: Option<String>,
    #[serde(default)]
    pub successfully_purchased: Option<String>,
    /// Admin-only editing toggle state.
    #[serde(default)]
    pub editing: Option<bool>,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// What the page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum PageView {
    NotFound,
    Tutorial(Box<TutorialView>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialView {
    pub project_id: String,
    pub instruction: InstructionDetail,
    pub project_instruction_titles: Vec<InstructionTitle>,
    #[serde(rename = "isQAFeatureEnabled")]
    pub is_qa_feature_enabled: bool,
    pub is_author: bool,
    pub is_admin: bool,
    pub is_editing: bool,
    /// Present for admins only.
    pub editing_toggle: Option<EditingToggle>,
    pub show_purchase_banner: bool,
    /// Whether the code panel is laid out next to the sidebar.
    pub show_code_blocks: bool,
    pub previous: Option<NavLink>,
    pub next: NextAction,
}

/// The button an admin sees to flip editing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditingToggle {
    EnableEditing,
    DisableEditing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavLink {
    pub id: String,
    pub title: String,
    pub href: String,
}

/// "Next" when there is a following instruction, otherwise "Finish tutorial".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NextAction {
    Next(NavLink),
    Finish { href: String },
}

fn instruction_href(project_id: &str, instruction_id: &str) -> String {
    format!("/projectsv2/{project_id}?instructionId={instruction_id}")
}

fn completed_href(project_id: &str) -> String {
    format!("/projectsv2/{project_id}/completed")
}

fn nav_link(project_id: &str, title: &InstructionTitle) -> NavLink {
    NavLink {
        id: title.id.clone(),
        title: title.title.clone(),
        href: instruction_href(project_id, &title.id),
    }
}

// ---------------------------------------------------------------------------
// Step 1: props
// ---------------------------------------------------------------------------

/// Compute the page props. Missing project id or variant yields empty props.
#[instrument(skip_all, fields(project_id = project_id.unwrap_or_default()))]
pub async fn load_page_props(
    storage: &Storage,
    settings: &PageSettings,
    identity: &Identity,
    project_id: Option<&str>,
) -> Result<PageProps> {
    info!("[projectsv2] Starting page props");

    let Some(project_id) = project_id.filter(|id| !id.is_empty()) else {
        error!("[projectsv2] No projectId found");
        return Ok(PageProps::default());
    };

    let variant = projects::get_project_variant_id(
        storage,
        identity,
        &ProjectVariantInput {
            projects_id: project_id.to_string(),
            frontend_variant: settings.frontend_variant,
            backend_variant: settings.backend_variant,
        },
    )
    .await?;

    let Some(variant) = variant else {
        error!("[projectsv2] No project found");
        return Ok(PageProps::default());
    };

    let project_instruction_titles = instructions::get_instruction_titles_for_project_variant_id(
        storage,
        identity,
        &InstructionTitlesInput {
            project_variant_id: variant.id.clone(),
        },
    )
    .await?;

    let is_qa_feature_enabled = evaluate_qa_flag(&settings.flags, identity.user_id()).await;
    let is_author = identity.user_id() == Some(variant.author_id.as_str());

    Ok(PageProps {
        project_variant_id: Some(variant.id),
        project_instruction_titles,
        is_qa_feature_enabled,
        is_author,
    })
}

/// Q&A flag for `user_id`. Only evaluated in production for a signed-in user;
/// any failure counts as disabled.
pub async fn evaluate_qa_flag(settings: &FeatureFlagSettings, user_id: Option<&str>) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if !settings.environment.is_production() {
        return false;
    }

    let client = match FlagClient::from_settings(settings) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "[projectsv2] feature flag client unavailable");
            return false;
        }
    };

    let enabled = match client.is_feature_enabled(&settings.qa_flag, user_id).await {
        Ok(value) => value.unwrap_or(false),
        Err(e) => {
            warn!(error = %e, flag = %settings.qa_flag, "[projectsv2] feature flag check failed");
            false
        }
    };
    client.shutdown().await;
    enabled
}

// ---------------------------------------------------------------------------
// Step 2: view
// ---------------------------------------------------------------------------

/// Build the view for `project_id` from previously loaded props.
#[instrument(skip_all, fields(project_id = %project_id, instruction_id = query.instruction_id.as_deref().unwrap_or_default()))]
pub async fn render_page(
    storage: &Storage,
    props: PageProps,
    identity: &Identity,
    project_id: &str,
    query: &PageQuery,
) -> Result<PageView> {
    if project_id.is_empty() {
        return Ok(PageView::NotFound);
    }

    let (instruction, purchases) = tokio::join!(
        fetch_instruction(storage, identity, query.instruction_id.as_deref()),
        fetch_purchases(storage, identity),
    );
    let instruction = instruction?;
    let purchases = purchases?;

    let has_purchased = purchases.iter().any(|p| p.projects_id == project_id);
    if !has_purchased && !identity.is_admin {
        info!("[projectsv2] access denied, rendering not found");
        return Ok(PageView::NotFound);
    }
    let Some(variant_id) = props.project_variant_id.as_deref() else {
        info!("[projectsv2] no variant for project, rendering not found");
        return Ok(PageView::NotFound);
    };
    // Only instructions of this project's variant are reachable from its page
    let Some(instruction) =
        instruction.filter(|detail| detail.instruction.project_variant_id == variant_id)
    else {
        return Ok(PageView::NotFound);
    };

    let titles = &props.project_instruction_titles;
    let current_id = instruction.instruction.id.as_str();
    let previous =
        find_previous_instruction(titles, current_id, project_id).map(|t| nav_link(project_id, t));
    let next = match find_next_instruction(titles, current_id, project_id) {
        Some(t) => NextAction::Next(nav_link(project_id, t)),
        None => NextAction::Finish {
            href: completed_href(project_id),
        },
    };

    let is_editing = identity.is_admin && query.editing.unwrap_or(false);
    let editing_toggle = identity.is_admin.then_some(if is_editing {
        EditingToggle::DisableEditing
    } else {
        EditingToggle::EnableEditing
    });

    Ok(PageView::Tutorial(Box::new(TutorialView {
        project_id: project_id.to_string(),
        show_code_blocks: instruction.instruction.has_code_blocks,
        instruction,
        project_instruction_titles: props.project_instruction_titles,
        is_qa_feature_enabled: props.is_qa_feature_enabled,
        is_author: props.is_author,
        is_admin: identity.is_admin,
        is_editing,
        editing_toggle,
        show_purchase_banner: query.successfully_purchased.as_deref() == Some("true"),
        previous,
        next,
    })))
}

/// The instruction as the page sees it: an anonymous caller or a missing id
/// simply yields no data.
async fn fetch_instruction(
    storage: &Storage,
    identity: &Identity,
    instruction_id: Option<&str>,
) -> Result<Option<InstructionDetail>> {
    let Some(instruction_id) = instruction_id else {
        return Ok(None);
    };
    let input = GetInstructionInput {
        instruction_id: instruction_id.to_string(),
    };
    match instructions::get_by_id(storage, identity, &input).await {
        Err(CodestepError::Unauthorized(_)) => Ok(None),
        other => other,
    }
}

async fn fetch_purchases(storage: &Storage, identity: &Identity) -> Result<Vec<PurchasedProject>> {
    let input = PurchasedProjectsInput {
        user_id: identity.user_id.clone(),
    };
    match projects::get_users_purchased_projects(storage, identity, &input).await {
        Err(CodestepError::Unauthorized(_)) => Ok(Vec::new()),
        other => other,
    }
}
