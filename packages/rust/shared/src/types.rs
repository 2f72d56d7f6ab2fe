//! Core domain types for Codestep tutorials.
//!
//! All records serialize with camelCase field names, which is the shape the
//! HTTP API exposes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodestepError;

/// File name of the code block every freshly created instruction starts with.
pub const DEFAULT_CODE_BLOCK_FILE_NAME: &str = "index.tsx";

/// Placeholder source of the default code block.
pub const DEFAULT_CODE_BLOCK_CODE: &str = "console.log('Hello World!');";

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for row identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a new time-sortable identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Technology variants
// ---------------------------------------------------------------------------

/// Frontend framework half of a project variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontendVariant {
    #[serde(rename = "NextJS")]
    NextJs,
    React,
    Vue,
    Svelte,
}

impl FrontendVariant {
    /// Stored/serialized name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NextJs => "NextJS",
            Self::React => "React",
            Self::Vue => "Vue",
            Self::Svelte => "Svelte",
        }
    }
}

impl std::fmt::Display for FrontendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FrontendVariant {
    type Err = CodestepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NextJS" => Ok(Self::NextJs),
            "React" => Ok(Self::React),
            "Vue" => Ok(Self::Vue),
            "Svelte" => Ok(Self::Svelte),
            other => Err(CodestepError::validation(format!(
                "unknown frontend variant '{other}'"
            ))),
        }
    }
}

/// Backend framework half of a project variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendVariant {
    Supabase,
    Firebase,
    Express,
    Django,
}

impl BackendVariant {
    /// Stored/serialized name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supabase => "Supabase",
            Self::Firebase => "Firebase",
            Self::Express => "Express",
            Self::Django => "Django",
        }
    }
}

impl std::fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendVariant {
    type Err = CodestepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Supabase" => Ok(Self::Supabase),
            "Firebase" => Ok(Self::Firebase),
            "Express" => Ok(Self::Express),
            "Django" => Ok(Self::Django),
            other => Err(CodestepError::validation(format!(
                "unknown backend variant '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// A tutorial project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One (frontend, backend) technology combination of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVariant {
    pub id: String,
    /// Owning project.
    pub projects_id: String,
    pub frontend_variant: FrontendVariant,
    pub backend_variant: BackendVariant,
    /// User id of the variant's author.
    pub author_id: String,
}

/// A user's ownership record of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedProject {
    pub id: String,
    pub user_id: String,
    pub projects_id: String,
    pub purchased_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// One step of a tutorial (scalar columns only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub id: String,
    pub project_variant_id: String,
    pub title: String,
    pub explanation: String,
    pub has_code_blocks: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An instruction together with its code blocks and success media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionDetail {
    #[serde(flatten)]
    pub instruction: Instruction,
    /// Code blocks in creation order.
    pub code_blocks: Vec<CodeBlock>,
    /// Every success media record ever attached, oldest first.
    pub success_media: Vec<SuccessMedia>,
}

/// `id` + `title` pair used for prev/next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionTitle {
    pub id: String,
    pub title: String,
}

/// Partial update of an instruction. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_media: Option<NewSuccessMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_code_blocks: Option<bool>,
}

impl InstructionPatch {
    /// Explanation to write, treating an empty string as absent.
    pub fn effective_explanation(&self) -> Option<&str> {
        self.explanation.as_deref().filter(|e| !e.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Code blocks & success media
// ---------------------------------------------------------------------------

/// A named file of example code attached to an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub id: String,
    pub instructions_id: String,
    pub file_name: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Code block contents supplied by a caller before it has an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCodeBlock {
    pub file_name: String,
    pub code: String,
}

impl NewCodeBlock {
    /// The placeholder block an empty instruction is created with.
    pub fn placeholder() -> Self {
        Self {
            file_name: DEFAULT_CODE_BLOCK_FILE_NAME.into(),
            code: DEFAULT_CODE_BLOCK_CODE.into(),
        }
    }
}

/// Image + caption shown when a learner completes an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMedia {
    pub id: String,
    pub instructions_id: String,
    pub media_url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

/// Success media supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuccessMedia {
    pub media_url: String,
    pub caption: String,
}
