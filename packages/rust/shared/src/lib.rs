//! Shared types, error model, and configuration for Codestep.
//!
//! Every other Codestep crate depends on this one for [`CodestepError`], the
//! domain types ([`Instruction`], [`CodeBlock`], [`ProjectVariant`], ...) and
//! configuration loading ([`AppConfig`], [`FeatureFlagSettings`]).

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, ENVIRONMENT_ENV_VAR, Environment, FeatureFlagSettings,
    FeatureFlagsConfig, RuntimeConfig, ServerConfig, TutorialConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_environment,
};
pub use error::{CodestepError, Result};
pub use types::{
    BackendVariant, CodeBlock, DEFAULT_CODE_BLOCK_CODE, DEFAULT_CODE_BLOCK_FILE_NAME,
    FrontendVariant, Instruction, InstructionDetail, InstructionPatch, InstructionTitle,
    NewCodeBlock, NewSuccessMedia, Project, ProjectVariant, PurchasedProject, RecordId,
    SuccessMedia,
};
