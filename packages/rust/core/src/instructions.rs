//! Instruction endpoints: create, duplicate, update, delete and the two reads.
//!
//! Every operation is a single pass-through to [`Storage`] wrapped in
//! start/completion log events under the `[instructions]` namespace. Input is
//! only shape-checked (by deserialization); there is no retry and no
//! idempotency key, so store errors surface to the caller unchanged.

use codestep_shared::{
    Instruction, InstructionDetail, InstructionPatch, InstructionTitle, NewCodeBlock, Result,
};
use codestep_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::endpoint::{log_completed, log_started, to_log_json};
use crate::identity::Identity;

const NAMESPACE: &str = "instructions";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteInstructionInput {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmptyInstructionInput {
    pub project_variant_id: String,
}

/// A code block copied client-side from the source instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCodeBlockInput {
    /// Owner of the source block; not used for the copy.
    pub instructions_id: String,
    pub code: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateInstructionInput {
    pub project_variant_id: String,
    pub explanation: String,
    pub code_blocks: Vec<DuplicateCodeBlockInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstructionInput {
    pub instruction_id: String,
    #[serde(flatten)]
    pub patch: InstructionPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionTitlesInput {
    pub project_variant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInstructionInput {
    pub instruction_id: String,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Remove one instruction. A missing id is [`NotFound`](codestep_shared::CodestepError::NotFound).
#[instrument(skip_all, fields(id = %input.id))]
pub async fn delete(
    storage: &Storage,
    identity: &Identity,
    input: &DeleteInstructionInput,
) -> Result<Instruction> {
    identity.require_user()?;
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "delete", &input_json);

    let result = storage.delete_instruction(&input.id).await?;

    log_completed(NAMESPACE, identity, "delete", &input_json, Some(&to_log_json(&result)));
    Ok(result)
}

/// Create an instruction holding the placeholder code block.
#[instrument(skip_all, fields(project_variant_id = %input.project_variant_id))]
pub async fn create_empty_instruction(
    storage: &Storage,
    identity: &Identity,
    input: &CreateEmptyInstructionInput,
) -> Result<Instruction> {
    identity.require_user()?;
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "createEmptyInstruction", &input_json);

    let result = storage
        .create_instruction(&input.project_variant_id, "", &[NewCodeBlock::placeholder()])
        .await?;

    log_completed(
        NAMESPACE,
        identity,
        "createEmptyInstruction",
        &input_json,
        Some(&to_log_json(&result)),
    );
    Ok(result)
}

/// Create an instruction from caller-copied explanation and code blocks.
#[instrument(skip_all, fields(project_variant_id = %input.project_variant_id, blocks = input.code_blocks.len()))]
pub async fn duplicate_instruction(
    storage: &Storage,
    identity: &Identity,
    input: &DuplicateInstructionInput,
) -> Result<Instruction> {
    identity.require_user()?;
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "duplicateInstruction", &input_json);

    let blocks: Vec<NewCodeBlock> = input
        .code_blocks
        .iter()
        .map(|b| NewCodeBlock {
            file_name: b.file_name.clone(),
            code: b.code.clone(),
        })
        .collect();
    let result = storage
        .create_instruction(&input.project_variant_id, &input.explanation, &blocks)
        .await?;

    log_completed(
        NAMESPACE,
        identity,
        "duplicateInstruction",
        &input_json,
        Some(&to_log_json(&result)),
    );
    Ok(result)
}

/// Patch the fields present in the input. Success media is always appended.
#[instrument(skip_all, fields(instruction_id = %input.instruction_id))]
pub async fn update(
    storage: &Storage,
    identity: &Identity,
    input: &UpdateInstructionInput,
) -> Result<Instruction> {
    identity.require_user()?;
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "update", &input_json);

    let result = storage
        .update_instruction(&input.instruction_id, &input.patch)
        .await?;

    log_completed(NAMESPACE, identity, "update", &input_json, Some(&to_log_json(&result)));
    Ok(result)
}

/// `(id, title)` pairs for a variant, in the order navigation relies on.
/// Public: no identity required.
#[instrument(skip_all, fields(project_variant_id = %input.project_variant_id))]
pub async fn get_instruction_titles_for_project_variant_id(
    storage: &Storage,
    identity: &Identity,
    input: &InstructionTitlesInput,
) -> Result<Vec<InstructionTitle>> {
    let input_json = to_log_json(input);
    log_started(
        NAMESPACE,
        identity,
        "getInstructionTitlesForProjectVariantId",
        &input_json,
    );

    let result = storage
        .list_instruction_titles(&input.project_variant_id)
        .await?;

    log_completed(
        NAMESPACE,
        identity,
        "getInstructionTitlesForProjectVariantId",
        &input_json,
        Some(&to_log_json(&result)),
    );
    Ok(result)
}

/// The full instruction, or `None` when absent.
#[instrument(skip_all, fields(instruction_id = %input.instruction_id))]
pub async fn get_by_id(
    storage: &Storage,
    identity: &Identity,
    input: &GetInstructionInput,
) -> Result<Option<InstructionDetail>> {
    identity.require_user()?;
    let input_json = to_log_json(input);
    log_started(NAMESPACE, identity, "getById", &input_json);

    let result = storage.get_instruction(&input.instruction_id).await?;

    log_completed(NAMESPACE, identity, "getById", &input_json, None);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codestep_shared::{
        BackendVariant, CodestepError, DEFAULT_CODE_BLOCK_CODE, DEFAULT_CODE_BLOCK_FILE_NAME,
        FrontendVariant, NewSuccessMedia,
    };

    async fn setup() -> (Storage, String) {
        let tmp = std::env::temp_dir().join(format!("codestep_core_{}.db", uuid::Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        let project = storage.insert_project("Chat app").await.unwrap();
        let variant = storage
            .insert_project_variant(
                &project.id,
                FrontendVariant::NextJs,
                BackendVariant::Supabase,
                "author-1",
            )
            .await
            .unwrap();
        (storage, variant.id)
    }

    fn media(url: &str, caption: &str) -> NewSuccessMedia {
        NewSuccessMedia {
            media_url: url.into(),
            caption: caption.into(),
        }
    }

    #[tokio::test]
    async fn create_empty_adds_placeholder_block() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");

        let created = create_empty_instruction(
            &storage,
            &user,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id,
            },
        )
        .await
        .expect("create");

        let detail = get_by_id(
            &storage,
            &user,
            &GetInstructionInput {
                instruction_id: created.id,
            },
        )
        .await
        .unwrap()
        .expect("instruction exists");
        assert_eq!(detail.code_blocks.len(), 1);
        assert_eq!(detail.code_blocks[0].file_name, DEFAULT_CODE_BLOCK_FILE_NAME);
        assert_eq!(detail.code_blocks[0].code, DEFAULT_CODE_BLOCK_CODE);
    }

    #[tokio::test]
    async fn duplicate_with_empty_code_blocks() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");

        let created = duplicate_instruction(
            &storage,
            &user,
            &DuplicateInstructionInput {
                project_variant_id: variant_id,
                explanation: "Step two, copied".into(),
                code_blocks: vec![],
            },
        )
        .await
        .expect("duplicate");
        assert_eq!(created.explanation, "Step two, copied");

        let blocks = storage.list_code_blocks(&created.id).await.unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn duplicate_copies_blocks_under_new_owner() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");

        let created = duplicate_instruction(
            &storage,
            &user,
            &DuplicateInstructionInput {
                project_variant_id: variant_id,
                explanation: String::new(),
                code_blocks: vec![
                    DuplicateCodeBlockInput {
                        instructions_id: "source-instruction".into(),
                        code: "export {}".into(),
                        file_name: "page.tsx".into(),
                    },
                    DuplicateCodeBlockInput {
                        instructions_id: "source-instruction".into(),
                        code: "select 1;".into(),
                        file_name: "schema.sql".into(),
                    },
                ],
            },
        )
        .await
        .unwrap();

        let blocks = storage.list_code_blocks(&created.id).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.instructions_id == created.id));
        assert_eq!(blocks[1].file_name, "schema.sql");
    }

    #[tokio::test]
    async fn update_has_code_blocks_only() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");
        let created = duplicate_instruction(
            &storage,
            &user,
            &DuplicateInstructionInput {
                project_variant_id: variant_id,
                explanation: "unchanged".into(),
                code_blocks: vec![],
            },
        )
        .await
        .unwrap();

        let input: UpdateInstructionInput = serde_json::from_value(serde_json::json!({
            "instructionId": created.id,
            "hasCodeBlocks": true,
        }))
        .expect("parse input");
        let updated = update(&storage, &user, &input).await.unwrap();

        assert!(updated.has_code_blocks);
        assert_eq!(updated.explanation, "unchanged");
        assert!(storage.list_success_media(&created.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_twice_with_media_keeps_both() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");
        let created = create_empty_instruction(
            &storage,
            &user,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id,
            },
        )
        .await
        .unwrap();

        for m in [media("https://cdn/1.gif", "done!"), media("https://cdn/2.gif", "again")] {
            let input = UpdateInstructionInput {
                instruction_id: created.id.clone(),
                patch: InstructionPatch {
                    success_media: Some(m),
                    ..Default::default()
                },
            };
            update(&storage, &user, &input).await.unwrap();
        }

        let media = storage.list_success_media(&created.id).await.unwrap();
        assert_eq!(media.len(), 2);
        assert_ne!(media[0].media_url, media[1].media_url);
    }

    #[tokio::test]
    async fn delete_removes_once() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");
        let created = create_empty_instruction(
            &storage,
            &user,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id,
            },
        )
        .await
        .unwrap();

        let deleted = delete(&storage, &user, &DeleteInstructionInput { id: created.id.clone() })
            .await
            .unwrap();
        assert_eq!(deleted.id, created.id);

        let err = delete(&storage, &user, &DeleteInstructionInput { id: created.id.clone() })
            .await
            .unwrap_err();
        assert!(matches!(err, CodestepError::NotFound { .. }));

        let fetched = get_by_id(
            &storage,
            &user,
            &GetInstructionInput {
                instruction_id: created.id,
            },
        )
        .await
        .unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn titles_are_public_and_ordered() {
        let (storage, variant_id) = setup().await;
        let user = Identity::user("author-1");
        let first = create_empty_instruction(
            &storage,
            &user,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id.clone(),
            },
        )
        .await
        .unwrap();
        let second = create_empty_instruction(
            &storage,
            &user,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id.clone(),
            },
        )
        .await
        .unwrap();

        let titles = get_instruction_titles_for_project_variant_id(
            &storage,
            &Identity::anonymous(),
            &InstructionTitlesInput {
                project_variant_id: variant_id,
            },
        )
        .await
        .expect("anonymous titles");
        let ids: Vec<_> = titles.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, [first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn private_operations_reject_anonymous() {
        let (storage, variant_id) = setup().await;
        let anon = Identity::anonymous();

        let err = create_empty_instruction(
            &storage,
            &anon,
            &CreateEmptyInstructionInput {
                project_variant_id: variant_id.clone(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CodestepError::Unauthorized(_)));

        let err = get_by_id(
            &storage,
            &anon,
            &GetInstructionInput {
                instruction_id: "x".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CodestepError::Unauthorized(_)));

        // Nothing was written
        assert!(storage.list_instruction_titles(&variant_id).await.unwrap().is_empty());
    }
}
