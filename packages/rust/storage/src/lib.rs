//! libSQL storage layer for Codestep.
//!
//! The [`Storage`] struct wraps an embedded libSQL database holding projects,
//! project variants, purchases, instructions, code blocks, and success media.
//!
//! Single-statement reads and writes go through one shared connection.
//! Multi-row writes (an instruction plus its code blocks, an update plus a new
//! success media row) open a dedicated connection and run in a transaction so
//! they cannot interleave with other requests' statements.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use codestep_shared::{
    BackendVariant, CodeBlock, CodestepError, FrontendVariant, Instruction, InstructionDetail,
    InstructionPatch, InstructionTitle, NewCodeBlock, Project, ProjectVariant, PurchasedProject,
    RecordId, Result, SuccessMedia,
};
use libsql::{Connection, Database, params};

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

const INSTRUCTION_COLUMNS: &str =
    "id, project_variant_id, title, explanation, has_code_blocks, created_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CodestepError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;
        configure_connection(&conn).await?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CodestepError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Open a dedicated connection for a transactional write.
    async fn writer(&self) -> Result<Connection> {
        let conn = self.db.connect().map_err(db_err)?;
        configure_connection(&conn).await?;
        Ok(conn)
    }

    // -----------------------------------------------------------------------
    // Project operations
    // -----------------------------------------------------------------------

    /// Insert a new project.
    pub async fn insert_project(&self, title: &str) -> Result<Project> {
        let id = RecordId::new().to_string();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO projects (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), title, now.to_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        Ok(Project {
            id,
            title: title.to_string(),
            created_at: now,
        })
    }

    /// Get a project by ID.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, created_at FROM projects WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(Project {
                id: row.get::<String>(0).map_err(db_err)?,
                title: row.get::<String>(1).map_err(db_err)?,
                created_at: parse_timestamp(&row.get::<String>(2).map_err(db_err)?)?,
            })),
            None => Ok(None),
        }
    }

    /// Insert a project variant authored by `author_id`.
    pub async fn insert_project_variant(
        &self,
        projects_id: &str,
        frontend: FrontendVariant,
        backend: BackendVariant,
        author_id: &str,
    ) -> Result<ProjectVariant> {
        let id = RecordId::new().to_string();
        self.conn
            .execute(
                "INSERT INTO project_variants (id, projects_id, frontend_variant, backend_variant, author_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), projects_id, frontend.as_str(), backend.as_str(), author_id],
            )
            .await
            .map_err(db_err)?;
        Ok(ProjectVariant {
            id,
            projects_id: projects_id.to_string(),
            frontend_variant: frontend,
            backend_variant: backend,
            author_id: author_id.to_string(),
        })
    }

    /// Find the variant of a project for a (frontend, backend) combination.
    pub async fn find_project_variant(
        &self,
        projects_id: &str,
        frontend: FrontendVariant,
        backend: BackendVariant,
    ) -> Result<Option<ProjectVariant>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, projects_id, frontend_variant, backend_variant, author_id
                 FROM project_variants
                 WHERE projects_id = ?1 AND frontend_variant = ?2 AND backend_variant = ?3",
                params![projects_id, frontend.as_str(), backend.as_str()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_project_variant(&row)?)),
            None => Ok(None),
        }
    }

    /// Record that `user_id` owns `projects_id`.
    pub async fn insert_purchased_project(
        &self,
        user_id: &str,
        projects_id: &str,
    ) -> Result<PurchasedProject> {
        let id = RecordId::new().to_string();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO purchased_projects (id, user_id, projects_id, purchased_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), user_id, projects_id, now.to_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        Ok(PurchasedProject {
            id,
            user_id: user_id.to_string(),
            projects_id: projects_id.to_string(),
            purchased_at: now,
        })
    }

    /// List a user's purchases, oldest first.
    pub async fn list_purchased_projects(&self, user_id: &str) -> Result<Vec<PurchasedProject>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, projects_id, purchased_at
                 FROM purchased_projects WHERE user_id = ?1 ORDER BY rowid",
                params![user_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(PurchasedProject {
                id: row.get::<String>(0).map_err(db_err)?,
                user_id: row.get::<String>(1).map_err(db_err)?,
                projects_id: row.get::<String>(2).map_err(db_err)?,
                purchased_at: parse_timestamp(&row.get::<String>(3).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Instruction operations
    // -----------------------------------------------------------------------

    /// Create an instruction and its code blocks as one atomic write.
    pub async fn create_instruction(
        &self,
        project_variant_id: &str,
        explanation: &str,
        code_blocks: &[NewCodeBlock],
    ) -> Result<Instruction> {
        let id = RecordId::new().to_string();
        let now = Utc::now().to_rfc3339();

        let conn = self.writer().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        tx.execute(
            "INSERT INTO instructions (id, project_variant_id, title, explanation, has_code_blocks, created_at, updated_at)
             VALUES (?1, ?2, '', ?3, 1, ?4, ?4)",
            params![id.as_str(), project_variant_id, explanation, now.as_str()],
        )
        .await
        .map_err(db_err)?;

        for block in code_blocks {
            tx.execute(
                "INSERT INTO code_blocks (id, instructions_id, file_name, code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    RecordId::new().to_string(),
                    id.as_str(),
                    block.file_name.as_str(),
                    block.code.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        }

        let instruction = select_instruction(&tx, &id)
            .await?
            .ok_or_else(|| CodestepError::Storage(format!("instruction {id} vanished on insert")))?;
        tx.commit().await.map_err(db_err)?;
        Ok(instruction)
    }

    /// Apply a partial update. A present `success_media` always appends a new row.
    pub async fn update_instruction(
        &self,
        id: &str,
        patch: &InstructionPatch,
    ) -> Result<Instruction> {
        let now = Utc::now().to_rfc3339();

        let conn = self.writer().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        let changed = tx
            .execute(
                "UPDATE instructions SET
                   explanation = COALESCE(?1, explanation),
                   has_code_blocks = COALESCE(?2, has_code_blocks),
                   updated_at = ?3
                 WHERE id = ?4",
                params![
                    patch.effective_explanation(),
                    patch.has_code_blocks.map(i64::from),
                    now.as_str(),
                    id,
                ],
            )
            .await
            .map_err(db_err)?;
        if changed == 0 {
            return Err(CodestepError::not_found("instruction", id));
        }

        if let Some(media) = &patch.success_media {
            tx.execute(
                "INSERT INTO success_media (id, instructions_id, media_url, caption, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    RecordId::new().to_string(),
                    id,
                    media.media_url.as_str(),
                    media.caption.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        }

        let instruction = select_instruction(&tx, id)
            .await?
            .ok_or_else(|| CodestepError::not_found("instruction", id))?;
        tx.commit().await.map_err(db_err)?;
        Ok(instruction)
    }

    /// Delete an instruction by ID, returning the removed row. Code blocks and
    /// success media go with it.
    pub async fn delete_instruction(&self, id: &str) -> Result<Instruction> {
        let mut rows = self
            .conn
            .query(
                &format!("DELETE FROM instructions WHERE id = ?1 RETURNING {INSTRUCTION_COLUMNS}"),
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => row_to_instruction(&row),
            None => Err(CodestepError::not_found("instruction", id)),
        }
    }

    /// Get an instruction with its code blocks and success media.
    pub async fn get_instruction(&self, id: &str) -> Result<Option<InstructionDetail>> {
        let Some(instruction) = select_instruction(&self.conn, id).await? else {
            return Ok(None);
        };
        let code_blocks = self.list_code_blocks(id).await?;
        let success_media = self.list_success_media(id).await?;
        Ok(Some(InstructionDetail {
            instruction,
            code_blocks,
            success_media,
        }))
    }

    /// List `(id, title)` pairs of a variant's instructions in insertion order.
    pub async fn list_instruction_titles(
        &self,
        project_variant_id: &str,
    ) -> Result<Vec<InstructionTitle>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title FROM instructions WHERE project_variant_id = ?1 ORDER BY rowid",
                params![project_variant_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(InstructionTitle {
                id: row.get::<String>(0).map_err(db_err)?,
                title: row.get::<String>(1).map_err(db_err)?,
            });
        }
        Ok(results)
    }

    /// Code blocks of an instruction in creation order.
    pub async fn list_code_blocks(&self, instructions_id: &str) -> Result<Vec<CodeBlock>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, instructions_id, file_name, code, created_at
                 FROM code_blocks WHERE instructions_id = ?1 ORDER BY rowid",
                params![instructions_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(CodeBlock {
                id: row.get::<String>(0).map_err(db_err)?,
                instructions_id: row.get::<String>(1).map_err(db_err)?,
                file_name: row.get::<String>(2).map_err(db_err)?,
                code: row.get::<String>(3).map_err(db_err)?,
                created_at: parse_timestamp(&row.get::<String>(4).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }

    /// Success media of an instruction, oldest first.
    pub async fn list_success_media(&self, instructions_id: &str) -> Result<Vec<SuccessMedia>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, instructions_id, media_url, caption, created_at
                 FROM success_media WHERE instructions_id = ?1 ORDER BY rowid",
                params![instructions_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(SuccessMedia {
                id: row.get::<String>(0).map_err(db_err)?,
                instructions_id: row.get::<String>(1).map_err(db_err)?,
                media_url: row.get::<String>(2).map_err(db_err)?,
                caption: row.get::<String>(3).map_err(db_err)?,
                created_at: parse_timestamp(&row.get::<String>(4).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }
}

/// Per-connection settings: enforce foreign keys (cascading deletes) and wait
/// on locks instead of failing immediately.
async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", params![])
        .await
        .map_err(db_err)?;
    // busy_timeout echoes the new value back as a row
    conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), params![])
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn select_instruction(conn: &Connection, id: &str) -> Result<Option<Instruction>> {
    let mut rows = conn
        .query(
            &format!("SELECT {INSTRUCTION_COLUMNS} FROM instructions WHERE id = ?1"),
            params![id],
        )
        .await
        .map_err(db_err)?;

    match rows.next().await.map_err(db_err)? {
        Some(row) => Ok(Some(row_to_instruction(&row)?)),
        None => Ok(None),
    }
}

fn db_err(e: libsql::Error) -> CodestepError {
    CodestepError::Storage(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CodestepError::Storage(format!("invalid date: {e}")))
}

/// Convert a row selected with [`INSTRUCTION_COLUMNS`] to an [`Instruction`].
fn row_to_instruction(row: &libsql::Row) -> Result<Instruction> {
    Ok(Instruction {
        id: row.get::<String>(0).map_err(db_err)?,
        project_variant_id: row.get::<String>(1).map_err(db_err)?,
        title: row.get::<String>(2).map_err(db_err)?,
        explanation: row.get::<String>(3).map_err(db_err)?,
        has_code_blocks: row.get::<i64>(4).map_err(db_err)? != 0,
        created_at: parse_timestamp(&row.get::<String>(5).map_err(db_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(6).map_err(db_err)?)?,
    })
}

fn row_to_project_variant(row: &libsql::Row) -> Result<ProjectVariant> {
    Ok(ProjectVariant {
        id: row.get::<String>(0).map_err(db_err)?,
        projects_id: row.get::<String>(1).map_err(db_err)?,
        frontend_variant: row.get::<String>(2).map_err(db_err)?.parse()?,
        backend_variant: row.get::<String>(3).map_err(db_err)?.parse()?,
        author_id: row.get::<String>(4).map_err(db_err)?,
    })
}
