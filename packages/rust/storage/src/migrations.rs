//! SQL migration definitions for the Codestep database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations` as its last statement.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: projects, variants, purchases, instructions, code blocks, success media",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Tutorial projects
CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- (frontend, backend) combinations of a project
CREATE TABLE IF NOT EXISTS project_variants (
    id               TEXT PRIMARY KEY,
    projects_id      TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    frontend_variant TEXT NOT NULL,
    backend_variant  TEXT NOT NULL,
    author_id        TEXT NOT NULL,
    UNIQUE(projects_id, frontend_variant, backend_variant)
);

-- Ownership records
CREATE TABLE IF NOT EXISTS purchased_projects (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    projects_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    purchased_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_purchased_projects_user ON purchased_projects(user_id);

-- Tutorial steps
CREATE TABLE IF NOT EXISTS instructions (
    id                 TEXT PRIMARY KEY,
    project_variant_id TEXT NOT NULL REFERENCES project_variants(id) ON DELETE CASCADE,
    title              TEXT NOT NULL DEFAULT '',
    explanation        TEXT NOT NULL DEFAULT '',
    has_code_blocks    INTEGER NOT NULL DEFAULT 1,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_instructions_variant ON instructions(project_variant_id);

-- Files shown next to an instruction
CREATE TABLE IF NOT EXISTS code_blocks (
    id              TEXT PRIMARY KEY,
    instructions_id TEXT NOT NULL REFERENCES instructions(id) ON DELETE CASCADE,
    file_name       TEXT NOT NULL,
    code            TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_code_blocks_instruction ON code_blocks(instructions_id);

-- Completion media; append-only
CREATE TABLE IF NOT EXISTS success_media (
    id              TEXT PRIMARY KEY,
    instructions_id TEXT NOT NULL REFERENCES instructions(id) ON DELETE CASCADE,
    media_url       TEXT NOT NULL,
    caption         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_success_media_instruction ON success_media(instructions_id);

INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
