//! Schema bootstrap for Postgres + pgvector
//!
//! Every statement is idempotent, so this runs on each startup.

use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::info;

use crate::errors::Result;

const PERSONAS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS personas (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    profile TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const EMBEDDINGS_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_embeddings_persona_id ON embeddings (persona_id)";

const EMBEDDINGS_ANN_DDL: &str = "CREATE INDEX IF NOT EXISTS idx_embeddings_embedding_hnsw \
     ON embeddings USING hnsw (embedding vector_cosine_ops)";

fn embeddings_ddl(dimension: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS embeddings (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    embedding vector({dimension}) NOT NULL,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    persona_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL
)
"#
    )
}

/// The statements `ensure_schema` runs, in order
pub fn statements(dimension: usize, ann_index: bool) -> Vec<String> {
    let mut stmts = vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        PERSONAS_DDL.to_string(),
        embeddings_ddl(dimension),
        EMBEDDINGS_INDEX_DDL.to_string(),
    ];
    if ann_index {
        stmts.push(EMBEDDINGS_ANN_DDL.to_string());
    }
    stmts
}

/// Create the extension, tables and indexes if missing
pub async fn ensure_schema(conn: &DatabaseConnection, dimension: usize, ann_index: bool) -> Result<()> {
    for stmt in statements(dimension, ann_index) {
        conn.execute_unprepared(&stmt).await?;
    }
    info!(dimension, ann_index, "Database schema ready");
    Ok(())
}
