//! Postgres + pgvector store.
//!
//! Persona records go through SeaORM entities. Embedding writes and
//! similarity search use raw SQL so the `vector` column can be cast from its
//! text literal and ordered with the `<=>` cosine distance operator.

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QueryResult, Set, Statement, TransactionTrait,
};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::db::models::*;
use crate::db::{schema, DbPool};
use crate::errors::{AppError, Result};
use crate::models::{EmbeddingChunk, Persona, ScoredChunk};

use super::{PersonaRegistry, VectorStore};

const INSERT_CHUNK_SQL: &str = r#"
    INSERT INTO embeddings (id, text, embedding, metadata, created_at, persona_id, chunk_index)
    VALUES ($1, $2, $3::vector, $4, $5, $6, $7)
"#;

const SEARCH_SQL: &str = r#"
    SELECT
        id,
        persona_id,
        chunk_index,
        text,
        1 - (embedding <=> $1::vector) AS score
    FROM embeddings
    WHERE persona_id = $2
    ORDER BY embedding <=> $1::vector
    LIMIT $3
"#;

fn scored_chunk(row: &QueryResult) -> Result<ScoredChunk> {
    Ok(ScoredChunk {
        id: row.try_get("", "id")?,
        persona_id: row.try_get("", "persona_id")?,
        chunk_index: row.try_get("", "chunk_index")?,
        text: row.try_get("", "text")?,
        score: row.try_get("", "score")?,
    })
}

/// Store backed by a pooled Postgres connection
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    dimension: usize,
}

impl PgStore {
    /// Use an existing pool; the schema must already exist
    pub fn new(pool: DbPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(config: &StoreConfig, dimension: usize) -> Result<Self> {
        let pool = DbPool::new(&config.database).await?;
        schema::ensure_schema(pool.conn(), dimension, config.ann_index).await?;
        info!(dimension, "Postgres vector store ready");
        Ok(Self::new(pool, dimension))
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(AppError::storage(format!(
                "embedding has {} dimensions, table expects {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgStore {
    async fn insert_chunks(&self, chunks: &[EmbeddingChunk]) -> Result<()> {
        for chunk in chunks {
            self.check_dimension(&chunk.embedding)?;
        }

        let txn = self.pool.conn().begin().await?;
        for chunk in chunks {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                INSERT_CHUNK_SQL,
                vec![
                    chunk.id.clone().into(),
                    chunk.text.clone().into(),
                    vector_literal(&chunk.embedding).into(),
                    chunk.metadata.clone().into(),
                    chunk.created_at.into(),
                    chunk.persona_id.clone().into(),
                    chunk.chunk_index.into(),
                ],
            );
            txn.execute(stmt).await?;
        }
        txn.commit().await?;

        debug!(count = chunks.len(), "Embedding chunks inserted");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], persona_id: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        self.check_dimension(embedding)?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            SEARCH_SQL,
            vec![
                vector_literal(embedding).into(),
                persona_id.into(),
                (limit as i64).into(),
            ],
        );

        self.pool
            .conn()
            .query_all(stmt)
            .await?
            .iter()
            .map(scored_chunk)
            .collect()
    }

    async fn count_by_persona(&self, persona_id: &str) -> Result<u64> {
        EmbeddingEntity::find()
            .filter(EmbeddingColumn::PersonaId.eq(persona_id))
            .count(self.pool.conn())
            .await
            .map_err(Into::into)
    }

    async fn delete_persona_chunks(&self, persona_id: &str) -> Result<u64> {
        let result = EmbeddingEntity::delete_many()
            .filter(EmbeddingColumn::PersonaId.eq(persona_id))
            .exec(self.pool.conn())
            .await?;
        Ok(result.rows_affected)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl PersonaRegistry for PgStore {
    async fn create(&self, persona: &Persona) -> Result<Persona> {
        let model = PersonaActiveModel {
            id: Set(persona.id.clone()),
            display_name: Set(persona.display_name.clone()),
            profile: Set(persona.profile.clone()),
            created_at: Set(persona.created_at.into()),
        };

        let inserted = PersonaEntity::insert(model)
            .on_conflict(OnConflict::column(PersonaColumn::Id).do_nothing().to_owned())
            .exec_without_returning(self.pool.conn())
            .await?;

        if inserted == 0 {
            return Err(AppError::DuplicatePersona { id: persona.id.clone() });
        }
        Ok(persona.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Persona>> {
        let row = PersonaEntity::find_by_id(id.to_string())
            .one(self.pool.conn())
            .await?;
        Ok(row.map(Persona::from))
    }

    async fn list(&self) -> Result<Vec<Persona>> {
        let rows = PersonaEntity::find()
            .order_by_asc(PersonaColumn::Id)
            .all(self.pool.conn())
            .await?;
        Ok(rows.into_iter().map(Persona::from).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = PersonaEntity::delete_by_id(id.to_string())
            .exec(self.pool.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    use super::*;

    fn row(score: Value) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", Value::from("c1")),
            ("persona_id", Value::from("doug")),
            ("chunk_index", Value::from(0i32)),
            ("text", Value::from("Doug likes blue.")),
            ("score", score),
        ])
    }

    fn store_with_rows(rows: Vec<BTreeMap<&'static str, Value>>) -> PgStore {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();
        PgStore::new(DbPool::from_connection(conn), 3)
    }

    #[tokio::test]
    async fn test_search_decodes_rows() {
        let store = store_with_rows(vec![row(Value::from(0.9f64))]);

        let hits = store.search(&[1.0, 0.0, 0.0], "doug", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Doug likes blue.");
        assert_eq!(hits[0].chunk_index, 0);
        assert!((hits[0].score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_search_surfaces_undecodable_row() {
        let store = store_with_rows(vec![
            row(Value::from(0.9f64)),
            row(Value::String(None)),
        ]);

        let err = store.search(&[1.0, 0.0, 0.0], "doug", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_dimension() {
        let store = store_with_rows(Vec::new());
        let err = store.search(&[1.0, 0.0], "doug", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
