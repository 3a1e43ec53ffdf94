//! PostgreSQL implementation of ArchiveWriter.
//!
//! Inserts one row per finished conversation into the archive table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::ports::{ArchiveError, ArchiveRow, ArchiveWriter};

/// PostgreSQL implementation of ArchiveWriter.
#[derive(Clone)]
pub struct PostgresArchiveWriter {
    pool: PgPool,
    insert_sql: String,
}

impl PostgresArchiveWriter {
    /// Creates a writer for `table`, which must be a plain SQL identifier.
    pub fn new(pool: PgPool, table: &str) -> Result<Self, ArchiveError> {
        if !is_plain_identifier(table) {
            return Err(ArchiveError::Backend(format!(
                "invalid archive table name: {:?}",
                table
            )));
        }

        let insert_sql = format!(
            r#"
            INSERT INTO {table} (
                conversation_id, user_key, created_at, final_judgement,
                judgement_reason, extracted_entities, raw_conversation
            ) VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7)
            ON CONFLICT (conversation_id) DO NOTHING
            "#
        );

        Ok(Self { pool, insert_sql })
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl ArchiveWriter for PostgresArchiveWriter {
    async fn insert(&self, row: &ArchiveRow) -> Result<(), ArchiveError> {
        sqlx::query(&self.insert_sql)
            .bind(&row.conversation_id)
            .bind(&row.user_key)
            .bind(row.created_at.as_datetime())
            .bind(&row.final_judgement)
            .bind(&row.judgement_reason)
            .bind(&row.extracted_entities)
            .bind(&row.raw_conversation)
            .execute(&self.pool)
            .await
            .map_err(|e| ArchiveError::Backend(format!("Failed to insert archive row: {}", e)))?;

        tracing::info!(
            conversation_id = %row.conversation_id,
            judgement = %row.final_judgement,
            "conversation archived"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_are_accepted() {
        assert!(is_plain_identifier("intake_archive"));
        assert!(is_plain_identifier("_archive2"));
    }

    #[test]
    fn injection_shapes_are_rejected() {
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2archive"));
        assert!(!is_plain_identifier("archive; DROP TABLE users"));
        assert!(!is_plain_identifier("public.archive"));
        assert!(!is_plain_identifier(&"a".repeat(64)));
    }
}
