//! Redis-backed conversation store for production deployments.
//!
//! Layout per user, both keys under the configured prefix:
//!
//! - `{prefix}:{user}` hash: `state`, `extracted_data`, `last_judgement`,
//!   `created_at`, `updated_at`
//! - `{prefix}:{user}:history` list: one JSON-encoded turn per entry
//!
//! A merge is a single MULTI/EXEC pipeline: HSETNX for `created_at`, HSET
//! for the fields carried by the patch, RPUSH for new turns, EXPIRE for
//! both keys. History is only ever pushed, never rewritten.
//!
//! `merge_existing` does the same writes inside a Lua script that first
//! checks the hash exists, so it cannot recreate a deleted record.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;

use crate::domain::foundation::{Timestamp, UserKey};
use crate::domain::intake::{ConversationRecord, IntakeState, RecordPatch, Turn};
use crate::ports::{ConversationStore, StoreError};

const FIELD_STATE: &str = "state";
const FIELD_EXTRACTED_DATA: &str = "extracted_data";
const FIELD_LAST_JUDGEMENT: &str = "last_judgement";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_UPDATED_AT: &str = "updated_at";

/// KEYS: record hash, history list.
/// ARGV: field pair count, ttl secs, field pairs..., turns...
const MERGE_EXISTING_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
local field_count = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])
local i = 3
for _ = 1, field_count do
  redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
  i = i + 2
end
while i <= #ARGV do
  redis.call('RPUSH', KEYS[2], ARGV[i])
  i = i + 1
end
if ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
  redis.call('EXPIRE', KEYS[2], ttl)
end
return 1
"#;

/// Redis-backed conversation store.
#[derive(Clone)]
pub struct RedisConversationStore {
    conn: MultiplexedConnection,
    key_prefix: String,
    /// Seconds of inactivity before a record expires; 0 keeps it forever.
    ttl_secs: u64,
    merge_existing_script: redis::Script,
}

impl RedisConversationStore {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            ttl_secs: 0,
            merge_existing_script: redis::Script::new(MERGE_EXISTING_SCRIPT),
        }
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    fn record_key(&self, user_key: &UserKey) -> String {
        format!("{}:{}", self.key_prefix, user_key)
    }

    fn history_key(&self, user_key: &UserKey) -> String {
        format!("{}:{}:history", self.key_prefix, user_key)
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Hash fields written for a patch, `updated_at` included.
fn encode_fields(patch: &RecordPatch, now: Timestamp) -> Result<Vec<(&'static str, String)>, StoreError> {
    let mut fields = Vec::with_capacity(4);
    if let Some(state) = patch.state {
        fields.push((FIELD_STATE, state.as_str().to_string()));
    }
    if let Some(ref data) = patch.extracted_data {
        let json = serde_json::to_string(data)
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        fields.push((FIELD_EXTRACTED_DATA, json));
    }
    if let Some(ref judgement) = patch.last_judgement {
        let json = serde_json::to_string(judgement)
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        fields.push((FIELD_LAST_JUDGEMENT, json));
    }
    fields.push((FIELD_UPDATED_AT, now.to_rfc3339()));
    Ok(fields)
}

fn encode_turns(turns: &[Turn]) -> Result<Vec<String>, StoreError> {
    turns
        .iter()
        .map(|turn| {
            serde_json::to_string(turn).map_err(|e| StoreError::SerializationFailed(e.to_string()))
        })
        .collect()
}

/// Rebuilds a record; an empty hash means no record.
fn decode_record(
    user_key: &UserKey,
    fields: HashMap<String, String>,
    history: Vec<String>,
) -> Result<Option<ConversationRecord>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut record = ConversationRecord::new(user_key.clone());

    if let Some(state) = fields.get(FIELD_STATE) {
        record.state = state
            .parse::<IntakeState>()
            .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
    }
    if let Some(data) = fields.get(FIELD_EXTRACTED_DATA) {
        record.extracted_data = serde_json::from_str(data)
            .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
    }
    if let Some(judgement) = fields.get(FIELD_LAST_JUDGEMENT) {
        record.last_judgement = Some(
            serde_json::from_str(judgement)
                .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?,
        );
    }
    if let Some(at) = fields.get(FIELD_CREATED_AT).and_then(|s| Timestamp::parse_rfc3339(s)) {
        record.created_at = at;
    }
    if let Some(at) = fields.get(FIELD_UPDATED_AT).and_then(|s| Timestamp::parse_rfc3339(s)) {
        record.updated_at = at;
    }

    record.history = history
        .iter()
        .map(|raw| {
            serde_json::from_str::<Turn>(raw)
                .map_err(|e| StoreError::DeserializationFailed(e.to_string()))
        })
        .collect::<Result<_, _>>()?;

    Ok(Some(record))
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn get(&self, user_key: &UserKey) -> Result<Option<ConversationRecord>, StoreError> {
        let mut conn = self.conn.clone();

        let (fields, history): (HashMap<String, String>, Vec<String>) = redis::pipe()
            .hgetall(self.record_key(user_key))
            .lrange(self.history_key(user_key), 0, -1)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        decode_record(user_key, fields, history)
    }

    async fn merge(&self, user_key: &UserKey, patch: &RecordPatch) -> Result<(), StoreError> {
        let now = Timestamp::now();
        let record_key = self.record_key(user_key);
        let history_key = self.history_key(user_key);
        let fields = encode_fields(patch, now)?;
        let turns = encode_turns(&patch.append_turns)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_nx(&record_key, FIELD_CREATED_AT, now.to_rfc3339())
            .ignore()
            .hset_multiple(&record_key, fields.as_slice())
            .ignore();
        if !turns.is_empty() {
            pipe.rpush(&history_key, turns).ignore();
        }
        if self.ttl_secs > 0 {
            let ttl = self.ttl_secs as i64;
            pipe.expire(&record_key, ttl)
                .ignore()
                .expire(&history_key, ttl)
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await.map_err(backend)?;

        tracing::debug!(
            user_key = %user_key,
            appended = patch.append_turns.len(),
            state = ?patch.state,
            "conversation merged"
        );
        Ok(())
    }

    async fn merge_existing(
        &self,
        user_key: &UserKey,
        patch: &RecordPatch,
    ) -> Result<bool, StoreError> {
        let fields = encode_fields(patch, Timestamp::now())?;
        let turns = encode_turns(&patch.append_turns)?;

        let mut invocation = self.merge_existing_script.prepare_invoke();
        invocation
            .key(self.record_key(user_key))
            .key(self.history_key(user_key))
            .arg(fields.len())
            .arg(self.ttl_secs);
        for (name, value) in &fields {
            invocation.arg(*name).arg(value);
        }
        for turn in &turns {
            invocation.arg(turn);
        }

        let mut conn = self.conn.clone();
        let applied: i64 = invocation.invoke_async(&mut conn).await.map_err(backend)?;

        tracing::debug!(
            user_key = %user_key,
            applied = applied == 1,
            state = ?patch.state,
            "conditional conversation merge"
        );
        Ok(applied == 1)
    }

    async fn delete(&self, user_key: &UserKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(self.record_key(user_key))
            .arg(self.history_key(user_key))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }
}

impl std::fmt::Debug for RedisConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConversationStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
