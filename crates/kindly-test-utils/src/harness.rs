// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database test harness.
//!
//! `TestHarness` owns a migrated SQLite file in a temporary directory plus a
//! [`MockProvider`] and a [`MockEmbedder`], and offers seeding helpers for the
//! message log, positive moments, and knowledge chunks.

use std::sync::Arc;

use chrono::{Duration, Utc};
use kindly_config::KindlyConfig;
use kindly_core::{KindlyError, Message, MessageType, UserId};
use kindly_storage::Database;
use kindly_storage::queries::knowledge::upsert_chunk;
use kindly_storage::queries::messages::{NewMessage, insert_message};
use kindly_storage::queries::moments::{NewMoment, insert_moment};

use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;

/// Builder for test environments.
pub struct TestHarnessBuilder {
    config: KindlyConfig,
    responses: Vec<String>,
    embedder: MockEmbedder,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: KindlyConfig::default(),
            responses: Vec::new(),
            embedder: MockEmbedder::new(),
        }
    }

    pub fn with_config(mut self, config: KindlyConfig) -> Self {
        self.config = config;
        self
    }

    /// Queue mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Pin an embedding for an exact text.
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embedder = self.embedder.with_embedding(text, vector);
        self
    }

    pub async fn build(self) -> Result<TestHarness, KindlyError> {
        let temp_dir = tempfile::TempDir::new().map_err(KindlyError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().into_owned();

        let db = Database::open(&config.storage.database_path).await?;
        Ok(TestHarness {
            db,
            provider: Arc::new(MockProvider::with_responses(self.responses)),
            embedder: Arc::new(self.embedder),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A migrated temp database with mock adapters.
pub struct TestHarness {
    pub db: Database,
    pub provider: Arc<MockProvider>,
    pub embedder: Arc<MockEmbedder>,
    pub config: KindlyConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default config and empty mocks.
    pub async fn new() -> Result<Self, KindlyError> {
        Self::builder().build().await
    }

    /// Append a message to the log, timestamped now.
    pub async fn log(
        &self,
        user_id: UserId,
        message_type: MessageType,
        content: &str,
    ) -> Result<Message, KindlyError> {
        insert_message(&self.db, NewMessage::new(user_id, message_type, content)).await
    }

    /// Append a user text message dated `age` in the past.
    pub async fn log_aged(
        &self,
        user_id: UserId,
        content: &str,
        age: Duration,
    ) -> Result<Message, KindlyError> {
        let mut msg = NewMessage::new(user_id, MessageType::UserText, content);
        msg.created_at = Utc::now() - age;
        insert_message(&self.db, msg).await
    }

    /// Record a positive moment dated `age` in the past, embedded by the mock.
    pub async fn add_moment(
        &self,
        user_id: UserId,
        content: &str,
        age: Duration,
    ) -> Result<i64, KindlyError> {
        insert_moment(
            &self.db,
            NewMoment {
                user_id,
                content: content.to_string(),
                embedding: self.embedder.vector_for(content),
                mood_score: None,
                topics: Vec::new(),
                created_at: Utc::now() - age,
            },
        )
        .await
    }

    /// Add a knowledge chunk embedded by the mock.
    pub async fn add_knowledge(
        &self,
        document: &str,
        chunk_index: i64,
        content: &str,
    ) -> Result<i64, KindlyError> {
        upsert_chunk(
            &self.db,
            document,
            chunk_index,
            content,
            &self.embedder.vector_for(content),
        )
        .await
    }
}
