//! Postgres-backed family directory.
//!
//! Reads enquiry profiles from the CRM's `inquiries` table and appends
//! resolved interactions to `chat_interactions` for the admissions
//! dashboard. Only compiled with the `postgres` feature.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{safe_trim, FamilyContext, InteractionLog};
use crate::providers::{FamilyDirectory, ProviderError};

/// Display-field trim limit, matching the dashboard's column widths.
const FIELD_TRIM: usize = 120;

/// Question/answer columns are capped at this many characters.
const LOG_TEXT_LIMIT: usize = 500;

pub struct PgFamilyDirectory {
    pool: PgPool,
}

impl PgFamilyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool suitable for the directory's low query volume.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl FamilyDirectory for PgFamilyDirectory {
    async fn get_family(&self, family_id: &str) -> Result<Option<FamilyContext>, ProviderError> {
        let row = sqlx::query(
            r#"
            SELECT
              id::text                                  AS family_id,
              COALESCE(child_first_name, child_name)    AS child_first_name,
              COALESCE(child_last_name, '')             AS child_last_name,
              COALESCE(year_group, entry_year, '')      AS year_group,
              COALESCE(boarding_status, '')             AS boarding_status,
              COALESCE(main_interests, '')              AS main_interests,
              COALESCE(parent_name, contact_name, '')   AS parent_name,
              COALESCE(parent_email, contact_email, '') AS parent_email,
              COALESCE(country, '')                     AS country,
              COALESCE(language_pref, 'en')             AS language_pref
            FROM public.inquiries
            WHERE id::text = $1
            LIMIT 1
            "#,
        )
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ProviderError::Request(format!("family lookup failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let first: String = row.try_get("child_first_name").unwrap_or_default();
        let last: String = row.try_get("child_last_name").unwrap_or_default();
        let child_name = [safe_trim(&first, FIELD_TRIM), safe_trim(&last, FIELD_TRIM)]
            .iter()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let get = |column: &str| -> Option<String> {
            row.try_get::<String, _>(column)
                .ok()
                .map(|v| safe_trim(&v, FIELD_TRIM))
                .filter(|v| !v.is_empty())
        };

        let language_pref: String = row.try_get("language_pref").unwrap_or_else(|_| "en".into());

        Ok(Some(FamilyContext {
            family_id: row.try_get("family_id").unwrap_or_default(),
            child_name: (!child_name.is_empty()).then_some(child_name),
            year_group: get("year_group"),
            boarding_status: get("boarding_status"),
            interests: get("main_interests"),
            country: get("country"),
            language_pref: language_pref.chars().take(5).collect(),
            parent_name: get("parent_name"),
            parent_email: get("parent_email"),
        }))
    }

    async fn log_interaction(
        &self,
        family_id: &str,
        question: &str,
        answer: &str,
        log: &InteractionLog,
    ) -> Result<(), ProviderError> {
        let metadata = serde_json::to_value(log)
            .map_err(|e| ProviderError::Malformed(format!("interaction metadata: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO chat_interactions
              (family_id, question, answer, topic, sentiment, timestamp, metadata)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            "#,
        )
        .bind(family_id)
        .bind(question.chars().take(LOG_TEXT_LIMIT).collect::<String>())
        .bind(answer.chars().take(LOG_TEXT_LIMIT).collect::<String>())
        .bind(&log.topic)
        .bind(&log.sentiment)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| ProviderError::Request(format!("interaction log failed: {e}")))?;

        Ok(())
    }
}
