//! PostgreSQL adapter for risk storage.
//!
//! `roadmap_risks` and `roadmap_risk_history` are owned by this adapter and
//! created on connect. The snapshot tables (`roadmap_milestones`,
//! `roadmap_visions`, `roadmap_milestone_dependencies` and the
//! `roadmap_epic_stats` view) are maintained by the tracker sync pipelines and
//! only read here.
//!
//! A partial unique index over the open dedup key lets `upsert_open` use
//! `INSERT .. ON CONFLICT .. DO UPDATE`, so concurrent runs converge on one
//! open record per key.

use crate::traits::{RiskRepository, SnapshotProvider, StatusChange, UpsertOutcome};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use risk_types::{
    DependencyRef, EpicStat, HistoryAction, Milestone, MilestoneId, MilestoneStatus, Risk,
    RiskCandidate, RiskFilter, RiskHistoryEntry, RiskId, RiskStatus, ScopeFilter, Snapshot,
    ENGINE_ACTOR,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const RISK_COLUMNS: &str = "id, milestone_id, stream_id, epic_key, risk_type, severity, title, \
    description, suggested_action, confidence_score, trigger_data, status, detected_at, \
    resolved_at, resolution_note";

/// PostgreSQL-backed snapshot provider and risk repository.
#[derive(Clone)]
pub struct PostgresRiskStore {
    pool: PgPool,
}

impl PostgresRiskStore {
    /// Connect to PostgreSQL and initialize the risk schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS roadmap_risks (
                id UUID PRIMARY KEY,
                milestone_id TEXT NOT NULL,
                stream_id TEXT,
                epic_key TEXT,
                risk_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                suggested_action TEXT NOT NULL,
                confidence_score DOUBLE PRECISION NOT NULL,
                trigger_data JSONB NOT NULL,
                status TEXT NOT NULL,
                detected_at TIMESTAMPTZ NOT NULL,
                resolved_at TIMESTAMPTZ,
                resolution_note TEXT
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS roadmap_risks_open_dedup
                ON roadmap_risks (milestone_id, risk_type, (COALESCE(epic_key, '')))
                WHERE status = 'open'
            "#,
            r#"CREATE INDEX IF NOT EXISTS roadmap_risks_status_severity ON roadmap_risks (status, severity)"#,
            r#"CREATE INDEX IF NOT EXISTS roadmap_risks_milestone ON roadmap_risks (milestone_id)"#,
            r#"
            CREATE TABLE IF NOT EXISTS roadmap_risk_history (
                id BIGSERIAL PRIMARY KEY,
                risk_id UUID NOT NULL REFERENCES roadmap_risks (id),
                action TEXT NOT NULL,
                new_status TEXT NOT NULL,
                note TEXT,
                actor TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"CREATE INDEX IF NOT EXISTS roadmap_risk_history_risk ON roadmap_risk_history (risk_id, id)"#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn begin(&self) -> StorageResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

async fn append_history(
    tx: &mut Transaction<'static, Postgres>,
    entry: &RiskHistoryEntry,
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO roadmap_risk_history (risk_id, action, new_status, note, actor, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(*entry.risk_id.as_uuid())
    .bind(entry.action.as_str())
    .bind(entry.new_status.as_str())
    .bind(entry.note.clone())
    .bind(entry.actor.clone())
    .bind(entry.timestamp)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl RiskRepository for PostgresRiskStore {
    async fn upsert_open(
        &self,
        candidate: RiskCandidate,
        detected_at: DateTime<Utc>,
    ) -> StorageResult<UpsertOutcome> {
        let trigger_data = serde_json::to_value(&candidate.trigger_data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sql = format!(
            r#"
            INSERT INTO roadmap_risks
                (id, milestone_id, stream_id, epic_key, risk_type, severity, title, description,
                 suggested_action, confidence_score, trigger_data, status, detected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'open', $12)
            ON CONFLICT (milestone_id, risk_type, (COALESCE(epic_key, ''))) WHERE status = 'open'
            DO UPDATE SET
                stream_id = EXCLUDED.stream_id,
                severity = EXCLUDED.severity,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                suggested_action = EXCLUDED.suggested_action,
                confidence_score = EXCLUDED.confidence_score,
                trigger_data = EXCLUDED.trigger_data,
                detected_at = EXCLUDED.detected_at
            RETURNING {RISK_COLUMNS}, (xmax = 0) AS inserted
            "#
        );

        let mut tx = self.begin().await?;
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(candidate.milestone_id.to_string())
            .bind(candidate.stream_id.clone())
            .bind(candidate.epic_key.clone())
            .bind(candidate.risk_type().as_str())
            .bind(candidate.severity.as_str())
            .bind(candidate.title.clone())
            .bind(candidate.description.clone())
            .bind(candidate.suggested_action.clone())
            .bind(risk_types::clamp_confidence(candidate.confidence_score))
            .bind(trigger_data)
            .bind(detected_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_conflict)?;

        let inserted: bool = column(&row, "inserted")?;
        let risk = risk_row_to_record(&row)?;

        if inserted {
            append_history(
                &mut tx,
                &RiskHistoryEntry {
                    risk_id: risk.id,
                    action: HistoryAction::Detected,
                    new_status: RiskStatus::Open,
                    note: None,
                    actor: ENGINE_ACTOR.to_string(),
                    timestamp: detected_at,
                },
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(if inserted {
            UpsertOutcome::Inserted(risk)
        } else {
            UpsertOutcome::Updated(risk)
        })
    }

    async fn list_open(&self, scope: &ScopeFilter) -> StorageResult<Vec<Risk>> {
        let sql = format!(
            r#"
            SELECT {RISK_COLUMNS}
              FROM roadmap_risks
             WHERE status = 'open'
               AND (cardinality($1::TEXT[]) = 0 OR milestone_id = ANY($1))
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(scope_ids(scope))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(risk_row_to_record).collect()
    }

    async fn get_risk(&self, id: &RiskId) -> StorageResult<Option<Risk>> {
        let sql = format!("SELECT {RISK_COLUMNS} FROM roadmap_risks WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.as_ref().map(risk_row_to_record).transpose()
    }

    async fn list_risks(&self, filter: &RiskFilter, limit: usize) -> StorageResult<Vec<Risk>> {
        let sql = format!(
            r#"
            SELECT {RISK_COLUMNS}
              FROM roadmap_risks
             WHERE ($1::TEXT IS NULL OR milestone_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::TEXT IS NULL OR severity = $3)
             ORDER BY
                CASE severity WHEN 'critical' THEN 1 WHEN 'high' THEN 2 WHEN 'medium' THEN 3 ELSE 4 END,
                detected_at DESC
             LIMIT $4
            "#
        );
        let limit = if limit == 0 {
            None
        } else {
            Some(
                i64::try_from(limit)
                    .map_err(|_| StorageError::InvalidInput("limit too large".to_string()))?,
            )
        };

        let rows = sqlx::query(&sql)
            .bind(filter.milestone_id.as_ref().map(|id| id.to_string()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.severity.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(risk_row_to_record).collect()
    }

    async fn apply_status_change(&self, change: StatusChange) -> StorageResult<Risk> {
        let mut tx = self.begin().await?;
        let sql = format!("SELECT {RISK_COLUMNS} FROM roadmap_risks WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*change.risk_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut risk = match row {
            Some(row) => risk_row_to_record(&row)?,
            None => {
                return Err(StorageError::NotFound(format!(
                    "risk {} not found",
                    change.risk_id
                )))
            }
        };

        if let Some(expected) = change.expected {
            if risk.status != expected {
                return Err(StorageError::Conflict(format!(
                    "risk {} is {}, expected {}",
                    risk.id, risk.status, expected
                )));
            }
        }

        risk.apply_status(change.new_status, change.note.clone(), change.at);

        sqlx::query(
            r#"
            UPDATE roadmap_risks
               SET status = $1,
                   resolved_at = $2,
                   resolution_note = $3
             WHERE id = $4
            "#,
        )
        .bind(risk.status.as_str())
        .bind(risk.resolved_at)
        .bind(risk.resolution_note.clone())
        .bind(*risk.id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_conflict)?;

        append_history(
            &mut tx,
            &RiskHistoryEntry {
                risk_id: risk.id,
                action: HistoryAction::StatusChanged,
                new_status: change.new_status,
                note: change.note,
                actor: change.actor,
                timestamp: change.at,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(risk)
    }

    async fn history(&self, id: &RiskId) -> StorageResult<Vec<RiskHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT risk_id, action, new_status, note, actor, created_at
              FROM roadmap_risk_history
             WHERE risk_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let risk_id: Uuid = column(row, "risk_id")?;
                let action: String = column(row, "action")?;
                let new_status: String = column(row, "new_status")?;
                Ok(RiskHistoryEntry {
                    risk_id: RiskId::from_uuid(risk_id),
                    action: parse_enum(&action)?,
                    new_status: parse_enum(&new_status)?,
                    note: column(row, "note")?,
                    actor: column(row, "actor")?,
                    timestamp: column(row, "created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotProvider for PostgresRiskStore {
    async fn load_snapshot(&self, scope: &ScopeFilter) -> StorageResult<Snapshot> {
        let rows = sqlx::query(
            r#"
            SELECT m.id::TEXT AS id, m.title, v.title AS vision_title, m.progress_percent,
                   m.status, m.risk_level, m.target_start, m.target_end, m.quarter
              FROM roadmap_milestones m
              LEFT JOIN roadmap_visions v ON v.id = m.vision_id
             WHERE m.status <> 'completed'
               AND (cardinality($1::TEXT[]) = 0 OR m.id::TEXT = ANY($1))
             ORDER BY m.id
            "#,
        )
        .bind(scope_ids(scope))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Unavailable(format!("milestone query failed: {e}")))?;

        let mut milestones = rows
            .iter()
            .map(milestone_row_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        let ids: Vec<String> = milestones.iter().map(|m| m.id.to_string()).collect();

        let dependency_rows = sqlx::query(
            r#"
            SELECT d.milestone_id::TEXT AS milestone_id, d.depends_on_id::TEXT AS depends_on_id,
                   m.title, m.status
              FROM roadmap_milestone_dependencies d
              JOIN roadmap_milestones m ON m.id = d.depends_on_id
             WHERE d.milestone_id::TEXT = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Unavailable(format!("dependency query failed: {e}")))?;

        let mut links: HashMap<MilestoneId, Vec<MilestoneId>> = HashMap::new();
        let mut dependencies: HashMap<MilestoneId, DependencyRef> = HashMap::new();
        for row in &dependency_rows {
            let owner = MilestoneId::new(column::<String>(row, "milestone_id")?);
            let target = MilestoneId::new(column::<String>(row, "depends_on_id")?);
            let status: String = column(row, "status")?;
            dependencies.insert(
                target.clone(),
                DependencyRef {
                    id: target.clone(),
                    title: column(row, "title")?,
                    status: parse_enum(&status)?,
                },
            );
            links.entry(owner).or_default().push(target);
        }
        for milestone in &mut milestones {
            if let Some(depends_on) = links.remove(&milestone.id) {
                milestone.depends_on = depends_on;
            }
        }

        let epic_rows = sqlx::query(
            r#"
            SELECT milestone_id::TEXT AS milestone_id, epic_key, stream_id::TEXT AS stream_id,
                   total_issues::BIGINT AS total_issues, done_issues::BIGINT AS done_issues,
                   blocked_issues::BIGINT AS blocked_issues,
                   in_progress_issues::BIGINT AS in_progress_issues
              FROM roadmap_epic_stats
             WHERE milestone_id::TEXT = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Unavailable(format!("epic stats query failed: {e}")))?;

        let epic_stats = epic_rows
            .iter()
            .map(|row| {
                Ok(EpicStat {
                    milestone_id: MilestoneId::new(column::<String>(row, "milestone_id")?),
                    epic_key: column(row, "epic_key")?,
                    stream_id: column(row, "stream_id")?,
                    total_issues: count_u32(column(row, "total_issues")?),
                    done_issues: count_u32(column(row, "done_issues")?),
                    blocked_issues: count_u32(column(row, "blocked_issues")?),
                    in_progress_issues: count_u32(column(row, "in_progress_issues")?),
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        tracing::debug!(
            milestones = milestones.len(),
            epics = epic_stats.len(),
            dependencies = dependencies.len(),
            "Loaded snapshot from postgres"
        );

        Ok(Snapshot {
            milestones,
            epic_stats,
            dependencies: dependencies.into_values().collect(),
        }
        .normalized(scope))
    }
}

fn milestone_row_to_record(row: &PgRow) -> StorageResult<Milestone> {
    let status: String = column(row, "status")?;
    let risk_level: Option<String> = column(row, "risk_level")?;
    let progress: i32 = column(row, "progress_percent")?;
    let target_start: Option<NaiveDate> = column(row, "target_start")?;
    let target_end: Option<NaiveDate> = column(row, "target_end")?;

    Ok(Milestone {
        id: MilestoneId::new(column::<String>(row, "id")?),
        title: column(row, "title")?,
        vision_title: column(row, "vision_title")?,
        progress_percent: progress.clamp(0, 100) as u8,
        status: parse_enum::<MilestoneStatus>(&status)?,
        risk_level: risk_level.and_then(|level| level.parse().ok()),
        target_start,
        target_end,
        quarter: column(row, "quarter")?,
        depends_on: Vec::new(),
    })
}

fn risk_row_to_record(row: &PgRow) -> StorageResult<Risk> {
    let id: Uuid = column(row, "id")?;
    let risk_type: String = column(row, "risk_type")?;
    let severity: String = column(row, "severity")?;
    let status: String = column(row, "status")?;
    let trigger_data: serde_json::Value = column(row, "trigger_data")?;

    Ok(Risk {
        id: RiskId::from_uuid(id),
        milestone_id: MilestoneId::new(column::<String>(row, "milestone_id")?),
        stream_id: column(row, "stream_id")?,
        epic_key: column(row, "epic_key")?,
        risk_type: parse_enum(&risk_type)?,
        severity: parse_enum(&severity)?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        suggested_action: column(row, "suggested_action")?,
        confidence_score: column(row, "confidence_score")?,
        trigger_data: serde_json::from_value(trigger_data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        status: parse_enum(&status)?,
        detected_at: column(row, "detected_at")?,
        resolved_at: column(row, "resolved_at")?,
        resolution_note: column(row, "resolution_note")?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::Backend(format!("column `{name}`: {e}")))
}

fn parse_enum<T>(raw: &str) -> StorageResult<T>
where
    T: std::str::FromStr<Err = risk_types::ParseEnumError>,
{
    raw.parse()
        .map_err(|e: risk_types::ParseEnumError| StorageError::Serialization(e.to_string()))
}

fn scope_ids(scope: &ScopeFilter) -> Vec<String> {
    scope.milestone_ids.iter().map(|id| id.to_string()).collect()
}

fn count_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}
