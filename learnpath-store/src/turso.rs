//! Turso/libSQL implementation of the learnpath storage contracts.
//!
//! It can connect to:
//! - Remote Turso database (cloud)
//! - Local embedded SQLite file
//! - In-memory database (tests and development)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database};
use tracing::{debug, instrument};

use learnpath_core::context::TenantId;
use learnpath_core::ids::{AttemptId, LessonId, PlanId, QuizId, ResourceId, SkillId, UserId};
use learnpath_core::model::{
    Level, Plan, PlanSummary, PrerequisiteEdge, Progress, ProgressStatus, Quiz, QuizAttempt,
    Resource, Skill,
};
use learnpath_core::store::{
    self, IngestQueue, PlanStore, QuizStore, ResourceCatalog, SkillStore, StoreError,
};

use crate::schema::SCHEMA;
use crate::{Error, Result};

const PLAN_COLUMNS: &str = "id, tenant_id, user_id, goal, lessons, reasoning, prerequisites_met, total_weeks, revision, created_at, updated_at";
const QUIZ_COLUMNS: &str = "id, tenant_id, title, resource_ids, difficulty, questions, created_at";
const ATTEMPT_COLUMNS: &str =
    "id, quiz_id, user_id, answers, score, correct_count, total, results, created_at";

/// Turso-backed store for every learnpath record type.
#[derive(Clone)]
pub struct TursoStore {
    db: Arc<Database>,
    /// In-memory databases live only as long as one connection, so it is kept here.
    shared: Option<Connection>,
}

impl TursoStore {
    /// Open (or create) a local embedded database file.
    pub async fn new_local(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        Self::open(db, false).await
    }

    /// Connect to a remote Turso database.
    pub async fn new_remote(url: &str, token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await?;
        Self::open(db, false).await
    }

    /// Create an in-memory database (for testing).
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::open(db, true).await
    }

    async fn open(db: Database, keep_connection: bool) -> Result<Self> {
        let shared = if keep_connection {
            Some(db.connect()?)
        } else {
            None
        };
        let store = Self {
            db: Arc::new(db),
            shared,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        match &self.shared {
            Some(conn) => Ok(conn.clone()),
            None => Ok(self.db.connect()?),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for statement in SCHEMA {
            conn.execute(statement, ()).await?;
        }
        debug!("schema ensured");
        Ok(())
    }

    // ── skills ──────────────────────────────────────────────────────────

    async fn skills(&self) -> Result<Vec<Skill>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT id, name, slug, level FROM skills ORDER BY slug", ())
            .await?;

        let mut skills = Vec::new();
        while let Some(row) = rows.next().await? {
            let level: i64 = row.get(3)?;
            let level = u8::try_from(level)
                .ok()
                .and_then(|l| Level::try_from(l).ok())
                .ok_or_else(|| Error::InvalidData(format!("invalid skill level: {level}")))?;
            skills.push(Skill {
                id: SkillId::new(row.get::<String>(0)?),
                name: row.get(1)?,
                slug: row.get(2)?,
                level,
            });
        }
        Ok(skills)
    }

    async fn prerequisites(&self) -> Result<Vec<PrerequisiteEdge>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT from_id, to_id FROM skill_prerequisites ORDER BY from_id, to_id",
                (),
            )
            .await?;

        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(PrerequisiteEdge::new(
                row.get::<String>(0)?,
                row.get::<String>(1)?,
            ));
        }
        Ok(edges)
    }

    async fn put_skill(&self, skill: &Skill) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO skills (id, name, slug, level) VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, slug = excluded.slug, level = excluded.level",
                libsql::params![
                    skill.id.as_str(),
                    skill.name.as_str(),
                    skill.slug.as_str(),
                    i64::from(skill.level.as_u8())
                ],
            )
            .await?;
        Ok(())
    }

    async fn put_prerequisite(&self, edge: &PrerequisiteEdge) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO skill_prerequisites (from_id, to_id) VALUES (?, ?)",
                libsql::params![edge.from.as_str(), edge.to.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn delete_prerequisite(&self, edge: &PrerequisiteEdge) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM skill_prerequisites WHERE from_id = ? AND to_id = ?",
                libsql::params![edge.from.as_str(), edge.to.as_str()],
            )
            .await?;
        Ok(())
    }

    // ── resources ───────────────────────────────────────────────────────

    async fn resources_by_id(&self, ids: &[ResourceId]) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut resources = Vec::with_capacity(ids.len());
        for id in ids {
            let mut rows = conn
                .query("SELECT payload FROM resources WHERE id = ?", [id.as_str()])
                .await?;
            if let Some(row) = rows.next().await? {
                let payload: String = row.get(0)?;
                resources.push(serde_json::from_str(&payload)?);
            }
        }
        Ok(resources)
    }

    async fn all_resources(&self) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT payload FROM resources ORDER BY id", ())
            .await?;
        let mut resources = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            resources.push(serde_json::from_str(&payload)?);
        }
        Ok(resources)
    }

    async fn put_resource(&self, resource: &Resource) -> Result<()> {
        let payload = serde_json::to_string(resource)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO resources (id, tenant_id, payload) VALUES (?, ?, ?)",
                libsql::params![resource.id.as_str(), resource.tenant.as_str(), payload],
            )
            .await?;
        Ok(())
    }

    // ── plans ───────────────────────────────────────────────────────────

    fn parse_plan(row: &libsql::Row) -> Result<Plan> {
        let id_str: String = row.get(0)?;
        let tenant: String = row.get(1)?;
        let user: String = row.get(2)?;
        let goal_json: String = row.get(3)?;
        let lessons_json: String = row.get(4)?;
        let reasoning_json: String = row.get(5)?;
        let met_json: String = row.get(6)?;
        let total_weeks: i64 = row.get(7)?;
        let revision: i64 = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(Plan {
            id: parse_id(&id_str, "plan")?,
            tenant: TenantId::new(tenant),
            user_id: UserId::new(user),
            goal: serde_json::from_str(&goal_json)?,
            lessons: serde_json::from_str(&lessons_json)?,
            reasoning: serde_json::from_str(&reasoning_json)?,
            prerequisites_met: serde_json::from_str(&met_json)?,
            total_weeks: to_u32(total_weeks, "total_weeks")?,
            revision: to_u32(revision, "revision")?,
            created_at: parse_datetime(&created_at)?,
            updated_at: parse_datetime(&updated_at)?,
        })
    }

    async fn put_plan(&self, plan: &Plan) -> Result<()> {
        self.conn()?
            .execute(
                &format!("INSERT INTO plans ({PLAN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
                libsql::params![
                    plan.id.to_string(),
                    plan.tenant.as_str(),
                    plan.user_id.as_str(),
                    serde_json::to_string(&plan.goal)?,
                    serde_json::to_string(&plan.lessons)?,
                    serde_json::to_string(&plan.reasoning)?,
                    serde_json::to_string(&plan.prerequisites_met)?,
                    i64::from(plan.total_weeks),
                    i64::from(plan.revision),
                    format_datetime(plan.created_at),
                    format_datetime(plan.updated_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn plan(&self, id: PlanId) -> Result<Option<Plan>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?"),
                [id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_plan(&row)?)),
            None => Ok(None),
        }
    }

    /// Swap lessons, reasoning and schedule length in one statement so readers never see
    /// a half-replaced plan.
    async fn replace_plan(&self, plan: &Plan) -> Result<u64> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE plans SET lessons = ?, reasoning = ?, prerequisites_met = ?, total_weeks = ?, revision = ?, updated_at = ? WHERE id = ?",
                libsql::params![
                    serde_json::to_string(&plan.lessons)?,
                    serde_json::to_string(&plan.reasoning)?,
                    serde_json::to_string(&plan.prerequisites_met)?,
                    i64::from(plan.total_weeks),
                    i64::from(plan.revision),
                    format_datetime(plan.updated_at),
                    plan.id.to_string()
                ],
            )
            .await?;
        Ok(changed)
    }

    async fn plans_for(&self, tenant: &TenantId, user: &UserId) -> Result<Vec<PlanSummary>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PLAN_COLUMNS} FROM plans WHERE tenant_id = ? AND user_id = ? ORDER BY created_at DESC"
                ),
                libsql::params![tenant.as_str(), user.as_str()],
            )
            .await?;
        let mut plans = Vec::new();
        while let Some(row) = rows.next().await? {
            plans.push(Self::parse_plan(&row)?.summary());
        }
        Ok(plans)
    }

    async fn put_progress(&self, progress: &[Progress]) -> Result<()> {
        let conn = self.conn()?;
        for p in progress {
            conn.execute(
                "INSERT INTO progress (lesson_id, user_id, plan_id, status, minutes_spent, quiz_score, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(lesson_id, user_id) DO UPDATE SET
                    status = excluded.status,
                    minutes_spent = excluded.minutes_spent,
                    quiz_score = COALESCE(excluded.quiz_score, progress.quiz_score),
                    updated_at = excluded.updated_at",
                libsql::params![
                    p.lesson_id.to_string(),
                    p.user_id.as_str(),
                    p.plan_id.to_string(),
                    p.status.as_str(),
                    i64::from(p.minutes_spent),
                    p.quiz_score,
                    format_datetime(p.updated_at)
                ],
            )
            .await?;
        }
        Ok(())
    }

    async fn progress_for(&self, plan_id: PlanId, user: &UserId) -> Result<Vec<Progress>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT lesson_id, plan_id, user_id, status, minutes_spent, quiz_score, updated_at
                 FROM progress WHERE plan_id = ? AND user_id = ? ORDER BY lesson_id",
                libsql::params![plan_id.to_string(), user.as_str()],
            )
            .await?;

        let mut progress = Vec::new();
        while let Some(row) = rows.next().await? {
            let lesson: String = row.get(0)?;
            let plan: String = row.get(1)?;
            let status: String = row.get(3)?;
            let minutes: i64 = row.get(4)?;
            let updated_at: String = row.get(6)?;
            progress.push(Progress {
                lesson_id: parse_id::<LessonId>(&lesson, "lesson")?,
                plan_id: parse_id(&plan, "plan")?,
                user_id: UserId::new(row.get::<String>(2)?),
                status: ProgressStatus::parse(&status)
                    .ok_or_else(|| Error::InvalidData(format!("invalid status: {status}")))?,
                minutes_spent: to_u32(minutes, "minutes_spent")?,
                quiz_score: row.get::<Option<f64>>(5)?,
                updated_at: parse_datetime(&updated_at)?,
            });
        }
        Ok(progress)
    }

    // ── quizzes ─────────────────────────────────────────────────────────

    async fn put_quiz(&self, quiz: &Quiz) -> Result<()> {
        let difficulty = quiz.difficulty.map(|d| d.to_string());
        self.conn()?
            .execute(
                &format!("INSERT INTO quizzes ({QUIZ_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
                libsql::params![
                    quiz.id.to_string(),
                    quiz.tenant.as_str(),
                    quiz.title.as_str(),
                    serde_json::to_string(&quiz.resource_ids)?,
                    difficulty,
                    serde_json::to_string(&quiz.questions)?,
                    format_datetime(quiz.created_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn quiz(&self, id: QuizId) -> Result<Option<Quiz>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                &format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?"),
                [id.to_string()],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let id_str: String = row.get(0)?;
        let difficulty: Option<String> = row.get(4)?;
        let difficulty = difficulty
            .map(|d| serde_json::from_value(serde_json::Value::String(d)))
            .transpose()?;
        let resource_ids: String = row.get(3)?;
        let questions: String = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(Some(Quiz {
            id: parse_id(&id_str, "quiz")?,
            tenant: TenantId::new(row.get::<String>(1)?),
            title: row.get(2)?,
            resource_ids: serde_json::from_str(&resource_ids)?,
            difficulty,
            questions: serde_json::from_str(&questions)?,
            created_at: parse_datetime(&created_at)?,
        }))
    }

    async fn put_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        self.conn()?
            .execute(
                &format!("INSERT INTO quiz_attempts ({ATTEMPT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"),
                libsql::params![
                    attempt.id.to_string(),
                    attempt.quiz_id.to_string(),
                    attempt.user_id.as_str(),
                    serde_json::to_string(&attempt.answers)?,
                    attempt.score,
                    i64::from(attempt.correct_count),
                    i64::from(attempt.total),
                    serde_json::to_string(&attempt.results)?,
                    format_datetime(attempt.created_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn attempts(&self, quiz_id: QuizId) -> Result<Vec<QuizAttempt>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE quiz_id = ? ORDER BY created_at"
                ),
                [quiz_id.to_string()],
            )
            .await?;

        let mut attempts = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let quiz: String = row.get(1)?;
            let answers: String = row.get(3)?;
            let correct: i64 = row.get(5)?;
            let total: i64 = row.get(6)?;
            let results: String = row.get(7)?;
            let created_at: String = row.get(8)?;
            attempts.push(QuizAttempt {
                id: parse_id::<AttemptId>(&id, "attempt")?,
                quiz_id: parse_id(&quiz, "quiz")?,
                user_id: UserId::new(row.get::<String>(2)?),
                answers: serde_json::from_str(&answers)?,
                score: row.get(4)?,
                correct_count: to_u32(correct, "correct_count")?,
                total: to_u32(total, "total")?,
                results: serde_json::from_str(&results)?,
                created_at: parse_datetime(&created_at)?,
            });
        }
        Ok(attempts)
    }

    // ── ingestion ───────────────────────────────────────────────────────

    async fn queue_urls(&self, tenant: &TenantId, urls: &[String]) -> Result<usize> {
        let conn = self.conn()?;
        let now = format_datetime(Utc::now());
        for url in urls {
            conn.execute(
                "INSERT INTO ingest_requests (tenant_id, url, requested_at) VALUES (?, ?, ?)",
                libsql::params![tenant.as_str(), url.as_str(), now.as_str()],
            )
            .await?;
        }
        Ok(urls.len())
    }

    /// Pending ingestion URLs for a tenant, oldest first.
    pub async fn pending_ingest(&self, tenant: &TenantId) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT url FROM ingest_requests WHERE tenant_id = ? AND status = 'pending' ORDER BY id",
                [tenant.as_str()],
            )
            .await?;
        let mut urls = Vec::new();
        while let Some(row) = rows.next().await? {
            urls.push(row.get(0)?);
        }
        Ok(urls)
    }
}

#[async_trait]
impl SkillStore for TursoStore {
    #[instrument(skip(self), level = "debug")]
    async fn list_skills(&self) -> store::Result<Vec<Skill>> {
        Ok(self.skills().await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_prerequisites(&self) -> store::Result<Vec<PrerequisiteEdge>> {
        Ok(self.prerequisites().await?)
    }

    #[instrument(skip(self, skill), fields(skill_id = %skill.id), level = "debug")]
    async fn upsert_skill(&self, skill: &Skill) -> store::Result<()> {
        Ok(self.put_skill(skill).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn insert_prerequisite(&self, edge: &PrerequisiteEdge) -> store::Result<()> {
        Ok(self.put_prerequisite(edge).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_prerequisite(&self, edge: &PrerequisiteEdge) -> store::Result<()> {
        Ok(self.delete_prerequisite(edge).await?)
    }
}

#[async_trait]
impl ResourceCatalog for TursoStore {
    #[instrument(skip(self), level = "debug")]
    async fn get_resources(&self, ids: &[ResourceId]) -> store::Result<Vec<Resource>> {
        Ok(self.resources_by_id(ids).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_resources(&self) -> store::Result<Vec<Resource>> {
        Ok(self.all_resources().await?)
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.id), level = "debug")]
    async fn upsert_resource(&self, resource: &Resource) -> store::Result<()> {
        Ok(self.put_resource(resource).await?)
    }
}

#[async_trait]
impl PlanStore for TursoStore {
    #[instrument(skip(self, plan), fields(plan_id = %plan.id), level = "debug")]
    async fn insert_plan(&self, plan: &Plan) -> store::Result<()> {
        Ok(self.put_plan(plan).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_plan(&self, id: PlanId) -> store::Result<Option<Plan>> {
        Ok(self.plan(id).await?)
    }

    #[instrument(skip(self, plan), fields(plan_id = %plan.id, revision = plan.revision), level = "debug")]
    async fn update_plan(&self, plan: &Plan) -> store::Result<()> {
        match self.replace_plan(plan).await? {
            0 => Err(StoreError::NotFound(format!("plan {}", plan.id))),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_plans(&self, tenant: &TenantId, user: &UserId) -> store::Result<Vec<PlanSummary>> {
        Ok(self.plans_for(tenant, user).await?)
    }

    #[instrument(skip(self, progress), fields(rows = progress.len()), level = "debug")]
    async fn record_progress(&self, progress: &[Progress]) -> store::Result<()> {
        Ok(self.put_progress(progress).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_progress(&self, plan_id: PlanId, user: &UserId) -> store::Result<Vec<Progress>> {
        Ok(self.progress_for(plan_id, user).await?)
    }
}

#[async_trait]
impl QuizStore for TursoStore {
    #[instrument(skip(self, quiz), fields(quiz_id = %quiz.id), level = "debug")]
    async fn insert_quiz(&self, quiz: &Quiz) -> store::Result<()> {
        Ok(self.put_quiz(quiz).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_quiz(&self, id: QuizId) -> store::Result<Option<Quiz>> {
        Ok(self.quiz(id).await?)
    }

    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id), level = "debug")]
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> store::Result<()> {
        Ok(self.put_attempt(attempt).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_attempts(&self, quiz_id: QuizId) -> store::Result<Vec<QuizAttempt>> {
        Ok(self.attempts(quiz_id).await?)
    }
}

#[async_trait]
impl IngestQueue for TursoStore {
    #[instrument(skip(self, urls), fields(count = urls.len()), level = "debug")]
    async fn enqueue(&self, tenant: &TenantId, urls: &[String]) -> store::Result<usize> {
        Ok(self.queue_urls(tenant, urls).await?)
    }
}

fn parse_id<T: std::str::FromStr>(s: &str, kind: &str) -> Result<T> {
    s.parse()
        .map_err(|_| Error::InvalidData(format!("invalid {kind} id: {s}")))
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidData(format!("{column} out of range: {value}")))
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidData(format!("invalid datetime: {}", s)))
}
