//! Table definitions. Applied idempotently when a store is opened.

pub(crate) const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS skills (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    level INTEGER NOT NULL DEFAULT 0
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS skill_prerequisites (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    PRIMARY KEY (from_id, to_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    payload TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    goal TEXT NOT NULL,
    lessons TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    prerequisites_met TEXT NOT NULL,
    total_weeks INTEGER NOT NULL,
    revision INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_plans_owner
ON plans(tenant_id, user_id, created_at)
"#,
    r#"
CREATE TABLE IF NOT EXISTS progress (
    lesson_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    plan_id TEXT NOT NULL,
    status TEXT NOT NULL,
    minutes_spent INTEGER NOT NULL,
    quiz_score REAL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (lesson_id, user_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS quizzes (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    title TEXT NOT NULL,
    resource_ids TEXT NOT NULL,
    difficulty TEXT,
    questions TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS quiz_attempts (
    id TEXT PRIMARY KEY,
    quiz_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    answers TEXT NOT NULL,
    score REAL NOT NULL,
    correct_count INTEGER NOT NULL,
    total INTEGER NOT NULL,
    results TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS ingest_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    requested_at TEXT NOT NULL
)
"#,
];
