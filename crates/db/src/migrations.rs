// crates/db/src/migrations.rs
/// Inline SQL migrations for the gitscout schema.
///
/// Simple inline statements rather than sqlx migration files: the schema is
/// small and self-contained, and every statement is idempotent so the list
/// can run on every boot.
pub const MIGRATIONS: &[&str] = &[
    // users + skills
    r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    github_id BIGINT NOT NULL UNIQUE,
    github_username TEXT NOT NULL DEFAULT '',
    avatar_url TEXT NOT NULL DEFAULT '',
    bio TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'user',
    comfort_level TEXT NOT NULL DEFAULT '',
    time_commitment TEXT NOT NULL DEFAULT '',
    goals TEXT[] NOT NULL DEFAULT '{}',
    onboarding_done BOOLEAN NOT NULL DEFAULT FALSE,
    access_token_enc BYTEA NOT NULL DEFAULT ''::bytea,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS user_skills (
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    language TEXT NOT NULL,
    proficiency DOUBLE PRECISION NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT 'github',
    PRIMARY KEY (user_id, language, source)
);
"#,
    // repositories
    r#"
CREATE TABLE IF NOT EXISTS repositories (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    github_id BIGINT NOT NULL UNIQUE,
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    stars INTEGER NOT NULL DEFAULT 0,
    primary_language TEXT NOT NULL DEFAULT '',
    topics TEXT[] NOT NULL DEFAULT '{}',
    has_contributing BOOLEAN NOT NULL DEFAULT FALSE,
    health_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    last_commit_at TIMESTAMPTZ,
    indexed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    tags TEXT[] NOT NULL DEFAULT '{}',
    difficulty_level TEXT NOT NULL DEFAULT '',
    activity_status TEXT NOT NULL DEFAULT ''
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_repositories_stars ON repositories(stars DESC);"#,
    // issues + skills
    r#"
CREATE TABLE IF NOT EXISTS issues (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    github_id BIGINT NOT NULL,
    repo_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    labels TEXT[] NOT NULL DEFAULT '{}',
    difficulty INTEGER NOT NULL DEFAULT 2,
    time_estimate TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'open',
    comment_count INTEGER NOT NULL DEFAULT 0,
    freshness_score DOUBLE PRECISION NOT NULL DEFAULT 0.5,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    indexed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (github_id, repo_id)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_issues_status_freshness ON issues(status, freshness_score DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_issues_repo ON issues(repo_id);"#,
    r#"
CREATE TABLE IF NOT EXISTS issue_skills (
    issue_id UUID NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    language TEXT NOT NULL,
    framework TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (issue_id, language, framework)
);
"#,
    // categories
    r#"
CREATE TABLE IF NOT EXISTS categories (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    icon TEXT NOT NULL DEFAULT ''
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS repo_categories (
    repo_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (repo_id, category_id)
);
"#,
    // Starter taxonomy; admins extend it directly in the database.
    r#"
INSERT INTO categories (name, slug, description, icon) VALUES
    ('Web Development', 'web-development', 'Frontend and backend web projects', 'globe'),
    ('CLI Tools', 'cli-tools', 'Command-line utilities and developer tools', 'terminal'),
    ('Machine Learning', 'machine-learning', 'ML frameworks, models, and tooling', 'brain'),
    ('DevOps', 'devops', 'Infrastructure, CI/CD, and deployment tooling', 'server'),
    ('Game Development', 'game-development', 'Game engines and games', 'gamepad'),
    ('Data Engineering', 'data-engineering', 'Databases, pipelines, and storage', 'database')
ON CONFLICT (slug) DO NOTHING;
"#,
    // saved issues
    r#"
CREATE TABLE IF NOT EXISTS saved_issues (
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    issue_id UUID NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, issue_id)
);
"#,
    // deep dives
    r#"
CREATE TABLE IF NOT EXISTS deep_dives (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    issue_id UUID NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    issue_indexed_at TIMESTAMPTZ NOT NULL,
    project_overview TEXT NOT NULL DEFAULT '',
    issue_context TEXT NOT NULL DEFAULT '',
    suggested_approach TEXT NOT NULL DEFAULT '',
    questions_to_ask TEXT NOT NULL DEFAULT '',
    red_flags TEXT NOT NULL DEFAULT '',
    first_comment TEXT NOT NULL DEFAULT '',
    model_used TEXT NOT NULL DEFAULT '',
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (issue_id, user_id)
);
"#,
    // refresh tokens
    r#"
CREATE TABLE IF NOT EXISTS refresh_tokens (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash BYTEA NOT NULL UNIQUE,
    expires_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);"#,
];
