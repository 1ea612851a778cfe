pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS app_lock_prefs (
    key TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_app_lock_prefs_locked ON app_lock_prefs(value) WHERE value = 1;
"#;
