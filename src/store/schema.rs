//! Event store schema definitions

pub const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    ip TEXT NOT NULL,
    port INTEGER NOT NULL,
    data TEXT,
    country TEXT,
    city TEXT,
    org TEXT,
    suspicious INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_INDEX_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp)";

pub const CREATE_INDEX_IP: &str = "CREATE INDEX IF NOT EXISTS idx_logs_ip ON logs(ip)";
