use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS supporters (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL UNIQUE,
            display_name        TEXT NOT NULL,
            bio                 TEXT,
            avatar_url          TEXT,
            training_level      TEXT NOT NULL DEFAULT 'peer',
            topics              TEXT NOT NULL DEFAULT '[]',
            is_available        INTEGER NOT NULL DEFAULT 0,
            last_active_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            total_conversations INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_supporters_available
            ON supporters(is_available, last_active_at);

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            supporter_id    TEXT NOT NULL REFERENCES supporters(id),
            seeker_id       TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'active',
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_seeker
            ON conversations(seeker_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_conversations_supporter
            ON conversations(supporter_id, created_at);

        CREATE TABLE IF NOT EXISTS blocks (
            blocker_id  TEXT NOT NULL,
            blocked_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (blocker_id, blocked_id)
        );

        CREATE TABLE IF NOT EXISTS reports (
            id                  TEXT PRIMARY KEY,
            reporter_id         TEXT NOT NULL,
            reported_user_id    TEXT NOT NULL,
            conversation_id     TEXT,
            reason              TEXT NOT NULL,
            additional_notes    TEXT,
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_reports_reported
            ON reports(reported_user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
