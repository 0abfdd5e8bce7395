use crate::Database;
use crate::models::{ConversationRow, ProfileRow, ReportRow, SupporterRow};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

const SUPPORTER_COLUMNS: &str = "id, user_id, display_name, bio, avatar_url, training_level, \
     topics, is_available, last_active_at, total_conversations";

const CONVERSATION_COLUMNS: &str = "id, supporter_id, seeker_id, status, created_at";

impl Database {
    // -- Supporters --

    pub fn create_supporter(&self, id: &str, user_id: &str, profile: &ProfileRow<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO supporters (id, user_id, display_name, bio, avatar_url, training_level, topics)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    user_id,
                    profile.display_name,
                    profile.bio,
                    profile.avatar_url,
                    profile.training_level,
                    profile.topics,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_supporter_by_user(&self, user_id: &str) -> Result<Option<SupporterRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM supporters WHERE user_id = ?1", SUPPORTER_COLUMNS);
            conn.query_row(&sql, [user_id], supporter_from_row).optional()
        })
    }

    pub fn get_supporter(&self, id: &str) -> Result<Option<SupporterRow>> {
        self.with_conn(|conn| query_supporter(conn, id))
    }

    /// Available supporters, most recently active first.
    pub fn list_available_supporters(&self) -> Result<Vec<SupporterRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM supporters WHERE is_available = 1 ORDER BY last_active_at DESC, id",
                SUPPORTER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], supporter_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the user has no supporter record.
    pub fn update_supporter_profile(&self, user_id: &str, profile: &ProfileRow<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE supporters
                 SET display_name = ?2, bio = ?3, avatar_url = ?4, training_level = ?5, topics = ?6,
                     last_active_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id,
                    profile.display_name,
                    profile.bio,
                    profile.avatar_url,
                    profile.training_level,
                    profile.topics,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Flip availability. Returns the new value, or None if the user is not a supporter.
    pub fn toggle_availability(&self, user_id: &str) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE supporters
                 SET is_available = NOT is_available,
                     last_active_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1
                 RETURNING is_available",
                [user_id],
                |row| row.get::<_, bool>(0),
            )
            .optional()
        })
    }

    // -- Conversations --

    /// Insert an active conversation and bump the supporter's counter atomically.
    pub fn create_conversation(
        &self,
        id: &str,
        supporter_id: &str,
        seeker_id: &str,
    ) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO conversations (id, supporter_id, seeker_id) VALUES (?1, ?2, ?3)",
                (id, supporter_id, seeker_id),
            )?;
            tx.execute(
                "UPDATE supporters SET total_conversations = total_conversations + 1 WHERE id = ?1",
                [supporter_id],
            )?;

            let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
            let row = tx.query_row(&sql, [id], conversation_from_row)?;

            tx.commit()?;
            Ok(row)
        })
    }

    /// Conversations the user takes part in, either as seeker or as supporter.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations
                 WHERE seeker_id = ?1
                    OR supporter_id IN (SELECT id FROM supporters WHERE user_id = ?1)
                 ORDER BY created_at DESC, id",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// End every active conversation between two users, whichever side each is on.
    /// Returns how many were ended.
    pub fn end_conversations_between(&self, a: &str, b: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let ended = conn.execute(
                "UPDATE conversations SET status = 'ended'
                 WHERE status = 'active'
                   AND ((seeker_id = ?1 AND supporter_id IN (SELECT id FROM supporters WHERE user_id = ?2))
                     OR (seeker_id = ?2 AND supporter_id IN (SELECT id FROM supporters WHERE user_id = ?1)))",
                (a, b),
            )?;
            Ok(ended)
        })
    }

    // -- Blocks --

    /// Idempotent. Returns true only when a new edge was written.
    pub fn create_block(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id)
                 SELECT ?1, ?2 WHERE ?1 <> ?2",
                (blocker_id, blocked_id),
            )?;
            Ok(inserted > 0)
        })
    }

    /// True if either user blocked the other.
    pub fn is_blocked_between(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM blocks
                 WHERE (blocker_id = ?1 AND blocked_id = ?2)
                    OR (blocker_id = ?2 AND blocked_id = ?1)",
                (a, b),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    // -- Reports --

    pub fn create_report(&self, report: &ReportRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter_id, reported_user_id, conversation_id, reason, additional_notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    report.id,
                    report.reporter_id,
                    report.reported_user_id,
                    report.conversation_id,
                    report.reason,
                    report.additional_notes,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_reports_against(&self, reported_user_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reporter_id, reported_user_id, conversation_id, reason, additional_notes
                 FROM reports WHERE reported_user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([reported_user_id], |row| {
                    Ok(ReportRow {
                        id: row.get(0)?,
                        reporter_id: row.get(1)?,
                        reported_user_id: row.get(2)?,
                        conversation_id: row.get(3)?,
                        reason: row.get(4)?,
                        additional_notes: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_supporters(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM supporters", [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| anyhow!("count supporters: {}", e))
        })
    }
}

fn query_supporter(conn: &Connection, id: &str) -> Result<Option<SupporterRow>> {
    let sql = format!("SELECT {} FROM supporters WHERE id = ?1", SUPPORTER_COLUMNS);
    conn.query_row(&sql, [id], supporter_from_row).optional()
}

fn supporter_from_row(row: &Row<'_>) -> rusqlite::Result<SupporterRow> {
    Ok(SupporterRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        training_level: row.get(5)?,
        topics: row.get(6)?,
        is_available: row.get(7)?,
        last_active_at: row.get(8)?,
        total_conversations: row.get(9)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        supporter_id: row.get(1)?,
        seeker_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
