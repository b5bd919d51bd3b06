use anyhow::Result;

use crate::Database;
use crate::models::GroupMessageRow;

/// Only the most recent messages are kept.
pub const GROUP_MESSAGE_RETENTION: u32 = 100;

impl Database {
    pub fn insert_group_message(
        &self,
        user_id: &str,
        user_name: &str,
        message: &str,
        timestamp: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO group_messages (user_id, user_name, message, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                (user_id, user_name, message, timestamp),
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "DELETE FROM group_messages WHERE id NOT IN (
                    SELECT id FROM group_messages ORDER BY id DESC LIMIT ?1
                 )",
                [GROUP_MESSAGE_RETENTION],
            )?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Newest first.
    pub fn recent_group_messages(&self, count: u32) -> Result<Vec<GroupMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, user_name, message, timestamp
                 FROM group_messages ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([count], |row| {
                    Ok(GroupMessageRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        user_name: row.get(2)?,
                        message: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_group_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM group_messages", [], |r| r.get(0))?)
        })
    }
}
