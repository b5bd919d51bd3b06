use anyhow::Result;

use crate::models::UserRow;
use crate::{Database, OptionalExt};

impl Database {
    /// Insert the user on first sight; later calls refresh the display name
    /// but keep the original `name`.
    pub fn upsert_user(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, name, display_name) VALUES (?1, ?2, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
                (user_id, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, name, display_name, created_at FROM users WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(UserRow {
                            user_id: row.get(0)?,
                            name: row.get(1)?,
                            display_name: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
    }
}
