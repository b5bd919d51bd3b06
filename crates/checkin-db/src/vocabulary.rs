use std::collections::HashSet;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use rusqlite::Connection;

use crate::checkins::DATE_FORMAT;
use crate::models::WordRow;
use crate::{Database, OptionalExt};

pub const WORDS_PER_DAY: usize = 3;

/// A user does not see the same word again within this many days, as long
/// as the pool allows it.
pub const REPEAT_WINDOW_DAYS: i64 = 1095;

impl Database {
    /// The user's words for `date`, assigning them on first request.
    ///
    /// Picks from words the user has not had within the repeat window and
    /// that no other user got the same day. When that leaves fewer than
    /// three, tops up with the globally least recently assigned words.
    pub fn daily_words<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        date: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<WordRow>> {
        let day = date.format(DATE_FORMAT).to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing = assigned_words(&tx, user_id, &day)?;
            if !existing.is_empty() {
                return Ok(existing);
            }

            let picked = pick_words(&tx, user_id, date, rng)?;
            for (slot, word_id) in picked.iter().enumerate() {
                tx.execute(
                    "INSERT INTO user_vocabulary (user_id, date, slot, word_id) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![user_id, day, slot as i64, word_id],
                )?;
            }

            let words = assigned_words(&tx, user_id, &day)?;
            tx.commit()?;
            Ok(words)
        })
    }

    /// Random words without recording an assignment.
    pub fn random_words(&self, count: usize) -> Result<Vec<WordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, english, chinese, difficulty FROM vocabulary ORDER BY RANDOM() LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([count as i64], map_word)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Add a word to the pool; an existing English word keeps its entry.
    pub fn add_word(&self, english: &str, chinese: &str, difficulty: u8) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO vocabulary (english, chinese, difficulty) VALUES (?1, ?2, ?3)",
                rusqlite::params![english, chinese, difficulty.clamp(1, 5)],
            )?;
            let id = conn
                .query_row("SELECT id FROM vocabulary WHERE english = ?1", [english], |r| r.get(0))
                .optional()?
                .ok_or_else(|| anyhow::anyhow!("word vanished after insert: {}", english))?;
            Ok(id)
        })
    }

    pub fn count_words(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM vocabulary", [], |r| r.get(0))?))
    }
}

fn pick_words<R: Rng + ?Sized>(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
    rng: &mut R,
) -> rusqlite::Result<Vec<i64>> {
    let day = date.format(DATE_FORMAT).to_string();
    let window_start = (date - Duration::days(REPEAT_WINDOW_DAYS)).format(DATE_FORMAT).to_string();

    let mut stmt = conn.prepare(
        "SELECT DISTINCT word_id FROM user_vocabulary
         WHERE (user_id = ?1 AND date >= ?2) OR (date = ?3 AND user_id != ?1)",
    )?;
    let used: HashSet<i64> = stmt
        .query_map(rusqlite::params![user_id, window_start, day], |r| r.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    let mut stmt = conn.prepare("SELECT id FROM vocabulary ORDER BY id")?;
    let mut candidates: Vec<i64> = stmt
        .query_map([], |r| r.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?
        .into_iter()
        .filter(|id| !used.contains(id))
        .collect();

    candidates.shuffle(rng);
    candidates.truncate(WORDS_PER_DAY);

    if candidates.len() < WORDS_PER_DAY {
        // Never-assigned words sort first (NULL), then oldest last use.
        let mut stmt = conn.prepare(
            "SELECT v.id FROM vocabulary v
             LEFT JOIN user_vocabulary uv ON uv.word_id = v.id
             GROUP BY v.id
             ORDER BY MAX(uv.date) ASC, v.id ASC",
        )?;
        let lru = stmt
            .query_map([], |r| r.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for id in lru {
            if candidates.len() >= WORDS_PER_DAY {
                break;
            }
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }
    }

    Ok(candidates)
}

fn assigned_words(conn: &Connection, user_id: &str, day: &str) -> rusqlite::Result<Vec<WordRow>> {
    let mut stmt = conn.prepare(
        "SELECT v.id, v.english, v.chinese, v.difficulty
         FROM user_vocabulary uv
         JOIN vocabulary v ON v.id = uv.word_id
         WHERE uv.user_id = ?1 AND uv.date = ?2
         ORDER BY uv.slot",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, day], map_word)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_word(row: &rusqlite::Row<'_>) -> rusqlite::Result<WordRow> {
    Ok(WordRow {
        id: row.get(0)?,
        english: row.get(1)?,
        chinese: row.get(2)?,
        difficulty: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn assignment_is_idempotent_per_day() {
        let db = Database::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let first = db.daily_words("U1", day(4), &mut rng).unwrap();
        let second = db.daily_words("U1", day(4), &mut rng).unwrap();
        assert_eq!(first.len(), WORDS_PER_DAY);
        assert_eq!(first, second);
    }

    #[test]
    fn words_do_not_repeat_for_a_user_or_across_users_on_the_same_day() {
        let db = Database::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut seen = HashSet::new();
        // 26 seed words: 8 days x 3 words fit without reuse.
        for d in 1..=8 {
            for w in db.daily_words("U1", day(d), &mut rng).unwrap() {
                assert!(seen.insert(w.id), "word {} repeated", w.english);
            }
        }

        let u1_today: HashSet<i64> = db.daily_words("U1", day(8), &mut rng).unwrap().iter().map(|w| w.id).collect();
        let u2_today: HashSet<i64> = db.daily_words("U2", day(8), &mut rng).unwrap().iter().map(|w| w.id).collect();
        assert!(u1_today.is_disjoint(&u2_today));
    }

    #[test]
    fn exhausted_pool_falls_back_to_least_recently_used() {
        let db = Database::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let total = db.count_words().unwrap() as usize;

        let days_to_exhaust = total / WORDS_PER_DAY;
        for d in 1..=days_to_exhaust as u32 {
            db.daily_words("U1", day(d), &mut rng).unwrap();
        }

        // The pool no longer has three unseen words; still three distinct ones come back.
        let words = db.daily_words("U1", day(days_to_exhaust as u32 + 1), &mut rng).unwrap();
        assert_eq!(words.len(), WORDS_PER_DAY);
        let distinct: HashSet<i64> = words.iter().map(|w| w.id).collect();
        assert_eq!(distinct.len(), WORDS_PER_DAY);
    }

    fn keep_words(db: &Database, keep: usize) {
        db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM vocabulary WHERE id NOT IN (SELECT id FROM vocabulary ORDER BY id LIMIT ?1)",
                [keep as i64],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn assignment_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user_vocabulary", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn small_pool_returns_what_exists() {
        let db = Database::open_in_memory().unwrap();
        keep_words(&db, 2);
        let mut rng = StdRng::seed_from_u64(3);

        let words = db.daily_words("U1", day(4), &mut rng).unwrap();
        assert_eq!(words.len(), 2);
        assert_ne!(words[0].id, words[1].id);
        assert_eq!(db.daily_words("U1", day(4), &mut rng).unwrap(), words);
    }

    #[test]
    fn empty_pool_assigns_nothing() {
        let db = Database::open_in_memory().unwrap();
        keep_words(&db, 0);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(db.daily_words("U1", day(4), &mut rng).unwrap().is_empty());
        assert!(db.random_words(WORDS_PER_DAY).unwrap().is_empty());
        assert_eq!(assignment_count(&db), 0);
    }

    #[test]
    fn add_word_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let before = db.count_words().unwrap();
        let a = db.add_word("serendipity", "意外的幸運", 4).unwrap();
        let b = db.add_word("serendipity", "機緣", 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(db.count_words().unwrap(), before + 1);
    }
}
