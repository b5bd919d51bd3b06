use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Word pool seeded on first start. English, Chinese, difficulty (1-5).
pub const SEED_VOCABULARY: &[(&str, &str, u8)] = &[
    ("abundant", "豐富的", 2),
    ("accommodate", "容納；適應", 2),
    ("acquisition", "獲得；收購", 2),
    ("advocate", "提倡；擁護", 2),
    ("aesthetic", "美學的；審美的", 2),
    ("alleviate", "減輕；緩和", 2),
    ("ambiguous", "模糊的；不明確的", 2),
    ("ambitious", "有雄心的；野心勃勃的", 2),
    ("analogous", "類似的；相似的", 2),
    ("analyze", "分析；解析", 2),
    ("capricious", "反覆無常的；任性的", 3),
    ("clandestine", "秘密的；隱蔽的", 3),
    ("cognizant", "認識到的；意識到的", 3),
    ("connotation", "含義；內涵", 3),
    ("conundrum", "難題；謎語", 3),
    ("cryptic", "神秘的；含義隱晦的", 3),
    ("deference", "尊重；敬重", 3),
    ("deliberate", "深思熟慮的；故意的", 3),
    ("deleterious", "有害的；有毒的", 3),
    ("demystify", "揭秘；使明白易懂", 3),
    ("resilience", "恢復力；彈性", 4),
    ("endeavor", "努力；嘗試", 4),
    ("persistence", "堅持；毅力", 4),
    ("reliability", "可靠性；可信度", 2),
    ("dedication", "奉獻；專注", 2),
    ("proficiency", "熟練；精通", 2),
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id       TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                display_name  TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS checkin_records (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       TEXT NOT NULL,
                name          TEXT NOT NULL,
                date          TEXT NOT NULL,
                time          TEXT NOT NULL,
                checkin_type  TEXT NOT NULL,
                location      TEXT,
                note          TEXT,
                latitude      REAL,
                longitude     REAL,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, date, checkin_type)
            );

            CREATE INDEX IF NOT EXISTS idx_checkin_records_date
                ON checkin_records(date, time);

            CREATE TABLE IF NOT EXISTS group_messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                user_name   TEXT NOT NULL,
                message     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reminder_settings (
                user_id          TEXT PRIMARY KEY,
                enabled          INTEGER NOT NULL DEFAULT 1,
                morning_time     TEXT NOT NULL DEFAULT '09:00',
                evening_time     TEXT NOT NULL DEFAULT '18:00',
                weekend_enabled  INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS reminder_logs (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id        TEXT NOT NULL,
                reminder_type  TEXT NOT NULL,
                sent_at        TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reminder_logs_user
                ON reminder_logs(user_id, reminder_type, sent_at);

            CREATE TABLE IF NOT EXISTS vocabulary (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                english      TEXT NOT NULL UNIQUE,
                chinese      TEXT NOT NULL,
                difficulty   INTEGER NOT NULL DEFAULT 2,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS user_vocabulary (
                user_id   TEXT NOT NULL,
                date      TEXT NOT NULL,
                slot      INTEGER NOT NULL,
                word_id   INTEGER NOT NULL REFERENCES vocabulary(id),
                PRIMARY KEY (user_id, date, slot)
            );

            CREATE INDEX IF NOT EXISTS idx_user_vocabulary_date
                ON user_vocabulary(date);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO vocabulary (english, chinese, difficulty) VALUES (?1, ?2, ?3)",
        )?;
        for (english, chinese, difficulty) in SEED_VOCABULARY {
            stmt.execute(rusqlite::params![english, chinese, difficulty])?;
        }
    }

    info!("Database migrations complete");
    Ok(())
}
