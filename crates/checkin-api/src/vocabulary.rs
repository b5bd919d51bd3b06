use axum::{
    Json,
    extract::{Query, State},
};
use tracing::warn;

use checkin_db::checkins::DATE_FORMAT;
use checkin_db::models::WordRow;
use checkin_db::vocabulary::WORDS_PER_DAY;
use checkin_types::api::{UserQuery, VocabularyResponse, WordView};

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// Shown when the word pool is empty.
const FALLBACK_WORDS: [(&str, &str, u8); 3] = [
    ("resilience", "彈性，適應力", 3),
    ("endeavor", "努力，嘗試", 3),
    ("persistence", "堅持，毅力", 2),
];

pub fn fallback_words() -> Vec<WordView> {
    FALLBACK_WORDS
        .iter()
        .map(|(english, chinese, difficulty)| WordView {
            english: english.to_string(),
            chinese: chinese.to_string(),
            difficulty: *difficulty,
        })
        .collect()
}

fn word_view(row: WordRow) -> WordView {
    WordView {
        english: row.english,
        chinese: row.chinese,
        difficulty: row.difficulty,
    }
}

/// Today's words for a user (assigned and remembered), or random words
/// for an anonymous caller.
pub async fn todays_words(state: &AppState, user_id: Option<&str>) -> Result<Vec<WordView>, ApiError> {
    let today = state.config.today();
    let st = state.clone();
    let uid = user_id.map(str::to_string);

    let rows = run_blocking(move || match uid {
        Some(uid) => st.db.daily_words(&uid, today, &mut rand::rng()),
        None => st.db.random_words(WORDS_PER_DAY),
    })
    .await?;

    if rows.is_empty() {
        warn!("Vocabulary pool is empty, using fallback words");
        return Ok(fallback_words());
    }
    Ok(rows.into_iter().map(word_view).collect())
}

pub fn format_daily_words(words: &[WordView]) -> String {
    if words.is_empty() {
        return "今日無學習詞彙。".to_string();
    }

    let entries: Vec<String> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let stars = "⭐".repeat(w.difficulty.min(5) as usize);
            format!("{}. {}\n   {}\n   {}", i + 1, w.english, w.chinese, stars)
        })
        .collect();

    format!("📚 今日單字學習\n\n{}", entries.join("\n\n"))
}

pub async fn today(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<VocabularyResponse>, ApiError> {
    let user_id = query.user_id.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    let words = todays_words(&state, user_id.as_deref()).await?;

    Ok(Json(VocabularyResponse {
        success: true,
        date: state.config.today().format(DATE_FORMAT).to_string(),
        words,
    }))
}
