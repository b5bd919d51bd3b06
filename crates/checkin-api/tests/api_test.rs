use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDateTime;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use checkin_api::reminders::send_due_reminders;
use checkin_api::{AppConfig, AppState, AppStateInner, router};
use checkin_db::Database;
use checkin_line::Messenger;
use checkin_line::rich_menu::RichMenu;
use checkin_line::signature::sign;
use checkin_types::line::Profile;

/// Records everything instead of calling LINE.
#[derive(Default)]
struct FakeMessenger {
    pushes: Mutex<Vec<(String, String)>>,
    replies: Mutex<Vec<(String, String)>>,
    menus: Mutex<Vec<usize>>,
    fail_push: AtomicBool,
}

impl FakeMessenger {
    fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }

    fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn push_text(&self, to: &str, text: &str) -> anyhow::Result<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            anyhow::bail!("push disabled in test");
        }
        self.pushes.lock().unwrap().push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn reply_text(&self, reply_token: &str, text: &str) -> anyhow::Result<()> {
        self.replies.lock().unwrap().push((reply_token.to_string(), text.to_string()));
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> anyhow::Result<Option<Profile>> {
        Ok(Some(Profile {
            user_id: user_id.to_string(),
            display_name: format!("name-{user_id}"),
            picture_url: None,
            status_message: None,
        }))
    }

    async fn install_rich_menu(&self, menu: &RichMenu) -> anyhow::Result<String> {
        self.menus.lock().unwrap().push(menu.areas.len());
        Ok("richmenu-test".to_string())
    }
}

struct TestApp {
    router: Router,
    messenger: Arc<FakeMessenger>,
    state: AppState,
}

fn test_config() -> AppConfig {
    AppConfig {
        group_id: Some("G1".into()),
        liff_id: "liff-1".into(),
        group_liff_id: "liff-2".into(),
        app_url: "https://checkin.test".into(),
        admin_ids: vec!["ADMIN".into()],
        ..Default::default()
    }
}

fn setup(config: AppConfig) -> TestApp {
    let messenger = Arc::new(FakeMessenger::default());
    let db = Database::open_in_memory().unwrap();
    let state = AppStateInner::new(db, messenger.clone(), config);
    TestApp { router: router(state.clone()), messenger, state }
}

async fn call(app: &TestApp, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

async fn post_json(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = call(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, bytes) = call(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn checkin_body(user: &str, kind: &str) -> Value {
    json!({
        "userId": user,
        "displayName": "小明",
        "location": "台北辦公室",
        "latitude": 25.033,
        "longitude": "121.5654",
        "checkinType": kind,
    })
}

#[tokio::test]
async fn test_health() {
    let app = setup(test_config());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn test_clock_in_duplicate_then_clock_out() {
    let app = setup(test_config());

    let (status, body) = post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "上班打卡成功");
    assert_eq!(body["state"], "CLOCKED_IN");

    let pushes = app.messenger.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "G1");
    assert!(pushes[0].1.starts_with("✅ 小明 已於 "));
    assert!(pushes[0].1.contains("完成上班打卡\n📍 位置: 台北辦公室"));
    assert!(pushes[0].1.ends_with("🗺️ https://www.google.com/maps?q=25.033,121.5654"));

    let (status, body) = post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "今天已經上班打卡過了");

    let (status, body) = post_json(&app, "/api/checkin", checkin_body("U1", "下班")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "CLOCKED_OUT");

    let (status, body) = get_json(&app, "/api/checkin/status?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "CLOCKED_OUT");
    assert_eq!(body["records"].as_array().unwrap().len(), 2);

    // Duplicate attempts never reach the group.
    assert_eq!(app.messenger.pushes().len(), 2);
}

#[tokio::test]
async fn test_clock_out_without_clock_in() {
    let app = setup(test_config());
    let (status, body) = post_json(&app, "/api/checkin", checkin_body("U1", "下班")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "今天尚未上班打卡，無法下班打卡");
    assert!(app.messenger.pushes().is_empty());
}

#[tokio::test]
async fn test_validation_errors_are_joined() {
    let app = setup(test_config());
    let (status, body) = post_json(&app, "/api/checkin", json!({"latitude": "abc"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "缺少用戶ID, 缺少用戶名稱, 缺少位置信息, 經緯度格式不正確"
    );
}

#[tokio::test]
async fn test_failed_notification_keeps_the_record() {
    let app = setup(test_config());
    app.messenger.fail_push.store(true, Ordering::SeqCst);

    let (status, body) = post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "上班打卡成功（通知發送失敗）");
    assert_eq!(app.state.db.count_checkins(None).unwrap(), 1);
}

#[tokio::test]
async fn test_missing_group_id_reports_notification_failure() {
    let app = setup(AppConfig { group_id: None, ..test_config() });
    let (_, body) = post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;
    assert_eq!(body["message"], "上班打卡成功（通知發送失敗）");
}

fn webhook_request(secret: Option<&str>, body: &Value) -> Request<Body> {
    let raw = body.to_string();
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-line-signature", sign(secret, raw.as_bytes()).unwrap());
    }
    builder.body(Body::from(raw)).unwrap()
}

fn text_event(source: Value, text: &str) -> Value {
    json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": "r1",
            "timestamp": 1700000000000u64,
            "source": source,
            "message": {"type": "text", "id": "m1", "text": text}
        }]
    })
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = setup(AppConfig { channel_secret: Some("secret".into()), ..test_config() });
    let body = text_event(json!({"type": "user", "userId": "U1"}), "!上班打卡");

    let (status, _) = call(&app, webhook_request(Some("wrong"), &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, webhook_request(None, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.state.db.count_checkins(None).unwrap(), 0);
    assert!(app.messenger.replies().is_empty());
}

#[tokio::test]
async fn test_webhook_quick_checkin_command() {
    let app = setup(AppConfig { channel_secret: Some("secret".into()), ..test_config() });
    let body = text_event(json!({"type": "user", "userId": "U1"}), "!上班打卡");

    let (status, text) = call(&app, webhook_request(Some("secret"), &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, b"OK");

    let replies = app.messenger.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "r1");
    assert!(replies[0].1.starts_with("✅ 上班打卡成功"));

    let pushes = app.messenger.pushes();
    assert!(pushes[0].1.starts_with("✅ name-U1 已於 "));
    assert!(pushes[0].1.contains("📍 位置: 快速上班打卡\n📝 備註: 通過指令快速上班打卡"));

    // Bare `!打卡` now clocks out, then has nothing left to do.
    let body = text_event(json!({"type": "user", "userId": "U1"}), "!打卡");
    call(&app, webhook_request(Some("secret"), &body)).await;
    call(&app, webhook_request(Some("secret"), &body)).await;
    let replies = app.messenger.replies();
    assert!(replies[1].1.starts_with("✅ 下班打卡成功"));
    assert_eq!(replies[2].1, "❌ 今天已經下班打卡過了");
}

#[tokio::test]
async fn test_webhook_echoes_only_in_direct_chats() {
    let app = setup(test_config());

    let direct = text_event(json!({"type": "user", "userId": "U1"}), "hello");
    call(&app, webhook_request(None, &direct)).await;
    assert_eq!(app.messenger.replies()[0].1, "收到您的訊息：hello");

    let group = text_event(json!({"type": "group", "groupId": "G1", "userId": "U2"}), "大家好");
    call(&app, webhook_request(None, &group)).await;
    assert_eq!(app.messenger.replies().len(), 1);

    let stored = app.state.db.recent_group_messages(10).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_name, "name-U2");
    assert_eq!(stored[0].message, "大家好");
}

#[tokio::test]
async fn test_follow_event_registers_user() {
    let app = setup(test_config());
    let body = json!({"events": [{
        "type": "follow",
        "replyToken": "r9",
        "source": {"type": "user", "userId": "U7"}
    }]});
    let (status, _) = call(&app, webhook_request(None, &body)).await;
    assert_eq!(status, StatusCode::OK);

    let user = app.state.db.get_user("U7").unwrap().unwrap();
    assert_eq!(user.name, "name-U7");
    assert!(app.messenger.replies()[0].1.starts_with("👋 感謝您加入打卡系統"));
}

#[tokio::test]
async fn test_group_send_and_list() {
    let app = setup(test_config());
    let (status, body) = post_json(
        &app,
        "/api/group/send",
        json!({"userId": "U1", "userName": "小明", "message": "午餐吃什麼"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.messenger.pushes()[0], ("G1".to_string(), "💬 小明:\n午餐吃什麼".to_string()));

    let (status, body) = post_json(&app, "/api/group/send", json!({"userId": "U1", "userName": "小明"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = get_json(&app, "/api/group/messages?count=500").await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["userName"], "小明");
}

#[tokio::test]
async fn test_history_and_statistics() {
    let app = setup(test_config());
    post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;

    let (status, body) = get_json(&app, "/api/history?userId=U1&dateRange=30").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], "30");
    assert_eq!(body["hasMapRecords"], true);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    let (status, _) = get_json(&app, "/api/history?userId=U1&dateRange=forever").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(&app, "/api/statistics?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalDays"], 1);
    assert_eq!(body["incompleteDays"], 1);

    let (status, _) = get_json(&app, "/api/statistics?userId=U1&month=2024-13").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reminder_settings_roundtrip() {
    let app = setup(test_config());

    let (status, body) = get_json(&app, "/api/reminder/settings?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["morningTime"], "09:00");
    assert_eq!(body["settings"]["enabled"], true);

    let (status, body) = post_json(
        &app,
        "/api/reminder/settings",
        json!({"userId": "U1", "morningTime": "8:15", "weekendEnabled": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["morningTime"], "08:15");
    assert_eq!(body["settings"]["eveningTime"], "18:00");
    assert_eq!(body["settings"]["weekendEnabled"], true);

    let (status, _) =
        post_json(&app, "/api/reminder/settings", json!({"userId": "U1", "eveningTime": "26:00"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/api/reminder/settings").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reminder_test_endpoint() {
    let app = setup(test_config());
    let (status, body) =
        post_json(&app, "/api/reminder/test", json!({"userId": "U1", "name": "小明", "type": "evening"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let pushes = app.messenger.pushes();
    assert_eq!(pushes[0].0, "U1");
    assert!(pushes[0].1.starts_with("⏰ 測試 - 小明，下班時間到了"));

    let (status, _) =
        post_json(&app, "/api/reminder/test", json!({"userId": "U1", "type": "noon"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reminder_pass_sends_once_per_day() {
    let app = setup(test_config());
    app.state.db.upsert_user("U1", "小明").unwrap();
    app.state.db.reminder_setting("U1").unwrap();

    // Monday, inside the morning window, after the default 09:00.
    let now = NaiveDateTime::parse_from_str("2024-03-04 09:15:00", "%Y-%m-%d %H:%M:%S").unwrap();

    app.messenger.fail_push.store(true, Ordering::SeqCst);
    assert_eq!(send_due_reminders(&app.state, now).await.unwrap(), 0);

    app.messenger.fail_push.store(false, Ordering::SeqCst);
    assert_eq!(send_due_reminders(&app.state, now).await.unwrap(), 1);
    assert_eq!(send_due_reminders(&app.state, now).await.unwrap(), 0);

    let pushes = app.messenger.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "U1");
    assert!(pushes[0].1.starts_with("⏰ 小明，早安！"));

    // Outside both windows nothing is even considered.
    let noon = NaiveDateTime::parse_from_str("2024-03-05 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    assert_eq!(send_due_reminders(&app.state, noon).await.unwrap(), 0);
}

#[tokio::test]
async fn test_vocabulary_is_stable_for_the_day() {
    let app = setup(test_config());
    let (status, first) = get_json(&app, "/api/vocabulary/today?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["words"].as_array().unwrap().len(), 3);

    let (_, second) = get_json(&app, "/api/vocabulary/today?userId=U1").await;
    assert_eq!(first["words"], second["words"]);

    let (_, anonymous) = get_json(&app, "/api/vocabulary/today").await;
    assert_eq!(anonymous["words"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_export_csv() {
    let app = setup(test_config());

    let (status, body) = get_json(&app, "/export/checkin-records?userId=U1&format=csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;

    let req = Request::builder()
        .uri("/export/checkin-records?userId=U1&format=csv&dateRange=all")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"checkin_records_"));
    assert!(disposition.ends_with(".csv\""));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("小明"));
}

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let app = setup(test_config());

    let (status, body) = get_json(&app, "/api/admin/system-info?userId=U1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "權限不足");

    let (status, body) = get_json(&app, "/api/admin/system-info?userId=ADMIN").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checkinCount"], 0);

    let (status, body) =
        post_json(&app, "/api/admin/broadcast", json!({"userId": "ADMIN", "message": "明天放假"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.messenger.pushes()[0].1.starts_with("📢 系統公告\n明天放假"));

    let (status, body) = post_json(&app, "/api/admin/rich-menu", json!({"userId": "ADMIN"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.messenger.menus.lock().unwrap().as_slice(), &[6]);

    let (status, _) = post_json(&app, "/api/admin/rich-menu", json!({"userId": "U1"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oversized_date_range_is_rejected() {
    let app = setup(test_config());

    let (status, body) = get_json(&app, "/api/history?userId=U1&dateRange=4000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "無效的日期範圍: 4000000000");

    let (status, _) =
        get_json(&app, "/export/checkin-records?format=csv&dateRange=4000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_statistics_include_daily_records() {
    let app = setup(test_config());
    post_json(&app, "/api/checkin", checkin_body("U1", "上班")).await;

    let (_, body) = get_json(&app, "/api/statistics?userId=U1").await;
    let days = body["dailyRecords"].as_object().unwrap();
    assert_eq!(days.len(), 1);
    let times = days.values().next().unwrap();
    assert!(times["上班"].is_string());
    assert!(times["下班"].is_null());
}

#[tokio::test]
async fn test_concurrent_clock_ins_admit_one() {
    let app = setup(test_config());

    let (first, second) = tokio::join!(
        post_json(&app, "/api/checkin", checkin_body("U1", "上班")),
        post_json(&app, "/api/checkin", checkin_body("U1", "上班")),
    );

    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(app.state.db.count_checkins(None).unwrap(), 1);
}

#[tokio::test]
async fn test_empty_word_pool_uses_fallback_without_assigning() {
    let app = setup(test_config());
    app.state
        .db
        .with_conn(|conn| {
            conn.execute("DELETE FROM vocabulary", [])?;
            Ok(())
        })
        .unwrap();

    let (status, body) = get_json(&app, "/api/vocabulary/today?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    let english: Vec<&str> = body["words"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["english"].as_str().unwrap())
        .collect();
    assert_eq!(english, ["resilience", "endeavor", "persistence"]);

    let assigned: i64 = app
        .state
        .db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user_vocabulary", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(assigned, 0);
}
