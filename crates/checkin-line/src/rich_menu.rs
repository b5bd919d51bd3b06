use serde::Serialize;

pub const MENU_WIDTH: u32 = 2500;
pub const MENU_HEIGHT: u32 = 1686;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMenu {
    pub size: Size,
    pub selected: bool,
    pub name: String,
    pub chat_bar_text: String,
    pub areas: Vec<RichMenuArea>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RichMenuArea {
    pub bounds: Bounds,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Uri { uri: String },
    Message { text: String },
}

/// The check-in menu: two large LIFF tiles on top (check-in page, group
/// chat page), four small tiles below (report, help, quick check-in,
/// reminder settings).
pub fn checkin_menu(liff_id: &str, group_liff_id: &str, app_url: &str) -> RichMenu {
    let half_w = MENU_WIDTH / 2;
    let quarter_w = MENU_WIDTH / 4;
    let half_h = MENU_HEIGHT / 2;

    let area = |x, y, width, action| RichMenuArea {
        bounds: Bounds { x, y, width, height: half_h },
        action,
    };
    let uri = |uri: String| Action::Uri { uri };
    let text = |t: &str| Action::Message { text: t.to_string() };

    RichMenu {
        size: Size { width: MENU_WIDTH, height: MENU_HEIGHT },
        selected: true,
        name: "打卡系統選單".to_string(),
        chat_bar_text: "打開選單".to_string(),
        areas: vec![
            area(0, 0, half_w, uri(format!("https://liff.line.me/{liff_id}"))),
            area(half_w, 0, half_w, uri(format!("https://liff.line.me/{group_liff_id}"))),
            area(0, half_h, quarter_w, text("!打卡報表")),
            area(quarter_w, half_h, quarter_w, text("!幫助")),
            area(half_w, half_h, quarter_w, text("!打卡")),
            area(
                half_w + quarter_w,
                half_h,
                quarter_w,
                uri(format!("{}/reminder-settings", app_url.trim_end_matches('/'))),
            ),
        ],
    }
}
