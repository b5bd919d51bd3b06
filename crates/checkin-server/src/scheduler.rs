use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use checkin_api::AppState;
use checkin_api::reminders::send_due_reminders;

/// Minutes between reminder passes.
const PASS_EVERY_MINUTES: u32 = 15;

/// Start of the quarter-hour slot `now` falls on, if it falls on one.
fn quarter_slot(now: NaiveDateTime) -> Option<NaiveDateTime> {
    if now.minute() % PASS_EVERY_MINUTES != 0 {
        return None;
    }
    now.with_second(0).and_then(|t| t.with_nanosecond(0))
}

/// Background task that pushes clock-in/clock-out reminders.
///
/// Wakes once a minute and runs a pass on every quarter hour of local time.
/// A slot runs at most once even if the timer fires twice inside it.
pub async fn run_reminder_loop(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let mut last_slot: Option<NaiveDateTime> = None;

    loop {
        interval.tick().await;

        let now = state.config.now();
        let Some(slot) = quarter_slot(now) else {
            continue;
        };
        if last_slot == Some(slot) {
            continue;
        }
        last_slot = Some(slot);

        match send_due_reminders(&state, now).await {
            Ok(0) => debug!("Reminder pass at {}: nothing due", slot),
            Ok(count) => info!("Reminder pass at {}: sent {} reminders", slot, count),
            Err(e) => warn!("Reminder pass at {} failed: {:#}", slot, e),
        }
    }
}
