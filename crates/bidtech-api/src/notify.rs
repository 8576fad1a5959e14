//! Notification fan-out.
//!
//! A notification is always written to the ledger first. Lifecycle handlers
//! write their rows inside the same transaction as the change they describe
//! and push them only after commit; the push itself is best-effort and never
//! fails the request.

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use bidtech_db::{Connection, queries};
use bidtech_gateway::Dispatcher;
use bidtech_types::events::GatewayEvent;
use bidtech_types::models::{Notification, NotificationKind};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

/// Persist one notification row on `conn` (usually an open transaction).
/// The returned value is exactly what a later read of the row yields.
pub fn record(
    conn: &Connection,
    recipient: Uuid,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    related_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> anyhow::Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: recipient,
        title: title.into(),
        message: message.into(),
        kind,
        is_read: false,
        related_id,
        created_at: now.trunc_subsecs(6),
    };
    queries::notifications::insert(conn, &notification)?;
    Ok(notification)
}

/// Push already-persisted notifications to their recipients' live sessions.
pub async fn push_all(dispatcher: &Dispatcher, notifications: Vec<Notification>) {
    for notification in notifications {
        let recipient = notification.user_id;
        let delivered = dispatcher
            .send_to_user(recipient, GatewayEvent::Notification(notification))
            .await;
        debug!("Pushed notification to {} live session(s) of {}", delivered, recipient);
    }
}

/// Standalone fan-out: persist, then push. Used where no lifecycle
/// transaction is open.
pub async fn notify(
    state: &AppState,
    recipient: Uuid,
    kind: NotificationKind,
    title: String,
    message: String,
    related_id: Option<Uuid>,
) -> Result<Notification, ApiError> {
    let db_state = state.clone();
    let notification = run_blocking(move || {
        let now = Utc::now();
        Ok(db_state
            .db
            .with_conn_mut(|c| record(c, recipient, kind, title, message, related_id, now))?)
    })
    .await?;

    push_all(&state.dispatcher, vec![notification.clone()]).await;
    Ok(notification)
}

/// Like [`notify`], for side effects that must not affect the caller.
pub async fn notify_best_effort(
    state: &AppState,
    recipient: Uuid,
    kind: NotificationKind,
    title: String,
    message: String,
    related_id: Option<Uuid>,
) {
    if let Err(e) = notify(state, recipient, kind, title, message, related_id).await {
        warn!("Failed to deliver {} notification to {}: {}", kind, recipient, e);
    }
}

/// "LKR 240,000" / "LKR 1,234.50".
pub fn format_lkr(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let (whole, frac) = (cents.abs() / 100, cents.abs() % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if cents < 0 { "-" } else { "" };
    if frac == 0 {
        format!("LKR {sign}{grouped}")
    } else {
        format!("LKR {sign}{grouped}.{frac:02}")
    }
}
