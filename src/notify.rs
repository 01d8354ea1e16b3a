//! Notification fallback dispatcher.
//!
//! Resolves device push tokens for a set of users and hands delivery to the
//! notification collaborator. One recipient's failure never blocks another:
//! sends run in parallel and each error is logged on its own. Call wake-ups
//! await the whole batch; ordinary message/mention pushes are fire-and-forget
//! via [`dispatch_background`].

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::clients::{Collaborators, PushNotification};

/// Resolve tokens and dispatch in parallel. Returns the number of
/// notifications handed to the delivery collaborator successfully.
pub async fn dispatch(
    collab: &Collaborators,
    user_ids: &[String],
    notification: &PushNotification,
) -> usize {
    if user_ids.is_empty() {
        return 0;
    }

    let profiles = match collab.users.fetch_users(user_ids).await {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!(error = %e, "push token resolution failed");
            return 0;
        }
    };

    let sends = profiles.iter().flat_map(|profile| {
        profile.device_tokens.iter().map(move |token| {
            let user_id = profile.id.clone();
            async move {
                match collab.push.send(token, notification).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "push dispatch failed");
                        false
                    }
                }
            }
        })
    });

    let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
    debug!(
        kind = ?notification.kind,
        recipients = user_ids.len(),
        delivered,
        "push batch dispatched"
    );
    delivered
}

/// Fire-and-forget variant for ordinary messages and mentions.
pub fn dispatch_background(
    collab: Collaborators,
    user_ids: Vec<String>,
    notification: PushNotification,
) {
    if user_ids.is_empty() {
        return;
    }
    tokio::spawn(async move {
        dispatch(&collab, &user_ids, &notification).await;
    });
}
