use std::time::Duration;

use shared::protocol::TimelineEvent;

use crate::timeline::PlayerIntent;

/// How long a prologue stays up before advancing on its own.
pub const PROLOGUE_DWELL: Duration = Duration::from_secs(12);

/// A full-screen mode that supersedes the inline timeline view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    PhotoCapture,
    Prologue,
    Video,
}

/// Decides which overlay, if any, to show for the event at the cursor.
///
/// First match wins: the camera opens only once the player explicitly
/// starts the photo task; prologue and video show regardless of intent.
pub fn select_overlay(
    current: Option<&TimelineEvent>,
    intent: Option<&PlayerIntent>,
) -> Option<Overlay> {
    match (current, intent) {
        (Some(TimelineEvent::PlayerPhotoTask { .. }), Some(PlayerIntent::StartPhotoTask)) => {
            Some(Overlay::PhotoCapture)
        }
        (Some(TimelineEvent::ShowStoryPrologue { .. }), _) => Some(Overlay::Prologue),
        (Some(TimelineEvent::ShowVideo { .. }), _) => Some(Overlay::Video),
        _ => None,
    }
}
