use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use shared::protocol::{PlayerCommand, TimelineEvent};

/// A camera frame captured for a photo task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Where the capture was uploaded, when an upload step ran.
    pub url: Option<String>,
}

impl CapturedPhoto {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Renders the raw capture as a `data:` URL for local preview.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.bytes))
    }

    fn submitted_url(&self) -> String {
        self.url.clone().unwrap_or_default()
    }
}

/// What the player is supplying in response to the event at the cursor.
/// Replaced wholesale on every progression step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerIntent {
    PickOption { index: usize },
    StartPhotoTask,
    SubmitPhoto { photo: CapturedPhoto },
}

/// Outcome of one progression step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progression {
    pub advanced: bool,
    pub command: Option<PlayerCommand>,
}

/// Client-local cursor over the server-ordered event log.
///
/// The index ranges over `-1..=events.len()`; `-1` means the story has not
/// started. Events at or before the cursor are visible. The server's log is
/// append-only from the client's point of view, so the cursor only ever
/// needs re-validation when a snapshot is replaced.
#[derive(Debug)]
pub struct TimelineController {
    index: isize,
    intent: Option<PlayerIntent>,
}

impl TimelineController {
    pub fn new() -> Self {
        Self {
            index: -1,
            intent: None,
        }
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn intent(&self) -> Option<&PlayerIntent> {
        self.intent.as_ref()
    }

    /// Re-validates the cursor against a fresh snapshot and steps past at
    /// most one event the player never interacts with.
    pub fn sync(&mut self, events: &[TimelineEvent]) {
        let unknown = events
            .iter()
            .filter(|event| matches!(event, TimelineEvent::Unknown))
            .count();
        if unknown > 0 {
            warn!(count = unknown, "snapshot contains unrecognized event kinds");
        }

        if events.is_empty() {
            self.index = -1;
            return;
        }
        self.index = self.index.min(events.len() as isize);
        if let Some(current) = self.current(events) {
            if advances_without_player(current) {
                self.index = (self.index + 1).min(events.len() as isize);
            }
        }
    }

    /// Applies one player step from `from` with `intent`.
    ///
    /// Photo tasks hold the cursor until a photo submission arrives and
    /// dialogue options hold it until an option is picked; everything else
    /// advances. A photo submission landing on a photo task additionally
    /// yields the command to forward.
    pub fn progress(
        &mut self,
        events: &[TimelineEvent],
        from: Option<&TimelineEvent>,
        intent: Option<PlayerIntent>,
    ) -> Progression {
        self.intent = intent;

        if self.blocked(from) {
            return Progression {
                advanced: false,
                command: None,
            };
        }

        let command = match (from, &self.intent) {
            (
                Some(TimelineEvent::PlayerPhotoTask { .. }),
                Some(PlayerIntent::SubmitPhoto { photo }),
            ) => Some(PlayerCommand::SubmitPhoto {
                photo_url: photo.submitted_url(),
            }),
            _ => None,
        };

        let cap = self.visible(events).len() as isize;
        let next = (self.index + 1).min(cap);
        let advanced = next > self.index;
        self.index = next;

        Progression { advanced, command }
    }

    /// Returns the cursor to the not-started state.
    pub fn reset(&mut self) {
        self.index = -1;
        self.intent = None;
    }

    /// The prefix of the log the player has reached.
    pub fn visible<'a>(&self, events: &'a [TimelineEvent]) -> &'a [TimelineEvent] {
        if self.index < 0 {
            return &[];
        }
        let end = ((self.index + 1) as usize).min(events.len());
        &events[..end]
    }

    /// The event at the cursor, if the cursor sits on one.
    pub fn current<'a>(&self, events: &'a [TimelineEvent]) -> Option<&'a TimelineEvent> {
        if self.index < 0 {
            return None;
        }
        events.get(self.index as usize)
    }

    fn blocked(&self, from: Option<&TimelineEvent>) -> bool {
        match from {
            Some(TimelineEvent::PlayerPhotoTask { .. }) => {
                !matches!(self.intent, Some(PlayerIntent::SubmitPhoto { .. }))
            }
            Some(TimelineEvent::PlayerDialogueOptions { .. }) => {
                !matches!(self.intent, Some(PlayerIntent::PickOption { .. }))
            }
            _ => false,
        }
    }
}

impl Default for TimelineController {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinds the server paces on its own; the player never clicks through them.
fn advances_without_player(event: &TimelineEvent) -> bool {
    matches!(
        event,
        TimelineEvent::SubmitPhoto { .. }
            | TimelineEvent::NewStoryAct { .. }
            | TimelineEvent::WritingNewStoryAct
    )
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
