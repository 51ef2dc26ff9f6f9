use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use shared::{
    domain::{CharacterId, SessionKey},
    protocol::{Character, GameSession, PlayerCommand, PushEvent, TimelineEvent},
};

pub mod overlay;
pub mod source;
pub mod timeline;
pub mod transport;

pub use overlay::{select_overlay, Overlay, PROLOGUE_DWELL};
pub use source::{HttpDataSource, QueryError, SessionDataSource};
pub use timeline::{CapturedPhoto, PlayerIntent, Progression, TimelineController};
pub use transport::{Connection, PushHandler, TransportError};

/// Severity of a transient, user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Info,
    Warn,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub variant: NoticeVariant,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            variant: NoticeVariant::Info,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            variant: NoticeVariant::Warn,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            variant: NoticeVariant::Error,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            variant: NoticeVariant::Success,
            text: text.into(),
        }
    }
}

/// Everything the presentation layer needs to render one frame.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub title: String,
    pub characters: Vec<Character>,
    pub started: bool,
    pub visible: Vec<TimelineEvent>,
    pub current: Option<TimelineEvent>,
    pub overlay: Option<Overlay>,
}

impl SessionView {
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|character| character.id == id)
    }
}

/// What the client broadcasts to subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The render state changed.
    Snapshot(SessionView),
    Notice(Notice),
}

struct SessionState {
    session: GameSession,
    controller: TimelineController,
}

/// Engine for one live story session.
///
/// Owns the session snapshot, the timeline cursor, and the push channel.
/// An `updated` push triggers exactly one refetch followed by a cursor
/// re-sync; an `error` push becomes exactly one error notice carrying the
/// server's text. All state changes fan out as [`SessionEvent`]s.
pub struct SessionClient {
    source: Arc<dyn SessionDataSource>,
    key: SessionKey,
    connection: Mutex<Option<Connection>>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    /// Connects with the default HTTP data source.
    pub async fn connect(server_url: &str, key: SessionKey) -> anyhow::Result<Arc<Self>> {
        let source = Arc::new(HttpDataSource::new(server_url));
        Self::connect_with_source(source, server_url, key).await
    }

    /// Fetches the initial snapshot, then opens the push channel.
    pub async fn connect_with_source(
        source: Arc<dyn SessionDataSource>,
        server_url: &str,
        key: SessionKey,
    ) -> anyhow::Result<Arc<Self>> {
        let session = source
            .fetch_session(&key)
            .await
            .with_context(|| format!("failed to load session {key}"))?;
        let mut controller = TimelineController::new();
        controller.sync(&session.events);

        let (events, _) = broadcast::channel(1024);
        let client = Arc::new(Self {
            source,
            key: key.clone(),
            connection: Mutex::new(None),
            state: Mutex::new(SessionState {
                session,
                controller,
            }),
            events,
        });

        let handler: Arc<dyn PushHandler> = client.clone();
        let connection = Connection::open(server_url, &key, handler)
            .await
            .context("failed to open push channel")?;
        *client.connection.lock().await = Some(connection);

        Ok(client)
    }

    /// Subscribe to render-state changes and notices.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current render state.
    pub async fn view(&self) -> SessionView {
        let guard = self.state.lock().await;
        build_view(&guard)
    }

    /// Asks the server to begin writing the story.
    pub async fn start(&self) -> Result<(), TransportError> {
        self.forward(PlayerCommand::Start).await
    }

    /// Applies one player step and forwards any command it produces.
    pub async fn progress(
        &self,
        intent: Option<PlayerIntent>,
    ) -> Result<SessionView, TransportError> {
        let (view, command) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let from = state.controller.current(&state.session.events).cloned();
            let outcome = state
                .controller
                .progress(&state.session.events, from.as_ref(), intent);
            (build_view(state), outcome.command)
        };
        if let Some(command) = command {
            self.forward(command).await?;
        }
        let _ = self.events.send(SessionEvent::Snapshot(view.clone()));
        Ok(view)
    }

    /// Wipes all server-side progress and reloads from scratch.
    pub async fn reset(&self) -> Result<SessionView, QueryError> {
        self.source.reset_session(&self.key).await?;
        let session = self.source.fetch_session(&self.key).await?;
        let view = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.session = session;
            state.controller.reset();
            state.controller.sync(&state.session.events);
            build_view(state)
        };
        let _ = self.events.send(SessionEvent::Snapshot(view.clone()));
        Ok(view)
    }

    /// Closes the push channel. Local views keep working afterwards.
    pub async fn close(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.close().await;
        }
    }

    async fn forward(&self, command: PlayerCommand) -> Result<(), TransportError> {
        let connection = self.connection.lock().await;
        match connection.as_ref() {
            Some(connection) => connection.send(&command).await,
            None => Err(TransportError::Closed),
        }
    }

    async fn refresh(&self) -> Result<(), QueryError> {
        let session = self.source.fetch_session(&self.key).await?;
        let view = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.session = session;
            state.controller.sync(&state.session.events);
            build_view(state)
        };
        let _ = self.events.send(SessionEvent::Snapshot(view));
        Ok(())
    }
}

#[async_trait]
impl PushHandler for SessionClient {
    async fn on_push(&self, event: PushEvent) {
        match event {
            PushEvent::Updated => {
                if let Err(err) = self.refresh().await {
                    warn!(key = %self.key, %err, "refetch after update push failed");
                    let _ = self.events.send(SessionEvent::Notice(Notice::error(format!(
                        "failed to refresh session: {err}"
                    ))));
                }
            }
            PushEvent::Error { message } => {
                let _ = self
                    .events
                    .send(SessionEvent::Notice(Notice::error(message)));
            }
            PushEvent::Unknown => {
                warn!(key = %self.key, "ignoring unrecognized push event");
            }
        }
    }

    async fn on_transport_error(&self, message: String) {
        let _ = self.events.send(SessionEvent::Notice(Notice::error(format!(
            "push channel lost: {message}"
        ))));
    }
}

fn build_view(state: &SessionState) -> SessionView {
    let events = &state.session.events;
    let controller = &state.controller;
    SessionView {
        title: state.session.title.clone(),
        characters: state.session.characters.clone(),
        started: !events.is_empty(),
        visible: controller.visible(events).to_vec(),
        current: controller.current(events).cloned(),
        overlay: select_overlay(controller.current(events), controller.intent()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
