use serde::{Deserialize, Serialize};

use crate::domain::{ActId, CharacterId, SessionKey};

/// One entry in the server-ordered story log.
///
/// The server appends; clients never reorder or rewrite. Kinds this build
/// does not know decode to [`TimelineEvent::Unknown`] so newer servers keep
/// working against older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimelineEvent {
    CharacterDialogue {
        character_id: CharacterId,
        messages: Vec<String>,
    },
    PlayerPhotoTask {
        requirements: Vec<String>,
    },
    PlayerDialogueOptions {
        options: Vec<String>,
    },
    NewStoryAct {
        story_act_id: ActId,
    },
    WritingNewStoryAct,
    ShowStoryPrologue {
        lines: Vec<String>,
    },
    ShowVideo {
        video_url: String,
    },
    SubmitPhoto {
        photo_url: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub profile_photo_url: String,
}

/// Full session snapshot as returned by the session query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_key: SessionKey,
    pub title: String,
    pub characters: Vec<Character>,
    pub events: Vec<TimelineEvent>,
}

impl GameSession {
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|character| character.id == id)
    }
}

/// Server-to-client frames on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    /// The session snapshot changed; refetch it.
    Updated,
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// Client-to-server frames on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlayerCommand {
    Start,
    SubmitPhoto { photo_url: String },
}
