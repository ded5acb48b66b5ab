use std::fmt;

use serde::{Deserialize, Serialize};

// ===== Input Models (owned by the folder/store collaborator) =====

/// Per-message flags the display layer cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlags {
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// Already-extracted metadata for one message of a folder.
///
/// The threading engine only reads summaries. `uid` is the opaque identity used for row
/// mapping; `message_id` is the Message-ID-like key other messages reference and may be
/// absent. `references` is ordered oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub uid: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub subject: String,
    pub order: u64,
    #[serde(default)]
    pub flags: MessageFlags,
}

impl MessageSummary {
    pub fn new(uid: impl Into<String>, order: u64) -> Self {
        MessageSummary {
            uid: uid.into(),
            message_id: None,
            references: Vec::new(),
            subject: String::new(),
            order,
            flags: MessageFlags::default(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The message key, if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Messages added to and removed from a folder since the last display update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderChanges {
    #[serde(default)]
    pub added: Vec<MessageSummary>,
    /// Uids of removed messages
    #[serde(default)]
    pub removed: Vec<String>,
}

impl FolderChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

// ===== Identity Models =====

/// Identity of a node in a logical or displayed forest.
///
/// Two nodes are "equal" for reconciliation purposes exactly when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeKey {
    /// A real message, keyed by its summary uid.
    Message(String),
    /// A placeholder for a referenced but unseen message that groups several replies.
    Placeholder(String),
    /// A synthetic group created from a shared normalized subject.
    Subject(String),
}

impl NodeKey {
    /// Identity string used for persisted collapse markers.
    pub fn save_id(&self) -> &str {
        match self {
            NodeKey::Message(id) | NodeKey::Placeholder(id) | NodeKey::Subject(id) => id,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, NodeKey::Message(_))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Message(id) => write!(f, "message:{id}"),
            NodeKey::Placeholder(id) => write!(f, "placeholder:{id}"),
            NodeKey::Subject(id) => write!(f, "subject:{id}"),
        }
    }
}
