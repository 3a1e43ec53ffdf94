//! Outward response shapes.
//!
//! Transport-neutral; the HTTP adapter renders these into the platform's
//! skill envelope.

/// Most quick-reply chips a text reply may carry.
pub const MAX_QUICK_REPLIES: usize = 10;

/// Most buttons a result card may carry.
pub const MAX_CARD_BUTTONS: usize = 3;

/// What the bot answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Immediate text with optional suggestion chips.
    Text {
        text: String,
        quick_replies: Vec<String>,
    },
    /// "Will call back" acknowledgment; the real answer follows on the
    /// callback channel.
    Deferred { text: String },
    /// Rich result card.
    Card {
        description: String,
        thumbnail_url: String,
        buttons: Vec<String>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            quick_replies: Vec::new(),
        }
    }

    /// Text reply with chips; extra chips beyond the platform limit are dropped.
    pub fn text_with_replies<I, S>(text: impl Into<String>, quick_replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Text {
            text: text.into(),
            quick_replies: quick_replies
                .into_iter()
                .take(MAX_QUICK_REPLIES)
                .map(Into::into)
                .collect(),
        }
    }

    pub fn deferred(text: impl Into<String>) -> Self {
        Reply::Deferred { text: text.into() }
    }

    pub fn card<I, S>(description: impl Into<String>, thumbnail_url: impl Into<String>, buttons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Card {
            description: description.into(),
            thumbnail_url: thumbnail_url.into(),
            buttons: buttons
                .into_iter()
                .take(MAX_CARD_BUTTONS)
                .map(Into::into)
                .collect(),
        }
    }

    /// Main text, whichever shape this is.
    pub fn body(&self) -> &str {
        match self {
            Reply::Text { text, .. } | Reply::Deferred { text } => text,
            Reply::Card { description, .. } => description,
        }
    }
}
