//! Identity resolution: which user's memory a turn works against.

use questweaver_core::identity::{UserGuid, is_guid};
use questweaver_core::message::{ConversationTurn, Role};
use regex_lite::Regex;
use std::sync::LazyLock;

static LABELLED_GUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^guid[:=\s]+([0-9a-f-]{36})$")
        .unwrap_or_else(|e| panic!("labelled GUID pattern must compile: {e}"))
});

/// Extract an identity from a message that consists only of a GUID, either
/// bare or labelled (`guid: <id>`, `GUID=<id>`).
pub fn extract_user_guid(text: &str) -> Option<UserGuid> {
    let text = text.trim();
    if is_guid(text) {
        return UserGuid::parse(text);
    }
    LABELLED_GUID_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| UserGuid::parse(m.as_str()))
}

/// Is this turn an out-of-band identity signal rather than an utterance?
pub fn identity_signal(turn: &ConversationTurn) -> Option<UserGuid> {
    let content = turn.content.trim();
    if turn.role == Role::User && is_guid(content) {
        UserGuid::parse(content)
    } else {
        None
    }
}

/// Identity carried by the first history entry, if it is a signal.
pub fn guid_from_history(history: &[ConversationTurn]) -> Option<UserGuid> {
    history.first().and_then(identity_signal)
}

/// Everything a turn knows about who is speaking.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentitySources<'a> {
    pub history: Option<&'a UserGuid>,
    pub explicit: Option<&'a str>,
    pub utterance: &'a str,
    pub active: Option<&'a UserGuid>,
}

/// Pick the identity for this turn. First match wins: history signal,
/// explicit request field, utterance, the session's active identity, and
/// finally the fallback identity.
pub fn resolve(sources: IdentitySources<'_>) -> UserGuid {
    if let Some(guid) = sources.history {
        return guid.clone();
    }
    if let Some(guid) = sources.explicit.and_then(UserGuid::parse) {
        return guid;
    }
    if let Some(guid) = extract_user_guid(sources.utterance) {
        return guid;
    }
    sources.active.cloned().unwrap_or_else(UserGuid::fallback)
}
