//! Conversation threads and the per-user thread log.
//!
//! Threads are keyed by a caller-facing [`SessionId`] and an engine-generated
//! [`ConversationId`]. Messages are only ever appended; a thread is removed as a
//! whole or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::value_objects::{ConversationId, SessionId};
use crate::coaching::CoachingContext;

/// Marker appended to every list preview.
pub const PREVIEW_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    conversation_id: ConversationId,
    session_id: SessionId,
    messages: Vec<Message>,
    /// Snapshot taken when the thread was opened; never refreshed.
    context: CoachingContext,
    started_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

impl ConversationThread {
    fn open(session_id: SessionId, context: CoachingContext, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id: ConversationId::generate(),
            session_id,
            messages: Vec::new(),
            context,
            started_at: now,
            last_message_at: now,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn context(&self) -> &CoachingContext {
        &self.context
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_message_at(&self) -> DateTime<Utc> {
        self.last_message_at
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>, now: DateTime<Utc>) {
        self.messages.push(Message {
            role,
            content: content.into(),
            timestamp: now,
        });
        self.last_message_at = now;
    }

    /// First `preview_chars` characters of the last message plus [`PREVIEW_ELLIPSIS`].
    pub fn preview(&self, preview_chars: usize) -> Option<String> {
        self.messages.last().map(|message| {
            let mut preview: String = message.content.chars().take(preview_chars).collect();
            preview.push_str(PREVIEW_ELLIPSIS);
            preview
        })
    }

    pub fn summary(&self, preview_chars: usize) -> ConversationSummary {
        ConversationSummary {
            conversation_id: self.conversation_id.clone(),
            session_id: self.session_id.clone(),
            message_count: self.messages.len(),
            started_at: self.started_at,
            last_message_at: self.last_message_at,
            preview: self.preview(preview_chars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub message_count: usize,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub preview: Option<String>,
}

/// Listing options for [`Conversations::list`].
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub session_id: Option<SessionId>,
}

/// All conversation threads owned by one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversations(Vec<ConversationThread>);

impl Conversations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationThread> {
        self.0.iter()
    }

    /// Exact-match lookup by session key.
    pub fn find_by_session(&self, session_id: &SessionId) -> Option<&ConversationThread> {
        self.0.iter().find(|thread| &thread.session_id == session_id)
    }

    pub fn get(&self, conversation_id: &ConversationId) -> Option<&ConversationThread> {
        self.0
            .iter()
            .find(|thread| &thread.conversation_id == conversation_id)
    }

    /// Appends one user/assistant exchange to the thread for `session_id`.
    ///
    /// The thread is looked up by exact session match; when none exists a new one is
    /// opened with `context` as its snapshot. Returns the thread and whether it was opened.
    pub fn record_exchange(
        &mut self,
        session_id: &SessionId,
        context: CoachingContext,
        user_turn: (String, DateTime<Utc>),
        assistant_turn: (String, DateTime<Utc>),
    ) -> (&ConversationThread, bool) {
        let (index, opened) = match self
            .0
            .iter()
            .position(|thread| &thread.session_id == session_id)
        {
            Some(index) => (index, false),
            None => {
                self.0
                    .push(ConversationThread::open(session_id.clone(), context, user_turn.1));
                (self.0.len() - 1, true)
            }
        };

        let thread = &mut self.0[index];
        thread.append_turn(Role::User, user_turn.0, user_turn.1);
        thread.append_turn(Role::Assistant, assistant_turn.0, assistant_turn.1);
        (&self.0[index], opened)
    }

    /// Removes the thread with `conversation_id`. Returns whether one was removed.
    pub fn remove(&mut self, conversation_id: &ConversationId) -> bool {
        let before = self.0.len();
        self.0
            .retain(|thread| &thread.conversation_id != conversation_id);
        self.0.len() != before
    }

    /// Most recent first, optionally restricted to one session, at most `limit` entries.
    pub fn list(
        &self,
        filter: &ConversationFilter,
        limit: usize,
        preview_chars: usize,
    ) -> Vec<ConversationSummary> {
        let mut threads: Vec<&ConversationThread> = self
            .0
            .iter()
            .filter(|thread| {
                filter
                    .session_id
                    .as_ref()
                    .is_none_or(|session_id| &thread.session_id == session_id)
            })
            .collect();
        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        threads
            .into_iter()
            .take(limit)
            .map(|thread| thread.summary(preview_chars))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::{CoachingContext, ProfileContext};
    use crate::domain::user::SubscriptionTier;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    fn context() -> CoachingContext {
        CoachingContext::Bare {
            profile: ProfileContext {
                screen_name: "river".into(),
                subscription_tier: SubscriptionTier::Premium,
                total_journeys: 0,
                completed_journeys: 0,
                completed_resources: 0,
                current_streak: 0,
            },
        }
    }

    fn session(id: &str) -> SessionId {
        SessionId::new(id).unwrap()
    }

    fn open<'a>(log: &'a mut Conversations, id: &str) -> &'a mut ConversationThread {
        log.0.push(ConversationThread::open(session(id), context(), t0()));
        log.0.last_mut().unwrap()
    }

    #[test]
    fn test_append_updates_last_message_at() {
        let mut log = Conversations::default();
        let thread = open(&mut log, "s1");
        assert_eq!(thread.last_message_at(), t0());
        thread.append_turn(Role::User, "hello", t0() + Duration::minutes(1));
        thread.append_turn(Role::Assistant, "hi", t0() + Duration::minutes(2));
        assert_eq!(thread.messages().len(), 2);
        assert_eq!(thread.last_message_at(), t0() + Duration::minutes(2));
        assert_eq!(thread.messages()[0].role, Role::User);
    }

    #[test]
    fn test_lookup_is_exact_match_on_session() {
        let mut log = Conversations::default();
        open(&mut log, "abc");
        assert!(log.find_by_session(&session("abc")).is_some());
        assert!(log.find_by_session(&session("ab")).is_none());
        assert!(log.find_by_session(&session("ABC")).is_none());
    }

    #[test]
    fn test_list_orders_filters_and_caps() {
        let mut log = Conversations::default();
        for i in 0..60 {
            let thread = open(&mut log, &format!("s{i}"));
            thread.append_turn(Role::User, format!("m{i}"), t0() + Duration::minutes(i));
        }

        let all = log.list(&ConversationFilter::default(), 50, 100);
        assert_eq!(all.len(), 50);
        assert_eq!(all[0].session_id, session("s59"));
        assert!(
            all.windows(2)
                .all(|pair| pair[0].last_message_at >= pair[1].last_message_at)
        );

        let one = log.list(
            &ConversationFilter {
                session_id: Some(session("s3")),
            },
            50,
            100,
        );
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].preview.as_deref(), Some("m3..."));
    }

    #[test]
    fn test_preview_truncates_by_characters() {
        let mut log = Conversations::default();
        let thread = open(&mut log, "s");
        thread.append_turn(Role::Assistant, "é".repeat(150), t0());
        let preview = thread.preview(100).unwrap();
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with(PREVIEW_ELLIPSIS));
    }

    #[test]
    fn test_record_exchange_opens_once_per_session() {
        let mut log = Conversations::default();
        let later = t0() + Duration::seconds(5);
        let (thread, opened) = log.record_exchange(
            &session("s1"),
            context(),
            ("hi".into(), t0()),
            ("hello".into(), later),
        );
        assert!(opened);
        assert_eq!(thread.messages().len(), 2);
        assert_eq!(thread.started_at(), t0());
        assert_eq!(thread.last_message_at(), later);

        let (thread, opened) = log.record_exchange(
            &session("s1"),
            context(),
            ("again".into(), later),
            ("sure".into(), later),
        );
        assert!(!opened);
        assert_eq!(thread.messages().len(), 4);
        assert_eq!(thread.messages()[2].content, "again");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_remove_is_noop_for_unknown_id() {
        let mut log = Conversations::default();
        let id = open(&mut log, "s").conversation_id().clone();
        assert!(!log.remove(&ConversationId::parse("conv_missing").unwrap()));
        assert_eq!(log.len(), 1);
        assert!(log.remove(&id));
        assert!(log.is_empty());
    }
}
