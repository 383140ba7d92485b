use tokio_util::sync::CancellationToken;

use crate::core::ledger::{TokenLedger, UsageAccumulator};
use crate::core::message::ChatMessage;
use crate::core::providers::SessionHandle;

/// Book-keeping for the turn currently in flight.
#[derive(Debug)]
pub(crate) struct ActiveTurn {
    pub(crate) turn_id: u64,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) user_message_id: String,
    pub(crate) model_message_id: Option<String>,
    pub(crate) usage: UsageAccumulator,
}

/// One independent conversation (text or pdf).
///
/// The ledger stays `None` until a session exists and is zeroed every time a
/// new session is attached.
#[derive(Debug, Default)]
pub struct ChatContext {
    session: Option<SessionHandle>,
    messages: Vec<ChatMessage>,
    loading: bool,
    error: Option<String>,
    ledger: Option<TokenLedger>,
    turn: Option<ActiveTurn>,
}

impl ChatContext {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn ledger(&self) -> Option<&TokenLedger> {
        self.ledger.as_ref()
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Cancellation is only offered while a turn is loading.
    pub fn can_cancel(&self) -> bool {
        self.loading && self.turn.is_some()
    }

    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role.is_user()).count()
    }

    pub(crate) fn is_current_turn(&self, turn_id: u64) -> bool {
        self.turn.as_ref().is_some_and(|turn| turn.turn_id == turn_id)
    }

    pub(crate) fn turn(&self) -> Option<&ActiveTurn> {
        self.turn.as_ref()
    }

    pub(crate) fn turn_mut(&mut self) -> Option<&mut ActiveTurn> {
        self.turn.as_mut()
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    /// Back to the empty state. Any in-flight turn is cancelled first.
    pub fn reset(&mut self) {
        if let Some(turn) = self.turn.take() {
            turn.cancel_token.cancel();
        }
        *self = ChatContext::default();
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub(crate) fn remove(&mut self, id: &str) {
        self.messages.retain(|m| m.id != id);
    }

    pub(crate) fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Starts a turn, cancelling and annotating any previous one, and returns
    /// the fresh cancellation token.
    pub(crate) fn begin_turn(&mut self, turn_id: u64, user_message_id: String) -> CancellationToken {
        self.cancel_turn();
        let cancel_token = CancellationToken::new();
        self.turn = Some(ActiveTurn {
            turn_id,
            cancel_token: cancel_token.clone(),
            user_message_id,
            model_message_id: None,
            usage: UsageAccumulator::default(),
        });
        self.loading = true;
        self.error = None;
        cancel_token
    }

    /// Fires the active token and tags the placeholder (or the user message
    /// when nothing has streamed yet) as cancelled. No-op when idle.
    pub(crate) fn cancel_turn(&mut self) -> bool {
        let Some(turn) = self.finish_turn() else {
            return false;
        };
        turn.cancel_token.cancel();
        let target = turn
            .model_message_id
            .clone()
            .unwrap_or_else(|| turn.user_message_id.clone());
        if let Some(message) = self.message_mut(&target) {
            message.mark_cancelled();
        }
        true
    }

    /// Clears the loading flag and the cancellation handle.
    pub(crate) fn finish_turn(&mut self) -> Option<ActiveTurn> {
        self.loading = false;
        self.turn.take()
    }

    pub(crate) fn attach_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
        self.ledger.get_or_insert_with(TokenLedger::default).reset();
    }

    /// Forgets the session, and with it the credential it was created with.
    /// The next turn starts a new session.
    pub(crate) fn detach_session(&mut self) {
        self.session = None;
        self.ledger = None;
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut TokenLedger {
        self.ledger.get_or_insert_with(TokenLedger::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_turn_cancels_previous_token() {
        let mut context = ChatContext::default();
        let first_user = ChatMessage::user("one");
        let first_id = first_user.id.clone();
        context.push(first_user);
        let first = context.begin_turn(1, first_id.clone());

        let second_user = ChatMessage::user("two");
        let second_id = second_user.id.clone();
        context.push(second_user);
        let second = context.begin_turn(2, second_id);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(context.is_current_turn(2));
        assert!(!context.is_current_turn(1));
        assert!(context.messages()[0].is_cancelled());
    }

    #[test]
    fn finish_turn_clears_loading_and_handle() {
        let mut context = ChatContext::default();
        context.begin_turn(7, "user-1".into());
        assert!(context.can_cancel());

        let turn = context.finish_turn().expect("turn");
        assert_eq!(turn.turn_id, 7);
        assert!(!context.is_loading());
        assert!(!context.can_cancel());
        assert!(!context.cancel_turn());
    }

    #[test]
    fn attaching_a_session_zeroes_the_ledger() {
        let mut context = ChatContext::default();
        assert!(context.ledger().is_none());

        context.ledger_mut().record_turn(40, 10, 3);
        context.attach_session(SessionHandle::new("gemini", "k", "m", None));
        assert!(context.ledger().expect("ledger").is_zero());
    }

    #[test]
    fn reset_cancels_in_flight_turn() {
        let mut context = ChatContext::default();
        context.push(ChatMessage::user("hi"));
        let token = context.begin_turn(1, "x".into());
        context.set_error("boom");

        context.reset();
        assert!(token.is_cancelled());
        assert!(context.messages().is_empty());
        assert!(context.error().is_none());
        assert!(context.session().is_none());
        assert!(!context.is_loading());
    }
}
