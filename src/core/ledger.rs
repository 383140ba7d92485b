//! Token usage accounting for a chat context.
//!
//! A [`TokenLedger`] keeps the usage of the most recent completed turn and the
//! running totals since the session was created. [`UsageAccumulator`] folds the
//! usage snapshots of one streamed turn into the triple that is finally
//! committed with [`TokenLedger::record_turn`].

use crate::api::UsageSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnUsage {
    pub prompt: u64,
    pub completion: u64,
    pub cached_input: u64,
    /// `prompt + completion`; cached input is informational only.
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionUsage {
    pub prompt_sum: u64,
    pub completion_sum: u64,
    pub cached_input_sum: u64,
    pub total_sum: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenLedger {
    pub last_turn: TurnUsage,
    pub session: SessionUsage,
}

impl TokenLedger {
    pub fn reset(&mut self) {
        *self = TokenLedger::default();
    }

    pub fn record_turn(&mut self, prompt: u64, completion: u64, cached_input: u64) {
        let total = prompt.saturating_add(completion);
        self.last_turn = TurnUsage {
            prompt,
            completion,
            cached_input,
            total,
        };
        self.session.prompt_sum = self.session.prompt_sum.saturating_add(prompt);
        self.session.completion_sum = self.session.completion_sum.saturating_add(completion);
        self.session.cached_input_sum = self.session.cached_input_sum.saturating_add(cached_input);
        self.session.total_sum = self.session.total_sum.saturating_add(total);
    }

    pub fn is_zero(&self) -> bool {
        *self == TokenLedger::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "last turn: {} prompt + {} completion = {} ({} cached) | session: {} prompt + {} completion = {} ({} cached)",
            self.last_turn.prompt,
            self.last_turn.completion,
            self.last_turn.total,
            self.last_turn.cached_input,
            self.session.prompt_sum,
            self.session.completion_sum,
            self.session.total_sum,
            self.session.cached_input_sum,
        )
    }
}

/// Folds per-fragment usage of a single turn.
///
/// Prompt and cached-input counts are reported once per turn, so the first
/// non-zero value wins. Completion counts are incremental per fragment and
/// are summed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageAccumulator {
    prompt: Option<u64>,
    cached_input: Option<u64>,
    completion: u64,
}

impl UsageAccumulator {
    pub fn fold(&mut self, usage: &UsageSnapshot) {
        if self.prompt.is_none() {
            self.prompt = usage.prompt_count.filter(|count| *count > 0);
        }
        if self.cached_input.is_none() {
            self.cached_input = usage.cached_input_count.filter(|count| *count > 0);
        }
        if let Some(completion) = usage.completion_count {
            self.completion = self.completion.saturating_add(completion);
        }
    }

    /// Returns `(prompt, completion, cached_input)`.
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.prompt.unwrap_or(0),
            self.completion,
            self.cached_input.unwrap_or(0),
        )
    }

    pub fn commit(&self, ledger: &mut TokenLedger) {
        let (prompt, completion, cached_input) = self.totals();
        ledger.record_turn(prompt, completion, cached_input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(prompt: Option<u64>, cached: Option<u64>, completion: Option<u64>) -> UsageSnapshot {
        UsageSnapshot {
            prompt_count: prompt,
            cached_input_count: cached,
            completion_count: completion,
        }
    }

    #[test]
    fn fold_keeps_first_prompt_and_sums_completion() {
        let mut acc = UsageAccumulator::default();
        acc.fold(&snapshot(Some(10), Some(2), Some(3)));
        acc.fold(&snapshot(None, None, Some(4)));
        acc.fold(&snapshot(Some(99), None, Some(2)));

        let mut ledger = TokenLedger::default();
        acc.commit(&mut ledger);

        assert_eq!(
            ledger.last_turn,
            TurnUsage {
                prompt: 10,
                completion: 9,
                cached_input: 2,
                total: 19,
            }
        );
    }

    #[test]
    fn zero_prompt_does_not_claim_the_slot() {
        let mut acc = UsageAccumulator::default();
        acc.fold(&snapshot(Some(0), Some(0), None));
        acc.fold(&snapshot(Some(12), Some(5), Some(1)));
        assert_eq!(acc.totals(), (12, 1, 5));
    }

    #[test]
    fn session_sums_accumulate_across_turns() {
        let mut ledger = TokenLedger::default();
        ledger.record_turn(10, 5, 1);
        ledger.record_turn(20, 7, 0);

        assert_eq!(ledger.last_turn.total, 27);
        assert_eq!(
            ledger.session,
            SessionUsage {
                prompt_sum: 30,
                completion_sum: 12,
                cached_input_sum: 1,
                total_sum: 42,
            }
        );
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut ledger = TokenLedger::default();
        ledger.record_turn(100, 50, 25);
        ledger.reset();
        assert!(ledger.is_zero());
        ledger.reset();
        assert!(ledger.is_zero());
    }
}
