use crate::domain::UserId;
use serde::{Deserialize, Serialize};

/// A user's persisted watch configuration.
///
/// `prev_build` and `curr_build` are the last two observed build numbers and
/// stay `None` until the first successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub source_url: String,
    pub status_url: String,
    pub watching: bool,
    pub prev_build: Option<i64>,
    pub curr_build: Option<i64>,
}

impl Subscription {
    /// A freshly registered subscription that has never been polled.
    pub fn new(user_id: UserId, source_url: impl Into<String>, status_url: impl Into<String>) -> Self {
        Self {
            user_id,
            source_url: source_url.into(),
            status_url: status_url.into(),
            watching: true,
            prev_build: None,
            curr_build: None,
        }
    }

    /// Returns the subscription with `curr_build` shifted into `prev_build`.
    pub fn with_build(mut self, curr_build: i64) -> Self {
        self.prev_build = self.curr_build;
        self.curr_build = Some(curr_build);
        self
    }
}
