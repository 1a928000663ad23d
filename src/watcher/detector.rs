use crate::domain::Subscription;
use crate::watcher::fetcher::{BuildStatus, FetchResult};

/// What the watch loop should do with one poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoOp,
    Notify {
        message: String,
        prev_build: Option<i64>,
        curr_build: i64,
    },
    Invalidate,
}

/// Compares a fetched build against the last known pair of a subscription.
///
/// Any difference from `curr_build` counts as a new build, including a
/// lower number and the very first poll where nothing is stored yet.
pub fn evaluate(subscription: &Subscription, fetch: &FetchResult) -> Decision {
    match fetch {
        FetchResult::Unreachable(_) => Decision::NoOp,
        FetchResult::Invalid(_) => Decision::Invalidate,
        FetchResult::Valid(build) if subscription.curr_build == Some(build.number) => {
            Decision::NoOp
        }
        FetchResult::Valid(build) => Decision::Notify {
            message: format_build_message(build, &subscription.source_url),
            prev_build: subscription.curr_build,
            curr_build: build.number,
        },
    }
}

pub fn format_build_message(build: &BuildStatus, source_url: &str) -> String {
    let state = build.state.as_deref().unwrap_or("unknown");
    match build.message.as_deref().map(str::trim) {
        Some(message) if !message.is_empty() => {
            format!("Build #{} {}\n{}\n{}", build.number, state, message, source_url)
        }
        _ => format!("Build #{} {}\n{}", build.number, state, source_url),
    }
}

pub fn format_invalidation_notice(source_url: &str) -> String {
    format!(
        "I can no longer watch this link: {source_url}. Send me the repository link again to watch it."
    )
}
