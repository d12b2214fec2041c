// ABOUTME: Errors raised while redirecting traffic between colors.
// ABOUTME: Distinguishes clean failures from ones that left routes stranded.

use crate::cloud::CloudError;
use crate::types::TargetId;

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    /// Update refused; every route that had changed was put back.
    #[error("failed to update {route}: {source}{}", reverted_note(.reverted))]
    Route {
        route: String,
        reverted: usize,
        #[source]
        source: CloudError,
    },

    /// Update refused and the revert failed too. Traffic is split.
    #[error("failed to update {route} and could not revert {}: {source}", .stranded.join(", "))]
    Partial {
        route: String,
        stranded: Vec<String>,
        #[source]
        source: CloudError,
    },

    #[error("routes still point at {actual} after switching to {expected}")]
    Unverified { expected: TargetId, actual: TargetId },

    #[error("routes disagree on the live target: {}", describe(.routes))]
    Inconsistent { routes: Vec<(String, TargetId)> },

    #[error("failed to read {route}: {source}")]
    Read {
        route: String,
        #[source]
        source: CloudError,
    },

    /// Routes were changed, could not be confirmed, and could not be
    /// confirmed back on `previous` either.
    #[error("{cause}; could not route back to {previous}: {revert}")]
    Unconfirmed {
        previous: TargetId,
        #[source]
        cause: Box<SwitchError>,
        revert: String,
    },
}

impl SwitchError {
    /// Whether routing may be left in a mixed state.
    pub fn is_stranded(&self) -> bool {
        matches!(
            self,
            SwitchError::Partial { .. } | SwitchError::Unconfirmed { .. }
        )
    }
}

fn reverted_note(reverted: &usize) -> String {
    match *reverted {
        0 => String::new(),
        n => format!(" (reverted {n} already-updated route(s))"),
    }
}

fn describe(routes: &[(String, TargetId)]) -> String {
    routes
        .iter()
        .map(|(route, target)| format!("{route} -> {target}"))
        .collect::<Vec<_>>()
        .join(", ")
}
