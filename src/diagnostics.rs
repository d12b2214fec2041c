// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

use crate::deploy::StatusReport;

/// Collects non-fatal warnings during a command.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Record each cleanup step a finished run reported as failed.
    pub fn cleanup_steps(&mut self, messages: &[String]) {
        for message in messages {
            self.warn(Warning::cleanup_step(message.clone()));
        }
    }

    /// Flag disagreements a status read surfaced.
    pub fn inspect_status(&mut self, status: &StatusReport) {
        if let Some(error) = &status.state_error {
            self.warn(Warning::state_mismatch(error.clone()));
        }
        if let Some(error) = &status.routing_error {
            self.warn(Warning::state_mismatch(error.clone()));
        }
        if let Some(active) = status.colors.iter().find(|c| c.active)
            && status.live_target.is_some()
            && !active.routed
        {
            self.warn(Warning::state_mismatch(format!(
                "color state marks {} active but traffic goes elsewhere",
                active.color
            )));
        }
        for color in &status.colors {
            if let Some(error) = &color.error {
                self.warn(Warning::unreachable(format!("{}: {error}", color.color)));
            }
        }
        if let Some(readiness) = &status.readiness
            && let Some(error) = &readiness.error
        {
            self.warn(Warning::unreachable(format!("readiness probe: {error}")));
        }
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a command.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a cleanup step warning.
    pub fn cleanup_step(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CleanupStep,
            message: message.into(),
        }
    }

    /// Create a state mismatch warning.
    pub fn state_mismatch(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StateMismatch,
            message: message.into(),
        }
    }

    /// Create an unreachable collaborator warning.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Unreachable,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A post-switch step (min reset, scale-down, restore) did not complete.
    CleanupStep,
    /// Color state and live routing disagree.
    StateMismatch,
    /// A fleet, target group or readiness endpoint could not be read.
    Unreachable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::ColorStatus;
    use crate::types::{Color, EnvironmentName, FleetId, TargetId};

    fn color_status(color: Color, active: bool, routed: bool) -> ColorStatus {
        ColorStatus {
            color,
            fleet: FleetId::new(format!("{color}-fleet")),
            target: TargetId::new(format!("tg-{color}")),
            active,
            routed,
            version: None,
            capacity: None,
            serving: 0,
            instances: 0,
            routing_healthy: 0,
            routing_registered: 0,
            error: None,
        }
    }

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_cleanup_steps() {
        let mut diag = Diagnostics::default();

        diag.cleanup_steps(&[
            "release blue fleet min: throttled".to_string(),
            "restore green: timed out".to_string(),
        ]);

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert!(diag
            .warnings()
            .iter()
            .all(|w| w.kind == WarningKind::CleanupStep));
    }

    #[test]
    fn status_with_misrouted_active_color_warns() {
        let mut diag = Diagnostics::default();
        let status = StatusReport {
            environment: EnvironmentName::new("beta").unwrap(),
            active: Some(Color::Blue),
            state_error: None,
            live_target: Some(TargetId::new("tg-green")),
            routing_error: None,
            colors: vec![
                color_status(Color::Blue, true, false),
                color_status(Color::Green, false, true),
            ],
            readiness: None,
        };

        diag.inspect_status(&status);

        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(diag.warnings()[0].kind, WarningKind::StateMismatch);
    }

    #[test]
    fn consistent_status_is_quiet() {
        let mut diag = Diagnostics::default();
        let status = StatusReport {
            environment: EnvironmentName::new("beta").unwrap(),
            active: Some(Color::Blue),
            state_error: None,
            live_target: Some(TargetId::new("tg-blue")),
            routing_error: None,
            colors: vec![
                color_status(Color::Blue, true, true),
                color_status(Color::Green, false, false),
            ],
            readiness: None,
        };

        diag.inspect_status(&status);

        assert!(!diag.has_warnings());
    }
}
