//! Access gate
//!
//! Maps a caller role and a requested action to allow/deny. Pure: no I/O,
//! no state. Every movement and feature toggle goes through [`allowed`]
//! before it reaches the actuation backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege tier attached to an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May watch the camera feed
    Viewer,
    /// May also drive the robot and toggle features
    Operator,
    /// May also manage accounts
    Admin,
}

impl Role {
    /// All roles, lowest privilege first
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Operator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Action a caller asks to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Drive command (forward, backward, left, right, stop)
    Move,
    /// Light or storage toggle
    ToggleFeature,
    /// Attach to the live frame stream or take a snapshot
    ViewStream,
    /// Promote/demote or remove accounts
    ManageAccounts,
}

/// Decide whether `role` may perform `action`
pub fn allowed(role: Role, action: Action) -> bool {
    match action {
        Action::Move | Action::ToggleFeature => matches!(role, Role::Operator | Role::Admin),
        Action::ViewStream => true,
        Action::ManageAccounts => role == Role::Admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_cannot_actuate() {
        assert!(!allowed(Role::Viewer, Action::Move));
        assert!(!allowed(Role::Viewer, Action::ToggleFeature));
        assert!(allowed(Role::Viewer, Action::ViewStream));
    }

    #[test]
    fn test_operator_and_admin_can_actuate() {
        for role in [Role::Operator, Role::Admin] {
            assert!(allowed(role, Action::Move));
            assert!(allowed(role, Action::ToggleFeature));
            assert!(allowed(role, Action::ViewStream));
        }
    }

    #[test]
    fn test_only_admin_manages_accounts() {
        assert!(!allowed(Role::Viewer, Action::ManageAccounts));
        assert!(!allowed(Role::Operator, Action::ManageAccounts));
        assert!(allowed(Role::Admin, Action::ManageAccounts));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Operator".parse::<Role>().unwrap(), Role::Operator);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
