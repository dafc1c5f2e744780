//! Movement, feature toggles and robot status

use axum::{
    extract::{Path, State},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::actuation::{Ack, ActuationStatus, Command};
use crate::auth::{Role, Session};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::StreamStatus;

/// Reply to an accepted command
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub command: Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl CommandResponse {
    fn new(command: Command, ack: Ack) -> Self {
        Self {
            success: true,
            command,
            warning: match ack {
                Ack::Acknowledged => None,
                Ack::AcknowledgedWithWarning(reason) => Some(reason),
            },
        }
    }
}

/// Browser control form
#[derive(Debug, Deserialize)]
pub struct ControlForm {
    pub command: String,
}

fn parse_command(token: &str) -> Result<Command> {
    token.parse().map_err(AppError::BadRequest)
}

/// Run one command through the dispatcher off the async runtime
async fn execute(state: &AppState, command: Command, role: Role) -> Result<Json<CommandResponse>> {
    let dispatcher = state.dispatcher.clone();
    let ack = tokio::task::spawn_blocking(move || dispatcher.dispatch(command, role))
        .await
        .map_err(|e| AppError::Internal(format!("Dispatch task failed: {}", e)))??;

    debug!("{} accepted: {:?}", command, ack);
    Ok(Json(CommandResponse::new(command, ack)))
}

/// POST /move/:token
pub async fn move_robot(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(token): Path<String>,
) -> Result<Json<CommandResponse>> {
    let command = parse_command(&token)?;
    execute(&state, command, session.role).await
}

/// POST /control (form field `command`)
pub async fn control(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<ControlForm>,
) -> Result<Json<CommandResponse>> {
    let command = parse_command(&form.command)?;
    execute(&state, command, session.role).await
}

#[derive(Serialize)]
pub struct RobotStatus {
    pub actuation: ActuationStatus,
    pub stream: StreamStatus,
}

/// GET /api/robot/status
pub async fn robot_status(State(state): State<Arc<AppState>>) -> Json<RobotStatus> {
    Json(RobotStatus {
        actuation: state.dispatcher.status(),
        stream: state.mjpeg.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::ActuationBackend;
    use crate::web::handlers::testing::{session, simulated_state};

    fn invocations(state: &AppState, command: Command) -> u64 {
        state.dispatcher.with_backend(|backend| match backend {
            ActuationBackend::Simulated(sim) => sim.invocations(command),
            _ => 0,
        })
    }

    #[tokio::test]
    async fn test_operator_moves() {
        let state = simulated_state();
        let Json(reply) = move_robot(
            State(state.clone()),
            Extension(session(Role::Operator)),
            Path("forward".to_string()),
        )
        .await
        .unwrap();

        assert!(reply.success);
        assert_eq!(reply.command, Command::Forward);
        assert!(reply.warning.is_none());
        assert_eq!(invocations(&state, Command::Forward), 1);
    }

    #[tokio::test]
    async fn test_viewer_forbidden() {
        let state = simulated_state();
        let err = move_robot(
            State(state.clone()),
            Extension(session(Role::Viewer)),
            Path("left".to_string()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(invocations(&state, Command::Left), 0);
        assert_eq!(state.dispatcher.status().rejected, 1);
    }

    #[tokio::test]
    async fn test_unknown_token_is_bad_request() {
        let state = simulated_state();
        let err = move_robot(
            State(state.clone()),
            Extension(session(Role::Admin)),
            Path("jump".to_string()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(state.dispatcher.status().dispatched, 0);
    }

    #[tokio::test]
    async fn test_control_form() {
        let state = simulated_state();
        let Json(reply) = control(
            State(state.clone()),
            Extension(session(Role::Admin)),
            Form(ControlForm {
                command: "light_on".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(reply.command, Command::LightOn);
        assert_eq!(invocations(&state, Command::LightOn), 1);
    }

    #[tokio::test]
    async fn test_status_reflects_last_command() {
        let state = simulated_state();
        move_robot(
            State(state.clone()),
            Extension(session(Role::Operator)),
            Path("stop".to_string()),
        )
        .await
        .unwrap();

        let Json(status) = robot_status(State(state)).await;
        assert_eq!(status.actuation.dispatched, 1);
        assert_eq!(
            status.actuation.last_command.map(|c| c.command),
            Some(Command::Stop)
        );
        assert_eq!(status.stream.viewer_count, 0);
    }
}
