//! Custom error types for the MCP server.

use fitness_planner::PlannerError;
use thiserror::Error;

/// MCP server errors.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl McpError {
    /// HTTP status for this error on the REST surface.
    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            McpError::Planner(PlannerError::InvalidDate(_))
            | McpError::Planner(PlannerError::Serialization(_))
            | McpError::Validation(_)
            | McpError::Serialization(_) => StatusCode::BAD_REQUEST,
            McpError::Planner(PlannerError::DuplicateEvent(_)) => StatusCode::CONFLICT,
            McpError::NotFound(_) => StatusCode::NOT_FOUND,
            McpError::Planner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<McpError> for String {
    fn from(err: McpError) -> Self {
        err.to_string()
    }
}

/// Result type alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn statuses() {
        let dup = McpError::from(PlannerError::DuplicateEvent("x".into()));
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        let bad = McpError::from(PlannerError::InvalidDate("soon".into()));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let io = McpError::from(PlannerError::Persist("disk".into()));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            McpError::NotFound("event".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(String::from(McpError::Validation("x".into())), "Validation error: x");
    }
}
