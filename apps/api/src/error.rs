use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsgrid_core::AppError;
use serde::Serialize;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Denial and internal bodies stay generic so responses cannot be
        // used to enumerate tenants, roles, or the permission catalog. Full
        // detail goes to the process log only.
        let (status, message) = match &self.0 {
            AppError::Validation(_)
            | AppError::DuplicateName(_)
            | AppError::RoleInUse(_)
            | AppError::ProtectedRole(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_owned(),
            ),
            AppError::NoRolesAssigned(detail) | AppError::PermissionDenied(detail) => {
                tracing::debug!(%detail, "request denied");
                (StatusCode::FORBIDDEN, "access denied".to_owned())
            }
            AppError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use opsgrid_core::AppError;

    use super::ApiError;

    #[test]
    fn denials_map_to_generic_forbidden() {
        let response =
            ApiError(AppError::PermissionDenied("clients.view missing".to_owned()))
                .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response =
            ApiError(AppError::NoRolesAssigned("no roles".to_owned())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_identity_maps_to_unauthorized() {
        let response = ApiError(AppError::AuthRequired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn conflict_categories_map_to_bad_request() {
        for error in [
            AppError::DuplicateName("x".to_owned()),
            AppError::RoleInUse("x".to_owned()),
            AppError::ProtectedRole("x".to_owned()),
            AppError::Validation("x".to_owned()),
        ] {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }
}
