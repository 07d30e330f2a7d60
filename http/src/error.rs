use axum::{
    extract::rejection::{
        JsonRejection,
        QueryRejection,
    },
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};
use stream_observer_collector::{
    RegistryError,
    StoreError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Registry(RegistryError::Validation(_)) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Registry(RegistryError::NotFound(_)) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Registry(RegistryError::Store(_)) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, axum::Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (AppError::Registry(RegistryError::Validation("name is empty".into())), StatusCode::BAD_REQUEST),
            (AppError::Registry(RegistryError::NotFound(7)), StatusCode::NOT_FOUND),
            (
                AppError::Store(StoreError::Corrupt {
                    table: "clusters",
                    reason: "bad url".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::BadRequest("hours must be positive".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status);
        }
    }

    #[test]
    fn validation_messages_are_passed_through() {
        let error = AppError::Registry(RegistryError::Validation("cluster name must not be empty".into()));
        assert_eq!(error.to_string(), "cluster name must not be empty");
    }
}
