use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::task::JoinError;
use wither::WitherError;
use wither::bson;
use wither::mongodb::error::Error as MongoError;

#[derive(thiserror::Error, Debug)]
#[error("...")]
pub enum Error {
    #[error("{0}")]
    Wither(#[from] WitherError),

    #[error("{0}")]
    Mongo(#[from] MongoError),

    #[error("Error parsing ObjectID {0}")]
    ParseObjectID(String),

    #[error("{0}")]
    SerializeMongoResponse(#[from] bson::de::Error),

    #[error("{0}")]
    SerializeMongoDocument(#[from] bson::ser::Error),

    #[error("{0}")]
    Authenticate(#[from] AuthenticateError),

    #[error("{0}")]
    BadRequest(#[from] BadRequest),

    #[error("{0}")]
    NotFound(#[from] NotFound),

    #[error("{0}")]
    Internal(#[from] Internal),

    #[error("{0}")]
    Unauthorized(#[from] Unauthorized),

    #[error("{0}")]
    RunSyncTask(#[from] JoinError),

    #[error("{0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Notification queue is closed")]
    QueueClosed,

    #[error("Notification queue is full")]
    QueueFull,

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl Error {
    fn get_codes(&self) -> (StatusCode, u16) {
        match *self {
            // 4XX Errors
            Error::ParseObjectID(_) => (StatusCode::BAD_REQUEST, 40001),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, 40002),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, 40003),
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, 40006),
            Error::Authenticate(AuthenticateError::InvalidToken) => {
                (StatusCode::UNAUTHORIZED, 40005)
            }
            Error::Authenticate(AuthenticateError::MissingCredentials) => {
                (StatusCode::UNAUTHORIZED, 40004)
            }

            // 5XX Errors
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5000),
            Error::Wither(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5002),
            Error::Mongo(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5003),
            Error::SerializeMongoResponse(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5004),
            Error::SerializeMongoDocument(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5004),
            Error::RunSyncTask(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5005),
            Error::Kafka(_) => (StatusCode::INTERNAL_SERVER_ERROR, 5007),
            Error::QueueClosed => (StatusCode::SERVICE_UNAVAILABLE, 5008),
            Error::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, 5009),

            Error::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, 6001),
            Error::SerdeJsonError(_) => (StatusCode::INTERNAL_SERVER_ERROR, 6003),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.get_codes().0
    }

    pub fn bad_request(message: &str) -> Self {
        Error::BadRequest(BadRequest {
            message: message.to_string(),
        })
    }

    pub fn not_found(message: &str) -> Self {
        Error::NotFound(NotFound {
            message: message.to_string(),
        })
    }

    pub fn internal_err(message: &str) -> Self {
        Error::Internal(Internal {
            message: message.to_string(),
        })
    }

    pub fn unauthorized(message: &str) -> Self {
        Error::Unauthorized(Unauthorized {
            message: message.to_string(),
        })
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::bad_request(&rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::bad_request(&rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::bad_request(&rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::bad_request(&errors.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, code) = self.get_codes();
        if status_code.is_server_error() {
            tracing::error!("{self:?}");
        } else {
            tracing::debug!("{self:?}");
        }

        let message = self.to_string();
        let body = Json(json!({ "code": code, "message": message }));

        (status_code, body).into_response()
    }
}

#[derive(thiserror::Error, Debug)]
#[error("...")]
pub enum AuthenticateError {
    #[error("Authorization header missing")]
    MissingCredentials,
    #[error("Invalid authentication credentials")]
    InvalidToken,
}

#[derive(thiserror::Error, Debug)]
#[error("Bad Request: {message}")]
pub struct BadRequest {
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
#[error("Not found: {message}")]
pub struct NotFound {
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
#[error("Internal error: {message}")]
pub struct Internal {
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
#[error("Unauthorized error: {message}")]
pub struct Unauthorized {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = Error::not_found("Notification not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not found: Notification not found");
    }

    #[test]
    fn auth_errors_are_401() {
        assert_eq!(
            Error::from(AuthenticateError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn closed_queue_is_unavailable() {
        assert_eq!(Error::QueueClosed.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(Error::QueueFull.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn every_variant_has_its_own_code() {
        let errors = [
            Error::ParseObjectID("x".to_string()),
            Error::bad_request("x"),
            Error::not_found("x"),
            Error::unauthorized("x"),
            Error::from(AuthenticateError::InvalidToken),
            Error::from(AuthenticateError::MissingCredentials),
            Error::internal_err("x"),
            Error::QueueClosed,
            Error::QueueFull,
            Error::Anyhow(anyhow::anyhow!("x")),
        ];
        let mut codes: Vec<u16> = errors.iter().map(|e| e.get_codes().1).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(Error::unauthorized("x").get_codes().1, 40006);
    }
}
