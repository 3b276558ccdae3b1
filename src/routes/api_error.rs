use crate::helper::admin_helpers::AdminHelperError;
use crate::helper::form_helpers::FormError;
use crate::helper::validation_helpers::FieldErrors;
use crate::models::db_operations::resource_db_operations::DbError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Error type of the admin JSON API. Every variant renders as
/// `{"message": ...}`; validation failures add the `errors` map.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Les données fournies sont invalides.")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    /// Request understood but refused by a business rule.
    #[error("{0}")]
    BusinessRule(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Méthode non autorisée.")]
    MethodNotAllowed,
    /// Details are logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

const INTERNAL_MESSAGE: &str = "Une erreur interne est survenue. Veuillez réessayer.";
/// A write that passed validation but hit a database constraint, e.g. two
/// concurrent creations of the same unique value.
const CONFLICT_MESSAGE: &str = "Cette opération entre en conflit avec des données existantes.";

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BusinessRule(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(errors) => json!({ "message": self.to_string(), "errors": errors }),
            ApiError::Internal(details) => {
                log::error!("{}", details);
                json!({ "message": INTERNAL_MESSAGE })
            }
            _ => json!({ "message": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(format!("Élément introuvable : {}.", what)),
            DbError::Rusqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::BusinessRule(CONFLICT_MESSAGE.to_string())
            }
            DbError::InvalidOrder(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(format!("Database error: {}", other)),
        }
    }
}

impl From<AdminHelperError> for ApiError {
    fn from(err: AdminHelperError) -> Self {
        match err {
            AdminHelperError::Validation(errors) => ApiError::Validation(errors),
            AdminHelperError::NotFound(what) => ApiError::NotFound(format!("Élément introuvable : {}.", what)),
            AdminHelperError::Database(db) => db.into(),
            AdminHelperError::Pool(e) => ApiError::Internal(format!("R2D2 Pool error: {}", e)),
        }
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Media(media) => ApiError::Internal(format!("Media storage error: {}", media)),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ApiError::Internal(format!("Blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(ApiError::Validation(FieldErrors::new()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BusinessRule("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn constraint_violations_are_conflicts() {
        use crate::models::db_operations::resource_db_operations::insert;
        use crate::models::schema::CATEGORIES;
        use rusqlite::types::Value as SqlValue;

        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::setup::db_setup::setup_commune_db(&mut conn).unwrap();
        insert(&mut conn, &CATEGORIES, vec![("nom", SqlValue::Text("Culture".into()))]).unwrap();
        let clash = insert(&mut conn, &CATEGORIES, vec![("nom", SqlValue::Text("Culture".into()))]).unwrap_err();

        let err: ApiError = clash.into();
        assert!(matches!(err, ApiError::BusinessRule(ref m) if m == CONFLICT_MESSAGE));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_not_found_maps_to_404() {
        let err: ApiError = DbError::NotFound("slides #3".into()).into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("slides #3")));
    }
}
