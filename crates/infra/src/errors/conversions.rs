//! Conversions from external infrastructure errors into domain errors.

use lexflow_domain::LexFlowError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LexFlowError);

impl From<InfraError> for LexFlowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LexFlowError> for InfraError {
    fn from(value: LexFlowError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoLexFlowError {
    fn into_lexflow(self) -> LexFlowError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → LexFlowError */
/* -------------------------------------------------------------------------- */

impl IntoLexFlowError for SqlError {
    fn into_lexflow(self) -> LexFlowError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        LexFlowError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        LexFlowError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        LexFlowError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        LexFlowError::Database("foreign key constraint violation".into())
                    }
                    _ => LexFlowError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => LexFlowError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                LexFlowError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                LexFlowError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => LexFlowError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidParameterName(parameter_name) => {
                LexFlowError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => LexFlowError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => LexFlowError::Database("invalid SQL query".into()),
            other => LexFlowError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_lexflow())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → LexFlowError */
/* -------------------------------------------------------------------------- */

impl IntoLexFlowError for HttpError {
    fn into_lexflow(self) -> LexFlowError {
        if self.is_timeout() {
            return LexFlowError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return LexFlowError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => LexFlowError::Auth(message),
                404 => LexFlowError::NotFound(message),
                409 | 412 => LexFlowError::Conflict(message),
                429 => LexFlowError::RateLimit(message),
                400..=499 => LexFlowError::InvalidInput(message),
                500..=599 => LexFlowError::Server(message),
                _ => LexFlowError::Network(message),
            };
        }

        LexFlowError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_lexflow())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use tokio::runtime::Runtime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: LexFlowError = InfraError::from(err).into();
        match mapped {
            LexFlowError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn sqlite_unique_violation_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: bills.remote_id".into()),
        );

        let mapped: LexFlowError = InfraError::from(err).into();
        match mapped {
            LexFlowError::Database(msg) => assert!(msg.contains("unique")),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn sqlite_no_rows_maps_to_not_found() {
        let mapped: LexFlowError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, LexFlowError::NotFound(_)));
    }

    #[test]
    fn http_status_401_maps_to_auth_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: LexFlowError = InfraError::from(error).into();
            match mapped {
                LexFlowError::Auth(msg) => assert!(msg.contains("401")),
                other => panic!("expected auth error, got {:?}", other),
            }
        });
    }

    #[test]
    fn http_status_429_maps_to_rate_limit_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: LexFlowError = InfraError::from(error).into();
            assert!(matches!(mapped, LexFlowError::RateLimit(_)));
        });
    }

    #[test]
    fn http_status_500_maps_to_server_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::INTERNAL_SERVER_ERROR))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: LexFlowError = InfraError::from(error).into();
            assert!(matches!(mapped, LexFlowError::Server(_)));
        });
    }
}
