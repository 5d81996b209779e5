use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use diesel_async::pooled_connection::deadpool;
use serde::Serialize;
use valuable::Valuable;

use crate::{db, export::ExportError, import::ImportError};

#[derive(thiserror::Error, Serialize, Debug, Clone, Valuable)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error(transparent)]
    Database(#[from] db::error::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("export failed")]
    Export { message: String },
    #[error("invalid data")]
    SimpleData { reason: String },
    #[error("malformed request")]
    MalformedRequest {
        #[serde(skip)]
        #[valuable(skip)]
        status: StatusCode,
        message: String,
    },
}

impl Error {
    fn status_code(&self) -> StatusCode {
        use Error::{Database, Export, Import, MalformedRequest, SimpleData};
        use db::error::Error::{DuplicateRecord, Other, RecordNotFound, ReferenceNotFound};

        let db_status = |inner: &db::error::Error| match inner {
            Other { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DuplicateRecord { .. } => StatusCode::CONFLICT,
            RecordNotFound => StatusCode::NOT_FOUND,
            ReferenceNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };

        match self {
            SimpleData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Database(inner) => db_status(inner),
            Import(inner) => match inner {
                ImportError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ImportError::TooManyRows { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ImportError::Db(inner) => db_status(inner),
            },
            Export { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MalformedRequest { status, .. } => *status,
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(err: JsonRejection) -> Self {
        Self::MalformedRequest {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<PathRejection> for Error {
    fn from(err: PathRejection) -> Self {
        Self::MalformedRequest {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<deadpool::PoolError> for Error {
    fn from(err: deadpool::PoolError) -> Self {
        Self::Database(db::error::Error::from(err))
    }
}

impl From<garde::Report> for Error {
    fn from(err: garde::Report) -> Self {
        Self::SimpleData {
            reason: format!("{err:#}"),
        }
    }
}

impl From<ExportError> for Error {
    fn from(err: ExportError) -> Self {
        Self::Export {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = self.as_value());

        #[derive(Serialize)]
        struct ErrorResponse {
            status: u16,
            error: Option<Error>,
        }

        let status = self.status_code();

        // Internals stay in the logs.
        let error = (status != StatusCode::INTERNAL_SERVER_ERROR).then_some(self);

        (
            status,
            axum::Json(ErrorResponse {
                status: status.as_u16(),
                error,
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
