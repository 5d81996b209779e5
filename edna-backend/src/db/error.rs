use diesel::result::DatabaseErrorInformation;
use diesel_async::pooled_connection::deadpool;
use regex::Regex;
use serde::Serialize;
use valuable::Valuable;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error("{entity} with {} = {} already exists", field.clone().unwrap_or_default(), value.clone().unwrap_or_default())]
    DuplicateRecord {
        entity: String,
        field: Option<String>,
        value: Option<String>,
    },
    #[error("{entity} references a {referenced_entity} that does not exist")]
    ReferenceNotFound {
        entity: String,
        referenced_entity: String,
        value: Option<String>,
    },
    #[error("record not found")]
    RecordNotFound,
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    fn from_other_error(err: impl std::error::Error) -> Self {
        Self::Other {
            message: format!("{err:?}"),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error::{DatabaseError, NotFound};

        match err {
            DatabaseError(kind, info) => Self::from((kind, info)),
            NotFound => Self::RecordNotFound,
            _ => Self::from_other_error(err),
        }
    }
}

impl From<deadpool::PoolError> for Error {
    fn from(err: deadpool::PoolError) -> Self {
        Self::from_other_error(err)
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::from_other_error(err)
    }
}

impl
    From<(
        diesel::result::DatabaseErrorKind,
        Box<dyn DatabaseErrorInformation + Send + Sync>,
    )> for Error
{
    fn from(
        (kind, info): (
            diesel::result::DatabaseErrorKind,
            Box<dyn DatabaseErrorInformation + Send + Sync>,
        ),
    ) -> Self {
        use diesel::result::DatabaseErrorKind::{ForeignKeyViolation, UniqueViolation};

        let entity = info.table_name().unwrap_or_default().to_string();
        let details = info.details().unwrap_or_default();

        // postgres phrases constraint details as `Key (col)=(value) ...`
        let detail_regex = Regex::new(r"Key \((.+)\)=\((.+)\)").unwrap();
        let (field, value) = detail_regex
            .captures(details)
            .map(|cap| {
                (
                    cap.get(1).map(|m| m.as_str().to_string()),
                    cap.get(2).map(|m| m.as_str().to_string()),
                )
            })
            .unwrap_or_default();

        match kind {
            UniqueViolation => Self::DuplicateRecord {
                entity,
                field,
                value,
            },
            ForeignKeyViolation => {
                let referenced_entity = details
                    .split_whitespace()
                    .last()
                    .unwrap_or_default()
                    .replace('"', "");
                let referenced_entity = referenced_entity
                    .strip_suffix('.')
                    .unwrap_or(&referenced_entity)
                    .to_string();

                Self::ReferenceNotFound {
                    entity,
                    referenced_entity,
                    value,
                }
            }
            _ => Self::from_other_error(diesel::result::Error::DatabaseError(kind, info)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
