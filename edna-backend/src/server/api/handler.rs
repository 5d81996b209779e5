use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Path, Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use diesel_async::{AsyncConnection, scoped_futures::ScopedFutureExt};
use garde::Validate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;
use valuable::Valuable;

use super::error::{Error, Result};
use crate::{
    db::{
        self,
        cascade::{self, CascadeReport},
        store::PgStore,
    },
    export::{ena_zip, load_survey_export},
    import::{ImportError, ImportKind, ImportReport, TabularFormat, import_batch},
    server::AppState,
};

pub(super) struct ValidJson<T>(T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: Validate,
    <T as Validate>::Context: std::default::Default,
{
    type Rejection = Error;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let axum::Json(data) = axum::Json::<T>::from_request(req, state).await?;
        data.validate()?;

        Ok(Self(data))
    }
}

pub(super) async fn write<Data>(
    State(app_state): State<AppState>,
    ValidJson(data): ValidJson<Data>,
) -> Result<Json<Data::Returns>>
where
    Data: db::Write + Validate + Send,
    <Data as Validate>::Context: Default,
    Data::Returns: Serialize + Send,
{
    tracing::info!(write_request = std::any::type_name::<Data>());

    let mut db_conn = app_state.db_conn().await?;

    let item = db_conn
        .transaction(|conn| async move { data.write(conn).await }.scope_boxed())
        .await?;

    Ok(Json(item))
}

pub(super) async fn by_id<Resource>(
    State(app_state): State<AppState>,
    Path(resource_id): Path<Resource::Id>,
) -> Result<Json<Resource>>
where
    Resource: db::FetchById + Serialize + Send,
    Resource::Id: DeserializeOwned + Send + Sync,
{
    let mut db_conn = app_state.db_conn().await?;

    let item = Resource::fetch_by_id(&resource_id, &mut db_conn).await?;

    Ok(Json(item))
}

pub(super) async fn by_query<Resource>(
    State(app_state): State<AppState>,
    ValidJson(query): ValidJson<Resource::QueryParams>,
) -> Result<Json<Vec<Resource>>>
where
    Resource: db::FetchByQuery + Serialize + Send,
    Resource::QueryParams: Validate + Send + Sync,
    <Resource::QueryParams as Validate>::Context: Default,
{
    let mut db_conn = app_state.db_conn().await?;

    let items = Resource::fetch_by_query(&query, &mut db_conn).await?;

    Ok(Json(items))
}

#[derive(Deserialize)]
pub(super) struct ImportParams {
    format: TabularFormat,
}

pub(super) async fn import_filter_samples(
    state: State<AppState>,
    params: Query<ImportParams>,
    body: Bytes,
) -> Result<Json<ImportReport>> {
    run_import(state, params, ImportKind::FilterSamples, body).await
}

pub(super) async fn import_field_samples(
    state: State<AppState>,
    params: Query<ImportParams>,
    body: Bytes,
) -> Result<Json<ImportReport>> {
    run_import(state, params, ImportKind::FieldSamples, body).await
}

async fn run_import(
    State(app_state): State<AppState>,
    Query(ImportParams { format }): Query<ImportParams>,
    kind: ImportKind,
    body: Bytes,
) -> Result<Json<ImportReport>> {
    tracing::info!(import_format = format.as_value(), n_bytes = body.len());

    let max_rows = app_state.config().max_import_rows();
    let mut db_conn = app_state.db_conn().await?;

    let report = db_conn
        .transaction::<_, ImportError, _>(|conn| {
            async move {
                let mut store = PgStore::new(conn);

                import_batch(&mut store, &body, format, kind, max_rows).await
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(import_report = report.as_value());

    Ok(Json(report))
}

pub(super) async fn delete_filter_sample(
    State(app_state): State<AppState>,
    Path(sample_id): Path<Uuid>,
) -> Result<Json<CascadeReport>> {
    let mut db_conn = app_state.db_conn().await?;

    let report = db_conn
        .transaction::<_, db::error::Error, _>(|conn| {
            async move {
                let mut store = PgStore::new(conn);

                cascade::delete_filter_sample(&mut store, sample_id).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(report))
}

pub(super) async fn export_ena(
    State(app_state): State<AppState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Response> {
    let mut db_conn = app_state.db_conn().await?;

    let export = load_survey_export(survey_id, &mut db_conn).await?;
    let bytes = ena_zip(&export).map_err(Error::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"ena_submission.zip\"",
            ),
        ],
        bytes,
    )
        .into_response())
}
