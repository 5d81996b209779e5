use axum::{
    Router,
    routing::{delete, get, post},
};

use super::AppState;
use crate::db::model::{
    person::NewPerson,
    project::NewProject,
    sample::SubCoreSample,
    sample_type::NewSampleType,
    site::{NewSite, Site},
    survey::{NewSurvey, SurveyBundle, SurveySummary},
};
use handler::{
    by_id, by_query, delete_filter_sample, export_ena, import_field_samples,
    import_filter_samples, write,
};

mod error;
mod handler;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/field-sites", post(write::<NewSite>))
        .route("/field-sites/{site_id}", get(by_id::<Site>))
        .route("/projects", post(write::<NewProject>))
        .route("/people", post(write::<NewPerson>))
        .route("/sample-types", post(write::<NewSampleType>))
        .route("/field-surveys", post(write::<NewSurvey>))
        .route("/field-surveys/{survey_id}", get(by_id::<SurveyBundle>))
        .route("/field-surveys/query", post(by_query::<SurveySummary>))
        .route("/field-surveys/{survey_id}/ena", get(export_ena))
        .route("/subcore-samples", post(write::<SubCoreSample>))
        .route("/imports/filter-samples", post(import_filter_samples))
        .route("/imports/field-samples", post(import_field_samples))
        .route("/filter-samples/{sample_id}", delete(delete_filter_sample))
}
