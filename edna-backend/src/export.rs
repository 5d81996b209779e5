//! ENA (European Nucleotide Archive) submission export: a zip of
//! `submission.xml` and `sample.xml` following the ERC000024 (GSC MIxS
//! water) checklist.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::field_survey;
use uuid::Uuid;

use crate::db::{
    FetchById, error,
    model::{
        measurement::{self, Measurement, MeasurementType},
        project, sample,
        sample::Sample,
        sample_type,
        site::Site,
        survey::Survey,
    },
};

mod ena;

pub use ena::{ExportError, ena_zip};

/// Everything the ENA renderer needs about one survey, resolved up front so
/// rendering itself is pure.
pub struct SurveyExport {
    pub site: Site,
    pub survey: Survey,
    pub project_label: Option<String>,
    pub samples: Vec<SampleExport>,
    pub measurements: Vec<(Measurement, MeasurementType)>,
}

pub struct SampleExport {
    pub sample: Sample,
    pub sample_type_label: String,
}

pub async fn load_survey_export(
    survey_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<SurveyExport> {
    let survey = field_survey::table
        .find(survey_id)
        .select(Survey::as_select())
        .first(db_conn)
        .await?;

    let site = Site::fetch_by_id(&survey.site_id, db_conn).await?;

    let project_label = project::for_survey(survey_id, db_conn)
        .await?
        .into_iter()
        .next()
        .map(|p| p.label);

    let type_labels: HashMap<Uuid, String> = sample_type::list_all(db_conn)
        .await?
        .into_iter()
        .map(|t| (t.id, t.label))
        .collect();

    let samples = sample::for_survey(survey_id, db_conn)
        .await?
        .into_iter()
        .map(|sample| {
            let sample_type_label = type_labels
                .get(&sample.sample_type_id)
                .cloned()
                .unwrap_or_default();

            SampleExport {
                sample,
                sample_type_label,
            }
        })
        .collect();

    let measurements = measurement::with_types_for_survey(survey_id, db_conn).await?;

    Ok(SurveyExport {
        site,
        survey,
        project_label,
        samples,
        measurements,
    })
}
