use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{field_survey, measurement};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self, error,
    model::{
        measurement::Measurement,
        sample::{self, Sample},
    },
    util::AsIlike,
};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = field_survey, check_for_backend(Pg))]
pub struct Survey {
    pub id: Uuid,
    pub site_id: Uuid,
    pub collected_by: Option<Uuid>,
    pub supervisor: Option<Uuid>,
    pub recorder_name: String,
    pub complete: bool,
    pub survey_at: DateTime<Utc>,
    pub altitude_m: Option<f64>,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = field_survey, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewSurvey {
    pub site_id: Uuid,
    pub collected_by: Option<Uuid>,
    pub supervisor: Option<Uuid>,
    #[serde(default)]
    #[garde(length(max = 255))]
    pub recorder_name: String,
    #[serde(default)]
    pub complete: bool,
    pub survey_at: DateTime<Utc>,
    #[garde(range(min = -500.0, max = 9000.0))]
    pub altitude_m: Option<f64>,
}

impl db::Write for NewSurvey {
    type Returns = Survey;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(field_survey::table)
            .values(&self)
            .returning(Survey::as_returning())
            .get_result(db_conn)
            .await?)
    }
}

/// The reuse-or-create key for imports: one survey per site per instant.
pub async fn find_at(
    site_id: Uuid,
    survey_at: DateTime<Utc>,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<Survey>> {
    Ok(field_survey::table
        .filter(
            field_survey::site_id
                .eq(site_id)
                .and(field_survey::survey_at.eq(survey_at)),
        )
        .select(Survey::as_select())
        .first(db_conn)
        .await
        .optional()?)
}

#[derive(Queryable, Selectable, Serialize, Clone, Debug)]
#[diesel(table_name = field_survey, check_for_backend(Pg))]
pub struct SurveySummary {
    pub id: Uuid,
    pub site_id: Uuid,
    pub recorder_name: String,
    pub complete: bool,
    pub survey_at: DateTime<Utc>,
}

fn default_limit() -> i64 {
    100
}

#[derive(Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct SurveyQuery {
    pub site_id: Option<Uuid>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub complete: Option<bool>,
    pub recorder: Option<String>,
    #[serde(default = "default_limit")]
    #[garde(range(min = 1, max = 1000))]
    pub limit: i64,
}

impl Default for SurveyQuery {
    fn default() -> Self {
        Self {
            site_id: None,
            after: None,
            before: None,
            complete: None,
            recorder: None,
            limit: default_limit(),
        }
    }
}

impl db::FetchByQuery for SurveySummary {
    type QueryParams = SurveyQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> error::Result<Vec<Self>> {
        let SurveyQuery {
            site_id,
            after,
            before,
            complete,
            recorder,
            limit,
        } = query;

        let mut statement = field_survey::table
            .select(SurveySummary::as_select())
            .order(field_survey::survey_at.desc())
            .limit(*limit)
            .into_boxed();

        if let Some(site_id) = site_id {
            statement = statement.filter(field_survey::site_id.eq(*site_id));
        }

        if let Some(after) = after {
            statement = statement.filter(field_survey::survey_at.ge(*after));
        }

        if let Some(before) = before {
            statement = statement.filter(field_survey::survey_at.le(*before));
        }

        if let Some(complete) = complete {
            statement = statement.filter(field_survey::complete.eq(*complete));
        }

        if let Some(recorder) = recorder {
            statement = statement.filter(field_survey::recorder_name.ilike(recorder.as_ilike()));
        }

        Ok(statement.load(db_conn).await?)
    }
}

/// A survey with the records that hang off it, as returned by the API.
#[derive(Serialize, Clone, Debug)]
pub struct SurveyBundle {
    #[serde(flatten)]
    pub survey: Survey,
    pub samples: Vec<Sample>,
    pub measurements: Vec<Measurement>,
}

impl db::FetchById for SurveyBundle {
    type Id = Uuid;

    async fn fetch_by_id(id: &Self::Id, db_conn: &mut AsyncPgConnection) -> error::Result<Self> {
        let survey = field_survey::table
            .find(id)
            .select(Survey::as_select())
            .first(db_conn)
            .await?;

        let samples = sample::for_survey(*id, db_conn).await?;

        let measurements = measurement::table
            .filter(measurement::survey_id.eq(id))
            .select(Measurement::as_select())
            .order(measurement::measured_at.asc())
            .load(db_conn)
            .await?;

        Ok(Self {
            survey,
            samples,
            measurements,
        })
    }
}
