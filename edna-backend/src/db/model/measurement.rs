use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{measurement, measurement_type};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::error;

/// One entry of the environmental-measurement vocabulary. The import
/// pipeline matches spreadsheet columns against whatever rows exist here at
/// batch time; nothing about the recognized columns is hardcoded.
#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = measurement_type, check_for_backend(Pg))]
pub struct MeasurementType {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = measurement_type, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewMeasurementType {
    #[garde(length(min = 1, max = 64))]
    pub code: String,
    #[garde(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub unit: String,
}

pub async fn list_types(db_conn: &mut AsyncPgConnection) -> error::Result<Vec<MeasurementType>> {
    Ok(measurement_type::table
        .select(MeasurementType::as_select())
        .order(measurement_type::code.asc())
        .load(db_conn)
        .await?)
}

pub async fn with_types_for_survey(
    survey_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Vec<(Measurement, MeasurementType)>> {
    Ok(measurement::table
        .inner_join(measurement_type::table)
        .filter(measurement::survey_id.eq(survey_id))
        .select((Measurement::as_select(), MeasurementType::as_select()))
        .order(measurement::measured_at.asc())
        .load(db_conn)
        .await?)
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = measurement, check_for_backend(Pg))]
pub struct Measurement {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub measurement_type_id: Uuid,
    pub value: String,
    pub measured_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Insertable, Clone)]
#[diesel(table_name = measurement, check_for_backend(Pg))]
pub struct NewMeasurement {
    pub survey_id: Uuid,
    pub measurement_type_id: Uuid,
    pub value: String,
    pub measured_at: DateTime<Utc>,
    pub notes: String,
}
