use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{field_sample, filter_sample, subcore_sample};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self, error,
    model::{FilterMethod, FilterType, SamplingMethod},
};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = field_sample, check_for_backend(Pg))]
pub struct Sample {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub barcode_id: Uuid,
    pub sample_type_id: Uuid,
    pub barcode_code: String,
    pub extracted: bool,
    pub sampling_method: SamplingMethod,
}

#[derive(Insertable, Deserialize, Clone)]
#[diesel(table_name = field_sample, check_for_backend(Pg))]
pub struct NewSample {
    pub survey_id: Uuid,
    pub barcode_id: Uuid,
    pub sample_type_id: Uuid,
    pub barcode_code: String,
    pub extracted: bool,
    pub sampling_method: SamplingMethod,
}

/// A barcode labels at most one sample, so the barcode is the upsert key.
/// Returns the sample and whether it was newly created.
pub async fn upsert_by_barcode(
    new: NewSample,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<(Sample, bool)> {
    let existing = field_sample::table
        .filter(field_sample::barcode_id.eq(new.barcode_id))
        .select(Sample::as_select())
        .first(db_conn)
        .await
        .optional()?;

    let Some(found) = existing else {
        let inserted = diesel::insert_into(field_sample::table)
            .values(&new)
            .returning(Sample::as_returning())
            .get_result(db_conn)
            .await?;

        return Ok((inserted, true));
    };

    let updated = diesel::update(field_sample::table.find(found.id))
        .set((
            field_sample::survey_id.eq(new.survey_id),
            field_sample::sample_type_id.eq(new.sample_type_id),
            field_sample::barcode_code.eq(&new.barcode_code),
            field_sample::extracted.eq(new.extracted),
            field_sample::sampling_method.eq(new.sampling_method),
        ))
        .returning(Sample::as_returning())
        .get_result(db_conn)
        .await?;

    Ok((updated, false))
}

pub async fn for_survey(
    survey_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Vec<Sample>> {
    Ok(field_sample::table
        .filter(field_sample::survey_id.eq(survey_id))
        .select(Sample::as_select())
        .order(field_sample::barcode_code.asc())
        .load(db_conn)
        .await?)
}

/// Filter-processing detail, keyed 1:1 by its owning sample.
#[derive(
    Queryable, Selectable, Insertable, Serialize, Deserialize, Validate, Clone, Debug,
)]
#[diesel(table_name = filter_sample, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct FilterSample {
    pub sample_id: Uuid,
    pub filtered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filter_method: FilterMethod,
    #[serde(default)]
    pub filter_type: FilterType,
    #[garde(range(min = 0.0))]
    pub water_volume_ml: Option<f64>,
    #[garde(range(min = 0.0))]
    pub pore_size_um: Option<f64>,
    #[garde(range(min = 0.0))]
    pub filter_size_mm: Option<f64>,
    pub saturated: Option<bool>,
    #[serde(default)]
    pub notes: String,
}

/// Get-or-create so re-imports of the same sheet are idempotent. Returns
/// whether a new detail row was written.
pub async fn ensure_filter_detail(
    new: FilterSample,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<bool> {
    let exists = filter_sample::table
        .find(new.sample_id)
        .select(filter_sample::sample_id)
        .first::<Uuid>(db_conn)
        .await
        .optional()?;

    if exists.is_some() {
        return Ok(false);
    }

    diesel::insert_into(filter_sample::table)
        .values(&new)
        .execute(db_conn)
        .await?;

    Ok(true)
}

pub async fn find_filter_detail(
    sample_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<FilterSample>> {
    Ok(filter_sample::table
        .find(sample_id)
        .select(FilterSample::as_select())
        .first(db_conn)
        .await
        .optional()?)
}

/// Sub-core (sediment) processing detail, keyed 1:1 by its owning sample.
#[derive(
    Queryable, Selectable, Insertable, Serialize, Deserialize, Validate, Clone, Debug,
)]
#[diesel(table_name = subcore_sample, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct SubCoreSample {
    pub sample_id: Uuid,
    #[serde(default)]
    pub method: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[garde(range(min = 1))]
    pub core_count: Option<i32>,
    #[garde(range(min = 0.0))]
    pub length_cm: Option<f64>,
    #[garde(range(min = 0.0))]
    pub diameter_cm: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

impl db::Write for SubCoreSample {
    type Returns = SubCoreSample;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(subcore_sample::table)
            .values(&self)
            .returning(SubCoreSample::as_returning())
            .get_result(db_conn)
            .await?)
    }
}
