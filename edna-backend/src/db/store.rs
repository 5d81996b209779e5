use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{field_sample, field_survey, measurement};
use uuid::Uuid;

use super::{
    Write, error,
    model::{
        BarcodeKind,
        barcode::{self, Barcode},
        measurement::{MeasurementType, NewMeasurement},
        person::{self, Person},
        project::{self, Project},
        sample::{self, FilterSample, NewSample, Sample},
        sample_type::{self, SampleType},
        site::{self, Site},
        survey::{self, NewSurvey, Survey},
    },
};

/// Everything the import reconciler and the cascade service need from
/// storage. The server hands them a [`PgStore`]; unit tests hand them the
/// in-memory store from `db::test_util`.
pub trait MetadataStore {
    async fn site_by_key(&mut self, key: &str) -> error::Result<Option<Site>>;
    async fn project_by_key(&mut self, key: &str) -> error::Result<Option<Project>>;
    async fn sample_type_by_key(&mut self, key: &str) -> error::Result<Option<SampleType>>;
    async fn person_by_email(&mut self, email: &str) -> error::Result<Option<Person>>;
    async fn measurement_types(&mut self) -> error::Result<Vec<MeasurementType>>;

    async fn survey_at(
        &mut self,
        site_id: Uuid,
        survey_at: DateTime<Utc>,
    ) -> error::Result<Option<Survey>>;
    async fn create_survey(&mut self, new: NewSurvey) -> error::Result<Survey>;
    async fn attach_project(&mut self, survey_id: Uuid, project_id: Uuid) -> error::Result<()>;

    async fn barcode_get_or_create(&mut self, code: &str) -> error::Result<Barcode>;
    async fn mark_barcode_assigned(&mut self, barcode_id: Uuid) -> error::Result<()>;

    async fn upsert_sample(&mut self, new: NewSample) -> error::Result<(Sample, bool)>;
    async fn ensure_filter_detail(&mut self, new: FilterSample) -> error::Result<bool>;

    /// Records a measurement unless an identical fact (same survey, instant,
    /// type, and value) already exists. Returns whether a row was written.
    async fn record_measurement(&mut self, new: NewMeasurement) -> error::Result<bool>;

    async fn filter_detail(&mut self, sample_id: Uuid) -> error::Result<Option<FilterSample>>;
    async fn sample_by_id(&mut self, sample_id: Uuid) -> error::Result<Option<Sample>>;
    async fn delete_sample(&mut self, sample_id: Uuid) -> error::Result<()>;
    async fn survey_sample_count(&mut self, survey_id: Uuid) -> error::Result<i64>;
    async fn delete_survey(&mut self, survey_id: Uuid) -> error::Result<()>;

    /// Opens an atomic scope covering one spreadsheet row. Scopes never nest.
    async fn begin_row(&mut self) -> error::Result<()>;
    async fn commit_row(&mut self) -> error::Result<()>;
    async fn abort_row(&mut self) -> error::Result<()>;
}

/// [`MetadataStore`] over a live Postgres connection. Row scopes are
/// savepoints, so the caller is expected to run the whole batch inside one
/// outer transaction.
pub struct PgStore<'a> {
    db_conn: &'a mut AsyncPgConnection,
}

impl<'a> PgStore<'a> {
    pub fn new(db_conn: &'a mut AsyncPgConnection) -> Self {
        Self { db_conn }
    }
}

const ROW_SAVEPOINT: &str = "import_row";

impl MetadataStore for PgStore<'_> {
    async fn site_by_key(&mut self, key: &str) -> error::Result<Option<Site>> {
        site::find_by_code_or_name(key, self.db_conn).await
    }

    async fn project_by_key(&mut self, key: &str) -> error::Result<Option<Project>> {
        project::find_by_code_or_label(key, self.db_conn).await
    }

    async fn sample_type_by_key(&mut self, key: &str) -> error::Result<Option<SampleType>> {
        sample_type::find_by_code_or_label(key, self.db_conn).await
    }

    async fn person_by_email(&mut self, email: &str) -> error::Result<Option<Person>> {
        person::find_by_email(email, self.db_conn).await
    }

    async fn measurement_types(&mut self) -> error::Result<Vec<MeasurementType>> {
        super::model::measurement::list_types(self.db_conn).await
    }

    async fn survey_at(
        &mut self,
        site_id: Uuid,
        survey_at: DateTime<Utc>,
    ) -> error::Result<Option<Survey>> {
        survey::find_at(site_id, survey_at, self.db_conn).await
    }

    async fn create_survey(&mut self, new: NewSurvey) -> error::Result<Survey> {
        new.write(self.db_conn).await
    }

    async fn attach_project(&mut self, survey_id: Uuid, project_id: Uuid) -> error::Result<()> {
        project::attach_to_survey(survey_id, project_id, self.db_conn).await
    }

    async fn barcode_get_or_create(&mut self, code: &str) -> error::Result<Barcode> {
        barcode::get_or_create(code, self.db_conn).await
    }

    async fn mark_barcode_assigned(&mut self, barcode_id: Uuid) -> error::Result<()> {
        barcode::set_kind(barcode_id, BarcodeKind::FieldSample, self.db_conn).await
    }

    async fn upsert_sample(&mut self, new: NewSample) -> error::Result<(Sample, bool)> {
        sample::upsert_by_barcode(new, self.db_conn).await
    }

    async fn ensure_filter_detail(&mut self, new: FilterSample) -> error::Result<bool> {
        sample::ensure_filter_detail(new, self.db_conn).await
    }

    async fn record_measurement(&mut self, new: NewMeasurement) -> error::Result<bool> {
        let n_inserted = diesel::insert_into(measurement::table)
            .values(&new)
            .on_conflict_do_nothing()
            .execute(self.db_conn)
            .await?;

        Ok(n_inserted > 0)
    }

    async fn filter_detail(&mut self, sample_id: Uuid) -> error::Result<Option<FilterSample>> {
        sample::find_filter_detail(sample_id, self.db_conn).await
    }

    async fn sample_by_id(&mut self, sample_id: Uuid) -> error::Result<Option<Sample>> {
        Ok(field_sample::table
            .find(sample_id)
            .select(Sample::as_select())
            .first(self.db_conn)
            .await
            .optional()?)
    }

    async fn delete_sample(&mut self, sample_id: Uuid) -> error::Result<()> {
        diesel::delete(field_sample::table.find(sample_id))
            .execute(self.db_conn)
            .await?;

        Ok(())
    }

    async fn survey_sample_count(&mut self, survey_id: Uuid) -> error::Result<i64> {
        Ok(field_sample::table
            .filter(field_sample::survey_id.eq(survey_id))
            .count()
            .get_result(self.db_conn)
            .await?)
    }

    async fn delete_survey(&mut self, survey_id: Uuid) -> error::Result<()> {
        diesel::delete(field_survey::table.find(survey_id))
            .execute(self.db_conn)
            .await?;

        Ok(())
    }

    async fn begin_row(&mut self) -> error::Result<()> {
        diesel::sql_query(format!("SAVEPOINT {ROW_SAVEPOINT}"))
            .execute(self.db_conn)
            .await?;

        Ok(())
    }

    async fn commit_row(&mut self) -> error::Result<()> {
        diesel::sql_query(format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"))
            .execute(self.db_conn)
            .await?;

        Ok(())
    }

    async fn abort_row(&mut self) -> error::Result<()> {
        diesel::sql_query(format!("ROLLBACK TO SAVEPOINT {ROW_SAVEPOINT}"))
            .execute(self.db_conn)
            .await?;
        diesel::sql_query(format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"))
            .execute(self.db_conn)
            .await?;

        Ok(())
    }
}
