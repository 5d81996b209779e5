use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::sample_type;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, error};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = sample_type, check_for_backend(Pg))]
pub struct SampleType {
    pub id: Uuid,
    pub code: String,
    pub label: String,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = sample_type, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewSampleType {
    #[garde(length(min = 1, max = 32))]
    pub code: String,
    #[garde(length(min = 1))]
    pub label: String,
}

impl db::Write for NewSampleType {
    type Returns = SampleType;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(sample_type::table)
            .values(&self)
            .returning(SampleType::as_returning())
            .get_result(db_conn)
            .await?)
    }
}

pub async fn find_by_code_or_label(
    key: &str,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<SampleType>> {
    Ok(sample_type::table
        .filter(sample_type::code.eq(key).or(sample_type::label.eq(key)))
        .select(SampleType::as_select())
        .first(db_conn)
        .await
        .optional()?)
}

pub async fn list_all(db_conn: &mut AsyncPgConnection) -> error::Result<Vec<SampleType>> {
    Ok(sample_type::table
        .select(SampleType::as_select())
        .order(sample_type::code.asc())
        .load(db_conn)
        .await?)
}
