use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::field_site;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, error};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = field_site, check_for_backend(Pg))]
pub struct Site {
    pub id: Uuid,
    pub site_code: String,
    pub location_name: String,
    pub country_code: Option<String>,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = field_site, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewSite {
    #[garde(length(min = 1, max = 32))]
    pub site_code: String,
    #[garde(length(min = 1))]
    pub location_name: String,
    pub country_code: Option<String>,
}

impl db::Write for NewSite {
    type Returns = Site;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(field_site::table)
            .values(&self)
            .returning(Site::as_returning())
            .get_result(db_conn)
            .await?)
    }
}

impl db::FetchById for Site {
    type Id = Uuid;

    async fn fetch_by_id(id: &Self::Id, db_conn: &mut AsyncPgConnection) -> error::Result<Self> {
        Ok(field_site::table
            .find(id)
            .select(Site::as_select())
            .first(db_conn)
            .await?)
    }
}

/// Imports identify a site by either its short code or its free-text
/// location name; both are matched exactly.
pub async fn find_by_code_or_name(
    key: &str,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<Site>> {
    Ok(field_site::table
        .filter(
            field_site::site_code
                .eq(key)
                .or(field_site::location_name.eq(key)),
        )
        .select(Site::as_select())
        .first(db_conn)
        .await
        .optional()?)
}
