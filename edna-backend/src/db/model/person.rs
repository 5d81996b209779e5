use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::person;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, error};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = person, check_for_backend(Pg))]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = person, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewPerson {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(email)]
    pub email: String,
}

impl db::Write for NewPerson {
    type Returns = Person;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(person::table)
            .values(&self)
            .returning(Person::as_returning())
            .get_result(db_conn)
            .await?)
    }
}

pub async fn find_by_email(
    email: &str,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<Person>> {
    Ok(person::table
        .filter(person::email.eq(email))
        .select(Person::as_select())
        .first(db_conn)
        .await
        .optional()?)
}
