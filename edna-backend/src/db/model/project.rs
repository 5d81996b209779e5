use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{project, survey_project};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, error};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = project, check_for_backend(Pg))]
pub struct Project {
    pub id: Uuid,
    pub code: String,
    pub label: String,
}

#[derive(Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = project, check_for_backend(Pg))]
#[garde(allow_unvalidated)]
pub struct NewProject {
    #[garde(length(min = 1, max = 32))]
    pub code: String,
    #[garde(length(min = 1))]
    pub label: String,
}

impl db::Write for NewProject {
    type Returns = Project;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        Ok(diesel::insert_into(project::table)
            .values(&self)
            .returning(Project::as_returning())
            .get_result(db_conn)
            .await?)
    }
}

pub async fn find_by_code_or_label(
    key: &str,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Option<Project>> {
    Ok(project::table
        .filter(project::code.eq(key).or(project::label.eq(key)))
        .select(Project::as_select())
        .first(db_conn)
        .await
        .optional()?)
}

pub async fn for_survey(
    survey_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Vec<Project>> {
    Ok(survey_project::table
        .inner_join(project::table)
        .filter(survey_project::survey_id.eq(survey_id))
        .select(Project::as_select())
        .order(project::code.asc())
        .load(db_conn)
        .await?)
}

/// Idempotent membership insert into the survey↔project mapping table.
pub async fn attach_to_survey(
    survey_id: Uuid,
    project_id: Uuid,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<()> {
    diesel::insert_into(survey_project::table)
        .values((
            survey_project::survey_id.eq(survey_id),
            survey_project::project_id.eq(project_id),
        ))
        .on_conflict_do_nothing()
        .execute(db_conn)
        .await?;

    Ok(())
}
