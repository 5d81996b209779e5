use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::{field_site, measurement_type, person, project, sample_type};
use garde::Validate;
use serde::Deserialize;

use super::{
    error,
    model::{
        measurement::NewMeasurementType, person::NewPerson, project::NewProject,
        sample_type::NewSampleType, site::NewSite,
    },
};

/// Reference vocabulary loaded at startup from the TOML file named in config.
/// Every insert tolerates existing rows, so re-seeding on every boot is safe.
#[derive(Deserialize, Validate, Default)]
#[garde(allow_unvalidated)]
pub struct SeedData {
    #[serde(default)]
    #[garde(dive)]
    sites: Vec<NewSite>,
    #[serde(default)]
    #[garde(dive)]
    projects: Vec<NewProject>,
    #[serde(default)]
    #[garde(dive)]
    people: Vec<NewPerson>,
    #[serde(default)]
    #[garde(dive)]
    sample_types: Vec<NewSampleType>,
    #[serde(default)]
    #[garde(dive)]
    measurement_types: Vec<NewMeasurementType>,
}

impl SeedData {
    pub async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<()> {
        let Self {
            sites,
            projects,
            people,
            sample_types,
            measurement_types,
        } = self;

        diesel::insert_into(field_site::table)
            .values(&sites)
            .on_conflict_do_nothing()
            .execute(db_conn)
            .await?;

        diesel::insert_into(project::table)
            .values(&projects)
            .on_conflict_do_nothing()
            .execute(db_conn)
            .await?;

        diesel::insert_into(person::table)
            .values(&people)
            .on_conflict_do_nothing()
            .execute(db_conn)
            .await?;

        diesel::insert_into(sample_type::table)
            .values(&sample_types)
            .on_conflict_do_nothing()
            .execute(db_conn)
            .await?;

        diesel::insert_into(measurement_type::table)
            .values(&measurement_types)
            .on_conflict_do_nothing()
            .execute(db_conn)
            .await?;

        Ok(())
    }
}
