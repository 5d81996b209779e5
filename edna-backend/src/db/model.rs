use std::io::Write as _;
use std::str::FromStr;

use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::Pg,
    serialize::{self, IsNull, Output, ToSql},
    sql_types,
};
use serde::{Deserialize, Serialize};
use valuable::Valuable;

pub mod barcode;
pub mod measurement;
pub mod person;
pub mod project;
pub mod sample;
pub mod sample_type;
pub mod site;
pub mod survey;

// Free-text vocabulary codes are stored as plain text columns; unrecognized
// values decode to the `Unknown` variant instead of failing the whole query.
trait DbEnum: FromStr + Default + Copy + Into<&'static str> {
    fn from_sql_inner(bytes: <Pg as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<sql_types::Text, Pg>>::from_sql(bytes)?;

        Ok(Self::from_str(&raw).unwrap_or_default())
    }

    fn to_sql_inner<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let as_str: &'static str = (*self).into();
        out.write_all(as_str.as_bytes())?;

        Ok(IsNull::No)
    }
}

macro_rules! impl_db_enum {
    ($enum_type:ident) => {
        impl DbEnum for $enum_type {}

        impl FromSql<sql_types::Text, Pg> for $enum_type {
            fn from_sql(
                bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
            ) -> deserialize::Result<Self> {
                Self::from_sql_inner(bytes)
            }
        }

        impl ToSql<sql_types::Text, Pg> for $enum_type {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                self.to_sql_inner(out)
            }
        }
    };
}

#[derive(
    Deserialize,
    Serialize,
    Default,
    FromSqlRow,
    AsExpression,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Valuable,
    strum::IntoStaticStr,
    strum::EnumString,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SamplingMethod {
    Grab,
    Pump,
    Niskin,
    Core,
    #[default]
    Unknown,
}
impl_db_enum!(SamplingMethod);

#[derive(
    Deserialize,
    Serialize,
    Default,
    FromSqlRow,
    AsExpression,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Valuable,
    strum::IntoStaticStr,
    strum::EnumString,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterMethod {
    Gravity,
    Vacuum,
    Peristaltic,
    Other,
    #[default]
    Unknown,
}
impl_db_enum!(FilterMethod);

#[derive(
    Deserialize,
    Serialize,
    Default,
    FromSqlRow,
    AsExpression,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Valuable,
    strum::IntoStaticStr,
    strum::EnumString,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterType {
    CelluloseNitrate,
    GlassFiber,
    Nylon,
    Supor,
    Other,
    #[default]
    Unknown,
}
impl_db_enum!(FilterType);

#[derive(
    Deserialize,
    Serialize,
    Default,
    FromSqlRow,
    AsExpression,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Valuable,
    strum::IntoStaticStr,
    strum::EnumString,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BarcodeKind {
    #[default]
    Unassigned,
    FieldSample,
    Extraction,
}
impl_db_enum!(BarcodeKind);
