use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use edna_schema::barcode;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{error, model::BarcodeKind};

/// A pre-issued physical label. Labels exist before the sample they end up
/// on; linking one to a field sample flips its `kind`.
#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug)]
#[diesel(table_name = barcode, check_for_backend(Pg))]
pub struct Barcode {
    pub id: Uuid,
    pub code: String,
    pub kind: BarcodeKind,
}

pub async fn get_or_create(
    code: &str,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<Barcode> {
    let existing = barcode::table
        .filter(barcode::code.eq(code))
        .select(Barcode::as_select())
        .first(db_conn)
        .await
        .optional()?;

    if let Some(found) = existing {
        return Ok(found);
    }

    Ok(diesel::insert_into(barcode::table)
        .values((
            barcode::code.eq(code),
            barcode::kind.eq(BarcodeKind::Unassigned),
        ))
        .returning(Barcode::as_returning())
        .get_result(db_conn)
        .await?)
}

pub async fn set_kind(
    id: Uuid,
    kind: BarcodeKind,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<()> {
    diesel::update(barcode::table.find(id))
        .set(barcode::kind.eq(kind))
        .execute(db_conn)
        .await?;

    Ok(())
}
