pub mod cascade;
pub mod error;
pub mod model;
pub mod seed_data;
pub mod store;
#[cfg(test)]
pub mod test_util;
mod util;

use diesel_async::AsyncPgConnection;

pub trait Write {
    type Returns;

    fn write(
        self,
        db_conn: &mut AsyncPgConnection,
    ) -> impl Future<Output = error::Result<Self::Returns>> + Send;
}

pub trait FetchById: Sized {
    type Id;

    fn fetch_by_id(
        id: &Self::Id,
        db_conn: &mut AsyncPgConnection,
    ) -> impl Future<Output = error::Result<Self>> + Send;
}

pub trait FetchByQuery: Sized {
    type QueryParams;

    fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> impl Future<Output = error::Result<Vec<Self>>> + Send;
}
