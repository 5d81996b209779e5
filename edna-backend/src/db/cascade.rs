use serde::Serialize;
use uuid::Uuid;

use super::{error, store::MetadataStore};

/// What an explicit filter-sample deletion actually removed.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CascadeReport {
    pub survey_id: Option<Uuid>,
    pub sample_deleted: bool,
    pub survey_deleted: bool,
}

/// Deletes the filter detail keyed by `sample_id` together with its owning
/// sample, then removes the sample's survey if no other sample references it.
/// The survey's measurements and project links go with it.
///
/// Runs against whatever atomic scope the caller established; any storage
/// error propagates so the caller rolls the whole operation back.
pub async fn delete_filter_sample<S: MetadataStore>(
    store: &mut S,
    sample_id: Uuid,
) -> error::Result<CascadeReport> {
    if store.filter_detail(sample_id).await?.is_none() {
        return Err(error::Error::RecordNotFound);
    }

    let Some(sample) = store.sample_by_id(sample_id).await? else {
        // Detail row with no sample only happens mid-cleanup; treat the work
        // as already done.
        return Ok(CascadeReport {
            survey_id: None,
            sample_deleted: false,
            survey_deleted: false,
        });
    };

    let survey_id = sample.survey_id;

    store.delete_sample(sample_id).await?;

    let survey_deleted = if store.survey_sample_count(survey_id).await? == 0 {
        store.delete_survey(survey_id).await?;
        true
    } else {
        false
    };

    Ok(CascadeReport {
        survey_id: Some(survey_id),
        sample_deleted: true,
        survey_deleted,
    })
}
