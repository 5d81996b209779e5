use std::{collections::HashSet, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use heck::ToSnakeCase;

use super::{
    ImportError, ImportKind, ImportReport, RowError, TabularFormat,
    decode::{self, Row},
    vocabulary::{Vocabulary, is_placeholder},
};
use crate::db::{
    error,
    model::{
        measurement::NewMeasurement,
        sample::{FilterSample, NewSample},
        survey::NewSurvey,
    },
    store::MetadataStore,
};

mod columns {
    pub const SITE: &str = "site_id";
    pub const SURVEY_DATE: &str = "survey_date";
    pub const START_TIME: &str = "survey_start_time";
    pub const END_TIME: &str = "survey_end_time";
    pub const RECORDER: &str = "recorder_name";
    pub const COLLECTOR_EMAIL: &str = "collector_email";
    pub const SUPERVISOR_EMAIL: &str = "supervisor_email";
    pub const PROJECT: &str = "project";
    pub const SAMPLE_TYPE: &str = "sample_type";
    pub const BARCODE: &str = "sample_barcode";
    pub const SAMPLE_CODE: &str = "sample_code";
    pub const SAMPLE_ID: &str = "sample_id";
    pub const SAMPLING_METHOD: &str = "sampling_method";
    pub const ALTITUDE: &str = "altitude_m";
    pub const FILTER_DATE: &str = "filter_date";
    pub const FILTER_TIME: &str = "filter_time";
    pub const FILTER_METHOD: &str = "filter_method";
    pub const FILTER_TYPE: &str = "filter_type";
    pub const WATER_VOLUME: &str = "water_volume_ml";
    pub const PORE_SIZE: &str = "pore_size_um";
    pub const FILTER_SIZE: &str = "filter_size_mm";
    pub const SATURATED: &str = "filter_saturated";
    pub const NOTES: &str = "notes";

    /// Columns with fixed meanings. Everything else is matched against the
    /// measurement vocabulary; a vocabulary entry spelled like one of these
    /// headers is shadowed by the fixed meaning.
    pub const FIXED: &[&str] = &[
        SITE,
        SURVEY_DATE,
        START_TIME,
        END_TIME,
        RECORDER,
        COLLECTOR_EMAIL,
        SUPERVISOR_EMAIL,
        PROJECT,
        SAMPLE_TYPE,
        BARCODE,
        SAMPLE_CODE,
        SAMPLE_ID,
        SAMPLING_METHOD,
        ALTITUDE,
        FILTER_DATE,
        FILTER_TIME,
        FILTER_METHOD,
        FILTER_TYPE,
        WATER_VOLUME,
        PORE_SIZE,
        FILTER_SIZE,
        SATURATED,
        NOTES,
    ];
}

/// Runs one upload end to end. Rows are strictly sequential (row order
/// decides survey create-vs-reuse) and each runs in its own atomic scope, so
/// one bad row never takes its neighbors down. Only a decode failure or a
/// file above `max_rows` aborts the call.
pub async fn import_batch<S: MetadataStore>(
    store: &mut S,
    data: &[u8],
    format: TabularFormat,
    kind: ImportKind,
    max_rows: usize,
) -> Result<ImportReport, ImportError> {
    let rows = decode::decode(data, format)?;

    if rows.len() > max_rows {
        return Err(ImportError::TooManyRows {
            n_rows: rows.len(),
            max_rows,
        });
    }

    let vocabulary = Vocabulary::new(store.measurement_types().await?);

    let mut report = ImportReport::default();

    for row in &rows {
        store.begin_row().await?;

        match process_row(store, row, kind, &vocabulary).await {
            Ok(outcome) => {
                store.commit_row().await?;

                match outcome {
                    RowOutcome::Created => report.created += 1,
                    RowOutcome::Updated => report.updated += 1,
                    RowOutcome::Skipped => report.skipped += 1,
                }
            }
            Err(problem) => {
                store.abort_row().await?;

                report.errors.push(RowError {
                    row: row.number,
                    message: problem.to_string(),
                });
            }
        }
    }

    Ok(report)
}

enum RowOutcome {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, thiserror::Error)]
enum RowProblem {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] error::Error),
}

async fn process_row<S: MetadataStore>(
    store: &mut S,
    row: &Row,
    kind: ImportKind,
    vocabulary: &Vocabulary,
) -> Result<RowOutcome, RowProblem> {
    if row.is_blank() {
        return Ok(RowOutcome::Skipped);
    }

    let site_key = row.get(columns::SITE);
    let date = row.get(columns::SURVEY_DATE);
    let barcode_code = row.get(columns::BARCODE);

    // A row missing any of the three anchor fields is unusable but not worth
    // failing the file over.
    if site_key.is_empty() || date.is_empty() || barcode_code.is_empty() {
        return Ok(RowOutcome::Skipped);
    }

    let site = store
        .site_by_key(site_key)
        .await?
        .ok_or_else(|| RowProblem::Invalid(format!("unknown site {site_key:?}")))?;

    let survey_at = parse_survey_datetime(date, row.get(columns::START_TIME))
        .map_err(RowProblem::Invalid)?;

    let (survey, survey_created) = match store.survey_at(site.id, survey_at).await? {
        Some(existing) => (existing, false),
        None => {
            let collected_by = resolve_person(store, row.get(columns::COLLECTOR_EMAIL)).await?;
            let supervisor = resolve_person(store, row.get(columns::SUPERVISOR_EMAIL)).await?;

            let new_survey = NewSurvey {
                site_id: site.id,
                collected_by,
                supervisor,
                recorder_name: row.get(columns::RECORDER).to_string(),
                complete: !row.get(columns::END_TIME).is_empty(),
                survey_at,
                altitude_m: row.get(columns::ALTITUDE).parse().ok(),
            };

            (store.create_survey(new_survey).await?, true)
        }
    };

    // Unknown project labels are tolerated; the survey still imports.
    let project_key = row.get(columns::PROJECT);
    if !project_key.is_empty() {
        if let Some(project) = store.project_by_key(project_key).await? {
            store.attach_project(survey.id, project.id).await?;
        }
    }

    let sample_type_key = row.get(columns::SAMPLE_TYPE);
    let sample_type = store
        .sample_type_by_key(sample_type_key)
        .await?
        .ok_or_else(|| RowProblem::Invalid(format!("unknown sample type {sample_type_key:?}")))?;

    let barcode = store.barcode_get_or_create(barcode_code).await?;
    store.mark_barcode_assigned(barcode.id).await?;

    let display_code = [row.get(columns::SAMPLE_CODE), row.get(columns::SAMPLE_ID)]
        .into_iter()
        .find(|c| !c.is_empty())
        .unwrap_or(barcode_code);

    let (sample, sample_created) = store
        .upsert_sample(NewSample {
            survey_id: survey.id,
            barcode_id: barcode.id,
            sample_type_id: sample_type.id,
            barcode_code: display_code.to_string(),
            extracted: false,
            sampling_method: parse_variant(row.get(columns::SAMPLING_METHOD)),
        })
        .await?;

    if kind == ImportKind::FilterSamples {
        let filtered_at = match row.get(columns::FILTER_DATE) {
            "" => None,
            filter_date => Some(
                parse_survey_datetime(filter_date, row.get(columns::FILTER_TIME))
                    .map_err(RowProblem::Invalid)?,
            ),
        };

        store
            .ensure_filter_detail(FilterSample {
                sample_id: sample.id,
                filtered_at,
                filter_method: parse_variant(row.get(columns::FILTER_METHOD)),
                filter_type: parse_variant(row.get(columns::FILTER_TYPE)),
                water_volume_ml: row.get(columns::WATER_VOLUME).parse().ok(),
                pore_size_um: row.get(columns::PORE_SIZE).parse().ok(),
                filter_size_mm: row.get(columns::FILTER_SIZE).parse().ok(),
                saturated: parse_flag(row.get(columns::SATURATED)),
                notes: row.get(columns::NOTES).to_string(),
            })
            .await?;
    }

    // Measurements describe the survey event, so a reused survey already has
    // them from the row that created it.
    if survey_created {
        // One reading per type: when two columns are spellings of the same
        // type, the leftmost wins.
        let mut recorded = HashSet::new();

        for (key, value) in row.columns() {
            if columns::FIXED.contains(&key) || is_placeholder(value) {
                continue;
            }

            let Some(measurement_type) = vocabulary.resolve(key) else {
                continue;
            };
            if !recorded.insert(measurement_type.id) {
                continue;
            }

            store
                .record_measurement(NewMeasurement {
                    survey_id: survey.id,
                    measurement_type_id: measurement_type.id,
                    value: value.to_string(),
                    measured_at: survey_at,
                    notes: String::new(),
                })
                .await?;
        }
    }

    Ok(if sample_created {
        RowOutcome::Created
    } else {
        RowOutcome::Updated
    })
}

async fn resolve_person<S: MetadataStore>(
    store: &mut S,
    email: &str,
) -> error::Result<Option<uuid::Uuid>> {
    if email.is_empty() {
        return Ok(None);
    }

    Ok(store.person_by_email(email).await?.map(|p| p.id))
}

/// Field crews write enum cells every which way ("Cellulose Nitrate",
/// "cellulose_nitrate", "GRAB"); anything unrecognized lands on the enum's
/// `Unknown` default rather than failing the row.
fn parse_variant<T: FromStr + Default>(cell: &str) -> T {
    T::from_str(&cell.to_snake_case()).unwrap_or_default()
}

fn parse_flag(cell: &str) -> Option<bool> {
    match cell.to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// The timestamp that keys survey reuse. The date cell is mandatory and may
/// already carry a time (spreadsheet datetime cells); an empty time cell
/// means midnight. Unparsable cells fail the row.
fn parse_survey_datetime(date: &str, time: &str) -> Result<DateTime<Utc>, String> {
    let base = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| parse_date(date).map(|d| d.and_time(NaiveTime::MIN)))
        .ok_or_else(|| format!("unparsable date {date:?}"))?;

    let datetime = if time.is_empty() {
        base
    } else {
        let time = parse_time(time).ok_or_else(|| format!("unparsable time {time:?}"))?;
        base.date().and_time(time)
    };

    Ok(datetime.and_utc())
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(cell, format).ok())
}

fn parse_time(cell: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(cell, format).ok())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use uuid::Uuid;

    use super::{import_batch, parse_survey_datetime};
    use crate::{
        db::{
            model::{BarcodeKind, measurement::MeasurementType},
            test_util::MemoryStore,
        },
        import::{ImportError, ImportKind, TabularFormat},
    };

    const MAX_ROWS: usize = 10_000;

    async fn import_csv(store: &mut MemoryStore, kind: ImportKind, csv: &str) -> crate::import::ImportReport {
        import_batch(store, csv.as_bytes(), TabularFormat::Csv, kind, MAX_ROWS)
            .await
            .unwrap()
    }

    const FILTER_HEADER: &str = "site_id,survey_date,survey_start_time,survey_end_time,recorder_name,project,sample_type,sample_barcode,sample_code,sampling_method,filter_method,filter_type,water_volume_ml,filter_saturated,water_temperature,env_ph";

    fn filter_csv(rows: &[&str]) -> String {
        let mut out = FILTER_HEADER.to_string();
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[tokio::test]
    async fn filter_row_creates_the_whole_chain() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,09:30,11:00,Jo,baseline,ew,eDNA-0001,S-001,grab,Vacuum,Cellulose Nitrate,950,yes,18.2,7.9",
        ]);

        let report = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert_eq!((report.created, report.updated, report.skipped), (1, 0, 0));
        assert!(report.errors.is_empty());

        let state = &store.state;
        assert_eq!(state.surveys.len(), 1);
        assert_eq!(state.samples.len(), 1);
        assert_eq!(state.filter_details.len(), 1);
        assert_eq!(state.measurements.len(), 2);

        let survey = &state.surveys[0];
        assert_eq!(
            survey.survey_at,
            Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap()
        );
        assert!(survey.complete);
        assert_eq!(state.survey_projects.len(), 1);

        let sample = &state.samples[0];
        assert_eq!(sample.barcode_code, "S-001");

        let barcode = state.barcodes.iter().find(|b| b.code == "eDNA-0001").unwrap();
        assert_eq!(barcode.kind, BarcodeKind::FieldSample);

        let detail = &state.filter_details[0];
        assert_eq!(detail.water_volume_ml, Some(950.0));
        assert_eq!(detail.saturated, Some(true));
    }

    #[tokio::test]
    async fn reimporting_the_same_file_is_idempotent() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,09:30,11:00,Jo,baseline,ew,eDNA-0001,,grab,vacuum,supor,950,no,18.2,7.9",
        ]);

        let first = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;
        let second = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert_eq!((first.created, first.updated), (1, 0));
        assert_eq!((second.created, second.updated), (0, 1));

        let state = &store.state;
        assert_eq!(state.surveys.len(), 1);
        assert_eq!(state.samples.len(), 1);
        assert_eq!(state.filter_details.len(), 1);
        assert_eq!(state.measurements.len(), 2);
    }

    #[tokio::test]
    async fn rows_at_the_same_site_and_instant_share_a_survey() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,09:30,,Jo,,ew,eDNA-0001,,grab,,,,,18.2,",
            "PNT-01,2024-06-10,09:30,,Jo,,ew,eDNA-0002,,grab,,,,,18.2,",
            "BIG-02,2024-06-10,09:30,,Jo,,ew,eDNA-0003,,grab,,,,,17.0,",
        ]);

        let report = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert_eq!(report.created, 3);
        assert_eq!(store.state.surveys.len(), 2);
        // The second row reused the first survey, so its identical reading
        // was not recorded twice.
        assert_eq!(store.state.measurements.len(), 2);
    }

    #[tokio::test]
    async fn bad_rows_fail_alone_with_their_spreadsheet_numbers() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "ATLANTIS,2024-06-10,,,,,ew,eDNA-0001,,,,,,,,",
            "PNT-01,not-a-date,,,,,ew,eDNA-0002,,,,,,,,",
            "PNT-01,2024-06-10,,,,,coral,eDNA-0003,,,,,,,,",
            "PNT-01,2024-06-11,,,,,ew,eDNA-0004,,,,,,,,",
        ]);

        let report = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert_eq!((report.created, report.updated, report.skipped), (1, 0, 0));

        let rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert!(report.errors[0].message.contains("ATLANTIS"));
        assert!(report.errors[1].message.contains("not-a-date"));
        assert!(report.errors[2].message.contains("coral"));

        // Failed rows left nothing behind.
        assert_eq!(store.state.surveys.len(), 1);
        assert_eq!(store.state.samples.len(), 1);
    }

    #[tokio::test]
    async fn rows_missing_anchor_fields_are_skipped() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            ",2024-06-10,,,,,ew,eDNA-0001,,,,,,,,",
            "PNT-01,,,,,,ew,eDNA-0002,,,,,,,,",
            "PNT-01,2024-06-10,,,,,ew,,,,,,,,,",
            ",,,,,,,,,,,,,,,",
        ]);

        let report = import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert_eq!((report.created, report.skipped), (0, 4));
        assert!(report.errors.is_empty());
        assert!(store.state.surveys.is_empty());
    }

    #[tokio::test]
    async fn field_variant_writes_no_filter_detail() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,09:30,,Jo,,ss,eDNA-0001,,core,,,,,18.2,7.9",
        ]);

        let report = import_csv(&mut store, ImportKind::FieldSamples, &csv).await;

        assert_eq!(report.created, 1);
        assert_eq!(store.state.samples.len(), 1);
        assert!(store.state.filter_details.is_empty());
    }

    #[tokio::test]
    async fn duplicate_spellings_of_a_type_record_the_leftmost_reading() {
        let mut store = MemoryStore::with_reference_data();
        let csv = "site_id,survey_date,sample_type,sample_barcode,water_temp,Water Temperature\n\
                   PNT-01,2024-06-10,ew,eDNA-0001,18.2,19.9\n";

        let report = import_csv(&mut store, ImportKind::FilterSamples, csv).await;

        assert!(report.errors.is_empty());
        assert_eq!(store.state.measurements.len(), 1);
        assert_eq!(store.state.measurements[0].value, "18.2");
    }

    #[tokio::test]
    async fn fixed_columns_shadow_identically_spelled_vocabulary() {
        let mut store = MemoryStore::with_reference_data();
        store.state.measurement_types.push(MeasurementType {
            id: Uuid::now_v7(),
            code: "notes".to_string(),
            name: "Field Notes".to_string(),
            unit: String::new(),
        });
        let csv = "site_id,survey_date,sample_type,sample_barcode,notes\n\
                   PNT-01,2024-06-10,ew,eDNA-0001,rough seas\n";

        let report = import_csv(&mut store, ImportKind::FilterSamples, csv).await;

        assert!(report.errors.is_empty());
        assert!(store.state.measurements.is_empty());
    }

    #[tokio::test]
    async fn placeholder_readings_are_not_recorded() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,,,,,ew,eDNA-0001,,,,,,,NA,n/a",
        ]);

        import_csv(&mut store, ImportKind::FilterSamples, &csv).await;

        assert!(store.state.measurements.is_empty());
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected_outright() {
        let mut store = MemoryStore::with_reference_data();
        let csv = filter_csv(&[
            "PNT-01,2024-06-10,,,,,ew,eDNA-0001,,,,,,,,",
            "PNT-01,2024-06-11,,,,,ew,eDNA-0002,,,,,,,,",
        ]);

        let result = import_batch(
            &mut store,
            csv.as_bytes(),
            TabularFormat::Csv,
            ImportKind::FilterSamples,
            1,
        )
        .await;

        assert!(matches!(
            result,
            Err(ImportError::TooManyRows {
                n_rows: 2,
                max_rows: 1
            })
        ));
        assert!(store.state.surveys.is_empty());
    }

    #[rstest]
    #[case("2024-06-10", "", Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap())]
    #[case("2024-06-10", "14:05", Utc.with_ymd_and_hms(2024, 6, 10, 14, 5, 0).unwrap())]
    #[case("06/10/2024", "2:05 PM", Utc.with_ymd_and_hms(2024, 6, 10, 14, 5, 0).unwrap())]
    #[case(
        "2024-06-10",
        "01:10:00 PM",
        Utc.with_ymd_and_hms(2024, 6, 10, 13, 10, 0).unwrap()
    )]
    #[case(
        "2024-06-10 09:30:00",
        "",
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap()
    )]
    fn accepted_datetime_spellings(
        #[case] date: &str,
        #[case] time: &str,
        #[case] expected: chrono::DateTime<Utc>,
    ) {
        assert_eq!(parse_survey_datetime(date, time), Ok(expected));
    }

    #[rstest]
    #[case("10-06-2024", "")]
    #[case("2024-06-10", "half past nine")]
    #[case("June 10th", "")]
    fn rejected_datetime_spellings(#[case] date: &str, #[case] time: &str) {
        assert!(parse_survey_datetime(date, time).is_err());
    }
}
