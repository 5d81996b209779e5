//! Diesel table definitions shared by the backend and any tooling that talks
//! to the eDNA metadata database. Kept in lockstep with `db/migrations`.

use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    person (id) {
        id -> Uuid,
        name -> Text,
        email -> Text,
    }
}

table! {
    field_site (id) {
        id -> Uuid,
        site_code -> Text,
        location_name -> Text,
        country_code -> Nullable<Text>,
    }
}

table! {
    project (id) {
        id -> Uuid,
        code -> Text,
        label -> Text,
    }
}

table! {
    sample_type (id) {
        id -> Uuid,
        code -> Text,
        label -> Text,
    }
}

table! {
    barcode (id) {
        id -> Uuid,
        code -> Text,
        kind -> Text,
    }
}

table! {
    field_survey (id) {
        id -> Uuid,
        site_id -> Uuid,
        collected_by -> Nullable<Uuid>,
        supervisor -> Nullable<Uuid>,
        recorder_name -> Text,
        complete -> Bool,
        survey_at -> Timestamptz,
        altitude_m -> Nullable<Double>,
    }
}

table! {
    survey_project (survey_id, project_id) {
        survey_id -> Uuid,
        project_id -> Uuid,
    }
}

table! {
    field_sample (id) {
        id -> Uuid,
        survey_id -> Uuid,
        barcode_id -> Uuid,
        sample_type_id -> Uuid,
        barcode_code -> Text,
        extracted -> Bool,
        sampling_method -> Text,
    }
}

table! {
    filter_sample (sample_id) {
        sample_id -> Uuid,
        filtered_at -> Nullable<Timestamptz>,
        filter_method -> Text,
        filter_type -> Text,
        water_volume_ml -> Nullable<Double>,
        pore_size_um -> Nullable<Double>,
        filter_size_mm -> Nullable<Double>,
        saturated -> Nullable<Bool>,
        notes -> Text,
    }
}

table! {
    subcore_sample (sample_id) {
        sample_id -> Uuid,
        method -> Text,
        started_at -> Nullable<Timestamptz>,
        ended_at -> Nullable<Timestamptz>,
        core_count -> Nullable<Integer>,
        length_cm -> Nullable<Double>,
        diameter_cm -> Nullable<Double>,
        notes -> Text,
    }
}

table! {
    measurement_type (id) {
        id -> Uuid,
        code -> Text,
        name -> Text,
        unit -> Text,
    }
}

table! {
    measurement (id) {
        id -> Uuid,
        survey_id -> Uuid,
        measurement_type_id -> Uuid,
        value -> Text,
        measured_at -> Timestamptz,
        notes -> Text,
    }
}

joinable!(field_survey -> field_site (site_id));
joinable!(survey_project -> field_survey (survey_id));
joinable!(survey_project -> project (project_id));
joinable!(field_sample -> field_survey (survey_id));
joinable!(field_sample -> barcode (barcode_id));
joinable!(field_sample -> sample_type (sample_type_id));
joinable!(filter_sample -> field_sample (sample_id));
joinable!(subcore_sample -> field_sample (sample_id));
joinable!(measurement -> field_survey (survey_id));
joinable!(measurement -> measurement_type (measurement_type_id));

allow_tables_to_appear_in_same_query!(
    person,
    field_site,
    project,
    sample_type,
    barcode,
    field_survey,
    survey_project,
    field_sample,
    filter_sample,
    subcore_sample,
    measurement_type,
    measurement,
);
