use std::io::{Cursor, Write};

use serde::Serialize;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use super::SurveyExport;
use crate::db::model::SamplingMethod;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const METAGENOME_TAXON_ID: &str = "256318";
const CHECKLIST: &str = "ERC000024";
const NOT_PROVIDED: &str = "not provided";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to serialize ENA XML: {0}")]
    Xml(String),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Renders the export as the two-file zip ENA's submission portal expects.
pub fn ena_zip(export: &SurveyExport) -> Result<Vec<u8>, ExportError> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("submission.xml", options)?;
    writer.write_all(submission_document()?.as_bytes())?;

    writer.start_file("sample.xml", options)?;
    writer.write_all(sample_document(export)?.as_bytes())?;

    Ok(writer.finish()?.into_inner())
}

#[derive(Serialize)]
#[serde(rename = "SUBMISSION_SET")]
struct SubmissionSet {
    #[serde(rename = "SUBMISSION")]
    submission: Submission,
}

#[derive(Serialize)]
struct Submission {
    #[serde(rename = "ACTIONS")]
    actions: Actions,
}

#[derive(Serialize)]
struct Actions {
    #[serde(rename = "ACTION")]
    actions: Vec<Action>,
}

#[derive(Serialize)]
struct Action {
    #[serde(rename = "ADD")]
    add: Add,
}

#[derive(Serialize)]
struct Add;

fn submission_document() -> Result<String, ExportError> {
    let document = SubmissionSet {
        submission: Submission {
            actions: Actions {
                actions: vec![Action { add: Add }],
            },
        },
    };

    to_document(&document)
}

#[derive(Serialize)]
#[serde(rename = "SAMPLE_SET")]
struct SampleSet {
    #[serde(rename = "SAMPLE")]
    samples: Vec<EnaSample>,
}

#[derive(Serialize)]
struct EnaSample {
    #[serde(rename = "@alias")]
    alias: String,
    #[serde(rename = "TITLE")]
    title: String,
    #[serde(rename = "SAMPLE_NAME")]
    name: SampleName,
    #[serde(rename = "SAMPLE_ATTRIBUTES")]
    attributes: SampleAttributes,
}

#[derive(Serialize)]
struct SampleName {
    #[serde(rename = "TAXON_ID")]
    taxon_id: String,
    #[serde(rename = "SCIENTIFIC_NAME")]
    scientific_name: String,
}

#[derive(Serialize)]
struct SampleAttributes {
    #[serde(rename = "SAMPLE_ATTRIBUTE")]
    attributes: Vec<EnaAttribute>,
}

#[derive(Serialize)]
struct EnaAttribute {
    #[serde(rename = "TAG")]
    tag: String,
    #[serde(rename = "VALUE")]
    value: String,
    #[serde(rename = "UNITS", skip_serializing_if = "Option::is_none")]
    units: Option<String>,
}

fn sample_document(export: &SurveyExport) -> Result<String, ExportError> {
    let samples = export
        .samples
        .iter()
        .map(|sample_export| {
            let alias = sample_export.sample.barcode_code.clone();
            let project = export.project_label.as_deref().unwrap_or("eDNA");

            EnaSample {
                title: format!("{project} - {alias}"),
                alias,
                name: SampleName {
                    taxon_id: METAGENOME_TAXON_ID.to_string(),
                    scientific_name: "metagenome".to_string(),
                },
                attributes: SampleAttributes {
                    attributes: sample_attributes(export, sample_export),
                },
            }
        })
        .collect();

    to_document(&SampleSet { samples })
}

fn sample_attributes(
    export: &SurveyExport,
    sample_export: &super::SampleExport,
) -> Vec<EnaAttribute> {
    let SurveyExport {
        site,
        survey,
        project_label,
        measurements,
        ..
    } = export;

    let mut attributes = vec![
        mandatory("project name", project_label.clone()),
        mandatory(
            "collection date",
            Some(survey.survey_at.format("%Y-%m-%d").to_string()),
        ),
        // Site geometry is not tracked; the checklist still requires the
        // tags to be present.
        unit_bearing("geographic location (latitude)", NOT_PROVIDED, "DD"),
        unit_bearing("geographic location (longitude)", NOT_PROVIDED, "DD"),
        mandatory(
            "geographic location (country and/or sea)",
            site.country_code.clone(),
        ),
        optional(
            "geographic location (region and locality)",
            &site.location_name,
        ),
        mandatory("broad-scale environmental context", None),
        mandatory("local environmental context", None),
        mandatory("environmental medium", None),
        optional("sample type", &sample_export.sample_type_label),
    ];
    attributes.retain(|a| !a.value.is_empty());

    let method = sample_export.sample.sampling_method;
    if method != SamplingMethod::Unknown {
        attributes.push(optional("sampling method", <&str>::from(method)));
    }

    if let Some(altitude) = survey.altitude_m {
        attributes.push(unit_bearing("altitude", &altitude.to_string(), "m"));
    }

    for (measurement, measurement_type) in measurements {
        attributes.push(EnaAttribute {
            tag: measurement_type.name.clone(),
            value: measurement.value.clone(),
            units: (!measurement_type.unit.is_empty()).then(|| measurement_type.unit.clone()),
        });
    }

    attributes.push(optional("ENA-CHECKLIST", CHECKLIST));

    attributes
}

fn mandatory(tag: &str, value: Option<String>) -> EnaAttribute {
    EnaAttribute {
        tag: tag.to_string(),
        value: value
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| NOT_PROVIDED.to_string()),
        units: None,
    }
}

fn optional(tag: &str, value: &str) -> EnaAttribute {
    EnaAttribute {
        tag: tag.to_string(),
        value: value.to_string(),
        units: None,
    }
}

fn unit_bearing(tag: &str, value: &str, units: &str) -> EnaAttribute {
    EnaAttribute {
        tag: tag.to_string(),
        value: value.to_string(),
        units: Some(units.to_string()),
    }
}

fn to_document<T: Serialize>(document: &T) -> Result<String, ExportError> {
    let body = quick_xml::se::to_string(document).map_err(|e| ExportError::Xml(e.to_string()))?;

    Ok(format!("{XML_DECLARATION}{body}"))
}
