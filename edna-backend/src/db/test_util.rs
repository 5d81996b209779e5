use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    error,
    model::{
        BarcodeKind, SamplingMethod,
        barcode::Barcode,
        measurement::{Measurement, MeasurementType, NewMeasurement},
        person::Person,
        project::Project,
        sample::{FilterSample, NewSample, Sample},
        sample_type::SampleType,
        site::Site,
        survey::{NewSurvey, Survey},
    },
    store::MetadataStore,
};

/// Plain-vector mirror of the database, cheap to snapshot.
#[derive(Default, Clone)]
pub struct MemoryState {
    pub sites: Vec<Site>,
    pub projects: Vec<Project>,
    pub people: Vec<Person>,
    pub sample_types: Vec<SampleType>,
    pub measurement_types: Vec<MeasurementType>,
    pub barcodes: Vec<Barcode>,
    pub surveys: Vec<Survey>,
    pub survey_projects: Vec<(Uuid, Uuid)>,
    pub samples: Vec<Sample>,
    pub filter_details: Vec<FilterSample>,
    pub measurements: Vec<Measurement>,
}

/// [`MetadataStore`] backed by [`MemoryState`]. Row scopes are emulated with
/// a snapshot stack, parent→child cascades with explicit vector retains, so
/// the import and cascade services can be exercised without a database.
#[derive(Default)]
pub struct MemoryStore {
    pub state: MemoryState,
    snapshots: Vec<MemoryState>,
    pub sample_deletes: usize,
    pub survey_deletes: usize,
}

impl MemoryStore {
    /// Store preloaded with the reference vocabulary the import tests assume.
    pub fn with_reference_data() -> Self {
        let mut store = Self::default();
        let state = &mut store.state;

        for (site_code, location_name) in [
            ("PNT-01", "Punta Norte Shoreline"),
            ("BIG-02", "Big Lagoon Outflow"),
        ] {
            state.sites.push(Site {
                id: Uuid::now_v7(),
                site_code: site_code.to_string(),
                location_name: location_name.to_string(),
                country_code: Some("US".to_string()),
            });
        }

        for (code, label) in [("baseline", "Baseline Monitoring"), ("storm", "Storm Response")] {
            state.projects.push(Project {
                id: Uuid::now_v7(),
                code: code.to_string(),
                label: label.to_string(),
            });
        }

        for (code, label) in [("ew", "Water Filter"), ("ss", "Sediment SubCore")] {
            state.sample_types.push(SampleType {
                id: Uuid::now_v7(),
                code: code.to_string(),
                label: label.to_string(),
            });
        }

        for (code, name, unit) in [
            ("water_temp", "Water Temperature", "°C"),
            ("env_ph", "pH", ""),
            ("salinity", "Salinity", "PSU"),
        ] {
            state.measurement_types.push(MeasurementType {
                id: Uuid::now_v7(),
                code: code.to_string(),
                name: name.to_string(),
                unit: unit.to_string(),
            });
        }

        state.people.push(Person {
            id: Uuid::now_v7(),
            name: "Jo Field".to_string(),
            email: "jo.field@example.com".to_string(),
        });

        store
    }

    pub fn site_id(&self, site_code: &str) -> Uuid {
        self.state
            .sites
            .iter()
            .find(|s| s.site_code == site_code)
            .map(|s| s.id)
            .unwrap()
    }

    pub fn sample_type_id(&self, code: &str) -> Uuid {
        self.state
            .sample_types
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.id)
            .unwrap()
    }

    pub fn add_survey(&mut self, site_id: Uuid, survey_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::now_v7();
        self.state.surveys.push(Survey {
            id,
            site_id,
            collected_by: None,
            supervisor: None,
            recorder_name: String::new(),
            complete: true,
            survey_at,
            altitude_m: None,
        });

        id
    }

    /// Seeds a sample plus its filter detail under `survey_id`.
    pub fn add_filter_sample(&mut self, survey_id: Uuid, barcode_code: &str) -> Uuid {
        let barcode_id = Uuid::now_v7();
        self.state.barcodes.push(Barcode {
            id: barcode_id,
            code: barcode_code.to_string(),
            kind: BarcodeKind::FieldSample,
        });

        let sample_id = Uuid::now_v7();
        self.state.samples.push(Sample {
            id: sample_id,
            survey_id,
            barcode_id,
            sample_type_id: self.sample_type_id("ew"),
            barcode_code: barcode_code.to_string(),
            extracted: false,
            sampling_method: SamplingMethod::Grab,
        });

        self.state.filter_details.push(FilterSample {
            sample_id,
            filtered_at: None,
            filter_method: Default::default(),
            filter_type: Default::default(),
            water_volume_ml: Some(1000.0),
            pore_size_um: None,
            filter_size_mm: None,
            saturated: None,
            notes: String::new(),
        });

        sample_id
    }
}

impl MetadataStore for MemoryStore {
    async fn site_by_key(&mut self, key: &str) -> error::Result<Option<Site>> {
        Ok(self
            .state
            .sites
            .iter()
            .find(|s| s.site_code == key || s.location_name == key)
            .cloned())
    }

    async fn project_by_key(&mut self, key: &str) -> error::Result<Option<Project>> {
        Ok(self
            .state
            .projects
            .iter()
            .find(|p| p.code == key || p.label == key)
            .cloned())
    }

    async fn sample_type_by_key(&mut self, key: &str) -> error::Result<Option<SampleType>> {
        Ok(self
            .state
            .sample_types
            .iter()
            .find(|s| s.code == key || s.label == key)
            .cloned())
    }

    async fn person_by_email(&mut self, email: &str) -> error::Result<Option<Person>> {
        Ok(self.state.people.iter().find(|p| p.email == email).cloned())
    }

    async fn measurement_types(&mut self) -> error::Result<Vec<MeasurementType>> {
        Ok(self.state.measurement_types.clone())
    }

    async fn survey_at(
        &mut self,
        site_id: Uuid,
        survey_at: DateTime<Utc>,
    ) -> error::Result<Option<Survey>> {
        Ok(self
            .state
            .surveys
            .iter()
            .find(|s| s.site_id == site_id && s.survey_at == survey_at)
            .cloned())
    }

    async fn create_survey(&mut self, new: NewSurvey) -> error::Result<Survey> {
        let survey = Survey {
            id: Uuid::now_v7(),
            site_id: new.site_id,
            collected_by: new.collected_by,
            supervisor: new.supervisor,
            recorder_name: new.recorder_name,
            complete: new.complete,
            survey_at: new.survey_at,
            altitude_m: new.altitude_m,
        };
        self.state.surveys.push(survey.clone());

        Ok(survey)
    }

    async fn attach_project(&mut self, survey_id: Uuid, project_id: Uuid) -> error::Result<()> {
        let link = (survey_id, project_id);
        if !self.state.survey_projects.contains(&link) {
            self.state.survey_projects.push(link);
        }

        Ok(())
    }

    async fn barcode_get_or_create(&mut self, code: &str) -> error::Result<Barcode> {
        if let Some(found) = self.state.barcodes.iter().find(|b| b.code == code) {
            return Ok(found.clone());
        }

        let barcode = Barcode {
            id: Uuid::now_v7(),
            code: code.to_string(),
            kind: BarcodeKind::Unassigned,
        };
        self.state.barcodes.push(barcode.clone());

        Ok(barcode)
    }

    async fn mark_barcode_assigned(&mut self, barcode_id: Uuid) -> error::Result<()> {
        if let Some(barcode) = self.state.barcodes.iter_mut().find(|b| b.id == barcode_id) {
            barcode.kind = BarcodeKind::FieldSample;
        }

        Ok(())
    }

    async fn upsert_sample(&mut self, new: NewSample) -> error::Result<(Sample, bool)> {
        if let Some(existing) = self
            .state
            .samples
            .iter_mut()
            .find(|s| s.barcode_id == new.barcode_id)
        {
            existing.survey_id = new.survey_id;
            existing.sample_type_id = new.sample_type_id;
            existing.barcode_code = new.barcode_code;
            existing.extracted = new.extracted;
            existing.sampling_method = new.sampling_method;

            return Ok((existing.clone(), false));
        }

        let sample = Sample {
            id: Uuid::now_v7(),
            survey_id: new.survey_id,
            barcode_id: new.barcode_id,
            sample_type_id: new.sample_type_id,
            barcode_code: new.barcode_code,
            extracted: new.extracted,
            sampling_method: new.sampling_method,
        };
        self.state.samples.push(sample.clone());

        Ok((sample, true))
    }

    async fn ensure_filter_detail(&mut self, new: FilterSample) -> error::Result<bool> {
        if self
            .state
            .filter_details
            .iter()
            .any(|f| f.sample_id == new.sample_id)
        {
            return Ok(false);
        }

        self.state.filter_details.push(new);

        Ok(true)
    }

    async fn record_measurement(&mut self, new: NewMeasurement) -> error::Result<bool> {
        let duplicate = self.state.measurements.iter().any(|m| {
            m.survey_id == new.survey_id
                && m.measured_at == new.measured_at
                && m.measurement_type_id == new.measurement_type_id
                && m.value == new.value
        });
        if duplicate {
            return Ok(false);
        }

        self.state.measurements.push(Measurement {
            id: Uuid::now_v7(),
            survey_id: new.survey_id,
            measurement_type_id: new.measurement_type_id,
            value: new.value,
            measured_at: new.measured_at,
            notes: new.notes,
        });

        Ok(true)
    }

    async fn filter_detail(&mut self, sample_id: Uuid) -> error::Result<Option<FilterSample>> {
        Ok(self
            .state
            .filter_details
            .iter()
            .find(|f| f.sample_id == sample_id)
            .cloned())
    }

    async fn sample_by_id(&mut self, sample_id: Uuid) -> error::Result<Option<Sample>> {
        Ok(self.state.samples.iter().find(|s| s.id == sample_id).cloned())
    }

    async fn delete_sample(&mut self, sample_id: Uuid) -> error::Result<()> {
        self.sample_deletes += 1;
        self.state.samples.retain(|s| s.id != sample_id);
        self.state.filter_details.retain(|f| f.sample_id != sample_id);

        Ok(())
    }

    async fn survey_sample_count(&mut self, survey_id: Uuid) -> error::Result<i64> {
        Ok(self
            .state
            .samples
            .iter()
            .filter(|s| s.survey_id == survey_id)
            .count() as i64)
    }

    async fn delete_survey(&mut self, survey_id: Uuid) -> error::Result<()> {
        self.survey_deletes += 1;

        let orphaned: Vec<Uuid> = self
            .state
            .samples
            .iter()
            .filter(|s| s.survey_id == survey_id)
            .map(|s| s.id)
            .collect();

        self.state.surveys.retain(|s| s.id != survey_id);
        self.state.survey_projects.retain(|(s, _)| *s != survey_id);
        self.state.measurements.retain(|m| m.survey_id != survey_id);
        self.state.samples.retain(|s| s.survey_id != survey_id);
        self.state
            .filter_details
            .retain(|f| !orphaned.contains(&f.sample_id));

        Ok(())
    }

    async fn begin_row(&mut self) -> error::Result<()> {
        self.snapshots.push(self.state.clone());

        Ok(())
    }

    async fn commit_row(&mut self) -> error::Result<()> {
        self.snapshots.pop();

        Ok(())
    }

    async fn abort_row(&mut self) -> error::Result<()> {
        if let Some(snapshot) = self.snapshots.pop() {
            self.state = snapshot;
        }

        Ok(())
    }
}
