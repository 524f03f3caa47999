//! Raw form state and its coercion into the typed `/predict` request body.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize, Serializer};

const AGE_BOUNDS: RangeInclusive<i32> = 0..=120;
const SYSTOLIC_BOUNDS: RangeInclusive<i32> = 60..=250;
const DIASTOLIC_BOUNDS: RangeInclusive<i32> = 40..=150;
const BMI_BOUNDS: RangeInclusive<f64> = 10.0..=60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Primary diagnosis categories accepted by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    Pneumonia,
    #[serde(rename = "Heart Failure")]
    HeartFailure,
    #[serde(rename = "Myocardial Infarction")]
    MyocardialInfarction,
    Stroke,
    Sepsis,
    #[serde(rename = "COPD")]
    Copd,
    #[serde(rename = "Diabetes Complications")]
    DiabetesComplications,
    #[serde(rename = "Renal Failure")]
    RenalFailure,
}

impl Diagnosis {
    pub const ALL: [Diagnosis; 8] = [
        Self::Pneumonia,
        Self::HeartFailure,
        Self::MyocardialInfarction,
        Self::Stroke,
        Self::Sepsis,
        Self::Copd,
        Self::DiabetesComplications,
        Self::RenalFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pneumonia => "Pneumonia",
            Self::HeartFailure => "Heart Failure",
            Self::MyocardialInfarction => "Myocardial Infarction",
            Self::Stroke => "Stroke",
            Self::Sepsis => "Sepsis",
            Self::Copd => "COPD",
            Self::DiabetesComplications => "Diabetes Complications",
            Self::RenalFailure => "Renal Failure",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == raw)
    }
}

/// Typed request body for `POST /predict`.
///
/// Serializes to the flat object the service expects; the three history
/// flags go over the wire as `0`/`1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientObservation {
    pub age: i32,
    pub sex: Sex,
    pub bmi: f64,
    pub systolic_bp: i32,
    pub diastolic_bp: i32,
    pub glucose: f64,
    pub cholesterol: f64,
    pub creatinine: f64,
    #[serde(serialize_with = "as_flag")]
    pub diabetes: bool,
    #[serde(serialize_with = "as_flag")]
    pub hypertension: bool,
    pub diagnosis: Diagnosis,
    #[serde(serialize_with = "as_flag")]
    pub readmission_30d: bool,
}

fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

impl TryFrom<&RawForm> for PatientObservation {
    type Error = FormError;

    fn try_from(form: &RawForm) -> Result<Self, Self::Error> {
        encode(form)
    }
}

/// Form state as the input controls hold it: numbers are still text,
/// checkboxes are already `0`/`1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawForm {
    pub age: String,
    pub sex: String,
    pub bmi: String,
    pub systolic_bp: String,
    pub diastolic_bp: String,
    pub glucose: String,
    pub cholesterol: String,
    pub creatinine: String,
    pub diabetes: u8,
    pub hypertension: u8,
    pub diagnosis: String,
    pub readmission_30d: u8,
}

impl Default for RawForm {
    fn default() -> Self {
        Self {
            age: String::new(),
            sex: Sex::Male.as_str().to_string(),
            bmi: String::new(),
            systolic_bp: String::new(),
            diastolic_bp: String::new(),
            glucose: String::new(),
            cholesterol: String::new(),
            creatinine: String::new(),
            diabetes: 0,
            hypertension: 0,
            diagnosis: Diagnosis::Pneumonia.as_str().to_string(),
            readmission_30d: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Age,
    Sex,
    Bmi,
    SystolicBp,
    DiastolicBp,
    Glucose,
    Cholesterol,
    Creatinine,
    Diabetes,
    Hypertension,
    Diagnosis,
    Readmission30d,
}

impl Field {
    /// Wire name of the field.
    pub fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Bmi => "bmi",
            Self::SystolicBp => "systolic_bp",
            Self::DiastolicBp => "diastolic_bp",
            Self::Glucose => "glucose",
            Self::Cholesterol => "cholesterol",
            Self::Creatinine => "creatinine",
            Self::Diabetes => "diabetes",
            Self::Hypertension => "hypertension",
            Self::Diagnosis => "diagnosis",
            Self::Readmission30d => "readmission_30d",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldIssue {
    #[error("{field} is required")]
    Missing { field: Field },
    #[error("{field} must be a number, got {value:?}")]
    NotANumber { field: Field, value: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: Field,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} has no option {value:?}")]
    UnknownOption { field: Field, value: String },
    #[error("{field} must be 0 or 1, got {value}")]
    InvalidFlag { field: Field, value: u8 },
}

impl FieldIssue {
    pub fn field(&self) -> Field {
        match self {
            Self::Missing { field }
            | Self::NotANumber { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::UnknownOption { field, .. }
            | Self::InvalidFlag { field, .. } => *field,
        }
    }
}

/// Every field that blocked encoding, in form order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid patient form: {}", render_issues(.issues))]
pub struct FormError {
    pub issues: Vec<FieldIssue>,
}

impl FormError {
    pub fn has_issue_for(&self, field: Field) -> bool {
        self.issues.iter().any(|issue| issue.field() == field)
    }
}

fn render_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Coercer {
    issues: Vec<FieldIssue>,
}

impl Coercer {
    fn present<'a>(&mut self, field: Field, raw: &'a str) -> Option<&'a str> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.issues.push(FieldIssue::Missing { field });
            return None;
        }
        Some(trimmed)
    }

    fn integer(&mut self, field: Field, raw: &str, bounds: RangeInclusive<i32>) -> Option<i32> {
        let text = self.present(field, raw)?;
        let Ok(value) = text.parse::<i32>() else {
            self.issues.push(FieldIssue::NotANumber {
                field,
                value: text.to_string(),
            });
            return None;
        };
        if !bounds.contains(&value) {
            self.issues.push(FieldIssue::OutOfRange {
                field,
                value: f64::from(value),
                min: f64::from(*bounds.start()),
                max: f64::from(*bounds.end()),
            });
            return None;
        }
        Some(value)
    }

    fn real(&mut self, field: Field, raw: &str, bounds: Option<RangeInclusive<f64>>) -> Option<f64> {
        let text = self.present(field, raw)?;
        // `f64::from_str` accepts "NaN" and "inf"; neither is a usable measurement.
        let value = match text.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                self.issues.push(FieldIssue::NotANumber {
                    field,
                    value: text.to_string(),
                });
                return None;
            }
        };
        if let Some(bounds) = bounds {
            if !bounds.contains(&value) {
                self.issues.push(FieldIssue::OutOfRange {
                    field,
                    value,
                    min: *bounds.start(),
                    max: *bounds.end(),
                });
                return None;
            }
        }
        Some(value)
    }

    fn option<T>(&mut self, field: Field, raw: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
        let parsed = parse(raw);
        if parsed.is_none() {
            self.issues.push(FieldIssue::UnknownOption {
                field,
                value: raw.to_string(),
            });
        }
        parsed
    }

    fn flag(&mut self, field: Field, raw: u8) -> Option<bool> {
        match raw {
            0 => Some(false),
            1 => Some(true),
            value => {
                self.issues.push(FieldIssue::InvalidFlag { field, value });
                None
            }
        }
    }
}

/// Coerce the raw form into a request body.
///
/// Nothing is defaulted: every blank, non-numeric or out-of-bounds field is
/// reported and the form is rejected as a whole.
pub fn encode(form: &RawForm) -> Result<PatientObservation, FormError> {
    let mut c = Coercer::default();

    let age = c.integer(Field::Age, &form.age, AGE_BOUNDS);
    let sex = c.option(Field::Sex, &form.sex, Sex::parse);
    let bmi = c.real(Field::Bmi, &form.bmi, Some(BMI_BOUNDS));
    let systolic_bp = c.integer(Field::SystolicBp, &form.systolic_bp, SYSTOLIC_BOUNDS);
    let diastolic_bp = c.integer(Field::DiastolicBp, &form.diastolic_bp, DIASTOLIC_BOUNDS);
    let glucose = c.real(Field::Glucose, &form.glucose, None);
    let cholesterol = c.real(Field::Cholesterol, &form.cholesterol, None);
    let creatinine = c.real(Field::Creatinine, &form.creatinine, None);
    let diabetes = c.flag(Field::Diabetes, form.diabetes);
    let hypertension = c.flag(Field::Hypertension, form.hypertension);
    let diagnosis = c.option(Field::Diagnosis, &form.diagnosis, Diagnosis::parse);
    let readmission_30d = c.flag(Field::Readmission30d, form.readmission_30d);

    let observation = (|| {
        Some(PatientObservation {
            age: age?,
            sex: sex?,
            bmi: bmi?,
            systolic_bp: systolic_bp?,
            diastolic_bp: diastolic_bp?,
            glucose: glucose?,
            cholesterol: cholesterol?,
            creatinine: creatinine?,
            diabetes: diabetes?,
            hypertension: hypertension?,
            diagnosis: diagnosis?,
            readmission_30d: readmission_30d?,
        })
    })();

    match observation {
        Some(observation) if c.issues.is_empty() => Ok(observation),
        _ => Err(FormError { issues: c.issues }),
    }
}
