//! Structural contracts for the pipeline's inputs and stage outputs.
//!
//! Stage bodies are checked in two passes. A declarative shape table walks
//! the raw JSON and records every missing or mistyped field, so a caller
//! sees the complete list rather than the first serde error. Bodies that pass
//! are then deserialized into the typed models, whose `validator` derives
//! range-check the numeric scores.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::models::{
    AnalysisRequest, GlogauType, ImageUpload, InterpretationResult, ValidatedRequest,
    VisionFindings, FACIAL_ZONES,
};

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType { expected: &'static str },
    OutOfRange { expected: String, actual: String },
    Invalid { reason: String },
}

/// A single contract violation, addressed by dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ViolationKind::Missing,
        }
    }

    pub fn wrong_type(path: impl Into<String>, expected: &'static str) -> Self {
        Self {
            path: path.into(),
            kind: ViolationKind::WrongType { expected },
        }
    }

    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ViolationKind::Invalid {
                reason: reason.into(),
            },
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "<body>" } else { &self.path };
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: missing", path),
            ViolationKind::WrongType { expected } => write!(f, "{}: expected {}", path, expected),
            ViolationKind::OutOfRange { expected, actual } => {
                write!(f, "{}: {} out of range {}", path, actual, expected)
            }
            ViolationKind::Invalid { reason } => write!(f, "{}: {}", path, reason),
        }
    }
}

/// Expected shape of a JSON value.
pub enum Shape {
    Str,
    Int,
    NullableInt,
    Bool,
    StrList,
    OneOf(&'static [&'static str]),
    Object(&'static [Field]),
    /// Object with arbitrary keys; `required` keys must be present and every
    /// value must match `value`.
    Map {
        required: &'static [&'static str],
        value: &'static Shape,
    },
}

pub struct Field {
    name: &'static str,
    shape: Shape,
}

const fn field(name: &'static str, shape: Shape) -> Field {
    Field { name, shape }
}

const ZONE_OBSERVATION: Shape = Shape::Object(&[
    field("fine_lines_wrinkles", Shape::Str),
    field("texture_coarseness", Shape::Str),
    field("pigment_spots", Shape::Str),
    field("redness_erythema", Shape::Str),
    field("pore_visibility", Shape::Str),
    field("sebum_shine", Shape::Str),
    field("hydration_dryness", Shape::Str),
]);

const VISION_FINDINGS: Shape = Shape::Object(&[
    field("age_estimation", Shape::Str),
    field(
        "zone_analysis",
        Shape::Map {
            required: &FACIAL_ZONES,
            value: &ZONE_OBSERVATION,
        },
    ),
    field(
        "skin_conditions",
        Shape::Object(&[
            field("acne", Shape::Str),
            field("pigmentation", Shape::Str),
            field("texture", Shape::Str),
            field("pores", Shape::Str),
            field("sebum", Shape::Str),
            field("wrinkles", Shape::Str),
            field("redness", Shape::Str),
            field("dark_circles", Shape::Str),
        ]),
    ),
    field(
        "aging_signs",
        Shape::Object(&[
            field("sagging", Shape::Str),
            field("elasticity_loss", Shape::Str),
            field("photoaging_cues", Shape::Str),
        ]),
    ),
    field(
        "quality_assessment",
        Shape::Object(&[
            field("lighting", Shape::Str),
            field("blur", Shape::Str),
            field("occlusions", Shape::Str),
            field("angle", Shape::Str),
            field("makeup_filters", Shape::Str),
            field("color_cast", Shape::Str),
        ]),
    ),
]);

const SCORE: Shape = Shape::Object(&[
    field("severity_0_4", Shape::Int),
    field("marker_0_100", Shape::Int),
    field("confidence_0_100", Shape::Int),
]);

const ZONED_SCORE: Shape = Shape::Object(&[
    field("severity_0_4", Shape::Int),
    field("marker_0_100", Shape::Int),
    field("confidence_0_100", Shape::Int),
    field("zones", Shape::StrList),
]);

const ENDOCRINE_CUE: Shape = Shape::Object(&[
    field("suggestive", Shape::Bool),
    field("confidence_0_100", Shape::Int),
    field("notes", Shape::Str),
]);

/// The interpretation stage's `structured_data` record.
const STRUCTURED_DATA: Shape = Shape::Object(&[
    field("usable", Shape::Bool),
    field("quality_notes", Shape::StrList),
    field(
        "views_received",
        Shape::Object(&[
            field("frontal", Shape::Bool),
            field("left_profile", Shape::Bool),
            field("right_profile", Shape::Bool),
        ]),
    ),
    field("zones_visible", Shape::StrList),
    field(
        "skin_condition",
        Shape::Object(&[
            field("acne", ZONED_SCORE),
            field("pigmentation", ZONED_SCORE),
            field("redness", ZONED_SCORE),
            field("texture", ZONED_SCORE),
            field("pores", ZONED_SCORE),
            field("sebum", ZONED_SCORE),
            field("barrier", SCORE),
            field("hydration", SCORE),
            field("dark_circles", SCORE),
        ]),
    ),
    field(
        "aging",
        Shape::Object(&[
            field("skin_age_years", Shape::Int),
            field("chronological_age_years", Shape::NullableInt),
            field("delta_years", Shape::NullableInt),
            field("glogau_type", Shape::OneOf(&GlogauType::NAMES)),
            field("wrinkles", ZONED_SCORE),
            field("sagging", ZONED_SCORE),
        ]),
    ),
    field(
        "lifestyle",
        Shape::Object(&[
            field("stress_markers", SCORE),
            field("screen_fatigue", SCORE),
            field("lip_health", SCORE),
            field("smoking_damage", SCORE),
            field("sleep_deficit", SCORE),
        ]),
    ),
    field(
        "hormonal_cues",
        Shape::Object(&[
            field(
                "hormonal_acne",
                Shape::Object(&[
                    field("present", Shape::Bool),
                    field("severity_0_4", Shape::Int),
                    field("confidence_0_100", Shape::Int),
                    field("notes", Shape::Str),
                ]),
            ),
            field("pcos_thyroid", ENDOCRINE_CUE),
            field("nutrient_def", ENDOCRINE_CUE),
        ]),
    ),
    field(
        "environmental_damage",
        Shape::Object(&[
            field("uv_damage", SCORE),
            field("pollution", SCORE),
            field("oxidative", SCORE),
            field("thermal_flushing", SCORE),
        ]),
    ),
    field("referral_flags", Shape::StrList),
    field(
        "care_plan",
        Shape::Object(&[
            field("morning", Shape::StrList),
            field("night", Shape::StrList),
            field("weekly", Shape::StrList),
        ]),
    ),
]);

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Walk `value` against `shape`, appending every violation found.
pub fn check(value: Option<&Value>, shape: &Shape, path: &str, out: &mut Vec<Violation>) {
    let Some(value) = value else {
        out.push(Violation::missing(path));
        return;
    };

    match shape {
        Shape::Str if !value.is_string() => out.push(Violation::wrong_type(path, "string")),
        Shape::Int if value.as_i64().is_none() => out.push(Violation::wrong_type(path, "integer")),
        Shape::NullableInt if !value.is_null() && value.as_i64().is_none() => {
            out.push(Violation::wrong_type(path, "integer or null"))
        }
        Shape::Bool if !value.is_boolean() => out.push(Violation::wrong_type(path, "boolean")),
        Shape::StrList => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        out.push(Violation::wrong_type(format!("{}[{}]", path, i), "string"));
                    }
                }
            }
            None => out.push(Violation::wrong_type(path, "array of strings")),
        },
        Shape::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => out.push(Violation::invalid(
                path,
                format!("'{}' is not one of {}", s, allowed.join(", ")),
            )),
            None => out.push(Violation::wrong_type(path, "string")),
        },
        Shape::Object(fields) => match value.as_object() {
            Some(object) => check_fields(object, fields, path, out),
            None => out.push(Violation::wrong_type(path, "object")),
        },
        Shape::Map { required, value: entry } => match value.as_object() {
            Some(object) => {
                for key in required.iter() {
                    if !object.contains_key(*key) {
                        out.push(Violation::missing(join(path, key)));
                    }
                }
                for (key, item) in object {
                    check(Some(item), entry, &join(path, key), out);
                }
            }
            None => out.push(Violation::wrong_type(path, "object")),
        },
        _ => {}
    }
}

fn check_fields(object: &Map<String, Value>, fields: &[Field], path: &str, out: &mut Vec<Violation>) {
    for f in fields {
        check(object.get(f.name), &f.shape, &join(path, f.name), out);
    }
}

/// Convert `validator` errors into path-addressed violations.
fn flatten_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<Violation>) {
    for (name, kind) in errors.errors() {
        let path = join(prefix, name);
        match kind {
            ValidationErrorsKind::Struct(inner) => flatten_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    flatten_errors(inner, &format!("{}[{}]", path, i), out);
                }
            }
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|err| field_violation(&path, err)));
            }
        }
    }
}

fn field_violation(path: &str, err: &ValidationError) -> Violation {
    let param = |name: &str| {
        err.params
            .get(name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string())
    };

    if err.code == "range" {
        Violation {
            path: path.to_string(),
            kind: ViolationKind::OutOfRange {
                expected: format!("{}..={}", param("min"), param("max")),
                actual: param("value"),
            },
        }
    } else {
        Violation::invalid(path, err.code.to_string())
    }
}

fn coerce<T: DeserializeOwned>(value: Value) -> Result<T, Vec<Violation>> {
    serde_json::from_value(value).map_err(|e| vec![Violation::invalid("", e.to_string())])
}

fn finish<T>(value: T, mut violations: Vec<Violation>) -> Result<T, Vec<Violation>> {
    if violations.is_empty() {
        Ok(value)
    } else {
        violations.sort_by(|a, b| a.path.cmp(&b.path));
        Err(violations)
    }
}

fn check_image(
    name: &str,
    image: Option<&ImageUpload>,
    required: bool,
    max_bytes: usize,
    out: &mut Vec<Violation>,
) {
    match image {
        None if required => out.push(Violation::missing(name)),
        None => {}
        Some(image) if image.is_empty() => out.push(Violation::invalid(name, "image is empty")),
        Some(image) if image.len() > max_bytes => out.push(Violation::invalid(
            name,
            format!("image is {} bytes, limit is {}", image.len(), max_bytes),
        )),
        Some(_) => {}
    }
}

/// Pre-flight check of an inbound request.
pub fn validate_request(
    request: AnalysisRequest,
    max_image_bytes: usize,
) -> Result<ValidatedRequest, Vec<Violation>> {
    let mut violations = Vec::new();
    check_image("frontal", request.frontal.as_ref(), true, max_image_bytes, &mut violations);
    check_image("left_profile", request.left_profile.as_ref(), false, max_image_bytes, &mut violations);
    check_image("right_profile", request.right_profile.as_ref(), false, max_image_bytes, &mut violations);

    if let Err(errors) = request.metadata.validate() {
        flatten_errors(&errors, "metadata", &mut violations);
    }

    finish((), violations)?;
    let Some(frontal) = request.frontal else {
        return Err(vec![Violation::missing("frontal")]);
    };

    Ok(ValidatedRequest {
        frontal,
        left_profile: request.left_profile,
        right_profile: request.right_profile,
        metadata: request.metadata,
    })
}

/// Check a vision stage body and coerce it into [`VisionFindings`].
pub fn validate_findings(body: Value) -> Result<VisionFindings, Vec<Violation>> {
    let mut violations = Vec::new();
    check(Some(&body), &VISION_FINDINGS, "", &mut violations);
    finish((), violations)?;
    coerce(body)
}

/// Check an interpretation stage body and coerce it into [`InterpretationResult`].
///
/// Paths inside `structured_data` are reported relative to that record, so a
/// body without hormonal cues yields a `hormonal_cues` violation.
pub fn validate_interpretation(body: Value) -> Result<InterpretationResult, Vec<Violation>> {
    let mut violations = Vec::new();
    match body.as_object() {
        Some(envelope) => {
            check(envelope.get("markdown_report"), &Shape::Str, "markdown_report", &mut violations);
            match envelope.get("structured_data") {
                Some(record) if record.is_object() => {
                    check(Some(record), &STRUCTURED_DATA, "", &mut violations)
                }
                Some(_) => violations.push(Violation::wrong_type("structured_data", "object")),
                None => violations.push(Violation::missing("structured_data")),
            }
        }
        None => violations.push(Violation::wrong_type("", "object")),
    }
    finish((), violations)?;

    let result: InterpretationResult = coerce(body)?;
    let mut violations = Vec::new();
    if let Err(errors) = result.structured_data.validate() {
        flatten_errors(&errors, "", &mut violations);
    }
    finish(result, violations)
}
