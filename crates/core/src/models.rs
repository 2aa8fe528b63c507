//! Domain model types shared by the store, the reconciler and the dispatcher.
//!
//! Records live in the store as loosely-typed [`Document`]s (a JSON object
//! per record). The typed structs below are the shapes the reconciler reads
//! from trigger payloads and writes as mirrored records.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Record types (doctypes) known to the sync hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Entity {
    Student,
    ProgramEnrollment,
    Course,
    CourseEnrollment,
    LmsCourse,
    LmsEnrollment,
}

impl Entity {
    pub const ALL: [Entity; 6] = [
        Entity::Student,
        Entity::ProgramEnrollment,
        Entity::Course,
        Entity::CourseEnrollment,
        Entity::LmsCourse,
        Entity::LmsEnrollment,
    ];

    /// The entity's name as the host platform spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::ProgramEnrollment => "Program Enrollment",
            Self::Course => "Course",
            Self::CourseEnrollment => "Course Enrollment",
            Self::LmsCourse => "LMS Course",
            Self::LmsEnrollment => "LMS Enrollment",
        }
    }

    /// Parse an entity name. Accepts the platform spelling as well as a
    /// snake_case form (`program_enrollment`, `lms_course`).
    pub fn from_str_val(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().to_ascii_lowercase() == normalized)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A single stored record: an entity, a store-assigned name and its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub entity: Entity,
    /// `None` until the store assigns one on insert.
    pub name: Option<String>,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            name: None,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Builder-style name setter.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build a document from a serializable record. A `name` key on the
    /// record becomes the document name; `null` fields are dropped.
    pub fn from_record<T: Serialize>(entity: Entity, record: &T) -> Result<Self, StoreError> {
        let mut fields = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidDocument(format!(
                    "{entity} record serialized to {other}, expected an object"
                )))
            }
        };
        let name = match fields.remove("name") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        fields.retain(|_, v| !v.is_null());
        Ok(Self {
            entity,
            name,
            fields,
        })
    }

    /// Decode the document (name included) into a typed record.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut map = self.fields.clone();
        if let Some(name) = &self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Read a field as a string. `name` resolves to the document name.
    /// Numbers and booleans are rendered; objects, arrays and null are not.
    pub fn get(&self, field: &str) -> Option<String> {
        if field == "name" {
            return self.name.clone();
        }
        self.fields.get(field).and_then(scalar_to_string)
    }
}

/// Render a scalar JSON value the way the store compares it.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Education (module A) records
// ---------------------------------------------------------------------------

/// A student's enrollment in a program, listing the courses taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    #[serde(default)]
    pub name: String,
    /// Reference to the `Student` document name.
    pub student: String,
    #[serde(default)]
    pub courses: Vec<EnrollmentCourse>,
}

/// One course line of a [`ProgramEnrollment`]. A line without a course
/// name decodes with an empty one and is skipped as an unknown course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentCourse {
    #[serde(default)]
    pub course_name: String,
}

/// An Education course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub course_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    /// Copied through verbatim; the platform stores it as text or a number.
    #[serde(default)]
    pub duration: Option<Value>,
}

/// A single-course enrollment in Education.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollment {
    #[serde(default)]
    pub name: String,
    pub student: String,
    pub course_name: String,
    #[serde(default)]
    pub enrollment_date: Option<String>,
}

// ---------------------------------------------------------------------------
// LMS (module B) records
// ---------------------------------------------------------------------------

/// An LMS course. Matched against Education courses by `title`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LmsCourse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub course_duration: Option<Value>,
}

/// An LMS course membership. Keyed by (`member`, `course`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsEnrollment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Student email.
    pub member: String,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_username: Option<String>,
    /// Name of the `LMS Course` document.
    pub course: String,
    #[serde(default)]
    pub enrollment_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way a course is being mirrored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    EducationToLms,
    LmsToEducation,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EducationToLms => write!(f, "education_to_lms"),
            Self::LmsToEducation => write!(f, "lms_to_education"),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit Entry
// ---------------------------------------------------------------------------

/// An audit-log entry describing one dispatched handler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub entity: Option<String>,
    pub document: Option<String>,
    pub details: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a success audit entry.
    pub fn success(action: &str, details: &str) -> Self {
        Self {
            action: action.to_string(),
            entity: None,
            document: None,
            details: details.to_string(),
            success: true,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure audit entry.
    pub fn failure(action: &str, details: &str) -> Self {
        Self {
            success: false,
            ..Self::success(action, details)
        }
    }

    /// Attach the triggering document.
    pub fn for_document(mut self, entity: Entity, document: Option<&str>) -> Self {
        self.entity = Some(entity.as_str().to_string());
        self.document = document.map(str::to_string);
        self
    }
}
