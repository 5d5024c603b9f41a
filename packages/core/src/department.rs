//! Department entity, request payloads and read models.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::employee::{EmployeeSummary, Roster};
use crate::paging::{compare_text, contains_ignore_case, Filter, Sortable};
use crate::validation::{Checker, Validate, ValidationErrors};

/// Maximum length of a department code.
pub const CODE_MAX_LEN: usize = 20;

/// Maximum length of a department name.
pub const NAME_MAX_LEN: usize = 120;

/// Name carried by the placeholder returned when the department service is unreachable.
pub const UNAVAILABLE_NAME: &str = "Department Unavailable";

/// Code carried by the placeholder returned for a by-id lookup that failed.
pub const UNAVAILABLE_CODE: &str = "UNAVAILABLE";

/// A persisted department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    /// Business code, unique across all departments.
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    /// Builds a department from a validated create request.
    #[must_use]
    pub fn from_new(id: i64, new: NewDepartment, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies every field present in `update`, bumping `updated_at`.
    pub fn apply(&mut self, update: DepartmentUpdate, now: DateTime<Utc>) {
        if let Some(code) = update.code {
            self.code = code.trim().to_string();
        }
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        self.updated_at = now;
    }

    /// Public view embedded in employee responses and roster replies.
    #[must_use]
    pub fn snapshot(&self) -> DepartmentSnapshot {
        DepartmentSnapshot {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
            description: self.description.clone(),
        }
    }
}

impl Sortable for Department {
    const SORT_FIELDS: &'static [&'static str] = &["id", "name", "code", "createdAt", "updatedAt"];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "id" => self.id.cmp(&other.id),
            "name" => compare_text(&self.name, &other.name),
            "code" => compare_text(&self.code, &other.code),
            "createdAt" => self.created_at.cmp(&other.created_at),
            "updatedAt" => self.updated_at.cmp(&other.updated_at),
            _ => Ordering::Equal,
        }
    }

    fn sort_key(&self) -> i64 {
        self.id
    }
}

/// Department data as seen by other services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSnapshot {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DepartmentSnapshot {
    /// Placeholder for a by-id lookup that could not be answered.
    #[must_use]
    pub fn unavailable_by_id(id: i64) -> Self {
        Self {
            id,
            name: UNAVAILABLE_NAME.to_string(),
            code: UNAVAILABLE_CODE.to_string(),
            description: None,
        }
    }

    /// Returns `true` for the placeholder shape. Only meaningful for display;
    /// a real department may share the name.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.name == UNAVAILABLE_NAME && self.description.is_none()
    }
}

/// Body of `POST /api/v1/departments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for NewDepartment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checker::new()
            .required("code", &self.code, CODE_MAX_LEN)
            .required("name", &self.name, NAME_MAX_LEN)
            .finish()
    }
}

/// Body of `PUT` and `PATCH /api/v1/departments/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentUpdate {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for DepartmentUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checker::new()
            .optional("code", self.code.as_deref(), CODE_MAX_LEN)
            .optional("name", self.name.as_deref(), NAME_MAX_LEN)
            .finish()
    }
}

/// Optional list filters. Text filters are case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentFilter {
    pub name: Option<String>,
    pub code: Option<String>,
}

impl Filter<Department> for DepartmentFilter {
    fn matches(&self, item: &Department) -> bool {
        contains_ignore_case(&item.name, self.name.as_deref())
            && contains_ignore_case(&item.code, self.code.as_deref())
    }
}

/// Reply of `GET /api/v1/departments/{id}/employees`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentEmployees {
    pub department: DepartmentSnapshot,
    pub employees: Vec<EmployeeSummary>,
    /// Count reported by the employee service; may exceed `employees.len()`.
    pub total_employees: u64,
}

impl DepartmentEmployees {
    #[must_use]
    pub fn new(department: DepartmentSnapshot, roster: Roster) -> Self {
        Self {
            department,
            employees: roster.employees,
            total_employees: roster.total,
        }
    }
}

/// Reply of `GET /api/v1/departments/{id}/headcount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headcount {
    pub department_id: i64,
    pub employees: u64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn engineering() -> Department {
        Department::from_new(
            7,
            NewDepartment {
                code: " ENG ".to_string(),
                name: "Engineering".to_string(),
                description: Some("Builds things".to_string()),
            },
            at(100),
        )
    }

    #[test]
    fn create_trims_code_and_name() {
        let dept = engineering();
        assert_eq!(dept.code, "ENG");
        assert_eq!(dept.created_at, dept.updated_at);
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut dept = engineering();
        dept.apply(
            DepartmentUpdate {
                name: Some("Platform".to_string()),
                ..DepartmentUpdate::default()
            },
            at(200),
        );
        assert_eq!(dept.name, "Platform");
        assert_eq!(dept.code, "ENG");
        assert_eq!(dept.description.as_deref(), Some("Builds things"));
        assert_eq!(dept.updated_at, at(200));
        assert_eq!(dept.created_at, at(100));
    }

    #[test]
    fn new_department_limits() {
        let err = NewDepartment {
            code: "X".repeat(CODE_MAX_LEN + 1),
            name: String::new(),
            description: None,
        }
        .validate()
        .unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["code", "name"]);
    }

    #[test]
    fn update_rejects_blank_supplied_fields() {
        let update = DepartmentUpdate {
            code: Some("  ".to_string()),
            ..DepartmentUpdate::default()
        };
        assert!(update.validate().is_err());
        assert!(DepartmentUpdate::default().validate().is_ok());
    }

    #[test]
    fn placeholder() {
        let by_id = DepartmentSnapshot::unavailable_by_id(42);
        assert_eq!(by_id.id, 42);
        assert_eq!(by_id.code, UNAVAILABLE_CODE);
        assert!(by_id.is_unavailable());

        assert!(!engineering().snapshot().is_unavailable());
    }

    #[test]
    fn filter_matches_substrings() {
        let dept = engineering();
        let filter = DepartmentFilter {
            name: Some("gineer".to_string()),
            code: Some("eng".to_string()),
        };
        assert!(filter.matches(&dept));
        let filter = DepartmentFilter {
            code: Some("HR".to_string()),
            ..DepartmentFilter::default()
        };
        assert!(!filter.matches(&dept));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(engineering()).unwrap();
        assert_eq!(json["code"], "ENG");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
