//! Employee entity, request payloads and read models.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::department::DepartmentSnapshot;
use crate::paging::{compare_text, contains_ignore_case, equals_if_present, Filter, Sortable};
use crate::validation::{Checker, Validate, ValidationErrors};

/// Maximum length of first and last names.
pub const NAME_MAX_LEN: usize = 120;

/// Maximum length of an email address.
pub const EMAIL_MAX_LEN: usize = 200;

/// Maximum number of employees accepted by one bulk request.
pub const BULK_MAX: usize = 100;

/// Number of entries reported per name histogram in [`EmployeeStats`].
pub const TOP_NAMES: usize = 10;

/// A persisted employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Unique within the employee service.
    pub email: String,
    /// Loose reference into the department service; never checked against it.
    #[serde(default)]
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Builds an employee from a validated create request.
    #[must_use]
    pub fn from_new(id: i64, new: NewEmployee, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: new.email.trim().to_string(),
            department_id: new.department_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies every field present in `update`, bumping `updated_at`.
    pub fn apply(&mut self, update: EmployeeUpdate, now: DateTime<Utc>) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_string();
        }
        if let Some(department_id) = update.department_id {
            self.department_id = Some(department_id);
        }
        self.updated_at = now;
    }

    /// Case-insensitive substring match over first name, last name and email.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = Some(query);
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.last_name, query)
            || contains_ignore_case(&self.email, query)
    }

    /// Employee without department enrichment.
    #[must_use]
    pub fn into_view(self) -> EmployeeView {
        self.into_view_with(None)
    }

    /// Employee with an optional embedded department.
    #[must_use]
    pub fn into_view_with(self, department: Option<DepartmentSnapshot>) -> EmployeeView {
        EmployeeView {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            department_id: self.department_id,
            department,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Sortable for Employee {
    const SORT_FIELDS: &'static [&'static str] = &[
        "id",
        "firstName",
        "lastName",
        "email",
        "departmentId",
        "createdAt",
        "updatedAt",
    ];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "id" => self.id.cmp(&other.id),
            "firstName" => compare_text(&self.first_name, &other.first_name),
            "lastName" => compare_text(&self.last_name, &other.last_name),
            "email" => compare_text(&self.email, &other.email),
            "departmentId" => self.department_id.cmp(&other.department_id),
            "createdAt" => self.created_at.cmp(&other.created_at),
            "updatedAt" => self.updated_at.cmp(&other.updated_at),
            _ => Ordering::Equal,
        }
    }

    fn sort_key(&self) -> i64 {
        self.id
    }
}

/// Employee as returned over HTTP, optionally enriched with its department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roster entry as seen by the department service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&Employee> for EmployeeSummary {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            first_name: e.first_name.clone(),
            last_name: e.last_name.clone(),
            email: e.email.clone(),
        }
    }
}

/// The employees of one department as returned by a roster lookup.
///
/// `employees` may be a truncated first page; `total` is the number the
/// employee service reported across all pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub employees: Vec<EmployeeSummary>,
    pub total: u64,
}

impl Roster {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl From<Vec<EmployeeSummary>> for Roster {
    fn from(employees: Vec<EmployeeSummary>) -> Self {
        let total = employees.len() as u64;
        Self { employees, total }
    }
}

/// Body of `POST /api/v1/employees`, also the element type of bulk requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department_id: Option<i64>,
}

impl Validate for NewEmployee {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checker::new()
            .required("firstName", &self.first_name, NAME_MAX_LEN)
            .required("lastName", &self.last_name, NAME_MAX_LEN)
            .required("email", &self.email, EMAIL_MAX_LEN)
            .email("email", self.email.trim())
            .finish()
    }
}

/// Body of `PUT` and `PATCH /api/v1/employees/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
}

impl Validate for EmployeeUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker
            .optional("firstName", self.first_name.as_deref(), NAME_MAX_LEN)
            .optional("lastName", self.last_name.as_deref(), NAME_MAX_LEN)
            .optional("email", self.email.as_deref(), EMAIL_MAX_LEN);
        if let Some(email) = &self.email {
            checker.email("email", email.trim());
        }
        checker.finish()
    }
}

/// Optional list filters for `GET /api/v1/employees`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFilter {
    pub email: Option<String>,
    pub last_name: Option<String>,
    pub department_id: Option<i64>,
}

impl Filter<Employee> for EmployeeFilter {
    fn matches(&self, item: &Employee) -> bool {
        contains_ignore_case(&item.email, self.email.as_deref())
            && contains_ignore_case(&item.last_name, self.last_name.as_deref())
            && equals_if_present(item.department_id.as_ref(), self.department_id.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Occurrence count of a single name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

/// Reply of `GET /api/v1/employees/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total_employees: u64,
    /// Head count keyed by department id.
    pub employees_by_department: BTreeMap<i64, u64>,
    /// Employees with no department reference.
    pub unassigned: u64,
    /// Ten most common first names, most common first.
    pub employees_by_first_name: Vec<NameCount>,
    /// Ten most common last names, most common first.
    pub employees_by_last_name: Vec<NameCount>,
}

impl EmployeeStats {
    /// Aggregates statistics over a full employee listing.
    pub fn collect<'a, I>(employees: I) -> Self
    where
        I: IntoIterator<Item = &'a Employee>,
    {
        let mut stats = Self::default();
        let mut first_names: HashMap<&str, u64> = HashMap::new();
        let mut last_names: HashMap<&str, u64> = HashMap::new();

        for employee in employees {
            stats.total_employees += 1;
            match employee.department_id {
                Some(id) => *stats.employees_by_department.entry(id).or_default() += 1,
                None => stats.unassigned += 1,
            }
            *first_names.entry(employee.first_name.as_str()).or_default() += 1;
            *last_names.entry(employee.last_name.as_str()).or_default() += 1;
        }

        stats.employees_by_first_name = top_names(first_names);
        stats.employees_by_last_name = top_names(last_names);
        stats
    }
}

fn top_names(counts: HashMap<&str, u64>) -> Vec<NameCount> {
    let mut ranked: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_NAMES);
    ranked
}

// ---------------------------------------------------------------------------
// Bulk create
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/employees/bulk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub employees: Vec<NewEmployee>,
}

impl Validate for BulkCreateRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checker::new()
            .reject_if(self.employees.is_empty(), "employees", "employees list cannot be empty")
            .reject_if(
                self.employees.len() > BULK_MAX,
                "employees",
                "cannot create more than 100 employees at once",
            )
            .finish()
    }
}

/// Outcome of one element of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateResult {
    pub index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkCreateResult {
    #[must_use]
    pub fn created(index: usize, employee: EmployeeView) -> Self {
        Self {
            index,
            success: true,
            employee: Some(employee),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            success: false,
            employee: None,
            error: Some(error.into()),
        }
    }
}

/// Reply of `POST /api/v1/employees/bulk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResponse {
    pub results: Vec<BulkCreateResult>,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
}

impl From<Vec<BulkCreateResult>> for BulkCreateResponse {
    fn from(results: Vec<BulkCreateResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_processed: results.len(),
            failed: results.len() - successful,
            successful,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn employee(id: i64, first: &str, last: &str, department_id: Option<i64>) -> Employee {
        Employee::from_new(
            id,
            NewEmployee {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}.{}@example.com", first.to_lowercase(), id),
                department_id,
            },
            at(0),
        )
    }

    #[test]
    fn new_employee_validation() {
        let ok = NewEmployee {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            department_id: None,
        };
        assert!(ok.validate().is_ok());

        let bad = NewEmployee {
            email: "nope".to_string(),
            ..ok
        };
        let err = bad.validate().unwrap_err();
        assert_eq!(err.errors[0].field, "email");
    }

    #[test]
    fn update_validates_supplied_email_only() {
        assert!(EmployeeUpdate::default().validate().is_ok());
        let update = EmployeeUpdate {
            email: Some("broken".to_string()),
            ..EmployeeUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn apply_keeps_department_when_absent() {
        let mut e = employee(1, "Ada", "Lovelace", Some(3));
        e.apply(
            EmployeeUpdate {
                last_name: Some("King".to_string()),
                ..EmployeeUpdate::default()
            },
            at(5),
        );
        assert_eq!(e.last_name, "King");
        assert_eq!(e.department_id, Some(3));
        assert_eq!(e.updated_at, at(5));
    }

    #[test]
    fn search_query_spans_names_and_email() {
        let e = employee(1, "Grace", "Hopper", None);
        assert!(e.matches_query("GRACE"));
        assert!(e.matches_query("hop"));
        assert!(e.matches_query("example.com"));
        assert!(!e.matches_query("turing"));
    }

    #[test]
    fn filter_by_department() {
        let filter = EmployeeFilter {
            department_id: Some(2),
            ..EmployeeFilter::default()
        };
        assert!(filter.matches(&employee(1, "A", "B", Some(2))));
        assert!(!filter.matches(&employee(2, "A", "B", Some(3))));
        assert!(!filter.matches(&employee(3, "A", "B", None)));
    }

    #[test]
    fn view_omits_missing_department() {
        let json = serde_json::to_value(employee(1, "A", "B", None).into_view()).unwrap();
        assert!(json.get("department").is_none());
        assert_eq!(json["firstName"], "A");
    }

    #[test]
    fn stats_rank_names() {
        let staff = vec![
            employee(1, "Ann", "Smith", Some(1)),
            employee(2, "Bob", "Smith", Some(1)),
            employee(3, "Ann", "Jones", Some(2)),
            employee(4, "Cid", "Brown", None),
        ];
        let stats = EmployeeStats::collect(&staff);
        assert_eq!(stats.total_employees, 4);
        assert_eq!(stats.unassigned, 1);
        assert_eq!(stats.employees_by_department.get(&1), Some(&2));
        assert_eq!(stats.employees_by_first_name[0], NameCount { name: "Ann".to_string(), count: 2 });
        assert_eq!(stats.employees_by_last_name[0].name, "Smith");
        assert_eq!(stats.employees_by_last_name[1].name, "Brown");
    }

    #[test]
    fn stats_keep_ten_names() {
        let staff: Vec<Employee> = (0..15)
            .map(|i| employee(i, &format!("N{i:02}"), "X", None))
            .collect();
        let stats = EmployeeStats::collect(&staff);
        assert_eq!(stats.employees_by_first_name.len(), TOP_NAMES);
    }

    #[test]
    fn bulk_limits_and_tally() {
        let empty = BulkCreateRequest { employees: vec![] };
        assert!(empty.validate().is_err());

        let response = BulkCreateResponse::from(vec![
            BulkCreateResult::created(0, employee(1, "A", "B", None).into_view()),
            BulkCreateResult::failed(1, "Email already exists: a@b.c"),
        ]);
        assert_eq!(response.total_processed, 2);
        assert_eq!(response.successful, 1);
        assert_eq!(response.failed, 1);
    }
}
