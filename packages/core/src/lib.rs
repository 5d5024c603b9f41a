//! `OrgMesh` Core: department/employee domain, lifecycle events, paging.
//!
//! Pure domain types shared by both services. Nothing here performs I/O or
//! depends on an async runtime.

pub mod clock;
pub mod department;
pub mod employee;
pub mod events;
pub mod paging;
pub mod validation;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use department::{
    Department, DepartmentEmployees, DepartmentFilter, DepartmentSnapshot, DepartmentUpdate,
    Headcount, NewDepartment,
};
pub use employee::{
    BulkCreateRequest, BulkCreateResponse, BulkCreateResult, Employee, EmployeeFilter,
    EmployeeStats, EmployeeSummary, EmployeeUpdate, EmployeeView, NewEmployee, Roster,
};
pub use events::{
    DepartmentEvent, EmployeeEvent, EntityKind, EventDecodeError, EventType, LifecycleAction,
    LifecycleEvent, Topic,
};
pub use paging::{Direction, Filter, PageDescriptor, PageRequest, SortSpec, Sortable};
pub use validation::{FieldError, Validate, ValidationErrors};
