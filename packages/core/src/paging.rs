//! Query/filter/sort builder for list endpoints.
//!
//! Turns a flat set of optional filters plus `page`/`size`/`sort` parameters
//! into a deterministic [`PageDescriptor`]. Entities opt in by implementing
//! [`Sortable`]; filters implement [`Filter`].
//!
//! All page flags are derived from the same two numbers (`total_elements`
//! and `page`) so they can never disagree with each other.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sort direction. Serializes as `"ASC"` / `"DESC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Parses a direction case-insensitively. Anything other than `desc` is ascending.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }

    /// Wire representation (`"ASC"` / `"DESC"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A single-field sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field name in wire (camelCase) form.
    pub field: String,
    /// Direction to sort in.
    pub direction: Direction,
}

impl SortSpec {
    /// Creates a sort spec.
    #[must_use]
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Ascending sort on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    /// Parses `"<field>,<direction>"`.
    ///
    /// Absent or blank input, input without exactly one comma, or an empty
    /// field name all yield `default`. The direction is matched
    /// case-insensitively and anything unrecognised means ascending.
    #[must_use]
    pub fn parse(input: Option<&str>, default: &SortSpec) -> SortSpec {
        let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return default.clone();
        };
        let parts: Vec<&str> = raw.split(',').collect();
        let [field, direction] = parts.as_slice() else {
            return default.clone();
        };
        let field = field.trim();
        if field.is_empty() {
            return default.clone();
        }
        SortSpec::new(field, Direction::parse_lenient(direction))
    }

    /// Returns `self` if `T` can sort on the field, otherwise `default`.
    #[must_use]
    pub fn supported_by<T: Sortable>(&self, default: &SortSpec) -> SortSpec {
        if T::SORT_FIELDS.contains(&self.field.as_str()) {
            self.clone()
        } else {
            default.clone()
        }
    }

    /// Wire description of this sort.
    #[must_use]
    pub fn info(&self) -> SortInfo {
        SortInfo {
            property: self.field.clone(),
            direction: self.direction,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.field, self.direction.as_str().to_ascii_lowercase())
    }
}

/// Applied sort as reported in a [`PageDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortInfo {
    /// Field the page was sorted on.
    pub property: String,
    /// Direction the page was sorted in.
    pub direction: Direction,
}

/// Entities that can be ordered by a named field.
pub trait Sortable {
    /// Field names (camelCase) accepted by [`Sortable::compare_by`].
    const SORT_FIELDS: &'static [&'static str];

    /// Compares two items on `field`. Unknown fields compare equal.
    fn compare_by(&self, other: &Self, field: &str) -> Ordering;

    /// Stable identity used to break ties.
    fn sort_key(&self) -> i64;
}

/// Case-insensitive text comparison with a byte-order tiebreak.
#[must_use]
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Row predicate applied before sorting and slicing.
pub trait Filter<T> {
    /// Returns `true` if `item` should appear in the result set.
    fn matches(&self, item: &T) -> bool;
}

/// Case-insensitive "contains" predicate. Absent or blank needles match everything.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Exact-match predicate for optional foreign keys. Absent expectation matches everything.
#[must_use]
pub fn equals_if_present<V: PartialEq>(value: Option<&V>, expected: Option<&V>) -> bool {
    match expected {
        None => true,
        Some(expected) => value == Some(expected),
    }
}

/// Filter that accepts every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl<T> Filter<T> for MatchAll {
    fn matches(&self, _item: &T) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Page request / descriptor
// ---------------------------------------------------------------------------

/// Zero-based page index plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Maximum number of elements per page.
    pub size: u32,
}

impl PageRequest {
    /// Builds a page request, defaulting absent values.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `size` is outside `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, size: Option<u32>) -> Result<Self, ValidationErrors> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ValidationErrors::single(
                "size",
                format!("size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        Ok(Self {
            page: page.unwrap_or(0),
            size,
        })
    }

    /// Number of elements skipped before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a sorted, filtered result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor<T> {
    /// Elements on this page.
    pub content: Vec<T>,
    /// Zero-based page index.
    pub page: u32,
    /// Requested page size.
    pub size: u32,
    /// Number of elements across all pages.
    pub total_elements: u64,
    /// Number of pages (`ceil(total_elements / size)`).
    pub total_pages: u64,
    /// Sort that was actually applied.
    pub sort: SortInfo,
    /// `true` on page 0.
    pub first: bool,
    /// `true` when there is no next page.
    pub last: bool,
    /// `page + 1 < total_pages`.
    pub has_next: bool,
    /// `page > 0`.
    pub has_previous: bool,
}

impl<T> PageDescriptor<T> {
    /// Assembles a descriptor from an already-sliced page and the overall count.
    #[must_use]
    pub fn from_parts(
        content: Vec<T>,
        request: PageRequest,
        total_elements: u64,
        sort: &SortSpec,
    ) -> Self {
        let total_pages = total_elements.div_ceil(u64::from(request.size.max(1)));
        let has_next = u64::from(request.page) + 1 < total_pages;
        let has_previous = request.page > 0;
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
            sort: sort.info(),
            first: !has_previous,
            last: !has_next,
            has_next,
            has_previous,
        }
    }

    /// Transforms the page content while keeping the paging metadata.
    pub fn map<U, F>(self, f: F) -> PageDescriptor<U>
    where
        F: FnMut(T) -> U,
    {
        PageDescriptor {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            sort: self.sort,
            first: self.first,
            last: self.last,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }

    /// Replaces the content with an already-transformed vector of the same length.
    #[must_use]
    pub fn with_content<U>(self, content: Vec<U>) -> PageDescriptor<U> {
        PageDescriptor {
            content,
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            sort: self.sort,
            first: self.first,
            last: self.last,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Filters, sorts and slices `items` into a page.
///
/// Sorting is stable and ties are broken by [`Sortable::sort_key`], so the
/// same input always yields the same page. A sort on a field `T` does not
/// support is replaced by `default_sort`; the descriptor reports the sort
/// that was actually applied.
pub fn build_page<T, F, I>(
    items: I,
    filter: &F,
    request: PageRequest,
    sort: &SortSpec,
    default_sort: &SortSpec,
) -> PageDescriptor<T>
where
    T: Sortable,
    F: Filter<T> + ?Sized,
    I: IntoIterator<Item = T>,
{
    let applied = sort.supported_by::<T>(default_sort);

    let mut matching: Vec<T> = items.into_iter().filter(|item| filter.matches(item)).collect();
    matching.sort_by(|a, b| {
        applied
            .direction
            .apply(a.compare_by(b, &applied.field))
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });

    let total = matching.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let content: Vec<T> = matching
        .into_iter()
        .skip(offset)
        .take(request.size as usize)
        .collect();

    PageDescriptor::from_parts(content, request, total, &applied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
