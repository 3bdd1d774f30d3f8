//! Page/sort request parsing and the page envelope shared by every list endpoint.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::common::app_error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `"desc"` in any casing sorts descending; anything else sorts ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// Raw query string of a paged listing. Missing values fall back to per-endpoint defaults.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Zero-based page index.
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    /// `asc` or `desc`.
    pub sort_dir: Option<String>,
}

impl PageQuery {
    pub fn resolve(self, default_sort_by: &str, default_dir: SortDirection) -> Result<PageRequest, AppError> {
        let page_number = self.page_number.unwrap_or(0);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page_number < 0 {
            return Err(AppError::bad_request("Page index must not be less than zero"));
        }
        if page_size < 1 {
            return Err(AppError::bad_request("Page size must not be less than one"));
        }
        if page_size > MAX_PAGE_SIZE {
            return Err(AppError::bad_request(format!(
                "Page size must not be greater than {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(PageRequest {
            page_number,
            page_size,
            sort_by: self.sort_by.unwrap_or_else(|| default_sort_by.to_string()),
            direction: self
                .sort_dir
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or(default_dir),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: i64,
    pub page_size: i64,
    pub sort_by: String,
    pub direction: SortDirection,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        self.page_number.saturating_mul(self.page_size)
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct PageableResponse<T> {
    pub content: Vec<T>,
    pub page_number: i64,
    pub page_size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
    pub last_page: bool,
}

impl<T> PageableResponse<T> {
    /// Wrap one page of rows, mapping each row into its response shape.
    pub fn from_rows<U, F>(rows: Vec<U>, total_elements: i64, request: &PageRequest, map: F) -> Self
    where
        F: FnMut(U) -> T,
    {
        let total_pages = if total_elements <= 0 || request.page_size <= 0 {
            0
        } else {
            total_elements / request.page_size + i64::from(total_elements % request.page_size != 0)
        };

        tracing::debug!(
            page = request.page_number,
            size = request.page_size,
            total_elements,
            "Building pageable response"
        );

        PageableResponse {
            content: rows.into_iter().map(map).collect(),
            page_number: request.page_number,
            page_size: request.page_size,
            total_elements,
            total_pages,
            last_page: request.page_number.saturating_add(1) >= total_pages,
        }
    }
}

/// Order a boxed diesel query by a user-supplied field name.
///
/// Expands to a `Result` so unknown field names surface as `BadRequest`.
macro_rules! sort_boxed {
    ($query:expr, $request:expr, { $($field:pat => $column:expr),+ $(,)? }) => {
        match $request.sort_by.as_str() {
            $($field => Ok(match $request.direction {
                $crate::pagination::SortDirection::Asc => $query.order_by($column.asc()),
                $crate::pagination::SortDirection::Desc => $query.order_by($column.desc()),
            }),)+
            other => Err($crate::common::app_error::AppError::BadRequest(format!(
                "Cannot sort by unknown field '{}'",
                other
            ))),
        }
    };
}

pub(crate) use sort_boxed;

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn request(page_number: i64, page_size: i64) -> PageRequest {
        PageRequest {
            page_number,
            page_size,
            sort_by: "title".into(),
            direction: SortDirection::Asc,
        }
    }

    #[test]
    fn direction_parsing_is_case_insensitive() {
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
    }

    #[test]
    fn query_defaults_are_applied() -> TestResult {
        let page = PageQuery::default().resolve("order_date", SortDirection::Desc)?;

        assert_eq!(page.page_number, 0);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.sort_by, "order_date");
        assert_eq!(page.direction, SortDirection::Desc);
        Ok(())
    }

    #[test]
    fn negative_page_and_empty_size_are_rejected() {
        let negative = PageQuery {
            page_number: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            negative.resolve("title", SortDirection::Asc),
            Err(AppError::BadRequest(_))
        ));

        let empty = PageQuery {
            page_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            empty.resolve("title", SortDirection::Asc),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn page_math_on_partial_last_page() {
        let page = PageableResponse::from_rows(vec![1, 2], 12, &request(1, 5), |n| n * 10);

        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.last_page);
        assert_eq!(request(1, 5).offset(), 5);
    }

    #[test]
    fn last_page_is_flagged() {
        let page = PageableResponse::from_rows(vec![1, 2], 12, &request(2, 5), |n| n);
        assert!(page.last_page);
    }

    #[test]
    fn empty_result_is_a_single_last_page() {
        let page = PageableResponse::<i32>::from_rows(Vec::<i32>::new(), 0, &request(0, 10), |n| n);

        assert_eq!(page.total_pages, 0);
        assert!(page.last_page);
        assert!(page.content.is_empty());
    }

    #[test]
    fn oversized_page_is_rejected() {
        let huge = PageQuery {
            page_size: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            huge.resolve("title", SortDirection::Asc),
            Err(AppError::BadRequest(_))
        ));

        let capped = PageQuery {
            page_size: Some(MAX_PAGE_SIZE),
            page_number: Some(i64::MAX),
            ..Default::default()
        };
        assert!(capped.resolve("title", SortDirection::Asc).is_ok());
    }

    #[test]
    fn page_math_survives_extreme_values() {
        let widest = PageableResponse::<i32>::from_rows(Vec::new(), 3, &request(0, i64::MAX), |n| n);
        assert_eq!(widest.total_pages, 1);
        assert!(widest.last_page);

        let farthest = PageableResponse::<i32>::from_rows(Vec::new(), 10, &request(i64::MAX, 3), |n| n);
        assert_eq!(farthest.total_pages, 4);
        assert!(farthest.last_page);

        let everything = PageableResponse::<i32>::from_rows(Vec::new(), i64::MAX, &request(0, 1), |n| n);
        assert_eq!(everything.total_pages, i64::MAX);
        assert!(!everything.last_page);
    }
}
