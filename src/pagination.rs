use anyhow::{bail, Result};
use async_graphql::Enum;
use serde::{Deserialize, Serialize};

use crate::{
    database::Trial,
    search::{self, FilterState, SearchCriterion, SortSpec, TrialQuery},
};

/// The page sizes offered by the dashboard.
#[derive(Enum, Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub(crate) enum PageSize {
    #[default]
    Twelve,
    TwentyFive,
    Fifty,
    OneHundred,
}

impl PageSize {
    pub(crate) fn get(self) -> usize {
        match self {
            Self::Twelve => 12,
            Self::TwentyFive => 25,
            Self::Fifty => 50,
            Self::OneHundred => 100,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = anyhow::Error;

    fn try_from(size: usize) -> Result<Self> {
        Ok(match size {
            12 => Self::Twelve,
            25 => Self::TwentyFive,
            50 => Self::Fifty,
            100 => Self::OneHundred,
            _ => bail!("unsupported page size {size}; expected 12, 25, 50 or 100"),
        })
    }
}

/// `ceil(count / size)`.
pub(crate) fn total_pages(count: usize, size: PageSize) -> usize {
    count.div_ceil(size.get())
}

/// The 1-indexed `page` of `items`. Pages out of range are empty.
pub(crate) fn page<T>(items: &[T], size: PageSize, page: usize) -> &[T] {
    if page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(size.get());
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(size.get()).min(items.len());
    &items[start..end]
}

/// One page of an evaluated trial list.
pub(crate) struct TrialPage<'a> {
    pub(crate) trials: &'a [&'a Trial],
    pub(crate) total_count: usize,
    pub(crate) total_pages: usize,
}

/// A dashboard view: the query, the page size and the current page.
///
/// Any change to the page size or to the query puts the view back on the
/// first page.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ViewState {
    query: TrialQuery,
    page_size: PageSize,
    current_page: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            query: TrialQuery::default(),
            page_size: PageSize::default(),
            current_page: 1,
        }
    }
}

impl ViewState {
    pub(crate) fn current_page(&self) -> usize {
        self.current_page
    }

    pub(crate) fn go_to_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    pub(crate) fn set_page_size(&mut self, size: PageSize) {
        self.page_size = size;
        self.current_page = 1;
    }

    pub(crate) fn set_search_term(&mut self, term: impl Into<String>) {
        self.query.search_term = term.into();
        self.current_page = 1;
    }

    pub(crate) fn set_filters(&mut self, filters: FilterState) {
        self.query.filters = filters;
        self.current_page = 1;
    }

    pub(crate) fn set_criteria(&mut self, criteria: Vec<SearchCriterion>) {
        self.query.criteria = criteria;
        self.current_page = 1;
    }

    pub(crate) fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.query.sort = sort;
        self.current_page = 1;
    }

    /// Evaluates the query over `trials`; the result backs the returned page.
    pub(crate) fn evaluate<'a>(&self, trials: &'a [Trial]) -> Vec<&'a Trial> {
        search::evaluate(trials, &self.query)
    }

    pub(crate) fn paginate<'a>(&self, filtered: &'a [&'a Trial]) -> TrialPage<'a> {
        TrialPage {
            trials: page(filtered, self.page_size, self.current_page),
            total_count: filtered.len(),
            total_pages: total_pages(filtered.len(), self.page_size),
        }
    }
}
