use serde::{Deserialize, Serialize};

use hearth_core::ids::PlaceId;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Page request over one place's incidents, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentQuery {
    pub place_id: PlaceId,
    /// Zero means [`DEFAULT_PAGE_SIZE`].
    pub limit: u32,
    /// `next_token` of the previous page.
    pub token: Option<String>,
}

impl IncidentQuery {
    pub fn new(place_id: PlaceId) -> Self {
        Self {
            place_id,
            limit: 0,
            token: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagedResults<T> {
    pub results: Vec<T>,
    /// Id of the first item not returned; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> PagedResults<T> {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            next_token: None,
        }
    }

    pub fn is_last_page(&self) -> bool {
        self.next_token.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_uses_default_page_size() {
        let query = IncidentQuery::new(PlaceId::new());
        assert_eq!(query.effective_limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.with_limit(10).effective_limit(), 10);
    }

    #[test]
    fn empty_page_is_last() {
        let page: PagedResults<u32> = PagedResults::empty();
        assert!(page.results.is_empty());
        assert!(page.is_last_page());
    }
}
