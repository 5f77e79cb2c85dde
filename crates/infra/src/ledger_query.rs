//! Ledger query interface.
//!
//! Read-only, always scoped to one location and paginated. Rows are ordered
//! newest first; entries created in the same instant are ordered by id
//! descending, so the order is total and stable across pages.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::SpecCombination;
use stockledger_core::{AccountId, DomainError, DomainResult, ProductId};
use stockledger_inventory::{LedgerAction, LedgerEntry};

pub const DEFAULT_PAGE_SIZE: u32 = 15;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Missing or zero values fall back to page 1 / `default_size`; size is
    /// capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            page_size: page_size
                .filter(|s| *s > 0)
                .unwrap_or(default_size)
                .min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Optional narrowing of a ledger query. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub account_id: Option<AccountId>,
    pub action: Option<LedgerAction>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
    /// Code/value pairs the owning product's combination must contain.
    pub spec: BTreeMap<String, String>,
}

impl LedgerFilter {
    /// Calendar-date range: from the start of `start` up to, but excluding, the
    /// day after `end`. Either side may be open.
    pub fn with_dates(
        mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                return Err(DomainError::validation("end_date is before start_date"));
            }
        }
        self.from = start.map(start_of_day);
        self.until = match end {
            Some(e) => Some(start_of_day(e.checked_add_days(Days::new(1)).ok_or_else(
                || DomainError::validation("end_date out of range"),
            )?)),
            None => None,
        };
        Ok(self)
    }

    pub fn matches(&self, entry: &LedgerEntry, combination: &SpecCombination) -> bool {
        self.account_id.is_none_or(|id| entry.account_id == id)
            && self.action.is_none_or(|a| entry.action == a)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.until.is_none_or(|until| entry.created_at < until)
            && combination.matches_all(&self.spec)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// A ledger entry joined with what a reader needs to recognise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub product_id: ProductId,
    pub product_name: String,
    pub display_name: String,
    pub spec_combination: SpecCombination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPage {
    pub rows: Vec<LedgerRow>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl LedgerPage {
    pub fn new(rows: Vec<LedgerRow>, total: u64, pagination: Pagination) -> Self {
        let has_more = pagination.offset() + (rows.len() as u64) < total;
        Self {
            rows,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            has_more,
        }
    }
}
