//! Subscription query building
//!
//! Immutable builder: every combinator consumes the builder and returns a
//! new value; nothing talks to the store until the query is handed to a
//! [`ResourceStore`](crate::store::ResourceStore).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::model::{Subscription, SubscriptionStatus};
use crate::scope::ScopeMetadata;
use crate::store::ResourceStore;

/// One page of subscriptions plus the query-level record count.
///
/// `total` is the store-reported count independent of the page size for
/// structured queries. Search-mode results report the de-duplicated union
/// size instead; see [`search`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionPage {
    pub records: Vec<Subscription>,
    pub total: u64,
}

/// A flat key/value filter list; one term set per search sub-query.
pub type TermSet = Vec<(String, String)>;

/// Composable read query against the remote resource store.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionQuery {
    filters: BTreeMap<String, String>,
    includes: Vec<String>,
    metadata: ScopeMetadata,
    page: Option<(u32, u32)>,
}

impl SubscriptionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status scope: `visible` for default context, `staged` for
    /// cart/staging context.
    pub fn status(self, status: SubscriptionStatus) -> Self {
        self.filter("status", status.as_str())
    }

    pub fn organization(self, organization_id: &str) -> Self {
        self.filter("organization_id", organization_id)
    }

    pub fn id(self, id: &str) -> Self {
        self.filter("id", id)
    }

    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn includes(mut self, includes: &[&str]) -> Self {
        self.includes = includes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn metadata(mut self, metadata: ScopeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn page(mut self, number: u32, size: u32) -> Self {
        self.page = Some((number, size));
        self
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn scope(&self) -> &ScopeMetadata {
        &self.metadata
    }

    pub fn included(&self) -> &[String] {
        &self.includes
    }

    pub fn pagination(&self) -> Option<(u32, u32)> {
        self.page
    }

    /// Wire encoding for the HTTP store: `filter[...]`, `include`,
    /// `_metadata[...]`, `page[number]`/`page[size]`.
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for (key, value) in &self.filters {
            params.push((format!("filter[{key}]"), value.clone()));
        }
        if !self.includes.is_empty() {
            params.push(("include".to_string(), self.includes.join(",")));
        }
        for (key, value) in self.metadata.iter() {
            params.push((format!("_metadata[{key}]"), value.to_string()));
        }
        if let Some((number, size)) = self.page {
            params.push(("page[number]".to_string(), number.to_string()));
            params.push(("page[size]".to_string(), size.to_string()));
        }
        params
    }
}

/// Parses the `terms` search parameter: a JSON array of flat key/value
/// lists, e.g. `[["organization_id","org-1"],["currency","USD"]]`.
pub fn parse_terms(raw: &str) -> CoreResult<Vec<TermSet>> {
    let parsed: Vec<Vec<Value>> = serde_json::from_str(raw).map_err(|_| {
        CoreError::Validation(FieldErrors::single(
            "terms",
            "must be a JSON array of flat key/value lists",
        ))
    })?;

    let mut term_sets = Vec::with_capacity(parsed.len());
    for flat in parsed {
        if flat.len() % 2 != 0 {
            return Err(CoreError::Validation(FieldErrors::single(
                "terms",
                "each term set must contain key/value pairs",
            )));
        }
        let mut terms = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks(2) {
            let key = pair[0].as_str().ok_or_else(|| {
                CoreError::Validation(FieldErrors::single("terms", "keys must be strings"))
            })?;
            let value = match &pair[1] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            terms.push((key.to_string(), value));
        }
        term_sets.push(terms);
    }
    Ok(term_sets)
}

/// Search mode: run one structured query per term set and union the results,
/// de-duplicating by subscription id.
///
/// The caller-visible count is the size of the returned union, not a
/// store-computed pagination total. Sub-queries run sequentially.
pub async fn search<S: ResourceStore + ?Sized>(
    store: &S,
    base: SubscriptionQuery,
    term_sets: Vec<TermSet>,
) -> CoreResult<Vec<Subscription>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut union = Vec::new();
    for terms in term_sets {
        let mut query = base.clone();
        for (key, value) in &terms {
            query = query.filter(key, value);
        }
        let page = store.list_subscriptions(query).await?;
        for record in page.records {
            if seen.insert(record.id.clone()) {
                union.push(record);
            }
        }
    }
    Ok(union)
}
