//! Full-text search over imported transactions
//!
//! An in-memory inverted index keyed by lowercase tokens. Terms are kept in a
//! `BTreeMap` so prefix matches are a range scan.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Dataset, Transaction};

/// Weight of an exact token match
const EXACT_WEIGHT: f64 = 1.0;
/// Weight of a prefix match
const PREFIX_WEIGHT: f64 = 0.5;
/// Shortest query term that may match token prefixes
const MIN_PREFIX_LEN: usize = 2;

/// Lowercase and split on anything that is not alphanumeric
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    tf: u32,
}

/// A scored match; `index` points into `Dataset::transactions`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    terms: BTreeMap<String, Vec<Posting>>,
    dates: Vec<NaiveDate>,
}

impl SearchIndex {
    /// Index every transaction of a dataset. Indexed text is the description,
    /// category label and key, account name, group name, currency and type.
    pub fn build(dataset: &Dataset) -> Self {
        let account_names: HashMap<&str, &str> = dataset
            .accounts
            .iter()
            .map(|a| (a.id.as_str(), a.name.as_str()))
            .collect();
        let group_names: HashMap<&str, &str> = dataset
            .groups
            .iter()
            .map(|g| (g.id.as_str(), g.name.as_str()))
            .collect();

        let mut terms: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut dates = Vec::with_capacity(dataset.transactions.len());

        for (doc, tx) in dataset.transactions.iter().enumerate() {
            dates.push(tx.date);

            let text = document_text(
                tx,
                account_names.get(tx.account_id.as_str()).copied(),
                tx.group_id
                    .as_deref()
                    .and_then(|g| group_names.get(g).copied()),
            );

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokenize(&text) {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (token, tf) in counts {
                terms.entry(token).or_default().push(Posting { doc, tf });
            }
        }

        Self { terms, dates }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of distinct tokens
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    fn idf(&self, df: usize) -> f64 {
        (1.0 + self.dates.len() as f64 / df.max(1) as f64).ln()
    }

    /// Scores per document for one query term
    fn term_scores(&self, term: &str) -> HashMap<usize, f64> {
        let mut scores: HashMap<usize, f64> = HashMap::new();

        if let Some(postings) = self.terms.get(term) {
            let idf = self.idf(postings.len());
            for p in postings {
                *scores.entry(p.doc).or_insert(0.0) += EXACT_WEIGHT * p.tf as f64 * idf;
            }
        }

        if term.chars().count() >= MIN_PREFIX_LEN {
            let prefixed = self
                .terms
                .range::<str, _>((std::ops::Bound::Excluded(term), std::ops::Bound::Unbounded))
                .take_while(|(token, _)| token.starts_with(term));
            for (_, postings) in prefixed {
                let idf = self.idf(postings.len());
                for p in postings {
                    *scores.entry(p.doc).or_insert(0.0) += PREFIX_WEIGHT * p.tf as f64 * idf;
                }
            }
        }

        scores
    }

    /// Search with AND semantics across query terms.
    ///
    /// Results are ordered by score, then by date (newest first). An empty
    /// query returns every document newest first.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let terms = tokenize(query);

        let mut hits: Vec<SearchHit> = if terms.is_empty() {
            (0..self.dates.len())
                .map(|index| SearchHit { index, score: 0.0 })
                .collect()
        } else {
            let mut combined: Option<HashMap<usize, f64>> = None;
            for term in &terms {
                let scores = self.term_scores(term);
                combined = Some(match combined {
                    None => scores,
                    Some(prev) => prev
                        .into_iter()
                        .filter_map(|(doc, score)| scores.get(&doc).map(|s| (doc, score + s)))
                        .collect(),
                });
                if combined.as_ref().is_some_and(|c| c.is_empty()) {
                    return Vec::new();
                }
            }
            combined
                .unwrap_or_default()
                .into_iter()
                .map(|(index, score)| SearchHit { index, score })
                .collect()
        };

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| self.dates[b.index].cmp(&self.dates[a.index]))
                .then_with(|| a.index.cmp(&b.index))
        });
        hits
    }
}

fn document_text(tx: &Transaction, account: Option<&str>, group: Option<&str>) -> String {
    let mut text = String::with_capacity(tx.description.len() + 64);
    text.push_str(&tx.description);
    for part in [
        tx.category.label(),
        tx.category.as_str(),
        tx.currency.as_str(),
        tx.tx_type.as_str(),
    ] {
        text.push(' ');
        text.push_str(part);
    }
    for part in [account, group].into_iter().flatten() {
        text.push(' ');
        text.push_str(part);
    }
    text
}

/// A dataset together with its search index
#[derive(Debug, Clone, Default)]
pub struct IndexedDataset {
    pub dataset: Dataset,
    pub index: SearchIndex,
}

impl IndexedDataset {
    pub fn new(dataset: Dataset) -> Self {
        let index = SearchIndex::build(&dataset);
        Self { dataset, index }
    }

    /// Matching transactions in ranked order
    pub fn search(&self, query: &str) -> Vec<&Transaction> {
        self.index
            .search(query)
            .into_iter()
            .filter_map(|hit| self.dataset.transactions.get(hit.index))
            .collect()
    }
}
