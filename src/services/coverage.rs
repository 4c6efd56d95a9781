//! Coverage matrix builder.
//!
//! Derives the per-patient transaction-by-document grid: canonical
//! transaction fingerprints on one axis, source document ids on the other,
//! cells recording presence plus the amount as reported by that document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::transactions::{CanonicalTransaction, ProvenanceMap};

/// One cell of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageCell {
    pub present: bool,
    pub amount: Option<f64>,
}

/// Two-dimensional presence grid keyed by fingerprint, then document id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageMatrix {
    pub document_ids: Vec<String>,
    cells: BTreeMap<String, BTreeMap<String, CoverageCell>>,
}

impl CoverageMatrix {
    pub fn fingerprints(&self) -> Vec<&str> {
        self.cells.keys().map(|k| k.as_str()).collect()
    }

    pub fn cell(&self, fingerprint: &str, document_id: &str) -> Option<CoverageCell> {
        self.cells.get(fingerprint)?.get(document_id).copied()
    }

    pub fn row(&self, fingerprint: &str) -> Option<&BTreeMap<String, CoverageCell>> {
        self.cells.get(fingerprint)
    }

    /// Invariant check: every present cell references a fingerprint that
    /// appears in the reconciler's provenance map.
    pub fn consistent_with(&self, provenance: &ProvenanceMap) -> bool {
        self.cells.iter().all(|(fingerprint, row)| {
            !row.values().any(|cell| cell.present) || provenance.contains_key(fingerprint)
        })
    }
}

/// Build the matrix from the full (pre-deduplication) transaction list, so
/// each document's own reported amount lands in its cell.
pub fn build_coverage_matrix(transactions: &[CanonicalTransaction]) -> CoverageMatrix {
    let mut matrix = CoverageMatrix::default();

    for tx in transactions {
        if !matrix.document_ids.contains(&tx.source_document_id) {
            matrix.document_ids.push(tx.source_document_id.clone());
        }
        matrix
            .cells
            .entry(tx.fingerprint.clone())
            .or_default()
            .insert(
                tx.source_document_id.clone(),
                CoverageCell {
                    present: true,
                    amount: tx.amount,
                },
            );
    }

    matrix.document_ids.sort();
    matrix
}
