//! Transaction normalization and cross-document reconciliation.
//!
//! Maps every line item family onto one canonical transaction shape keyed
//! by a stable fingerprint, so the same billable event reported in two
//! documents (a provider bill and its EOB, say) collapses to one record
//! with full provenance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::DocumentFacts;
use crate::utils::{round2, to_cents};

/// Line-item family a canonical transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionVariant {
    Medical,
    Dental,
    Pharmacy,
    Insurance,
    Fsa,
}

/// Cross-document-deduplicable representation of one billable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub fingerprint: String,
    pub source_document_id: String,
    pub normalized_description: String,
    pub date: Option<String>,
    pub procedure_code: Option<String>,
    pub amount: Option<f64>,
    pub provider: Option<String>,
    pub variant: TransactionVariant,
}

impl CanonicalTransaction {
    /// Count of populated optional fields, used to pick the canonical
    /// record inside a fingerprint group.
    fn populated_fields(&self) -> usize {
        [
            self.date.is_some(),
            self.procedure_code.is_some(),
            self.amount.is_some(),
            self.provider.is_some(),
            !self.normalized_description.is_empty(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// Fingerprint by fingerprint list of source document ids.
pub type ProvenanceMap = BTreeMap<String, Vec<String>>;

fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Deterministic fingerprint over (ISO date, code, cents, provider).
///
/// The code component falls back to the normalized description when the
/// item family carries no procedure/CDT/merchant code.
fn fingerprint(
    date: Option<&str>,
    code: Option<&str>,
    amount: Option<f64>,
    provider: Option<&str>,
) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        date.unwrap_or(""),
        code.map(|c| c.trim().to_lowercase()).unwrap_or_default(),
        amount.map(to_cents).unwrap_or(-1),
        provider.map(normalize_text).unwrap_or_default(),
    );
    let digest = Sha256::digest(material.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Map every line item attached to the fact map into canonical form.
pub fn normalize_line_items(
    facts: &DocumentFacts,
    source_document_id: &str,
) -> Vec<CanonicalTransaction> {
    let mut transactions = Vec::new();
    let doc_provider = facts.provider_name.as_deref();

    for item in facts.medical_items() {
        let amount = item.billed.or(item.patient_responsibility).map(round2);
        let code = item.cpt_code.as_deref();
        let description = item.description.as_deref().unwrap_or_default();
        transactions.push(CanonicalTransaction {
            fingerprint: fingerprint(
                item.date_of_service.as_deref(),
                code.or(Some(description)),
                amount,
                doc_provider,
            ),
            source_document_id: source_document_id.to_string(),
            normalized_description: normalize_text(description),
            date: item.date_of_service.clone(),
            procedure_code: item.cpt_code.clone(),
            amount,
            provider: doc_provider.map(normalize_text),
            variant: TransactionVariant::Medical,
        });
    }

    for item in facts.dental_items() {
        let amount = item.billed.or(item.patient_responsibility).map(round2);
        let code = item.cdt_code.as_deref();
        let description = item.description.as_deref().unwrap_or_default();
        transactions.push(CanonicalTransaction {
            fingerprint: fingerprint(
                item.date_of_service.as_deref(),
                code.or(Some(description)),
                amount,
                doc_provider,
            ),
            source_document_id: source_document_id.to_string(),
            normalized_description: normalize_text(description),
            date: item.date_of_service.clone(),
            procedure_code: item.cdt_code.clone(),
            amount,
            provider: doc_provider.map(normalize_text),
            variant: TransactionVariant::Dental,
        });
    }

    for item in facts.receipt_item_list() {
        let amount = item.amount.map(round2);
        let description = item.description.as_deref().unwrap_or_default();
        transactions.push(CanonicalTransaction {
            fingerprint: fingerprint(
                facts.date_of_service.as_deref(),
                Some(description),
                amount,
                doc_provider,
            ),
            source_document_id: source_document_id.to_string(),
            normalized_description: normalize_text(description),
            date: facts.date_of_service.clone(),
            procedure_code: None,
            amount,
            provider: doc_provider.map(normalize_text),
            variant: TransactionVariant::Pharmacy,
        });
    }

    for item in facts.insurance_items() {
        let amount = item.billed.map(round2);
        let provider = item.provider.as_deref().or(doc_provider);
        transactions.push(CanonicalTransaction {
            fingerprint: fingerprint(item.date.as_deref(), provider, amount, provider),
            source_document_id: source_document_id.to_string(),
            normalized_description: normalize_text(item.provider.as_deref().unwrap_or_default()),
            date: item.date.clone(),
            procedure_code: None,
            amount,
            provider: provider.map(normalize_text),
            variant: TransactionVariant::Insurance,
        });
    }

    for item in facts.fsa_items() {
        let amount = item.amount_submitted.map(round2);
        let description = item.description.as_deref().unwrap_or_default();
        transactions.push(CanonicalTransaction {
            fingerprint: fingerprint(
                item.date_submitted.as_deref(),
                item.merchant.as_deref().or(Some(description)),
                amount,
                item.merchant.as_deref(),
            ),
            source_document_id: source_document_id.to_string(),
            normalized_description: normalize_text(description),
            date: item.date_submitted.clone(),
            procedure_code: None,
            amount,
            provider: item.merchant.as_deref().map(normalize_text),
            variant: TransactionVariant::Fsa,
        });
    }

    transactions
}

/// Group transactions by fingerprint. The record kept for each group is
/// the one with the most populated fields (tie-break: earliest source
/// document id lexicographically); the provenance map records every source
/// document id per fingerprint.
pub fn deduplicate_transactions(
    transactions: Vec<CanonicalTransaction>,
) -> (BTreeMap<String, CanonicalTransaction>, ProvenanceMap) {
    let mut unique: BTreeMap<String, CanonicalTransaction> = BTreeMap::new();
    let mut provenance: ProvenanceMap = BTreeMap::new();

    for tx in transactions {
        let sources = provenance.entry(tx.fingerprint.clone()).or_default();
        if !sources.contains(&tx.source_document_id) {
            sources.push(tx.source_document_id.clone());
        }

        match unique.get(&tx.fingerprint) {
            None => {
                unique.insert(tx.fingerprint.clone(), tx);
            },
            Some(existing) => {
                let replace = tx.populated_fields() > existing.populated_fields()
                    || (tx.populated_fields() == existing.populated_fields()
                        && tx.source_document_id < existing.source_document_id);
                if replace {
                    unique.insert(tx.fingerprint.clone(), tx);
                }
            },
        }
    }

    for sources in provenance.values_mut() {
        sources.sort();
    }

    (unique, provenance)
}

/// Stable identity fingerprint for one analyzed document, derived from its
/// normalized facts.
pub fn document_fingerprint(facts: &DocumentFacts) -> String {
    let material = format!(
        "{}|{}|{}|{}|{}",
        facts
            .document_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        facts.patient_name.as_deref().unwrap_or(""),
        facts.provider_name.as_deref().unwrap_or(""),
        facts.date_of_service.as_deref().unwrap_or(""),
        facts.receipt_number.as_deref().unwrap_or(""),
    );
    let digest = Sha256::digest(material.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, MedicalLineItem};

    fn bill_facts(provider: &str, cpt: &str, dos: &str, billed: f64) -> DocumentFacts {
        let mut facts = DocumentFacts::default();
        facts.provider_name = Some(provider.to_string());
        facts.medical_line_items = Some(vec![MedicalLineItem {
            date_of_service: Some(dos.to_string()),
            description: Some("Office visit".to_string()),
            cpt_code: Some(cpt.to_string()),
            billed: Some(billed),
            ..Default::default()
        }]);
        facts
    }

    #[test]
    fn identical_items_from_two_documents_share_a_fingerprint() {
        let a = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-a");
        let b = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-b");
        assert_eq!(a[0].fingerprint, b[0].fingerprint);

        let (unique, provenance) = deduplicate_transactions([a, b].concat());
        assert_eq!(unique.len(), 1);
        let sources = provenance.values().next().unwrap();
        assert_eq!(sources, &vec!["doc-a".to_string(), "doc-b".to_string()]);
    }

    #[test]
    fn differing_amounts_do_not_collapse() {
        let a = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-a");
        let b = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 125.0), "doc-b");
        assert_ne!(a[0].fingerprint, b[0].fingerprint);
    }

    #[test]
    fn most_populated_record_wins_the_group() {
        let full = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-b");

        let mut sparse_facts = bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0);
        if let Some(items) = sparse_facts.medical_line_items.as_mut() {
            items[0].description = None;
        }
        let sparse = normalize_line_items(&sparse_facts, "doc-a");

        assert_eq!(full[0].fingerprint, sparse[0].fingerprint);
        let (unique, _) = deduplicate_transactions([sparse, full].concat());
        let kept = unique.values().next().unwrap();
        assert_eq!(kept.source_document_id, "doc-b");
        assert_eq!(kept.normalized_description, "office visit");
    }

    #[test]
    fn equal_population_ties_break_to_earliest_document_id() {
        let a = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-b");
        let b = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-a");
        let (unique, _) = deduplicate_transactions([a, b].concat());
        assert_eq!(unique.values().next().unwrap().source_document_id, "doc-a");
    }

    #[test]
    fn fingerprint_ignores_provider_case_and_spacing() {
        let a = normalize_line_items(&bill_facts("Dr.  Nguyen", "99213", "2024-01-15", 120.0), "doc-a");
        let b = normalize_line_items(&bill_facts("dr. nguyen", "99213", "2024-01-15", 120.0), "doc-b");
        assert_eq!(a[0].fingerprint, b[0].fingerprint);
    }

    #[test]
    fn every_item_family_produces_a_variant() {
        use crate::models::{DentalLineItem, FsaClaimItem, InsuranceClaimItem, ReceiptItem};

        let mut facts = DocumentFacts::default();
        facts.date_of_service = Some("2024-01-15".into());
        facts.medical_line_items = Some(vec![MedicalLineItem::default()]);
        facts.dental_line_items = Some(vec![DentalLineItem::default()]);
        facts.receipt_items = Some(vec![ReceiptItem::default()]);
        facts.insurance_claim_items = Some(vec![InsuranceClaimItem::default()]);
        facts.fsa_claim_items = Some(vec![FsaClaimItem::default()]);

        let txs = normalize_line_items(&facts, "doc-1");
        let variants: Vec<_> = txs.iter().map(|t| t.variant).collect();
        assert_eq!(
            variants,
            vec![
                TransactionVariant::Medical,
                TransactionVariant::Dental,
                TransactionVariant::Pharmacy,
                TransactionVariant::Insurance,
                TransactionVariant::Fsa,
            ]
        );
    }

    #[test]
    fn document_fingerprint_is_stable_over_facts() {
        let mut facts = DocumentFacts::default();
        facts.document_type = Some(DocumentType::MedicalBill);
        facts.patient_name = Some("jane sample".into());
        let a = document_fingerprint(&facts);
        let b = document_fingerprint(&facts);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        facts.patient_name = Some("john sample".into());
        assert_ne!(document_fingerprint(&facts), a);
    }
}
