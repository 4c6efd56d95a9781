//! Prompt builders for fact extraction and phase-2 line-item parsing.
//!
//! The pipeline treats these as opaque strings: each builder takes the raw
//! document text and returns the byte-exact prompt submitted to the chosen
//! backend.

use crate::models::FACT_KEYS;

/// Provider-agnostic prompt for structured fact extraction (phase 1).
pub fn build_fact_extraction_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting structured facts from healthcare-related documents.

The document may be:
- a medical bill
- a hospital or provider statement
- a pharmacy receipt
- an FSA or HSA receipt
- an FSA or HSA claim history
- an insurance document
- an insurance claim history

Return ONLY a valid JSON object with EXACTLY these keys:
{keys}

-----------------------------------
FIELD EXTRACTION RULES
-----------------------------------

patient_name:
- Only if explicitly labeled (e.g., "Patient Name")
- Do NOT infer from prescriptions or insurance

date_of_birth:
- Only if explicitly present

date_of_service:
- Medical bills: "Date of Service"
- Receipts: transaction or purchase date
- Prefer service/transaction date over statement date

time_of_service:
- Receipt time if explicitly present (e.g., "Time: 3:42 PM")
- Otherwise null

provider_name:
- Medical bills: rendering provider or physician
- Pharmacy receipts: pharmacy or merchant name (usually the first
  prominent text block, often repeated)

facility_name:
- Hospitals, clinics, or store locations
- May include department or location name
- For pharmacy receipts, may match provider_name

address:
- Full street address if present, as a single string

phone_number:
- Phone number if explicitly present, any common format

procedure_code:
- CPT / HCPCS codes only if explicitly present
- Do NOT invent codes
- Usually null for receipts

receipt_number:
- Receipt, transaction, or order number

store_id:
- Store number or location identifier

document_type:
Choose exactly ONE of: medical_bill, dental_bill, pharmacy_receipt,
insurance_eob, insurance_claim_history, insurance_document,
fsa_claim_history, fsa_receipt, unknown.

DATE HANDLING RULES:
- If the document contains multiple dates of service:
  set date_of_service to null, date_range_start to the earliest date,
  and date_range_end to the latest date.
- If only one relevant date exists: populate date_of_service and leave
  the range fields null.

IMPORTANT CLASSIFICATION PRIORITY (highest wins):
1. If CDT dental codes (Dxxxx) are present -> dental_bill
2. Else if CPT or HCPCS codes are present -> medical_bill
3. Else if receipt number + prices + merchant -> pharmacy_receipt
4. Else if plan year + balances + reimbursements -> fsa_claim_history
5. Else if deductible / allowed / paid / copay table -> insurance_claim_history
6. Else -> unknown

-----------------------------------
OUTPUT RULES
-----------------------------------

- Extract VALUES only (no labels)
- Do NOT infer missing information
- Use null for missing values
- Do NOT include extra keys
- Do NOT include explanations, markdown, or commentary

-----------------------------------
DOCUMENT:
-----------------------------------
{document_text}
"#,
        keys = FACT_KEYS.join(", "),
        document_text = document_text,
    )
}

/// Phase-2 prompt: purchasable items on a retail or pharmacy receipt.
pub fn build_receipt_line_item_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting line items from a retail or pharmacy receipt.

Extract EACH purchasable item listed on the receipt.

Return ONLY valid JSON in the following format:

{{
  "receipt_items": [
    {{
      "description": "string",
      "amount": number,
      "fsa_eligible": boolean | null,
      "eligibility_reason": string | null
    }}
  ]
}}

RULES:
- Use the item description exactly as written
- Parse dollar amounts as numbers (no $ symbol)
- If FSA eligibility is stated, capture it; otherwise set fsa_eligible to null
- Do NOT invent CPT or medical codes
- Do NOT include totals as line items
- Ignore headers like "Item", "Amount", "Total"

Each receipt item must correspond to a purchasable product or copay.

DOCUMENT:
{document_text}
"#
    )
}

/// Phase-2 prompt: billed service rows on a medical bill.
pub fn build_medical_line_item_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting MEDICAL BILL LINE ITEMS from a provider statement.

ONLY extract rows from sections labeled like:
- Itemized Charges
- Service Description
- CPT
- Billed / Allowed / Patient Responsibility

DO NOT:
- Extract insurance payments
- Extract claim history
- Extract totals or summaries

Each item must represent a single billed service.

Return JSON in this exact format:

{{
  "medical_line_items": [
    {{
      "date_of_service": "YYYY-MM-DD or null",
      "description": "string",
      "cpt_code": "string or null",
      "billed": number or null,
      "allowed": number or null,
      "patient_responsibility": number or null,
      "units": number or null
    }}
  ]
}}

If no medical line items exist, return:

{{
  "medical_line_items": []
}}

RAW DOCUMENT:
"""
{document_text}
"""
"#
    )
}

/// Phase-2 prompt: billed procedure rows on a dental bill.
pub fn build_dental_line_item_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting DENTAL BILL LINE ITEMS from a dental provider statement.

ONLY extract rows that represent a single billed dental procedure.

DO NOT:
- Extract insurance payments or plan summaries
- Extract totals or account balances

Return JSON in this exact format:

{{
  "dental_line_items": [
    {{
      "date_of_service": "YYYY-MM-DD or null",
      "description": "string",
      "cdt_code": "string or null",
      "tooth_number": "string or null",
      "billed": number or null,
      "patient_responsibility": number or null
    }}
  ]
}}

RULES:
- CDT codes look like D followed by four digits (e.g., D2750)
- Capture tooth numbers when shown next to the procedure
- Parse money values as numbers (no $)
- Lab fees are separate line items when billed separately

If no dental line items exist, return:

{{
  "dental_line_items": []
}}

RAW DOCUMENT:
"""
{document_text}
"""
"#
    )
}

/// Phase-2 prompt: adjudicated claim rows on an EOB or claim history.
pub fn build_insurance_claim_item_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting claim rows from an insurance EOB or claim history.

Extract EACH adjudicated claim row.

Return ONLY valid JSON in the following format:

{{
  "insurance_claim_items": [
    {{
      "date": "YYYY-MM-DD | null",
      "provider": "string | null",
      "billed": number | null,
      "allowed": number | null,
      "insurance_paid": number | null,
      "patient_responsibility": number | null,
      "status": "string | null"
    }}
  ]
}}

RULES:
- Only include actual claim rows (NOT deductible or plan summaries)
- Keep duplicates as separate entries (do NOT merge them)
- Parse money values as numbers (no $)
- Status examples: Paid, Denied, Pending. If missing, null.
- Return JSON only. No markdown, no commentary.

DOCUMENT:
{document_text}
"#
    )
}

/// Phase-2 prompt: reimbursement decision rows on an FSA/HSA claim history.
pub fn build_fsa_claim_item_prompt(document_text: &str) -> String {
    format!(
        r#"
You are extracting claim rows from an FSA/HSA claim history.

Extract EACH row in the "Recent Claims" (or similar) table.

Return ONLY valid JSON in the following format:

{{
  "fsa_claim_items": [
    {{
      "date_submitted": "YYYY-MM-DD | null",
      "merchant": "string | null",
      "description": "string",
      "amount_submitted": number | null,
      "amount_reimbursed": number | null,
      "status": "string | null"
    }}
  ]
}}

RULES:
- Only include actual claim rows (NOT account summary).
- Keep duplicates as separate entries (do NOT merge them).
- Parse money values as numbers (no $).
- Status examples: Approved, Denied, Pending. If missing, null.
- Return JSON only. No markdown, no commentary.

Each row must represent a reimbursement decision, not a purchase.

DOCUMENT:
{document_text}
"#
    )
}

/// Single-document analysis prompt shared by the remote analysis providers.
/// When facts are available the serialized fact map is appended so the model
/// can cross-check its findings.
pub fn build_analysis_prompt(raw_text: &str, facts_json: Option<&str>) -> String {
    let facts_block = match facts_json {
        Some(json) => format!("\nEXTRACTED FACTS (for cross-checking):\n{json}\n"),
        None => String::new(),
    };

    format!(
        r#"
You are a healthcare billing analysis assistant.

Analyze the document and return a JSON array of issues.

For each issue:
- type: one of duplicate_charge, billing_error, non_covered_service,
        overbilling, insurance_issue, fsa_issue, other
- summary: short description
- evidence: brief supporting explanation
- code: the referenced procedure code, or null
- date: the referenced service date, or null
- max_savings: numeric dollar amount representing the MAXIMUM patient
  responsibility that could be removed if the issue were resolved
  favorably, using ONLY amounts explicitly stated in the document.
  If no amount can be determined with certainty, set this to null.
- recommended_action: short next step for the patient, or null

Be conservative. Do not guess or infer missing numbers.

If no issues are found, return an empty JSON array.
{facts_block}
DOCUMENT:
{raw_text}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_lists_every_fact_key() {
        let prompt = build_fact_extraction_prompt("doc body");
        for key in FACT_KEYS {
            assert!(prompt.contains(key), "missing key {key}");
        }
        assert!(prompt.contains("doc body"));
    }

    #[test]
    fn phase2_prompts_embed_the_document_and_array_key() {
        let cases = [
            (build_receipt_line_item_prompt("R"), "receipt_items", "R"),
            (
                build_medical_line_item_prompt("M"),
                "medical_line_items",
                "M",
            ),
            (build_dental_line_item_prompt("D"), "dental_line_items", "D"),
            (
                build_insurance_claim_item_prompt("I"),
                "insurance_claim_items",
                "I",
            ),
            (build_fsa_claim_item_prompt("F"), "fsa_claim_items", "F"),
        ];
        for (prompt, key, body) in cases {
            assert!(prompt.contains(key), "missing array key {key}");
            assert!(prompt.contains(body));
        }
    }

    #[test]
    fn analysis_prompt_appends_facts_only_when_present() {
        let with = build_analysis_prompt("text", Some("{\"a\":1}"));
        assert!(with.contains("EXTRACTED FACTS"));
        let without = build_analysis_prompt("text", None);
        assert!(!without.contains("EXTRACTED FACTS"));
    }
}
