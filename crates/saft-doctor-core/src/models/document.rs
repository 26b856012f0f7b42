use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where to extract invoices from: a finished upload session or an archived
/// validation in the history store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Upload(String),
    Storage(String),
}

/// One invoice extracted from a SAFT file. Only the commonly displayed columns
/// are modelled; everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaftDocument {
    #[serde(rename = "InvoiceNo", default, skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    #[serde(rename = "InvoiceDate", default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    #[serde(rename = "InvoiceType", default, skip_serializing_if = "Option::is_none")]
    pub invoice_type: Option<String>,
    #[serde(rename = "DocumentStatus", default, skip_serializing_if = "Option::is_none")]
    pub document_status: Option<String>,
    #[serde(rename = "CustomerID", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(rename = "CustomerName", default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(rename = "NetTotal", default, skip_serializing_if = "Option::is_none")]
    pub net_total: Option<String>,
    #[serde(rename = "TaxPayable", default, skip_serializing_if = "Option::is_none")]
    pub tax_payable: Option<String>,
    #[serde(rename = "GrossTotal", default, skip_serializing_if = "Option::is_none")]
    pub gross_total: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SaftDocument {
    /// Gross total parsed as a number; unparseable or missing totals count as zero.
    pub fn gross_total_value(&self) -> f64 {
        self.gross_total
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Response of the document extraction endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentsResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub documents: Vec<SaftDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DocumentsResponse {
    pub fn total(&self) -> u64 {
        self.total.unwrap_or(self.documents.len() as u64)
    }

    /// Why the extraction failed, when the backend says it did.
    pub fn failure_message(&self) -> Option<String> {
        if self.ok {
            return None;
        }
        let message = [&self.error, &self.detail]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| "Document extraction failed".to_string());
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_invoice_columns() {
        let raw = r#"{
            "ok": true,
            "documents": [{
                "InvoiceNo": "FT 2024/1",
                "InvoiceDate": "2024-01-15",
                "InvoiceType": "FT",
                "DocumentStatus": "N",
                "CustomerID": "C001",
                "CustomerName": "Cliente Lda",
                "NetTotal": "100.00",
                "TaxPayable": "23.00",
                "GrossTotal": "123.00",
                "Hash": "abc"
            }],
            "total": 1
        }"#;
        let resp: DocumentsResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.total(), 1);
        let doc = &resp.documents[0];
        assert_eq!(doc.invoice_no.as_deref(), Some("FT 2024/1"));
        assert_eq!(doc.customer_name.as_deref(), Some("Cliente Lda"));
        assert_eq!(doc.gross_total_value(), 123.0);
        assert_eq!(doc.extra.get("Hash"), Some(&Value::from("abc")));
    }

    #[test]
    fn total_defaults_to_document_count() {
        let resp: DocumentsResponse =
            serde_json::from_str(r#"{"ok": true, "documents": [{}, {}]}"#).unwrap();
        assert_eq!(resp.total(), 2);
        assert_eq!(resp.documents[0].gross_total_value(), 0.0);
        assert!(resp.failure_message().is_none());
    }

    #[test]
    fn failed_extraction_reports_backend_error() {
        let resp: DocumentsResponse =
            serde_json::from_str(r#"{"ok": false, "error": "SAFT file not found"}"#).unwrap();
        assert_eq!(resp.failure_message().as_deref(), Some("SAFT file not found"));

        let resp: DocumentsResponse =
            serde_json::from_str(r#"{"ok": false, "error": "", "detail": "upload expired"}"#)
                .unwrap();
        assert_eq!(resp.failure_message().as_deref(), Some("upload expired"));

        let resp: DocumentsResponse = serde_json::from_str(r#"{"ok": false}"#).unwrap();
        assert_eq!(
            resp.failure_message().as_deref(),
            Some("Document extraction failed")
        );
    }
}
