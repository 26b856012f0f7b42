//! Document extraction and custom fix rules.

use saft_doctor_core::models::{DocumentSource, DocumentsResponse, FixRule, FixRuleResponse};
use saft_doctor_core::ClientError;

use crate::ApiClient;

#[derive(serde::Serialize)]
struct SaveFixRuleRequest<'a> {
    rule: &'a FixRule,
}

impl ApiClient {
    /// List the invoices contained in an uploaded or archived SAFT file.
    pub async fn extract_documents(
        &self,
        source: &DocumentSource,
    ) -> Result<DocumentsResponse, ClientError> {
        let response: DocumentsResponse = match source {
            DocumentSource::Upload(upload_id) => {
                self.post_json(
                    "/pt/upload/extract-documents",
                    &[],
                    &serde_json::json!({ "upload_id": upload_id }),
                )
                .await?
            }
            DocumentSource::Storage(storage_key) => {
                self.post_json(
                    "/pt/history/extract-documents",
                    &[],
                    &serde_json::json!({ "storage_key": storage_key }),
                )
                .await?
            }
        };

        tracing::info!(
            documents = response.documents.len(),
            total = response.total(),
            "Extracted documents"
        );
        Ok(response)
    }

    /// Store a custom fix rule. The rule is checked locally first so a bad
    /// pattern never reaches the backend.
    pub async fn save_fix_rule(&self, rule: &FixRule) -> Result<FixRuleResponse, ClientError> {
        rule.validate()?;
        let response: FixRuleResponse = self
            .post_json("/pt/fix-rules", &[], &SaveFixRuleRequest { rule })
            .await?;
        tracing::info!(rule_id = %rule.id, ok = response.ok, "Saved fix rule");
        Ok(response)
    }
}
