//! Validation requests against the backend's FACTEMICLI wrapper.
//!
//! A validation never fails just because the body is not what we expected: a
//! 2xx body that does not parse comes back as an unstructured result, and a
//! non-2xx JSON body as a structured failure. Only a network failure or a
//! non-2xx response with nothing parseable is an error.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use saft_doctor_core::models::{
    ApplyFixesRequest, ApplyFixesResponse, Fix, Operation, ValidationOptions, ValidationResult,
};
use saft_doctor_core::{backend_message, ClientError};
use serde_json::Value;

use crate::ApiClient;

/// What the backend should validate.
#[derive(Debug, Clone)]
pub enum ValidationSource {
    /// Send the whole file in a multipart request
    Multipart { filename: String, bytes: Bytes },
    /// A file already in object storage
    ObjectKey(String),
    /// A finished chunked upload
    Upload(String),
}

/// What to submit to the tax authority.
#[derive(Debug, Clone)]
pub enum SubmitTarget {
    Upload(String),
    File { filename: String, bytes: Bytes },
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Reject non-2xx responses that carry no JSON object; those are transport
/// failures rather than validation outcomes.
fn check_validation_body(status: u16, text: &str) -> Result<(), ClientError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(_)) => Ok(()),
        _ => Err(ClientError::Transport(format!(
            "HTTP {}: {}",
            status,
            backend_message(text, "no response body")
        ))),
    }
}

/// Non-2xx structured bodies usually only carry `detail`; surface it as the error.
fn fill_failure(result: &mut ValidationResult, status: u16, text: &str) {
    if !(200..300).contains(&status) && result.error.is_none() {
        result.error = Some(backend_message(text, "Validation request failed"));
    }
}

impl ApiClient {
    pub async fn validate(
        &self,
        source: ValidationSource,
        operation: Operation,
        options: ValidationOptions,
    ) -> Result<ValidationResult, ClientError> {
        let mut query = vec![("operation", operation.as_str().to_string())];
        if options.full {
            query.push(("full", flag(true)));
        }

        let request = match &source {
            ValidationSource::Upload(upload_id) => {
                query.insert(0, ("upload_id", upload_id.clone()));
                self.authed(self.client().post(self.build_url("/pt/validate-jar-by-upload")))?
                    .query(&query)
            }
            ValidationSource::ObjectKey(key) => self
                .authed(self.client().post(self.build_url("/pt/validate-jar-by-key")))?
                .query(&query)
                .json(&serde_json::json!({ "object_key": key })),
            ValidationSource::Multipart { filename, bytes } => {
                if let Some(dry_run) = options.dry_run {
                    query.push(("dry_run", flag(dry_run)));
                }
                let part = Part::bytes(bytes.to_vec()).file_name(filename.clone());
                self.authed(self.client().post(self.build_url("/pt/validate-jar")))?
                    .query(&query)
                    .multipart(Form::new().part("file", part))
            }
        };

        let (status, text) = Self::read_text(Self::send(request).await?).await?;
        check_validation_body(status, &text)?;

        let mut result = ValidationResult::from_body(status, &text);
        fill_failure(&mut result, status, &text);

        tracing::info!(
            operation = %operation,
            status = status,
            ok = result.ok,
            issues = result.issues.len(),
            structured = result.is_structured(),
            timeout = result.timeout,
            "Validation finished"
        );
        if let Some(cmd) = result.command_line() {
            tracing::debug!(cmd = %cmd, "Validator command");
        }

        Ok(result)
    }

    /// Run the `enviar` operation: through the upload session when there is one,
    /// otherwise by sending the whole file.
    pub async fn submit(&self, target: SubmitTarget) -> Result<ValidationResult, ClientError> {
        let source = match target {
            SubmitTarget::Upload(upload_id) => ValidationSource::Upload(upload_id),
            SubmitTarget::File { filename, bytes } => {
                ValidationSource::Multipart { filename, bytes }
            }
        };
        self.validate(source, Operation::Enviar, ValidationOptions::default())
            .await
    }

    /// Apply `fixes` to the uploaded file and re-validate it in one round-trip.
    pub async fn apply_fixes_and_validate(
        &self,
        upload_id: &str,
        fixes: &[Fix],
    ) -> Result<ApplyFixesResponse, ClientError> {
        if fixes.is_empty() {
            return Err(ClientError::InvalidInput("No fixes to apply".to_string()));
        }

        let body = ApplyFixesRequest { upload_id, fixes };
        let url = self.build_url("/pt/upload/apply-fixes-and-validate");
        let request = self.authed(self.client().post(url))?.json(&body);
        let (status, text) = Self::read_text(Self::send(request).await?).await?;
        check_validation_body(status, &text)?;

        let mut response = ApplyFixesResponse::from_body(status, &text);
        fill_failure(&mut response.result, status, &text);

        tracing::info!(
            upload_id = %upload_id,
            submitted = fixes.len(),
            applied = response.applied,
            remaining = response.result.issues.len(),
            "Applied fixes and re-validated"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use saft_doctor_core::models::{Issue, SuggestedFix};

    fn client(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(server.url(), Some("tok".to_string()), None).unwrap()
    }

    #[tokio::test]
    async fn validates_by_upload_with_full_output() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/validate-jar-by-upload")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("upload_id".into(), "u1".into()),
                Matcher::UrlEncoded("operation".into(), "validar".into()),
                Matcher::UrlEncoded("full".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                r#"{"ok":false,"returncode":1,"stdout":"erro","cmd_masked":["java","-jar","FACTEMICLI.jar"],
                    "issues":[{"code":"INVALID_COUNTRY","message":"m","suggestion":"PT"}]}"#,
            )
            .create_async()
            .await;

        let result = client(&server)
            .validate(
                ValidationSource::Upload("u1".to_string()),
                Operation::Validar,
                ValidationOptions::default(),
            )
            .await
            .unwrap();

        assert!(result.is_structured());
        assert!(!result.ok);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.fixable_issues().count(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validates_by_object_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/validate-jar-by-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("operation".into(), "enviar".into()),
                Matcher::UrlEncoded("full".into(), "1".into()),
            ]))
            .match_body(Matcher::Json(serde_json::json!({"object_key": "saft/2024/01.xml"})))
            .with_status(200)
            .with_body(r#"{"ok":true,"returncode":0,"issues":[]}"#)
            .create_async()
            .await;

        let result = client(&server)
            .validate(
                ValidationSource::ObjectKey("saft/2024/01.xml".to_string()),
                Operation::Enviar,
                ValidationOptions::default(),
            )
            .await
            .unwrap();

        assert!(result.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn multipart_sends_file_and_dry_run() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/validate-jar")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("operation".into(), "validar".into()),
                Matcher::UrlEncoded("dry_run".into(), "1".into()),
            ]))
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::Regex("<AuditFile/>".to_string()))
            .with_status(200)
            .with_body(r#"{"ok":true,"returncode":0}"#)
            .create_async()
            .await;

        let options = ValidationOptions {
            full: true,
            dry_run: Some(true),
        };
        let result = client(&server)
            .validate(
                ValidationSource::Multipart {
                    filename: "saft.xml".to_string(),
                    bytes: Bytes::from_static(b"<AuditFile/>"),
                },
                Operation::Validar,
                options,
            )
            .await
            .unwrap();

        assert!(result.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unparseable_success_body_is_unstructured() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/validate-jar-by-upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("Java HotSpot(TM) crashed")
            .create_async()
            .await;

        let result = client(&server)
            .validate(
                ValidationSource::Upload("u1".to_string()),
                Operation::Validar,
                ValidationOptions::default(),
            )
            .await
            .unwrap();

        assert!(!result.is_structured());
        assert!(!result.ok);
        assert_eq!(result.raw.as_deref(), Some("Java HotSpot(TM) crashed"));
    }

    #[tokio::test]
    async fn structured_failure_keeps_detail_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/validate-jar-by-upload")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"detail":"Upload not found or expired"}"#)
            .create_async()
            .await;

        let result = client(&server)
            .validate(
                ValidationSource::Upload("gone".to_string()),
                Operation::Validar,
                ValidationOptions::default(),
            )
            .await
            .unwrap();

        assert!(result.is_structured());
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("Upload not found or expired"));
        assert_eq!(result.http_status, Some(404));
    }

    #[tokio::test]
    async fn non_json_failure_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/validate-jar-by-upload")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = client(&server)
            .validate(
                ValidationSource::Upload("u1".to_string()),
                Operation::Validar,
                ValidationOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(ref msg) if msg.starts_with("HTTP 502")));
    }

    #[tokio::test]
    async fn submit_prefers_upload_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/validate-jar-by-upload")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("upload_id".into(), "u9".into()),
                Matcher::UrlEncoded("operation".into(), "enviar".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true,"returncode":0,"stdout":"response code=\"200\""}"#)
            .create_async()
            .await;

        let result = client(&server)
            .submit(SubmitTarget::Upload("u9".to_string()))
            .await
            .unwrap();

        assert!(result.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn apply_fixes_posts_issue_objects() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/upload/apply-fixes-and-validate")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "upload_id": "u1",
                "fixes": [{"code": "INVALID_COUNTRY", "suggestion": "PT"}]
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"applied":1,"issues":[]}"#)
            .create_async()
            .await;

        let mut issue = Issue::new("INVALID_COUNTRY", "m");
        issue.suggestion = Some(SuggestedFix::Text("PT".to_string()));
        let fixes = vec![Fix {
            issue,
            selected_suggestion: None,
        }];

        let resp = client(&server)
            .apply_fixes_and_validate("u1", &fixes)
            .await
            .unwrap();

        assert_eq!(resp.applied, 1);
        assert!(resp.result.ok);
        assert!(resp.result.issues.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn apply_fixes_refuses_empty_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pt/upload/apply-fixes-and-validate")
            .expect(0)
            .create_async()
            .await;

        let err = client(&server)
            .apply_fixes_and_validate("u1", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidInput(_)));
        mock.assert_async().await;
    }

    fn country_fix() -> Vec<Fix> {
        let mut issue = Issue::new("INVALID_COUNTRY", "m");
        issue.suggestion = Some(SuggestedFix::Text("PT".to_string()));
        vec![Fix {
            issue,
            selected_suggestion: None,
        }]
    }

    #[tokio::test]
    async fn apply_fixes_structured_failure_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/upload/apply-fixes-and-validate")
            .with_status(404)
            .with_body(r#"{"detail":"Upload u1 not found"}"#)
            .create_async()
            .await;

        let resp = client(&server)
            .apply_fixes_and_validate("u1", &country_fix())
            .await
            .unwrap();

        assert_eq!(resp.applied, 0);
        assert!(resp.result.is_structured());
        assert!(!resp.result.ok);
        assert_eq!(resp.result.http_status, Some(404));
        assert_eq!(resp.result.error.as_deref(), Some("Upload u1 not found"));
    }

    #[tokio::test]
    async fn apply_fixes_non_json_failure_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/upload/apply-fixes-and-validate")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = client(&server)
            .apply_fixes_and_validate("u1", &country_fix())
            .await
            .unwrap_err();

        match err {
            ClientError::Transport(message) => {
                assert!(message.starts_with("HTTP 502"));
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
