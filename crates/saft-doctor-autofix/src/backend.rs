use async_trait::async_trait;
use saft_doctor_client::{ApiClient, ValidationSource};
use saft_doctor_core::models::{
    ApplyFixesResponse, Fix, Operation, ValidationOptions, ValidationResult,
};
use saft_doctor_core::ClientError;

/// Backend operations the loop needs. Implemented by [`ApiClient`].
#[async_trait]
pub trait FixBackend: Send + Sync {
    async fn validate_upload(
        &self,
        upload_id: &str,
        operation: Operation,
    ) -> Result<ValidationResult, ClientError>;

    async fn apply_fixes(
        &self,
        upload_id: &str,
        fixes: &[Fix],
    ) -> Result<ApplyFixesResponse, ClientError>;
}

#[async_trait]
impl FixBackend for ApiClient {
    async fn validate_upload(
        &self,
        upload_id: &str,
        operation: Operation,
    ) -> Result<ValidationResult, ClientError> {
        self.validate(
            ValidationSource::Upload(upload_id.to_string()),
            operation,
            ValidationOptions::default(),
        )
        .await
    }

    async fn apply_fixes(
        &self,
        upload_id: &str,
        fixes: &[Fix],
    ) -> Result<ApplyFixesResponse, ClientError> {
        self.apply_fixes_and_validate(upload_id, fixes).await
    }
}
