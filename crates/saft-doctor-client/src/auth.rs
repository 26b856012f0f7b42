use saft_doctor_core::models::{LoginResponse, Me, UiCheck};
use saft_doctor_core::ClientError;

use crate::ApiClient;

impl ApiClient {
    /// Exchange username and password for a bearer token and keep it for
    /// subsequent calls.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, ClientError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }

        let request = self
            .client()
            .post(self.build_url("/auth/token"))
            .form(&[("username", username), ("password", password)]);
        let response = Self::send(request).await?;
        let login: LoginResponse = Self::json_response(response).await?;

        if login.access_token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "Login response carries no access_token".to_string(),
            ));
        }
        tracing::info!(username = %username, "Logged in");
        self.set_token(login.access_token.clone());
        Ok(login)
    }

    pub async fn me(&self) -> Result<Me, ClientError> {
        self.get_json("/auth/me", &[]).await
    }

    /// Unauthenticated liveness probe used by the heartbeat.
    pub async fn ui_check(&self) -> Result<UiCheck, ClientError> {
        let response = Self::send(self.client().get(self.build_url("/ui/check"))).await?;
        Self::json_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use saft_doctor_core::ErrorMetadata;

    #[tokio::test]
    async fn login_posts_form_and_stores_token() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/auth/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "dev".into()),
                Matcher::UrlEncoded("password".into(), "s3cret".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"jwt-abc","token_type":"bearer"}"#)
            .create_async()
            .await;
        let me = server
            .mock("GET", "/auth/me")
            .match_header("authorization", "Bearer jwt-abc")
            .with_status(200)
            .with_body(r#"{"username":"dev","role":"admin"}"#)
            .create_async()
            .await;

        let mut client = ApiClient::new(server.url(), None, None).unwrap();
        let resp = client.login("dev", "s3cret").await.unwrap();
        assert_eq!(resp.access_token, "jwt-abc");
        assert_eq!(client.token(), Some("jwt-abc"));

        let who = client.me().await.unwrap();
        assert_eq!(who.username.as_deref(), Some("dev"));
        assert_eq!(who.role, "admin");

        login.assert_async().await;
        me.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_login_keeps_client_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/token")
            .with_status(401)
            .with_body(r#"{"detail":"Incorrect username or password"}"#)
            .create_async()
            .await;

        let mut client = ApiClient::new(server.url(), None, None).unwrap();
        let err = client.login("dev", "wrong").await.unwrap_err();

        assert!(matches!(err, ClientError::Api { status: 401, .. }));
        assert_eq!(err.user_message(), "Incorrect username or password");
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn ui_check_needs_no_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ui/check")
            .with_status(200)
            .with_body(r#"{"ui_version":"2024.11.3"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), None, None).unwrap();
        let check = client.ui_check().await.unwrap();
        assert_eq!(check.ui_version.as_deref(), Some("2024.11.3"));
    }
}
