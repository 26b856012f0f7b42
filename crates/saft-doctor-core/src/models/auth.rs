use serde::{Deserialize, Serialize};

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Me {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// Response of `GET /ui/check`, polled by the heartbeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiCheck {
    #[serde(default)]
    pub ui_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_defaults_token_type() {
        let resp: LoginResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(resp.access_token, "abc");
        assert_eq!(resp.token_type, "bearer");
    }

    #[test]
    fn me_defaults_role_to_user() {
        let me: Me = serde_json::from_str(r#"{"username":"dev"}"#).unwrap();
        assert_eq!(me.role, "user");
        assert_eq!(me.username.as_deref(), Some("dev"));
    }
}
