//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};

/// User profile as returned by `/auth/login`.
///
/// Cached locally for instant hydration and presentation-level gating only;
/// the backend still enforces authorization on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usuario {
    pub id_usuario: i64,
    pub email: String,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default)]
    pub apellido_materno: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Usuario {
    /// Full display name ("Nombre Paterno Materno").
    pub fn nombre_completo(&self) -> String {
        let mut name = format!("{} {}", self.nombre, self.apellido_paterno);
        if let Some(materno) = self.apellido_materno.as_deref().filter(|m| !m.is_empty()) {
            name.push(' ');
            name.push_str(materno);
        }
        name
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordarme: Option<bool>,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            recordarme: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub usuario: Usuario,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenBody<'a> {
    pub refresh_token: &'a str,
}

/// An access/refresh token pair. Always stored and replaced together.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

impl From<RefreshResponse> for SessionTokens {
    fn from(r: RefreshResponse) -> Self {
        Self {
            access_token: r.access_token,
            refresh_token: r.refresh_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_shape() {
        let body = json!({
            "accessToken": "a.b.c",
            "refreshToken": "r1",
            "usuario": {
                "id_usuario": 3,
                "email": "ana@lasaves.mx",
                "nombre": "Ana",
                "apellido_paterno": "López",
                "apellido_materno": null,
                "roles": ["admin"]
            }
        });
        let parsed: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.access_token, "a.b.c");
        assert_eq!(parsed.usuario.roles, vec!["admin"]);
        assert_eq!(parsed.usuario.nombre_completo(), "Ana López");
    }

    #[test]
    fn test_credentials_omit_unset_recordarme() {
        let body = serde_json::to_value(LoginCredentials::new("a@b.c", "pw")).unwrap();
        assert_eq!(body, json!({ "email": "a@b.c", "password": "pw" }));
    }

    #[test]
    fn test_tokens_debug_hides_values() {
        let tokens = SessionTokens {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
        };
        let printed = format!("{:?}", tokens);
        assert!(!printed.contains("secret"));
    }
}
