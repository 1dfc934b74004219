//! User and role administration (`/api/usuarios`, `/api/roles`). Admin only.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{fetch_json, unwrap_list};
use crate::auth::{AuthService, RequestOptions};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsuarioAdmin {
    pub id_usuario: i64,
    pub email: String,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default)]
    pub apellido_materno: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_activo")]
    pub activo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rol {
    pub id_rol: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default = "default_activo")]
    pub activo: bool,
}

fn default_activo() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActualizarRoles {
    pub roles: Vec<String>,
}

#[derive(Clone)]
pub struct AdministracionClient {
    auth: AuthService,
}

impl AdministracionClient {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    pub async fn listar_usuarios(&self) -> Result<Vec<UsuarioAdmin>, ApiError> {
        let value = fetch_json(
            &self.auth,
            "/api/usuarios",
            RequestOptions::get(),
            "Error al obtener usuarios",
        )
        .await?;
        unwrap_list(value, "usuarios")
    }

    pub async fn listar_roles(&self) -> Result<Vec<Rol>, ApiError> {
        let value = fetch_json(
            &self.auth,
            "/api/roles",
            RequestOptions::get(),
            "Error al obtener roles",
        )
        .await?;
        unwrap_list(value, "roles")
    }

    /// Replace a user's role set.
    pub async fn actualizar_roles_usuario(
        &self,
        id_usuario: i64,
        roles: Vec<String>,
    ) -> Result<UsuarioAdmin, ApiError> {
        let body = ActualizarRoles { roles };
        let value: serde_json::Value = fetch_json(
            &self.auth,
            &format!("/api/usuarios/{}/roles", id_usuario),
            RequestOptions::put_json(&body)?,
            "Error al actualizar roles",
        )
        .await?;

        // Either `{ "usuario": {...} }` or the bare user
        let usuario = match value {
            serde_json::Value::Object(mut map) if map.contains_key("usuario") => {
                map.remove("usuario").unwrap_or_default()
            }
            other => other,
        };
        let usuario: UsuarioAdmin = serde_json::from_value(usuario)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        info!(id_usuario, roles = ?usuario.roles, "User roles updated");
        Ok(usuario)
    }
}
