//! Typed clients for the facility's finance, statistics, report and
//! administration endpoints. Every call goes through
//! [`AuthService::authenticated_fetch`].

mod administracion;
mod estadisticas;
mod finanzas;
mod reportes;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::auth::{AuthService, RequestOptions};
use crate::error::{ApiError, ensure_success};

pub use administracion::{AdministracionClient, ActualizarRoles, Rol, UsuarioAdmin};
pub use estadisticas::{
    EstadisticasClient, ResumenBalance, ResumenEstadisticas, ResumenMonto, ResumenMovimientos,
};
pub use finanzas::{
    Agregado, CambiosGasto, CambiosIngreso, Comprobante, EstadisticasGastos, EstadisticasIngresos,
    FiltroGastos, FiltroIngresos, FinanzasClient, Gasto, GastoGuardado, Ingreso, IngresoGuardado,
    ListaGastos, ListaIngresos, Mensaje, MetodoPago, MetodoPagoRef, NuevoGasto, NuevoIngreso,
    PorMetodo, PorServicio, RangoFechas, Servicio, ServicioRef, Suma, UsuarioRegistro,
};
pub use reportes::{ReporteFinanciero, ReportesClient};

/// Authenticated call that expects a 2xx JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    auth: &AuthService,
    endpoint: &str,
    options: RequestOptions,
    fallback: &str,
) -> Result<T, ApiError> {
    let response = auth.authenticated_fetch(endpoint, options).await?;
    let response = ensure_success(response, fallback).await?;
    Ok(response.json().await?)
}

/// Catalog endpoints answer either `{"<key>": [...]}` or a bare array.
pub(crate) fn unwrap_list<T: DeserializeOwned>(value: Value, key: &str) -> Result<Vec<T>, ApiError> {
    let list = match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(list).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

/// Query string that leaves out absent and zero values.
#[derive(Debug, Default)]
pub(crate) struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub fn number<N: Into<i64>>(mut self, key: &'static str, value: Option<N>) -> Self {
        if let Some(value) = value.map(Into::into).filter(|v| *v != 0) {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    /// `path` with the query appended, or `path` alone when nothing was set.
    pub fn apply(&self, path: &str) -> String {
        if self.pairs.is_empty() {
            return path.to_string();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        format!("{}?{}", path, query)
    }
}

/// Amounts arrive as decimal strings (`"150.50"`) or plain numbers.
pub(crate) fn de_monto<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Like [`de_monto`] for nullable amounts (aggregates over no rows are null).
pub(crate) fn de_monto_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_monto")] f64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(n)| n))
}
