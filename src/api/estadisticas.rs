//! Dashboard aggregates (`/api/estadisticas/*`).

use serde::Deserialize;

use super::fetch_json;
use crate::auth::{AuthService, RequestOptions};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumenMonto {
    pub total: f64,
    pub cantidad: u64,
    pub promedio: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumenBalance {
    pub ingresos: f64,
    pub gastos: f64,
    pub balance: f64,
    pub movimientos_totales: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumenEstadisticas {
    pub ingresos: ResumenMonto,
    pub gastos: ResumenMonto,
    pub balance: f64,
    pub movimientos_totales: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumenMovimientos {
    pub total: u64,
    pub ingresos: u64,
    pub gastos: u64,
}

#[derive(Clone)]
pub struct EstadisticasClient {
    auth: AuthService,
}

impl EstadisticasClient {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Everything the home screen shows, in one request.
    pub async fn resumen(&self) -> Result<ResumenEstadisticas, ApiError> {
        self.get(
            "/api/estadisticas/resumen",
            "Error al obtener resumen de estadísticas",
        )
        .await
    }

    pub async fn ingresos(&self) -> Result<ResumenMonto, ApiError> {
        self.get(
            "/api/estadisticas/ingresos",
            "Error al obtener estadísticas de ingresos",
        )
        .await
    }

    pub async fn gastos(&self) -> Result<ResumenMonto, ApiError> {
        self.get(
            "/api/estadisticas/gastos",
            "Error al obtener estadísticas de gastos",
        )
        .await
    }

    pub async fn balance(&self) -> Result<ResumenBalance, ApiError> {
        self.get("/api/estadisticas/balance", "Error al obtener balance general")
            .await
    }

    pub async fn movimientos(&self) -> Result<ResumenMovimientos, ApiError> {
        self.get(
            "/api/estadisticas/movimientos",
            "Error al obtener total de movimientos",
        )
        .await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        fetch_json(&self.auth, endpoint, RequestOptions::get(), fallback).await
    }
}
