//! Financial report PDF (`/api/reportes/financiero`).

use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use tracing::info;

use crate::auth::{AuthService, RequestOptions};
use crate::error::{ApiError, error_from_response};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporteFinanciero {
    pub fecha_inicio: String,
    pub fecha_fin: String,
}

#[derive(Clone)]
pub struct ReportesClient {
    auth: AuthService,
}

impl ReportesClient {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Generate the report for the period and return the PDF bytes.
    pub async fn generar_reporte_financiero(
        &self,
        periodo: &ReporteFinanciero,
    ) -> Result<Vec<u8>, ApiError> {
        let options = RequestOptions::post_json(periodo)?
            .header(ACCEPT, HeaderValue::from_static("application/pdf"));
        let response = self
            .auth
            .authenticated_fetch("/api/reportes/financiero", options)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let fallback = format!("Error al generar reporte: {}", status.as_u16());
            return Err(error_from_response(response, &fallback).await);
        }

        let bytes = response.bytes().await?;
        info!(
            fecha_inicio = %periodo.fecha_inicio,
            fecha_fin = %periodo.fecha_fin,
            size = bytes.len(),
            "Financial report generated"
        );
        Ok(bytes.to_vec())
    }
}
