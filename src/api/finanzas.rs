//! Expenses (`/api/gastos`), incomes (`/api/ingresos`) and their catalogs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::{Query, de_monto, de_monto_opt, fetch_json, unwrap_list};
use crate::auth::{AuthService, FormField, RequestOptions};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetodoPago {
    pub id_metodo: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servicio {
    pub id_servicio: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(deserialize_with = "de_monto")]
    pub costo_referencia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetodoPagoRef {
    pub id_metodo: i64,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicioRef {
    pub id_servicio: i64,
    pub nombre: String,
    #[serde(deserialize_with = "de_monto")]
    pub costo_referencia: f64,
}

/// Who recorded a movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsuarioRegistro {
    pub id_usuario: i64,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default)]
    pub apellido_materno: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gasto {
    pub id_gasto: i64,
    pub concepto: String,
    #[serde(deserialize_with = "de_monto")]
    pub monto: f64,
    pub fecha_gasto: String,
    #[serde(default)]
    pub comprobante_url: Option<String>,
    #[serde(default)]
    pub notas: Option<String>,
    pub fecha_registro: String,
    pub metodo_pago: MetodoPagoRef,
    pub usuario_registro: UsuarioRegistro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingreso {
    pub id_ingreso: i64,
    #[serde(default)]
    pub concepto: Option<String>,
    #[serde(deserialize_with = "de_monto")]
    pub monto: f64,
    pub fecha_ingreso: String,
    #[serde(default)]
    pub comprobante_url: Option<String>,
    #[serde(default)]
    pub notas: Option<String>,
    pub fecha_registro: String,
    #[serde(default)]
    pub servicio: Option<ServicioRef>,
    pub metodo_pago: MetodoPagoRef,
    pub usuario_registro: UsuarioRegistro,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListaGastos {
    pub gastos: Vec<Gasto>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListaIngresos {
    pub ingresos: Vec<Ingreso>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiltroGastos {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub metodo_pago_id: Option<i64>,
    pub limite: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiltroIngresos {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub servicio_id: Option<i64>,
    pub metodo_pago_id: Option<i64>,
    pub limite: Option<u32>,
    pub offset: Option<u32>,
}

/// Date range for the statistics endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangoFechas {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

impl RangoFechas {
    fn query(&self) -> Query {
        Query::new()
            .text("fecha_inicio", self.fecha_inicio.as_deref())
            .text("fecha_fin", self.fecha_fin.as_deref())
    }
}

/// A receipt file attached to a new movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comprobante {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Comprobante {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a receipt from disk; the MIME type follows the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "comprobante".to_string());
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => "application/pdf",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        };
        Ok(Self::new(file_name, mime, bytes))
    }

    fn field(&self) -> FormField {
        FormField::File {
            name: "comprobante".to_string(),
            file_name: self.file_name.clone(),
            mime: self.mime.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NuevoGasto {
    pub concepto: String,
    pub monto: f64,
    pub fecha_gasto: String,
    pub metodo_pago_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
    #[serde(skip)]
    pub comprobante: Option<Comprobante>,
}

impl NuevoGasto {
    fn into_request(self) -> Result<RequestOptions, ApiError> {
        let Some(comprobante) = &self.comprobante else {
            return RequestOptions::post_json(&self);
        };
        let mut fields = vec![
            FormField::text("concepto", &self.concepto),
            FormField::text("monto", self.monto),
            FormField::text("fecha_gasto", &self.fecha_gasto),
            FormField::text("metodo_pago_id", self.metodo_pago_id),
        ];
        if let Some(notas) = self.notas.as_deref().filter(|n| !n.is_empty()) {
            fields.push(FormField::text("notas", notas));
        }
        fields.push(comprobante.field());
        Ok(RequestOptions::post_multipart(fields))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NuevoIngreso {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicio_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepto: Option<String>,
    pub monto: f64,
    pub fecha_ingreso: String,
    pub metodo_pago_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
    #[serde(skip)]
    pub comprobante: Option<Comprobante>,
}

impl NuevoIngreso {
    fn into_request(self) -> Result<RequestOptions, ApiError> {
        let Some(comprobante) = &self.comprobante else {
            return RequestOptions::post_json(&self);
        };
        let mut fields = Vec::new();
        if let Some(servicio_id) = self.servicio_id.filter(|id| *id != 0) {
            fields.push(FormField::text("servicio_id", servicio_id));
        }
        if let Some(concepto) = self.concepto.as_deref().filter(|c| !c.is_empty()) {
            fields.push(FormField::text("concepto", concepto));
        }
        fields.push(FormField::text("monto", self.monto));
        fields.push(FormField::text("fecha_ingreso", &self.fecha_ingreso));
        fields.push(FormField::text("metodo_pago_id", self.metodo_pago_id));
        if let Some(notas) = self.notas.as_deref().filter(|n| !n.is_empty()) {
            fields.push(FormField::text("notas", notas));
        }
        fields.push(comprobante.field());
        Ok(RequestOptions::post_multipart(fields))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CambiosGasto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metodo_pago_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CambiosIngreso {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicio_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metodo_pago_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Mensaje {
    pub mensaje: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GastoGuardado {
    pub mensaje: String,
    pub gasto: Gasto,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngresoGuardado {
    pub mensaje: String,
    pub ingreso: Ingreso,
}

/// Sum/count/average block of an aggregate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Agregado {
    #[serde(rename = "_sum", default)]
    pub suma: Suma,
    #[serde(rename = "_count", default)]
    pub conteo: u64,
    #[serde(rename = "_avg", default)]
    pub promedio: Suma,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Suma {
    #[serde(default, deserialize_with = "de_monto_opt")]
    pub monto: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PorMetodo {
    pub metodo_pago_id: i64,
    #[serde(rename = "_sum", default)]
    pub suma: Suma,
    #[serde(rename = "_count", default)]
    pub conteo: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PorServicio {
    #[serde(default)]
    pub servicio_id: Option<i64>,
    #[serde(rename = "_sum", default)]
    pub suma: Suma,
    #[serde(rename = "_count", default)]
    pub conteo: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EstadisticasGastos {
    pub total: Agregado,
    #[serde(default)]
    pub por_metodo: Vec<PorMetodo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EstadisticasIngresos {
    pub total: Agregado,
    #[serde(default)]
    pub por_servicio: Vec<PorServicio>,
    #[serde(default)]
    pub por_metodo: Vec<PorMetodo>,
}

#[derive(Clone)]
pub struct FinanzasClient {
    auth: AuthService,
}

impl FinanzasClient {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    pub async fn listar_gastos(&self, filtro: &FiltroGastos) -> Result<ListaGastos, ApiError> {
        let endpoint = Query::new()
            .text("fecha_inicio", filtro.fecha_inicio.as_deref())
            .text("fecha_fin", filtro.fecha_fin.as_deref())
            .number("metodo_pago_id", filtro.metodo_pago_id)
            .number("limite", filtro.limite)
            .number("offset", filtro.offset)
            .apply("/api/gastos");
        fetch_json(&self.auth, &endpoint, RequestOptions::get(), "Error al obtener gastos").await
    }

    /// Record an expense. Sent as multipart when a receipt is attached.
    pub async fn crear_gasto(&self, nuevo: NuevoGasto) -> Result<GastoGuardado, ApiError> {
        debug!(multipart = nuevo.comprobante.is_some(), "Creating expense");
        let options = nuevo.into_request()?;
        let guardado: GastoGuardado =
            fetch_json(&self.auth, "/api/gastos", options, "Error al crear gasto").await?;
        info!(id_gasto = guardado.gasto.id_gasto, "Expense created");
        Ok(guardado)
    }

    pub async fn obtener_gasto(&self, id: i64) -> Result<Gasto, ApiError> {
        fetch_json(
            &self.auth,
            &format!("/api/gastos/{}", id),
            RequestOptions::get(),
            "Error al obtener gasto",
        )
        .await
    }

    pub async fn actualizar_gasto(
        &self,
        id: i64,
        cambios: &CambiosGasto,
    ) -> Result<GastoGuardado, ApiError> {
        let guardado: GastoGuardado = fetch_json(
            &self.auth,
            &format!("/api/gastos/{}", id),
            RequestOptions::put_json(cambios)?,
            "Error al actualizar gasto",
        )
        .await?;
        info!(id_gasto = id, "Expense updated");
        Ok(guardado)
    }

    pub async fn eliminar_gasto(&self, id: i64) -> Result<Mensaje, ApiError> {
        let mensaje: Mensaje = fetch_json(
            &self.auth,
            &format!("/api/gastos/{}", id),
            RequestOptions::delete(),
            "Error al eliminar gasto",
        )
        .await?;
        info!(id_gasto = id, "Expense deleted");
        Ok(mensaje)
    }

    pub async fn estadisticas_gastos(
        &self,
        rango: &RangoFechas,
    ) -> Result<EstadisticasGastos, ApiError> {
        fetch_json(
            &self.auth,
            &rango.query().apply("/api/gastos/estadisticas"),
            RequestOptions::get(),
            "Error al obtener estadísticas",
        )
        .await
    }

    pub async fn listar_ingresos(&self, filtro: &FiltroIngresos) -> Result<ListaIngresos, ApiError> {
        let endpoint = Query::new()
            .text("fecha_inicio", filtro.fecha_inicio.as_deref())
            .text("fecha_fin", filtro.fecha_fin.as_deref())
            .number("servicio_id", filtro.servicio_id)
            .number("metodo_pago_id", filtro.metodo_pago_id)
            .number("limite", filtro.limite)
            .number("offset", filtro.offset)
            .apply("/api/ingresos");
        fetch_json(&self.auth, &endpoint, RequestOptions::get(), "Error al obtener ingresos").await
    }

    /// Record an income. Sent as multipart when a receipt is attached.
    pub async fn crear_ingreso(&self, nuevo: NuevoIngreso) -> Result<IngresoGuardado, ApiError> {
        debug!(multipart = nuevo.comprobante.is_some(), "Creating income");
        let options = nuevo.into_request()?;
        let guardado: IngresoGuardado =
            fetch_json(&self.auth, "/api/ingresos", options, "Error al crear ingreso").await?;
        info!(id_ingreso = guardado.ingreso.id_ingreso, "Income created");
        Ok(guardado)
    }

    pub async fn obtener_ingreso(&self, id: i64) -> Result<Ingreso, ApiError> {
        fetch_json(
            &self.auth,
            &format!("/api/ingresos/{}", id),
            RequestOptions::get(),
            "Error al obtener ingreso",
        )
        .await
    }

    pub async fn actualizar_ingreso(
        &self,
        id: i64,
        cambios: &CambiosIngreso,
    ) -> Result<IngresoGuardado, ApiError> {
        let guardado: IngresoGuardado = fetch_json(
            &self.auth,
            &format!("/api/ingresos/{}", id),
            RequestOptions::put_json(cambios)?,
            "Error al actualizar ingreso",
        )
        .await?;
        info!(id_ingreso = id, "Income updated");
        Ok(guardado)
    }

    pub async fn eliminar_ingreso(&self, id: i64) -> Result<Mensaje, ApiError> {
        let mensaje: Mensaje = fetch_json(
            &self.auth,
            &format!("/api/ingresos/{}", id),
            RequestOptions::delete(),
            "Error al eliminar ingreso",
        )
        .await?;
        info!(id_ingreso = id, "Income deleted");
        Ok(mensaje)
    }

    pub async fn estadisticas_ingresos(
        &self,
        rango: &RangoFechas,
    ) -> Result<EstadisticasIngresos, ApiError> {
        fetch_json(
            &self.auth,
            &rango.query().apply("/api/ingresos/estadisticas"),
            RequestOptions::get(),
            "Error al obtener estadísticas",
        )
        .await
    }

    pub async fn metodos_pago(&self) -> Result<Vec<MetodoPago>, ApiError> {
        let value = fetch_json(
            &self.auth,
            "/api/metodos-pago",
            RequestOptions::get(),
            "Error al obtener métodos de pago",
        )
        .await?;
        unwrap_list(value, "metodos_pago")
    }

    pub async fn servicios(&self) -> Result<Vec<Servicio>, ApiError> {
        let value = fetch_json(
            &self.auth,
            "/api/servicios",
            RequestOptions::get(),
            "Error al obtener servicios",
        )
        .await?;
        unwrap_list(value, "servicios")
    }
}
