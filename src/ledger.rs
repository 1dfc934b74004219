//! The movement ledger: incomes and expenses merged into one history.
//!
//! Pure helpers (merge, filter, pagination, totals, period ranges) plus
//! [`LedgerView`], which owns the loaded rows and applies mutations with
//! optimistic deletes and a [`Notice`] per outcome.

use chrono::{DateTime, Days, Local, Months, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::api::{
    CambiosGasto, CambiosIngreso, FiltroGastos, FiltroIngresos, FinanzasClient, Gasto, Ingreso,
    NuevoGasto, NuevoIngreso, RangoFechas,
};
use crate::error::ApiError;
use crate::optimistic::Optimistic;

pub const ITEMS_POR_PAGINA: usize = 20;
/// Rows shown on the period summary.
pub const RECIENTES: u32 = 10;

const SIN_CONCEPTO: &str = "Sin concepto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TipoMovimiento {
    Ingreso,
    Gasto,
}

impl fmt::Display for TipoMovimiento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TipoMovimiento::Ingreso => f.write_str("Ingreso"),
            TipoMovimiento::Gasto => f.write_str("Gasto"),
        }
    }
}

/// One row of the merged history.
#[derive(Debug, Clone, PartialEq)]
pub struct Movimiento {
    pub id: i64,
    pub tipo: TipoMovimiento,
    pub concepto: String,
    pub monto: f64,
    pub fecha: String,
}

impl Movimiento {
    pub fn from_ingreso(ingreso: &Ingreso) -> Self {
        let concepto = ingreso
            .concepto
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| ingreso.servicio.as_ref().map(|s| s.nombre.clone()))
            .unwrap_or_else(|| SIN_CONCEPTO.to_string());
        Self {
            id: ingreso.id_ingreso,
            tipo: TipoMovimiento::Ingreso,
            concepto,
            monto: ingreso.monto,
            fecha: ingreso.fecha_ingreso.clone(),
        }
    }

    pub fn from_gasto(gasto: &Gasto) -> Self {
        Self {
            id: gasto.id_gasto,
            tipo: TipoMovimiento::Gasto,
            concepto: gasto.concepto.clone(),
            monto: gasto.monto,
            fecha: gasto.fecha_gasto.clone(),
        }
    }

    /// Stable key across both kinds, e.g. `i-12` or `g-7`.
    pub fn key(&self) -> String {
        match self.tipo {
            TipoMovimiento::Ingreso => format!("i-{}", self.id),
            TipoMovimiento::Gasto => format!("g-{}", self.id),
        }
    }

    /// The movement date; accepts RFC 3339 timestamps and bare `YYYY-MM-DD`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_fecha(&self.fecha)
    }
}

fn parse_fecha(fecha: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(fecha) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(fecha, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Merge both lists, newest first. Rows with unreadable dates go last.
pub fn merge(ingresos: &[Ingreso], gastos: &[Gasto]) -> Vec<Movimiento> {
    let mut movimientos: Vec<Movimiento> = ingresos
        .iter()
        .map(Movimiento::from_ingreso)
        .chain(gastos.iter().map(Movimiento::from_gasto))
        .collect();
    movimientos.sort_by_key(|m| Reverse(m.timestamp()));
    movimientos
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filtro {
    #[default]
    Todos,
    Ingresos,
    Gastos,
}

impl Filtro {
    pub fn matches(&self, movimiento: &Movimiento) -> bool {
        match self {
            Filtro::Todos => true,
            Filtro::Ingresos => movimiento.tipo == TipoMovimiento::Ingreso,
            Filtro::Gastos => movimiento.tipo == TipoMovimiento::Gasto,
        }
    }
}

impl FromStr for Filtro {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todos" => Ok(Filtro::Todos),
            "ingresos" => Ok(Filtro::Ingresos),
            "gastos" => Ok(Filtro::Gastos),
            other => Err(format!("filtro desconocido: {}", other)),
        }
    }
}

pub fn filtrar(movimientos: &[Movimiento], filtro: Filtro) -> Vec<&Movimiento> {
    movimientos.iter().filter(|m| filtro.matches(m)).collect()
}

/// Number of pages for `len` rows. An empty list still has one (empty) page.
pub fn total_paginas(len: usize) -> usize {
    len.div_ceil(ITEMS_POR_PAGINA).max(1)
}

/// Rows of the 1-based page `pagina`. Out-of-range pages are empty.
pub fn pagina<T>(items: &[T], pagina: usize) -> &[T] {
    let inicio = pagina.saturating_sub(1).saturating_mul(ITEMS_POR_PAGINA);
    if inicio >= items.len() {
        return &[];
    }
    let fin = (inicio + ITEMS_POR_PAGINA).min(items.len());
    &items[inicio..fin]
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totales {
    pub ingresos: f64,
    pub gastos: f64,
    pub balance: f64,
}

pub fn totales<'a>(movimientos: impl IntoIterator<Item = &'a Movimiento>) -> Totales {
    let mut t = Totales::default();
    for m in movimientos {
        match m.tipo {
            TipoMovimiento::Ingreso => t.ingresos += m.monto,
            TipoMovimiento::Gasto => t.gastos += m.monto,
        }
    }
    t.balance = t.ingresos - t.gastos;
    t
}

/// Reporting period for the finance summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Periodo {
    #[default]
    General,
    Dia,
    Semana,
    Mes,
}

impl Periodo {
    pub fn rango(&self) -> RangoFechas {
        self.rango_at(Local::now())
    }

    /// Date range ending at `now`. `Dia` starts at local midnight; `General`
    /// is unbounded.
    pub fn rango_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> RangoFechas {
        let inicio = match self {
            Periodo::General => return RangoFechas::default(),
            Periodo::Dia => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| midnight.and_local_timezone(now.timezone()).earliest()),
            Periodo::Semana => now.clone().checked_sub_days(Days::new(7)),
            Periodo::Mes => now.clone().checked_sub_months(Months::new(1)),
        };
        RangoFechas {
            fecha_inicio: inicio.map(|dt| iso(&dt)),
            fecha_fin: Some(iso(&now)),
        }
    }
}

fn iso<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for Periodo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Periodo::General => "General",
            Periodo::Dia => "Día",
            Periodo::Semana => "Semana",
            Periodo::Mes => "Mes",
        })
    }
}

impl FromStr for Periodo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Periodo::General),
            "dia" | "día" => Ok(Periodo::Dia),
            "semana" => Ok(Periodo::Semana),
            "mes" => Ok(Periodo::Mes),
            other => Err(format!("periodo desconocido: {}", other)),
        }
    }
}

/// Feedback for the user after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Exito(String),
    Error(String),
}

impl Notice {
    pub fn mensaje(&self) -> &str {
        match self {
            Notice::Exito(m) | Notice::Error(m) => m,
        }
    }
}

/// Totals and latest movements for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumenPeriodo {
    pub periodo: Periodo,
    pub totales: Totales,
    pub recientes: Vec<Movimiento>,
}

/// Load the period summary: both aggregates and the latest rows, concurrently.
pub async fn resumen_periodo(
    client: &FinanzasClient,
    periodo: Periodo,
) -> Result<ResumenPeriodo, ApiError> {
    let rango = periodo.rango();
    let filtro_ingresos = FiltroIngresos {
        fecha_inicio: rango.fecha_inicio.clone(),
        fecha_fin: rango.fecha_fin.clone(),
        limite: Some(RECIENTES),
        ..Default::default()
    };
    let filtro_gastos = FiltroGastos {
        fecha_inicio: rango.fecha_inicio.clone(),
        fecha_fin: rango.fecha_fin.clone(),
        limite: Some(RECIENTES),
        ..Default::default()
    };

    let (stats_ingresos, stats_gastos, ingresos, gastos) = futures::try_join!(
        client.estadisticas_ingresos(&rango),
        client.estadisticas_gastos(&rango),
        client.listar_ingresos(&filtro_ingresos),
        client.listar_gastos(&filtro_gastos),
    )?;

    let ingresos_total = stats_ingresos.total.suma.monto.unwrap_or(0.0);
    let gastos_total = stats_gastos.total.suma.monto.unwrap_or(0.0);
    Ok(ResumenPeriodo {
        periodo,
        totales: Totales {
            ingresos: ingresos_total,
            gastos: gastos_total,
            balance: ingresos_total - gastos_total,
        },
        recientes: merge(&ingresos.ingresos, &gastos.gastos),
    })
}

/// Paged, filterable ledger backed by the finance client.
pub struct LedgerView {
    client: FinanzasClient,
    movimientos: Vec<Movimiento>,
    filtro: Filtro,
    pagina: usize,
    notices: Vec<Notice>,
}

impl LedgerView {
    pub fn new(client: FinanzasClient) -> Self {
        Self {
            client,
            movimientos: Vec::new(),
            filtro: Filtro::default(),
            pagina: 1,
            notices: Vec::new(),
        }
    }

    /// Fetch every income and expense and rebuild the history.
    pub async fn cargar(&mut self) -> Result<(), ApiError> {
        let filtro_ingresos = FiltroIngresos::default();
        let filtro_gastos = FiltroGastos::default();
        let (ingresos, gastos) = futures::try_join!(
            self.client.listar_ingresos(&filtro_ingresos),
            self.client.listar_gastos(&filtro_gastos),
        )?;
        self.movimientos = merge(&ingresos.ingresos, &gastos.gastos);
        self.pagina = self.pagina.min(self.total_paginas());
        debug!(rows = self.movimientos.len(), "Ledger loaded");
        Ok(())
    }

    pub fn movimientos(&self) -> &[Movimiento] {
        &self.movimientos
    }

    pub fn filtro(&self) -> Filtro {
        self.filtro
    }

    /// Change the filter and go back to the first page.
    pub fn set_filtro(&mut self, filtro: Filtro) {
        self.filtro = filtro;
        self.pagina = 1;
    }

    pub fn pagina_actual(&self) -> usize {
        self.pagina
    }

    pub fn set_pagina(&mut self, pagina: usize) {
        self.pagina = pagina.clamp(1, self.total_paginas());
    }

    pub fn total_paginas(&self) -> usize {
        total_paginas(filtrar(&self.movimientos, self.filtro).len())
    }

    /// Rows on the current page under the current filter.
    pub fn visibles(&self) -> Vec<&Movimiento> {
        let filtrados = filtrar(&self.movimientos, self.filtro);
        pagina(&filtrados, self.pagina).to_vec()
    }

    pub fn totales(&self) -> Totales {
        totales(filtrar(&self.movimientos, self.filtro))
    }

    /// Drain the pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Delete a movement. The row disappears immediately and comes back if
    /// the backend refuses.
    pub async fn eliminar(&mut self, tipo: TipoMovimiento, id: i64) -> Result<(), ApiError> {
        let client = &self.client;
        let request = async {
            match tipo {
                TipoMovimiento::Ingreso => client.eliminar_ingreso(id).await,
                TipoMovimiento::Gasto => client.eliminar_gasto(id).await,
            }
        };
        let result = Optimistic::new(&mut self.movimientos)
            .apply(
                |rows| {
                    let pos = rows.iter().position(|m| m.tipo == tipo && m.id == id)?;
                    Some((pos, rows.remove(pos)))
                },
                |rows, removed| {
                    if let Some((pos, row)) = removed {
                        rows.insert(pos.min(rows.len()), row);
                    }
                },
                request,
            )
            .await;

        match result {
            Ok(_) => {
                self.set_pagina(self.pagina);
                self.notices
                    .push(Notice::Exito("Movimiento eliminado exitosamente".into()));
                Ok(())
            }
            Err(e) => {
                warn!(tipo = %tipo, id, error = %e, "Delete failed, row restored");
                self.notices.push(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn crear_gasto(&mut self, nuevo: NuevoGasto) -> Result<(), ApiError> {
        let result = self.client.crear_gasto(nuevo).await.map(|_| ());
        self.after_save(result, "Movimiento agregado exitosamente").await
    }

    pub async fn crear_ingreso(&mut self, nuevo: NuevoIngreso) -> Result<(), ApiError> {
        let result = self.client.crear_ingreso(nuevo).await.map(|_| ());
        self.after_save(result, "Movimiento agregado exitosamente").await
    }

    pub async fn actualizar_gasto(&mut self, id: i64, cambios: &CambiosGasto) -> Result<(), ApiError> {
        let result = self.client.actualizar_gasto(id, cambios).await.map(|_| ());
        self.after_save(result, "Movimiento actualizado exitosamente").await
    }

    pub async fn actualizar_ingreso(
        &mut self,
        id: i64,
        cambios: &CambiosIngreso,
    ) -> Result<(), ApiError> {
        let result = self.client.actualizar_ingreso(id, cambios).await.map(|_| ());
        self.after_save(result, "Movimiento actualizado exitosamente").await
    }

    /// Saves are not optimistic: reload on success, report either way.
    async fn after_save(&mut self, result: Result<(), ApiError>, exito: &str) -> Result<(), ApiError> {
        if let Err(e) = result {
            self.notices.push(Notice::Error(e.to_string()));
            return Err(e);
        }
        self.notices.push(Notice::Exito(exito.to_string()));
        if let Err(e) = self.cargar().await {
            warn!(error = %e, "Reload after save failed");
            self.notices.push(Notice::Error(e.to_string()));
            return Err(e);
        }
        Ok(())
    }
}
