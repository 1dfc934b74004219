//! Subcommand handlers: one screen of the app each.

use chrono::{SecondsFormat, Utc};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{
    CambiosGasto, CambiosIngreso, Comprobante, NuevoGasto, NuevoIngreso, ReporteFinanciero,
};
use crate::auth::LoginCredentials;
use crate::authz::Module;
use crate::cli::{Command, GastoCommand, IngresoCommand};
use crate::error::ApiError;
use crate::ledger::{self, LedgerView, Notice, TipoMovimiento};
use crate::nav;
use crate::session::Access;
use crate::shell::{ShellError, ShellState};
use crate::AppClient;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("No has iniciado sesión")]
    NotLoggedIn,
    #[error("Tu rol no tiene acceso al módulo {0}")]
    Forbidden(Module),
    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl CommandError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            CommandError::Api(e) => Some(e),
            _ => None,
        }
    }
}

/// Run one subcommand against the client.
pub async fn run(client: &AppClient, command: Command) -> Result<(), CommandError> {
    let result = dispatch(client, command).await;
    if let Err(CommandError::Api(e)) = &result {
        // Session errors end the session; the caller only reports them
        client.session.handle_error(e);
    }
    result
}

async fn dispatch(client: &AppClient, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Login {
            email,
            password,
            recordarme,
        } => {
            let mut credentials = LoginCredentials::new(email, password);
            credentials.recordarme = recordarme.then_some(true);
            let usuario = client.session.login(&credentials).await?;
            println!("Bienvenido, {}", usuario.nombre_completo());
            Ok(())
        }
        Command::Logout => {
            client.session.logout().await;
            println!("Sesión cerrada");
            Ok(())
        }
        Command::Whoami => whoami(client),
        Command::Resumen => resumen(client).await,
        Command::Finanzas { periodo } => {
            guard(client, Module::Finanzas)?;
            let resumen = ledger::resumen_periodo(&client.finanzas, periodo).await?;
            println!("Periodo: {}", resumen.periodo);
            print_totales(&resumen.totales);
            println!();
            for movimiento in &resumen.recientes {
                print_movimiento(movimiento);
            }
            Ok(())
        }
        Command::Bitacora { filtro, pagina } => {
            guard(client, Module::Finanzas)?;
            let mut view = LedgerView::new(client.finanzas.clone());
            view.cargar().await?;
            view.set_filtro(filtro);
            view.set_pagina(pagina);
            for movimiento in view.visibles() {
                print_movimiento(movimiento);
            }
            println!(
                "Página {} de {}",
                view.pagina_actual(),
                view.total_paginas()
            );
            print_totales(&view.totales());
            Ok(())
        }
        Command::Gasto { action } => {
            guard(client, Module::Finanzas)?;
            gasto(client, action).await
        }
        Command::Ingreso { action } => {
            guard(client, Module::Finanzas)?;
            ingreso(client, action).await
        }
        Command::Catalogos => {
            guard(client, Module::Finanzas)?;
            let (metodos, servicios) = futures::try_join!(
                client.finanzas.metodos_pago(),
                client.finanzas.servicios()
            )?;
            println!("Métodos de pago:");
            for metodo in metodos {
                println!("  {:>4}  {}", metodo.id_metodo, metodo.nombre);
            }
            println!("Servicios:");
            for servicio in servicios {
                println!(
                    "  {:>4}  {} ({})",
                    servicio.id_servicio,
                    servicio.nombre,
                    mxn(servicio.costo_referencia)
                );
            }
            Ok(())
        }
        Command::Reporte {
            desde,
            hasta,
            output,
        } => {
            guard(client, Module::Finanzas)?;
            let pdf = client
                .reportes
                .generar_reporte_financiero(&ReporteFinanciero {
                    fecha_inicio: desde,
                    fecha_fin: hasta,
                })
                .await?;
            tokio::fs::write(&output, &pdf).await?;
            println!("Reporte guardado en {}", output.display());
            Ok(())
        }
        Command::Usuarios { id, roles } => {
            guard(client, Module::Administracion)?;
            if let Some(id) = id {
                let usuario = client
                    .administracion
                    .actualizar_roles_usuario(id, roles)
                    .await?;
                println!("{}: {}", usuario.email, usuario.roles.join(", "));
                return Ok(());
            }
            for usuario in client.administracion.listar_usuarios().await? {
                println!(
                    "{:>4}  {:<30} {:<28} {}{}",
                    usuario.id_usuario,
                    usuario.email,
                    format!("{} {}", usuario.nombre, usuario.apellido_paterno),
                    usuario.roles.join(","),
                    if usuario.activo { "" } else { " (inactivo)" }
                );
            }
            Ok(())
        }
        Command::Roles => {
            guard(client, Module::Administracion)?;
            for rol in client.administracion.listar_roles().await? {
                println!(
                    "{:>4}  {:<16} {}",
                    rol.id_rol,
                    rol.nombre,
                    rol.descripcion.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Shell { listen, upstream } => {
            let listener = TcpListener::bind(&listen).await?;
            let state = ShellState::new(reqwest::Client::new(), &upstream);
            crate::shell::serve(listener, state).await?;
            Ok(())
        }
    }
}

/// Require an active session with access to `module`.
fn guard(client: &AppClient, module: Module) -> Result<(), CommandError> {
    match client.session.require(module) {
        Access::Granted => Ok(()),
        Access::Redirected(route) if route == crate::session::LOGIN_ROUTE => {
            Err(CommandError::NotLoggedIn)
        }
        Access::Redirected(_) => Err(CommandError::Forbidden(module)),
        Access::Pending => Err(CommandError::NotLoggedIn),
    }
}

fn whoami(client: &AppClient) -> Result<(), CommandError> {
    guard(client, Module::Perfil)?;
    let Some(usuario) = client.session.user() else {
        return Err(CommandError::NotLoggedIn);
    };
    let gate = client.session.gate();
    println!("{} <{}>", usuario.nombre_completo(), usuario.email);
    println!("Roles: {}", usuario.roles.join(", "));
    let modules: Vec<String> = gate.modules().iter().map(ToString::to_string).collect();
    println!("Módulos: {}", modules.join(", "));
    let tabs: Vec<&str> = nav::tabs(gate.roles())
        .into_iter()
        .map(|(_, label)| label)
        .collect();
    println!("Pestañas: {}", tabs.join(" | "));
    Ok(())
}

async fn resumen(client: &AppClient) -> Result<(), CommandError> {
    guard(client, Module::Inicio)?;
    let resumen = client.estadisticas.resumen().await?;
    println!(
        "Ingresos: {} ({} movimientos, promedio {})",
        mxn(resumen.ingresos.total),
        resumen.ingresos.cantidad,
        mxn(resumen.ingresos.promedio)
    );
    println!(
        "Gastos:   {} ({} movimientos, promedio {})",
        mxn(resumen.gastos.total),
        resumen.gastos.cantidad,
        mxn(resumen.gastos.promedio)
    );
    println!("Balance:  {}", mxn(resumen.balance));
    println!("Movimientos totales: {}", resumen.movimientos_totales);
    Ok(())
}

async fn gasto(client: &AppClient, action: GastoCommand) -> Result<(), CommandError> {
    let mut view = LedgerView::new(client.finanzas.clone());
    let outcome = match action {
        GastoCommand::Add {
            concepto,
            monto,
            metodo_pago,
            fecha,
            notas,
            comprobante,
        } => {
            let comprobante = match comprobante {
                Some(path) => Some(Comprobante::from_path(&path).await?),
                None => None,
            };
            view.crear_gasto(NuevoGasto {
                concepto,
                monto,
                fecha_gasto: fecha.unwrap_or_else(now_iso),
                metodo_pago_id: metodo_pago,
                notas,
                comprobante,
            })
            .await
        }
        GastoCommand::Edit {
            id,
            concepto,
            monto,
            metodo_pago,
            notas,
        } => {
            let cambios = CambiosGasto {
                concepto,
                monto,
                metodo_pago_id: metodo_pago,
                notas,
            };
            view.actualizar_gasto(id, &cambios).await
        }
        GastoCommand::Rm { id } => {
            view.cargar().await?;
            view.eliminar(TipoMovimiento::Gasto, id).await
        }
        GastoCommand::Show { id } => {
            let gasto = client.finanzas.obtener_gasto(id).await?;
            println!("Gasto #{}: {}", gasto.id_gasto, gasto.concepto);
            println!("  Monto:  {}", mxn(gasto.monto));
            println!("  Fecha:  {}", gasto.fecha_gasto);
            println!("  Método: {}", gasto.metodo_pago.nombre);
            if let Some(notas) = &gasto.notas {
                println!("  Notas:  {}", notas);
            }
            if let Some(url) = &gasto.comprobante_url {
                println!("  Comprobante: {}", url);
            }
            return Ok(());
        }
    };
    print_notices(view.take_notices());
    outcome.map_err(Into::into)
}

async fn ingreso(client: &AppClient, action: IngresoCommand) -> Result<(), CommandError> {
    let mut view = LedgerView::new(client.finanzas.clone());
    let outcome = match action {
        IngresoCommand::Add {
            monto,
            metodo_pago,
            servicio,
            concepto,
            fecha,
            notas,
            comprobante,
        } => {
            let comprobante = match comprobante {
                Some(path) => Some(Comprobante::from_path(&path).await?),
                None => None,
            };
            view.crear_ingreso(NuevoIngreso {
                servicio_id: servicio,
                concepto,
                monto,
                fecha_ingreso: fecha.unwrap_or_else(now_iso),
                metodo_pago_id: metodo_pago,
                notas,
                comprobante,
            })
            .await
        }
        IngresoCommand::Edit {
            id,
            servicio,
            concepto,
            monto,
            metodo_pago,
            notas,
        } => {
            let cambios = CambiosIngreso {
                servicio_id: servicio,
                concepto,
                monto,
                metodo_pago_id: metodo_pago,
                notas,
            };
            view.actualizar_ingreso(id, &cambios).await
        }
        IngresoCommand::Rm { id } => {
            view.cargar().await?;
            view.eliminar(TipoMovimiento::Ingreso, id).await
        }
        IngresoCommand::Show { id } => {
            let ingreso = client.finanzas.obtener_ingreso(id).await?;
            let concepto = ledger::Movimiento::from_ingreso(&ingreso).concepto;
            println!("Ingreso #{}: {}", ingreso.id_ingreso, concepto);
            println!("  Monto:  {}", mxn(ingreso.monto));
            println!("  Fecha:  {}", ingreso.fecha_ingreso);
            println!("  Método: {}", ingreso.metodo_pago.nombre);
            if let Some(notas) = &ingreso.notas {
                println!("  Notas:  {}", notas);
            }
            if let Some(url) = &ingreso.comprobante_url {
                println!("  Comprobante: {}", url);
            }
            return Ok(());
        }
    };
    print_notices(view.take_notices());
    outcome.map_err(Into::into)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice {
            Notice::Exito(m) => println!("✓ {}", m),
            Notice::Error(m) => {
                info!(message = %m, "Mutation failed");
                eprintln!("✗ {}", m);
            }
        }
    }
}

fn print_movimiento(movimiento: &ledger::Movimiento) {
    let fecha = movimiento
        .timestamp()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| movimiento.fecha.clone());
    let signo = match movimiento.tipo {
        TipoMovimiento::Ingreso => '+',
        TipoMovimiento::Gasto => '-',
    };
    println!(
        "{:<7} {}  {:<32} {}{}",
        movimiento.key(),
        fecha,
        movimiento.concepto,
        signo,
        mxn(movimiento.monto)
    );
}

fn print_totales(totales: &ledger::Totales) {
    println!(
        "Ingresos {}  Gastos {}  Balance {}",
        mxn(totales.ingresos),
        mxn(totales.gastos),
        mxn(totales.balance)
    );
}

/// Format an amount as Mexican pesos: `$1,234.50`, `-$80.00`.
pub fn mxn(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let pesos = (cents / 100).to_string();
    let mut grouped = String::with_capacity(pesos.len() + pesos.len() / 3);
    for (i, digit) in pesos.chars().enumerate() {
        if i > 0 && (pesos.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
