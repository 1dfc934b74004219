#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use jsonwebtoken::{EncodingKey, Header};
use las_aves::auth::{AuthService, CoordinatorOptions};
use las_aves::storage::TokenStore;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

pub const PASSWORD: &str = "aves-2024";

/// Sign a token that expires `secs` from now (negative for already expired).
pub fn mint(secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = json!({
        "sub": 1,
        "exp": now + secs,
        "jti": uuid::Uuid::new_v4().to_string(),
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-jwt-secret"),
    )
    .unwrap()
}

pub fn usuario_json(roles: &[&str]) -> Value {
    json!({
        "id_usuario": 1,
        "email": "ana@lasaves.mx",
        "nombre": "Ana",
        "apellido_paterno": "López",
        "apellido_materno": "Ruiz",
        "roles": roles,
    })
}

fn metodo() -> Value {
    json!({ "id_metodo": 1, "nombre": "Efectivo" })
}

fn registro() -> Value {
    json!({ "id_usuario": 1, "nombre": "Ana", "apellido_paterno": "López" })
}

pub fn gasto_json(id: i64, concepto: &str, monto: &str, fecha: &str) -> Value {
    json!({
        "id_gasto": id,
        "concepto": concepto,
        "monto": monto,
        "fecha_gasto": fecha,
        "comprobante_url": null,
        "notas": null,
        "fecha_registro": fecha,
        "metodo_pago": metodo(),
        "usuario_registro": registro(),
    })
}

pub fn ingreso_json(id: i64, concepto: Option<&str>, monto: f64, fecha: &str) -> Value {
    json!({
        "id_ingreso": id,
        "concepto": concepto,
        "monto": monto,
        "fecha_ingreso": fecha,
        "fecha_registro": fecha,
        "servicio": { "id_servicio": 2, "nombre": "Estancia", "costo_referencia": "8500.00" },
        "metodo_pago": metodo(),
        "usuario_registro": registro(),
    })
}

/// Counters and switches shared with the mock backend's handlers.
#[derive(Default)]
pub struct MockState {
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub api_calls: AtomicUsize,
    pub unauthorized: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub delete_fails: AtomicBool,
    pub reject_all: AtomicBool,
    pub refresh_delay: Mutex<Duration>,
    pub roles: Mutex<Vec<String>>,
    valid_access: Mutex<HashSet<String>>,
    refresh_token: Mutex<Option<String>>,
    content_types: Mutex<Vec<String>>,
    gastos: Mutex<Vec<Value>>,
    ingresos: Mutex<Vec<Value>>,
}

#[derive(Clone)]
pub struct MockBackend {
    pub state: Arc<MockState>,
    pub base_url: String,
}

impl MockBackend {
    /// Start the backend on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        *state.roles.lock().unwrap() = vec!["admin".to_string()];
        *state.gastos.lock().unwrap() = vec![
            gasto_json(1, "Medicamentos", "1200.50", "2024-03-02T10:00:00.000Z"),
            gasto_json(2, "Despensa", "800", "2024-03-04T09:00:00.000Z"),
        ];
        *state.ingresos.lock().unwrap() = vec![ingreso_json(
            7,
            Some("Mensualidad marzo"),
            8500.0,
            "2024-03-03T12:00:00.000Z",
        )];

        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{}", addr),
        }
    }

    /// Issue a token pair the backend accepts, as a login would.
    pub fn issue(&self, access_secs: i64) -> (String, String) {
        issue_pair(&self.state, access_secs)
    }

    /// Reject `access_token` from now on, as after a server-side revocation.
    pub fn revoke(&self, access_token: &str) {
        self.state.valid_access.lock().unwrap().remove(access_token);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn api_calls(&self) -> usize {
        self.state.api_calls.load(Ordering::SeqCst)
    }

    pub fn content_types(&self) -> Vec<String> {
        self.state.content_types.lock().unwrap().clone()
    }

    /// A signed-in auth service with a fresh token pair in memory.
    pub fn signed_in(&self) -> AuthService {
        self.signed_in_with(3600, CoordinatorOptions::default())
    }

    pub fn signed_in_with(&self, access_secs: i64, options: CoordinatorOptions) -> AuthService {
        let (access, refresh) = self.issue(access_secs);
        let tokens = TokenStore::in_memory();
        tokens.set_tokens(&access, &refresh);
        AuthService::with_options(reqwest::Client::new(), &self.base_url, tokens, options)
    }
}

fn issue_pair(state: &MockState, access_secs: i64) -> (String, String) {
    let access = mint(access_secs);
    let refresh = uuid::Uuid::new_v4().to_string();
    state.valid_access.lock().unwrap().insert(access.clone());
    *state.refresh_token.lock().unwrap() = Some(refresh.clone());
    (access, refresh)
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/api/echo", get(echo))
        .route("/api/gastos", get(listar_gastos).post(crear_gasto))
        .route("/api/gastos/{id}", get(obtener_gasto).delete(eliminar))
        .route("/api/gastos/estadisticas", get(estadisticas_gastos))
        .route("/api/ingresos", get(listar_ingresos))
        .route("/api/ingresos/estadisticas", get(estadisticas_ingresos))
        .route("/api/ingresos/{id}", axum::routing::delete(eliminar))
        .route("/api/metodos-pago", get(metodos_pago))
        .route("/api/servicios", get(servicios))
        .route("/api/estadisticas/resumen", get(resumen))
        .route("/api/usuarios", get(usuarios))
        .route("/api/usuarios/{id}/roles", put(actualizar_roles))
        .route("/api/roles", get(roles))
        .route("/api/reportes/financiero", post(reporte))
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Count the call and check the bearer token.
fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    let accepted = !state.reject_all.load(Ordering::SeqCst)
        && state.valid_access.lock().unwrap().contains(token);
    if accepted {
        Ok(())
    } else {
        state.unauthorized.fetch_add(1, Ordering::SeqCst);
        Err(error(StatusCode::UNAUTHORIZED, "Token inválido"))
    }
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
    }
    let (access, refresh) = issue_pair(&state, 3600);
    let roles = state.roles.lock().unwrap().clone();
    let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
    Json(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "usuario": usuario_json(&roles),
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.refresh_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    if state.refresh_fails.load(Ordering::SeqCst) {
        return error(StatusCode::UNAUTHORIZED, "Refresh token inválido");
    }
    let expected = state.refresh_token.lock().unwrap().clone();
    if expected.as_deref() != body["refreshToken"].as_str() {
        return error(StatusCode::UNAUTHORIZED, "Refresh token inválido");
    }

    let (access, refresh) = issue_pair(&state, 3600);
    Json(json!({ "accessToken": access, "refreshToken": refresh })).into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    *state.refresh_token.lock().unwrap() = None;
    Json(json!({ "mensaje": "Sesión cerrada" })).into_response()
}

async fn echo(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Json(json!({ "authorization": authorization })).into_response()
}

async fn listar_gastos(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    let gastos = state.gastos.lock().unwrap().clone();
    Json(json!({ "total": gastos.len(), "gastos": gastos })).into_response()
}

async fn crear_gasto(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.content_types.lock().unwrap().push(content_type);

    let gasto = gasto_json(3, "Pañales", "450.00", "2024-03-05T08:00:00.000Z");
    state.gastos.lock().unwrap().push(gasto.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "mensaje": "Gasto registrado", "gasto": gasto })),
    )
        .into_response()
}

async fn obtener_gasto(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    let gastos = state.gastos.lock().unwrap().clone();
    match gastos.into_iter().find(|g| g["id_gasto"] == id) {
        Some(gasto) => Json(gasto).into_response(),
        None => error(StatusCode::NOT_FOUND, "Gasto no encontrado"),
    }
}

async fn eliminar(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(_id): Path<i64>,
) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    if state.delete_fails.load(Ordering::SeqCst) {
        return error(StatusCode::CONFLICT, "No se puede eliminar un movimiento conciliado");
    }
    Json(json!({ "mensaje": "Eliminado" })).into_response()
}

async fn listar_ingresos(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    let ingresos = state.ingresos.lock().unwrap().clone();
    Json(json!({ "total": ingresos.len(), "ingresos": ingresos })).into_response()
}

async fn estadisticas_gastos(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({
        "total": { "_sum": { "monto": "2000.50" }, "_count": 2, "_avg": { "monto": "1000.25" } },
        "por_metodo": [{ "metodo_pago_id": 1, "_sum": { "monto": "2000.50" }, "_count": 2 }],
    }))
    .into_response()
}

async fn estadisticas_ingresos(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({
        "total": { "_sum": { "monto": 8500 }, "_count": 1, "_avg": { "monto": 8500 } },
        "por_servicio": [{ "servicio_id": 2, "_sum": { "monto": 8500 }, "_count": 1 }],
        "por_metodo": [],
    }))
    .into_response()
}

async fn metodos_pago(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({ "metodos_pago": [
        { "id_metodo": 1, "nombre": "Efectivo" },
        { "id_metodo": 2, "nombre": "Transferencia", "descripcion": "SPEI" },
    ]}))
    .into_response()
}

async fn servicios(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!([
        { "id_servicio": 2, "nombre": "Estancia", "costo_referencia": "8500.00" },
    ]))
    .into_response()
}

async fn resumen(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({
        "ingresos": { "total": 8500.0, "cantidad": 1, "promedio": 8500.0 },
        "gastos": { "total": 2000.5, "cantidad": 2, "promedio": 1000.25 },
        "balance": 6499.5,
        "movimientos_totales": 3,
    }))
    .into_response()
}

async fn usuarios(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({ "usuarios": [
        usuario_json(&["admin"]),
        {
            "id_usuario": 2,
            "email": "luis@lasaves.mx",
            "nombre": "Luis",
            "apellido_paterno": "Gómez",
            "roles": ["enfermero"],
            "activo": false,
        },
    ]}))
    .into_response()
}

async fn actualizar_roles(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!({
        "mensaje": "Roles actualizados",
        "usuario": {
            "id_usuario": id,
            "email": "luis@lasaves.mx",
            "nombre": "Luis",
            "apellido_paterno": "Gómez",
            "roles": body["roles"],
        },
    }))
    .into_response()
}

async fn roles(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    Json(json!([
        { "id_rol": 1, "nombre": "admin" },
        { "id_rol": 2, "nombre": "socio", "descripcion": "Socio de la estancia" },
    ]))
    .into_response()
}

async fn reporte(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = authorize(&state, &headers) {
        return rejected;
    }
    if body["fecha_inicio"].as_str() > body["fecha_fin"].as_str() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    (
        [(header::CONTENT_TYPE, "application/pdf")],
        b"%PDF-1.4 reporte".to_vec(),
    )
        .into_response()
}

/// Navigator that remembers every route it was sent to.
#[derive(Default)]
pub struct Recorder {
    routes: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().unwrap().last().cloned()
    }
}

impl las_aves::session::Navigator for Recorder {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}
