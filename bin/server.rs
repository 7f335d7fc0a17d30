// Installment Ledger - Web Server
// REST API with Axum over the purchase/installment core

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put, MethodRouter},
    Router,
};
use rusqlite::Connection;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use installment_ledger::entities::{list_credit_cards, parse_id, validate_date, validate_year_month};
use installment_ledger::{
    init_tracing, open_database, store, Config, CreditCard, CreditCardListing, InstallmentSummary, LedgerError,
    PaymentType, Person, PurchaseOrchestrator, PurchaseRequest, PurchaseResponse,
    PurchaseResponseTotal, PurchaseType, Record,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    orchestrator: Arc<PurchaseOrchestrator>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db.lock().map_err(|_| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "database lock poisoned".to_string(),
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match err.root() {
            LedgerError::Validation(_) | LedgerError::DateParse { .. } => StatusCode::BAD_REQUEST,
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::warn!(error = %err, "request rejected");
        }

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn respond<T>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Purchase Handlers
// ============================================================================

/// POST /purchase
async fn create_purchase(State(state): State<AppState>, Json(request): Json<PurchaseRequest>) -> ApiResult<Uuid> {
    let purchase = request.into_purchase();
    purchase.validate(false)?;

    let mut conn = state.conn()?;
    let id = state.orchestrator.create_purchase(&mut conn, &purchase)?;

    respond(StatusCode::CREATED, id)
}

/// PUT /purchase
async fn update_purchase(State(state): State<AppState>, Json(request): Json<PurchaseRequest>) -> ApiResult<Uuid> {
    let purchase = request.into_purchase();
    purchase.validate(true)?;

    let mut conn = state.conn()?;
    state.orchestrator.update_purchase(&mut conn, &purchase)?;

    respond(StatusCode::OK, purchase.id)
}

/// DELETE /purchase/:id
async fn delete_purchase(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Uuid> {
    let id = parse_id(&id)?;

    let mut conn = state.conn()?;
    state.orchestrator.delete_purchase(&mut conn, id)?;

    respond(StatusCode::OK, id)
}

/// GET /purchase/:id
async fn get_purchase(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PurchaseResponse> {
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.find_purchase(&conn, id)?)
}

/// GET /purchase/date/:date
async fn purchases_by_date(State(state): State<AppState>, Path(date): Path<String>) -> ApiResult<PurchaseResponseTotal> {
    validate_date(&date)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.purchases_by_date(&conn, &date)?)
}

/// GET /purchase/month/:month
async fn purchases_by_month(State(state): State<AppState>, Path(month): Path<String>) -> ApiResult<PurchaseResponseTotal> {
    validate_year_month(&month)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.purchases_by_month(&conn, &month)?)
}

/// GET /purchase/person/:id
async fn purchases_by_person(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PurchaseResponseTotal> {
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.purchases_by_person(&conn, id)?)
}

/// GET /purchases
async fn all_purchases(State(state): State<AppState>) -> ApiResult<Vec<PurchaseResponse>> {
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.all_purchases(&conn)?)
}

// ============================================================================
// Installment Handlers
// ============================================================================

/// PUT /installment/:id - mark paid
async fn pay_installment(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Uuid> {
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    state.orchestrator.mark_installment_paid(&conn, id)?;
    respond(StatusCode::OK, id)
}

/// GET /installment/:id - installments of a purchase
async fn installments_for_purchase(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<InstallmentSummary> {
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.installments_for_purchase(&conn, id)?)
}

/// GET /installment/month/:month
async fn installments_for_month(State(state): State<AppState>, Path(month): Path<String>) -> ApiResult<InstallmentSummary> {
    validate_year_month(&month)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.installments_for_month(&conn, &month)?)
}

/// GET /installment/notPaid
async fn unpaid_installments(State(state): State<AppState>) -> ApiResult<InstallmentSummary> {
    let conn = state.conn()?;
    respond(StatusCode::OK, state.orchestrator.unpaid_installments(&conn)?)
}

// ============================================================================
// Reference Data Handlers (one set, every record type)
// ============================================================================

async fn create_record<R>(State(state): State<AppState>, Json(record): Json<R>) -> ApiResult<Uuid>
where
    R: Record + DeserializeOwned,
{
    let conn = state.conn()?;
    respond(StatusCode::CREATED, store::create(&conn, &record)?)
}

async fn update_record<R>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<R>,
) -> ApiResult<Uuid>
where
    R: Record + DeserializeOwned,
{
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    store::update(&conn, &record.with_id(id))?;
    respond(StatusCode::OK, id)
}

async fn delete_record<R: Record>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Uuid> {
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    store::delete::<R>(&conn, id)?;
    respond(StatusCode::OK, id)
}

async fn get_record<R>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<R>
where
    R: Record + Serialize,
{
    let id = parse_id(&id)?;
    let conn = state.conn()?;
    respond(StatusCode::OK, store::find_by_id::<R>(&conn, id)?)
}

async fn list_records<R>(State(state): State<AppState>) -> ApiResult<Vec<R>>
where
    R: Record + Serialize,
{
    let conn = state.conn()?;
    respond(StatusCode::OK, store::find_all::<R>(&conn)?)
}

/// GET /credit-cards - cards with their type label
async fn list_cards(State(state): State<AppState>) -> ApiResult<Vec<CreditCardListing>> {
    let conn = state.conn()?;
    respond(StatusCode::OK, list_credit_cards(&conn)?)
}

/// POST /<kind>, PUT|DELETE|GET /<kind>/:id, GET /<kind>s
fn record_routes<R>(kind: &str, list: MethodRouter<AppState>) -> Router<AppState>
where
    R: Record + Serialize + DeserializeOwned + Send + 'static,
{
    Router::new()
        .route(&format!("/{}", kind), post(create_record::<R>))
        .route(
            &format!("/{}/:id", kind),
            put(update_record::<R>)
                .delete(delete_record::<R>)
                .get(get_record::<R>),
        )
        .route(&format!("/{}s", kind), list)
}

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

// ============================================================================
// Main Server
// ============================================================================

fn config_arg() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--config")
        .and_then(|pos| args.get(pos + 1).cloned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    println!("🌐 Installment Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load(&Config::resolve_path(config_arg().as_deref()))?;

    let db_path = config.database_path();
    let conn = open_database(db_path).with_context(|| format!("open {}", db_path.display()))?;
    println!("✓ Database opened: {:?} (env: {})", db_path, config.api.env);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        orchestrator: Arc::new(PurchaseOrchestrator::new(config.schedule.split)),
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .api
                .cors_origin
                .parse::<HeaderValue>()
                .context("invalid cors_origin")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/purchase", post(create_purchase).put(update_purchase))
        .route("/purchase/:id", get(get_purchase).delete(delete_purchase))
        .route("/purchase/date/:date", get(purchases_by_date))
        .route("/purchase/month/:month", get(purchases_by_month))
        .route("/purchase/person/:id", get(purchases_by_person))
        .route("/purchases", get(all_purchases))
        .route("/installment/notPaid", get(unpaid_installments))
        .route("/installment/month/:month", get(installments_for_month))
        .route("/installment/:id", get(installments_for_purchase).put(pay_installment))
        .merge(record_routes::<Person>("person", get(list_records::<Person>)))
        .merge(record_routes::<PaymentType>("payment-type", get(list_records::<PaymentType>)))
        .merge(record_routes::<PurchaseType>("purchase-type", get(list_records::<PurchaseType>)))
        .merge(record_routes::<CreditCard>("credit-card", get(list_cards)))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   Press Ctrl+C to stop\n");
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
