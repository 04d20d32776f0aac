use crate::config::Config;
use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mintgate_core::{
    ChainSubmitter, ChainSubmitterBuilder, Clock, ContractQueryOperation, DeployContractOperation,
    DeployContractOperationRequest, GetSaleDetailOperation, GetSaleDetailOperationOutcome,
    GetSaleDetailOperationRequest, LedgerStore, ListActiveSalesOperation,
    ListActiveSalesOperationRequest, MintError, ProgramArtifact, PurchaseHistoryOperation,
    PurchaseHistoryOperationOutcome, PurchaseHistoryOperationRequest, PurchaseOperation,
    PurchaseOperationOutcome, PurchaseOperationRequest, RegisterSaleOperation,
    RegisterSaleOperationOutcome, RegisterSaleOperationRequest, Result, SalePolicy, SystemClock,
    TokenInfo,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub register_sale: RegisterSaleOperation,
    pub purchase: PurchaseOperation,
    pub list_active_sales: ListActiveSalesOperation,
    pub sale_detail: GetSaleDetailOperation,
    pub purchase_history: PurchaseHistoryOperation,
    pub deploy_contract: DeployContractOperation,
    pub contract_query: ContractQueryOperation,
    pub purchase_timeout: Option<Duration>,
}

impl ServerState {
    pub fn new(
        ledger: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
        submitter: Arc<dyn ChainSubmitter>,
        artifact: Arc<ProgramArtifact>,
        policy: SalePolicy,
        purchase_timeout: Option<Duration>,
    ) -> Self {
        Self {
            register_sale: RegisterSaleOperation::new(ledger.clone(), clock.clone(), policy),
            purchase: PurchaseOperation::new(ledger.clone(), clock.clone()),
            list_active_sales: ListActiveSalesOperation::new(ledger.clone(), clock.clone()),
            sale_detail: GetSaleDetailOperation::new(ledger.clone()),
            purchase_history: PurchaseHistoryOperation::new(ledger.clone()),
            deploy_contract: DeployContractOperation::new(
                ledger.clone(),
                submitter,
                artifact,
                clock,
            ),
            contract_query: ContractQueryOperation::new(ledger),
            purchase_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Seconds a client should wait before resubmitting after a transient failure
const RETRY_AFTER_SECS: &str = "1";

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, axum::Json(ApiResponse::ok(data))).into_response()
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(ApiResponse::err(message))).into_response()
}

fn error_response(error: &MintError) -> Response {
    let status = match error {
        MintError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        MintError::NotFound(_) => StatusCode::NOT_FOUND,
        MintError::DeadlineExceeded => StatusCode::SERVICE_UNAVAILABLE,
        MintError::Chain(_) | MintError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }

    let mut response = reject(status, error.to_string());
    if status.is_server_error() && error.is_transient() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    }
    response
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployContractBody {
    #[serde(alias = "wallet_address")]
    wallet_address: String,
}

#[derive(Debug, Deserialize)]
struct WalletQuery {
    #[serde(default, alias = "walletAddress")]
    wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BuyerQuery {
    #[serde(default, rename = "walletAddress", alias = "wallet_address")]
    wallet_address: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSaleBody {
    contract_address: String,
    price: Decimal,
    min_amount_per_address: u64,
    max_amount_per_address: u64,
    #[serde(default)]
    global_cap: Option<u64>,
    #[serde(default)]
    mint_percentage: Option<u8>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    token: TokenInfo,
}

/// Amount as sent by clients: a base-10 string, or a bare JSON integer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmountInput {
    Integer(i64),
    Text(String),
}

impl AmountInput {
    fn parse(&self) -> std::result::Result<i64, String> {
        match self {
            AmountInput::Integer(value) => Ok(*value),
            AmountInput::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("amount must be a base-10 64-bit integer, got {:?}", text)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintBody {
    contract_address: String,
    #[serde(alias = "wallet_address")]
    wallet_address: String,
    amount: AmountInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    contract_address: String,
    deployed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MintResponse {
    id: String,
    contract_address: String,
    wallet_address: String,
    amount: u64,
    price: Decimal,
    timestamp: DateTime<Utc>,
    consumed: u64,
    total_sold: u64,
}

pub async fn run_server(config: Config) -> Result<()> {
    let ledger = Arc::new(LedgerStore::open(
        config.ledger.db_path.clone(),
        config.ledger.options(),
    )?);

    let mut builder = ChainSubmitterBuilder::new().backend(config.chain.backend.clone());
    if let Some(http) = &config.chain.http {
        builder = builder
            .http_endpoint(http.endpoint.clone())
            .http_timeout(Duration::from_millis(http.timeout_ms));
    }
    let submitter = builder.build()?;

    let artifact = match &config.chain.program_path {
        Some(path) => ProgramArtifact::load(path)?,
        None => {
            tracing::warn!("No chain.program_path configured; deploying a placeholder program");
            ProgramArtifact::from_bytes("placeholder", Bytes::from_static(b"mintgate-placeholder"))
        }
    };
    tracing::info!(
        "Loaded program {} (sha256={}, {} bytes)",
        artifact.name,
        artifact.sha256,
        artifact.bytes.len()
    );

    let state = Arc::new(ServerState::new(
        ledger,
        Arc::new(SystemClock),
        submitter,
        Arc::new(artifact),
        config.sale_policy.policy()?,
        config.purchase.timeout(),
    ));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("Server listening on {}", config.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/contracts", post(deploy_contract).get(list_contracts))
        .route("/api/contracts/:contract_address", get(get_contract))
        .route("/api/contracts/:contract_address/verify", get(verify_contract))
        .route("/api/sales", post(register_sale))
        .route("/api/mint/active", get(list_active_sales))
        .route("/api/mint/mint", post(mint))
        .route("/api/mint/:contract_address", get(get_sale_detail))
        .route("/api/mint/:contract_address/history", get(purchase_history))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

async fn deploy_contract(
    State(state): State<Arc<ServerState>>,
    body: std::result::Result<axum::Json<DeployContractBody>, JsonRejection>,
) -> Response {
    let axum::Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return reject(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state
        .deploy_contract
        .run(DeployContractOperationRequest {
            wallet_address: body.wallet_address,
        })
        .await
    {
        Ok(record) => respond(StatusCode::CREATED, record),
        Err(error) => error_response(&error),
    }
}

async fn list_contracts(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WalletQuery>,
) -> Response {
    let Some(wallet_address) = query.wallet_address.filter(|value| !value.trim().is_empty())
    else {
        return reject(StatusCode::BAD_REQUEST, "wallet_address is required");
    };

    match state.contract_query.list_by_wallet(&wallet_address).await {
        Ok(records) => respond(StatusCode::OK, records),
        Err(error) => error_response(&error),
    }
}

async fn get_contract(
    State(state): State<Arc<ServerState>>,
    Path(contract_address): Path<String>,
) -> Response {
    match state.contract_query.get_by_address(&contract_address).await {
        Ok(Some(view)) => respond(StatusCode::OK, view),
        Ok(None) => reject(
            StatusCode::NOT_FOUND,
            format!("contract not found: {}", contract_address),
        ),
        Err(error) => error_response(&error),
    }
}

async fn verify_contract(
    State(state): State<Arc<ServerState>>,
    Path(contract_address): Path<String>,
) -> Response {
    match state.deploy_contract.verify(&contract_address).await {
        Ok(deployed) => respond(
            StatusCode::OK,
            VerifyResponse {
                contract_address,
                deployed,
            },
        ),
        Err(error) => error_response(&error),
    }
}

async fn register_sale(
    State(state): State<Arc<ServerState>>,
    body: std::result::Result<axum::Json<RegisterSaleBody>, JsonRejection>,
) -> Response {
    let axum::Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return reject(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let request = RegisterSaleOperationRequest {
        contract_address: body.contract_address,
        price: body.price,
        min_amount_per_address: body.min_amount_per_address,
        max_amount_per_address: body.max_amount_per_address,
        global_cap: body.global_cap,
        mint_percentage: body.mint_percentage,
        start_time: body.start_time,
        end_time: body.end_time,
        token: body.token,
    };

    match state.register_sale.run(request).await {
        Ok(RegisterSaleOperationOutcome::Registered(sale)) => respond(StatusCode::CREATED, sale),
        Ok(RegisterSaleOperationOutcome::DuplicateAddress) => reject(
            StatusCode::CONFLICT,
            "a sale is already registered for this contract address",
        ),
        Ok(RegisterSaleOperationOutcome::InvalidWindow(reason))
        | Ok(RegisterSaleOperationOutcome::InvalidAmounts(reason)) => {
            reject(StatusCode::BAD_REQUEST, reason)
        }
        Err(error) => error_response(&error),
    }
}

async fn list_active_sales(State(state): State<Arc<ServerState>>) -> Response {
    match state
        .list_active_sales
        .run(ListActiveSalesOperationRequest::default())
        .await
    {
        Ok(sales) => respond(StatusCode::OK, sales),
        Err(error) => error_response(&error),
    }
}

async fn get_sale_detail(
    State(state): State<Arc<ServerState>>,
    Path(contract_address): Path<String>,
    Query(query): Query<BuyerQuery>,
) -> Response {
    let request = GetSaleDetailOperationRequest {
        contract_address: contract_address.clone(),
        buyer_address: query.wallet_address.unwrap_or_default(),
    };

    match state.sale_detail.run(request).await {
        Ok(GetSaleDetailOperationOutcome::Found(detail)) => respond(StatusCode::OK, detail),
        Ok(GetSaleDetailOperationOutcome::NotFound) => reject(
            StatusCode::NOT_FOUND,
            format!("sale not found: {}", contract_address),
        ),
        Err(error) => error_response(&error),
    }
}

async fn purchase_history(
    State(state): State<Arc<ServerState>>,
    Path(contract_address): Path<String>,
    Query(query): Query<BuyerQuery>,
) -> Response {
    let request = PurchaseHistoryOperationRequest {
        contract_address: contract_address.clone(),
        buyer_address: query.wallet_address,
        limit: query.limit,
    };

    match state.purchase_history.run(request).await {
        Ok(PurchaseHistoryOperationOutcome::Found(items)) => respond(StatusCode::OK, items),
        Ok(PurchaseHistoryOperationOutcome::SaleNotFound) => reject(
            StatusCode::NOT_FOUND,
            format!("sale not found: {}", contract_address),
        ),
        Err(error) => error_response(&error),
    }
}

async fn mint(
    State(state): State<Arc<ServerState>>,
    body: std::result::Result<axum::Json<MintBody>, JsonRejection>,
) -> Response {
    let axum::Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return reject(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let amount = match body.amount.parse() {
        Ok(amount) => amount,
        Err(reason) => return reject(StatusCode::BAD_REQUEST, reason),
    };

    let request = PurchaseOperationRequest {
        contract_address: body.contract_address,
        buyer_address: body.wallet_address,
        amount,
        deadline: state.purchase_timeout.map(|timeout| Instant::now() + timeout),
    };

    match state.purchase.run(request).await {
        Ok(PurchaseOperationOutcome::Accepted(result)) => respond(
            StatusCode::OK,
            MintResponse {
                id: result.record.id,
                contract_address: result.record.contract_address,
                wallet_address: result.record.buyer_address,
                amount: result.record.amount,
                price: result.record.price,
                timestamp: result.record.timestamp,
                consumed: result.consumed,
                total_sold: result.total_sold,
            },
        ),
        Ok(PurchaseOperationOutcome::Invalid(reason)) => reject(StatusCode::BAD_REQUEST, reason),
        Ok(PurchaseOperationOutcome::SaleNotFound) => {
            reject(StatusCode::NOT_FOUND, "sale not found")
        }
        Ok(PurchaseOperationOutcome::NotActive {
            now,
            start_time,
            end_time,
        }) => reject(
            StatusCode::CONFLICT,
            format!(
                "sale is not active at {} (window {} to {})",
                now.to_rfc3339(),
                start_time.to_rfc3339(),
                end_time.to_rfc3339()
            ),
        ),
        Ok(PurchaseOperationOutcome::ExceedsPerAddressLimit {
            consumed,
            requested,
            max,
        }) => reject(
            StatusCode::CONFLICT,
            format!(
                "exceeds per-address limit: already minted {}, requested {}, max {}",
                consumed, requested, max
            ),
        ),
        Ok(PurchaseOperationOutcome::ExceedsGlobalCap {
            total_sold,
            requested,
            cap,
        }) => reject(
            StatusCode::CONFLICT,
            format!(
                "exceeds global cap: sold {}, requested {}, cap {}",
                total_sold, requested, cap
            ),
        ),
        Err(error) => error_response(&error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use mintgate_core::{DryRunChainSubmitter, FixedClock, LedgerOptions};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
    }

    fn now() -> DateTime<Utc> {
        mintgate_core::truncate_to_millis(Utc::now())
    }

    fn test_app(at: DateTime<Utc>) -> TestApp {
        test_app_with_timeout(at, Some(Duration::from_secs(5)))
    }

    fn test_app_with_timeout(at: DateTime<Utc>, purchase_timeout: Option<Duration>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            LedgerStore::open(dir.path().join("ledger.db"), LedgerOptions::default()).unwrap(),
        );
        let state = Arc::new(ServerState::new(
            ledger,
            Arc::new(FixedClock(at)),
            Arc::new(DryRunChainSubmitter::new()),
            Arc::new(ProgramArtifact::from_bytes(
                "pump_token",
                Bytes::from_static(b"program"),
            )),
            SalePolicy::default(),
            purchase_timeout,
        ));

        TestApp {
            _dir: dir,
            router: build_router(state),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn sale_body(contract_address: &str, at: DateTime<Utc>) -> Value {
        json!({
            "contractAddress": contract_address,
            "price": "0.5",
            "minAmountPerAddress": 1,
            "maxAmountPerAddress": 100,
            "globalCap": 150,
            "startTime": (at - chrono::Duration::hours(1)).to_rfc3339(),
            "endTime": (at + chrono::Duration::hours(1)).to_rfc3339(),
            "token": {
                "name": "Pump",
                "symbol": "PMP",
                "decimals": 9,
                "totalSupply": 1000
            }
        })
    }

    fn mint_body(contract_address: &str, wallet: &str, amount: &str) -> Value {
        json!({
            "contractAddress": contract_address,
            "walletAddress": wallet,
            "amount": amount
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(now());
        let (status, body) = send(&app.router, get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_register_mint_and_query() {
        let at = now();
        let app = test_app(at);

        let (status, body) = send(&app.router, post_json("/api/sales", sale_body("sale-1", at))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));

        let (status, _) = send(&app.router, post_json("/api/sales", sale_body("sale-1", at))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("sale-1", "buyer-a", "60")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["consumed"], json!(60));
        assert_eq!(body["data"]["walletAddress"], json!("buyer-a"));

        let (status, body) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("sale-1", "buyer-a", "50")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], json!(false));

        let (status, body) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("sale-1", "buyer-a", "40")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["consumed"], json!(100));

        let (status, _) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("sale-1", "buyer-b", "60")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app.router,
            get_request("/api/mint/sale-1?walletAddress=buyer-a"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["consumedByBuyer"], json!(100));
        assert_eq!(body["data"]["totalSold"], json!(100));
        assert_eq!(body["data"]["symbol"], json!("PMP"));

        let (status, body) = send(&app.router, get_request("/api/mint/active")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["contractAddress"], json!("sale-1"));

        let (status, body) = send(
            &app.router,
            get_request("/api/mint/sale-1/history?walletAddress=buyer-a"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let items = body["data"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["amount"], json!(40));
        assert_eq!(items[0]["totalCost"], json!("20.0"));
    }

    #[tokio::test]
    async fn test_expired_purchase_deadline_is_retryable() {
        let at = now();
        let app = test_app_with_timeout(at, Some(Duration::ZERO));
        send(&app.router, post_json("/api/sales", sale_body("sale-1", at))).await;

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/mint/mint",
                mint_body("sale-1", "buyer-a", "10"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            RETRY_AFTER_SECS
        );

        let (status, body) = send(&app.router, get_request("/api/mint/sale-1/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_permanent_failures_carry_no_retry_hint() {
        let response = error_response(&MintError::Internal("corrupt row".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let response = error_response(&MintError::InvalidRequest("amount".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn test_mint_rejects_bad_amounts() {
        let at = now();
        let app = test_app(at);
        send(&app.router, post_json("/api/sales", sale_body("sale-1", at))).await;

        for amount in ["-5", "0", "abc", "1.5", "9223372036854775808"] {
            let (status, body) = send(
                &app.router,
                post_json("/api/mint/mint", mint_body("sale-1", "buyer-a", amount)),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "amount {:?}", amount);
            assert_eq!(body["success"], json!(false));
        }

        let (status, body) = send(&app.router, get_request("/api/mint/sale-1/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sale_returns_404() {
        let app = test_app(now());

        let (status, _) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("missing", "buyer-a", "1")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app.router, get_request("/api/mint/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mint_outside_window_is_conflict() {
        let at = now();
        let app = test_app(at);

        let mut body = sale_body("sale-1", at);
        body["startTime"] = json!((at + chrono::Duration::hours(1)).to_rfc3339());
        body["endTime"] = json!((at + chrono::Duration::hours(2)).to_rfc3339());
        let (status, _) = send(&app.router, post_json("/api/sales", body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app.router,
            post_json("/api/mint/mint", mint_body("sale-1", "buyer-a", "1")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_sale_window_is_bad_request() {
        let at = now();
        let app = test_app(at);

        let mut body = sale_body("sale-1", at);
        body["endTime"] = json!((at + chrono::Duration::days(8)).to_rfc3339());
        let (status, body) = send(&app.router, post_json("/api/sales", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_contract_deploy_and_lookup() {
        let app = test_app(now());

        let (status, body) = send(
            &app.router,
            post_json("/api/contracts", json!({ "walletAddress": "wallet-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], json!("success"));
        let address = body["data"]["contractAddress"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app.router,
            get_request(&format!("/api/contracts/{}", address)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["walletAddress"], json!("wallet-1"));
        assert_eq!(body["data"]["sale"], Value::Null);

        let (status, body) = send(
            &app.router,
            get_request("/api/contracts?wallet_address=wallet-1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app.router, get_request("/api/contracts")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app.router, get_request("/api/contracts/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app.router,
            get_request(&format!("/api/contracts/{}/verify", address)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deployed"], json!(true));

        let (status, _) = send(&app.router, get_request("/api/contracts/unknown/verify")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app.router, post_json("/api/contracts", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
