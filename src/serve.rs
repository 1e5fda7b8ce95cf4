//! HTTP JSON API for the intake engine
//!
//! `dealscope serve` → pricing, scenario estimates, deal pipeline and analysis
//! over a small tiny_http server. Every response uses the same
//! `{ ok, data, error }` envelope.

use crate::deal::{DealStage, DealSubmission};
use crate::pricing::{PricingError, PricingTable, INVALID_PRICE};
use crate::report::DealReport;
use crate::scenario::{demo_scenarios, estimate_credits, EstimateError, ScenarioRequest};
use crate::store::{DealStore, PricingStore, StoreError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Artificial pause in front of analysis responses
///
/// Scoring is instant; the intake UI used to show a "processing" state for a
/// moment. Only the HTTP adapter applies this, after the result is computed.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedLatency {
    delay: Duration,
    sleep: fn(Duration),
}

impl SimulatedLatency {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sleep: std::thread::sleep,
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Use a custom sleep function (tests)
    pub fn with_sleep(delay: Duration, sleep: fn(Duration)) -> Self {
        Self { delay, sleep }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `compute`, then pause before handing back its result
    pub fn apply<T>(&self, compute: impl FnOnce() -> T) -> T {
        let out = compute();
        if !self.delay.is_zero() {
            (self.sleep)(self.delay);
        }
        out
    }
}

/// A routed response before it hits the socket
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<PricingError> for ApiError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::Rejected(msg) => ApiError::BadRequest(msg),
            PricingError::Store(e) => e.into(),
        }
    }
}

impl From<EstimateError> for ApiError {
    fn from(e: EstimateError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

type ApiResult = std::result::Result<Reply, ApiError>;

fn to_reply<T: Serialize>(status: u16, response: &ApiResponse<T>) -> Reply {
    let body = serde_json::to_string(response).unwrap_or_else(|e| {
        format!(r#"{{"ok":false,"data":null,"error":"Serialization failed: {}"}}"#, e)
    });
    Reply { status, body }
}

fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(to_reply(200, &ApiResponse::success(data)))
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> std::result::Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Price edit from the admin form; `price` may be a number or the raw field text
#[derive(Deserialize)]
struct PriceEdit {
    key: String,
    price: serde_json::Value,
}

#[derive(Deserialize)]
struct DealQuery {
    stage: Option<String>,
}

/// Request router over a store
pub struct Api<S> {
    store: S,
    latency: SimulatedLatency,
}

impl<S: PricingStore + DealStore> Api<S> {
    pub fn new(store: S, latency: SimulatedLatency) -> Self {
        Self { store, latency }
    }

    /// Route one request. Never fails; errors become envelope replies.
    pub fn handle(&self, method: &Method, url: &str, body: &str) -> Reply {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let result = match (method, segments.as_slice()) {
            (Method::Get, ["api", "pricing"]) => self.list_pricing(),
            (Method::Post, ["api", "pricing"]) => self.edit_pricing(body),
            (Method::Post, ["api", "pricing", "reset"]) => self.reset_pricing(),
            (Method::Get, ["api", "scenarios"]) => ok(demo_scenarios()),
            (Method::Post, ["api", "estimate"]) => self.estimate(body),
            (Method::Get, ["api", "deals"]) => self.list_deals(query),
            (Method::Post, ["api", "deals"]) => self.create_deal(body),
            (Method::Get, ["api", "deals", id]) => self.get_deal(id),
            (Method::Put, ["api", "deals", id]) => self.update_deal(id, body),
            (Method::Delete, ["api", "deals", id]) => self.delete_deal(id),
            (Method::Get, ["api", "deals", id, "analysis"]) => self.analyze_stored(id),
            (Method::Post, ["api", "analyze"]) => self.analyze_adhoc(body),
            _ => Err(ApiError::NotFound(format!("No route for {} {}", method, path))),
        };

        result.unwrap_or_else(|e| to_reply(e.status(), &ApiResponse::<()>::failure(e.message())))
    }

    fn pricing(&self) -> PricingTable<&S> {
        PricingTable::new(&self.store)
    }

    fn list_pricing(&self) -> ApiResult {
        ok(self.pricing().all_rates()?)
    }

    fn edit_pricing(&self, body: &str) -> ApiResult {
        let edit: PriceEdit = parse_body(body)?;
        let table = self.pricing();
        let item = match &edit.price {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(price) => table.set_rate(&edit.key, price)?,
                None => return Err(ApiError::BadRequest(INVALID_PRICE.to_string())),
            },
            serde_json::Value::String(s) => table.set_rate_str(&edit.key, s)?,
            _ => return Err(ApiError::BadRequest(INVALID_PRICE.to_string())),
        };
        ok(item)
    }

    fn reset_pricing(&self) -> ApiResult {
        ok(self.pricing().reset_to_defaults()?)
    }

    fn estimate(&self, body: &str) -> ApiResult {
        let request: ScenarioRequest = parse_body(body)?;
        let rates = self.pricing().rate_card()?;
        ok(estimate_credits(&rates, &request)?)
    }

    fn list_deals(&self, query: &str) -> ApiResult {
        let query: DealQuery = serde_urlencoded::from_str(query)
            .map_err(|e| ApiError::BadRequest(format!("Invalid query: {}", e)))?;
        let deals = match query.stage.as_deref().filter(|s| !s.is_empty()) {
            Some(stage) => {
                let stage: DealStage = stage.parse().map_err(ApiError::BadRequest)?;
                self.store.deals_in_stage(stage)?
            }
            None => self.store.all_deals()?,
        };
        ok(deals)
    }

    fn validated(body: &str) -> std::result::Result<DealSubmission, ApiError> {
        let deal: DealSubmission = parse_body(body)?;
        deal.validate()
            .map_err(|errors| ApiError::BadRequest(errors.to_string()))?;
        Ok(deal)
    }

    fn create_deal(&self, body: &str) -> ApiResult {
        let saved = self.store.save_deal(Self::validated(body)?)?;
        Ok(to_reply(201, &ApiResponse::success(saved)))
    }

    fn find_deal(&self, id: &str) -> std::result::Result<DealSubmission, ApiError> {
        self.store
            .deal_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Deal '{}' not found", id)))
    }

    fn get_deal(&self, id: &str) -> ApiResult {
        ok(self.find_deal(id)?)
    }

    fn update_deal(&self, id: &str, body: &str) -> ApiResult {
        let deal = Self::validated(body)?;
        match self.store.update_deal(id, deal)? {
            Some(updated) => ok(updated),
            None => Err(ApiError::NotFound(format!("Deal '{}' not found", id))),
        }
    }

    fn delete_deal(&self, id: &str) -> ApiResult {
        if self.store.delete_deal(id)? {
            ok(id)
        } else {
            Err(ApiError::NotFound(format!("Deal '{}' not found", id)))
        }
    }

    fn analyze_stored(&self, id: &str) -> ApiResult {
        let deal = self.find_deal(id)?;
        ok(self.latency.apply(|| DealReport::build_now(&deal)))
    }

    /// Score a deal without storing it; partial deals are fine
    fn analyze_adhoc(&self, body: &str) -> ApiResult {
        let deal: DealSubmission = parse_body(body)?;
        ok(self.latency.apply(|| DealReport::build_now(&deal)))
    }
}

fn json_header() -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok()
}

fn handle_request<S: PricingStore + DealStore>(api: &Api<S>, mut request: Request) -> std::io::Result<()> {
    let url = request.url().to_string();
    let method = request.method().clone();

    let mut body = String::new();
    let reply = match request.as_reader().read_to_string(&mut body) {
        Ok(_) => api.handle(&method, &url, &body),
        Err(e) => to_reply(400, &ApiResponse::<()>::failure(format!("Failed to read body: {}", e))),
    };

    tracing::info!(%method, url = %url, status = reply.status, "request");

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Some(header) = json_header() {
        response = response.with_header(header);
    }
    request.respond(response)
}

/// Start the API server and block serving requests
pub fn start_api_server<S: PricingStore + DealStore>(api: Api<S>, port: u16) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| std::io::Error::other(e.to_string()))?;

    eprintln!("\n\x1b[1;32mDealscope API\x1b[0m");
    eprintln!("   Listening: http://localhost:{}/api", port);
    if !api.latency.delay().is_zero() {
        eprintln!("   Analysis delay: {} ms", api.latency.delay().as_millis());
    }
    eprintln!("   Press Ctrl+C to stop\n");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(&api, request) {
            tracing::warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}
