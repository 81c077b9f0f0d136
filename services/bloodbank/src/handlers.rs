use crate::errors::BloodBankError;
use crate::metrics;
use crate::models::{
    BloodRequest, BloodRequestForm, DonationForm, DonationRequest, DonorForm, HealthResponse,
    LoginForm, NewCredential, NewDonor, RegisterForm, SearchForm, SearchResults,
};
use crate::services::BloodBankService;
use crate::session::{Caller, Operation, SessionKeys};
use actix_web::{http::header, web, HttpResponse};
use bloodbank_types::Role;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

type Service = web::Data<Arc<BloodBankService>>;
type Keys = web::Data<Arc<SessionKeys>>;

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Health check endpoint
pub async fn health_check(service: Service) -> HttpResponse {
    let status = match service.database().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            "degraded"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        service: "bloodbank".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

// ===== Public pages =====

pub async fn index(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::ViewInfoPages)?;
    Ok(HttpResponse::Ok().json(json!({
        "page": "index",
        "logged_in": caller.session().is_some()
    })))
}

pub async fn contact(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::ViewInfoPages)?;
    Ok(HttpResponse::Ok().json(json!({ "page": "contact" })))
}

pub async fn learn(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::ViewInfoPages)?;
    Ok(HttpResponse::Ok().json(json!({ "page": "learn" })))
}

// ===== Credentials =====

pub async fn login_page(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::Login)?;
    Ok(HttpResponse::Ok().json(json!({ "page": "login" })))
}

pub async fn login(
    service: Service,
    keys: Keys,
    caller: Caller,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::Login)?;
    let form = form.into_inner();
    form.validate()?;

    let credential = service
        .credentials
        .authenticate(&form.username, &form.password)
        .await?;
    let token = keys.issue(&credential)?;

    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/dashboard"))
        .cookie(keys.session_cookie(token))
        .finish())
}

pub async fn register_page(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::Register)?;
    Ok(HttpResponse::Ok().json(json!({ "page": "register" })))
}

pub async fn register(
    service: Service,
    caller: Caller,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::Register)?;
    let request = NewCredential::try_from(form.into_inner())?;
    let credential = service.credentials.register(request).await?;

    Ok(match credential.role {
        Role::Donor => see_other(&format!("/register_donor/{}", credential.id)),
        Role::Staff => see_other("/login"),
    })
}

pub async fn register_donor_page(
    caller: Caller,
    credential_id: web::Path<i64>,
) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::RegisterDonor)?;
    Ok(HttpResponse::Ok().json(json!({
        "page": "register_donor",
        "credential_id": credential_id.into_inner()
    })))
}

pub async fn register_donor(
    service: Service,
    caller: Caller,
    credential_id: web::Path<i64>,
    form: web::Form<DonorForm>,
) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::RegisterDonor)?;
    let donor = NewDonor::try_from(form.into_inner())?;
    service
        .donors
        .register_donor(credential_id.into_inner(), donor)
        .await?;

    Ok(see_other("/login"))
}

pub async fn logout(keys: Keys, caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.authorize(Operation::Logout)?;
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(keys.removal_cookie())
        .finish())
}

// ===== Dashboards =====

pub async fn dashboard(service: Service, caller: Caller) -> Result<HttpResponse, BloodBankError> {
    let session = caller.require(Operation::ViewDashboard)?;
    caller.require(match session.role {
        Role::Donor => Operation::ViewOwnDashboard,
        Role::Staff => Operation::ViewAggregateStats,
    })?;
    let dashboard = service.dashboard(&session).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}

// ===== Donor routes =====

pub async fn donate_page(service: Service, caller: Caller) -> Result<HttpResponse, BloodBankError> {
    let session = caller.require(Operation::SubmitDonation)?;
    let donor = service.donor_for(&session).await?;
    Ok(HttpResponse::Ok().json(json!({ "page": "donate", "donor": donor })))
}

pub async fn donate(
    service: Service,
    caller: Caller,
    form: web::Form<DonationForm>,
) -> Result<HttpResponse, BloodBankError> {
    let session = caller.require(Operation::SubmitDonation)?;
    let request = DonationRequest::try_from(form.into_inner())?;
    service.donate(&session, request).await?;
    Ok(see_other("/dashboard"))
}

pub async fn donation_history(
    service: Service,
    caller: Caller,
) -> Result<HttpResponse, BloodBankError> {
    let session = caller.require(Operation::ViewDonationHistory)?;
    let donor = service.donor_for(&session).await?;
    let donations = service.donors.donation_history(donor.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "donor_id": donor.id, "donations": donations })))
}

// ===== Staff routes =====

pub async fn inventory(service: Service, caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.require(Operation::ViewInventory)?;
    let units = service.inventory().await?;
    Ok(HttpResponse::Ok().json(json!({ "inventory": units })))
}

pub async fn search_page(caller: Caller) -> Result<HttpResponse, BloodBankError> {
    caller.require(Operation::SearchInventory)?;
    Ok(HttpResponse::Ok().json(SearchResults {
        blood_type: None,
        inventory: Vec::new(),
    }))
}

pub async fn search_blood(
    service: Service,
    caller: Caller,
    form: web::Form<SearchForm>,
) -> Result<HttpResponse, BloodBankError> {
    caller.require(Operation::SearchInventory)?;
    let results = service.search(&form.blood_type).await?;
    Ok(HttpResponse::Ok().json(results))
}

pub async fn use_blood(
    service: Service,
    caller: Caller,
    inventory_id: web::Path<i64>,
) -> Result<HttpResponse, BloodBankError> {
    caller.require(Operation::MarkUnitUsed)?;
    service.ledger.mark_used(inventory_id.into_inner()).await?;
    Ok(see_other("/inventory"))
}

pub async fn request_blood(
    service: Service,
    caller: Caller,
    form: web::Form<BloodRequestForm>,
) -> Result<HttpResponse, BloodBankError> {
    let session = caller.require(Operation::SubmitBloodRequest)?;
    let request = BloodRequest::try_from(form.into_inner())?;
    let receipt = service.request_blood(&session, &request)?;

    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/search_blood"))
        .insert_header(("X-Request-Receipt", receipt.id.to_string()))
        .finish())
}

// ===== JSON API =====

/// Available millilitres per blood type. Answers 401 rather than redirecting.
pub async fn inventory_stats(
    service: Service,
    caller: Caller,
) -> Result<HttpResponse, BloodBankError> {
    if caller.require(Operation::ViewInventoryStats).is_err() {
        return Ok(HttpResponse::Unauthorized().json(json!({ "error": "Not authenticated" })));
    }

    let totals = service.inventory_totals().await?;
    Ok(HttpResponse::Ok().json(totals))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/contact", web::get().to(contact))
        .route("/learn", web::get().to(learn))
        .route("/login", web::get().to(login_page))
        .route("/login", web::post().to(login))
        .route("/register", web::get().to(register_page))
        .route("/register", web::post().to(register))
        .route("/register_donor/{credential_id}", web::get().to(register_donor_page))
        .route("/register_donor/{credential_id}", web::post().to(register_donor))
        .route("/logout", web::get().to(logout))
        .route("/dashboard", web::get().to(dashboard))
        .route("/donate", web::get().to(donate_page))
        .route("/donate", web::post().to(donate))
        .route("/donations", web::get().to(donation_history))
        .route("/inventory", web::get().to(inventory))
        .route("/search_blood", web::get().to(search_page))
        .route("/search_blood", web::post().to(search_blood))
        .route("/use_blood/{inventory_id}", web::post().to(use_blood))
        .route("/request_blood", web::post().to(request_blood))
        .route("/api/inventory_stats", web::get().to(inventory_stats))
        .route("/metrics", web::get().to(metrics_endpoint))
        .route("/health", web::get().to(health_check));
}
