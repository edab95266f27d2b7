//! HTTP and WebSocket transport.
//!
//! Binds the connection hub to the outside world: a small REST
//! side-channel for sign-up, login, token refresh, standings, and table
//! administration, plus the `/ws` endpoint carrying the JSON game
//! protocol over a persistent connection.
mod ws;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use hg_core::Config;
use hg_hub::ErrorCode;
use hg_hub::Hub;
use hg_hub::ServerMessage;
use hg_session::MemorySessions;
use hg_session::Sessions;
use hg_store::Memory;
use hg_store::Postgres;
use hg_store::Store;
use std::sync::Arc;

#[derive(serde::Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(serde::Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Default, serde::Deserialize)]
struct CreateTableRequest {
    name: Option<String>,
    small_blind: Option<hg_core::Chips>,
    big_blind: Option<hg_core::Chips>,
    min_players: Option<usize>,
    max_players: Option<usize>,
}

/// Maps hub replies onto HTTP statuses.
fn respond(message: ServerMessage) -> HttpResponse {
    match message.code() {
        None => HttpResponse::Ok().json(message),
        Some(ErrorCode::AuthFailed) | Some(ErrorCode::RefreshFailed) => {
            HttpResponse::Unauthorized().json(message)
        }
        Some(ErrorCode::NotAdmin) => HttpResponse::Forbidden().json(message),
        Some(ErrorCode::TableNotFound) => HttpResponse::NotFound().json(message),
        Some(_) => HttpResponse::BadRequest().json(message),
    }
}

/// Decoded ADMIN role required for table administration endpoints.
fn require_admin(hub: &Hub, req: &HttpRequest) -> Result<(), HttpResponse> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| HttpResponse::Unauthorized().body("missing authorization header"))?;
    let claims = hub
        .crypto()
        .authenticate(token)
        .map_err(|e| HttpResponse::Unauthorized().body(e.to_string()))?;
    match claims.role.is_admin() {
        true => Ok(()),
        false => Err(HttpResponse::Forbidden().body("admin access required")),
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

async fn register(hub: web::Data<Arc<Hub>>, body: web::Json<Credentials>) -> impl Responder {
    respond(hub.register(&body.username, &body.password).await)
}

async fn login(hub: web::Data<Arc<Hub>>, body: web::Json<Credentials>) -> impl Responder {
    respond(hub.login(&body.username, &body.password).await)
}

async fn refresh(hub: web::Data<Arc<Hub>>, body: web::Json<RefreshRequest>) -> impl Responder {
    respond(match hub.refresh(&body.refresh_token) {
        Ok(access_token) => ServerMessage::TokenRefreshed { access_token },
        Err(e) => ServerMessage::error(ErrorCode::RefreshFailed, e.to_string()),
    })
}

async fn standings(hub: web::Data<Arc<Hub>>) -> impl Responder {
    respond(hub.standings().await)
}

async fn tables(hub: web::Data<Arc<Hub>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "tables": hub.table_list().await }))
}

async fn create_table(
    hub: web::Data<Arc<Hub>>,
    req: HttpRequest,
    body: web::Json<CreateTableRequest>,
) -> impl Responder {
    if let Err(denied) = require_admin(&hub, &req) {
        return denied;
    }
    let body = body.into_inner();
    respond(
        hub.create_table(
            body.name,
            body.small_blind,
            body.big_blind,
            body.min_players,
            body.max_players,
        )
        .await,
    )
}

async fn delete_table(
    hub: web::Data<Arc<Hub>>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(denied) = require_admin(&hub, &req) {
        return denied;
    }
    respond(hub.delete_table(&path.into_inner()).await)
}

/// Builds the stores, spins up the hub, and serves until interrupted.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = match config.db_url.as_deref() {
        Some(url) => {
            let client = hg_store::db(url).await?;
            let postgres = Postgres::new(client);
            postgres.migrate().await?;
            Arc::new(postgres)
        }
        None => {
            log::warn!("[server] DB_URL not set; state will not survive a restart");
            Arc::new(Memory::default())
        }
    };
    let sessions: Arc<dyn Sessions> = Arc::new(MemorySessions::default());
    let hub = Hub::new(config.clone(), store, sessions).await;
    hub.spawn_ticker();
    let data = web::Data::new(Arc::clone(&hub));
    log::info!("[server] listening on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(data.clone())
            .route("/health", web::get().to(health))
            .service(
                web::scope("/api")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/standings", web::get().to(standings))
                    .route("/tables", web::get().to(tables))
                    .route("/tables", web::post().to(create_table))
                    .route("/tables/{id}", web::delete().to(delete_table)),
            )
            .route("/ws", web::get().to(ws::endpoint))
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;
    hub.shutdown().await;
    Ok(())
}
