//! Inbound HTTP surface: thin actix-web handlers over [`WeatherProxy`].

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    http::{StatusCode, header},
    middleware::Logger,
    web,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use weather_core::{
    CachePolicy, ProxyReply, ReportFilter, WeatherProxy, upstream::AUTH_HEADER,
};

pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    id: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

impl From<ListQuery> for ReportFilter {
    fn from(q: ListQuery) -> Self {
        ReportFilter {
            id: q.id,
            city: q.city,
            country: q.country,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/weather")
            .route(web::get().to(list_reports))
            .route(web::post().to(create_report))
            .route(web::delete().to(delete_all_reports)),
    )
    .service(
        web::resource("/api/weather/{id}")
            .route(web::get().to(get_report))
            .route(web::patch().to(update_report))
            .route(web::delete().to(delete_report)),
    )
    .service(web::resource("/health/live").route(web::get().to(live)));
}

/// Bind `listen` and serve until shutdown.
pub async fn serve(proxy: WeatherProxy, listen: &str) -> std::io::Result<()> {
    let proxy = web::Data::new(proxy);
    info!(%listen, "weather proxy listening");

    HttpServer::new(move || {
        App::new()
            .app_data(proxy.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(listen)?
    .run()
    .await
}

fn auth_header(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn render(reply: ProxyReply) -> HttpResponse {
    let status =
        StatusCode::from_u16(reply.status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);

    if reply.cache == CachePolicy::NoStore {
        builder
            .insert_header((header::CACHE_CONTROL, NO_STORE))
            .insert_header((header::PRAGMA, "no-cache"))
            .insert_header((header::EXPIRES, "0"));
    }

    builder.json(reply.body)
}

async fn list_reports(
    proxy: web::Data<WeatherProxy>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let filter = ReportFilter::from(query.into_inner());
    render(proxy.list(&filter).await)
}

async fn create_report(
    proxy: web::Data<WeatherProxy>,
    req: HttpRequest,
    body: web::Json<Value>,
) -> HttpResponse {
    render(proxy.create(body.into_inner(), auth_header(&req)).await)
}

async fn delete_all_reports(proxy: web::Data<WeatherProxy>, req: HttpRequest) -> HttpResponse {
    render(proxy.delete_all(auth_header(&req)).await)
}

async fn get_report(proxy: web::Data<WeatherProxy>, id: web::Path<String>) -> HttpResponse {
    render(proxy.get(&id).await)
}

async fn update_report(
    proxy: web::Data<WeatherProxy>,
    req: HttpRequest,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    render(proxy.update(&id, body.into_inner(), auth_header(&req)).await)
}

async fn delete_report(
    proxy: web::Data<WeatherProxy>,
    req: HttpRequest,
    id: web::Path<String>,
) -> HttpResponse {
    render(proxy.delete(&id, auth_header(&req)).await)
}

async fn live() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}
