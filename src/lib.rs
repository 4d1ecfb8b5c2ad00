use actix_web::{
    body::MessageBody,
    cookie::Key,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web, App, Error,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tera::Tera;
pub type DbPool = Pool<SqliteConnectionManager>;

pub mod config;
pub mod forms;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;

use config::Config;

/// Assembles the site: error pages, CSRF and session layers, shared data,
/// uploaded media and every route. The server adds its outer layers on top.
pub fn build_app(
    config: Config,
    tera: Tera,
    pool: DbPool,
    session_key: Key,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let admin_base_url = config.admin_base_url();

    App::new()
        // CSRF innermost; error pages sit inside the session layer so they can still read it.
        .wrap(middleware::csrf_protection(&admin_base_url))
        .wrap(routes::errors::error_pages())
        .wrap(middleware::session_store(session_key, config.use_secure_cookies))
        .service(actix_files::Files::new("/media", &config.media_path))
        .configure(|cfg| routes::config_app(cfg, &admin_base_url))
        .app_data(web::Data::new(tera))
        .app_data(web::Data::new(pool))
        .app_data(web::Data::new(config))
}
