pub mod admin;
pub mod auth;
pub mod blog;
pub mod errors;
pub mod pages;
pub mod profile;

use crate::middleware::StaffOnly;
use actix_web::web;

/// Registers every page of the site. The management area lives under
/// `admin_base_url` and is only reachable by staff.
pub fn config_app(cfg: &mut web::ServiceConfig, admin_base_url: &str) {
    cfg.configure(blog::config_blog)
        .configure(profile::config_profile)
        .configure(auth::config_auth)
        .configure(pages::config_pages)
        .service(
            web::scope(admin_base_url)
                .wrap(StaffOnly)
                .configure(admin::config_admin),
        );
}
