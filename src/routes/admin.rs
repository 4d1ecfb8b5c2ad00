use crate::config::Config;
use crate::forms::{CategoryForm, ConfirmForm, CsrfForm, FormErrors, LocationForm, PostModerationForm};
use crate::helper::admin_helpers::{self, location_label};
use crate::helper::public_helpers::{base_context, fetch_post_page, redirect, render, PageQuery};
use crate::middleware::SessionUser;
use crate::models::db_operations::posts_db_operations::{self, PostQuery};
use crate::models::db_operations::{catalog_db_operations, comments_db_operations};
use crate::models::{Comment, PostCard};
use crate::routes::errors::AppError;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use tera::Tera;

const LATEST_COMMENTS: u32 = 50;

/// Routes of the management area, mounted under the admin base URL.
pub fn config_admin(cfg: &mut web::ServiceConfig) {
    cfg.route("/dashboard/", web::get().to(show_dashboard))
        .route("/categories/create/", web::post().to(create_category_action))
        .route("/categories/{category_id}/", web::get().to(show_category_form))
        .route("/categories/{category_id}/", web::post().to(update_category_action))
        .route("/categories/{category_id}/delete/", web::post().to(delete_category_action))
        .route("/locations/create/", web::post().to(create_location_action))
        .route("/locations/{location_id}/", web::get().to(show_location_form))
        .route("/locations/{location_id}/", web::post().to(update_location_action))
        .route("/locations/{location_id}/delete/", web::post().to(delete_location_action))
        .route("/posts/{post_id}/moderate/", web::post().to(moderate_post_action))
        .route("/comments/{comment_id}/delete/", web::post().to(delete_comment_action));
}

#[derive(Serialize)]
struct PostRow {
    #[serde(flatten)]
    post: PostCard,
    location_label: String,
}

fn dashboard_url(config: &Config) -> String {
    format!("{}/dashboard/", config.admin_base_url())
}

async fn show_dashboard(
    user: SessionUser,
    session: Session,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;
    let categories = catalog_db_operations::read_all_categories(&conn)?;
    let locations = catalog_db_operations::read_all_locations(&conn)?;
    let page = fetch_post_page(&conn, &PostQuery::all(), query.page.as_deref(), config.posts_per_page)?;
    let comments: Vec<_> = comments_db_operations::read_latest_comments(&conn, LATEST_COMMENTS)?
        .iter()
        .map(Comment::card)
        .collect();

    let rows: Vec<PostRow> = page
        .items
        .into_iter()
        .map(|post| {
            let location_label = location_label(post.location.as_ref().map(|l| l.name.as_str()));
            PostRow { post, location_label }
        })
        .collect();

    let mut ctx = base_context(Some(&user));
    ctx.insert("admin_base_url", &config.admin_base_url());
    ctx.insert("csrf_token", token.get());
    ctx.insert("notification", &admin_helpers::take_notification(&session));
    ctx.insert("categories", &categories);
    ctx.insert("locations", &locations);
    ctx.insert("posts", &rows);
    ctx.insert("page_number", &page.number);
    ctx.insert("num_pages", &page.num_pages);
    ctx.insert("has_previous", &page.has_previous);
    ctx.insert("has_next", &page.has_next);
    ctx.insert("previous_page_number", &page.previous_page_number);
    ctx.insert("next_page_number", &page.next_page_number);
    ctx.insert("comments", &comments);
    render(&tera, "admin/dashboard.html", &ctx)
}

// ====================================================================
// ========================= CATEGORIES ===============================
// ====================================================================

async fn create_category_action(
    session: Session,
    form: Csrf<web::Form<CsrfForm<CategoryForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;

    match submitted.fields.validate() {
        Ok(data) if catalog_db_operations::slug_taken(&conn, &data.slug, None)? => {
            admin_helpers::notify(&session, "error", format!("A category with slug '{}' already exists.", data.slug))?;
        }
        Ok(data) => {
            catalog_db_operations::create_category(&conn, &data.title, &data.description, &data.slug, data.is_published)?;
            log::info!("Created category '{}'", data.slug);
            admin_helpers::notify(&session, "success", format!("Category '{}' created.", data.title))?;
        }
        Err(errors) => {
            admin_helpers::notify(&session, "error", errors.summary())?;
        }
    }
    Ok(redirect(&dashboard_url(&config)))
}

fn render_category_form(
    tera: &Tera,
    user: &SessionUser,
    config: &Config,
    category_id: i64,
    form: &CategoryForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(Some(user));
    ctx.insert("admin_base_url", &config.admin_base_url());
    ctx.insert("category_id", &category_id);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "admin/category.html", &ctx)
}

async fn show_category_form(
    user: SessionUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let conn = pool.get()?;
    let category = catalog_db_operations::read_category(&conn, category_id)?.ok_or(AppError::NotFound)?;

    let form = CategoryForm {
        title: category.title,
        description: category.description,
        slug: category.slug,
        is_published: category.is_published.then(|| "on".to_string()),
    };
    render_category_form(&tera, &user, &config, category_id, &form, &FormErrors::default(), token.get())
}

async fn update_category_action(
    user: SessionUser,
    session: Session,
    path: web::Path<i64>,
    form: Csrf<web::Form<CsrfForm<CategoryForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;
    catalog_db_operations::read_category(&conn, category_id)?.ok_or(AppError::NotFound)?;

    let result = match submitted.fields.validate() {
        Ok(data) if catalog_db_operations::slug_taken(&conn, &data.slug, Some(category_id))? => {
            let mut errors = FormErrors::default();
            errors.add("slug", "Category with this slug already exists.");
            Err(errors)
        }
        other => other,
    };

    match result {
        Ok(data) => {
            catalog_db_operations::update_category(&conn, category_id, &data.title, &data.description, &data.slug, data.is_published)?;
            log::info!("Updated category {} ('{}')", category_id, data.slug);
            admin_helpers::notify(&session, "success", format!("Category '{}' updated.", data.title))?;
            Ok(redirect(&dashboard_url(&config)))
        }
        Err(errors) => render_category_form(&tera, &user, &config, category_id, &submitted.fields, &errors, submitted.token()),
    }
}

async fn delete_category_action(
    session: Session,
    path: web::Path<i64>,
    _form: Csrf<web::Form<CsrfForm<ConfirmForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let conn = pool.get()?;
    match catalog_db_operations::delete_category(&conn, category_id)? {
        0 => admin_helpers::notify(&session, "error", "Category not found.")?,
        _ => {
            log::info!("Deleted category {}", category_id);
            admin_helpers::notify(&session, "success", "Category deleted. Its posts are now uncategorized.")?
        }
    }
    Ok(redirect(&dashboard_url(&config)))
}

// ====================================================================
// ========================== LOCATIONS ===============================
// ====================================================================

async fn create_location_action(
    session: Session,
    form: Csrf<web::Form<CsrfForm<LocationForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let submitted = form.into_inner().into_inner();
    match submitted.fields.validate() {
        Ok((name, is_published)) => {
            let conn = pool.get()?;
            catalog_db_operations::create_location(&conn, &name, is_published)?;
            admin_helpers::notify(&session, "success", format!("Location '{}' created.", name))?;
        }
        Err(errors) => admin_helpers::notify(&session, "error", errors.summary())?,
    }
    Ok(redirect(&dashboard_url(&config)))
}

fn render_location_form(
    tera: &Tera,
    user: &SessionUser,
    config: &Config,
    location_id: i64,
    form: &LocationForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(Some(user));
    ctx.insert("admin_base_url", &config.admin_base_url());
    ctx.insert("location_id", &location_id);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "admin/location.html", &ctx)
}

async fn show_location_form(
    user: SessionUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let location_id = path.into_inner();
    let conn = pool.get()?;
    let location = catalog_db_operations::read_location(&conn, location_id)?.ok_or(AppError::NotFound)?;

    let form = LocationForm {
        name: location.name,
        is_published: location.is_published.then(|| "on".to_string()),
    };
    render_location_form(&tera, &user, &config, location_id, &form, &FormErrors::default(), token.get())
}

async fn update_location_action(
    user: SessionUser,
    session: Session,
    path: web::Path<i64>,
    form: Csrf<web::Form<CsrfForm<LocationForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let location_id = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;
    catalog_db_operations::read_location(&conn, location_id)?.ok_or(AppError::NotFound)?;

    match submitted.fields.validate() {
        Ok((name, is_published)) => {
            catalog_db_operations::update_location(&conn, location_id, &name, is_published)?;
            admin_helpers::notify(&session, "success", format!("Location '{}' updated.", name))?;
            Ok(redirect(&dashboard_url(&config)))
        }
        Err(errors) => render_location_form(&tera, &user, &config, location_id, &submitted.fields, &errors, submitted.token()),
    }
}

async fn delete_location_action(
    session: Session,
    path: web::Path<i64>,
    _form: Csrf<web::Form<CsrfForm<ConfirmForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let location_id = path.into_inner();
    let conn = pool.get()?;
    match catalog_db_operations::delete_location(&conn, location_id)? {
        0 => admin_helpers::notify(&session, "error", "Location not found.")?,
        _ => admin_helpers::notify(&session, "success", "Location deleted.")?,
    }
    Ok(redirect(&dashboard_url(&config)))
}

// ====================================================================
// ===================== POSTS AND COMMENTS ===========================
// ====================================================================

async fn moderate_post_action(
    session: Session,
    path: web::Path<i64>,
    form: Csrf<web::Form<CsrfForm<PostModerationForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;
    posts_db_operations::read_post(&conn, post_id)?.ok_or(AppError::NotFound)?;

    let categories = catalog_db_operations::read_all_categories(&conn)?;
    match submitted.fields.validate(&categories) {
        Ok((is_published, category_id)) => {
            posts_db_operations::set_post_publication(&conn, post_id, is_published, category_id)?;
            log::info!("Post {} moderated: published={}, category={:?}", post_id, is_published, category_id);
            admin_helpers::notify(&session, "success", format!("Post {} updated.", post_id))?;
        }
        Err(errors) => admin_helpers::notify(&session, "error", errors.summary())?,
    }
    Ok(redirect(&dashboard_url(&config)))
}

async fn delete_comment_action(
    session: Session,
    path: web::Path<i64>,
    _form: Csrf<web::Form<CsrfForm<ConfirmForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let comment_id = path.into_inner();
    let conn = pool.get()?;
    match comments_db_operations::delete_comment(&conn, comment_id)? {
        0 => admin_helpers::notify(&session, "error", "Comment not found.")?,
        _ => {
            log::info!("Comment {} removed from the management area", comment_id);
            admin_helpers::notify(&session, "success", "Comment deleted.")?
        }
    }
    Ok(redirect(&dashboard_url(&config)))
}
