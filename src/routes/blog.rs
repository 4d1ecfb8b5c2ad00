use crate::config::Config;
use crate::forms::{CommentForm, ConfirmForm, CsrfForm, FormErrors, PostData, PostForm};
use crate::helper::form_helpers::{self, PostSubmission};
use crate::helper::public_helpers::{base_context, fetch_post_page, redirect, render, PageQuery};
use crate::helper::upload_helpers;
use crate::middleware::SessionUser;
use crate::models::db_operations::posts_db_operations::{self, PostQuery};
use crate::models::db_operations::{catalog_db_operations, comments_db_operations};
use crate::models::{Category, Comment, Location, Post};
use crate::routes::errors::AppError;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use rusqlite::Connection;
use tera::{Context, Tera};

pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/posts/create/", web::get().to(show_create_post_form))
        .route("/posts/create/", web::post().to(create_post_action))
        .route("/posts/{post_id}/", web::get().to(post_detail))
        .route("/posts/{post_id}/edit/", web::get().to(show_edit_post_form))
        .route("/posts/{post_id}/edit/", web::post().to(edit_post_action))
        .route("/posts/{post_id}/delete/", web::get().to(show_delete_post_page))
        .route("/posts/{post_id}/delete/", web::post().to(delete_post_action))
        .route("/posts/{post_id}/comment/", web::get().to(show_add_comment_form))
        .route("/posts/{post_id}/comment/", web::post().to(add_comment_action))
        .route("/posts/{post_id}/edit_comment/{comment_id}/", web::get().to(show_edit_comment_form))
        .route("/posts/{post_id}/edit_comment/{comment_id}/", web::post().to(edit_comment_action))
        .route("/posts/{post_id}/delete_comment/{comment_id}/", web::get().to(show_delete_comment_page))
        .route("/posts/{post_id}/delete_comment/{comment_id}/", web::post().to(delete_comment_action))
        .route("/category/{category_slug}/", web::get().to(category_posts));
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

fn load_post(conn: &Connection, post_id: i64) -> Result<Post, AppError> {
    posts_db_operations::read_post(conn, post_id)?.ok_or(AppError::NotFound)
}

fn load_own_comment(conn: &Connection, post_id: i64, comment_id: i64, user: &SessionUser) -> Result<Comment, AppError> {
    comments_db_operations::read_comment_by_author(conn, comment_id, post_id, user.id)?.ok_or_else(|| {
        log::warn!("User '{}' has no comment {} on post {}", user.username, comment_id, post_id);
        AppError::NotFound
    })
}

// ====================================================================
// ============================ LISTINGS ==============================
// ====================================================================

async fn index(
    viewer: Option<SessionUser>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;
    let page = fetch_post_page(&conn, &PostQuery::visible(Utc::now()), query.page.as_deref(), config.posts_per_page)?;

    let mut ctx = base_context(viewer.as_ref());
    ctx.insert("page_obj", &page);
    render(&tera, "blog/index.html", &ctx)
}

async fn category_posts(
    viewer: Option<SessionUser>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let slug = path.into_inner();
    let conn = pool.get()?;
    let category = catalog_db_operations::read_published_category_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;

    let posts = PostQuery::visible(Utc::now()).in_category(category.id);
    let page = fetch_post_page(&conn, &posts, query.page.as_deref(), config.posts_per_page)?;

    let mut ctx = base_context(viewer.as_ref());
    ctx.insert("category", &category);
    ctx.insert("page_obj", &page);
    render(&tera, "blog/category.html", &ctx)
}

async fn post_detail(
    viewer: Option<SessionUser>,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let conn = pool.get()?;
    let post = load_post(&conn, post_id)?;

    let now = Utc::now();
    let is_author = viewer.as_ref().map_or(false, |v| post.is_authored_by(v.id));
    // Authors can always read their own drafts.
    if !is_author && !post.is_visible_at(now) {
        return Err(AppError::NotFound);
    }

    let comments: Vec<_> = comments_db_operations::read_comments_for_post(&conn, post_id)?
        .iter()
        .map(Comment::card)
        .collect();

    let mut ctx = base_context(viewer.as_ref());
    ctx.insert("post", &post.card(now));
    ctx.insert("is_author", &is_author);
    ctx.insert("comments", &comments);
    ctx.insert("form", &CommentForm::default());
    ctx.insert("errors", &FormErrors::default());
    ctx.insert("csrf_token", token.get());
    render(&tera, "blog/detail.html", &ctx)
}

// ====================================================================
// ============================== POSTS ===============================
// ====================================================================

struct PostFormPage<'a> {
    mode: &'a str,
    action_url: String,
    form: &'a PostForm,
    errors: &'a FormErrors,
    current_image: Option<String>,
    categories: &'a [Category],
    locations: &'a [Location],
}

fn render_post_form(tera: &Tera, viewer: &SessionUser, page: PostFormPage) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(Some(viewer));
    ctx.insert("mode", page.mode);
    ctx.insert("action_url", &page.action_url);
    ctx.insert("form", page.form);
    ctx.insert("errors", page.errors);
    ctx.insert("current_image", &page.current_image);
    ctx.insert("categories", page.categories);
    ctx.insert("locations", page.locations);
    render(tera, "blog/create.html", &ctx)
}

/// Validates the text fields and folds a refused image into the same error map.
fn bind_post_form(
    form: &PostForm,
    submission: &PostSubmission,
    categories: &[Category],
    locations: &[Location],
) -> Result<PostData, FormErrors> {
    match (form.validate(categories, locations), submission.image_error.as_ref()) {
        (Ok(data), None) => Ok(data),
        (Ok(_), Some(message)) => {
            let mut errors = FormErrors::default();
            errors.add("image", message.as_str());
            Err(errors)
        }
        (Err(mut errors), Some(message)) => {
            errors.add("image", message.as_str());
            Err(errors)
        }
        (Err(errors), None) => Err(errors),
    }
}

async fn show_create_post_form(
    user: SessionUser,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;
    let categories = catalog_db_operations::read_all_categories(&conn)?;
    let locations = catalog_db_operations::read_all_locations(&conn)?;

    render_post_form(
        &tera,
        &user,
        PostFormPage {
            mode: "create",
            action_url: "/posts/create/".to_string(),
            form: &PostForm::blank(),
            errors: &FormErrors::default(),
            current_image: None,
            categories: &categories,
            locations: &locations,
        },
    )
}

async fn create_post_action(
    user: SessionUser,
    payload: Multipart,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let submission = form_helpers::collect_post_submission(payload, config.max_image_size_mb).await?;
    let form = PostForm::from_fields(&submission.fields);

    let (categories, locations) = {
        let conn = pool.get()?;
        (catalog_db_operations::read_all_categories(&conn)?, catalog_db_operations::read_all_locations(&conn)?)
    };

    let data = match bind_post_form(&form, &submission, &categories, &locations) {
        Ok(data) => data,
        Err(errors) => {
            return render_post_form(
                &tera,
                &user,
                PostFormPage {
                    mode: "create",
                    action_url: "/posts/create/".to_string(),
                    form: &form,
                    errors: &errors,
                    current_image: None,
                    categories: &categories,
                    locations: &locations,
                },
            );
        }
    };

    let image = match submission.image {
        Some(image) => Some(upload_helpers::store_post_image(&config.media_path, image).await?),
        None => None,
    };

    let conn = pool.get()?;
    let post_id = posts_db_operations::create_post(&conn, user.id, &data, image.as_deref())?;
    log::info!("User '{}' created post {}", user.username, post_id);
    Ok(redirect(&profile_url(&user.username)))
}

async fn show_edit_post_form(
    user: SessionUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let conn = pool.get()?;
    let post = load_post(&conn, post_id)?;
    if !post.is_authored_by(user.id) {
        return Ok(redirect(&post_url(post_id)));
    }

    let categories = catalog_db_operations::read_all_categories(&conn)?;
    let locations = catalog_db_operations::read_all_locations(&conn)?;
    render_post_form(
        &tera,
        &user,
        PostFormPage {
            mode: "edit",
            action_url: format!("/posts/{}/edit/", post_id),
            form: &PostForm::from_post(&post),
            errors: &FormErrors::default(),
            current_image: post.card(Utc::now()).image_url,
            categories: &categories,
            locations: &locations,
        },
    )
}

async fn edit_post_action(
    user: SessionUser,
    path: web::Path<i64>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let (post, categories, locations) = {
        let conn = pool.get()?;
        let post = load_post(&conn, post_id)?;
        if !post.is_authored_by(user.id) {
            log::warn!("User '{}' tried to edit post {} they do not own", user.username, post_id);
            return Ok(redirect(&post_url(post_id)));
        }
        (post, catalog_db_operations::read_all_categories(&conn)?, catalog_db_operations::read_all_locations(&conn)?)
    };

    let submission = form_helpers::collect_post_submission(payload, config.max_image_size_mb).await?;
    let form = PostForm::from_fields(&submission.fields);

    let data = match bind_post_form(&form, &submission, &categories, &locations) {
        Ok(data) => data,
        Err(errors) => {
            return render_post_form(
                &tera,
                &user,
                PostFormPage {
                    mode: "edit",
                    action_url: format!("/posts/{}/edit/", post_id),
                    form: &form,
                    errors: &errors,
                    current_image: post.card(Utc::now()).image_url,
                    categories: &categories,
                    locations: &locations,
                },
            );
        }
    };

    let old_image = post.image.clone();
    let new_image = match submission.image {
        Some(image) => Some(upload_helpers::store_post_image(&config.media_path, image).await?),
        None if submission.clear_image => None,
        None => old_image.clone(),
    };

    {
        let conn = pool.get()?;
        posts_db_operations::update_post(&conn, post_id, &data, new_image.as_deref())?;
    }

    if let Some(old) = old_image.filter(|old| Some(old) != new_image.as_ref()) {
        if let Err(err) = upload_helpers::remove_post_image(&config.media_path, &old).await {
            log::warn!("Could not remove replaced image '{}': {}", old, err);
        }
    }

    log::info!("User '{}' updated post {}", user.username, post_id);
    Ok(redirect(&post_url(post_id)))
}

async fn show_delete_post_page(
    user: SessionUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let conn = pool.get()?;
    let post = load_post(&conn, post_id)?;
    if !post.is_authored_by(user.id) {
        return Ok(redirect(&post_url(post_id)));
    }

    let mut ctx = base_context(Some(&user));
    ctx.insert("mode", "delete");
    ctx.insert("action_url", &format!("/posts/{}/delete/", post_id));
    ctx.insert("post", &post.card(Utc::now()));
    ctx.insert("csrf_token", token.get());
    render(&tera, "blog/create.html", &ctx)
}

async fn delete_post_action(
    user: SessionUser,
    path: web::Path<i64>,
    _form: Csrf<web::Form<CsrfForm<ConfirmForm>>>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let image = {
        let conn = pool.get()?;
        let post = load_post(&conn, post_id)?;
        if !post.is_authored_by(user.id) {
            log::warn!("User '{}' tried to delete post {} they do not own", user.username, post_id);
            return Ok(redirect(&post_url(post_id)));
        }
        posts_db_operations::delete_post(&conn, post_id)?;
        post.image
    };

    if let Some(image) = image {
        if let Err(err) = upload_helpers::remove_post_image(&config.media_path, &image).await {
            log::warn!("Could not remove image '{}' of deleted post: {}", image, err);
        }
    }

    log::info!("User '{}' deleted post {}", user.username, post_id);
    Ok(redirect(&profile_url(&user.username)))
}

// ====================================================================
// ============================ COMMENTS ==============================
// ====================================================================

fn comment_context(
    user: &SessionUser,
    post: &Post,
    mode: &str,
    action_url: String,
    csrf_token: &str,
) -> Context {
    let mut ctx = base_context(Some(user));
    ctx.insert("post", &post.card(Utc::now()));
    ctx.insert("mode", mode);
    ctx.insert("action_url", &action_url);
    ctx.insert("csrf_token", csrf_token);
    ctx.insert("comment", &Option::<()>::None);
    ctx.insert("form", &CommentForm::default());
    ctx.insert("errors", &FormErrors::default());
    ctx
}

async fn show_add_comment_form(
    user: SessionUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let conn = pool.get()?;
    let post = load_post(&conn, post_id)?;

    let ctx = comment_context(&user, &post, "create", format!("/posts/{}/comment/", post_id), token.get());
    render(&tera, "blog/comment.html", &ctx)
}

async fn add_comment_action(
    user: SessionUser,
    path: web::Path<i64>,
    form: Csrf<web::Form<CsrfForm<CommentForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;
    let post = load_post(&conn, post_id)?;

    match submitted.fields.validate() {
        Ok(text) => {
            comments_db_operations::create_comment(&conn, post_id, user.id, &text)?;
            Ok(redirect(&post_url(post_id)))
        }
        Err(errors) => {
            let mut ctx = comment_context(&user, &post, "create", format!("/posts/{}/comment/", post_id), submitted.token());
            ctx.insert("form", &submitted.fields);
            ctx.insert("errors", &errors);
            render(&tera, "blog/comment.html", &ctx)
        }
    }
}

async fn show_edit_comment_form(
    user: SessionUser,
    path: web::Path<(i64, i64)>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let (post_id, comment_id) = path.into_inner();
    let conn = pool.get()?;
    let comment = load_own_comment(&conn, post_id, comment_id, &user)?;
    let post = load_post(&conn, post_id)?;

    let action_url = format!("/posts/{}/edit_comment/{}/", post_id, comment_id);
    let mut ctx = comment_context(&user, &post, "edit", action_url, token.get());
    ctx.insert("comment", &comment.card());
    ctx.insert("form", &CommentForm { text: comment.text.clone() });
    render(&tera, "blog/comment.html", &ctx)
}

async fn edit_comment_action(
    user: SessionUser,
    path: web::Path<(i64, i64)>,
    form: Csrf<web::Form<CsrfForm<CommentForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let (post_id, comment_id) = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;
    let comment = load_own_comment(&conn, post_id, comment_id, &user)?;

    match submitted.fields.validate() {
        Ok(text) => {
            comments_db_operations::update_comment(&conn, comment.id, &text)?;
            Ok(redirect(&post_url(post_id)))
        }
        Err(errors) => {
            let post = load_post(&conn, post_id)?;
            let action_url = format!("/posts/{}/edit_comment/{}/", post_id, comment_id);
            let mut ctx = comment_context(&user, &post, "edit", action_url, submitted.token());
            ctx.insert("comment", &comment.card());
            ctx.insert("form", &submitted.fields);
            ctx.insert("errors", &errors);
            render(&tera, "blog/comment.html", &ctx)
        }
    }
}

async fn show_delete_comment_page(
    user: SessionUser,
    path: web::Path<(i64, i64)>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let (post_id, comment_id) = path.into_inner();
    let conn = pool.get()?;
    let comment = load_own_comment(&conn, post_id, comment_id, &user)?;
    let post = load_post(&conn, post_id)?;

    let action_url = format!("/posts/{}/delete_comment/{}/", post_id, comment_id);
    let mut ctx = comment_context(&user, &post, "delete", action_url, token.get());
    ctx.insert("comment", &comment.card());
    render(&tera, "blog/comment.html", &ctx)
}

async fn delete_comment_action(
    user: SessionUser,
    path: web::Path<(i64, i64)>,
    _form: Csrf<web::Form<CsrfForm<ConfirmForm>>>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, AppError> {
    let (post_id, comment_id) = path.into_inner();
    let conn = pool.get()?;
    let comment = load_own_comment(&conn, post_id, comment_id, &user)?;
    comments_db_operations::delete_comment(&conn, comment.id)?;
    log::info!("User '{}' deleted comment {} on post {}", user.username, comment_id, post_id);
    Ok(redirect(&post_url(post_id)))
}
