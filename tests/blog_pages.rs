#[macro_use]
mod common;

use actix_web::http::StatusCode;
use blogicum::forms::ProfileData;
use blogicum::models::db_operations::users_db_operations;
use chrono::{Duration, Utc};
use common::{Browser, TestSite};

#[actix_web::test]
async fn index_lists_only_visible_posts_newest_first() {
    let site = TestSite::new();
    let author = site.user("leo");
    let travel = site.category("travel", true);
    let hidden = site.category("hidden", false);
    let now = Utc::now();
    site.post(author, "Older trip", Some(travel), now - Duration::days(2), true);
    site.post(author, "Newer trip", Some(travel), now - Duration::days(1), true);
    site.post(author, "Draft trip", Some(travel), now - Duration::days(1), false);
    site.post(author, "Future trip", Some(travel), now + Duration::days(1), true);
    site.post(author, "Hidden trip", Some(hidden), now - Duration::days(1), true);
    site.post(author, "Orphan trip", None, now - Duration::days(1), true);

    let app = blog_app!(site);
    let mut browser = Browser::default();
    let page = fetch!(app, browser, browser.get("/"));

    assert_eq!(page.status, StatusCode::OK);
    let newer = page.body.find("Newer trip").expect("newer post listed");
    let older = page.body.find("Older trip").expect("older post listed");
    assert!(newer < older);
    for missing in ["Draft trip", "Future trip", "Hidden trip", "Orphan trip"] {
        assert!(!page.body.contains(missing), "{} should not be listed", missing);
    }
}

#[actix_web::test]
async fn unpublishing_a_category_hides_its_posts() {
    let site = TestSite::new();
    let author = site.user("leo");
    site.user("reader");
    let travel = site.category("travel", true);
    let post_id = site.post(author, "Walk in the park", Some(travel), Utc::now() - Duration::days(1), true);
    let detail = format!("/posts/{}/", post_id);

    let app = blog_app!(site);
    let mut anonymous = Browser::default();
    assert!(fetch!(app, anonymous, anonymous.get("/")).body.contains("Walk in the park"));
    assert_eq!(fetch!(app, anonymous, anonymous.get(&detail)).status, StatusCode::OK);

    site.set_category_published(travel, false);

    assert!(!fetch!(app, anonymous, anonymous.get("/")).body.contains("Walk in the park"));
    assert_eq!(fetch!(app, anonymous, anonymous.get(&detail)).status, StatusCode::NOT_FOUND);

    let mut reader = Browser::default();
    log_in!(app, reader, "reader");
    assert_eq!(fetch!(app, reader, reader.get(&detail)).status, StatusCode::NOT_FOUND);

    let mut author_browser = Browser::default();
    log_in!(app, author_browser, "leo");
    let own = fetch!(app, author_browser, author_browser.get(&detail));
    assert_eq!(own.status, StatusCode::OK);
    assert!(own.body.contains("Walk in the park"));
}

#[actix_web::test]
async fn category_page_requires_a_published_category() {
    let site = TestSite::new();
    let author = site.user("leo");
    let travel = site.category("travel", true);
    site.category("secret", false);
    let now = Utc::now();
    site.post(author, "First walk", Some(travel), now - Duration::days(3), true);
    site.post(author, "Second walk", Some(travel), now - Duration::days(1), true);
    site.post(author, "Unfinished walk", Some(travel), now - Duration::days(1), false);

    let app = blog_app!(site);
    let mut browser = Browser::default();

    assert_eq!(fetch!(app, browser, browser.get("/category/secret/")).status, StatusCode::NOT_FOUND);
    assert_eq!(fetch!(app, browser, browser.get("/category/nowhere/")).status, StatusCode::NOT_FOUND);

    let page = fetch!(app, browser, browser.get("/category/travel/"));
    assert_eq!(page.status, StatusCode::OK);
    let second = page.body.find("Second walk").unwrap();
    let first = page.body.find("First walk").unwrap();
    assert!(second < first);
    assert!(!page.body.contains("Unfinished walk"));
}

#[actix_web::test]
async fn listing_pages_past_the_end_are_not_found() {
    let site = TestSite::new();
    let author = site.user("leo");
    let travel = site.category("travel", true);
    for n in 0..12 {
        site.post(author, &format!("Note {}", n), Some(travel), Utc::now() - Duration::hours(n + 1), true);
    }

    let app = blog_app!(site);
    let mut browser = Browser::default();

    let second = fetch!(app, browser, browser.get("/?page=2"));
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.body.contains("Note 11"));
    assert!(!second.body.contains("Note 0<"));

    let last = fetch!(app, browser, browser.get("/?page=last"));
    assert_eq!(last.status, StatusCode::OK);
    assert!(last.body.contains("Page 2 of 2"));

    assert_eq!(fetch!(app, browser, browser.get("/?page=3")).status, StatusCode::NOT_FOUND);
    assert_eq!(fetch!(app, browser, browser.get("/?page=abc")).status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn profile_shows_drafts_to_the_owner_only() {
    let site = TestSite::new();
    let author = site.user("leo");
    site.user("reader");
    let travel = site.category("travel", true);
    let now = Utc::now();
    site.post(author, "Public story", Some(travel), now - Duration::days(1), true);
    site.post(author, "Draft story", Some(travel), now - Duration::days(1), false);
    site.post(author, "Scheduled story", Some(travel), now + Duration::days(5), true);

    let app = blog_app!(site);

    let mut anonymous = Browser::default();
    let public_view = fetch!(app, anonymous, anonymous.get("/profile/leo/"));
    assert_eq!(public_view.status, StatusCode::OK);
    assert!(public_view.body.contains("Public story"));
    assert!(!public_view.body.contains("Draft story"));
    assert!(!public_view.body.contains("Scheduled story"));

    let mut reader = Browser::default();
    log_in!(app, reader, "reader");
    let other_view = fetch!(app, reader, reader.get("/profile/leo/"));
    assert!(!other_view.body.contains("Draft story"));

    let mut owner = Browser::default();
    log_in!(app, owner, "leo");
    let own_view = fetch!(app, owner, owner.get("/profile/leo/"));
    assert!(own_view.body.contains("Public story"));
    assert!(own_view.body.contains("Draft story"));
    assert!(own_view.body.contains("Scheduled story"));

    assert_eq!(fetch!(app, owner, owner.get("/profile/nobody/")).status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn renamed_account_does_not_own_its_old_username() {
    let site = TestSite::new();
    let leo = site.user("leo");
    let travel = site.category("travel", true);

    let app = blog_app!(site);
    let mut old_session = Browser::default();
    log_in!(app, old_session, "leo");

    // Renamed elsewhere; this browser's session still carries "leo".
    let renamed = ProfileData {
        first_name: String::new(),
        last_name: String::new(),
        username: "lev".to_string(),
        email: String::new(),
    };
    users_db_operations::update_profile(&site.pool.get().unwrap(), leo, &renamed).unwrap();
    let newcomer = site.user("leo");
    site.post(newcomer, "Newcomer draft", Some(travel), Utc::now() - Duration::days(1), false);

    let page = fetch!(app, old_session, old_session.get("/profile/leo/"));
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("Newcomer draft"));
    assert!(!page.body.contains("Edit profile"));
}

#[actix_web::test]
async fn comments_are_listed_oldest_first() {
    let site = TestSite::new();
    let author = site.user("leo");
    site.user("anna");
    let travel = site.category("travel", true);
    let post_id = site.post(author, "Trip", Some(travel), Utc::now() - Duration::days(1), true);
    let detail = format!("/posts/{}/", post_id);
    let add = format!("/posts/{}/comment/", post_id);

    let app = blog_app!(site);
    let mut anna = Browser::default();
    log_in!(app, anna, "anna");

    for text in ["first remark", "second remark"] {
        let page = fetch!(app, anna, anna.get(&detail));
        let token = page.csrf_token();
        let sent = fetch!(app, anna, anna.post_form(&add, &[("csrf_token", token.as_str()), ("text", text)]));
        assert!(sent.redirects_to(&detail));
    }

    let page = fetch!(app, anna, anna.get(&detail));
    let first = page.body.find("first remark").unwrap();
    let second = page.body.find("second remark").unwrap();
    assert!(first < second);
    assert!(page.body.contains("Comments (2)"));
}

#[actix_web::test]
async fn comment_text_is_escaped_with_line_breaks() {
    let site = TestSite::new();
    let author = site.user("leo");
    let travel = site.category("travel", true);
    let post_id = site.post(author, "Trip", Some(travel), Utc::now() - Duration::days(1), true);
    let detail = format!("/posts/{}/", post_id);

    let app = blog_app!(site);
    let mut leo = Browser::default();
    log_in!(app, leo, "leo");

    let token = fetch!(app, leo, leo.get(&detail)).csrf_token();
    fetch!(
        app,
        leo,
        leo.post_form(
            &format!("/posts/{}/comment/", post_id),
            &[("csrf_token", token.as_str()), ("text", "<script>x</script>\nsecond line")]
        )
    );

    let page = fetch!(app, leo, leo.get(&detail));
    assert!(!page.body.contains("<script>x</script>"));
    assert!(page.body.contains("&lt;script&gt;"));
    assert!(page.body.contains("<br>second line"));
}

#[actix_web::test]
async fn static_pages_render() {
    let site = TestSite::new();
    let app = blog_app!(site);
    let mut browser = Browser::default();

    assert_eq!(fetch!(app, browser, browser.get("/pages/about/")).status, StatusCode::OK);
    assert_eq!(fetch!(app, browser, browser.get("/pages/rules/")).status, StatusCode::OK);

    let missing = fetch!(app, browser, browser.get("/no/such/page/"));
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert!(missing.body.contains("Page not found"));
}
