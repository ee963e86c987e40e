//! HTML page shells for the browser frontend.
//!
//! Each page is a small document naming the page and carrying any pending
//! flash notice; the client-side code fills it in through the API.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::auth::{
    AnyRole, AuthBackend, ElevatedOnly, PageAuth, Principal, StandardOnly,
    redirect_if_authenticated,
};
use crate::flash::{clear_flash, read_flash};

pub fn router(backend: AuthBackend) -> Router {
    let entry_pages = Router::new()
        .route("/login/", get(login_page))
        .route("/register/", get(register_page))
        .with_state(backend.clone())
        .layer(middleware::from_fn_with_state(
            backend.clone(),
            redirect_if_authenticated,
        ));

    let pages = Router::new()
        .route("/", get(home_page))
        .route("/post-list/", get(post_list_page))
        .route("/post-detail/{id}/", get(post_detail_page))
        .route("/my-activity/", get(my_activity_page))
        .route("/create-post/", get(create_post_page))
        .route("/edit-post/{id}/", get(edit_post_page))
        .route("/admin-panel/", get(admin_dashboard_page))
        .route("/admin-panel/list/", get(admin_list_page))
        .with_state(backend);

    entry_pages.merge(pages)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a page shell, consuming any flash notice the request carries.
fn render(
    backend: &AuthBackend,
    request_headers: &HeaderMap,
    page: &str,
    title: &str,
    principal: Option<&Principal>,
) -> Response {
    let flash = read_flash(request_headers);

    let notice = flash
        .as_deref()
        .map(|message| {
            format!(
                "<div class=\"flash\" role=\"alert\">{}</div>\n",
                escape_html(message)
            )
        })
        .unwrap_or_default();
    let user_attrs = principal
        .map(|p| {
            format!(
                " data-user-id=\"{}\" data-username=\"{}\" data-role=\"{}\"",
                p.id,
                escape_html(&p.username),
                p.role.as_str()
            )
        })
        .unwrap_or_default();

    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title} | Quillpost</title>\n</head>\n<body data-page=\"{page}\"{user_attrs}>\n{notice}<main id=\"app\"></main>\n</body>\n</html>\n",
        title = escape_html(title),
        page = page,
        user_attrs = user_attrs,
        notice = notice,
    );

    let mut response = (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response();
    if flash.is_some() {
        clear_flash(response.headers_mut(), &backend.cookies);
    }
    response
}

async fn login_page(State(backend): State<AuthBackend>, headers: HeaderMap) -> Response {
    render(&backend, &headers, "login", "Login", None)
}

async fn register_page(State(backend): State<AuthBackend>, headers: HeaderMap) -> Response {
    render(&backend, &headers, "register", "Register", None)
}

async fn home_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<AnyRole>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "home", "Home", Some(&auth.principal))
}

async fn post_list_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<AnyRole>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "post-list", "Posts", Some(&auth.principal))
}

async fn post_detail_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<AnyRole>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "post-detail", "Post", Some(&auth.principal))
}

async fn my_activity_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<StandardOnly>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "my-activity", "My activity", Some(&auth.principal))
}

async fn create_post_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<ElevatedOnly>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "create-post", "New post", Some(&auth.principal))
}

async fn edit_post_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<ElevatedOnly>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "edit-post", "Edit post", Some(&auth.principal))
}

async fn admin_dashboard_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<ElevatedOnly>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "admin-dashboard", "Dashboard", Some(&auth.principal))
}

async fn admin_list_page(
    State(backend): State<AuthBackend>,
    auth: PageAuth<ElevatedOnly>,
    headers: HeaderMap,
) -> Response {
    render(&backend, &headers, "admin-list", "Manage", Some(&auth.principal))
}
