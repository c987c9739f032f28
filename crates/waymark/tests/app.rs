//! Whole-application behaviour through the public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use waymark::prelude::*;

fn get(path: &str) -> Request<Bytes> {
    Request::get(path).body(Bytes::new()).unwrap()
}

fn text(app: &Waymark, path: &str) -> (StatusCode, String) {
    let response = app.handle(get(path));
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    (response.status(), body)
}

fn param_dump(names: &'static [&'static str]) -> Handler {
    Handler::new(move |ctx| {
        names
            .iter()
            .map(|name| format!("{name}={}", ctx.param(name).unwrap_or("<none>")))
            .collect::<Vec<_>>()
            .join(" ")
    })
}

#[test]
fn static_leaf_wins_regardless_of_registration_order() {
    let mut app = Waymark::new();
    app.get("/a/*", [Handler::new(|_| "catch-all")]).unwrap();
    app.get("/a/:id", [Handler::new(|_| "capture")]).unwrap();
    app.get("/a/static", [Handler::new(|_| "static")]).unwrap();

    assert_eq!(text(&app, "/a/static").1, "static");
    assert_eq!(text(&app, "/a/42").1, "capture");
    assert_eq!(text(&app, "/a/b/c").1, "catch-all");
}

#[test]
fn regex_capture_binds_and_filters() {
    let mut app = Waymark::new();
    app.get("/user/:id([0-9]+)", [param_dump(&["id"])]).unwrap();

    assert_eq!(text(&app, "/user/42"), (StatusCode::OK, "id=42".to_string()));
    assert_eq!(text(&app, "/user/abc").0, StatusCode::NOT_FOUND);
}

#[test]
fn path_extension_split() {
    let mut app = Waymark::new();
    app.get("/files/*.*", [param_dump(&[":path", ":ext"])]).unwrap();

    assert_eq!(text(&app, "/files/report.pdf").1, ":path=report :ext=pdf");
    assert_eq!(text(&app, "/files/report").1, ":path=report :ext=<none>");
}

#[test]
fn nested_catch_alls_bind_per_level() {
    let mut app = Waymark::new();
    app.get("/*/view/*", [param_dump(&["*0", "*1", "*"])]).unwrap();

    assert_eq!(text(&app, "/docs/view/intro").1, "*0=docs *1=intro *=intro");
}

#[test]
fn optional_last_segment() {
    let mut app = Waymark::new();
    app.get("/user/?:id", [param_dump(&["id"])]).unwrap();

    assert_eq!(text(&app, "/user").1, "id=<none>");
    assert_eq!(text(&app, "/user/7").1, "id=7");
}

#[test]
fn repeated_registration_is_idempotent() {
    let mut app = Waymark::new();
    let first = app.get("/dup", [Handler::new(|_| "first")]).unwrap();
    let again = app.get("/dup", [Handler::new(|_| "second")]).unwrap();

    assert_eq!(first, again);
    assert_eq!(app.router().routes().len(), 1);
    assert_eq!(text(&app, "/dup").1, "first");
}

#[test]
fn first_writer_ends_the_chain() {
    let ran = Arc::new(Mutex::new(Vec::new()));
    let step = |name: &'static str, write: bool| {
        let ran = Arc::clone(&ran);
        Handler::new(move |ctx| {
            ran.lock().unwrap().push(name);
            if write {
                ctx.response_mut().write_header(StatusCode::ACCEPTED);
            }
        })
    };

    let mut app = Waymark::new();
    app.get("/chain", [step("a", true), step("b", false), step("c", false)])
        .unwrap();

    assert_eq!(text(&app, "/chain").0, StatusCode::ACCEPTED);
    assert_eq!(*ran.lock().unwrap(), vec!["a"]);
}

#[test]
fn encoded_slash_stays_inside_segment() {
    let mut app = Waymark::new();
    app.get("/blob/:name", [param_dump(&["name"])]).unwrap();
    app.get("/blob/a/b", [Handler::new(|_| "two segments")]).unwrap();

    assert_eq!(text(&app, "/blob/a%2Fb").1, "name=a/b");
    assert_eq!(text(&app, "/blob/a/b").1, "two segments");
}

#[test]
fn middleware_wraps_route_handlers() {
    let mut app = Waymark::new();
    app.use_middleware(Handler::new(|ctx| {
        ctx.next();
        let size = ctx.response().size();
        ctx.response_mut()
            .headers_mut()
            .insert("x-inner-size", http::HeaderValue::from(size));
    }))
    .unwrap();
    app.get("/", [Handler::new(|_| "12345")]).unwrap();

    let response = app.handle(get("/"));
    assert_eq!(response.body().as_ref(), b"12345");
    assert_eq!(response.headers()["x-inner-size"], "5");
}

#[test]
fn request_scoped_values_flow_down_the_chain() {
    struct User(String);

    let mut app = Waymark::new();
    app.use_middleware(Handler::new(|ctx| {
        let name = ctx.param("name").unwrap_or("anonymous").to_string();
        ctx.map(User(name));
    }))
    .unwrap();
    app.get(
        "/hi/:name",
        [Handler::new(|ctx| match ctx.get::<User>() {
            Some(user) => format!("hi {}", user.0),
            None => "nobody".to_string(),
        })],
    )
    .unwrap();

    assert_eq!(text(&app, "/hi/lin").1, "hi lin");
}

#[test]
fn injected_services_are_checked_at_registration() {
    struct Greeting(&'static str);

    let mut app = Waymark::new();
    let greet = Handler::inject(|_, greeting: &Greeting| greeting.0);
    assert!(matches!(app.get("/greet", [greet.clone()]), Err(ServerError::Injection(_))));

    app.map(Greeting("bonjour"));
    app.get("/greet", [greet]).unwrap();
    assert_eq!(text(&app, "/greet").1, "bonjour");
}

#[test]
fn status_tuples_and_errors() {
    let mut app = Waymark::new();
    app.post("/items", [Handler::new(|_| (StatusCode::CREATED, "made"))])
        .unwrap();
    app.get(
        "/parse/:n",
        [Handler::new(|ctx| {
            ctx.param("n")
                .unwrap_or("")
                .parse::<u32>()
                .map(|n| (n * 2).to_string())
        })],
    )
    .unwrap();

    let created = app.handle(Request::post("/items").body(Bytes::new()).unwrap());
    assert_eq!(created.status(), StatusCode::CREATED);

    assert_eq!(text(&app, "/parse/21").1, "42");
    let (status, body) = text(&app, "/parse/x");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "invalid digit found in string");
}

#[test]
fn custom_error_chain_receives_error() {
    let mut app = Waymark::new();
    app.internal_server_error([Handler::on_error(|_, err: &HandlerError| {
        (StatusCode::BAD_GATEWAY, format!("upstream: {err}"))
    })])
    .unwrap();
    app.get("/", [Handler::new(|_| Reply::Error(anyhow::anyhow!("timeout")))])
        .unwrap();

    assert_eq!(text(&app, "/"), (StatusCode::BAD_GATEWAY, "upstream: timeout".to_string()));
}

#[test]
fn classic_recovers_panics_without_leaking_in_production() {
    let mut app = Waymark::classic();
    app.set_env(Environment::Production);
    app.get("/boom", [Handler::new(|_| -> &'static str { panic!("secret detail") })])
        .unwrap();

    let (status, body) = text(&app, "/boom");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[test]
fn classic_shows_panic_page_in_development() {
    let mut app = Waymark::classic();
    app.get("/boom", [Handler::new(|_| -> &'static str { panic!("<oops>") })])
        .unwrap();

    let response = app.handle(get("/boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.contains("&lt;oops&gt;"));
}

#[test]
fn terminal_action_runs_once_when_nothing_wrote() {
    let count = Arc::new(Mutex::new(0));
    let mut app = Waymark::new();
    {
        let count = Arc::clone(&count);
        app.action(Handler::new(move |_| {
            *count.lock().unwrap() += 1;
            "fallback"
        }))
        .unwrap();
    }
    app.get("/", [Handler::new(|_| ())]).unwrap();

    assert_eq!(text(&app, "/").1, "fallback");
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn head_requests_discard_body() {
    let mut app = Waymark::new();
    app.get("/", [Handler::new(|_| "hidden")]).unwrap();

    let head = Request::head("/").body(Bytes::new()).unwrap();
    let response = app.serve(head, ResponseWriter::new(http::Method::HEAD));
    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.size(), 0);
    assert!(response.into_response().body().is_empty());
}

#[tokio::test]
async fn serves_over_tcp_with_prefix_from_config() {
    let mut app = Waymark::new();
    app.get("/ping", [Handler::new(|_| "pong")]).unwrap();

    let mut config = WaymarkConfig::default();
    config.env = Environment::Test;
    config.server.url_prefix = "/api".to_string();
    config.server.shutdown_timeout_secs = 1;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let server = app.into_server(&config);
    let task = tokio::spawn(server.serve_listener(listener, shutdown.clone()));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/ping HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("response should arrive")
        .unwrap();
    let raw = String::from_utf8(raw).unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.ends_with("pong"), "{raw}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
