//! Logger and recovery working together in a full handler chain.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Request, StatusCode};
use waymark_config::Environment;
use waymark_core::{Container, Context, ErrorChain, Handler, Logger};
use waymark_middleware::{logger, recovery};

fn process(env: Environment) -> Container {
    let mut container = Container::new();
    container.register(Arc::new(Logger::new("e2e")));
    container.register(Arc::new(env));
    container
}

fn request(path: &str) -> Request<Bytes> {
    Request::builder()
        .uri(path)
        .header("x-real-ip", "203.0.113.9")
        .body(Bytes::new())
        .unwrap()
}

#[test]
fn classic_stack_serves_normal_request() {
    let mut ctx = Context::new(request("/hello"), Arc::new(process(Environment::Test))).chain(
        vec![logger(), recovery(), Handler::new(|_| "hello")],
        None,
    );
    ctx.run();

    assert_eq!(ctx.response().status(), Some(StatusCode::OK));
    assert_eq!(ctx.response().body(), b"hello");
}

#[test]
fn classic_stack_recovers_from_panic() {
    let mut ctx = Context::new(request("/boom"), Arc::new(process(Environment::Development))).chain(
        vec![
            logger(),
            recovery(),
            Handler::new(|_| -> String { panic!("index out of range") }),
        ],
        None,
    );
    ctx.run();

    assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    let body = String::from_utf8_lossy(ctx.response().body()).into_owned();
    assert!(body.contains("index out of range"));
}

#[test]
fn panic_in_action_is_recovered() {
    let mut ctx = Context::new(request("/"), Arc::new(process(Environment::Production))).chain(
        vec![recovery()],
        Some(Handler::new(|_| -> &'static str { panic!("action failed") })),
    );
    ctx.run();

    assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(ctx.response().body().is_empty());
}

#[test]
fn error_replies_still_reach_error_chain() {
    let seen = Arc::new(Mutex::new(None));
    let on_error = {
        let seen = Arc::clone(&seen);
        Handler::on_error(move |_, err| {
            *seen.lock().unwrap() = Some(err.to_string());
            (StatusCode::BAD_GATEWAY, "upstream failed")
        })
    };

    let mut container = process(Environment::Test);
    container.register(Arc::new(ErrorChain::new(vec![on_error])));

    let failing = Handler::new(|_| -> Result<&'static str, std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"))
    });
    let mut ctx = Context::new(request("/proxy"), Arc::new(container)).chain(vec![logger(), recovery(), failing], None);
    ctx.run();

    assert_eq!(ctx.response().status(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(seen.lock().unwrap().as_deref(), Some("connection reset"));
}
