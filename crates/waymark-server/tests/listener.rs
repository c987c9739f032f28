//! End-to-end tests over a real TCP socket.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use waymark_config::ServerConfig;
use waymark_core::Handler;
use waymark_server::{Router, Server, ShutdownSignal};

async fn start(router: Router) -> (std::net::SocketAddr, ShutdownSignal, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();

    let config = ServerConfig {
        shutdown_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let server = Server::new(router, config);
    let signal = shutdown.clone();
    let task = tokio::spawn(async move {
        server.serve_listener(listener, signal).await.unwrap();
    });

    (addr, shutdown, task)
}

async fn send(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("response should arrive")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn serves_routes_over_tcp() {
    let mut router = Router::new();
    router
        .get("/users/:id", [Handler::new(|ctx| format!("user {}", ctx.param("id").unwrap_or("?")))])
        .unwrap();
    router
        .post("/echo", [Handler::new(|ctx| ctx.request().body().clone())])
        .unwrap();

    let (addr, shutdown, task) = start(router).await;

    let response = send(addr, "GET /users/7 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.ends_with("user 7"), "{response}");

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;
    assert!(response.ends_with("hello"), "{response}");

    let response = send(addr, "GET /nowhere HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
    assert!(response.ends_with("404 page not found"), "{response}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server should stop")
        .unwrap();
}

#[tokio::test]
async fn peer_address_reaches_handlers() {
    let mut router = Router::new();
    router
        .get("/ip", [Handler::new(|ctx| ctx.remote_addr().unwrap_or_default())])
        .unwrap();

    let (addr, shutdown, task) = start(router).await;

    let response = send(addr, "GET /ip HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(response.ends_with("127.0.0.1"), "{response}");

    let response = send(
        addr,
        "GET /ip HTTP/1.1\r\nHost: test\r\nX-Real-IP: 10.1.2.3\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.ends_with("10.1.2.3"), "{response}");

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn any_route_answers_get() {
    let mut router = Router::new();
    router.any("/", [Handler::new(|_| "body")]).unwrap();

    let (addr, shutdown, task) = start(router).await;

    let response = send(addr, "GET / HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(response.ends_with("body"), "{response}");

    shutdown.trigger();
    task.await.unwrap();
}
