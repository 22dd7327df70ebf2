//! Integration tests for the InfluxDB HTTP client against a mock server

use bytes::Bytes;
use entsoe_importer::domain::{PointFields, TimeSeriesPoint};
use entsoe_importer::io::{InfluxStore, PointStore, StoreError};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Captured {
    method: String,
    path: String,
    query: String,
    authorization: Option<String>,
    body: String,
}

#[derive(Clone)]
struct MockInflux {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockInflux {
    /// Serve /ping with 204 and /write with `write_status`
    async fn start(write_status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let captured = captured.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let captured = captured.clone();
                        async move { handle(req, captured, write_status).await }
                    });
                    let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Captured> {
        self.requests.lock().clone()
    }
}

async fn handle(
    req: Request<Incoming>,
    captured: Arc<Mutex<Vec<Captured>>>,
    write_status: StatusCode,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = match req.into_body().collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).to_string(),
        Err(_) => String::new(),
    };

    captured.lock().push(Captured { method, path: path.clone(), query, authorization, body });

    let (status, text) = match path.as_str() {
        "/ping" => (StatusCode::NO_CONTENT, ""),
        "/write" if write_status.is_success() => (write_status, ""),
        "/write" => (write_status, r#"{"error":"database not found: \"entsoe\""}"#),
        _ => (StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(text)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))))
}

fn point(time: i64, production_type: &str, value: f64) -> TimeSeriesPoint {
    let mut tags = BTreeMap::new();
    tags.insert("map_code", "AT".to_string());
    tags.insert("type", production_type.to_string());
    TimeSeriesPoint {
        time,
        measurement: "generation".to_string(),
        fields: PointFields { value },
        tags,
    }
}

fn store(mock: &MockInflux, user: Option<&str>) -> InfluxStore {
    InfluxStore::with_base_url(
        &mock.base_url(),
        "entsoe",
        user.map(str::to_string),
        Some("secret".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_ping_succeeds() {
    let mock = MockInflux::start(StatusCode::NO_CONTENT).await;
    store(&mock, None).ping().await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/ping");
}

#[tokio::test]
async fn test_ping_unreachable_is_connection_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = InfluxStore::with_base_url(
        &format!("http://{}", addr),
        "entsoe",
        None,
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = store.ping().await.unwrap_err();
    assert!(err.is_connection());
}

#[tokio::test]
async fn test_write_posts_line_protocol_with_second_precision() {
    let mock = MockInflux::start(StatusCode::NO_CONTENT).await;
    let store = store(&mock, Some("importer"));

    let points = vec![
        point(1_619_827_200, "Fossil Brown coal-Lignite", 10.0),
        point(1_619_828_100, "Solar", 2.5),
    ];
    store.write_points(&points).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/write");
    assert!(req.query.contains("db=entsoe"));
    assert!(req.query.contains("precision=s"));
    assert!(req.authorization.as_deref().is_some_and(|a| a.starts_with("Basic ")));
    assert_eq!(
        req.body,
        "generation,map_code=AT,type=Fossil\\ Brown\\ coal-Lignite value=10 1619827200\n\
         generation,map_code=AT,type=Solar value=2.5 1619828100"
    );
}

#[tokio::test]
async fn test_write_without_user_sends_no_auth() {
    let mock = MockInflux::start(StatusCode::NO_CONTENT).await;
    store(&mock, None).write_points(&[point(1, "Solar", 1.0)]).await.unwrap();

    assert!(mock.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn test_write_error_status_carries_body() {
    let mock = MockInflux::start(StatusCode::NOT_FOUND).await;

    let err = store(&mock, None).write_points(&[point(1, "Solar", 1.0)]).await.unwrap_err();

    match err {
        StoreError::Http { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("database not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_write_sends_nothing() {
    let mock = MockInflux::start(StatusCode::NO_CONTENT).await;
    store(&mock, None).write_points(&[]).await.unwrap();

    assert!(mock.requests().is_empty());
}
