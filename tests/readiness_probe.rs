// ABOUTME: Integration tests for the HTTP readiness probe.
// ABOUTME: Serves canned responses from a local TCP listener and checks what the probe makes of them.

mod support;

use fleetswap::health::{HttpReadinessProbe, ProbeError, ReadinessProbe};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answer every connection with `status` and `body`, then close it.
async fn serve(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{address}/v1/capabilities")
}

#[tokio::test]
async fn probe_counts_json_list_entries() {
    support::init_tracing();
    let url = serve("200 OK", r#"[{"id":"a"},{"id":"b"},{"id":"c"}]"#).await;

    let count = HttpReadinessProbe::default().count(&url).await.unwrap();

    assert_eq!(count, 3);
}

#[tokio::test]
async fn empty_list_counts_zero() {
    let url = serve("200 OK", "[]").await;

    assert_eq!(HttpReadinessProbe::default().count(&url).await.unwrap(), 0);
}

#[tokio::test]
async fn error_status_is_reported() {
    let url = serve("503 Service Unavailable", "[]").await;

    let err = HttpReadinessProbe::default().count(&url).await.unwrap_err();

    assert!(matches!(err, ProbeError::Status(503)), "{err}");
}

#[tokio::test]
async fn non_list_body_is_rejected() {
    let url = serve("200 OK", r#"{"ready":true}"#).await;

    let err = HttpReadinessProbe::default().count(&url).await.unwrap_err();

    assert!(matches!(err, ProbeError::Body(_)), "{err}");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let _accepted = tokio::spawn(async move {
        let held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(held);
    });

    let probe = HttpReadinessProbe::new(Duration::from_millis(200));
    let err = probe
        .count(&format!("http://{address}/ready"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Timeout(_)), "{err}");
}
