use anyhow::Result;
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder, Gauge,
    Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

lazy_static! {
    pub static ref REQUESTS_TOTAL: IntCounter = register_int_counter!(
        "hostsdns_requests_total",
        "Counter of datagrams received on the DNS socket."
    ).unwrap();

    pub static ref RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hostsdns_responses_total",
        "Counter of replies sent, by whether any question was answered.",
        &["result"]
    ).unwrap();

    pub static ref REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hostsdns_rejections_total",
        "Counter of queries dropped without a reply, by reason.",
        &["stage", "reason"]
    ).unwrap();

    pub static ref ANSWERS_TOTAL: IntCounter = register_int_counter!(
        "hostsdns_answers_total",
        "Counter of A records served."
    ).unwrap();

    pub static ref SEND_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "hostsdns_send_failures_total",
        "Counter of replies that could not be sent."
    ).unwrap();

    pub static ref REQUEST_DURATION: Histogram = register_histogram!(
        "hostsdns_request_duration_seconds",
        "Histogram of the time spent decoding, resolving and encoding one query.",
        vec![0.000005, 0.00001, 0.000025, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005]
    ).unwrap();

    pub static ref TABLE_ENTRIES: Gauge = register_gauge!(
        "hostsdns_table_entries",
        "Number of names in the active table."
    ).unwrap();

    pub static ref RELOADS_TOTAL: IntCounter = register_int_counter!(
        "hostsdns_reloads_total",
        "Counter of hosts file reloads that swapped in a new table."
    ).unwrap();

    pub static ref RELOAD_FAILED_TOTAL: IntCounter = register_int_counter!(
        "hostsdns_reload_failed_total",
        "Counter of the number of failed reload attempts."
    ).unwrap();
}

/// Serves the default registry in text format to any `GET`.
pub async fn serve(addr: String) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind metrics listener {}: {}", addr, e))?;
    tracing::info!("[prometheus] Serving metrics on {}", addr);

    loop {
        // a failed accept (e.g. EMFILE) only costs that one connection
        let mut stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!("[prometheus] accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            if let Ok(Ok(n)) = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await {
                if n > 0 && buf.starts_with(b"GET ") {
                    let mut body = vec![];
                    if TextEncoder::new().encode(&prometheus::gather(), &mut body).is_ok() {
                        let header = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        );
                        let mut response = header.into_bytes();
                        response.extend_from_slice(&body);
                        let _ = tokio::time::timeout(Duration::from_secs(2), stream.write_all(&response)).await;
                        let _ = stream.flush().await;
                        // FIN before drop, otherwise some clients see a reset
                        let _ = stream.shutdown().await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    async fn spawn_listener() -> String {
        let spare = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = spare.local_addr().unwrap().to_string();
        drop(spare);
        tokio::spawn(serve(addr.clone()));
        addr
    }

    async fn connect(addr: &str) -> TcpStream {
        loop {
            match TcpStream::connect(addr).await {
                Ok(s) => return s,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }

    async fn scrape(addr: &str) -> String {
        let mut stream = connect(addr).await;
        stream.write_all(b"GET /metrics HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn serves_registered_metrics() {
        REQUESTS_TOTAL.inc();
        let addr = spawn_listener().await;
        let out = scrape(&addr).await;
        assert!(out.starts_with("HTTP/1.1 200 OK"));
        assert!(out.contains("hostsdns_requests_total"));
    }

    #[tokio::test]
    async fn keeps_serving_after_bad_clients() {
        let addr = spawn_listener().await;

        drop(connect(&addr).await);
        let mut junk = connect(&addr).await;
        junk.write_all(b"POST / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        let _ = junk.read_to_end(&mut out).await;
        assert!(out.is_empty());

        let out = scrape(&addr).await;
        assert!(out.starts_with("HTTP/1.1 200 OK"));
    }
}
