use crate::metrics::{
    ANSWERS_TOTAL, REJECTIONS_TOTAL, REQUESTS_TOTAL, REQUEST_DURATION, RESPONSES_TOTAL, SEND_FAILURES_TOTAL,
};
use crate::query::QueryProcessor;
use crate::table::NameTable;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

const RECV_BUF_LEN: usize = 4096;

pub struct DnsServer {
    socket: UdpSocket,
    table: Arc<ArcSwap<NameTable>>,
    log_queries: bool,
}

impl DnsServer {
    pub async fn bind(addr: SocketAddr, table: Arc<ArcSwap<NameTable>>, log_queries: bool) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind UDP {}: {}", addr, e))?;
        Ok(Self { socket, table, log_queries })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// One datagram at a time: receive, process, reply, then read the next.
    /// Per-request failures are logged and counted; only `shutdown` ends the loop.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!("🚀 Serving A records on UDP {}", self.local_addr()?);
        let mut buf = vec![0u8; RECV_BUF_LEN];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, leaving serving loop");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((size, src)) => self.handle(&buf[..size], src).await,
                    Err(e) => tracing::warn!("recv_from failed: {}", e),
                },
            }
        }
    }

    async fn handle(&self, datagram: &[u8], src: SocketAddr) {
        REQUESTS_TOTAL.inc();
        let start = Instant::now();
        let outcome = {
            let table = self.table.load();
            QueryProcessor::new(&table).process(datagram)
        };
        REQUEST_DURATION.observe(start.elapsed().as_secs_f64());

        let reply = match outcome {
            Ok(reply) => reply,
            Err(rejection) => {
                REJECTIONS_TOTAL
                    .with_label_values(&[&rejection.stage.to_string(), rejection.error.reason()])
                    .inc();
                tracing::debug!("Dropped {} byte query from {}: {}", datagram.len(), src, rejection);
                return;
            }
        };

        if self.log_queries {
            tracing::info!("=> Query from {} answered with {} record(s)", src, reply.answer_count);
        } else {
            tracing::debug!("=> Query from {} answered with {} record(s)", src, reply.answer_count);
        }

        match self.socket.send_to(&reply.bytes, src).await {
            Ok(_) => {
                let result = if reply.answer_count > 0 { "answered" } else { "empty" };
                RESPONSES_TOTAL.with_label_values(&[result]).inc();
                ANSWERS_TOTAL.inc_by(reply.answer_count as u64);
            }
            Err(e) => {
                SEND_FAILURES_TOTAL.inc();
                tracing::warn!("send_to {} failed: {}", src, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::encode;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn query(id: u16, qtype: u16, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(id.to_be_bytes());
        buf.extend([0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
        buf.extend(encode(name));
        buf.extend(qtype.to_be_bytes());
        buf.extend([0, 1]);
        buf
    }

    #[tokio::test]
    async fn answers_and_survives_bad_datagrams() {
        let mut table = NameTable::new();
        table.insert("printer.lan", Ipv4Addr::new(192, 168, 7, 7)).unwrap();
        let table = Arc::new(ArcSwap::from_pointee(table));

        let server = DnsServer::bind("127.0.0.1:0".parse().unwrap(), table.clone(), false).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server.run(async { let _ = stop_rx.await; }).await
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 512];

        // garbage and an AAAA query get no reply at all
        client.send_to(&[1, 2, 3], addr).await.unwrap();
        client.send_to(&query(5, 28, "printer.lan"), addr).await.unwrap();

        client.send_to(&query(6, 1, "printer.lan"), addr).await.unwrap();
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("reply")
            .unwrap();
        assert_eq!(&buf[..2], &6u16.to_be_bytes());
        assert_eq!(&buf[6..8], &[0, 1]);
        assert_eq!(&buf[n - 4..n], &[192, 168, 7, 7]);

        // a swapped-in table is visible to the next query
        let mut next = NameTable::new();
        next.insert("printer.lan", Ipv4Addr::new(10, 9, 9, 9)).unwrap();
        table.store(Arc::new(next));
        client.send_to(&query(7, 1, "printer.lan"), addr).await.unwrap();
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("reply")
            .unwrap();
        assert_eq!(&buf[..2], &7u16.to_be_bytes());
        assert_eq!(&buf[n - 4..n], &[10, 9, 9, 9]);

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
