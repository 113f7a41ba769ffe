//! Listener setup.

use std::io;

use tokio::net::TcpListener;

/// Bind `host:port`, moving to the next port while the address is taken.
///
/// At most `limit` consecutive ports are tried (at least one). Errors other
/// than `AddrInUse` are returned immediately.
pub async fn bind_available(host: &str, port: u16, limit: u16) -> io::Result<TcpListener> {
    for offset in 0..limit.max(1) {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };

        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(
                        requested = port,
                        port = candidate,
                        "Requested port busy, using next free port"
                    );
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port = candidate, "Port in use");
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("no free port in {port}..+{}", limit.max(1)),
    ))
}
