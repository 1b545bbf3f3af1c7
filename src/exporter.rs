use std::{io::Read, sync::Arc, time::Duration};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket-level timeouts of a `DeliveryClient`.
///
/// `read` bounds every wait on the peer: TLS handshake, response headers and
/// the `100-continue` interim response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            write: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub timeouts: Timeouts,
    /// Accept any server certificate and hostname.
    pub insecure_skip_verify: bool,
    /// Turn 4xx/5xx responses into `DeliveryError::Status`.
    pub reject_error_status: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("transport: {0}")]
    Transport(#[source] Box<ureq::Transport>),
    #[error("server responded with status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("reading response body: {0}")]
    Body(#[source] std::io::Error),
    #[error("building TLS connector: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("delivery task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// HTTP client posting JSON payloads. Every request uses a fresh connection.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    agent: ureq::Agent,
    reject_error_status: bool,
}
impl DeliveryClient {
    pub fn new(options: &ClientOptions) -> Result<Self, DeliveryError> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(options.timeouts.connect)
            .timeout_read(options.timeouts.read)
            .timeout_write(options.timeouts.write)
            .max_idle_connections(0)
            .max_idle_connections_per_host(0);
        if options.insecure_skip_verify {
            log::warn!("TLS certificate verification is disabled");
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            builder = builder.tls_connector(Arc::new(connector));
        }
        let agent = builder.build();
        Ok(Self {
            agent,
            reject_error_status: options.reject_error_status,
        })
    }

    /// Blocking I/O
    ///
    /// Returns the response body. The status code is only inspected when
    /// `reject_error_status` is set.
    pub fn send(
        &self,
        method: &str,
        api_key: &str,
        url: &str,
        body: &[u8],
    ) -> Result<String, DeliveryError> {
        let mut req = self
            .agent
            .request(method, url)
            .set("Content-Type", "application/json")
            .set("Connection", "close");
        if !api_key.is_empty() {
            req = req.set("X-Insert-Key", api_key);
        }
        let resp = match req.send_bytes(body) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                if self.reject_error_status {
                    let body = read_body(resp)?;
                    return Err(DeliveryError::Status { code, body });
                }
                resp
            }
            Err(ureq::Error::Transport(e)) => return Err(DeliveryError::Transport(Box::new(e))),
        };
        read_body(resp)
    }
}

/// Reads the whole body; `Response::into_string` would cap it at 10 MB.
fn read_body(resp: ureq::Response) -> Result<String, DeliveryError> {
    let mut body = String::new();
    resp.into_reader()
        .read_to_string(&mut body)
        .map_err(DeliveryError::Body)?;
    Ok(body)
}
