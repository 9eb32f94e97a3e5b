//! Authorization checks and access reporting against a remote service
//!
//! The service speaks JSON over HTTP:
//!
//! - `GET {base}/check-access/{UIDHEX}` answers `{"authorized": bool}`
//! - `POST {base}/card-access` takes `{"uid", "authorized", "timestamp"}`
//!
//! Calls are blocking but bounded by the agent timeout, so a dead service
//! only delays the presence loop by that much.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AccessError;
use crate::config::ApiConfig;
use crate::uid::CardUid;

/// A card observation sent to the authorization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// UID as uppercase hex
    pub uid: String,
    /// Whether access was granted
    pub authorized: bool,
    /// Unix time in seconds
    pub timestamp: u64,
}

impl AccessEvent {
    /// Event stamped with the current time
    pub fn new(uid: &CardUid, authorized: bool) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self::at(uid, authorized, timestamp)
    }

    /// Event with an explicit timestamp
    pub fn at(uid: &CardUid, authorized: bool, timestamp: u64) -> Self {
        Self {
            uid: uid.to_hex(),
            authorized,
            timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessCheck {
    authorized: bool,
}

/// Remote authority deciding on and recording card access
pub trait AuthorizationService {
    /// Ask whether `uid` may enter
    fn check_access(&mut self, uid: &CardUid) -> Result<bool, AccessError>;

    /// Record an access decision
    fn report_access(&mut self, event: &AccessEvent) -> Result<(), AccessError>;
}

impl<A: AuthorizationService + ?Sized> AuthorizationService for Box<A> {
    fn check_access(&mut self, uid: &CardUid) -> Result<bool, AccessError> {
        (**self).check_access(uid)
    }

    fn report_access(&mut self, event: &AccessEvent) -> Result<(), AccessError> {
        (**self).report_access(event)
    }
}

/// [`AuthorizationService`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthorizationService {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpAuthorizationService {
    /// Client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client configured from the `api` section
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Service base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check_url(&self, uid: &CardUid) -> String {
        format!("{}/check-access/{}", self.base_url, uid.to_hex())
    }

    fn report_url(&self) -> String {
        format!("{}/card-access", self.base_url)
    }
}

impl AuthorizationService for HttpAuthorizationService {
    fn check_access(&mut self, uid: &CardUid) -> Result<bool, AccessError> {
        let url = self.check_url(uid);
        debug!(%url, "Checking card access");
        let check: AccessCheck = self
            .agent
            .get(&url)
            .call()?
            .into_json()
            .map_err(|e| AccessError::Remote(format!("invalid check-access body: {e}")))?;
        Ok(check.authorized)
    }

    fn report_access(&mut self, event: &AccessEvent) -> Result<(), AccessError> {
        let url = self.report_url();
        debug!(%url, uid = %event.uid, authorized = event.authorized, "Reporting card access");
        self.agent.post(&url).send_json(event)?;
        info!(uid = %event.uid, "Access reported");
        Ok(())
    }
}

/// [`AuthorizationService`] used when the remote API is disabled
///
/// Denies every remote check and drops reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAuthorizationService;

impl AuthorizationService for OfflineAuthorizationService {
    fn check_access(&mut self, uid: &CardUid) -> Result<bool, AccessError> {
        debug!(%uid, "Remote check skipped (offline)");
        Ok(false)
    }

    fn report_access(&mut self, event: &AccessEvent) -> Result<(), AccessError> {
        debug!(uid = %event.uid, authorized = event.authorized, "Report dropped (offline)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response and hand back the raw request
    fn serve_once(status: &str, body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();
            request.push_str(&String::from_utf8(body).unwrap());

            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    fn uid() -> CardUid {
        CardUid::from_slice(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap()
    }

    #[test]
    fn test_event_json() {
        let event = AccessEvent::at(&uid(), false, 1_700_000_000);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"uid": "04A1B2C3", "authorized": false, "timestamp": 1_700_000_000})
        );
    }

    #[test]
    fn test_check_access() {
        let (base, server) = serve_once("200 OK", r#"{"authorized":true}"#);
        let mut service =
            HttpAuthorizationService::new(&format!("{base}/"), Duration::from_secs(5));

        assert!(service.check_access(&uid()).unwrap());
        let request = server.join().unwrap();
        assert!(request.starts_with("GET /check-access/04A1B2C3 HTTP/1.1"));
    }

    #[test]
    fn test_report_access() {
        let (base, server) = serve_once("201 Created", "{}");
        let mut service = HttpAuthorizationService::new(&base, Duration::from_secs(5));

        service
            .report_access(&AccessEvent::at(&uid(), true, 42))
            .unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /card-access HTTP/1.1"));
        let body = request.rsplit("\r\n\r\n").next().unwrap();
        let sent: AccessEvent = serde_json::from_str(body).unwrap();
        assert_eq!(sent, AccessEvent::at(&uid(), true, 42));
    }

    #[test]
    fn test_error_status_is_remote_error() {
        let (base, server) = serve_once("500 Internal Server Error", "{}");
        let mut service = HttpAuthorizationService::new(&base, Duration::from_secs(5));
        assert!(matches!(
            service.check_access(&uid()),
            Err(AccessError::Remote(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_service() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut service =
            HttpAuthorizationService::new(&format!("http://{addr}"), Duration::from_secs(1));
        assert!(matches!(
            service.report_access(&AccessEvent::at(&uid(), false, 0)),
            Err(AccessError::Remote(_))
        ));
    }

    #[test]
    fn test_offline() {
        let mut service = OfflineAuthorizationService;
        assert!(!service.check_access(&uid()).unwrap());
        assert!(service.report_access(&AccessEvent::new(&uid(), true)).is_ok());
    }
}
