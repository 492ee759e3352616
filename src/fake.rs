//! Stand-ins for the Rancher API, the poll timer and the logger.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use crate::client::{Error, RancherApi};
use crate::discovery::Sleeper;
use crate::resource::{
    Account, ActiveSetting, ApiKey, ApiKeyRequest, Collection, Links, LocalAuthConfig, Registry,
    RegistryCredentialRequest, RegistryRequest, Resource, Setting,
};

/// Scripted answer to one `GET /v1/accounts`.
#[derive(Clone, Debug)]
pub enum Accounts {
    Unreachable,
    Undecodable,
    Empty,
    Listed(Vec<(&'static str, &'static str)>),
}

impl Accounts {
    pub fn with_default(id: &'static str) -> Self {
        Accounts::Listed(vec![("1a1", "admin"), (id, "Default")])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Failure {
    Transport,
    Decode,
}

#[derive(Clone, Debug)]
pub struct Call {
    pub endpoint: &'static str,
    pub target: String,
    pub body: Option<Value>,
}

/// Records every call and answers with fixed payloads:
/// key pair `AK`/`SK`, setting `X` at `http://host/setting/X`, registry `1sr1`.
pub struct FakeApi {
    accounts: Mutex<VecDeque<Accounts>>,
    calls: Mutex<Vec<Call>>,
    failing: Option<(&'static str, Failure)>,
}

impl FakeApi {
    /// Once the script runs out, the listing is empty.
    pub fn new(accounts: Vec<Accounts>) -> Self {
        Self {
            accounts: Mutex::new(accounts.into()),
            calls: Mutex::new(Vec::new()),
            failing: None,
        }
    }

    pub fn failing(mut self, endpoint: &'static str, failure: Failure) -> Self {
        self.failing = Some((endpoint, failure));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<&'static str> {
        self.calls().iter().map(|call| call.endpoint).collect()
    }

    pub fn call(&self, endpoint: &str) -> Option<Call> {
        self.calls().into_iter().find(|call| call.endpoint == endpoint)
    }

    async fn record(&self, endpoint: &'static str, target: String, body: Option<Resource<'_>>) -> Result<(), Error> {
        let body = body.map(|body| serde_json::to_value(body).unwrap());
        self.calls.lock().unwrap().push(Call { endpoint, target, body });
        match self.failing {
            Some((failing, Failure::Transport)) if failing == endpoint => Err(transport_error().await),
            Some((failing, Failure::Decode)) if failing == endpoint => {
                Err(Error::Deserialize(502, "<html>bad gateway</html>".into()))
            }
            _ => Ok(()),
        }
    }
}

/// A genuine `reqwest` failure, produced without touching the network.
pub async fn transport_error() -> Error {
    let err = reqwest::Client::new()
        .get("not a url")
        .send()
        .await
        .expect_err("relative URL must not be sendable");
    Error::Reqwest(err)
}

#[async_trait]
impl RancherApi for FakeApi {
    async fn accounts(&self) -> Result<Collection<Account>, Error> {
        self.record("accounts", "/v1/accounts".into(), None).await?;
        let next = self.accounts.lock().unwrap().pop_front().unwrap_or(Accounts::Empty);
        match next {
            Accounts::Unreachable => Err(transport_error().await),
            Accounts::Undecodable => Err(Error::Deserialize(200, "{\"data\": [".into())),
            Accounts::Empty => Ok(Collection::default()),
            Accounts::Listed(accounts) => Ok(Collection {
                data: accounts
                    .into_iter()
                    .map(|(id, name)| Account { id: id.into(), name: name.into() })
                    .collect(),
            }),
        }
    }

    async fn create_api_key(&self, env_id: &str, request: ApiKeyRequest<'_>) -> Result<ApiKey, Error> {
        let target = format!("/v1/projects/{env_id}/apikey");
        self.record("apikey", target, Some(Resource::ApiKey(request))).await?;
        Ok(ApiKey {
            public_value: "AK".into(),
            secret_value: "SK".into(),
        })
    }

    async fn setting(&self, name: &str) -> Result<Setting, Error> {
        self.record("setting", format!("/v1/settings/{name}"), None).await?;
        Ok(Setting {
            id: "X".into(),
            links: Links {
                self_link: "http://host/setting/X".into(),
            },
        })
    }

    async fn update_setting(&self, self_link: &str, setting: ActiveSetting<'_>) -> Result<(), Error> {
        self.record("update_setting", self_link.into(), Some(Resource::ActiveSetting(setting)))
            .await
    }

    async fn create_registry(&self, env_id: &str, request: RegistryRequest<'_>) -> Result<Registry, Error> {
        let target = format!("/v1/projects/{env_id}/registry");
        self.record("registry", target, Some(Resource::Registry(request))).await?;
        Ok(Registry { id: "1sr1".into() })
    }

    async fn create_registry_credential(
        &self,
        env_id: &str,
        request: RegistryCredentialRequest<'_>,
    ) -> Result<(), Error> {
        let target = format!("/v1/projects/{env_id}/registrycredential");
        self.record("registrycredential", target, Some(Resource::RegistryCredential(request)))
            .await
    }

    async fn create_local_auth_config(&self, request: LocalAuthConfig<'_>) -> Result<(), Error> {
        self.record(
            "localauthconfig",
            "/v1/localauthconfig".into(),
            Some(Resource::LocalAuthConfig(request)),
        )
        .await
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// One HTTP request as seen by [`StubServer`].
#[derive(Clone, Debug)]
pub struct Received {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

/// Minimal HTTP/1.1 server on a loopback port. Answers each connection
/// with the next scripted `(status, body)` and closes it.
pub struct StubServer {
    pub host: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl StubServer {
    pub async fn start(replies: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                sink.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });

        Self { host, received }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Received {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before end of headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    let mut content_type = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap(),
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before end of body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = &buf[header_end..header_end + content_length];
    let body = (!body.is_empty()).then(|| serde_json::from_slice(body).unwrap());

    Received { method, path, content_type, body }
}

/// Keeps every formatted log line so tests can look for progress messages.
struct CapturingLogger {
    lines: Mutex<Vec<String>>,
}

impl log::Log for CapturingLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    lines: Mutex::new(Vec::new()),
};

/// Install the capturing logger (once per test binary) and return what it
/// has seen so far. Lines from tests running in parallel are interleaved.
pub fn logged() -> Vec<String> {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
    LOGGER.lines.lock().unwrap().clone()
}
