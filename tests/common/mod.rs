use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use campus_api::auth::{AuthSettings, Claims};
use reqwest::StatusCode;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const JWT_AUDIENCE: &str = "authenticated";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // No DATABASE_URL: /health reports 503 but routes that skip storage still answer
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_campus-api"));
        cmd.env("CAMPUS_API_PORT", port.to_string())
            .env("JWT_SECRET", JWT_SECRET)
            .env("JWT_AUDIENCE", JWT_AUDIENCE)
            .env("STORE_BACKEND", "postgres")
            .env("TENANT_SOURCE", "static")
            .env("RUST_LOG", "warn")
            .env_remove("SUPABASE_JWT_SECRET")
            .env_remove("SUPABASE_URL")
            .env_remove("JWT_ISSUER")
            .env_remove("TENANTS_FILE")
            .env_remove("DATABASE_URL")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Mints an access token the spawned server accepts
pub fn token_for(email: &str, full_name: Option<&str>) -> Result<String> {
    let settings = AuthSettings::new(Some(JWT_SECRET.to_string()), Some(JWT_AUDIENCE.to_string()), None);
    let mut claims = Claims::new(format!("sub-{}", email), email, chrono::Duration::minutes(10));
    if let Some(name) = full_name {
        claims = claims.with_full_name(name);
    }
    Ok(settings.sign(claims)?)
}
