//! `setdata`: runs one set-data session against the loopback endpoint.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use setdata_client::logging::{init_tracing, LogFormat};
use setdata_client::transport::{
    AuthorizationScript, LoopbackScript, LoopbackTransport, TokenScript,
};
use setdata_client::{ClientConfig, SessionDriver, SessionReport};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "setdata")]
#[command(about = "Authorize and submit a set-data request", long_about = None)]
struct Cli {
    /// Remote endpoint host
    #[arg(long, env = "SETDATA_HOST")]
    host: Option<String>,

    /// Remote endpoint port
    #[arg(long, env = "SETDATA_PORT")]
    port: Option<u16>,

    /// Registered application name
    #[arg(long, env = "SETDATA_APP_NAME")]
    app_name: Option<String>,

    /// Authorization service name
    #[arg(long, env = "SETDATA_AUTH_SERVICE")]
    auth_service: Option<String>,

    /// Business service name
    #[arg(long, env = "SETDATA_SERVICE")]
    service: Option<String>,

    /// Maximum silence before the session is declared stalled
    #[arg(long, env = "SETDATA_RESPONSE_TIMEOUT_MS")]
    response_timeout_ms: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Print the session report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Exit without waiting for a keypress
    #[arg(long)]
    no_pause: bool,

    /// Loopback: fail token generation
    #[arg(long)]
    reject_token: bool,

    /// Loopback: deny authorization
    #[arg(long)]
    reject_authorization: bool,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(app_name) = &self.app_name {
            config.app_name.clone_from(app_name);
        }
        if let Some(auth_service) = &self.auth_service {
            config.auth_service.clone_from(auth_service);
        }
        if let Some(service) = &self.service {
            config.business_service.clone_from(service);
        }
        if let Some(ms) = self.response_timeout_ms {
            config.response_timeout = Duration::from_millis(ms);
        }
        config
    }

    fn script(&self) -> LoopbackScript {
        let mut script = LoopbackScript::default();
        if self.reject_token {
            script.token = TokenScript::Reject("token generation disabled".to_string());
        }
        if self.reject_authorization {
            script.authorization = AuthorizationScript::Deny("not entitled".to_string());
        }
        script
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, "info")?;

    let config = Arc::new(cli.config());
    info!(
        endpoint = %config.endpoint(),
        app = %config.app_name,
        service = %config.business_service,
        "starting set-data session"
    );

    let (transport, events) = LoopbackTransport::for_config(&config, cli.script());
    let mut driver = SessionDriver::new(Arc::clone(&config), transport, events)
        .context("invalid client configuration")?;

    let mut errors = driver.take_error_receiver();
    let report = tokio::select! {
        report = driver.run() => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted before the session finished");
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(errors) = errors.as_mut() {
        while let Ok(err) = errors.try_recv() {
            warn!(kind = err.kind(), error = %err, "session error");
        }
    }
    log_report(&report);

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to render report")?
        );
    }

    if !cli.no_pause {
        println!("Press ENTER to quit");
        let mut byte = [0_u8; 1];
        let _ = tokio::io::stdin().read(&mut byte).await;
    }

    Ok(if report.is_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn log_report(report: &SessionReport) {
    match (&report.outcome, &report.failure) {
        (_, Some(failure)) => {
            warn!(state = %report.final_state, kind = failure.kind(), error = %failure, "session failed");
        }
        (Some(outcome), None) if outcome.is_success() => {
            info!(state = %report.final_state, ?outcome, "session completed");
        }
        (Some(outcome), None) => {
            warn!(state = %report.final_state, ?outcome, "session ended without success");
        }
        (None, None) => info!(state = %report.final_state, "session ended without a response"),
    }
}
