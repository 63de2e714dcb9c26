use clap::Parser;
use dispatch_capture::config::default_config_path;
use dispatch_capture::{
    CaptureConfig, CaptureEngine, CaptureError, CaptureEvent, CaptureEvents, CaptureState,
    CaptureSummary, LogEvents, OutputFormat, Progress, StopHandle,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::Filter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the local control server
    #[arg(short, long, default_value_t = 9670)]
    port: u16,

    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log format when /setup does not name one (json or csv)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Base directory for capture sessions
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Chat application URL
    #[arg(long)]
    url: Option<String>,

    /// Browser executable, overriding discovery
    #[arg(long)]
    browser: Option<PathBuf>,

    #[arg(long)]
    headless: bool,

    /// Linux sandbox workaround
    #[arg(long)]
    no_sandbox: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
struct SetupRequest {
    format: Option<OutputFormat>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupResponse {
    success: bool,
    error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BeginResponse {
    success: bool,
    session_id: String,
    error: Option<String>,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusSnapshot {
    busy: bool,
    /// Unknown while a request holds the engine
    state: Option<CaptureState>,
    last_progress: Option<Progress>,
    last_event: Option<CaptureEvent>,
}

/// Remembers the latest lifecycle events for `/status` and logs them
#[derive(Default)]
struct StatusBoard {
    inner: std::sync::Mutex<StatusSnapshot>,
}

impl StatusBoard {
    fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: CaptureEvent) {
        if let Ok(mut snapshot) = self.inner.lock() {
            if let CaptureEvent::Progress(p) = &event {
                snapshot.last_progress = Some(p.clone());
            }
            snapshot.last_event = Some(event);
        }
    }
}

impl CaptureEvents for StatusBoard {
    fn on_progress(&self, progress: Progress) {
        LogEvents.on_progress(progress.clone());
        self.record(CaptureEvent::Progress(progress));
    }

    fn on_ready(&self) {
        LogEvents.on_ready();
        self.record(CaptureEvent::Ready);
    }

    fn on_complete(&self, summary: CaptureSummary) {
        LogEvents.on_complete(summary.clone());
        self.record(CaptureEvent::Complete(summary));
    }

    fn on_error(&self, message: String) {
        LogEvents.on_error(message.clone());
        self.record(CaptureEvent::Error { message });
    }
}

// Shared state
struct AppState {
    engine: Arc<Mutex<CaptureEngine>>,
    stop: StopHandle,
    board: Arc<StatusBoard>,
    default_format: OutputFormat,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = CaptureConfig::load(&config_path);
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(url) = args.url {
        config.target_url = url;
    }
    if let Some(browser) = args.browser {
        config.browser_path = Some(browser);
    }
    config.headless |= args.headless;
    config.no_sandbox |= args.no_sandbox;

    log::info!("Captures will be written under {}", config.output_dir.display());

    let board = Arc::new(StatusBoard::default());
    let engine = match CaptureEngine::from_config(&config, board.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Failed to initialize capture engine: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        stop: engine.stop_handle(),
        engine: Arc::new(Mutex::new(engine)),
        board,
        default_format: config.format,
    });

    let health =
        warp::path("health").map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let state_filter = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let setup = warp::path("setup")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and_then(handle_setup);

    let begin = warp::path("begin")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(handle_begin);

    let stop = warp::path("stop")
        .and(warp::post())
        .and(state_filter.clone())
        .map(|state: Arc<AppState>| {
            log::info!("Stop requested");
            state.stop.stop();
            warp::reply::json(&serde_json::json!({ "success": true }))
        });

    let status = warp::path("status")
        .and(warp::get())
        .and(state_filter)
        .map(|state: Arc<AppState>| {
            let mut snapshot = state.board.snapshot();
            match state.engine.try_lock() {
                Ok(engine) => snapshot.state = Some(engine.state()),
                Err(_) => snapshot.busy = true,
            }
            warp::reply::json(&snapshot)
        });

    let routes = health.or(setup).or(begin).or(stop).or(status);

    // Bind manually to handle "port in use" error gracefully
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind to port {}: {}", args.port, e);
            eprintln!(
                "Error: Port {} is already in use or unavailable.",
                args.port
            );
            std::process::exit(1);
        }
    };

    log::info!("Control server listening on http://{}", addr);
    let server =
        warp::serve(routes).run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener));

    tokio::select! {
        _ = server => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
            state.stop.stop();
            state.engine.lock().await.close_browser().await;
        }
    }
}

/// An empty body selects the default format; anything else must be valid
fn parse_setup_request(body: &[u8]) -> Result<SetupRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SetupRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("Invalid setup request: {}", e))
}

// Engine calls run on their own task so a disconnecting client cannot cancel them
async fn handle_setup(
    body: warp::hyper::body::Bytes,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let req = match parse_setup_request(&body) {
        Ok(req) => req,
        Err(error) => {
            log::warn!("{}", error);
            return Ok(warp::reply::json(&SetupResponse {
                success: false,
                error: Some(error),
            }));
        }
    };
    let format = req.format.unwrap_or(state.default_format);
    log::info!("Setup requested ({})", format);

    let Ok(mut engine) = state.engine.clone().try_lock_owned() else {
        return Ok(warp::reply::json(&SetupResponse {
            success: false,
            error: Some(CaptureError::AlreadyRunning.to_string()),
        }));
    };

    let task = tokio::spawn(async move { engine.setup(format).await });

    let response = match task.await {
        Ok(Ok(())) => SetupResponse {
            success: true,
            error: None,
        },
        Ok(Err(e)) => SetupResponse {
            success: false,
            error: Some(e.to_string()),
        },
        Err(e) => SetupResponse {
            success: false,
            error: Some(format!("Setup task failed: {}", e)),
        },
    };
    Ok(warp::reply::json(&response))
}

async fn handle_begin(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    log::info!("Begin capture requested");

    let Ok(mut engine) = state.engine.clone().try_lock_owned() else {
        return Ok(warp::reply::json(&BeginResponse {
            success: false,
            session_id: String::new(),
            error: Some(CaptureError::AlreadyRunning.to_string()),
        }));
    };

    let task = tokio::spawn(async move { engine.begin_capture().await });

    let response = match task.await {
        Ok(Ok(summary)) => BeginResponse {
            success: true,
            session_id: summary.session_id,
            error: None,
        },
        Ok(Err(e)) => BeginResponse {
            success: false,
            session_id: String::new(),
            error: Some(e.to_string()),
        },
        Err(e) => BeginResponse {
            success: false,
            session_id: String::new(),
            error: Some(format!("Capture task failed: {}", e)),
        },
    };
    Ok(warp::reply::json(&response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_setup_body_uses_default_format() {
        assert!(parse_setup_request(b"").unwrap().format.is_none());
        assert!(parse_setup_request(b" \n").unwrap().format.is_none());
    }

    #[test]
    fn test_setup_body_names_format() {
        let req = parse_setup_request(br#"{"format":"csv"}"#).unwrap();
        assert_eq!(req.format, Some(OutputFormat::Csv));
        assert!(parse_setup_request(b"{}").unwrap().format.is_none());
    }

    #[test]
    fn test_malformed_setup_body_is_rejected() {
        let err = parse_setup_request(br#"{"format":"xml"}"#).unwrap_err();
        assert!(err.starts_with("Invalid setup request"));
        assert!(parse_setup_request(b"json").is_err());
    }
}
