use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::fetcher::{ChunkedFetcher, FetchOutcome};
use crate::plot::PlotRequest;
use crate::presets::{get_parameters, FunctionPreset};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<ChunkedFetcher>,
    pub static_dir: PathBuf,
}

#[derive(Deserialize)]
struct PresetQuery {
    name: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

const INDEX_HTML: &str = r##"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>Function plotter</title>
    <style>
      body { margin: 0; font-family: system-ui, sans-serif; background: #111; color: #ddd; }
      form { display: flex; gap: 8px; flex-wrap: wrap; padding: 12px; background: #1b1b1b; }
      label { display: flex; flex-direction: column; font-size: 12px; }
      input, select, button { background: #222; color: #eee; border: 1px solid #444; padding: 4px 6px; }
      #status { padding: 4px 12px; font-size: 12px; color: #999; }
      canvas { display: block; width: 100%; height: calc(100vh - 110px); }
    </style>
  </head>
  <body>
    <form id="plot">
      <label>Preset
        <select id="preset">
          <option value="">custom</option>
          <option>Volosov</option>
          <option>Vasiliev</option>
          <option>Suryaninova</option>
        </select>
      </label>
      <label>f(x) <input id="function" value="sin(x)" size="32" /></label>
      <label>x start <input id="x_start" type="number" step="any" value="0" /></label>
      <label>x end <input id="x_end" type="number" step="any" value="10" /></label>
      <label>step <input id="step" type="number" step="any" value="0.1" /></label>
      <button type="submit">Plot</button>
    </form>
    <div id="status"></div>
    <canvas id="chart"></canvas>
    <script>
      const field = (id) => document.getElementById(id);
      const status = (text) => { field("status").textContent = text; };

      field("preset").addEventListener("change", async (ev) => {
        const name = ev.target.value;
        if (!name) return;
        const resp = await fetch(`/get_function?name=${encodeURIComponent(name)}`);
        if (!resp.ok) { status(await resp.text()); return; }
        const p = await resp.json();
        field("function").value = p.function;
        field("x_start").value = p.x_start;
        field("x_end").value = p.x_end;
        field("step").value = p.step;
      });

      field("plot").addEventListener("submit", async (ev) => {
        ev.preventDefault();
        const body = {
          function: field("function").value,
          x_start: parseFloat(field("x_start").value),
          x_end: parseFloat(field("x_end").value),
          step: parseFloat(field("step").value),
        };
        status("computing...");
        const resp = await fetch("/fetch", {
          method: "POST",
          headers: { "Content-Type": "application/json" },
          body: JSON.stringify(body),
        });
        if (!resp.ok) { status(await resp.text()); return; }
        const { data } = await resp.json();
        draw(data || []);
        status(`${(data || []).length} points`);
      });

      function draw(points) {
        const canvas = field("chart");
        const w = canvas.width = canvas.clientWidth;
        const h = canvas.height = canvas.clientHeight;
        const ctx = canvas.getContext("2d");
        ctx.clearRect(0, 0, w, h);
        const finite = points.filter((p) => Number.isFinite(p.y));
        if (finite.length < 2) return;
        const xs = finite.map((p) => p.x), ys = finite.map((p) => p.y);
        const x0 = Math.min(...xs), x1 = Math.max(...xs);
        const y0 = Math.min(...ys), y1 = Math.max(...ys);
        const sx = (x) => ((x - x0) / (x1 - x0 || 1)) * (w - 40) + 20;
        const sy = (y) => h - 20 - ((y - y0) / (y1 - y0 || 1)) * (h - 40);
        ctx.strokeStyle = "#444";
        ctx.beginPath();
        ctx.moveTo(sx(x0), sy(Math.min(Math.max(0, y0), y1)));
        ctx.lineTo(sx(x1), sy(Math.min(Math.max(0, y0), y1)));
        ctx.stroke();
        ctx.strokeStyle = "#4fc3f7";
        ctx.beginPath();
        finite.forEach((p, i) => (i ? ctx.lineTo(sx(p.x), sy(p.y)) : ctx.moveTo(sx(p.x), sy(p.y))));
        ctx.stroke();
      }
    </script>
  </body>
</html>
"##;

pub fn app(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/", get(index))
        .route("/fetch", post(fetch).fallback(only_post))
        .route("/get_function", get(get_function))
        .route("/health", get(health))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `index.html` from the static directory when present, the built-in page otherwise.
async fn index(State(state): State<AppState>) -> Result<Html<String>, ProxyError> {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Html(INDEX_HTML.to_string())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read landing page");
            Err(ProxyError::Io(e))
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn only_post() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "only POST requests are allowed")
}

async fn fetch(State(state): State<AppState>, body: Bytes) -> Result<Response, ProxyError> {
    let req: PlotRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(format!("could not decode request body: {e}")))?;

    let response = match state.fetcher.fetch(&req).await? {
        FetchOutcome::Passthrough(raw) => {
            ([(header::CONTENT_TYPE, "application/json")], raw).into_response()
        }
        FetchOutcome::Combined(plot) => Json(plot).into_response(),
    };
    Ok(response)
}

async fn get_function(
    Query(q): Query<PresetQuery>,
) -> Result<Json<&'static FunctionPreset>, ProxyError> {
    let name = q.name.unwrap_or_default();
    let preset = get_parameters(&name)?;
    debug!(name = %name, ?preset, "preset requested");
    Ok(Json(preset))
}

pub fn log_routes(state: &AppState) {
    info!(
        static_dir = %state.static_dir.display(),
        presets = ?crate::presets::names().collect::<Vec<_>>(),
        "routes: GET /, POST /fetch, GET /get_function, GET /health, GET /static/*"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetcher::FetchSettings;
    use crate::plot::{DataPoint, PlotData};
    use crate::upstream::Upstream;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Answers `y = x` for every requested range; can be told to fail.
    struct LineUpstream {
        calls: AtomicUsize,
        status: Option<u16>,
    }

    #[async_trait]
    impl Upstream for LineUpstream {
        async fn calculate(&self, req: &PlotRequest) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.status {
                return Err(ProxyError::UpstreamStatus { status });
            }
            let n = ((req.x_end - req.x_start) / req.step + 1e-9).floor() as usize;
            let data = (0..=n)
                .map(|i| {
                    let x = req.x_start + i as f64 * req.step;
                    DataPoint { x, y: x }
                })
                .collect();
            Ok(Bytes::from(serde_json::to_vec(&PlotData { data }).unwrap()))
        }
    }

    fn test_app(status: Option<u16>, static_dir: PathBuf) -> (Router, Arc<LineUpstream>) {
        let upstream = Arc::new(LineUpstream {
            calls: AtomicUsize::new(0),
            status,
        });
        let fetcher = ChunkedFetcher::new(upstream.clone(), FetchSettings::default());
        let state = AppState {
            fetcher: Arc::new(fetcher),
            static_dir,
        };
        (app(state), upstream)
    }

    fn router() -> Router {
        test_app(None, PathBuf::from("does-not-exist")).0
    }

    async fn send(router: Router, method: Method, uri: &str, body: Body) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .expect("request should build");
        router.oneshot(request).await.expect("request should complete")
    }

    async fn read_body(response: Response) -> Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("response body should collect")
            .to_bytes()
    }

    #[tokio::test]
    async fn fetch_small_range_returns_upstream_body() {
        let body = json!({"function": "x", "x_start": 0, "x_end": 4, "step": 1}).to_string();
        let (router, upstream) = test_app(None, PathBuf::from("does-not-exist"));
        let response = send(router, Method::POST, "/fetch", Body::from(body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let value: Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(value["data"].as_array().unwrap().len(), 5);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_large_range_is_chunked_and_combined() {
        let body = json!({"function": "sin(x)", "x_start": 0, "x_end": 1, "step": 0.1}).to_string();
        let (router, upstream) = test_app(None, PathBuf::from("does-not-exist"));
        let response = send(router, Method::POST, "/fetch", Body::from(body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let plot: PlotData = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(plot.data.len(), 11);
        assert!(upstream.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn fetch_rejects_other_methods() {
        let response = send(router(), Method::GET, "/fetch", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let text = read_body(response).await;
        assert!(String::from_utf8_lossy(&text).contains("POST"));
    }

    #[tokio::test]
    async fn fetch_rejects_malformed_json() {
        let response = send(router(), Method::POST, "/fetch", Body::from("{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let missing = json!({"function": "x"}).to_string();
        let response = send(router(), Method::POST, "/fetch", Body::from(missing)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_range_is_a_400() {
        let body = json!({"function": "x", "x_start": 0, "x_end": 1e12, "step": 1e-3}).to_string();
        let (router, upstream) = test_app(None, PathBuf::from("does-not-exist"));
        let response = send(router, Method::POST, "/fetch", Body::from(body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_500_with_no_data() {
        let body = json!({"function": "x", "x_start": 0, "x_end": 100, "step": 1}).to_string();
        let (router, upstream) = test_app(Some(502), PathBuf::from("does-not-exist"));
        let response = send(router, Method::POST, "/fetch", Body::from(body)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = read_body(response).await;
        assert!(String::from_utf8_lossy(&text).contains("502"));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_function_returns_volosov_preset() {
        let response = send(router(), Method::GET, "/get_function?name=Volosov", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value: Value = serde_json::from_slice(&read_body(response).await).unwrap();
        let pi = std::f64::consts::PI;
        assert_eq!(value["function"], "0.01 * x ** 2 + 50 * cos(x)");
        assert_eq!(value["x_start"].as_f64(), Some(-10.0 * pi));
        assert_eq!(value["x_end"].as_f64(), Some(10.0 * pi));
        assert_eq!(value["step"].as_f64(), Some(pi / 4.0));
    }

    #[tokio::test]
    async fn get_function_unknown_name_is_404() {
        for uri in ["/get_function?name=unknown", "/get_function"] {
            let response = send(router(), Method::GET, uri, Body::empty()).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body = read_body(response).await;
            assert!(serde_json::from_slice::<Value>(&body).is_err());
        }
    }

    #[tokio::test]
    async fn index_falls_back_to_built_in_page() {
        let response = send(router(), Method::GET, "/", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = read_body(response).await;
        assert!(String::from_utf8_lossy(&page).contains("<form id=\"plot\">"));
    }

    #[tokio::test]
    async fn unreadable_landing_page_is_not_masked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let (router, _) = test_app(None, dir.path().to_path_buf());

        let response = send(router, Method::GET, "/", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body(response).await;
        assert!(!String::from_utf8_lossy(&body).contains("<form id=\"plot\">"));
    }

    #[tokio::test]
    async fn static_directory_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>custom</h1>").unwrap();
        let (router, _) = test_app(None, dir.path().to_path_buf());

        let response = send(router.clone(), Method::GET, "/static/app.js", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&read_body(response).await[..], b"console.log('hi');");

        let response = send(router, Method::GET, "/", Body::empty()).await;
        assert_eq!(&read_body(response).await[..], b"<h1>custom</h1>");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = send(router(), Method::GET, "/health", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(value, json!({"status": "ok"}));
    }
}
