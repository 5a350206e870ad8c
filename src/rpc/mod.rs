//! The authenticated JSON-RPC listener.
//!
//! [`start`] resolves credentials, provisions the cookie and only then binds.
//! Any failure before the bind leaves no listener and no cookie behind.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::auth::{
    self, config::KNOWN_SETTINGS, AuthOptions, Authenticator, CookieProvider, CredentialRegistry,
    RpcWhitelist,
};
use crate::settings::{self, Settings};

pub mod handlers;
mod middleware;

pub const DEFAULT_PORT: u16 = 8332;

pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Why the listener did not come up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] settings::Error),
    #[error(transparent)]
    Auth(#[from] auth::Error),
    #[error("unable to bind RPC listener on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
}

impl StartupError {
    #[must_use]
    pub fn is_invalid_credential_format(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_invalid_credential_format())
    }

    #[must_use]
    pub fn is_cookie_write_failure(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_cookie_write_failure())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub auth: AuthOptions,
}

impl ServerConfig {
    /// Assemble a configuration from ordered settings.
    ///
    /// # Errors
    /// Returns [`StartupError::Settings`] for unknown setting names and
    /// [`StartupError::Auth`] for invalid cookie permissions or whitelist values.
    pub fn from_settings(
        addr: SocketAddr,
        datadir: &Path,
        settings: &Settings,
    ) -> Result<Self, StartupError> {
        settings.ensure_known(KNOWN_SETTINGS)?;
        Ok(Self {
            addr,
            auth: AuthOptions::from_settings(settings, datadir)?,
        })
    }
}

/// Shared, read-only state of one server run.
#[derive(Debug, Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub whitelist: Arc<RpcWhitelist>,
    pub started: Instant,
    pub local_addr: SocketAddr,
}

/// Handle on a serving listener.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    authenticator: Arc<Authenticator>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn cookie_path(&self) -> Option<PathBuf> {
        self.authenticator
            .cookie()
            .map(|cookie| cookie.path().to_path_buf())
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Shut down gracefully, wait for in-flight requests, then delete the cookie.
    ///
    /// # Errors
    /// Returns the serve loop's I/O error, if any.
    pub async fn stop(self) -> io::Result<()> {
        // The receiver is gone only if the serve loop already ended.
        let _ = self.shutdown.send(());
        let result = match self.task.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        };
        if let Some(cookie) = self.authenticator.cookie() {
            cookie.remove();
        }
        info!("RPC server on {} stopped", self.local_addr);
        result
    }
}

/// Build the credential snapshot, provision the cookie, bind and serve.
///
/// # Errors
/// Returns [`StartupError`] if any credential directive is malformed, the
/// cookie cannot be written or the address cannot be bound.
pub async fn start(config: ServerConfig) -> Result<RunningServer, StartupError> {
    let ServerConfig { addr, auth } = config;

    let registry = CredentialRegistry::build(auth.directives, auth.legacy)?;

    let cookie = match auth.cookie {
        Some(options) => Some(CookieProvider::new(options.path, options.permissions).provision()?),
        None => None,
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            if let Some(cookie) = &cookie {
                cookie.remove();
            }
            return Err(StartupError::Bind { addr, source });
        }
    };
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind { addr, source })?;

    let authenticator = Arc::new(Authenticator::new(registry, cookie));
    let state = AppState {
        authenticator: authenticator.clone(),
        whitelist: Arc::new(auth.whitelist),
        started: Instant::now(),
        local_addr,
    };

    let app = router(state);
    let (shutdown, rx) = oneshot::channel();

    info!("Listening on {}", local_addr);

    let task = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = rx.await;
                info!("Gracefully shutdown");
            })
            .await
    });

    Ok(RunningServer {
        local_addr,
        authenticator,
        shutdown,
        task,
    })
}

fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", post(handlers::dispatch))
        .layer(from_fn_with_state(state.clone(), middleware::basic_auth));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .with_state(state)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Directive;

    fn config(directives: Vec<Directive>, cookie_dir: Option<&Path>) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(DEFAULT_BIND, 0),
            auth: AuthOptions {
                directives,
                legacy: None,
                cookie: cookie_dir.map(|dir| auth::CookieOptions {
                    path: dir.join(".cookie"),
                    permissions: auth::CookiePermissions::default(),
                }),
                whitelist: RpcWhitelist::default(),
            },
        }
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let settings = Settings::new(
            Vec::new(),
            Settings::parse_overrides(&["-rpcauthfiel=users.txt"]).expect("parse"),
        );
        let err = ServerConfig::from_settings(
            SocketAddr::new(DEFAULT_BIND, 0),
            Path::new("/data"),
            &settings,
        )
        .expect_err("unknown");
        assert!(matches!(err, StartupError::Settings(_)));
    }

    #[tokio::test]
    async fn malformed_directive_prevents_cookie_and_bind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = start(config(
            vec![Directive::AddInline("foo:bar".to_string())],
            Some(dir.path()),
        ))
        .await
        .expect_err("must fail");
        assert!(err.is_invalid_credential_format(), "{err}");
        assert!(!dir.path().join(".cookie").exists());
    }

    #[tokio::test]
    async fn stop_removes_cookie() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = start(config(Vec::new(), Some(dir.path())))
            .await
            .expect("start");
        let cookie = server.cookie_path().expect("cookie enabled");
        assert!(cookie.exists());
        server.stop().await.expect("stop");
        assert!(!cookie.exists());
    }

    #[tokio::test]
    async fn bind_failure_removes_cookie() {
        let dir = tempfile::tempdir().expect("tempdir");
        let occupied = TcpListener::bind(SocketAddr::new(DEFAULT_BIND, 0))
            .await
            .expect("bind");
        let mut config = config(Vec::new(), Some(dir.path()));
        config.addr = occupied.local_addr().expect("addr");

        let err = start(config).await.expect_err("address in use");
        assert!(matches!(err, StartupError::Bind { .. }));
        assert!(!dir.path().join(".cookie").exists());
    }
}
