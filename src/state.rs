use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::pomodoro::runner::{spawn_collector, Cadence, TimerRegistry};
use crate::store::{open_store, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub timers: TimerRegistry,
    /// Keeps a test's scratch store directory alive as long as the state.
    #[cfg(test)]
    _scratch: Option<Arc<tempfile::TempDir>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let store = open_store(&config).await?;
        Ok(Self::from_parts(Arc::new(config), store))
    }

    /// Wire the timer registry and session collector to `store`.
    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        let cadence = Cadence {
            advance_delay: Duration::from_millis(config.pomodoro_advance_delay_ms),
            idle_timeout: Duration::from_secs(config.pomodoro_idle_timeout_secs),
            ..Cadence::default()
        };
        Self::with_cadence(config, store, cadence)
    }

    fn with_cadence(config: Arc<AppConfig>, store: Arc<dyn Store>, cadence: Cadence) -> Self {
        let (sink, _collector) = spawn_collector(store.clone());
        Self {
            config,
            store,
            timers: TimerRegistry::new(sink, cadence),
            #[cfg(test)]
            _scratch: None,
        }
    }

    /// State over a throwaway local store; needs a tokio runtime.
    #[cfg(test)]
    pub async fn fake() -> Self {
        Self::fake_with_tick(Cadence::default().tick).await
    }

    /// Like [`AppState::fake`], with timers counting one second per `tick`.
    #[cfg(test)]
    pub async fn fake_with_tick(tick: Duration) -> Self {
        use crate::config::{JwtConfig, OAuthConfig, StoreBackend};
        use crate::store::LocalStore;

        let scratch = tempfile::tempdir().expect("temp dir");
        let dir = scratch.path().to_path_buf();
        let store = Arc::new(LocalStore::open(&dir).await.expect("temp store opens")) as Arc<dyn Store>;

        let config = Arc::new(AppConfig {
            store: StoreBackend::Local { dir },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            public_url: "http://localhost:3000".into(),
            reset_token_ttl_minutes: 60,
            oauth: OAuthConfig {
                apple_mock: true,
                ..OAuthConfig::default()
            },
            pomodoro_advance_delay_ms: 20,
            pomodoro_idle_timeout_secs: 60,
        });
        let cadence = Cadence {
            tick,
            advance_delay: Duration::from_millis(config.pomodoro_advance_delay_ms),
            idle_timeout: Duration::from_secs(config.pomodoro_idle_timeout_secs),
        };
        let mut state = Self::with_cadence(config, store, cadence);
        state._scratch = Some(Arc::new(scratch));
        state
    }
}
