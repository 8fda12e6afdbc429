//! Rendering-engine seam and the headless Chromium binding behind it.
//!
//! Every `print_pdf` call owns a whole engine instance: launch, readiness poll,
//! page, load, export, teardown. Nothing survives the call, so a wedged browser
//! cannot leak into the next request.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures_util::{Stream, StreamExt};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::render::RenderError;

/// Upper bound on waiting for the browser process to exit after close.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Page geometry for export. The template owns all spacing, so margins are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
    pub print_background: bool,
}

impl PdfOptions {
    pub fn a4() -> Self {
        Self {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.0,
            print_background: true,
        }
    }

    fn to_params(&self) -> PrintToPdfParams {
        PrintToPdfParams {
            print_background: Some(self.print_background),
            paper_width: Some(self.paper_width_in),
            paper_height: Some(self.paper_height_in),
            margin_top: Some(self.margin_in),
            margin_bottom: Some(self.margin_in),
            margin_left: Some(self.margin_in),
            margin_right: Some(self.margin_in),
            ..Default::default()
        }
    }
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self::a4()
    }
}

/// Turns markup into a paginated document using a fresh engine instance per call.
/// Implementations must release the instance on every exit path.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn print_pdf(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;
}

/// One running engine process, driven stage by stage by [`IsolatedEngine`].
/// Stages carry no timeouts of their own.
#[async_trait]
pub trait EngineInstance: Send {
    /// Round-trip to the process; returns its product string.
    async fn ping(&mut self) -> Result<String, RenderError>;

    async fn open_page(&mut self) -> Result<(), RenderError>;

    /// Resolves once the page has fired its load event.
    async fn load(&mut self, html: &str) -> Result<(), RenderError>;

    async fn export(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;

    /// Closes any open page and ends the process. Called exactly once, after
    /// whatever stage the session reached.
    async fn shutdown(&mut self);
}

/// Starts engine instances.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    type Instance: EngineInstance;

    async fn launch(&self) -> Result<Self::Instance, RenderError>;
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Browser binary. Autodetected when `None`.
    pub chrome_executable: Option<PathBuf>,
    pub launch_timeout: Duration,
    /// Readiness probes after launch, each bounded by `ready_poll_interval`.
    pub ready_polls: u32,
    pub ready_poll_interval: Duration,
    /// Page creation bound, kept separate from the session bound.
    pub page_timeout: Duration,
    /// Markup load bound, subresources included.
    pub load_timeout: Duration,
    /// Grace period for late font/image decode.
    pub settle_delay: Duration,
    /// Whole-session bound, launch excluded.
    pub session_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            launch_timeout: Duration::from_secs(10),
            ready_polls: 3,
            ready_poll_interval: Duration::from_millis(500),
            page_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(300),
            session_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives one launched instance per `print_pdf` call and always shuts it down.
#[derive(Debug, Clone)]
pub struct IsolatedEngine<L> {
    launcher: L,
    settings: EngineSettings,
}

/// Headless Chromium driven over the DevTools protocol.
pub type ChromiumEngine = IsolatedEngine<ChromiumLauncher>;

impl IsolatedEngine<ChromiumLauncher> {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_launcher(ChromiumLauncher::new(settings.clone()), settings)
    }
}

impl<L: EngineLauncher> IsolatedEngine<L> {
    pub fn with_launcher(launcher: L, settings: EngineSettings) -> Self {
        Self { launcher, settings }
    }

    async fn wait_until_ready(&self, instance: &mut L::Instance) -> Result<(), RenderError> {
        let mut last_failure = String::from("no response");

        for poll in 1..=self.settings.ready_polls {
            match timeout(self.settings.ready_poll_interval, instance.ping()).await {
                Ok(Ok(product)) => {
                    debug!("Render engine ready after {} poll(s): {}", poll, product);
                    return Ok(());
                }
                Ok(Err(e)) => last_failure = e.to_string(),
                Err(_) => last_failure = String::from("no response"),
            }
            sleep(self.settings.ready_poll_interval).await;
        }

        Err(RenderError::EngineLaunch(format!(
            "engine not responsive after {} poll(s): {last_failure}",
            self.settings.ready_polls
        )))
    }

    async fn run_session(
        &self,
        instance: &mut L::Instance,
        html: &str,
        options: &PdfOptions,
    ) -> Result<Vec<u8>, RenderError> {
        self.wait_until_ready(instance).await?;

        timeout(self.settings.page_timeout, instance.open_page())
            .await
            .map_err(|_| {
                RenderError::Surface(format!(
                    "page creation timed out after {}ms",
                    self.settings.page_timeout.as_millis()
                ))
            })??;

        timeout(self.settings.load_timeout, instance.load(html))
            .await
            .map_err(|_| {
                RenderError::Surface(format!(
                    "markup load timed out after {}ms",
                    self.settings.load_timeout.as_millis()
                ))
            })??;

        sleep(self.settings.settle_delay).await;

        instance.export(options).await
    }
}

#[async_trait]
impl<L: EngineLauncher> RenderEngine for IsolatedEngine<L> {
    async fn print_pdf(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        let mut instance = timeout(self.settings.launch_timeout, self.launcher.launch())
            .await
            .map_err(|_| {
                RenderError::EngineLaunch(format!(
                    "launch timed out after {}ms",
                    self.settings.launch_timeout.as_millis()
                ))
            })??;

        let outcome = match timeout(
            self.settings.session_timeout,
            self.run_session(&mut instance, html, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RenderError::Surface(format!(
                "generation timed out after {}ms",
                self.settings.session_timeout.as_millis()
            ))),
        };

        instance.shutdown().await;

        outcome
    }
}

/// Polls the DevTools event stream until the connection closes. Undecodable
/// messages are not fatal to the connection, so they are logged and skipped.
async fn drain_events<S, E>(mut events: S) -> usize
where
    S: Stream<Item = Result<(), E>> + Unpin,
    E: Display,
{
    let mut errors = 0;
    while let Some(event) = events.next().await {
        if let Err(e) = event {
            errors += 1;
            debug!("DevTools handler error: {e}");
        }
    }
    errors
}

#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: EngineSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir)
            .request_timeout(self.settings.session_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--font-render-hinting=none");

        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| RenderError::EngineLaunch(format!("invalid browser config: {e}")))
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    type Instance = ChromiumInstance;

    async fn launch(&self) -> Result<ChromiumInstance, RenderError> {
        // Per-instance profile so concurrent browsers never share a profile lock.
        let profile = tempfile::Builder::new()
            .prefix("cv-render-")
            .tempdir()
            .map_err(|e| RenderError::EngineLaunch(format!("profile directory: {e}")))?;
        let config = self.browser_config(profile.path())?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::from_engine("launch", e, true))?;

        Ok(ChromiumInstance {
            browser,
            page: None,
            events: tokio::spawn(drain_events(handler)),
            _profile: profile,
        })
    }
}

pub struct ChromiumInstance {
    browser: Browser,
    page: Option<Page>,
    events: JoinHandle<usize>,
    _profile: TempDir,
}

impl ChromiumInstance {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Surface(String::from("no page open")))
    }
}

#[async_trait]
impl EngineInstance for ChromiumInstance {
    async fn ping(&mut self) -> Result<String, RenderError> {
        self.browser
            .version()
            .await
            .map(|version| version.product)
            .map_err(|e| RenderError::from_engine("readiness", e, true))
    }

    async fn open_page(&mut self) -> Result<(), RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::from_engine("page creation", e, false))?;
        self.page = Some(page);
        Ok(())
    }

    async fn load(&mut self, html: &str) -> Result<(), RenderError> {
        // set_content returns after the load lifecycle event.
        self.page()?
            .set_content(html)
            .await
            .map(|_| ())
            .map_err(|e| RenderError::from_engine("markup load", e, false))
    }

    async fn export(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        self.page()?
            .pdf(options.to_params())
            .await
            .map_err(|e| RenderError::from_engine("export", e, false))
    }

    async fn shutdown(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed during teardown: {e}");
            }
        }

        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {e}; killing process");
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("Browser kill failed: {e}");
            }
        }

        match timeout(TEARDOWN_TIMEOUT, self.browser.wait()).await {
            Ok(Ok(_)) => debug!("Render engine process exited"),
            Ok(Err(e)) => warn!("Waiting for render engine exit failed: {e}"),
            Err(_) => {
                warn!("Render engine did not exit in time; killing process");
                if let Some(Err(e)) = self.browser.kill().await {
                    warn!("Browser kill failed: {e}");
                }
            }
        }

        self.events.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Step {
        Pass,
        Fail,
        Hang,
    }

    #[derive(Debug, Clone, Copy)]
    struct Script {
        launch: Step,
        ping: Step,
        open: Step,
        load: Step,
        export: Step,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                launch: Step::Pass,
                ping: Step::Pass,
                open: Step::Pass,
                load: Step::Pass,
                export: Step::Pass,
            }
        }
    }

    #[derive(Debug, Default)]
    struct Lifecycle {
        launches: AtomicUsize,
        pages_opened: AtomicUsize,
        shutdowns: AtomicUsize,
        page_left_open: AtomicBool,
    }

    struct FakeLauncher {
        script: Script,
        lifecycle: Arc<Lifecycle>,
    }

    struct FakeInstance {
        script: Script,
        lifecycle: Arc<Lifecycle>,
        page_open: bool,
    }

    async fn run(step: Step, stage: &str) -> Result<(), RenderError> {
        match step {
            Step::Pass => Ok(()),
            Step::Fail => Err(RenderError::Surface(format!("{stage} failed"))),
            Step::Hang => std::future::pending().await,
        }
    }

    #[async_trait]
    impl EngineLauncher for FakeLauncher {
        type Instance = FakeInstance;

        async fn launch(&self) -> Result<FakeInstance, RenderError> {
            run(self.script.launch, "launch").await?;
            self.lifecycle.launches.fetch_add(1, Ordering::SeqCst);
            Ok(FakeInstance {
                script: self.script,
                lifecycle: self.lifecycle.clone(),
                page_open: false,
            })
        }
    }

    #[async_trait]
    impl EngineInstance for FakeInstance {
        async fn ping(&mut self) -> Result<String, RenderError> {
            run(self.script.ping, "ping").await?;
            Ok(String::from("FakeChrome/1.0"))
        }

        async fn open_page(&mut self) -> Result<(), RenderError> {
            run(self.script.open, "page creation").await?;
            self.page_open = true;
            self.lifecycle.pages_opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn load(&mut self, _html: &str) -> Result<(), RenderError> {
            run(self.script.load, "markup load").await
        }

        async fn export(&mut self, _options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
            run(self.script.export, "export").await?;
            Ok(b"%PDF-1.7".to_vec())
        }

        async fn shutdown(&mut self) {
            self.page_open = false;
            self.lifecycle.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for FakeInstance {
        fn drop(&mut self) {
            self.lifecycle
                .page_left_open
                .fetch_or(self.page_open, Ordering::SeqCst);
        }
    }

    fn engine(script: Script) -> (IsolatedEngine<FakeLauncher>, Arc<Lifecycle>) {
        let lifecycle = Arc::new(Lifecycle::default());
        let launcher = FakeLauncher {
            script,
            lifecycle: lifecycle.clone(),
        };
        (
            IsolatedEngine::with_launcher(launcher, EngineSettings::default()),
            lifecycle,
        )
    }

    fn assert_torn_down(lifecycle: &Lifecycle) {
        assert_eq!(lifecycle.launches.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!lifecycle.page_left_open.load(Ordering::SeqCst));
    }

    #[test]
    fn test_a4_params_have_zero_margins_and_background() {
        let params = PdfOptions::a4().to_params();
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.paper_width, Some(8.27));
        assert_eq!(params.paper_height, Some(11.69));
        assert_eq!(params.margin_top, Some(0.0));
        assert_eq!(params.margin_left, Some(0.0));
    }

    #[test]
    fn test_page_timeout_is_shorter_than_session() {
        let settings = EngineSettings::default();
        assert!(settings.page_timeout < settings.session_timeout);
        assert!(settings.ready_polls > 0);
    }

    #[test]
    fn test_browser_config_uses_given_profile() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChromiumLauncher::new(EngineSettings {
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        });
        assert!(launcher.browser_config(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_event_drain_survives_handler_errors() {
        let seen = AtomicUsize::new(0);
        let events = stream::iter(vec![Ok(()), Err("unknown event"), Ok(()), Err("bad frame"), Ok(())])
            .inspect(|_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });

        let errors = drain_events(events).await;

        assert_eq!(errors, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_session_is_torn_down() {
        let (engine, lifecycle) = engine(Script::default());

        let bytes = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap();

        assert_eq!(bytes, b"%PDF-1.7");
        assert_eq!(lifecycle.pages_opened.load(Ordering::SeqCst), 1);
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_creation_timeout_tears_down() {
        let (engine, lifecycle) = engine(Script {
            open: Step::Hang,
            ..Default::default()
        });

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::Surface(ref m) if m.contains("page creation timed out")));
        assert_eq!(lifecycle.pages_opened.load(Ordering::SeqCst), 0);
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_tears_down() {
        let (engine, lifecycle) = engine(Script {
            load: Step::Fail,
            ..Default::default()
        });

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::Surface(ref m) if m.contains("markup load failed")));
        assert_eq!(lifecycle.pages_opened.load(Ordering::SeqCst), 1);
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_failure_tears_down() {
        let (engine, lifecycle) = engine(Script {
            export: Step::Fail,
            ..Default::default()
        });

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::Surface(ref m) if m.contains("export failed")));
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_timeout_tears_down() {
        let (engine, lifecycle) = engine(Script {
            export: Step::Hang,
            ..Default::default()
        });
        let started = Instant::now();

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::Surface(ref m) if m.contains("generation timed out")));
        assert!(started.elapsed() >= EngineSettings::default().session_timeout);
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_engine_is_torn_down_after_polls() {
        let (engine, lifecycle) = engine(Script {
            ping: Step::Hang,
            ..Default::default()
        });

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::EngineLaunch(ref m) if m.contains("after 3 poll(s)")));
        assert_eq!(lifecycle.pages_opened.load(Ordering::SeqCst), 0);
        assert_torn_down(&lifecycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_timeout_has_nothing_to_tear_down() {
        let (engine, lifecycle) = engine(Script {
            launch: Step::Hang,
            ..Default::default()
        });

        let err = engine.print_pdf("<p>cv</p>", &PdfOptions::a4()).await.unwrap_err();

        assert!(matches!(err, RenderError::EngineLaunch(ref m) if m.contains("launch timed out")));
        assert_eq!(lifecycle.launches.load(Ordering::SeqCst), 0);
        assert_eq!(lifecycle.shutdowns.load(Ordering::SeqCst), 0);
    }
}
