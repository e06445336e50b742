#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gator_core::api::{
    AppConfig, AppContext, BrowserHost, ElementHandle, ExtractionTask, HostError, Message,
    MemoryTaskStore, PageContext, PageSnapshot, Services, TabId, TabInfo, TaskStore,
};

pub const COURSE_URL: &str = "https://school.instructure.com/courses/42/assignments";
pub const INBOX_URL: &str = "https://school.instructure.com/conversations#filter=course=course_42";
pub const OPEN_CONVERSATION: &str = r#"[data-testid^="open-conversation-for-"]"#;

/// What a URL serves: its initial HTML, plus replacement HTML after a click.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub html: String,
    pub on_click: Vec<(ElementHandle, String)>,
}

impl PageScript {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            on_click: Vec::new(),
        }
    }

    pub fn click(mut self, target: ElementHandle, html: impl Into<String>) -> Self {
        self.on_click.push((target, html.into()));
        self
    }
}

#[derive(Debug, Clone)]
struct OpenTab {
    url: String,
    html_override: Option<String>,
}

#[derive(Default)]
struct HostState {
    scripts: Mutex<HashMap<String, PageScript>>,
    hanging: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    tabs: Mutex<HashMap<TabId, OpenTab>>,
    created: Mutex<Vec<(TabId, String)>>,
    removed: Mutex<Vec<TabId>>,
    next_id: AtomicU64,
}

impl HostState {
    fn tab(&self, tab: TabId) -> Result<OpenTab, HostError> {
        self.tabs
            .lock()
            .unwrap()
            .get(&tab)
            .cloned()
            .ok_or(HostError::TabGone(tab))
    }

    fn script(&self, url: &str) -> PageScript {
        self.scripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| PageScript::new("<html><body></body></html>"))
    }
}

/// In-memory browser that serves scripted HTML per URL.
#[derive(Clone, Default)]
pub struct ScriptedHost {
    state: Arc<HostState>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, script: PageScript) -> &Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
        self
    }

    pub fn serve_html(&self, url: &str, html: impl Into<String>) -> &Self {
        self.serve(url, PageScript::new(html))
    }

    /// `wait_for_load` never resolves for this URL.
    pub fn hang(&self, url: &str) -> &Self {
        self.state.hanging.lock().unwrap().insert(url.to_string());
        self
    }

    /// Reading the page at this URL panics.
    pub fn panic_on(&self, url: &str) -> &Self {
        self.state.panicking.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn created(&self) -> Vec<(TabId, String)> {
        self.state.created.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<TabId> {
        self.state.removed.lock().unwrap().clone()
    }

    pub fn open_tabs(&self) -> usize {
        self.state.tabs.lock().unwrap().len()
    }

    /// Tabs removed from `Drop` are closed on a spawned task.
    pub async fn wait_until_closed(&self) {
        for _ in 0..100 {
            if self.open_tabs() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl BrowserHost for ScriptedHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        Ok(None)
    }

    async fn create_tab(&self, url: &str, _active: bool) -> Result<TabId, HostError> {
        let id = TabId(self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.state.tabs.lock().unwrap().insert(
            id,
            OpenTab {
                url: url.to_string(),
                html_override: None,
            },
        );
        self.state.created.lock().unwrap().push((id, url.to_string()));
        Ok(id)
    }

    async fn wait_for_load(&self, tab: TabId) -> Result<(), HostError> {
        let url = self.state.tab(tab)?.url;
        let hangs = self.state.hanging.lock().unwrap().contains(&url);
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn remove_tab(&self, tab: TabId) -> Result<(), HostError> {
        self.state.removed.lock().unwrap().push(tab);
        match self.state.tabs.lock().unwrap().remove(&tab) {
            Some(_) => Ok(()),
            None => Err(HostError::TabGone(tab)),
        }
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), HostError> {
        let mut tabs = self.state.tabs.lock().unwrap();
        let entry = tabs.get_mut(&tab).ok_or(HostError::TabGone(tab))?;
        entry.url = url.to_string();
        entry.html_override = None;
        Ok(())
    }

    async fn tab_url(&self, tab: TabId) -> Result<String, HostError> {
        Ok(self.state.tab(tab)?.url)
    }

    async fn page(&self, tab: TabId) -> Result<Arc<dyn PageContext>, HostError> {
        self.state.tab(tab)?;
        Ok(Arc::new(ScriptedPage {
            state: self.state.clone(),
            tab,
        }))
    }

    async fn ping(&self, tab: TabId) -> bool {
        self.state.tab(tab).is_ok()
    }

    async fn inject(&self, tab: TabId) -> Result<(), HostError> {
        self.state.tab(tab).map(|_| ())
    }
}

struct ScriptedPage {
    state: Arc<HostState>,
    tab: TabId,
}

#[async_trait]
impl PageContext for ScriptedPage {
    async fn snapshot(&self) -> Result<PageSnapshot, HostError> {
        let open = self.state.tab(self.tab)?;
        let panics = self.state.panicking.lock().unwrap().contains(&open.url);
        if panics {
            panic!("page at {} blew up", open.url);
        }
        let html = match open.html_override {
            Some(html) => html,
            None => self.state.script(&open.url).html,
        };
        Ok(PageSnapshot::new(open.url, html))
    }

    async fn click(&self, target: &ElementHandle) -> Result<bool, HostError> {
        let open = self.state.tab(self.tab)?;
        let script = self.state.script(&open.url);
        let Some((_, html)) = script.on_click.iter().find(|(h, _)| h == target) else {
            return Ok(false);
        };
        if let Some(entry) = self.state.tabs.lock().unwrap().get_mut(&self.tab) {
            entry.html_override = Some(html.clone());
        }
        Ok(true)
    }
}

/// Defaults with delays shrunk for tests.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.retry.base_delay_ms = 1;
    cfg.retry.max_delay_ms = 5;
    cfg.tabs.settle_ms = 0;
    cfg.tabs.activation_settle_ms = 0;
    cfg.tabs.transcript_timeout_ms = 2_000;
    cfg.tabs.discovery_timeout_ms = 5_000;
    cfg.tabs.detail_timeout_ms = 2_000;
    cfg
}

/// `RUST_LOG=gator_core=debug cargo test` shows the coordinator's logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn context_with(host: &ScriptedHost, cfg: AppConfig, store: Arc<dyn TaskStore>) -> AppContext {
    init_tracing();
    AppContext::from_services(
        cfg,
        Services {
            host: Arc::new(host.clone()),
            store,
            sink: None,
        },
    )
}

pub fn context(host: &ScriptedHost) -> AppContext {
    context_with(host, test_config(), Arc::new(MemoryTaskStore::new()))
}

pub async fn await_task(ctx: &AppContext, id: &str) -> ExtractionTask {
    tokio::time::timeout(Duration::from_secs(10), ctx.coordinator().await_result(id))
        .await
        .expect("task did not finish in time")
        .expect("task lookup failed")
}

pub fn transcript_page(lines: &[(&str, &str)]) -> String {
    let items: String = lines
        .iter()
        .map(|(ts, text)| {
            format!(r#"<li class="transcript-list-item" aria-label="{ts}">{text}</li>"#)
        })
        .collect();
    format!("<html><body><video></video><ul>{items}</ul></body></html>")
}

pub fn assignment_index(rows: &[(&str, &str)]) -> String {
    let items: String = rows
        .iter()
        .map(|(href, title)| {
            format!(
                r#"<li class="assignment">
                    <a class="ig-title" href="{href}">{title}</a>
                    <div class="assignment-date-due">Due Sep 5 at 11:59pm</div>
                    <span class="points_possible">10 pts</span>
                </li>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="assignment_group">
            <div class="ig-header"><span class="ig-header-title">Homework</span></div>
            <ul class="ig-list">{items}</ul>
        </div></body></html>"#
    )
}

pub fn assignment_detail(description: &str, rubric: bool) -> String {
    let rubric_html = if rubric {
        r#"<div id="rubrics"><div class="rubric_container"><table>
            <tr class="criterion"><td class="description_title">Thesis</td><td class="points">5 pts</td></tr>
        </table></div></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div id="assignment_show">
            <div class="description user_content">{description}</div>
        </div>{rubric_html}</body></html>"#
    )
}

pub fn progress_of(msg: &Message, id: &str) -> Option<(u32, u32)> {
    match msg {
        Message::Progress {
            extraction_id,
            progress,
            ..
        } if extraction_id == id => Some((progress.current, progress.total)),
        _ => None,
    }
}
