use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::{DispatchFuture, InjectionProbe, Message, PageMessenger, TabId};
use crate::error::SnipError;
use crate::page::{Page, PageContext};

/// Page-side code living in one page. Injecting it again reuses the same
/// runtime; the listener is attached once for the page's lifetime.
#[derive(Debug)]
pub struct ContentRuntime {
    page: Page,
    attached: AtomicBool,
    listeners: AtomicUsize,
}

impl ContentRuntime {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            attached: AtomicBool::new(false),
            listeners: AtomicUsize::new(0),
        }
    }

    /// Attach the message listener unless this page already has one.
    pub fn attach(&self) -> bool {
        if self
            .attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("content orchestrator already loaded");
            return false;
        }
        self.listeners.fetch_add(1, Ordering::SeqCst);
        info!("content orchestrator loaded");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Message listener. Only `StartSelection` is meaningful in a page.
    pub fn on_message(&self, message: &Message) {
        match message {
            Message::StartSelection => {
                info!("START_SELECTION message received");
                self.page.begin_selection();
            }
            Message::CaptureTab => debug!("page ignores CAPTURE_TAB"),
        }
    }
}

#[derive(Debug)]
struct LocalTab {
    page: Page,
    runtime: Option<Arc<ContentRuntime>>,
    restricted: bool,
    injections: usize,
}

/// In-process tabs reachable by the privileged side.
#[derive(Debug, Default)]
pub struct LocalPages {
    tabs: Mutex<HashMap<TabId, LocalTab>>,
}

impl LocalPages {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TabId, LocalTab>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_tab(&self, tab: TabId, context: PageContext) -> Page {
        self.insert(tab, context, false)
    }

    /// A page code cannot be injected into (browser-internal pages and the like).
    pub fn open_restricted_tab(&self, tab: TabId, context: PageContext) -> Page {
        self.insert(tab, context, true)
    }

    fn insert(&self, tab: TabId, context: PageContext, restricted: bool) -> Page {
        let page = Page::new(context);
        self.lock().insert(
            tab,
            LocalTab {
                page: page.clone(),
                runtime: None,
                restricted,
                injections: 0,
            },
        );
        page
    }

    /// Navigating away destroys the page and whatever was injected into it.
    pub fn close_tab(&self, tab: TabId) -> bool {
        self.lock().remove(&tab).is_some()
    }

    pub fn page(&self, tab: TabId) -> Option<Page> {
        self.lock().get(&tab).map(|entry| entry.page.clone())
    }

    pub fn runtime(&self, tab: TabId) -> Option<Arc<ContentRuntime>> {
        self.lock().get(&tab)?.runtime.clone()
    }

    pub fn injection_count(&self, tab: TabId) -> usize {
        self.lock().get(&tab).map_or(0, |entry| entry.injections)
    }

    fn deliver(&self, tab: TabId, message: &Message) -> Result<(), SnipError> {
        let runtime = {
            let tabs = self.lock();
            let entry = tabs
                .get(&tab)
                .ok_or_else(|| SnipError::Delivery(format!("No tab with id: {}", tab)))?;
            entry
                .runtime
                .clone()
                .filter(|runtime| runtime.is_attached())
                .ok_or(SnipError::NoReceiver)?
        };
        runtime.on_message(message);
        Ok(())
    }

    fn inject_now(&self, tab: TabId) -> Result<(), SnipError> {
        let runtime = {
            let mut tabs = self.lock();
            let entry = tabs
                .get_mut(&tab)
                .ok_or_else(|| SnipError::Delivery(format!("No tab with id: {}", tab)))?;
            if entry.restricted {
                return Err(SnipError::Delivery(
                    "Cannot access contents of the page".to_string(),
                ));
            }
            entry.injections += 1;
            let page = entry.page.clone();
            entry
                .runtime
                .get_or_insert_with(|| Arc::new(ContentRuntime::new(page)))
                .clone()
        };
        runtime.attach();
        Ok(())
    }

    fn probe_now(&self, tab: TabId) -> Result<InjectionProbe, SnipError> {
        let tabs = self.lock();
        let entry = tabs
            .get(&tab)
            .ok_or_else(|| SnipError::Delivery(format!("No tab with id: {}", tab)))?;
        Ok(match &entry.runtime {
            Some(runtime) if runtime.is_attached() => InjectionProbe::complete(),
            Some(_) => InjectionProbe {
                orchestrator: false,
                ..InjectionProbe::complete()
            },
            None => InjectionProbe::default(),
        })
    }
}

impl PageMessenger for LocalPages {
    fn send(&self, tab: TabId, message: Message) -> DispatchFuture<'_, ()> {
        let result = self.deliver(tab, &message);
        Box::pin(async move { result })
    }

    fn inject(&self, tab: TabId) -> DispatchFuture<'_, ()> {
        let result = self.inject_now(tab);
        Box::pin(async move { result })
    }

    fn probe(&self, tab: TabId) -> DispatchFuture<'_, InjectionProbe> {
        let result = self.probe_now(tab);
        Box::pin(async move { result })
    }
}
