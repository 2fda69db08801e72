#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use penzu_export::driver::Driver;
use penzu_export::error::{ExportError, Result};
use penzu_export::layout::PageLayout;
use penzu_export::listing::listing_url;
use penzu_export::session::{LoadTimings, SessionGateway};

pub const BASE_URL: &str = "https://penzu.test";

#[derive(Debug, Clone, Default)]
pub struct Node {
    selectors: Vec<String>,
    text: String,
    attributes: HashMap<String, String>,
    properties: HashMap<String, serde_json::Value>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(selector: &str) -> Self {
        Self {
            selectors: vec![selector.to_owned()],
            ..Self::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        text.clone_into(&mut self.text);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn prop(mut self, name: &str, value: serde_json::Value) -> Self {
        self.properties.insert(name.to_owned(), value);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeEntry {
    pub entry_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl FakeEntry {
    pub fn new(entry_id: &str) -> Self {
        Self {
            entry_id: entry_id.to_owned(),
            title: format!("Title {entry_id}"),
            content: format!("Body of entry {entry_id}"),
            created_at: format!("01/02/2020 entry {entry_id}"),
        }
    }

    pub fn with_text(mut self, title: &str, content: &str) -> Self {
        title.clone_into(&mut self.title);
        content.clone_into(&mut self.content);
        self
    }
}

pub fn entries(count: usize) -> Vec<FakeEntry> {
    (1..=count)
        .map(|n| FakeEntry::new(&format!("{}", 1000 + n)))
        .collect()
}

pub fn entry_url(journal_id: &str, entry_id: &str) -> String {
    format!("{BASE_URL}/journals/{journal_id}/{entry_id}")
}

pub fn listing_row(href: &str, created_at: &str) -> Node {
    let layout = PageLayout::default();
    Node::new(&layout.listing_row)
        .child(
            Node::new(&layout.listing_title_cell)
                .child(Node::new(&layout.listing_link).attr("href", href)),
        )
        .child(Node::new(&layout.listing_date_cell).text(created_at))
}

pub fn entry_page(title: &str, content: &str) -> Vec<Node> {
    let layout = PageLayout::default();
    vec![
        Node::new(&layout.entry_title).prop(
            &layout.entry_title_property,
            serde_json::Value::String(title.to_owned()),
        ),
        Node::new(&layout.entry_content).text(content),
    ]
}

fn loader(done: bool) -> Node {
    let class = if done {
        "global-loader__wrap ng-hide"
    } else {
        "global-loader__wrap"
    };
    Node::new(&PageLayout::default().loader).attr("class", class)
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    generation: u64,
    path: Vec<usize>,
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, Vec<Node>>,
    current_url: String,
    current: Vec<Node>,
    generation: u64,
    stale_budget: HashMap<String, u32>,
    stale_pending: bool,
    visits: Vec<String>,
    typed: Vec<String>,
    credentials: Option<(String, String)>,
    closed: bool,
}

/// In-memory browser serving a scripted journal site.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<State>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake browser state poisoned")
    }

    /// Serves `nodes` at `url`, behind a loader that is already done.
    pub fn set_page(&self, url: &str, nodes: Vec<Node>) {
        let mut page = vec![loader(true)];
        page.extend(nodes);
        self.state().pages.insert(url.to_owned(), page);
    }

    pub fn set_loading_forever(&self, url: &str) {
        self.state().pages.insert(url.to_owned(), vec![loader(false)]);
    }

    /// Lists `entries` `page_size` per page and serves each entry's detail page.
    pub fn add_journal(&self, journal_id: &str, entries: &[FakeEntry], page_size: usize) {
        for (index, chunk) in entries.chunks(page_size).enumerate() {
            let rows = chunk
                .iter()
                .map(|entry| listing_row(&entry_url(journal_id, &entry.entry_id), &entry.created_at))
                .collect();
            self.set_page(&listing_url(BASE_URL, journal_id, index as u32 + 1), rows);
        }
        for entry in entries {
            self.set_entry(journal_id, entry);
        }
    }

    pub fn set_entry(&self, journal_id: &str, entry: &FakeEntry) {
        self.set_page(
            &entry_url(journal_id, &entry.entry_id),
            entry_page(&entry.title, &entry.content),
        );
    }

    /// Serves a detail page without its content container.
    pub fn break_entry(&self, journal_id: &str, entry_id: &str) {
        let title = PageLayout::default().entry_title;
        self.set_page(&entry_url(journal_id, entry_id), vec![Node::new(&title)]);
    }

    /// The next `times` visits to `url` re-render while the first text is read.
    pub fn go_stale(&self, url: &str, times: u32) {
        self.state().stale_budget.insert(url.to_owned(), times);
    }

    pub fn accept_credentials(&self, email: &str, password: &str) {
        let layout = PageLayout::default();
        self.set_page(
            &format!("{BASE_URL}{}", layout.login_path),
            vec![
                Node::new(&layout.login_email),
                Node::new(&layout.login_password),
                Node::new(&layout.login_submit),
            ],
        );
        self.state().credentials = Some((email.to_owned(), password.to_owned()));
    }

    /// The page reached after a successful login never finishes loading.
    pub fn stall_after_login(&self) {
        self.set_loading_forever(&format!("{BASE_URL}/app/journals"));
    }

    pub fn visits(&self) -> Vec<String> {
        self.state().visits.clone()
    }

    pub fn visits_to(&self, url: &str) -> usize {
        self.state().visits.iter().filter(|v| v.as_str() == url).count()
    }

    pub fn listing_visits(&self) -> usize {
        self.state()
            .visits
            .iter()
            .filter(|v| v.contains("/entries?page="))
            .count()
    }

    pub fn entry_visits(&self) -> usize {
        self.state()
            .visits
            .iter()
            .filter(|v| v.contains("/journals/") && !v.contains("/entries?page="))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl State {
    fn resolve(&self, element: &FakeElement) -> Result<&Node> {
        if element.generation != self.generation {
            return Err(stale());
        }
        let mut nodes = &self.current;
        let mut found = None;
        for &index in &element.path {
            let node = nodes.get(index).ok_or_else(stale)?;
            nodes = &node.children;
            found = Some(node);
        }
        found.ok_or_else(stale)
    }

    fn element(&self, path: Vec<usize>) -> FakeElement {
        FakeElement {
            generation: self.generation,
            path,
        }
    }
}

fn stale() -> ExportError {
    ExportError::TransientElement {
        context: "reading a detached node".to_owned(),
    }
}

fn collect(nodes: &[Node], prefix: &[usize], selector: &str, out: &mut Vec<Vec<usize>>) {
    for (index, node) in nodes.iter().enumerate() {
        let mut path = prefix.to_vec();
        path.push(index);
        if node.selectors.iter().any(|s| s == selector) {
            out.push(path.clone());
        }
        collect(&node.children, &path, selector, out);
    }
}

#[async_trait]
impl Driver for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.visits.push(url.to_owned());
        state.generation += 1;
        url.clone_into(&mut state.current_url);
        state.current = state
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| vec![loader(true)]);
        state.typed.clear();
        state.stale_pending = match state.stale_budget.get_mut(url) {
            Some(budget) if *budget > 0 => {
                *budget -= 1;
                true
            }
            _ => false,
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().current_url.clone())
    }

    async fn find(&self, selector: &str) -> Result<Vec<FakeElement>> {
        let state = self.state();
        let mut paths = Vec::new();
        collect(&state.current, &[], selector, &mut paths);
        Ok(paths.into_iter().map(|p| state.element(p)).collect())
    }

    async fn find_within(&self, parent: &FakeElement, selector: &str) -> Result<Vec<FakeElement>> {
        let state = self.state();
        let node = state.resolve(parent)?;
        let mut paths = Vec::new();
        collect(&node.children, &parent.path, selector, &mut paths);
        Ok(paths.into_iter().map(|p| state.element(p)).collect())
    }

    async fn read_text(&self, element: &FakeElement) -> Result<String> {
        let mut state = self.state();
        if state.stale_pending {
            state.stale_pending = false;
            return Err(stale());
        }
        Ok(state.resolve(element)?.text.clone())
    }

    async fn read_attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let state = self.state();
        Ok(state.resolve(element)?.attributes.get(name).cloned())
    }

    async fn read_property(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<serde_json::Value>> {
        let state = self.state();
        Ok(state.resolve(element)?.properties.get(name).cloned())
    }

    async fn type_text(&self, element: &FakeElement, text: &str) -> Result<()> {
        let mut state = self.state();
        state.resolve(element)?;
        state.typed.push(text.to_owned());
        Ok(())
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        let submit = PageLayout::default().login_submit;
        let is_submit = state.resolve(element)?.selectors.contains(&submit);
        if is_submit {
            let accepted = match &state.credentials {
                Some((email, password)) => state.typed == [email.clone(), password.clone()],
                None => false,
            };
            if accepted {
                let landing = format!("{BASE_URL}/app/journals");
                state.generation += 1;
                state.current = state
                    .pages
                    .get(&landing)
                    .cloned()
                    .unwrap_or_else(|| vec![loader(true)]);
                state.current_url = landing;
            }
        }
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}

pub fn gateway(browser: &FakeBrowser) -> SessionGateway<FakeBrowser> {
    SessionGateway::new(browser.clone(), PageLayout::default(), LoadTimings::default())
}
