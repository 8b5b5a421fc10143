//! In-memory browser session for test suites.
//!
//! A [`FakeSession`] holds a tiny DOM: labelled elements registered under the
//! locators that find them, each with text, a visibility flag, an attachment
//! flag, optional children, and optional `<select>` options. Click and select
//! hooks let a test script how the page reacts. Every input primitive
//! and text read is recorded in a journal.

use crate::errors::SessionError;
use crate::locator::{ElementHandle, Locator};
use crate::session::BrowserSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

type ClickHook = Box<dyn FnMut(&mut FakeDom) + Send>;
type SelectHook = Box<dyn FnMut(&mut FakeDom, &str) + Send>;

/// One recorded primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click(String),
    Clear(String),
    Type { label: String, text: String },
    Select { label: String, value: String },
    Read(String),
}

#[derive(Debug, Clone, Default)]
struct FakeElement {
    label: String,
    text: String,
    visible: bool,
    attached: bool,
    value: String,
    options: Vec<String>,
    children: Vec<(Locator, ElementHandle)>,
}

/// Mutable page state behind a [`FakeSession`]
#[derive(Default)]
pub struct FakeDom {
    elements: HashMap<ElementHandle, FakeElement>,
    roots: Vec<(Locator, ElementHandle)>,
    next_id: u64,
    click_hooks: HashMap<ElementHandle, ClickHook>,
    select_hooks: HashMap<ElementHandle, SelectHook>,
    journal: Vec<Interaction>,
}

impl FakeDom {
    fn mint(&mut self, label: &str, text: &str) -> ElementHandle {
        self.next_id += 1;
        let handle = ElementHandle(self.next_id);
        self.elements.insert(
            handle,
            FakeElement {
                label: label.to_string(),
                text: text.to_string(),
                visible: true,
                attached: true,
                ..FakeElement::default()
            },
        );
        handle
    }

    /// Register a visible, attached element findable from the document by `locator`
    pub fn insert(&mut self, locator: Locator, label: &str, text: &str) -> ElementHandle {
        let handle = self.mint(label, text);
        self.roots.push((locator, handle));
        handle
    }

    /// Register an element findable from `parent` by `locator`
    pub fn insert_child(
        &mut self,
        parent: ElementHandle,
        locator: Locator,
        label: &str,
        text: &str,
    ) -> ElementHandle {
        let handle = self.mint(label, text);
        if let Some(element) = self.elements.get_mut(&parent) {
            element.children.push((locator, handle));
        }
        handle
    }

    /// Make an existing element also findable from the document by `locator`
    pub fn alias(&mut self, locator: Locator, handle: ElementHandle) {
        self.roots.push((locator, handle));
    }

    /// Detach an element and its descendants; old handles become stale
    pub fn detach(&mut self, handle: ElementHandle) {
        let children = match self.elements.get_mut(&handle) {
            Some(element) => {
                element.attached = false;
                std::mem::take(&mut element.children)
            }
            None => return,
        };
        for (_, child) in children {
            self.detach(child);
        }
    }

    /// Detach every child of `parent` found by `locator`
    pub fn detach_children(&mut self, parent: ElementHandle, locator: &Locator) {
        let matching: Vec<ElementHandle> = match self.elements.get_mut(&parent) {
            Some(element) => {
                let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut element.children)
                    .into_iter()
                    .partition(|(child_locator, _)| child_locator == locator);
                element.children = kept;
                gone.into_iter().map(|(_, handle)| handle).collect()
            }
            None => return,
        };
        for handle in matching {
            self.detach(handle);
        }
    }

    pub fn set_text(&mut self, handle: ElementHandle, text: &str) {
        if let Some(element) = self.elements.get_mut(&handle) {
            element.text = text.to_string();
        }
    }

    pub fn set_visible(&mut self, handle: ElementHandle, visible: bool) {
        if let Some(element) = self.elements.get_mut(&handle) {
            element.visible = visible;
        }
    }

    pub fn set_value(&mut self, handle: ElementHandle, value: &str) {
        if let Some(element) = self.elements.get_mut(&handle) {
            element.value = value.to_string();
        }
    }

    /// Give a `<select>` element its option values
    pub fn set_options(&mut self, handle: ElementHandle, options: &[&str]) {
        if let Some(element) = self.elements.get_mut(&handle) {
            element.options = options.iter().map(|o| o.to_string()).collect();
        }
    }

    pub fn on_click(
        &mut self,
        handle: ElementHandle,
        hook: impl FnMut(&mut FakeDom) + Send + 'static,
    ) {
        self.click_hooks.insert(handle, Box::new(hook));
    }

    pub fn on_select(
        &mut self,
        handle: ElementHandle,
        hook: impl FnMut(&mut FakeDom, &str) + Send + 'static,
    ) {
        self.select_hooks.insert(handle, Box::new(hook));
    }

    pub fn text(&self, handle: ElementHandle) -> Option<&str> {
        self.elements.get(&handle).map(|element| element.text.as_str())
    }

    /// Current value of an input or select element
    pub fn value(&self, handle: ElementHandle) -> Option<&str> {
        self.elements.get(&handle).map(|element| element.value.as_str())
    }

    pub fn journal(&self) -> &[Interaction] {
        &self.journal
    }

    fn live(&self, handle: ElementHandle) -> Result<&FakeElement, SessionError> {
        match self.elements.get(&handle) {
            Some(element) if element.attached => Ok(element),
            _ => Err(SessionError::StaleElement(handle.to_string())),
        }
    }

    fn live_mut(&mut self, handle: ElementHandle) -> Result<&mut FakeElement, SessionError> {
        match self.elements.get_mut(&handle) {
            Some(element) if element.attached => Ok(element),
            _ => Err(SessionError::StaleElement(handle.to_string())),
        }
    }

    fn matching_roots(&self, locator: &Locator) -> Vec<ElementHandle> {
        self.roots
            .iter()
            .filter(|(candidate, handle)| {
                candidate == locator
                    && self
                        .elements
                        .get(handle)
                        .map(|element| element.attached)
                        .unwrap_or(false)
            })
            .map(|(_, handle)| *handle)
            .collect()
    }
}

/// A [`BrowserSession`] over a [`FakeDom`]
#[derive(Default)]
pub struct FakeSession {
    dom: Mutex<FakeDom>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the page state
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        f(&mut self.dom.lock())
    }

    pub fn journal(&self) -> Vec<Interaction> {
        self.dom.lock().journal.clone()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn find_element(&self, locator: &Locator) -> Result<ElementHandle, SessionError> {
        self.dom
            .lock()
            .matching_roots(locator)
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::ElementNotFound(locator.to_string()))
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        Ok(self.dom.lock().matching_roots(locator))
    }

    async fn find_elements_within(
        &self,
        parent: ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        let dom = self.dom.lock();
        let element = dom.live(parent)?;
        Ok(element
            .children
            .iter()
            .filter(|(candidate, _)| candidate == locator)
            .map(|(_, handle)| *handle)
            .collect())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), SessionError> {
        let mut dom = self.dom.lock();
        let label = dom.live(element)?.label.clone();
        dom.journal.push(Interaction::Click(label));
        if let Some(mut hook) = dom.click_hooks.remove(&element) {
            hook(&mut *dom);
            dom.click_hooks.entry(element).or_insert(hook);
        }
        Ok(())
    }

    async fn clear(&self, element: ElementHandle) -> Result<(), SessionError> {
        let mut dom = self.dom.lock();
        let target = dom.live_mut(element)?;
        target.value.clear();
        let label = target.label.clone();
        dom.journal.push(Interaction::Clear(label));
        Ok(())
    }

    async fn type_text(&self, element: ElementHandle, text: &str) -> Result<(), SessionError> {
        let mut dom = self.dom.lock();
        let target = dom.live_mut(element)?;
        target.value.push_str(text);
        let label = target.label.clone();
        dom.journal.push(Interaction::Type {
            label,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String, SessionError> {
        let mut dom = self.dom.lock();
        let target = dom.live(element)?;
        let (label, text) = (target.label.clone(), target.text.clone());
        dom.journal.push(Interaction::Read(label));
        Ok(text)
    }

    async fn select_option(
        &self,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), SessionError> {
        let mut dom = self.dom.lock();
        let target = dom.live_mut(element)?;
        if !target.options.iter().any(|option| option == value) {
            return Err(SessionError::ElementNotFound(format!(
                "option '{}' in {}",
                value, element
            )));
        }
        target.value = value.to_string();
        let label = target.label.clone();
        dom.journal.push(Interaction::Select {
            label,
            value: value.to_string(),
        });
        if let Some(mut hook) = dom.select_hooks.remove(&element) {
            hook(&mut *dom, value);
            dom.select_hooks.entry(element).or_insert(hook);
        }
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError> {
        let dom = self.dom.lock();
        Ok(dom
            .matching_roots(locator)
            .first()
            .and_then(|handle| dom.elements.get(handle))
            .map(|element| element.visible)
            .unwrap_or(false))
    }

    async fn is_stale(&self, element: ElementHandle) -> Result<bool, SessionError> {
        Ok(self.dom.lock().live(element).is_err())
    }
}
