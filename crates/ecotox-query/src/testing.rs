//! Scripted stand-in for the ECOTOX search page
//!
//! [`EcotoxSite`] lays out a [`FakeSession`] the way the live page is laid
//! out under [`SearchPageLayout::default`] and answers each submit with the
//! next scripted [`SiteResponse`]. Result rows are rendered up to the current
//! page size, and changing the page size re-renders them so earlier row
//! handles go stale.

use std::collections::VecDeque;
use std::sync::Arc;

use browser_session::fake::{FakeDom, FakeSession, Interaction};
use browser_session::{BrowserSession, ElementHandle};
use parking_lot::Mutex;

use crate::layout::SearchPageLayout;

/// Rows shown before the page size is changed
pub const INITIAL_PAGE_SIZE: usize = 25;

/// The three cells of a result row the harvester reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRow {
    pub endpoint: String,
    pub duration: String,
    pub value_cell: String,
}

impl SiteRow {
    pub fn new(
        endpoint: impl Into<String>,
        duration: impl Into<String>,
        value_cell: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            duration: duration.into(),
            value_cell: value_cell.into(),
        }
    }
}

/// How the page answers one submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteResponse {
    /// Heading reads "0 results"
    Empty,

    Rows(Vec<SiteRow>),

    /// Submit never completes; the submit control stays visible
    Hang,

    /// Rows rendered with too few cells
    Truncated(Vec<SiteRow>),
}

#[derive(Default)]
struct SiteState {
    responses: VecDeque<SiteResponse>,
    rows: Vec<SiteRow>,
    truncated: bool,
    page_size: usize,
    submits: usize,
    frozen_table: bool,
}

/// Handles of the page elements tests commonly inspect
#[derive(Debug, Clone, Copy)]
pub struct SiteHandles {
    pub submit: ElementHandle,
    pub record_count: ElementHandle,
    pub results_body: ElementHandle,
    pub page_size_select: ElementHandle,
    pub chemical_input: ElementHandle,
    pub species_input: ElementHandle,
}

pub struct EcotoxSite {
    session: Arc<FakeSession>,
    state: Arc<Mutex<SiteState>>,
    handles: SiteHandles,
}

impl EcotoxSite {
    /// Page answering successive submits with `responses`; extra submits get [`SiteResponse::Empty`]
    pub fn new(responses: Vec<SiteResponse>) -> Self {
        let layout = SearchPageLayout::default();
        let session = Arc::new(FakeSession::new());
        let state = Arc::new(Mutex::new(SiteState {
            responses: responses.into(),
            page_size: INITIAL_PAGE_SIZE,
            ..SiteState::default()
        }));

        let handles = session.with_dom(|dom| build_page(dom, &layout, &state));

        Self {
            session,
            state,
            handles,
        }
    }

    pub fn session(&self) -> Arc<dyn BrowserSession> {
        self.session.clone()
    }

    pub fn fake(&self) -> &FakeSession {
        &self.session
    }

    pub fn handles(&self) -> SiteHandles {
        self.handles
    }

    pub fn journal(&self) -> Vec<Interaction> {
        self.session.journal()
    }

    /// Number of times the submit control was activated
    pub fn submits(&self) -> usize {
        self.state.lock().submits
    }

    /// Keep the rendered rows when the page size changes, so no row goes stale
    pub fn freeze_table(&self) {
        self.state.lock().frozen_table = true;
    }

    pub fn page_size(&self) -> usize {
        self.state.lock().page_size
    }

    /// Text currently typed into the chemical and species inputs
    pub fn typed_inputs(&self) -> (String, String) {
        let handles = self.handles;
        self.session.with_dom(|dom| {
            (
                dom.value(handles.chemical_input).unwrap_or_default().to_string(),
                dom.value(handles.species_input).unwrap_or_default().to_string(),
            )
        })
    }
}

fn build_page(
    dom: &mut FakeDom,
    layout: &SearchPageLayout,
    state: &Arc<Mutex<SiteState>>,
) -> SiteHandles {
    let submit = dom.insert(layout.submit_button.clone(), "submit", "Search");

    for (locator, label) in [
        (&layout.chemicals_button, "chemicals-panel"),
        (&layout.endpoints_button, "endpoints-panel"),
        (&layout.species_button, "species-panel"),
    ] {
        let button = dom.insert(locator.clone(), label, "");
        // Touching the form makes the search runnable again
        dom.on_click(button, move |dom| dom.set_visible(submit, true));
    }

    let inputs: Vec<ElementHandle> = ["chemical-input", "effects-input", "species-input"]
        .into_iter()
        .map(|label| dom.insert(layout.text_inputs.clone(), label, ""))
        .collect();

    for (locator, label) in layout
        .endpoint_labels
        .iter()
        .zip(["endpoint-lc50", "endpoint-ec50"])
    {
        dom.insert(locator.clone(), label, "");
    }

    let record_count = dom.insert(layout.record_count.clone(), "record-count", "");
    let results_body = dom.insert(layout.results_body.clone(), "results-body", "");

    let page_size_select = dom.insert(layout.page_size_select.clone(), "page-size", "");
    dom.set_options(page_size_select, &["10", "25", "50", "100"]);
    dom.set_value(page_size_select, &INITIAL_PAGE_SIZE.to_string());

    let submit_state = Arc::clone(state);
    let submit_layout = layout.clone();
    dom.on_click(submit, move |dom| {
        let mut site = submit_state.lock();
        site.submits += 1;
        let response = site.responses.pop_front().unwrap_or(SiteResponse::Empty);
        let (rows, truncated) = match response {
            SiteResponse::Hang => return,
            SiteResponse::Empty => (Vec::new(), false),
            SiteResponse::Rows(rows) => (rows, false),
            SiteResponse::Truncated(rows) => (rows, true),
        };

        dom.set_visible(submit, false);
        let heading = if rows.is_empty() {
            submit_layout.empty_record_count.clone()
        } else {
            format!("{} results", rows.len())
        };
        dom.set_text(record_count, &heading);

        site.rows = rows;
        site.truncated = truncated;
        render_rows(dom, &submit_layout, results_body, &site);
    });

    let select_state = Arc::clone(state);
    let select_layout = layout.clone();
    dom.on_select(page_size_select, move |dom, value| {
        let mut site = select_state.lock();
        site.page_size = value.parse().unwrap_or(INITIAL_PAGE_SIZE);
        if !site.frozen_table {
            render_rows(dom, &select_layout, results_body, &site);
        }
    });

    SiteHandles {
        submit,
        record_count,
        results_body,
        page_size_select,
        chemical_input: inputs[layout.chemical_input_index],
        species_input: inputs[layout.species_input_index],
    }
}

fn render_rows(dom: &mut FakeDom, layout: &SearchPageLayout, body: ElementHandle, site: &SiteState) {
    dom.detach_children(body, &layout.result_row);

    let cells = if site.truncated {
        layout.required_cells() - 1
    } else {
        layout.required_cells()
    };

    for row in site.rows.iter().take(site.page_size) {
        let tr = dom.insert_child(body, layout.result_row.clone(), "result-row", "");
        dom.alias(layout.first_result_row.clone(), tr);

        for column in 0..cells {
            let text = if column == layout.endpoint_column {
                row.endpoint.as_str()
            } else if column == layout.duration_column {
                row.duration.as_str()
            } else if column == layout.value_column {
                row.value_cell.as_str()
            } else {
                ""
            };
            dom.insert_child(tr, layout.result_cell.clone(), "result-cell", text);
        }
    }
}
