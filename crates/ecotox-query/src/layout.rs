//! Locators and table geometry of the ECOTOX search page

use browser_session::Locator;

/// Every locator and column index the protocol relies on
///
/// The defaults describe <https://cfpub.epa.gov/ecotox/search.cfm>.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPageLayout {
    pub chemicals_button: Locator,
    pub endpoints_button: Locator,
    pub species_button: Locator,

    /// All free-text inputs on the page
    pub text_inputs: Locator,
    pub chemical_input_index: usize,
    pub species_input_index: usize,

    /// Result-group checkboxes applied once per run (LC50, EC50)
    pub endpoint_labels: Vec<Locator>,

    pub submit_button: Locator,
    pub record_count: Locator,

    /// Record-count heading text when the search matched nothing
    pub empty_record_count: String,

    pub results_body: Locator,
    /// Row locator relative to the results body
    pub result_row: Locator,
    /// First rendered result row, from the document root
    pub first_result_row: Locator,
    /// Cell locator relative to a row
    pub result_cell: Locator,

    pub page_size_select: Locator,
    pub page_size: u32,

    pub endpoint_column: usize,
    pub duration_column: usize,
    pub value_column: usize,
}

impl Default for SearchPageLayout {
    fn default() -> Self {
        Self {
            chemicals_button: Locator::xpath("//div[@data-search-param='Chemicals']/button"),
            endpoints_button: Locator::xpath("//div[@data-search-param='Endpoints']/button"),
            species_button: Locator::xpath("//div[@data-search-param='Species']/button"),
            text_inputs: Locator::tag("textarea"),
            chemical_input_index: 0,
            species_input_index: 2,
            endpoint_labels: vec![
                Locator::xpath("//label[@for='cbResultsGroup12a']"),
                Locator::xpath("//label[@for='cbResultsGroup13a']"),
            ],
            submit_button: Locator::xpath("//button[@data-handler='runSearch']"),
            record_count: Locator::xpath("//h2[@id='recordCount-results']"),
            empty_record_count: "0 results".to_string(),
            results_body: Locator::xpath("//table[@id='searchResultsDataTable']/tbody"),
            result_row: Locator::xpath("./tr"),
            first_result_row: Locator::xpath("//table[@id='searchResultsDataTable']/tbody/tr"),
            result_cell: Locator::xpath("./td"),
            page_size_select: Locator::xpath("//select[@name='searchResultsDataTable_length']"),
            page_size: 100,
            endpoint_column: 15,
            duration_column: 17,
            value_column: 12,
        }
    }
}

impl SearchPageLayout {
    /// Minimum number of cells a result row must have
    pub fn required_cells(&self) -> usize {
        self.endpoint_column
            .max(self.duration_column)
            .max(self.value_column)
            + 1
    }
}
