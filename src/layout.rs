/// CSS selectors and markers describing the journal site's pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub listing_row: String,
    pub listing_title_cell: String,
    pub listing_link: String,
    pub listing_date_cell: String,

    pub entry_content: String,
    pub entry_title: String,
    /// DOM property of the title control holding the title text.
    pub entry_title_property: String,

    /// Global loading overlay; the page is ready once its class list is exactly
    /// `loader_done_classes`.
    pub loader: String,
    pub loader_done_classes: Vec<String>,

    pub login_path: String,
    pub login_email: String,
    pub login_password: String,
    pub login_submit: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            listing_row: ".entries-list__item".to_owned(),
            listing_title_cell: ".title.item__cell".to_owned(),
            listing_link: "a".to_owned(),
            listing_date_cell: ".date.item__cell".to_owned(),
            entry_content: ".cke_inner".to_owned(),
            entry_title: ".h1".to_owned(),
            entry_title_property: "value".to_owned(),
            loader: ".global-loader__wrap".to_owned(),
            loader_done_classes: vec!["global-loader__wrap".to_owned(), "ng-hide".to_owned()],
            login_path: "/app/login".to_owned(),
            login_email: "input[type=\"email\"]".to_owned(),
            login_password: "input[type=\"password\"]".to_owned(),
            login_submit: "button[type=\"submit\"]".to_owned(),
        }
    }
}

impl PageLayout {
    pub fn is_loader_done(&self, class_attribute: &str) -> bool {
        let mut actual = class_attribute.split_whitespace().collect::<Vec<_>>();
        actual.sort_unstable();
        actual.dedup();

        let mut expected = self
            .loader_done_classes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        expected.sort_unstable();
        expected.dedup();

        actual == expected
    }
}
