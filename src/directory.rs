use std::{collections::BTreeMap, sync::LazyLock};

use log::{debug, trace};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{CmuApiError, Result},
    requests::RequestClient,
    text_manipulators::{collapse_whitespace, extract_text},
};

pub const DIRECTORY_BASE_URL: &str = "http://directory.andrew.cmu.edu";
const SEARCH_PATH: &str = "/search/basic/results";
const SEARCH_FIELD: &str = "search[generic_search_terms]";
// Heading shown instead of a profile when several people match.
const MULTIPLE_MATCHES: &str = "people matched your search criteria";

static ANDREW_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{1,7}$").unwrap());

/// Field name to value, e.g. `Email` to `jdoe@andrew.cmu.edu`.
pub type Person = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryInfo {
    /// Andrew ID lookup; `None` when nobody has that id.
    Person(Option<Person>),
    People(Vec<Person>),
}

pub fn valid_andrew_id(andrew_id: &str) -> bool {
    ANDREW_ID.is_match(andrew_id)
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

pub struct DirectoryClient {
    search_url: String,
    request_client: RequestClient,
}

impl DirectoryClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            search_url: format!("{DIRECTORY_BASE_URL}{SEARCH_PATH}"),
            request_client: RequestClient::new()?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.search_url = format!("{}{SEARCH_PATH}", base_url.trim_end_matches('/'));
        self
    }

    pub fn with_request_client(mut self, request_client: RequestClient) -> Self {
        self.request_client = request_client;
        self
    }

    /// Submits the basic search form and returns the results page.
    pub async fn search(&self, query: &str) -> Result<Html> {
        let response = self
            .request_client
            .post_form(&self.search_url, &[(SEARCH_FIELD, query)])
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CmuApiError::Fetch {
                url: self.search_url.clone(),
                status,
            });
        }
        let html = response.text().await?;
        Ok(Html::parse_document(&html))
    }

    /// Looks someone up by Andrew ID if one is given, otherwise runs a free
    /// text query.
    pub async fn get_info(
        &self,
        query: Option<&str>,
        andrew_id: Option<&str>,
    ) -> Result<DirectoryInfo> {
        match (andrew_id, query) {
            (Some(andrew_id), _) => self.person(andrew_id).await.map(DirectoryInfo::Person),
            (None, Some(query)) => self.search_people(query).await.map(DirectoryInfo::People),
            (None, None) => Err(CmuApiError::Argument(
                "must provide either a search query or a valid Andrew ID".to_string(),
            )),
        }
    }

    pub async fn person(&self, andrew_id: &str) -> Result<Option<Person>> {
        if !valid_andrew_id(andrew_id) {
            return Err(CmuApiError::Validation(format!(
                "{andrew_id:?} is not a valid Andrew ID"
            )));
        }
        debug!("Looking up Andrew ID {andrew_id}");
        let document = self.search(andrew_id).await?;
        parse_person(&document)
    }

    pub async fn search_people(&self, query: &str) -> Result<Vec<Person>> {
        debug!("Searching the directory for {query:?}");
        let document = self.search(query).await?;
        parse_people(&document)
    }
}

fn has_no_results(document: &Html) -> bool {
    document.select(&sel("#no_results_error")).next().is_some()
}

fn search_results(document: &Html) -> Result<ElementRef<'_>> {
    document
        .select(&sel("#search_results"))
        .next()
        .ok_or_else(|| CmuApiError::Parse("no #search_results element".to_string()))
}

/// Parses a single-person profile page.
pub fn parse_person(document: &Html) -> Result<Option<Person>> {
    if has_no_results(document) {
        return Ok(None);
    }
    let results = search_results(document)?;
    let name_line = results
        .select(&sel("h1"))
        .next()
        .map(|h1| extract_text(h1).trim().to_string())
        .ok_or_else(|| CmuApiError::Parse("no name heading in #search_results".to_string()))?;
    if name_line.contains(MULTIPLE_MATCHES) {
        return Err(CmuApiError::NotUnique(collapse_whitespace(&name_line)));
    }

    let mut person = Person::new();
    let mut name_toks: Vec<&str> = name_line.split_whitespace().collect();
    let Some(last) = name_toks.last().copied() else {
        return Err(CmuApiError::Parse("empty name heading".to_string()));
    };
    if last.contains('(') {
        let affiliation = last.trim_start_matches('(').trim_end_matches(')');
        person.insert("Affiliation".to_string(), affiliation.to_string());
        name_toks.pop();
    }
    person.insert("Name".to_string(), name_toks.join(" "));

    let line_sel = sel("div");
    for section in results.select(&sel(".directory_section")) {
        let lines: Vec<ElementRef> = section.select(&line_sel).collect();
        let lines = if lines.len() == 1 { vec![section] } else { lines };
        for line in lines {
            match parse_info_line(line) {
                Some((key, value)) => {
                    person.insert(key, value);
                }
                None => trace!("Skipping directory line without a field label"),
            }
        }
    }

    Ok(Some(person))
}

fn parse_info_line(line: ElementRef) -> Option<(String, String)> {
    let label = line.select(&sel(".directory_field")).next()?;
    let label = extract_text(label);
    let label = label.trim();
    let key = label.strip_suffix(':').unwrap_or(label).trim().to_string();
    let text = extract_text(line);
    let value = text.split_once(':').map_or("", |(_, value)| value);
    Some((key, collapse_whitespace(value)))
}

/// Parses a results table, one record per body row.
pub fn parse_people(document: &Html) -> Result<Vec<Person>> {
    if has_no_results(document) {
        return Ok(vec![]);
    }
    let results = search_results(document)?;
    let tr_sel = sel("tr");
    let mut rows = results.select(&tr_sel);
    // A query matching exactly one person lands on that person's profile.
    let Some(header) = rows.next() else {
        return Ok(parse_person(document)?.into_iter().collect());
    };

    let div_sel = sel("div");
    let column_labels: Vec<String> = header
        .select(&sel("th"))
        .map(|th| {
            let label = th.select(&div_sel).last().unwrap_or(th);
            extract_text(label).trim().to_string()
        })
        .collect();

    let td_sel = sel("td");
    let people = rows
        .map(|row| {
            column_labels
                .iter()
                .cloned()
                .zip(row.select(&td_sel).map(|td| extract_text(td).trim().to_string()))
                .collect::<Person>()
        })
        .collect();
    Ok(people)
}
