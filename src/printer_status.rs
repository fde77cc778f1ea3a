use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, trace};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::{
    error::{CmuApiError, Result},
    requests::RequestClient,
    text_manipulators::{extract_text, normalize_nbsp, to_ascii},
};

pub const PRINTER_STATUS_URL: &str = "https://clusters.andrew.cmu.edu/printerstats/";

const USABLE: &str = "Usable?";
const LCD_MESSAGE: &str = "LCD Message";
const NO_STATUS_DATA: &str = "No printer status data found.";

/// Column label to lowercased cell value, for one printer row.
pub type RawPrinterStatus = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Caution,
    #[serde(rename = "not ready")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterStatus {
    pub status: Option<Readiness>,
    pub details: String,
}

impl PrinterStatus {
    fn unknown() -> Self {
        Self {
            status: None,
            details: NO_STATUS_DATA.to_string(),
        }
    }
}

/// Snapshot of the cluster printer dashboard, taken once at construction.
#[derive(Debug, Clone)]
pub struct PrinterStatusClient {
    raw_status: BTreeMap<String, RawPrinterStatus>,
    status: BTreeMap<String, PrinterStatus>,
}

impl PrinterStatusClient {
    pub async fn new() -> Result<Self> {
        Self::from_url(PRINTER_STATUS_URL, &RequestClient::new()?).await
    }

    pub async fn from_url(url: &str, request_client: &RequestClient) -> Result<Self> {
        debug!("GET {url}");
        let response = request_client.fetch_url_response(url).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CmuApiError::Fetch {
                url: url.to_string(),
                status,
            });
        }
        let html = response.text().await?;
        Self::from_html(&html)
    }

    pub fn from_html(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let raw_status = parse_status_table(&document)?;
        let status: BTreeMap<String, PrinterStatus> = raw_status
            .iter()
            .map(|(name, raw)| (to_ascii(name).trim().to_lowercase(), derive_status(raw)))
            .collect();
        info!("Parsed status for {} printers", status.len());
        Ok(Self { raw_status, status })
    }

    /// Status of the first printer (in name order) whose name contains every
    /// word of `name`, ignoring case.
    pub fn get_status(&self, name: &str) -> Option<&PrinterStatus> {
        let lowered = name.to_lowercase();
        let query: BTreeSet<&str> = lowered.split_whitespace().collect();
        self.status
            .iter()
            .find(|(printer, _)| {
                let tokens: BTreeSet<&str> = printer.split_whitespace().collect();
                query.is_subset(&tokens)
            })
            .map(|(_, status)| status)
    }

    pub fn get_all_statuses(&self) -> BTreeMap<String, PrinterStatus> {
        self.status.clone()
    }

    /// The table as scraped, keyed by the printer name as it appeared.
    pub fn raw_statuses(&self) -> &BTreeMap<String, RawPrinterStatus> {
        &self.raw_status
    }
}

/// Maps one raw row to a status. Rows missing either the usable flag or the
/// LCD message get the "no data" placeholder.
pub fn derive_status(raw: &RawPrinterStatus) -> PrinterStatus {
    let (Some(usable), Some(message)) = (raw.get(USABLE), raw.get(LCD_MESSAGE)) else {
        return PrinterStatus::unknown();
    };
    let status = match usable.as_str() {
        "go" => Readiness::Ready,
        "yield" => Readiness::Caution,
        _ => Readiness::NotReady,
    };
    PrinterStatus {
        status: Some(status),
        details: to_ascii(message),
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

/// Scrapes the `.epi-dataTable` table into printer name -> column -> value.
pub fn parse_status_table(document: &Html) -> Result<BTreeMap<String, RawPrinterStatus>> {
    let table = document
        .select(&sel(".epi-dataTable"))
        .next()
        .ok_or_else(|| CmuApiError::Parse("no .epi-dataTable table".to_string()))?;

    // Rows of nested tables belong to the cell holding them.
    let rows: Vec<ElementRef> = table
        .select(&sel("tr"))
        .filter(|row| enclosing_table(*row).is_some_and(|t| t.id() == table.id()))
        .collect();
    let Some((header, rows)) = rows.split_first() else {
        return Ok(BTreeMap::new());
    };

    let th_sel = sel("th");
    let labels: Vec<String> = header
        .select(&th_sel)
        .map(|th| {
            let text = extract_text(th);
            match text.trim() {
                "" => USABLE.to_string(),
                text => normalize_nbsp(text),
            }
        })
        .skip(1)
        .collect();

    let td_sel = sel("td");
    let mut status_data = BTreeMap::new();
    for row in rows {
        let values = parse_row(*row, &td_sel);
        let Some((name, cells)) = values.split_first() else {
            trace!("Skipping printer row without cells");
            continue;
        };
        let raw: RawPrinterStatus = labels.iter().cloned().zip(cells.iter().cloned()).collect();
        status_data.insert(name.clone(), raw);
    }
    Ok(status_data)
}

fn enclosing_table(row: ElementRef) -> Option<ElementRef> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "table")
}

fn parse_row(row: ElementRef, td_sel: &Selector) -> Vec<String> {
    let Some(first) = row.select(td_sel).next() else {
        return vec![];
    };
    let nested: Vec<ElementRef> = first.select(td_sel).collect();
    if nested.is_empty() {
        return row.select(td_sel).map(cell_value).collect();
    }

    // Their HTML is malformed: the printer name is loose text in the first
    // cell and the real cells are nested inside it.
    let mut data = vec![];
    let name = first
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty());
    if let Some(name) = name {
        data.push(name.replace(';', ""));
    }
    data.extend(nested.into_iter().map(cell_value));
    data
}

fn cell_value(td: ElementRef) -> String {
    let image = td
        .select(&sel("img"))
        .find_map(|img| img.value().attr("src"));
    let text = match image {
        Some(src) => file_stem(src).to_string(),
        None => normalize_nbsp(&extract_text(td)).trim().to_string(),
    };
    text.to_lowercase()
}

fn file_stem(src: &str) -> &str {
    let file = src.rsplit('/').next().unwrap_or(src);
    file.split('.').next().unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DASHBOARD: &str = r#"
        <html><body>
        <table class="epi-dataTable">
          <tr><th>Printer</th><th></th><th>LCD&nbsp;Message</th><th>Toner</th></tr>
          <tr><td>Gates 3 North</td><td><img src="/printerstats/images/go.gif"></td><td>READY</td><td>80%</td></tr>
          <tr><td>Gates 3 South</td><td><img src="yield.png"></td><td>Toner Low</td><td>5%</td></tr>
          <tr><td>Hunt Library</td><td>stop</td><td>Paper Jam &#8211; Tray&nbsp;2</td><td>50%</td></tr>
          <tr><td>Wean 5</td><td>go</td></tr>
          <tr><td>Donner;
                <table><tr><td><img src="go.png"></td><td>Caf&eacute; ready</td><td>10%</td></tr></table>
              </td></tr>
        </table>
        </body></html>"#;

    fn client() -> PrinterStatusClient {
        PrinterStatusClient::from_html(DASHBOARD).unwrap()
    }

    #[test]
    fn test_parse_header_and_rows() {
        let raw = parse_status_table(&Html::parse_document(DASHBOARD)).unwrap();
        assert_eq!(raw.len(), 5);
        let north = &raw["gates 3 north"];
        assert_eq!(north["Usable?"], "go");
        assert_eq!(north["LCD Message"], "ready");
        assert_eq!(north["Toner"], "80%");
        assert_eq!(raw["hunt library"]["LCD Message"], "paper jam \u{2013} tray 2");
    }

    #[test]
    fn test_malformed_row() {
        let raw = parse_status_table(&Html::parse_document(DASHBOARD)).unwrap();
        let donner = &raw["Donner"];
        assert_eq!(donner["Usable?"], "go");
        assert_eq!(donner["LCD Message"], "caf\u{e9} ready");
        assert_eq!(donner["Toner"], "10%");
    }

    #[test]
    fn test_derive_status() {
        let client = client();
        let statuses = client.get_all_statuses();
        assert_eq!(statuses["gates 3 north"].status, Some(Readiness::Ready));
        assert_eq!(statuses["gates 3 south"].status, Some(Readiness::Caution));
        assert_eq!(statuses["hunt library"].status, Some(Readiness::NotReady));
        assert_eq!(statuses["hunt library"].details, "paper jam  tray 2");
        assert_eq!(statuses["donner"].details, "cafe ready");
    }

    #[test]
    fn test_missing_fields_fallback() {
        let status = &client().get_all_statuses()["wean 5"];
        assert_eq!(status.status, None);
        assert_eq!(status.details, "No printer status data found.");

        let raw = RawPrinterStatus::from([("LCD Message".to_string(), "ready".to_string())]);
        assert_eq!(derive_status(&raw), PrinterStatus::unknown());
    }

    #[test]
    fn test_get_status_token_match() {
        let client = client();
        assert_eq!(
            client.get_status("Gates 3").map(|s| s.status),
            Some(Some(Readiness::Ready))
        );
        assert_eq!(
            client.get_status("south  GATES").map(|s| s.status),
            Some(Some(Readiness::Caution))
        );
        assert!(client.get_status("Gates 4").is_none());
        assert!(client.get_status("Gat").is_none());
    }

    #[test]
    fn test_all_statuses_are_a_copy() {
        let client = client();
        let mut statuses = client.get_all_statuses();
        statuses.clear();
        statuses.insert("gates 3 north".to_string(), PrinterStatus::unknown());
        assert_eq!(
            client.get_status("gates 3 north").unwrap().status,
            Some(Readiness::Ready)
        );
        assert_eq!(client.get_all_statuses().len(), 5);
    }

    #[test]
    fn test_missing_table() {
        let err = PrinterStatusClient::from_html("<p>down for maintenance</p>").unwrap_err();
        assert!(matches!(err, CmuApiError::Parse(_)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("/printerstats/images/go.gif"), "go");
        assert_eq!(file_stem("yield"), "yield");
    }

    #[test]
    fn test_readiness_serializes_like_upstream() {
        let json = serde_json::to_value(PrinterStatus {
            status: Some(Readiness::NotReady),
            details: String::new(),
        })
        .unwrap();
        assert_eq!(json["status"], "not ready");
        assert_eq!(serde_json::to_value(Readiness::Caution).unwrap(), "caution");
    }
}
