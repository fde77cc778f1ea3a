use std::collections::HashMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, trace};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::{
    config::{LoadFromEnv, RequestConfig, RequestEnv, SchedulingEnv},
    error::{CmuApiError, Result},
    requests::RequestClient,
    semester::Semester,
};

pub const SCHEDULING_BASE_URL: &str = "https://apis.scottylabs.org";

const DEPARTMENTS_LIMIT: u32 = 100;
const COURSES_LIMIT: u32 = 1000;
// Requests in flight while collecting every department's courses.
const DEPARTMENT_FANOUT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Whatever else upstream sends along.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a department id, found {other}"
        ))),
    }
}

/// Lookup for [`SchedulingClient::course`]: either a five digit course id, or
/// a department plus course number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseQuery {
    pub course_id: Option<u32>,
    pub department: Option<u32>,
    pub course_number: Option<u32>,
}

impl CourseQuery {
    pub fn by_id(course_id: u32) -> Self {
        Self {
            course_id: Some(course_id),
            ..Self::default()
        }
    }

    pub fn by_number(department: u32, course_number: u32) -> Self {
        Self {
            department: Some(department),
            course_number: Some(course_number),
            ..Self::default()
        }
    }
}

/// Client for the ScottyLabs scheduling API.
pub struct SchedulingClient {
    app_id: String,
    app_secret_key: String,
    base_url: String,
    request_client: RequestClient,
    /// Valid department ids per semester, filled on first use.
    valid_departments: HashMap<Semester, Vec<u32>>,
}

impl SchedulingClient {
    pub fn new(app_id: impl Into<String>, app_secret_key: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        let app_secret_key = app_secret_key.into();
        if app_id.is_empty() || app_secret_key.is_empty() {
            return Err(CmuApiError::Config(
                "using the scheduling API requires an app ID and an app secret key".to_string(),
            ));
        }
        Ok(Self {
            app_id,
            app_secret_key,
            base_url: SCHEDULING_BASE_URL.to_string(),
            request_client: RequestClient::new()?,
            valid_departments: HashMap::new(),
        })
    }

    /// Reads `SCOTTYLABS_APP_ID` and `SCOTTYLABS_APP_SECRET_KEY`, plus the
    /// optional `CMUAPI_TIMEOUT_SECS` and `CMUAPI_USER_AGENT`.
    pub fn from_env() -> Result<Self> {
        Self::with_env(SchedulingEnv::load_from_env()?, RequestEnv::load_from_env()?)
    }

    pub fn with_env(scheduling: SchedulingEnv, request: RequestEnv) -> Result<Self> {
        let request_client = RequestClient::with_config(&RequestConfig::from(request))?;
        Ok(Self::new(
            scheduling.scottylabs_app_id.unwrap_or_default(),
            scheduling.scottylabs_app_secret_key.unwrap_or_default(),
        )?
        .with_request_client(request_client))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_client(mut self, request_client: RequestClient) -> Self {
        self.request_client = request_client;
        self
    }

    /// The cached department ids for `semester`, if they have been fetched.
    pub fn cached_departments(&self, semester: &Semester) -> Option<&[u32]> {
        self.valid_departments.get(semester).map(Vec::as_slice)
    }

    fn build_url(&self, path: &str, limit: Option<u32>, page: Option<u32>) -> Result<Url> {
        let raw = format!("{}/v1/schedule{}", self.base_url, path);
        let mut url = Url::parse(&raw)
            .map_err(|e| CmuApiError::Config(format!("invalid scheduling url {raw}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("app_id", &self.app_id)
                .append_pair("app_secret_key", &self.app_secret_key);
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(page) = page {
                query.append_pair("page", &page.to_string());
            }
        }
        Ok(url)
    }

    /// Makes a GET request against the scheduling API.
    ///
    /// HTTP-level problems never fail: a non-200 response yields its JSON
    /// body, or `{"error": "<code>: <reason>"}` when there is none. A 200 with
    /// an unparseable body yields `None`. Only transport failures are errors.
    pub async fn request(
        &self,
        path: &str,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Result<Option<Value>> {
        let url = self.build_url(path, limit, page)?;
        debug!("GET /v1/schedule{path} (limit={limit:?}, page={page:?})");
        let response = self.request_client.fetch_url_response(url.as_str()).await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(decode_body(status, &body))
    }

    pub async fn departments(&self, semester: &Semester) -> Result<Vec<Department>> {
        let body = self
            .request(
                &format!("/{semester}/departments/"),
                Some(DEPARTMENTS_LIMIT),
                None,
            )
            .await?;
        let departments = body
            .and_then(|mut body| body.get_mut("departments").map(Value::take))
            .ok_or(CmuApiError::MissingKey("departments"))?;
        serde_json::from_value(departments)
            .map_err(|e| CmuApiError::Parse(format!("malformed departments list: {e}")))
    }

    async fn department_ids(&mut self, semester: &Semester) -> Result<&[u32]> {
        if !self.valid_departments.contains_key(semester) {
            let ids: Vec<u32> = self
                .departments(semester)
                .await?
                .into_iter()
                .filter_map(|department| match department.id.trim().parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        trace!("Skipping non-numeric department id {:?}", department.id);
                        None
                    }
                })
                .collect();
            debug!("Cached {} departments for {semester}", ids.len());
            self.valid_departments.insert(*semester, ids);
        }
        Ok(self
            .valid_departments
            .get(semester)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    async fn validate_department(&mut self, semester: &Semester, department: u32) -> Result<()> {
        if self.department_ids(semester).await?.contains(&department) {
            Ok(())
        } else {
            Err(CmuApiError::Validation(format!(
                "{department} is not a valid department for semester {semester}"
            )))
        }
    }

    async fn fetch_courses(&self, semester: &Semester, department: u32) -> Result<Option<Vec<Value>>> {
        let body = self
            .request(
                &format!("/{semester}/departments/{department:02}/courses"),
                Some(COURSES_LIMIT),
                None,
            )
            .await?;
        Ok(take_array(body, "courses"))
    }

    /// Courses offered by one department, or `None` when the response has
    /// no `courses` field.
    pub async fn courses(
        &mut self,
        semester: &Semester,
        department: u32,
    ) -> Result<Option<Vec<Value>>> {
        self.validate_department(semester, department).await?;
        self.fetch_courses(semester, department).await
    }

    /// Every course of the semester, department by department in cached order.
    pub async fn all_courses(&mut self, semester: &Semester) -> Result<Vec<Value>> {
        let departments = self.department_ids(semester).await?.to_vec();
        let this = &*self;
        let per_department: Vec<Option<Vec<Value>>> = stream::iter(departments)
            .map(move |department| this.fetch_courses(semester, department))
            .buffered(DEPARTMENT_FANOUT)
            .try_collect()
            .await?;
        Ok(per_department.into_iter().flatten().flatten().collect())
    }

    pub async fn course(&mut self, semester: &Semester, query: &CourseQuery) -> Result<Option<Value>> {
        let path = match *query {
            CourseQuery {
                course_id: Some(id),
                ..
            } if id <= 99_999 => format!("/{semester}/courses/{id:05}"),
            CourseQuery {
                department: Some(department),
                course_number: Some(number),
                ..
            } => {
                if number > 999 {
                    return Err(CmuApiError::Validation(format!(
                        "{number} is not a three digit course number"
                    )));
                }
                self.validate_department(semester, department).await?;
                format!("/{semester}/departments/{department:02}/courses/{number:03}")
            }
            _ => {
                return Err(CmuApiError::Argument(
                    "must provide either a five-digit course ID or a department number and a course number"
                        .to_string(),
                ));
            }
        };
        let body = self.request(&path, None, None).await?;
        Ok(body.and_then(|mut body| body.get_mut("course").map(Value::take)))
    }
}

fn take_array(body: Option<Value>, key: &str) -> Option<Vec<Value>> {
    match body?.get_mut(key).map(Value::take)? {
        Value::Array(items) => Some(items),
        Value::Null => None,
        other => Some(vec![other]),
    }
}

fn decode_body(status: StatusCode, body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Some(value),
        Err(_) if status == StatusCode::OK => None,
        Err(_) => Some(json!({
            "error": format!(
                "{}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
        })),
    }
}
