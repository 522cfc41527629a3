//! Google Trends HTTP client.
//!
//! Every data request is a two-step exchange: an `explore` call returns widget
//! descriptors (request body + token), then the widget endpoint returns the data.
//! Both answers carry an anti-JSON-hijacking prefix (`)]}'`) that is stripped
//! before parsing.

use super::frame::{RelatedQueries, RelatedQuery, TimeSeriesTable};
use super::timeframe::Timeframe;
use super::TrendsSource;
use crate::cookies::{parse_cookie_header, Cookie};
use crate::error::{MonitorError, OptionExt, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Google Trends base URL
pub const DEFAULT_TRENDS_URL: &str = "https://trends.google.com";

/// Browser user agent; the API rejects obvious bots
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

const EXPLORE_PATH: &str = "/trends/api/explore";
const INTEREST_OVER_TIME_PATH: &str = "/trends/api/widgetdata/multiline";
const RELATED_QUERIES_PATH: &str = "/trends/api/widgetdata/relatedsearches";

/// Client settings
#[derive(Debug, Clone)]
pub struct TrendsClientOptions {
    /// Host language
    pub hl: String,
    /// Timezone offset in minutes (300 = US-EST)
    pub tz: i32,
    /// Region for interest over time (`US`, `US-AL`, ... or empty for worldwide)
    pub iot_geo: String,
    /// Region for related queries
    pub related_geo: String,
    /// Category id, 0 = everything
    pub category: u32,
    /// Google property: "" (web), images, news, youtube, froogle
    pub property: String,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Custom base URL
    pub base_url: Option<String>,
    /// Cookies to seed the session with
    pub cookies: Vec<Cookie>,
}

impl Default for TrendsClientOptions {
    fn default() -> Self {
        Self {
            hl: "en-US".to_string(),
            tz: 300,
            iot_geo: "US".to_string(),
            related_geo: String::new(),
            category: 0,
            property: String::new(),
            proxy: None,
            base_url: None,
            cookies: Vec::new(),
        }
    }
}

/// Client for the unofficial Google Trends API
pub struct TrendsClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    options: TrendsClientOptions,
}

impl TrendsClient {
    pub fn new(options: TrendsClientOptions) -> Result<Self> {
        let base = options
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_TRENDS_URL)
            .trim_end_matches('/');
        let base_url = Url::parse(base)
            .map_err(|e| MonitorError::Config(format!("Invalid base URL '{}': {}", base, e)))?;

        let jar = Arc::new(Jar::default());
        for cookie in &options.cookies {
            let header = format!(
                "{}={}; Domain={}; Path=/",
                cookie.name, cookie.value, cookie.domain
            );
            jar.add_cookie_str(&header, &base_url);
        }
        if !options.cookies.is_empty() {
            info!(count = options.cookies.len(), "Seeded Trends session with stored cookies");
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(25))
            .cookie_provider(Arc::clone(&jar));

        if let Some(proxy_url) = options.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                MonitorError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            jar,
            base_url,
            options,
        })
    }

    /// Cookies the session currently sends to Google Trends.
    pub fn session_cookies(&self) -> Vec<Cookie> {
        let domain = self.base_url.host_str().unwrap_or_default();
        self.jar
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .map(|header| parse_cookie_header(&header, domain))
            .unwrap_or_default()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MonitorError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    /// Visit the landing page so Google hands out the `NID` session cookie.
    async fn refresh_session(&self) -> Result<()> {
        let region = self.options.hl.rsplit('-').next().unwrap_or("US");
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("geo", region);

        let response = self.client.get(url).send().await?;
        debug!(status = response.status().as_u16(), "Trends session refreshed");
        Ok(())
    }

    /// Request widget descriptors for a single keyword.
    async fn explore(
        &self,
        keyword: &str,
        timeframe: &Timeframe,
        geo: &str,
    ) -> Result<Vec<Widget>> {
        let req = build_explore_request(
            keyword,
            timeframe,
            geo,
            self.options.category,
            &self.options.property,
        );
        let url = self.endpoint(EXPLORE_PATH)?;
        let tz = self.options.tz.to_string();
        let req = req.to_string();

        debug!(keyword, timeframe = %timeframe, geo, "Requesting explore widgets");

        let response = self
            .client
            .post(url)
            .query(&[
                ("hl", self.options.hl.as_str()),
                ("tz", tz.as_str()),
                ("req", req.as_str()),
            ])
            .send()
            .await?;

        let body = read_body(response).await?;
        parse_explore(&body)
    }

    /// Fetch a widget's data payload.
    async fn widget_data(&self, path: &str, widget: &Widget) -> Result<String> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("req", widget.request.to_string()),
                ("token", widget.token.clone()),
                ("tz", self.options.tz.to_string()),
            ])
            .send()
            .await?;

        read_body(response).await
    }
}

#[async_trait]
impl TrendsSource for TrendsClient {
    async fn interest_over_time(
        &self,
        keyword: &str,
        timeframe: &Timeframe,
    ) -> Result<TimeSeriesTable> {
        self.refresh_session().await?;
        let widgets = self.explore(keyword, timeframe, &self.options.iot_geo).await?;
        let widget = widgets
            .iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_parse("explore response has no TIMESERIES widget")?;

        let body = self.widget_data(INTEREST_OVER_TIME_PATH, widget).await?;
        let table = parse_interest_over_time(keyword, &body)?;
        info!(keyword, rows = table.len(), "Fetched interest over time");
        Ok(table)
    }

    async fn related_queries(
        &self,
        keyword: &str,
        timeframe: &Timeframe,
    ) -> Result<RelatedQueries> {
        self.refresh_session().await?;
        let widgets = self
            .explore(keyword, timeframe, &self.options.related_geo)
            .await?;
        let widget = widgets
            .iter()
            .find(|w| w.id.starts_with("RELATED_QUERIES"))
            .ok_or_parse("explore response has no RELATED_QUERIES widget")?;

        let body = self.widget_data(RELATED_QUERIES_PATH, widget).await?;
        let queries = parse_related_queries(&body)?;
        info!(
            keyword,
            top = queries.top.as_ref().map_or(0, Vec::len),
            rising = queries.rising.as_ref().map_or(0, Vec::len),
            "Fetched related queries"
        );
        Ok(queries)
    }
}

/// Check the status and return the body text.
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("Google Trends answered 429 Too Many Requests");
        return Err(MonitorError::RateLimited(60));
    }
    if !status.is_success() {
        return Err(MonitorError::Api {
            code: status.as_u16() as i32,
            message: format!("Google Trends error: {}", status),
        });
    }
    Ok(response.text().await?)
}

/// Build the `req` payload for the explore endpoint.
fn build_explore_request(
    keyword: &str,
    timeframe: &Timeframe,
    geo: &str,
    category: u32,
    property: &str,
) -> serde_json::Value {
    serde_json::json!({
        "comparisonItem": [
            { "keyword": keyword, "time": timeframe.as_str(), "geo": geo }
        ],
        "category": category,
        "property": property,
    })
}

/// Drop the `)]}'` / `)]}',` guard in front of the JSON payload.
fn strip_json_guard(body: &str) -> &str {
    let trimmed = body.trim_start();
    match trimmed.find(['{', '[']) {
        Some(start) if trimmed.starts_with(")]}'") => &trimmed[start..],
        _ => trimmed,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

fn parse_explore(body: &str) -> Result<Vec<Widget>> {
    let response: ExploreResponse = serde_json::from_str(strip_json_guard(body))
        .map_err(|e| MonitorError::Parse(format!("Failed to parse explore response: {}", e)))?;
    Ok(response.widgets)
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: MultilineData,
}

#[derive(Debug, Deserialize)]
struct MultilineData {
    #[serde(rename = "timelineData", default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    time: String,
    #[serde(default)]
    value: Vec<u32>,
}

/// Parse a `multiline` payload into a single-keyword table.
///
/// The `isPartial` flag on the trailing point is ignored.
fn parse_interest_over_time(keyword: &str, body: &str) -> Result<TimeSeriesTable> {
    let response: MultilineResponse = serde_json::from_str(strip_json_guard(body))
        .map_err(|e| MonitorError::Parse(format!("Failed to parse interest over time: {}", e)))?;

    let mut points = Vec::with_capacity(response.default.timeline_data.len());
    for point in response.default.timeline_data {
        let secs: i64 = point
            .time
            .parse()
            .map_err(|_| {
                MonitorError::Parse(format!("Invalid timeline timestamp '{}'", point.time))
            })?;
        let time: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
            .ok_or_parse("timeline timestamp out of range")?;
        if let Some(value) = point.value.first() {
            points.push((time, *value));
        }
    }

    Ok(TimeSeriesTable::from_points(keyword, points))
}

#[derive(Debug, Deserialize)]
struct RelatedSearchesResponse {
    default: RelatedSearchesData,
}

#[derive(Debug, Deserialize)]
struct RelatedSearchesData {
    #[serde(rename = "rankedList", default)]
    ranked_list: Vec<RankedList>,
}

#[derive(Debug, Deserialize)]
struct RankedList {
    #[serde(rename = "rankedKeyword", default)]
    ranked_keyword: Vec<RankedKeyword>,
}

#[derive(Debug, Deserialize)]
struct RankedKeyword {
    query: String,
    value: i64,
}

/// Parse a `relatedsearches` payload. List 0 is `top`, list 1 is `rising`;
/// a missing or empty list leaves that side absent.
fn parse_related_queries(body: &str) -> Result<RelatedQueries> {
    let response: RelatedSearchesResponse = serde_json::from_str(strip_json_guard(body))
        .map_err(|e| MonitorError::Parse(format!("Failed to parse related queries: {}", e)))?;

    let mut lists = response.default.ranked_list.into_iter().map(|list| {
        let rows: Vec<RelatedQuery> = list
            .ranked_keyword
            .into_iter()
            .map(|k| RelatedQuery {
                query: k.query,
                value: k.value,
            })
            .collect();
        (!rows.is_empty()).then_some(rows)
    });

    Ok(RelatedQueries {
        top: lists.next().flatten(),
        rising: lists.next().flatten(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPLORE_BODY: &str = r#")]}'
{"widgets":[{"request":{"time":"2024-10-13 2025-10-13","resolution":"WEEK","comparisonItem":[{"geo":{"country":"US"},"complexKeywordsRestriction":{"keyword":[{"type":"BROAD","value":"boho dress"}]}}]},"token":"APP6_TOKEN_TS","id":"TIMESERIES","type":"fe_line_chart","title":"Interest over time"},{"request":{"restriction":{"complexKeywordsRestriction":{"keyword":[{"type":"BROAD","value":"boho dress"}]}}},"token":"APP6_TOKEN_RQ","id":"RELATED_QUERIES","type":"fe_related_searches"}]}"#;

    const MULTILINE_BODY: &str = r#")]}',
{"default":{"timelineData":[{"time":"1728777600","formattedTime":"Oct 13 - 19, 2024","value":[54],"hasData":[true],"formattedValue":["54"]},{"time":"1729382400","formattedTime":"Oct 20 - 26, 2024","value":[61],"hasData":[true],"formattedValue":["61"],"isPartial":true}],"averages":[]}}"#;

    const RELATED_BODY: &str = r#")]}',
{"default":{"rankedList":[{"rankedKeyword":[{"query":"boho maxi dress","value":100,"formattedValue":"100","hasData":true},{"query":"white boho dress","value":38,"formattedValue":"38","hasData":true}]},{"rankedKeyword":[{"query":"boho wedding dress","value":250,"formattedValue":"+250%","hasData":true}]}]}}"#;

    #[test]
    fn test_strip_json_guard() {
        assert_eq!(strip_json_guard(")]}',\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_guard(")]}'\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_guard("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_explore_widgets() {
        let widgets = parse_explore(EXPLORE_BODY).expect("explore parses");
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].id, "TIMESERIES");
        assert_eq!(widgets[0].token, "APP6_TOKEN_TS");
        assert!(widgets[1].id.starts_with("RELATED_QUERIES"));
    }

    #[test]
    fn test_parse_interest_over_time() {
        let table =
            parse_interest_over_time("boho dress", MULTILINE_BODY).expect("multiline parses");
        assert_eq!(table.columns(), ["boho dress"]);
        let values: Vec<_> = table.rows().map(|(_, v)| v[0]).collect();
        assert_eq!(values, vec![Some(54), Some(61)]);
        assert!(table.is_date_index());
    }

    #[test]
    fn test_parse_empty_timeline() {
        let body = r#")]}',{"default":{"timelineData":[],"averages":[]}}"#;
        let table = parse_interest_over_time("nothing", body).expect("empty parses");
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_related_queries() {
        let queries = parse_related_queries(RELATED_BODY).expect("related parses");
        let top = queries.top.expect("top present");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].query, "boho maxi dress");
        let rising = queries.rising.expect("rising present");
        assert_eq!(rising[0].value, 250);
    }

    #[test]
    fn test_parse_related_queries_empty_lists() {
        let body = r#")]}',{"default":{"rankedList":[{"rankedKeyword":[]},{"rankedKeyword":[]}]}}"#;
        let queries = parse_related_queries(body).expect("empty lists parse");
        assert!(queries.top.is_none());
        assert!(queries.rising.is_none());
    }

    #[test]
    fn test_seeded_cookies_are_sent() {
        let options = TrendsClientOptions {
            cookies: vec![Cookie {
                name: "NID".to_string(),
                value: "511=abc".to_string(),
                domain: "trends.google.com".to_string(),
                path: "/".to_string(),
                secure: true,
                http_only: true,
                expires: None,
            }],
            ..Default::default()
        };
        let client = TrendsClient::new(options).expect("client builds");
        let cookies = client.session_cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "NID");
        assert_eq!(cookies[0].value, "511=abc");
    }

    #[test]
    fn test_explore_request_payload() {
        let tf = Timeframe::parse("today 3-m").expect("timeframe");
        let req = build_explore_request("linen pants", &tf, "US", 0, "");
        assert_eq!(req["comparisonItem"][0]["keyword"], "linen pants");
        assert_eq!(req["comparisonItem"][0]["time"], "today 3-m");
        assert_eq!(req["comparisonItem"][0]["geo"], "US");
        assert_eq!(req["category"], 0);
    }
}
