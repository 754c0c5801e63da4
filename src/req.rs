use std::collections::HashMap;

use reqwest::{
    header::{HeaderMap, CONTENT_TYPE, LINK, LOCATION},
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    api::Problem,
    config::Config,
    error::{Error, Result},
};

const REPLAY_NONCE: &str = "replay-nonce";

/// Thin wrapper over a configured `reqwest` client.
///
/// Every response is decoded into a [`Response`] before it leaves this module.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(HttpClient { client })
    }

    pub(crate) async fn get(&self, url: &str) -> Result<Response> {
        log::trace!("GET {url}");
        let res = self.client.get(url).send().await?;
        Ok(Response::read(res).await)
    }

    pub(crate) async fn head(&self, url: &str) -> Result<Response> {
        log::trace!("HEAD {url}");
        let res = self.client.head(url).send().await?;
        Ok(Response::read(res).await)
    }

    pub(crate) async fn post_jose(&self, url: &str, body: String) -> Result<Response> {
        log::trace!("POST {url} {body}");
        let res = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/jose+json")
            .body(body)
            .send()
            .await?;
        Ok(Response::read(res).await)
    }
}

/// A fully read HTTP response with the headers ACME cares about pulled out.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub(crate) status: StatusCode,
    pub(crate) nonce: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) links: HashMap<String, String>,
    pub(crate) content_type: Option<String>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    async fn read(res: reqwest::Response) -> Self {
        let status = res.status();
        let headers = res.headers();

        let nonce = header_str(headers, REPLAY_NONCE);
        let location = header_str(headers, LOCATION.as_str());
        let content_type = header_str(headers, CONTENT_TYPE.as_str());
        let links = parse_links(
            headers
                .get_all(LINK)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );

        // letsencrypt sometimes closes the TLS abruptly causing io error
        // even though we did capture the body.
        let body = res
            .bytes()
            .await
            .map(|body| body.to_vec())
            .unwrap_or_default();

        log::debug!("Response status: {status}");

        Response {
            status,
            nonce,
            location,
            links,
            content_type,
            body,
        }
    }

    /// Passes success responses through and turns everything else into [`Error::Protocol`].
    pub(crate) fn into_result(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        Err(Error::Protocol {
            status: self.status.as_u16(),
            problem: self.problem(),
        })
    }

    /// Interprets the body as a problem document.
    pub(crate) fn problem(&self) -> Problem {
        let body = String::from_utf8_lossy(&self.body);

        let is_problem_json = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/problem+json"));

        if is_problem_json {
            // if we were sent a problem+json, deserialize it
            serde_json::from_slice(&self.body).unwrap_or_else(|err| Problem {
                _type: "problemJsonFail".to_owned(),
                detail: Some(format!(
                    "Failed to deserialize application/problem+json ({err}) body: {body}"
                )),
                status: Some(self.status.as_u16()),
                subproblems: None,
            })
        } else {
            // some other problem
            Problem {
                _type: "httpReqError".to_owned(),
                detail: Some(format!("{} body: {body}", self.status)),
                status: Some(self.status.as_u16()),
                subproblems: None,
            }
        }
    }

    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            Error::MalformedResponse(format!(
                "{err} in body: {}",
                String::from_utf8_lossy(&self.body)
            ))
        })
    }

    pub(crate) fn expect_location(&self) -> Result<String> {
        self.location
            .clone()
            .ok_or_else(|| Error::MalformedResponse("missing Location header".to_owned()))
    }

    pub(crate) fn link(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(String::as_str)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Builds a relation to URL map from `Link` header values.
///
/// Each value may hold several comma separated `<url>; rel="name"` entries. For repeated relation
/// names the last entry wins.
pub(crate) fn parse_links<'a>(values: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    let mut links = HashMap::new();

    for value in values {
        for entry in split_link_entries(value) {
            let Some((url, params)) = parse_link_entry(entry) else {
                continue;
            };

            for rel in params {
                links.insert(rel.to_owned(), url.to_owned());
            }
        }
    }

    links
}

/// Splits on commas that are not inside `<...>`.
fn split_link_entries(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_url = false;
    let mut start = 0;

    for (idx, ch) in value.char_indices() {
        match ch {
            '<' => in_url = true,
            '>' => in_url = false,
            ',' if !in_url => {
                entries.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    entries.push(&value[start..]);

    entries
}

/// Returns the URL and every relation name of one link entry.
fn parse_link_entry(entry: &str) -> Option<(&str, Vec<&str>)> {
    let entry = entry.trim();
    let rest = entry.strip_prefix('<')?;
    let (url, params) = rest.split_once('>')?;

    let rels = params
        .split(';')
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("rel") {
                return None;
            }
            Some(value.trim().trim_matches('"'))
        })
        // rel="a b" declares two relations
        .flat_map(|rels| rels.split_whitespace())
        .collect();

    Some((url.trim(), rels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_link() {
        let links = parse_links([r#"<https://example.com/acme/terms>;rel="terms-of-service""#]);
        assert_eq!(
            links.get("terms-of-service").map(String::as_str),
            Some("https://example.com/acme/terms")
        );
    }

    #[test]
    fn test_parse_comma_separated_links() {
        let links = parse_links([
            r#"<https://example.com/acme/directory>;rel="index", <https://example.com/acme/cert/1/alt>; rel=alternate; title="alt""#,
        ]);
        assert_eq!(links.len(), 2);
        assert_eq!(links["index"], "https://example.com/acme/directory");
        assert_eq!(links["alternate"], "https://example.com/acme/cert/1/alt");
    }

    #[test]
    fn test_last_duplicate_relation_wins() {
        let links = parse_links([
            r#"<https://example.com/up/1>;rel="up""#,
            r#"<https://example.com/up/2>;rel="up", <https://example.com/up/3>;rel="up""#,
        ]);
        assert_eq!(links["up"], "https://example.com/up/3");
    }

    #[test]
    fn test_comma_inside_url_is_kept() {
        let links = parse_links([r#"<https://example.com/a,b>;rel="next""#]);
        assert_eq!(links["next"], "https://example.com/a,b");
    }

    #[test]
    fn test_garbage_entries_are_skipped() {
        let links = parse_links(["nonsense", r#"<https://example.com/x>;title="no rel""#, ""]);
        assert!(links.is_empty());
    }

    fn response(status: u16, content_type: Option<&str>, body: &str) -> Response {
        Response {
            status: StatusCode::from_u16(status).unwrap(),
            nonce: None,
            location: None,
            links: HashMap::new(),
            content_type: content_type.map(ToOwned::to_owned),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_problem_json_is_surfaced_verbatim() {
        let res = response(
            429,
            Some("application/problem+json"),
            r#"{"type":"urn:ietf:params:acme:error:rateLimited","detail":"slow down :: really","status":429}"#,
        );

        match res.into_result() {
            Err(Error::Protocol { status, problem }) => {
                assert_eq!(status, 429);
                assert_eq!(problem.detail.as_deref(), Some("slow down :: really"));
                assert!(problem.is_rate_limited());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_non_problem_error_body() {
        let res = response(502, Some("text/html"), "<h1>bad gateway</h1>");
        let problem = res.problem();
        assert_eq!(problem._type, "httpReqError");
        assert_eq!(problem.status, Some(502));
        assert!(problem.detail.unwrap().contains("bad gateway"));
    }

    #[test]
    fn test_malformed_json_body() {
        let res = response(200, Some("application/json"), "{not json");
        let err = res.json::<crate::api::Order>().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
