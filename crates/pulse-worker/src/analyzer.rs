use async_trait::async_trait;
use pulse_core::{AnalysisRequest, NewsRecord, PulseError, SectorAnalyzer, SectorReport};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    news: Vec<NewsRecord>,
    history_context: Option<&'a str>,
    allowed_sectors: Option<&'a [String]>,
}

/// Report generator reached over HTTP.
///
/// The endpoint receives the news batch as JSON and answers with the report
/// text. The text is often model output, so it is normalized before parsing.
#[derive(Clone)]
pub struct HttpAnalyzer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, PulseError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::ConfigError(format!("analyzer client: {}", e)))?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl SectorAnalyzer for HttpAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Option<SectorReport>, PulseError> {
        let body = AnalyzeRequest {
            news: request.news.iter().map(NewsRecord::from).collect(),
            history_context: request.history_context,
            allowed_sectors: request.allowed_sectors,
        };

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PulseError::ApiError(format!("analyzer request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PulseError::ApiError(format!(
                "analyzer returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| PulseError::ApiError(format!("analyzer body: {}", e)))?;

        Ok(parse_report(&text))
    }
}

/// Parse analyzer output into a report.
///
/// Tries the text as-is, then after each normalization pass in order; the
/// first candidate that parses wins. A report without sectors counts as
/// nothing usable.
pub fn parse_report(text: &str) -> Option<SectorReport> {
    for (pass, candidate) in normalization_candidates(text).iter().enumerate() {
        if let Some(report) = parse_candidate(candidate) {
            if pass > 0 {
                tracing::debug!("Analyzer output parsed after {} normalization pass(es)", pass);
            }
            return report.is_usable().then_some(report);
        }
    }
    tracing::warn!(
        "Analyzer output is not valid JSON after normalization: {}",
        text.chars().take(120).collect::<String>()
    );
    None
}

fn parse_candidate(candidate: &str) -> Option<SectorReport> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    match value {
        // Some gateways wrap the model text in a JSON string
        serde_json::Value::String(inner) => parse_report(&inner),
        serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

/// The raw text followed by the cumulative output of each pass:
/// fences stripped, cut to the outermost object, typographic quotes
/// replaced, trailing commas dropped, newlines inside strings flattened.
pub fn normalization_candidates(text: &str) -> Vec<String> {
    let mut candidates = vec![text.trim().to_string()];
    let passes: [fn(&str) -> String; 5] = [
        strip_code_fences,
        outermost_object,
        replace_typographic_quotes,
        drop_trailing_commas,
        flatten_string_newlines,
    ];
    for pass in passes {
        let next = match candidates.last() {
            Some(last) => pass(last),
            None => break,
        };
        candidates.push(next);
    }
    candidates
}

pub fn strip_code_fences(text: &str) -> String {
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };
    inner.trim().to_string()
}

pub fn outermost_object(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

pub fn replace_typographic_quotes(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}'], "\"")
}

/// Remove commas that directly precede `}` or `]`, ignoring string contents.
pub fn drop_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Replace raw line breaks inside string literals with spaces.
pub fn flatten_string_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                '\n' if !escaped => out.push(' '),
                '\r' if !escaped => {}
                _ => {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        in_string = false;
                    }
                }
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}
