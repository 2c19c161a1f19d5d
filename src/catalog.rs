use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::Settings;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Why a lookup produced no record. Callers collapse all of these to the
/// missing marker; the variant only survives long enough to be logged.
#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    HttpStatus { status: StatusCode },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("malformed {field}: {value}")]
    Malformed { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub title: String,
    pub year: i32,
    pub genres: Vec<String>,
    pub rating: f64,
    pub votes: i64,
}

/// Raw lookup payload. The service reports errors in-band with
/// `"Response": "False"` and renders every field as a string, absent ones
/// as `"N/A"`.
#[derive(Debug, Deserialize)]
struct TitlePayload {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "imdbRating")]
    rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    votes: Option<String>,
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CatalogClient {
    pub fn new(http: reqwest::Client, settings: &Settings) -> Self {
        CatalogClient {
            http,
            base_url: settings.catalog_url.clone(),
            api_key: settings.catalog_api_key.clone(),
        }
    }

    /// Look a title up by its catalog digits. Any failure mode, transport
    /// through field coercion, is an error: a partial record never leaves
    /// this function.
    pub async fn lookup(&self, id: &str) -> Result<MovieRecord, LookupError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("i", format!("tt{}", id)), ("apikey", self.api_key.clone())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::HttpStatus { status });
        }

        let body = response.text().await?;
        let payload: TitlePayload = serde_json::from_str(&body)?;
        payload.into_record()
    }
}

impl TitlePayload {
    fn into_record(self) -> Result<MovieRecord, LookupError> {
        if !self.response.eq_ignore_ascii_case("true") {
            return Err(LookupError::Catalog(
                self.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }

        let title = field(self.title, "Title")?;
        let year = parse_year(&field(self.year, "Year")?)?;
        let genres = parse_genres(&field(self.genre, "Genre")?)?;
        let rating = parse_rating(&field(self.rating, "imdbRating")?)?;
        let votes = parse_votes(&field(self.votes, "imdbVotes")?)?;

        Ok(MovieRecord {
            title,
            year,
            genres,
            rating,
            votes,
        })
    }
}

fn field(value: Option<String>, name: &'static str) -> Result<String, LookupError> {
    match value {
        Some(s) if !s.is_empty() && s != "N/A" => Ok(s),
        _ => Err(LookupError::MissingField(name)),
    }
}

/// Release years come as "1998" but also as ranges like "2010–2012";
/// the first four-digit run is the release year.
fn parse_year(raw: &str) -> Result<i32, LookupError> {
    YEAR_RE
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| LookupError::Malformed {
            field: "Year",
            value: raw.to_string(),
        })
}

fn parse_genres(raw: &str) -> Result<Vec<String>, LookupError> {
    let genres: Vec<String> = raw
        .split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    if genres.is_empty() {
        return Err(LookupError::Malformed {
            field: "Genre",
            value: raw.to_string(),
        });
    }
    Ok(genres)
}

fn parse_rating(raw: &str) -> Result<f64, LookupError> {
    raw.parse().map_err(|_| LookupError::Malformed {
        field: "imdbRating",
        value: raw.to_string(),
    })
}

/// Vote counts come grouped, e.g. "110,259".
fn parse_votes(raw: &str) -> Result<i64, LookupError> {
    raw.replace(',', "")
        .parse()
        .map_err(|_| LookupError::Malformed {
            field: "imdbVotes",
            value: raw.to_string(),
        })
}

// ── Tests ──
