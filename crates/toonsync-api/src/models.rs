// Wire types for the tracker REST API
//
// Field names follow the server's snake_case JSON. Optional fields default so
// older backends that omit them still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the authenticated user (`GET auth/me/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub is_superuser: bool,
    /// Granted feature codes.
    #[serde(default)]
    pub features: Vec<String>,
}

impl Profile {
    /// Superusers implicitly hold every feature.
    pub fn has_feature(&self, code: &str) -> bool {
        self.is_superuser || self.features.iter().any(|f| f == code)
    }
}

/// A tracked webtoon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webtoon {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub chapter: u32,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_read_date: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Webtoon {
    /// Case-insensitive match against title, type, status and language.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.kind, &self.status, &self.language]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Writable fields of a [`Webtoon`] (create / full update).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebtoonPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub language: String,
    pub rating: f64,
    pub chapter: u32,
    pub link: String,
    pub status: String,
    pub last_read_date: Option<String>,
    pub comment: Option<String>,
    pub image_url: String,
}

impl From<&Webtoon> for WebtoonPayload {
    fn from(w: &Webtoon) -> Self {
        Self {
            title: w.title.clone(),
            kind: w.kind.clone(),
            language: w.language.clone(),
            rating: w.rating,
            chapter: w.chapter,
            link: w.link.clone(),
            status: w.status.clone(),
            last_read_date: w.last_read_date.clone(),
            comment: w.comment.clone(),
            image_url: w.image_url.clone(),
        }
    }
}

/// Sparse update: only the fields that are `Some` go over the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WebtoonPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl WebtoonPatch {
    pub fn chapter(chapter: u32) -> Self {
        Self {
            chapter: Some(chapter),
            ..Self::default()
        }
    }
}

/// Page-number pagination envelope. `next == None` means no more pages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Query parameters for the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search: None,
            ordering: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then(|| search.trim().to_owned());
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("page".to_owned(), self.page.to_string())];
        if let Some(ref search) = self.search {
            params.push(("search".to_owned(), search.clone()));
        }
        if let Some(ref ordering) = self.ordering {
            params.push(("ordering".to_owned(), ordering.clone()));
        }
        params
    }
}
