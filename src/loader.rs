//! Bulk import of movie records together with their overview vectors.
//!
//! The input is a JSON array using the same camelCase field names the API
//! returns. `genres` and `productionCompanies` may be a string or a list of
//! strings; `keywords` may be any JSON value and is stored as text.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::db::{DbError, Movie, MovieRepo};
use crate::embedding::{EmbedError, Embedder};
use crate::util::normalize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub genres: Option<TextOrList>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub keywords: Option<serde_json::Value>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub production_companies: Option<TextOrList>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    pub fn into_text(self) -> String {
        match self {
            TextOrList::Text(s) => s,
            TextOrList::List(items) => items.join(", "),
        }
    }
}

impl From<MovieRecord> for Movie {
    fn from(r: MovieRecord) -> Self {
        Movie {
            id: r.id,
            title: r.title,
            original_title: r.original_title,
            genres: r.genres.map(TextOrList::into_text),
            overview: r.overview,
            keywords: r.keywords.and_then(keywords_text),
            director: r.director,
            popularity: r.popularity,
            production_companies: r.production_companies.map(TextOrList::into_text),
            release_date: r.release_date,
        }
    }
}

fn keywords_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("Failed to parse {0}: {1}")]
    Parse(String, serde_json::Error),
    #[error("Failed to store movie {0}: {1}")]
    Database(i64, DbError),
    #[error("Failed to embed movie {0}: {1}")]
    Embedding(i64, EmbedError),
}

pub fn read_records(path: &Path) -> Result<Vec<MovieRecord>, LoadError> {
    let name = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Read(name.clone(), e))?;
    serde_json::from_str(&content).map_err(|e| LoadError::Parse(name, e))
}

/// Embed every overview and upsert the records. Returns how many were stored.
pub async fn load_movies(
    repo: &dyn MovieRepo,
    embedder: &dyn Embedder,
    records: Vec<MovieRecord>,
) -> Result<usize, LoadError> {
    let total = records.len();
    let mut stored = 0;

    for record in records {
        let movie = Movie::from(record);
        let text = normalize(movie.overview.as_deref().unwrap_or_default());
        let vector = embedder
            .embed(&text)
            .await
            .map_err(|e| LoadError::Embedding(movie.id, e))?;
        repo.upsert_movie(&movie, Some(&vector[..]))
            .await
            .map_err(|e| LoadError::Database(movie.id, e))?;

        stored += 1;
        debug!(id = movie.id, title = %movie.title, "Stored movie");
        if stored % 500 == 0 {
            info!("Loaded {}/{} movies", stored, total);
        }
    }

    info!("Loaded {} movies", stored);
    Ok(stored)
}
