use serde::{Deserialize, Serialize};

use crate::db::Movie;

/// Movie fields as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieInfo {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub genres: Option<String>,
    pub overview: Option<String>,
    pub keywords: Option<String>,
    pub director: Option<String>,
    pub popularity: Option<f64>,
    pub production_companies: Option<String>,
    pub release_date: Option<String>,
}

impl From<Movie> for MovieInfo {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            title: m.title,
            original_title: m.original_title,
            genres: m.genres,
            overview: m.overview,
            keywords: m.keywords,
            director: m.director,
            popularity: m.popularity,
            production_companies: m.production_companies,
            release_date: m.release_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "Filme")]
    pub movie: MovieInfo,
    #[serde(rename = "Similares")]
    pub similar: Vec<MovieInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub say: String,
}
