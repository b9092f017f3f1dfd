use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
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

/// One hit of a similarity search, in rank order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarMovie {
    pub id: i64,
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;
