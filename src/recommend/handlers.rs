use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, warn};

use super::error::ApiError;
use super::types::*;
use crate::db::DbError;
use crate::server::AppState;
use crate::util::normalize;

pub async fn ping() -> Json<Ping> {
    Json(Ping {
        say: "PING".to_string(),
    })
}

pub async fn recommend(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recommendation>, ApiError> {
    let id = parse_movie_id(&id)?;
    let movie = state.movies.get_movie(id).await?;

    let text = normalize(movie.overview.as_deref().unwrap_or_default());
    let query_vec = state.embedder.embed(&text).await?;
    if query_vec.len() != state.embedder.dimension() {
        return Err(ApiError::Encoding(format!(
            "expected a {}-dimensional vector, model returned {}",
            state.embedder.dimension(),
            query_vec.len()
        )));
    }

    let genre = if state.config.recommend.filter_by_genre {
        movie.genres.as_deref()
    } else {
        None
    };
    let hits = state
        .movies
        .find_similar(id, genre, &query_vec, state.config.recommend.limit)
        .await?;

    let mut similar = Vec::with_capacity(hits.len());
    for hit in hits {
        match state.movies.get_movie(hit.id).await {
            Ok(m) => {
                debug!(id = hit.id, score = hit.score, "Similar movie");
                similar.push(MovieInfo::from(m));
            }
            Err(DbError::NotFound(_)) => {
                warn!(id = hit.id, "Similar movie disappeared, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(Recommendation {
        movie: MovieInfo::from(movie),
        similar,
    }))
}

fn parse_movie_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::Validation(format!("movie id must be an integer, got {:?}", raw)))
}
