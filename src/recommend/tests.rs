use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{DbError, DbResult, Movie, MovieRepo, SimilarMovie, SqliteRepository};
use crate::embedding::testing::{
    EncodingFailEmbedder, LetterEmbedder, ShortVectorEmbedder, SlowEmbedder, UnavailableEmbedder,
};
use crate::embedding::Embedder;
use crate::server::{build_router, AppState};
use crate::util::normalize;

const CATALOG: &[(i64, &str, &str, &str)] = &[
    (1, "Space Voyage", "Science Fiction", "Astronauts travel through a wormhole in deep space."),
    (2, "Star Drift", "Science Fiction", "A crew drifts through deep space after their ship fails."),
    (3, "Orbit", "Drama", "Astronauts in orbit wait for rescue from space."),
    (4, "Kitchen Wars", "Comedy", "Two rival chefs compete in a cooking contest."),
    (5, "Sous Chef", "Comedy", "A young cook joins a famous kitchen."),
    (6, "Nebula", "Science Fiction", "Explorers chart a glowing nebula in deep space."),
    (7, "Café de Paris", "Romance", "Love blooms in a café on the banks of the Seine."),
    (8, "Deep Field", "Science Fiction", "A telescope finds a signal in deep space."),
];

async fn seed_catalog(repo: &SqliteRepository) {
    for &(id, title, genres, overview) in CATALOG {
        let movie = Movie {
            id,
            title: title.to_string(),
            original_title: Some(title.to_string()),
            genres: Some(genres.to_string()),
            overview: Some(overview.to_string()),
            keywords: Some(format!("[{{\"id\": {}, \"name\": \"kw\"}}]", id)),
            director: Some("Director".to_string()),
            popularity: Some(10.0 + id as f64),
            production_companies: Some("Studio A, Studio B".to_string()),
            release_date: Some("1999-12-31".to_string()),
        };
        let vector = LetterEmbedder.embed(&normalize(overview)).await.unwrap();
        repo.upsert_movie(&movie, Some(&vector[..])).await.unwrap();
    }
}

async fn catalog_repo() -> (TempDir, Arc<SqliteRepository>) {
    let dir = TempDir::new().unwrap();
    let repo = SqliteRepository::new(dir.path().join("filmes.db"), 5)
        .await
        .unwrap();
    seed_catalog(&repo).await;
    (dir, Arc::new(repo))
}

fn app(config: Config, movies: Arc<dyn MovieRepo>, embedder: Arc<dyn Embedder>) -> Router {
    build_router(AppState::new(config, movies, embedder))
}

fn default_config() -> Config {
    serde_yaml::from_str("{}").unwrap()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn similar_ids(body: &Value) -> Vec<i64> {
    body["Similares"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect()
}

/// Returns a phantom id first, as if a movie was deleted after indexing.
struct StaleIndexRepo {
    inner: Arc<SqliteRepository>,
}

#[async_trait]
impl MovieRepo for StaleIndexRepo {
    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        self.inner.get_movie(id).await
    }

    async fn find_similar(
        &self,
        exclude_id: i64,
        genre: Option<&str>,
        query_vec: &[f32],
        limit: usize,
    ) -> DbResult<Vec<SimilarMovie>> {
        let mut hits = vec![SimilarMovie { id: 999, score: 1.0 }];
        hits.extend(self.inner.find_similar(exclude_id, genre, query_vec, limit).await?);
        Ok(hits)
    }

    async fn upsert_movie(&self, movie: &Movie, vector: Option<&[f32]>) -> DbResult<()> {
        self.inner.upsert_movie(movie, vector).await
    }
}

/// Serves movie lookups but fails every similarity search.
struct BrokenSearchRepo {
    inner: Arc<SqliteRepository>,
}

#[async_trait]
impl MovieRepo for BrokenSearchRepo {
    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        self.inner.get_movie(id).await
    }

    async fn find_similar(
        &self,
        _exclude_id: i64,
        _genre: Option<&str>,
        _query_vec: &[f32],
        _limit: usize,
    ) -> DbResult<Vec<SimilarMovie>> {
        Err(DbError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn upsert_movie(&self, movie: &Movie, vector: Option<&[f32]>) -> DbResult<()> {
        self.inner.upsert_movie(movie, vector).await
    }
}

/// Only the requested movie can be read; resolving any similar movie hits a
/// closed pool.
struct BrokenLookupRepo {
    inner: Arc<SqliteRepository>,
    readable: i64,
}

#[async_trait]
impl MovieRepo for BrokenLookupRepo {
    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        if id == self.readable {
            self.inner.get_movie(id).await
        } else {
            Err(DbError::Sqlx(sqlx::Error::PoolClosed))
        }
    }

    async fn find_similar(
        &self,
        exclude_id: i64,
        genre: Option<&str>,
        query_vec: &[f32],
        limit: usize,
    ) -> DbResult<Vec<SimilarMovie>> {
        self.inner.find_similar(exclude_id, genre, query_vec, limit).await
    }

    async fn upsert_movie(&self, movie: &Movie, vector: Option<&[f32]>) -> DbResult<()> {
        self.inner.upsert_movie(movie, vector).await
    }
}

#[tokio::test]
async fn test_ping() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(app(default_config(), repo, Arc::new(LetterEmbedder)), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "say": "PING" }));
}

#[tokio::test]
async fn test_recommend() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let filme = &body["Filme"];
    assert_eq!(filme["id"], 1);
    assert_eq!(filme["title"], "Space Voyage");
    assert_eq!(filme["originalTitle"], "Space Voyage");
    assert_eq!(filme["genres"], "Science Fiction");
    assert_eq!(filme["keywords"], "[{\"id\": 1, \"name\": \"kw\"}]");
    assert_eq!(filme["popularity"], 11.0);
    assert_eq!(filme["productionCompanies"], "Studio A, Studio B");
    assert_eq!(filme["releaseDate"], "1999-12-31");

    let ids = similar_ids(&body);
    assert_eq!(ids.len(), 5);
    assert!(!ids.contains(&1));
    for entry in body["Similares"].as_array().unwrap() {
        assert!(entry["title"].is_string());
        assert!(entry["overview"].is_string());
    }
}

#[tokio::test]
async fn test_recommend_ranks_by_similarity() {
    let (_dir, repo) = catalog_repo().await;
    let movie = repo.get_movie(1).await.unwrap();
    let query_vec = LetterEmbedder
        .embed(&normalize(movie.overview.as_deref().unwrap()))
        .await
        .unwrap();
    let expected: Vec<i64> = repo
        .find_similar(1, None, &query_vec, 5)
        .await
        .unwrap()
        .iter()
        .map(|h| h.id)
        .collect();

    let (_, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(similar_ids(&body), expected);
}

#[tokio::test]
async fn test_recommend_is_deterministic() {
    let (_dir, repo) = catalog_repo().await;
    let router = app(default_config(), repo, Arc::new(LetterEmbedder));

    let (_, first) = get(router.clone(), "/recomendar/4").await;
    let (_, second) = get(router, "/recomendar/4").await;
    assert_eq!(first["Similares"], second["Similares"]);
}

#[tokio::test]
async fn test_recommend_genre_filter() {
    let (_dir, repo) = catalog_repo().await;

    let (_, unfiltered) = get(
        app(default_config(), repo.clone(), Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;
    let genres: Vec<&str> = unfiltered["Similares"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["genres"].as_str().unwrap())
        .collect();
    assert!(genres.iter().any(|g| *g != "Science Fiction"));

    let mut config = default_config();
    config.recommend.filter_by_genre = true;
    let (status, filtered) = get(app(config, repo, Arc::new(LetterEmbedder)), "/recomendar/1").await;
    assert_eq!(status, StatusCode::OK);
    let ids = similar_ids(&filtered);
    assert_eq!(ids.len(), 3);
    for id in [2, 6, 8] {
        assert!(ids.contains(&id));
    }
    for entry in filtered["Similares"].as_array().unwrap() {
        assert_eq!(entry["genres"], "Science Fiction");
    }
}

#[tokio::test]
async fn test_recommend_respects_limit() {
    let (_dir, repo) = catalog_repo().await;
    let mut config = default_config();
    config.recommend.limit = 2;
    let (_, body) = get(app(config, repo, Arc::new(LetterEmbedder)), "/recomendar/3").await;
    assert_eq!(similar_ids(&body).len(), 2);
}

#[tokio::test]
async fn test_recommend_missing_movie() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/recomendar/12345",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("12345"));
}

#[tokio::test]
async fn test_recommend_malformed_id() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/recomendar/abc",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_recommend_model_unavailable() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(UnavailableEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert!(status.is_server_error());
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("model"));
}

#[tokio::test]
async fn test_recommend_skips_vanished_movies() {
    let (_dir, repo) = catalog_repo().await;
    let stale = Arc::new(StaleIndexRepo { inner: repo });
    let (status, body) = get(
        app(default_config(), stale, Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids = similar_ids(&body);
    assert_eq!(ids.len(), 5);
    assert!(!ids.contains(&999));
}

#[tokio::test]
async fn test_recommend_without_overview() {
    let (_dir, repo) = catalog_repo().await;
    let bare = Movie {
        id: 50,
        title: "Untitled".to_string(),
        original_title: None,
        genres: None,
        overview: None,
        keywords: None,
        director: None,
        popularity: None,
        production_companies: None,
        release_date: None,
    };
    repo.upsert_movie(&bare, None).await.unwrap();

    let (status, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/recomendar/50",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Filme"]["title"], "Untitled");
    assert!(body["Filme"]["overview"].is_null());
    assert!(!similar_ids(&body).contains(&50));
}

#[tokio::test]
async fn test_unknown_route() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(LetterEmbedder)),
        "/nope",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_recommend_encoding_failure() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(EncodingFailEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("encode"));
}

#[tokio::test]
async fn test_recommend_wrong_vector_dimension() {
    let (_dir, repo) = catalog_repo().await;
    let (status, body) = get(
        app(default_config(), repo, Arc::new(ShortVectorEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("26-dimensional"));
}

#[tokio::test]
async fn test_recommend_search_failure() {
    let (_dir, repo) = catalog_repo().await;
    let broken = Arc::new(BrokenSearchRepo { inner: repo });
    let (status, body) = get(
        app(default_config(), broken, Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Query failed"));
}

#[tokio::test]
async fn test_recommend_similar_lookup_failure() {
    let (_dir, repo) = catalog_repo().await;
    let broken = Arc::new(BrokenLookupRepo {
        inner: repo,
        readable: 1,
    });
    let (status, body) = get(
        app(default_config(), broken, Arc::new(LetterEmbedder)),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Query failed"));
    assert!(body.get("Similares").is_none());
}

#[tokio::test]
async fn test_recommend_timeout() {
    let (_dir, repo) = catalog_repo().await;
    let mut config = default_config();
    config.request_timeout_secs = 1;
    let (status, body) = get(
        app(config, repo, Arc::new(SlowEmbedder(Duration::from_secs(30)))),
        "/recomendar/1",
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body, serde_json::json!({ "error": "request timed out" }));
}
