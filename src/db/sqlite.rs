use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::model::*;
use super::repo::*;
use crate::util::{decode_vector, dot, encode_vector};

const MOVIE_COLUMNS: &str = "id, title, original_title, genres, overview, keywords, director, \
     popularity, production_companies, release_date";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(db_path: impl AsRef<Path>, max_connections: u32) -> DbResult<Self> {
        let db_path = db_path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path.display());

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        let query = format!("SELECT {} FROM movies WHERE id = ?", MOVIE_COLUMNS);
        sqlx::query_as::<_, Movie>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::NotFound(format!("Movie not found: {}", id)),
                _ => DbError::Sqlx(e),
            })
    }

    async fn find_similar(
        &self,
        exclude_id: i64,
        genre: Option<&str>,
        query_vec: &[f32],
        limit: usize,
    ) -> DbResult<Vec<SimilarMovie>> {
        let mut query = "SELECT id, overview_vector FROM movies WHERE id <> ?".to_string();
        if genre.is_some() {
            query.push_str(" AND genres = ?");
        }

        let mut q = sqlx::query_as::<_, (i64, Option<Vec<u8>>)>(&query).bind(exclude_id);
        if let Some(genre) = genre {
            q = q.bind(genre);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut hits = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (id, blob) in rows {
            let vector = match blob.as_deref().and_then(decode_vector) {
                Some(v) if v.len() == query_vec.len() => v,
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            let score = dot(&vector, query_vec);
            if !score.is_finite() {
                skipped += 1;
                continue;
            }
            hits.push(SimilarMovie { id, score });
        }

        if skipped > 0 && hits.is_empty() {
            warn!(
                skipped = skipped,
                dimension = query_vec.len(),
                "No stored overview vector matches the query vector"
            );
        } else if skipped > 0 {
            debug!(
                skipped = skipped,
                exclude_id = exclude_id,
                "Skipped movies without a usable overview vector"
            );
        }

        // Ties are broken by id so identical data always ranks identically.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);

        Ok(hits)
    }

    async fn upsert_movie(&self, movie: &Movie, vector: Option<&[f32]>) -> DbResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO movies
            (id, title, original_title, genres, overview, keywords, director, popularity,
             production_companies, release_date, overview_vector)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.original_title)
        .bind(&movie.genres)
        .bind(&movie.overview)
        .bind(&movie.keywords)
        .bind(&movie.director)
        .bind(movie.popularity)
        .bind(&movie.production_companies)
        .bind(&movie.release_date)
        .bind(vector.map(encode_vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
