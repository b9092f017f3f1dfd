use async_trait::async_trait;

use super::model::*;

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn get_movie(&self, id: i64) -> DbResult<Movie>;

    /// Rank stored overview vectors against `query_vec` by dot product.
    ///
    /// `exclude_id` never appears in the result. With `genre` set, only
    /// movies whose genres column equals it are candidates. Movies without
    /// a usable vector are skipped. At most `limit` hits, best first.
    async fn find_similar(
        &self,
        exclude_id: i64,
        genre: Option<&str>,
        query_vec: &[f32],
        limit: usize,
    ) -> DbResult<Vec<SimilarMovie>>;

    async fn upsert_movie(&self, movie: &Movie, vector: Option<&[f32]>) -> DbResult<()>;
}
