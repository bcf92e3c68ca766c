//! Facet lists for the browsing UI filters.

use std::sync::Arc;

use crate::application::repos::{BooksRepo, RepoError};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksRepo>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BooksRepo>) -> Self {
        Self { books }
    }

    pub async fn genres(&self) -> Result<Vec<String>, RepoError> {
        self.books.distinct_genres().await
    }

    pub async fn languages(&self) -> Result<Vec<String>, RepoError> {
        self.books.distinct_languages().await
    }
}
