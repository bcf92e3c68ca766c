use async_trait::async_trait;
use perpus_api_types::BookStatus;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{BooksRepo, BooksWriteRepo, RepoError},
    domain::books::{BookChanges, BookListQuery, NewBook},
    domain::entities::BookRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const BOOK_COLUMNS: &str = "id, title, author, description, genre, status, language, \
    pdf_path, cover_path, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: String,
    description: String,
    genre: Option<String>,
    status: BookStatus,
    language: Option<String>,
    pdf_path: Option<String>,
    cover_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            description: row.description,
            genre: row.genre,
            status: row.status,
            language: row.language,
            pdf_path: row.pdf_path,
            cover_path: row.cover_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_book_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q BookListQuery) {
        if let Some(genre) = query.genre.as_ref() {
            qb.push(" AND genre = ");
            qb.push_bind(genre);
        }

        if let Some(status) = query.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }

        if let Some(search) = query.search.as_ref() {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (");
            for (index, column) in ["title", "author", "description", "genre"]
                .into_iter()
                .enumerate()
            {
                if index > 0 {
                    qb.push(" OR ");
                }
                qb.push(column);
                qb.push(" ILIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" ESCAPE '\\'");
            }
            qb.push(")");
        }
    }

    async fn distinct_column(&self, column: &'static str) -> Result<Vec<String>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT DISTINCT ");
        qb.push(column);
        qb.push(" FROM books WHERE ");
        qb.push(column);
        qb.push(" IS NOT NULL AND ");
        qb.push(column);
        qb.push(" <> '' ORDER BY ");
        qb.push(column);
        qb.push(" ASC");

        qb.build_query_scalar::<String>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

/// Escape LIKE wildcards so user input only matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn list_books(&self, query: &BookListQuery) -> Result<Vec<BookRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books WHERE 1=1");
        Self::apply_book_filter(&mut qb, query);

        match query.sort {
            Some((field, order)) => {
                qb.push(" ORDER BY ");
                qb.push(field.column());
                qb.push(" ");
                qb.push(order.as_sql());
                qb.push(", id ASC");
            }
            None => {
                qb.push(" ORDER BY created_at DESC, id DESC");
            }
        }

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<BookRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn distinct_genres(&self) -> Result<Vec<String>, RepoError> {
        self.distinct_column("genre").await
    }

    async fn distinct_languages(&self) -> Result<Vec<String>, RepoError> {
        self.distinct_column("language").await
    }

    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, RepoError> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE status = $1")
                    .bind(status)
                    .fetch_one(self.pool())
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM books")
                    .fetch_one(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}

#[async_trait]
impl BooksWriteRepo for PostgresRepositories {
    async fn create_book(&self, book: &NewBook) -> Result<BookRecord, RepoError> {
        let sql = format!(
            "INSERT INTO books (id, title, author, description, genre, status, language, pdf_path, cover_path) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {BOOK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.description)
            .bind(&book.genre)
            .bind(book.status)
            .bind(&book.language)
            .bind(&book.pdf_path)
            .bind(book.cover_path.as_deref())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_book(
        &self,
        id: Uuid,
        changes: &BookChanges,
    ) -> Result<Option<BookRecord>, RepoError> {
        let sql = format!(
            "UPDATE books SET \
                title = COALESCE($2, title), \
                author = COALESCE($3, author), \
                description = COALESCE($4, description), \
                genre = COALESCE($5, genre), \
                status = COALESCE($6, status), \
                language = COALESCE($7, language), \
                pdf_path = COALESCE($8, pdf_path), \
                cover_path = COALESCE($9, cover_path), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {BOOK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .bind(changes.title.as_deref())
            .bind(changes.author.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.genre.as_deref())
            .bind(changes.status)
            .bind(changes.language.as_deref())
            .bind(changes.pdf_path.as_deref())
            .bind(changes.cover_path.as_deref())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let sql = format!("DELETE FROM books WHERE id = $1 RETURNING {BOOK_COLUMNS}");
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }
}
