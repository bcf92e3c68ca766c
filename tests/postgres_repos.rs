use perpus::application::repos::{BooksRepo, BooksWriteRepo, VisitorsRepo};
use perpus::domain::books::{BookListQuery, NewBook, SortField, SortOrder};
use perpus::domain::entities::BookRecord;
use perpus::infra::db::PostgresRepositories;
use perpus_api_types::BookStatus;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

fn new_book(title: &str, genre: &str, language: &str) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: "Pramoedya Ananta Toer".to_string(),
        description: format!("Deskripsi {title}"),
        genre: genre.to_string(),
        status: BookStatus::Available,
        language: language.to_string(),
        pdf_path: format!("{}.pdf", title.to_lowercase().replace(' ', "-")),
        cover_path: None,
    }
}

async fn seed(repos: &PostgresRepositories, titles: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for title in titles {
        let record = repos
            .create_book(&new_book(title, "Fiksi", "Indonesia"))
            .await
            .expect("create book");
        ids.push(record.id);
    }
    ids
}

async fn backdate(pool: &PgPool, id: Uuid, days: i32) {
    sqlx::query("UPDATE books SET created_at = now() - make_interval(days => $2) WHERE id = $1")
        .bind(id)
        .bind(days)
        .execute(pool)
        .await
        .expect("backdate book");
}

fn titles(records: &[BookRecord]) -> Vec<&str> {
    records.iter().map(|record| record.title.as_str()).collect()
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_sorts_by_whitelisted_column_in_both_directions(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed(&repos, &["Gadis Pantai", "Anak Semua Bangsa", "Bumi Manusia"]).await;

    let ascending = repos
        .list_books(&BookListQuery {
            sort: Some((SortField::Title, SortOrder::Asc)),
            ..BookListQuery::default()
        })
        .await
        .expect("list asc");
    assert_eq!(
        titles(&ascending),
        vec!["Anak Semua Bangsa", "Bumi Manusia", "Gadis Pantai"]
    );

    let descending = repos
        .list_books(&BookListQuery {
            sort: Some((SortField::Title, SortOrder::Desc)),
            ..BookListQuery::default()
        })
        .await
        .expect("list desc");
    assert_eq!(
        titles(&descending),
        vec!["Gadis Pantai", "Bumi Manusia", "Anak Semua Bangsa"]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_defaults_to_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ids = seed(&repos, &["Lama", "Tengah", "Baru"]).await;
    backdate(&pool, ids[0], 3).await;
    backdate(&pool, ids[1], 2).await;
    backdate(&pool, ids[2], 1).await;

    let books = repos
        .list_books(&BookListQuery::default())
        .await
        .expect("list");

    assert_eq!(titles(&books), vec!["Baru", "Tengah", "Lama"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn search_is_case_insensitive_and_treats_wildcards_literally(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed(&repos, &["Diskon 100% Hari Ini", "Diskon 1000 Buku", "snake_case", "snakeXcase"]).await;

    let percent = repos
        .list_books(&BookListQuery {
            search: Some("100%".to_string()),
            ..BookListQuery::default()
        })
        .await
        .expect("search percent");
    assert_eq!(titles(&percent), vec!["Diskon 100% Hari Ini"]);

    let underscore = repos
        .list_books(&BookListQuery {
            search: Some("SNAKE_".to_string()),
            ..BookListQuery::default()
        })
        .await
        .expect("search underscore");
    assert_eq!(titles(&underscore), vec!["snake_case"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_applies_limit_after_sorting(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed(&repos, &["C", "A", "D", "B"]).await;

    let page = repos
        .list_books(&BookListQuery {
            sort: Some((SortField::Title, SortOrder::Asc)),
            limit: Some(2),
            ..BookListQuery::default()
        })
        .await
        .expect("limited list");
    assert_eq!(titles(&page), vec!["A", "B"]);

    let empty = repos
        .list_books(&BookListQuery {
            limit: Some(0),
            ..BookListQuery::default()
        })
        .await
        .expect("zero limit");
    assert!(empty.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn facets_skip_empty_and_missing_values(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    repos
        .create_book(&new_book("Laskar Pelangi", "Fiksi", "Indonesia"))
        .await
        .expect("create");
    repos
        .create_book(&new_book("Sapiens", "Sejarah", "English"))
        .await
        .expect("create");
    repos
        .create_book(&new_book("Negeri 5 Menara", "Fiksi", ""))
        .await
        .expect("create");
    repos
        .create_book(&new_book("Tanpa Genre", "", "Indonesia"))
        .await
        .expect("create");
    sqlx::query(
        "INSERT INTO books (id, title, author, description, genre, language) \
         VALUES ($1, 'Null Genre', 'Anon', 'x', NULL, NULL)",
    )
    .bind(Uuid::new_v4())
    .execute(&pool)
    .await
    .expect("insert nulls");

    let genres = repos.distinct_genres().await.expect("genres");
    assert_eq!(genres, vec!["Fiksi".to_string(), "Sejarah".to_string()]);

    let languages = repos.distinct_languages().await.expect("languages");
    assert_eq!(
        languages,
        vec!["English".to_string(), "Indonesia".to_string()]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_visits_on_one_day_share_a_row(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let today = OffsetDateTime::now_utc().date();
    let yesterday = today - Duration::days(1);

    repos.record_visit(today).await.expect("visit");
    repos.record_visit(today).await.expect("visit");
    repos.record_visit(yesterday).await.expect("visit");

    let recent = repos.list_recent(30).await.expect("recent");
    let days: Vec<_> = recent.iter().map(|day| (day.date, day.count)).collect();
    assert_eq!(days, vec![(today, 2), (yesterday, 1)]);
    assert_eq!(repos.total_visits().await.expect("total"), 3);
}
