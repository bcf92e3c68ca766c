//! Book catalog rules: listing filters and create/update validation.

use perpus_api_types::BookStatus;

use super::error::DomainError;

/// Language stored when a new book does not name one.
pub const DEFAULT_LANGUAGE: &str = "Unknown";

const REQUIRED_FIELDS_MESSAGE: &str =
    "Title, author, description, genre, and a PDF file are required.";
const INVALID_STATUS_MESSAGE: &str = "Invalid status provided.";

/// Columns a listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Author,
    Description,
    Genre,
    Status,
    Language,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Parse the wire name (`title`, `createdAt`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "description" => Some(Self::Description),
            "genre" => Some(Self::Genre),
            "status" => Some(Self::Status),
            "language" => Some(Self::Language),
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Description => "description",
            Self::Genre => "genre",
            Self::Status => "status",
            Self::Language => "language",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Validated listing request.
///
/// Without an explicit sort the newest books come first. A limit of zero yields an empty page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookListQuery {
    pub sort: Option<(SortField, SortOrder)>,
    pub genre: Option<String>,
    pub status: Option<BookStatus>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

impl BookListQuery {
    /// Build a query from raw string parameters, rejecting unknown values.
    pub fn parse(
        sort: Option<&str>,
        order: Option<&str>,
        genre: Option<&str>,
        status: Option<&str>,
        search: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Self, DomainError> {
        let order = match non_blank(order) {
            Some(value) => SortOrder::parse(value).ok_or_else(|| {
                DomainError::validation(format!("Invalid order `{value}`; use asc or desc."))
            })?,
            None => SortOrder::default(),
        };

        let sort = match non_blank(sort) {
            Some(value) => {
                let field = SortField::parse(value).ok_or_else(|| {
                    DomainError::validation(format!("Cannot sort by `{value}`."))
                })?;
                Some((field, order))
            }
            None => None,
        };

        let status = match non_blank(status) {
            Some(value) => Some(
                BookStatus::parse(value)
                    .ok_or_else(|| DomainError::validation(INVALID_STATUS_MESSAGE))?,
            ),
            None => None,
        };

        let limit = non_blank(limit)
            .map(|value| {
                value
                    .parse::<u32>()
                    .map_err(|_| DomainError::validation(format!("Invalid limit `{value}`.")))
            })
            .transpose()?;

        Ok(Self {
            sort,
            genre: non_blank(genre).map(str::to_string),
            status,
            search: non_blank(search).map(str::to_string),
            limit,
        })
    }
}

/// Text fields of a create or update form. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub language: Option<String>,
}

impl BookFields {
    /// Record one named form value; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "author" => &mut self.author,
            "description" => &mut self.description,
            "genre" => &mut self.genre,
            "status" => &mut self.status,
            "language" => &mut self.language,
            _ => return,
        };
        let trimmed = value.trim();
        *slot = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// Check a create form before any attachment is written.
    pub fn check_create(&self, has_pdf: bool) -> Result<(), DomainError> {
        if self.title.is_none()
            || self.author.is_none()
            || self.description.is_none()
            || self.genre.is_none()
            || !has_pdf
        {
            return Err(DomainError::validation(REQUIRED_FIELDS_MESSAGE));
        }
        self.parsed_status().map(|_| ())
    }

    /// Check an update form before any attachment is written.
    pub fn check_update(&self) -> Result<(), DomainError> {
        self.parsed_status().map(|_| ())
    }

    pub fn into_new_book(
        self,
        pdf_path: Option<String>,
        cover_path: Option<String>,
    ) -> Result<NewBook, DomainError> {
        let status = self.parsed_status()?.unwrap_or_default();
        let Self {
            title: Some(title),
            author: Some(author),
            description: Some(description),
            genre: Some(genre),
            language,
            ..
        } = self
        else {
            return Err(DomainError::validation(REQUIRED_FIELDS_MESSAGE));
        };
        let pdf_path = pdf_path.ok_or_else(|| DomainError::validation(REQUIRED_FIELDS_MESSAGE))?;

        Ok(NewBook {
            title,
            author,
            description,
            genre,
            status,
            language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            pdf_path,
            cover_path,
        })
    }

    pub fn into_changes(
        self,
        pdf_path: Option<String>,
        cover_path: Option<String>,
    ) -> Result<BookChanges, DomainError> {
        let status = self.parsed_status()?;
        Ok(BookChanges {
            title: self.title,
            author: self.author,
            description: self.description,
            genre: self.genre,
            status,
            language: self.language,
            pdf_path,
            cover_path,
        })
    }

    fn parsed_status(&self) -> Result<Option<BookStatus>, DomainError> {
        match self.status.as_deref() {
            Some(value) => BookStatus::parse(value)
                .map(Some)
                .ok_or_else(|| DomainError::validation(INVALID_STATUS_MESSAGE)),
            None => Ok(None),
        }
    }
}

/// Fully validated book ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: String,
    pub status: BookStatus,
    pub language: String,
    pub pdf_path: String,
    pub cover_path: Option<String>,
}

/// Partial update; `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: Option<BookStatus>,
    pub language: Option<String>,
    pub pdf_path: Option<String>,
    pub cover_path: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
