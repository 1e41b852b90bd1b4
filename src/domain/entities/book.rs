//! # Book Aggregate
//!
//! The [`Book`] aggregate facade and its accessor port [`BookState`].
//!
//! The facade exposes business operations only. Every field access goes
//! through the port, which is implemented outside the domain by the
//! persistence layer. A state implementation may load fields lazily, track
//! writes, or hit the store on every call; the facade cannot tell the
//! difference.
//!
//! # Fields
//!
//! | Field | Kind |
//! |---|---|
//! | `title` | core |
//! | `author` | core |
//! | `content` | deferred (expensive) |
//!
//! # Examples
//!
//! ```ignore
//! use aggregate_repository::prelude::*;
//!
//! let mut book = repo.load(&AggregateKey::parse("B1")?).await?;
//! let text = book.read().await?;
//! book.record_reading(Timestamp::now()).await?;
//! repo.save(&mut book).await?;
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{AggregateKey, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Accessor port through which a [`Book`] reads and writes its state.
///
/// Implementations live outside the domain. Reads may fetch from a backing
/// store; writes may be buffered or applied immediately.
#[async_trait]
pub trait BookState: Send {
    /// Error raised by the accessors.
    type Error: From<DomainError> + Send;

    /// Identity of the book.
    fn key(&self) -> &AggregateKey;

    /// Reads the title.
    async fn title(&mut self) -> Result<String, Self::Error>;

    /// Writes the title.
    async fn set_title(&mut self, title: String) -> Result<(), Self::Error>;

    /// Reads the author.
    async fn author(&mut self) -> Result<String, Self::Error>;

    /// Reads the content.
    async fn content(&mut self) -> Result<String, Self::Error>;

    /// Writes the content.
    async fn set_content(&mut self, content: String) -> Result<(), Self::Error>;
}

/// Book aggregate facade.
///
/// # Invariants
///
/// - Title is never empty and at most [`MAX_TITLE_LEN`] characters
/// - Every value observed reflects the latest write made through this
///   instance, whether or not it has been persisted
#[derive(Debug)]
pub struct Book<S> {
    state: S,
}

impl<S: BookState> Book<S> {
    /// Wraps a state implementation.
    pub(crate) fn from_state(state: S) -> Self {
        Self { state }
    }

    pub(crate) fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Returns the identity of this book.
    #[must_use]
    pub fn key(&self) -> &AggregateKey {
        self.state.key()
    }

    /// Returns the title.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn title(&mut self) -> Result<String, S::Error> {
        self.state.title().await
    }

    /// Returns `"<title> by <author>"`.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn byline(&mut self) -> Result<String, S::Error> {
        let title = self.state.title().await?;
        let author = self.state.author().await?;
        Ok(format!("{title} by {author}"))
    }

    /// Reads the book's content.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn read(&mut self) -> Result<String, S::Error> {
        self.state.content().await
    }

    /// Counts the whitespace-separated words of the content.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn word_count(&mut self) -> Result<usize, S::Error> {
        Ok(self.state.content().await?.split_whitespace().count())
    }

    /// Appends a reading note to the content.
    ///
    /// The content becomes `"<content>: read at <at>"`.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn record_reading(&mut self, at: Timestamp) -> Result<(), S::Error> {
        let content = self.state.content().await?;
        self.state
            .set_content(format!("{content}: read at {at}"))
            .await
    }

    /// Replaces the content.
    ///
    /// # Errors
    ///
    /// Propagates state access failures.
    pub async fn revise(&mut self, content: impl Into<String> + Send) -> Result<(), S::Error> {
        self.state.set_content(content.into()).await
    }

    /// Changes the title.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` (converted into the state's
    /// error) if the title is blank or too long.
    pub async fn retitle(&mut self, title: impl Into<String> + Send) -> Result<(), S::Error> {
        let title = validate_title(title.into())?;
        self.state.set_title(title).await
    }
}

/// Validated data for a book that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    title: String,
    author: String,
    content: String,
}

impl NewBook {
    /// Creates a draft.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` if the title is blank or too
    /// long, or the author is blank.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> DomainResult<Self> {
        let title = validate_title(title.into())?;
        let author = author.into();
        if author.trim().is_empty() {
            return Err(DomainError::validation("author must not be blank"));
        }
        Ok(Self {
            title,
            author,
            content: content.into(),
        })
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the author.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

fn validate_title(title: String) -> DomainResult<String> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title must not be blank"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Plain in-memory state that counts accessor calls.
    #[derive(Debug)]
    struct PlainState {
        key: AggregateKey,
        title: String,
        author: String,
        content: String,
        content_reads: usize,
    }

    impl PlainState {
        fn new() -> Self {
            Self {
                key: AggregateKey::parse("B1").unwrap(),
                title: "Go".to_string(),
                author: "Ann".to_string(),
                content: "chapter text".to_string(),
                content_reads: 0,
            }
        }
    }

    #[async_trait]
    impl BookState for PlainState {
        type Error = DomainError;

        fn key(&self) -> &AggregateKey {
            &self.key
        }

        async fn title(&mut self) -> Result<String, Self::Error> {
            Ok(self.title.clone())
        }

        async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
            self.title = title;
            Ok(())
        }

        async fn author(&mut self) -> Result<String, Self::Error> {
            Ok(self.author.clone())
        }

        async fn content(&mut self) -> Result<String, Self::Error> {
            self.content_reads += 1;
            Ok(self.content.clone())
        }

        async fn set_content(&mut self, content: String) -> Result<(), Self::Error> {
            self.content = content;
            Ok(())
        }
    }

    #[tokio::test]
    async fn byline_combines_title_and_author() {
        let mut book = Book::from_state(PlainState::new());
        assert_eq!(book.byline().await.unwrap(), "Go by Ann");
    }

    #[tokio::test]
    async fn record_reading_appends_note() {
        let mut book = Book::from_state(PlainState::new());
        let at = Timestamp::from_millis(1704067200000).unwrap();

        book.record_reading(at).await.unwrap();

        assert_eq!(
            book.read().await.unwrap(),
            "chapter text: read at 2024-01-01T00:00:00.000Z"
        );
    }

    #[tokio::test]
    async fn word_count_reads_content() {
        let mut book = Book::from_state(PlainState::new());
        assert_eq!(book.word_count().await.unwrap(), 2);
        assert_eq!(book.state_mut().content_reads, 1);
    }

    #[tokio::test]
    async fn retitle_rejects_blank_title() {
        let mut book = Book::from_state(PlainState::new());

        let err = book.retitle("   ").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
        assert_eq!(book.title().await.unwrap(), "Go");
    }

    #[tokio::test]
    async fn retitle_rejects_long_title() {
        let mut book = Book::from_state(PlainState::new());
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(book.retitle(long).await.is_err());
    }

    #[tokio::test]
    async fn retitle_updates_title() {
        let mut book = Book::from_state(PlainState::new());
        book.retitle("Go, Second Edition").await.unwrap();
        assert_eq!(book.title().await.unwrap(), "Go, Second Edition");
    }

    #[test]
    fn new_book_validates() {
        assert!(NewBook::new("", "Ann", "x").is_err());
        assert!(NewBook::new("Go", " ", "x").is_err());

        let draft = NewBook::new("Go", "Ann", "chapter text").unwrap();
        assert_eq!(draft.title(), "Go");
        assert_eq!(draft.author(), "Ann");
        assert_eq!(draft.content(), "chapter text");
    }
}
