//! # Domain Entities
//!
//! Aggregate facades and the accessor ports they persist through.
//!
//! - [`Book`]: book aggregate with a lazily loaded `content` field

pub mod book;

pub use book::{Book, BookState, MAX_TITLE_LEN, NewBook};
