mod collection;
mod cursor;
mod database;
mod error;
mod event;
mod options;
mod path;
mod result;
mod update;
mod validate;

pub use collection::Collection;
pub use cursor::Cursor;
pub use database::{Database, Registry};
pub use error::DbError;
pub use event::{Event, Store};
pub use options::{FindOptions, RemoveOptions, UpdateOptions};
pub use result::UpdateResult;
pub use vellum_query::{
    Fields, Matcher, Projection, Selector, Sort, SortDirection, SortSpec,
};
