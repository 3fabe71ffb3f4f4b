pub mod action;
pub mod api;
pub mod config;
pub mod descriptor;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod pages;
pub mod param;
pub mod response;
pub mod schema;
pub mod script;
pub mod snapshot;
pub mod token;
pub mod update;

pub use action::Action;
pub use descriptor::{Markup, render_component, render_page};
pub use diff::ChangeSet;
pub use dispatch::{Identity, Principal};
pub use error::{Error, Result};
pub use param::{Attachment, Json, Token};
pub use schema::{Schema, SchemaBuilder, ViewModel};
pub use script::Script;
pub use update::{UpdateRequest, update_model};
