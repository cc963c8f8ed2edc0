pub mod browser;
pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod extract;
pub mod fill;
mod js;
pub mod page;
pub mod reveal;
pub mod schema;
pub mod stealth;

pub use browser::StealthBrowser;
pub use config::{BrowserBuilder, BrowserConfig};
pub use error::{Error, Result};
pub use extract::FormExtractor;
pub use fill::{FieldReason, FieldReport, FieldStatus, FillResult, FilledForm, FormFiller, FormSurface, ReadBack};
pub use js::DocumentRoot;
pub use page::Page;
pub use schema::{FieldDescriptor, FieldType, FormContext, FormDescriptor, LocatorHint, WaitStrategy};
