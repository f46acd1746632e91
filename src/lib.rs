pub mod asset_cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod file_manager;
pub mod html_parser;
pub mod mirror;
pub mod rewriter;
pub mod site;
pub mod sitemap;
pub mod url_set;

// Re-export main types for convenience
pub use asset_cache::{AssetCache, AssetPaths, DownloadOutcome};
pub use cli::MirrorCommand;
pub use config::MirrorConfig;
pub use document::{AttrMap, AttrValue, PageDocument, ScriptDescriptor};
pub use error::MirrorError;
pub use fetcher::{Fetcher, Probe};
pub use file_manager::FileManager;
pub use html_parser::HtmlParser;
pub use mirror::{MirrorReport, WebsiteMirror};
pub use rewriter::Rewriter;
pub use site::Site;
pub use url_set::{UrlSetBuilder, VariantRule};
