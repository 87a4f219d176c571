mod cache;
mod common;
mod import;
