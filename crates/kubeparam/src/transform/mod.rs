//! Pure string/map/list transforms. These back the template filters and are
//! usable directly from Rust.

pub mod codec;
pub mod naming;
pub mod structure;
pub mod text;

pub use codec::{decode64, encode64, parse_json, parse_yaml, sha256, to_json, to_yaml};
pub use naming::{dns_safe, env_safe, key_safe};
pub use structure::{deflate, inflate, merge, typify, TypifyParser, DEFAULT_DELIMITER};
pub use text::{indent, nindent, re_contains, re_replace, stringify};
