use once_cell::sync::Lazy;
use std::env;

/// Base address of the backend service. Also the address handed to the
/// external authorization flow: opening the root starts the OAuth dance.
pub static BACKEND_ROOT: Lazy<String> = Lazy::new(|| {
    let raw = env::var("BOOKSTALL_BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    raw.trim_end_matches('/').to_string()
});
