// src/cookies.rs
//! Cookies: [`Cookie`], `Set-Cookie` parsing, [`CookieJar`] and the file backed [`FileCookieJar`].

mod cookies;
mod cookie_jar;
mod file_cookie_jar;

pub use cookies::parse_set_cookie;
pub use cookies::Cookie;

pub use cookie_jar::CookieJar;
pub use file_cookie_jar::FileCookieJar;
