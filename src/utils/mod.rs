pub mod db_utils;
pub mod korean_keyboard;
pub mod phone;
pub mod time;
pub mod username_cache;
pub mod username_filter;
pub mod verification_store;
