pub mod change_feed;
pub mod db_utils;
pub mod month;
pub mod print;
pub mod settings_cache;
