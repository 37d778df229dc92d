pub mod constants;
pub mod string_utils;

pub use constants::*;
pub use string_utils::{slugify, unique_slug};
