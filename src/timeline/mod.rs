//! Timeline assembly: paging, ranking and viewer-relative rendering.

pub mod augment;
pub mod cursor;
pub mod feed;
pub mod rating;
