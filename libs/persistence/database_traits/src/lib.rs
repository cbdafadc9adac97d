pub mod dao;

/// Row offset of 1-based `page` when pages hold `size` rows.
pub fn page_offset(page: u32, size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(size)
}
