//! Fixed-size pagination over an already-ordered list.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub items:        Vec<T>,
  /// 1-based.
  pub current_page: usize,
  pub total_pages:  usize,
  pub total:        usize,
}

impl<T> Page<T> {
  /// Cut page `page` (1-based; 0 is treated as 1) of `size` items out of
  /// `all`.
  pub fn slice(all: Vec<T>, page: usize, size: usize) -> Self {
    let current_page = page.max(1);
    let total = all.len();
    let total_pages = total.div_ceil(size.max(1));
    let skip = (current_page - 1).saturating_mul(size);
    let items = all.into_iter().skip(skip).take(size).collect();
    Self { items, current_page, total_pages, total }
  }

  /// Build a page whose items were already cut by the backend.
  pub fn from_parts(items: Vec<T>, page: usize, size: usize, total: usize) -> Self {
    Self {
      items,
      current_page: page.max(1),
      total_pages: total.div_ceil(size.max(1)),
      total,
    }
  }

  /// Offset of the first row on `page` (1-based).
  pub fn offset(page: usize, size: usize) -> usize {
    page.max(1).saturating_sub(1).saturating_mul(size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slices_the_requested_page() {
    let p = Page::slice((1..=25).collect::<Vec<_>>(), 3, 10);
    assert_eq!(p.items, vec![21, 22, 23, 24, 25]);
    assert_eq!(p.total_pages, 3);
    assert_eq!(p.total, 25);
  }

  #[test]
  fn page_zero_is_page_one() {
    let p = Page::slice(vec!['a', 'b'], 0, 10);
    assert_eq!(p.current_page, 1);
    assert_eq!(p.items, vec!['a', 'b']);
  }

  #[test]
  fn past_the_end_is_empty() {
    let p = Page::slice(vec![1, 2, 3], 5, 10);
    assert!(p.items.is_empty());
    assert_eq!(p.total_pages, 1);
  }

  #[test]
  fn offsets() {
    assert_eq!(Page::<()>::offset(0, 20), 0);
    assert_eq!(Page::<()>::offset(1, 20), 0);
    assert_eq!(Page::<()>::offset(3, 20), 40);
  }
}
