pub mod activity;
pub mod budget;
pub mod transaction;
pub mod user;

use fairsplit_common::request_io::{OutputPage, Pagination};

/// Applies 1-indexed pagination over an already-complete result set.
pub(crate) fn paginate<T>(items: Vec<T>, pagination: Pagination) -> OutputPage<T> {
    let total = items.len();
    let page = pagination.page.max(1);
    let offset = (page - 1) as usize * pagination.page_size as usize;

    let items = items
        .into_iter()
        .skip(offset)
        .take(pagination.page_size as usize)
        .collect();

    OutputPage {
        items,
        total,
        page,
        page_size: pagination.page_size,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_clamps_and_counts() {
        let items: Vec<u32> = (0..7).collect();

        let first = paginate(
            items.clone(),
            Pagination {
                page: 0,
                page_size: 3,
            },
        );
        assert_eq!(first.page, 1);
        assert_eq!(first.items, vec![0, 1, 2]);
        assert_eq!(first.total, 7);

        let last = paginate(
            items,
            Pagination {
                page: 3,
                page_size: 3,
            },
        );
        assert_eq!(last.items, vec![6]);
        assert_eq!(last.total, 7);
    }
}
