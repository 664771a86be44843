use sea_orm::{ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

/// One page of a listing. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub this_page: u64,
    pub page_count: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.this_page < self.page_count
    }

    pub fn has_previous(&self) -> bool {
        self.this_page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            this_page: self.this_page,
            page_count: self.page_count,
        }
    }
}

/// Page 0 is treated as page 1.
pub fn normalize_page(page: u64) -> u64 {
    page.max(1)
}

/// Runs `select` through sea-orm's paginator and wraps the requested page.
/// Pages past the end are clamped to the last page.
pub async fn fetch_page<C, E, M>(
    db: &C,
    select: Select<E>,
    page: u64,
    page_size: u64,
) -> Result<Page<M>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait<Model = M>,
    M: FromQueryResult + Sized + Send + Sync,
{
    let paginator = select.paginate(db, page_size.max(1));
    let counts = paginator.num_items_and_pages().await?;
    let page_count = counts.number_of_pages.max(1);
    let this_page = normalize_page(page).min(page_count);
    let items = paginator.fetch_page(this_page - 1).await?;

    Ok(Page {
        items,
        total_items: counts.number_of_items,
        this_page,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_first_page() {
        assert_eq!(normalize_page(0), 1);
        assert_eq!(normalize_page(1), 1);
        assert_eq!(normalize_page(7), 7);
    }

    #[test]
    fn navigation_flags() {
        let page = Page {
            items: vec![1, 2],
            total_items: 6,
            this_page: 2,
            page_count: 3,
        };
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = page.map(|n| n * 10);
        assert_eq!(last.items, vec![10, 20]);
        assert_eq!(last.this_page, 2);
    }
}
