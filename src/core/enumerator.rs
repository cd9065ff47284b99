/// Database enumeration
///
/// Pages through the server's database directory and keeps the names that
/// pass the optional filter and are not disabled.

use tracing::debug;

use crate::core::admin::AdminApi;
use crate::core::error::AdminError;

/// Name predicate used to narrow a batch
pub type NameFilter<'a> = &'a dyn Fn(&str) -> bool;

/// Active database names, in directory order.
///
/// With no filter every active database is returned. The filter runs before
/// the metadata lookup, so excluded names cost no extra call. A database
/// whose document is missing is treated like a disabled one.
pub async fn list_active_databases<A: AdminApi>(
    admin: &A,
    page_size: usize,
    filter: Option<NameFilter<'_>>,
) -> Result<Vec<String>, AdminError> {
    let page_size = page_size.max(1);
    let mut start = 0;
    let mut active = Vec::new();

    loop {
        let page = admin.database_names(start, page_size).await?;
        if page.is_empty() {
            break;
        }
        start += page.len();

        for name in page {
            if let Some(filter) = filter {
                if !filter(&name) {
                    continue;
                }
            }

            match admin.database_document(&name).await? {
                Some(doc) if !doc.disabled => active.push(name),
                Some(_) => debug!(database = %name, "Skipping disabled database"),
                None => debug!(database = %name, "Skipping database without a document"),
            }
        }
    }

    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{FakeAdmin, Journal};

    fn fleet() -> FakeAdmin {
        FakeAdmin::new(Journal::default())
            .with_database("accounts", false)
            .with_database("archive", true)
            .with_database("cs.RA.orders", false)
            .with_database("cs.RA.returns", true)
            .with_database("inventory", false)
    }

    #[tokio::test]
    async fn test_no_filter_includes_every_active_database() {
        let admin = fleet();
        let names = list_active_databases(&admin, 100, None).await.unwrap();
        assert_eq!(names, vec!["accounts", "cs.RA.orders", "inventory"]);
    }

    #[tokio::test]
    async fn test_disabled_never_listed_for_any_filter() {
        let admin = fleet();
        let filters: [fn(&str) -> bool; 4] = [
            |_| true,
            |n| n.starts_with("cs.RA"),
            |n| n.starts_with('a'),
            |_| false,
        ];

        for filter in &filters {
            let filter: NameFilter = filter;
            let names = list_active_databases(&admin, 100, Some(filter)).await.unwrap();
            assert!(!names.contains(&"archive".to_string()));
            assert!(!names.contains(&"cs.RA.returns".to_string()));
        }

        let ra = list_active_databases(&admin, 100, Some(&|n: &str| n.starts_with("cs.RA")))
            .await
            .unwrap();
        assert_eq!(ra, vec!["cs.RA.orders"]);
    }

    #[tokio::test]
    async fn test_filter_runs_before_metadata_lookup() {
        let admin = fleet();
        let names = list_active_databases(&admin, 100, Some(&|n: &str| n == "inventory"))
            .await
            .unwrap();

        assert_eq!(names, vec!["inventory"]);
        assert_eq!(admin.document_fetches(), 1);
    }

    #[tokio::test]
    async fn test_pages_until_empty_batch() {
        let admin = fleet();
        let names = list_active_databases(&admin, 2, None).await.unwrap();

        assert_eq!(names.len(), 3);
        // 2 + 2 + 1 names, then the empty page
        assert_eq!(admin.name_pages(), 4);
    }
}
