//! Commit-set branch divergence for hosts without a cross-fork compare API.
//!
//! The calculation approximates ahead/behind counts from commit-identifier
//! membership over the two paginated, newest-first commit listings. It never
//! inspects real DAG topology.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::provider::BranchComparison;

/// Commit listings are fetched at the host's maximum page size.
pub const PAGE_SIZE: usize = 100;

/// One page of commit identifiers, newest-first, plus the follow-up page
/// number when the listing is not yet exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPage {
    pub ids: Vec<String>,
    pub next_page: Option<usize>,
}

/// A restartable, paginated source of commit identifiers for one ref.
/// Modeled as a trait so tests can inject a fake source.
#[async_trait]
pub trait CommitPager: Send + Sync {
    async fn page(&self, page: usize) -> AppResult<CommitPage>;
}

/// Materialize the full commit listing by following `next_page` until the
/// source reports exhaustion. Order is preserved: newest commits first.
pub async fn collect_commits<P: CommitPager + ?Sized>(pager: &P) -> AppResult<Vec<String>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let CommitPage { ids, next_page } = pager.page(page).await?;
        all.extend(ids);
        match next_page {
            Some(next) => page = next,
            None => break,
        }
    }
    Ok(all)
}

/// Derive a `BranchComparison` from the two newest-first commit listings.
///
/// Fork commits encountered before the first one present in the upstream set
/// count as `ahead_by`; that first shared identifier is the merge-base.
/// Upstream commits encountered before the merge-base count as `behind_by`.
/// Unrelated histories are an error, never a guessed result.
pub fn divergence(upstream: &[String], fork: &[String]) -> AppResult<BranchComparison> {
    let upstream_set: HashSet<&str> = upstream.iter().map(String::as_str).collect();

    let mut ahead_by: u32 = 0;
    let mut merge_base = None;
    for id in fork {
        if upstream_set.contains(id.as_str()) {
            merge_base = Some(id.as_str());
            break;
        }
        ahead_by += 1;
    }
    let Some(merge_base) = merge_base else {
        return Err(AppError::NoMergeBase);
    };

    let mut behind_by: u32 = 0;
    for id in upstream {
        if id == merge_base {
            break;
        }
        behind_by += 1;
    }

    Ok(BranchComparison::from_counts(ahead_by, behind_by))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::provider::ComparisonStatus;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct FakePager {
        pages: Vec<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    impl FakePager {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            FakePager {
                pages,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CommitPager for FakePager {
        async fn page(&self, page: usize) -> AppResult<CommitPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ids = ids(&self.pages[page - 1]);
            let next_page = (page < self.pages.len()).then_some(page + 1);
            Ok(CommitPage { ids, next_page })
        }
    }

    #[tokio::test]
    async fn follows_next_page_until_exhausted() {
        let pager = FakePager::new(vec![vec!["c", "b"], vec!["a"]]);
        let commits = collect_commits(&pager).await.unwrap();
        assert_eq!(commits, ids(&["c", "b", "a"]));
        assert_eq!(pager.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_page_listing_stops_after_one_fetch() {
        let pager = FakePager::new(vec![vec!["b", "a"]]);
        let commits = collect_commits(&pager).await.unwrap();
        assert_eq!(commits, ids(&["b", "a"]));
        assert_eq!(pager.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn counts_ahead_and_behind_around_the_merge_base() {
        // Upstream [C,B,A], fork [E,D,B,A]: merge base B, two unique fork
        // commits, one unique upstream commit.
        let upstream = ids(&["C", "B", "A"]);
        let fork = ids(&["E", "D", "B", "A"]);
        let cmp = divergence(&upstream, &fork).unwrap();
        assert_eq!(cmp.ahead_by, 2);
        assert_eq!(cmp.behind_by, 1);
        assert_eq!(cmp.status, ComparisonStatus::Diverged);
    }

    #[test]
    fn strictly_behind_fork_has_zero_unique_commits() {
        let upstream = ids(&["C", "B", "A"]);
        let fork = ids(&["B", "A"]);
        let cmp = divergence(&upstream, &fork).unwrap();
        assert_eq!(cmp.ahead_by, 0);
        assert_eq!(cmp.behind_by, 1);
        assert_eq!(cmp.status, ComparisonStatus::Behind);
    }

    #[test]
    fn strictly_ahead_fork_counts_only_its_own_commits() {
        let upstream = ids(&["B", "A"]);
        let fork = ids(&["D", "C", "B", "A"]);
        let cmp = divergence(&upstream, &fork).unwrap();
        assert_eq!(cmp.ahead_by, 2);
        assert_eq!(cmp.behind_by, 0);
        assert_eq!(cmp.status, ComparisonStatus::Ahead);
    }

    #[test]
    fn equal_histories_are_identical() {
        let upstream = ids(&["B", "A"]);
        let fork = ids(&["B", "A"]);
        let cmp = divergence(&upstream, &fork).unwrap();
        assert_eq!(cmp.status, ComparisonStatus::Identical);
    }

    #[test]
    fn unrelated_histories_fail_instead_of_guessing() {
        let upstream = ids(&["C", "B", "A"]);
        let fork = ids(&["Z", "Y"]);
        let err = divergence(&upstream, &fork).unwrap_err();
        assert!(matches!(err, AppError::NoMergeBase));
    }
}
