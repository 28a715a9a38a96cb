//! EAN-based reconciliation of staged products against the remote mirror.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IssuePurgeScope;
use crate::db::DbPool;
use crate::error::Result;
use crate::issues::{self, IssueReason, NewIssue};
use crate::remote::cache::{self, RemoteCode};
use crate::staging::{self, StagedCode};

const MAX_DEBUG_PER_CATEGORY: usize = 10;

/// Keeps only ASCII digits; an empty result means "no code".
pub fn normalize_code(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// A cross-reference to write: `remote_id` is the unique match for `product_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub remote_id: i64,
    pub product_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub links: Vec<Link>,
    pub issues: Vec<NewIssue>,
    pub remote_without_code: usize,
}

impl LinkPlan {
    pub fn count(&self, reason: IssueReason) -> usize {
        self.issues.iter().filter(|issue| issue.reason == reason).count()
    }
}

/// Decides matches and issues without touching storage.
pub fn reconcile(staged: &[StagedCode], remote: &[RemoteCode]) -> LinkPlan {
    let mut plan = LinkPlan::default();

    let mut by_code: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for entry in remote {
        let code = normalize_code(&entry.ean);
        if code.is_empty() {
            plan.remote_without_code += 1;
            continue;
        }
        by_code.entry(code).or_default().push(entry.remote_id);
    }

    let mut logged = DebugBudget::default();
    let mut local_codes: HashSet<String> = HashSet::with_capacity(staged.len());

    for product in staged {
        let raw_code = product.code.trim();
        let code = normalize_code(raw_code);
        if code.is_empty() {
            if logged.allow(IssueReason::MissingEanSrc) {
                debug!(product_id = product.product_id, raw_code, "staged product has no usable code");
            }
            plan.issues.push(NewIssue {
                product_id: product.product_id,
                reason: IssueReason::MissingEanSrc,
                code,
                raw_code: raw_code.to_string(),
                remote_ids: Vec::new(),
                details: "export code is empty or has no digits".to_string(),
            });
            continue;
        }

        match by_code.get(&code).map(Vec::as_slice) {
            None | Some([]) => {
                if logged.allow(IssueReason::MissingInShopByEan) {
                    debug!(product_id = product.product_id, code = %code, "no remote entry for code");
                }
                plan.issues.push(NewIssue {
                    product_id: product.product_id,
                    reason: IssueReason::MissingInShopByEan,
                    details: format!("no remote product with EAN {code}"),
                    code: code.clone(),
                    raw_code: raw_code.to_string(),
                    remote_ids: Vec::new(),
                });
            }
            Some([remote_id]) => {
                if logged.allow_matched() {
                    debug!(product_id = product.product_id, remote_id, code = %code, "matched by code");
                }
                plan.links.push(Link {
                    remote_id: *remote_id,
                    product_id: product.product_id,
                });
            }
            Some(candidates) => {
                if logged.allow(IssueReason::DuplicateEanShop) {
                    debug!(
                        product_id = product.product_id,
                        code = %code,
                        candidates = ?candidates,
                        "code is ambiguous in the remote catalog"
                    );
                }
                plan.issues.push(NewIssue {
                    product_id: product.product_id,
                    reason: IssueReason::DuplicateEanShop,
                    details: format!(
                        "EAN {code} appears {} times in the remote catalog",
                        candidates.len()
                    ),
                    code: code.clone(),
                    raw_code: raw_code.to_string(),
                    remote_ids: candidates.to_vec(),
                });
            }
        }

        local_codes.insert(code);
    }

    for (code, remote_ids) in &by_code {
        if local_codes.contains(code) {
            continue;
        }
        if logged.allow(IssueReason::MissingInMagazineByEan) {
            debug!(code = %code, remote_ids = ?remote_ids, "remote code has no local product");
        }
        plan.issues.push(NewIssue {
            product_id: 0,
            reason: IssueReason::MissingInMagazineByEan,
            code: code.clone(),
            raw_code: code.clone(),
            remote_ids: remote_ids.clone(),
            details: format!("EAN {code} exists remotely but not in the export"),
        });
    }

    plan
}

#[derive(Default)]
struct DebugBudget {
    issues: BTreeMap<IssueReason, usize>,
    matched: usize,
}

impl DebugBudget {
    fn allow(&mut self, reason: IssueReason) -> bool {
        let used = self.issues.entry(reason).or_default();
        *used += 1;
        *used <= MAX_DEBUG_PER_CATEGORY
    }

    fn allow_matched(&mut self) -> bool {
        self.matched += 1;
        self.matched <= MAX_DEBUG_PER_CATEGORY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub import_id: i64,
    /// The mirror was empty, so nothing beyond the purge happened.
    pub skipped: bool,
    pub purged: u64,
    pub staged: usize,
    pub remote: usize,
    pub matched: usize,
    pub missing_ean_src: usize,
    pub missing_in_shop: usize,
    pub duplicate_in_shop: usize,
    pub missing_in_magazine: usize,
    pub remote_without_code: usize,
}

/// Purges issues in `scope`, then reconciles the staging rows of
/// `import_id` against the mirror. Everything happens in one transaction.
pub async fn link_import(pool: &DbPool, import_id: i64, scope: IssuePurgeScope) -> Result<LinkReport> {
    let mut tx = pool.begin().await?;

    let purged = issues::purge(&mut tx, scope, import_id).await?;
    let mut report = LinkReport {
        import_id,
        purged,
        ..LinkReport::default()
    };

    if cache::count(&mut tx).await? == 0 {
        warn!(import_id, "remote mirror is empty; skipping link pass");
        tx.commit().await?;
        report.skipped = true;
        return Ok(report);
    }

    let staged = staging::load_codes(&mut tx, import_id).await?;
    let remote = cache::load_codes(&mut tx).await?;
    let plan = reconcile(&staged, &remote);

    for link in &plan.links {
        cache::set_product_link(&mut tx, link.remote_id, link.product_id).await?;
    }
    let now = Utc::now();
    for issue in &plan.issues {
        issues::upsert(&mut tx, import_id, issue, now).await?;
    }

    tx.commit().await?;

    report.staged = staged.len();
    report.remote = remote.len();
    report.matched = plan.links.len();
    report.missing_ean_src = plan.count(IssueReason::MissingEanSrc);
    report.missing_in_shop = plan.count(IssueReason::MissingInShopByEan);
    report.duplicate_in_shop = plan.count(IssueReason::DuplicateEanShop);
    report.missing_in_magazine = plan.count(IssueReason::MissingInMagazineByEan);
    report.remote_without_code = plan.remote_without_code;

    info!(
        import_id,
        staged = report.staged,
        remote = report.remote,
        matched = report.matched,
        missing_ean_src = report.missing_ean_src,
        missing_in_shop = report.missing_in_shop,
        duplicate_in_shop = report.duplicate_in_shop,
        missing_in_magazine = report.missing_in_magazine,
        remote_without_code = report.remote_without_code,
        "link pass finished"
    );

    Ok(report)
}
