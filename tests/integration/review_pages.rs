//! Integration tests for the bundled review-visuals catalog.
//!
//! Uses a mock review site with one review page and one comparison page per
//! document shape the catalog targets.

use anchor_patcher::config::load_from_path;
use anchor_patcher::{run_batch, DocumentStatus, PatchSet, RunMode, SiteGuard, Verification};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const REVIEW: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>Make.com Review</title>
  <link rel="stylesheet" href="style.css" />
</head>
<body>
  <main>
        <section>
          <div class="scorecard" role="region" aria-label="Review summary scorecard">
            <h2>Scorecard</h2>
          </div>
        </section>
        <section>
          <h2 id="what-is">What is Make.com?</h2>
          <p>Make.com is a visual automation platform.</p>
        </section>
  </main>
</body>
</html>
"#;

const COMPARISON: &str = r#"<!doctype html>
<html lang="en">
<head>
  <link rel="stylesheet" href="style.css" />
</head>
<body>
  <main>
          <h1>Make.com vs n8n Cloud</h1>
          <h2 id="ct-quick" class="section-title">Quick comparison</h2>
  </main>
</body>
</html>
"#;

fn catalog_sets() -> Vec<PatchSet> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("patches/review-visuals.toml");
    load_from_path(&path).unwrap().compile(None).unwrap()
}

/// Only the two documents present on the mock site.
fn mock_sets() -> Vec<PatchSet> {
    catalog_sets()
        .into_iter()
        .filter(|set| {
            set.file == Path::new("make-com-review.html")
                || set.file == Path::new("make-vs-n8n-cloud.html")
        })
        .collect()
}

fn setup_mock_site() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("make-com-review.html"), REVIEW).unwrap();
    fs::write(dir.path().join("make-vs-n8n-cloud.html"), COMPARISON).unwrap();
    dir
}

fn read(dir: &TempDir, file: &str) -> String {
    fs::read_to_string(dir.path().join(file)).unwrap()
}

#[test]
fn test_review_page_gets_chart_and_badge() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();
    let sets = mock_sets();
    assert_eq!(sets.len(), 2);

    let report = run_batch("review-visuals", &sets, &guard, RunMode::Apply);
    assert_eq!(report.summary().patched, 2);

    let page = read(&site, "make-com-review.html");

    assert!(page.contains(
        "<link rel=\"stylesheet\" href=\"style.css\" />\n  <link rel=\"stylesheet\" href=\"visuals.css\" />\n</head>"
    ));

    // Chart lands right after the scorecard opening tag.
    assert!(page.contains(
        "aria-label=\"Review summary scorecard\">\n          <!-- Visual: score bar chart -->"
    ));
    assert_eq!(page.matches("class=\"score-chart__row\"").count(), 5);
    assert!(page.contains("<span class=\"score-chart__label\">Ease of use</span>"));
    assert!(page.contains("style=\"width:80.0%\""));
    assert!(page.contains("style=\"width:100.0%\""));
    assert!(page.contains("<span class=\"score-chart__value\">5.0</span>"));

    // Badge lands after the closing tag of the "What is" heading.
    assert!(page.contains(
        "What is Make.com?</h2>\n          <!-- Visual: tool identity badge -->"
    ));
    assert!(page.contains("tool-badge__icon--make\" aria-hidden=\"true\">MA</div>"));
    assert!(page.contains("<p class=\"tool-badge__name\">Make.com</p>"));
    assert!(page.contains("Visual no-code automation platform"));

    // Original text survives untouched, in order.
    let heading = page.find("<h2 id=\"what-is\">").unwrap();
    let body = page.find("<p>Make.com is a visual automation platform.</p>").unwrap();
    assert!(heading < body);
}

#[test]
fn test_comparison_page_gets_diagram_before_heading() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();
    let _ = run_batch("review-visuals", &mock_sets(), &guard, RunMode::Apply);

    let page = read(&site, "make-vs-n8n-cloud.html");
    let diagram = page.find("<!-- Visual: A vs B comparison diagram -->").unwrap();
    let heading = page.find("<h2 id=\"ct-quick\"").unwrap();
    assert!(diagram < heading);
    assert!(page.contains("</figure>\n<h2 id=\"ct-quick\" class=\"section-title\">"));
    assert!(page.contains("vs-diagram__icon--make\" aria-hidden=\"true\">MA</div>"));
    assert!(page.contains("vs-diagram__icon--n8n\" aria-hidden=\"true\">N8</div>"));
    assert!(page.contains("<p class=\"vs-diagram__score\">4.6</p>"));
    assert!(page.contains("<p class=\"vs-diagram__best-for\">Best for developers & power users</p>"));
}

#[test]
fn test_rerun_changes_nothing() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();
    let sets = mock_sets();

    let _ = run_batch("review-visuals", &sets, &guard, RunMode::Apply);
    let review = read(&site, "make-com-review.html");
    let comparison = read(&site, "make-vs-n8n-cloud.html");

    let second = run_batch("review-visuals", &sets, &guard, RunMode::Apply);
    for doc in &second.documents {
        assert_eq!(doc.status, DocumentStatus::Unchanged, "{}", doc.file.display());
        assert!(!doc.written);
        assert!(doc.is_verified());
        assert_eq!(doc.digest_before, doc.digest_after);
    }
    assert_eq!(read(&site, "make-com-review.html"), review);
    assert_eq!(read(&site, "make-vs-n8n-cloud.html"), comparison);
}

#[test]
fn test_fingerprints_occur_once_after_apply() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();
    let sets = mock_sets();

    let first = run_batch("review-visuals", &sets, &guard, RunMode::Apply);
    for doc in &first.documents {
        for rule in &doc.rules {
            assert_eq!(rule.verification(), Verification::Pending);
            assert_eq!(rule.occurrences, 1, "{}#{}", doc.file.display(), rule.id);
        }
    }

    let check = run_batch("review-visuals", &sets, &guard, RunMode::DryRun);
    for doc in &check.documents {
        for rule in &doc.rules {
            assert_eq!(rule.verification(), Verification::Verified);
        }
    }
}

#[test]
fn test_hand_edited_page_is_left_alone() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();

    // Someone already added a badge with different formatting.
    let edited = REVIEW.replace(
        "<h2 id=\"what-is\">What is Make.com?</h2>",
        "<h2 id=\"what-is\">What is Make.com?</h2>\n<!-- Visual: tool identity badge --><figure>custom</figure>",
    );
    fs::write(site.path().join("make-com-review.html"), &edited).unwrap();

    let report = run_batch("review-visuals", &mock_sets(), &guard, RunMode::Apply);
    let review = &report.documents[0];
    assert_eq!(review.file, Path::new("make-com-review.html"));

    let badge = review.rules.iter().find(|r| r.id == "tool-badge").unwrap();
    assert!(!badge.outcome.is_applied());

    let page = read(&site, "make-com-review.html");
    assert_eq!(page.matches("tool identity badge").count(), 1);
    assert!(page.contains("<figure>custom</figure>"));
}

#[test]
fn test_page_missing_anchor_is_skipped() {
    let site = setup_mock_site();
    let guard = SiteGuard::new(site.path()).unwrap();
    let renamed = COMPARISON.replace("id=\"ct-quick\"", "id=\"overview\"");
    fs::write(site.path().join("make-vs-n8n-cloud.html"), &renamed).unwrap();

    let report = run_batch("review-visuals", &mock_sets(), &guard, RunMode::Apply);
    let comparison = report
        .documents
        .iter()
        .find(|d| d.file == Path::new("make-vs-n8n-cloud.html"))
        .unwrap();

    // Companion link still goes in; the diagram does not.
    assert_eq!(comparison.status, DocumentStatus::Patched);
    assert!(comparison.rules[0].outcome.is_skipped());
    let page = read(&site, "make-vs-n8n-cloud.html");
    assert!(page.contains("visuals.css"));
    assert!(!page.contains("vs-diagram"));
}
