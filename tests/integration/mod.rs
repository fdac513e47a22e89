//! Integration tests that run the bundled catalogs against mock sites.

mod review_pages;
