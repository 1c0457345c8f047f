mod common;

use common::bundle_with_pages;
use pavilion::{BundleStore, Host};
use tempfile::tempdir;

#[tokio::test]
async fn host_reactivates_current_deploys_on_load() {
    let root = tempdir().expect("tempdir");

    // Seed two sites: one with a live deploy, one cold.
    let store = BundleStore::open(root.path(), "alpha").expect("open alpha");
    let ts = store
        .import_bytes(&bundle_with_pages(&[("home", "/")]))
        .expect("import");
    store.set_current(ts).expect("set current");
    store.add_domain("alpha.example.test").expect("domain");

    BundleStore::open(root.path(), "beta").expect("open beta");

    let host = Host::load(root.path(), 3000, None).await.expect("load");

    let alpha = host.site("alpha").expect("alpha");
    assert_eq!(alpha.lookup_page("/").expect("reactivated").0.id, "home");
    assert_eq!(alpha.status().current, ts);

    let beta = host.site("beta").expect("beta");
    assert!(beta.lookup_page("/").is_none());
    assert_eq!(beta.status().current, 0);

    // Domain resolution finds the bound site.
    let by_domain = host.site_by_domain("alpha.example.test").expect("domain");
    assert_eq!(by_domain.status().site_id, "alpha");
    assert!(host.site_by_domain("unknown.example.test").is_none());
}

#[tokio::test]
async fn a_corrupt_site_comes_up_cold_without_failing_the_host() {
    let root = tempdir().expect("tempdir");

    let store = BundleStore::open(root.path(), "broken").expect("open");
    let ts = store.import_bytes(b"this is not an archive").expect("import");
    store.set_current(ts).expect("set current");

    let host = Host::load(root.path(), 3000, None).await.expect("load");
    let broken = host.site("broken").expect("site exists");
    assert!(broken.lookup_page("/").is_none());
}
