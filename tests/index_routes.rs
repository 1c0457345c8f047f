use pavilion::payload::{ContentPayload, Layout, Page};
use pavilion::{ContentIndex, Error};

fn page(id: &str, url: &str) -> Page {
    Page {
        id: id.to_string(),
        url: url.to_string(),
        name: String::new(),
        content_tree: serde_json::Value::Null,
    }
}

fn payload_with_pages(pages: Vec<Page>) -> ContentPayload {
    ContentPayload {
        pages,
        ..Default::default()
    }
}

#[test]
fn lookups_are_deterministic_across_builds() {
    let payload = payload_with_pages(vec![
        page("home", "/"),
        page("about", "/about"),
        page("post", "/blog/:slug"),
        page("docs", "/docs/**"),
    ]);

    let first = ContentIndex::build(&payload).expect("first build");
    let second = ContentIndex::build(&payload).expect("second build");

    for path in ["/", "/about", "/about/", "/blog/hello", "/docs/a/b", "/missing"] {
        let a = first.lookup(path).map(|(p, params)| (p.id.clone(), params));
        let b = second.lookup(path).map(|(p, params)| (p.id.clone(), params));
        assert_eq!(a, b, "lookup {path} diverged between builds");
    }
}

#[test]
fn duplicate_url_fails_closed_and_leaves_previous_index_alone() {
    let good = payload_with_pages(vec![page("p1", "/a")]);
    let active = ContentIndex::build(&good).expect("good build");

    let bad = payload_with_pages(vec![page("p1", "/a"), page("p2", "/a")]);
    match ContentIndex::build(&bad) {
        Err(Error::Conflict(url)) => assert_eq!(url, "/a"),
        other => panic!("expected conflict, got {other:?}"),
    }

    // The previously built index still answers.
    assert_eq!(active.lookup("/a").expect("still live").0.id, "p1");
}

#[test]
fn trailing_slash_matches_both_directions() {
    let index = ContentIndex::build(&payload_with_pages(vec![page("p1", "/a")])).expect("build");
    assert_eq!(index.lookup("/a").expect("exact").0.id, "p1");
    assert_eq!(index.lookup("/a/").expect("slashed").0.id, "p1");
}

#[test]
fn params_are_returned_with_the_page() {
    let index =
        ContentIndex::build(&payload_with_pages(vec![page("post", "/blog/:slug")])).expect("build");
    let (found, params) = index.lookup("/blog/first-post").expect("match");
    assert_eq!(found.id, "post");
    assert_eq!(
        params,
        vec![("slug".to_string(), "first-post".to_string())]
    );
}

#[test]
fn id_maps_answer_bulk_fetch_patterns() {
    let index = ContentIndex::build(&payload_with_pages(vec![
        page("p1", "/a"),
        page("p2", "/b"),
    ]))
    .expect("build");

    assert_eq!(index.page_by_id("p2").expect("p2").url, "/b");
    assert!(index.page_by_id("p9").is_none());
    assert_eq!(index.page_count(), 2);
}

#[test]
fn default_layout_selection() {
    let layout = |id: &str, flagged: bool| Layout {
        id: id.to_string(),
        name: String::new(),
        is_default_layout: flagged,
        content_tree: serde_json::Value::Null,
    };

    let flagged = ContentPayload {
        layouts: vec![layout("a", false), layout("b", true)],
        ..Default::default()
    };
    assert_eq!(
        ContentIndex::build(&flagged)
            .expect("build")
            .default_layout()
            .expect("layout")
            .id,
        "b"
    );

    let unflagged = ContentPayload {
        layouts: vec![layout("a", false), layout("b", false)],
        ..Default::default()
    };
    assert_eq!(
        ContentIndex::build(&unflagged)
            .expect("build")
            .default_layout()
            .expect("layout")
            .id,
        "a"
    );

    let none = ContentIndex::build(&ContentPayload::default()).expect("build");
    assert!(none.default_layout().is_none());
}
