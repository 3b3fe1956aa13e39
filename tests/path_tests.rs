use dashboard_api::types::Path;
use std::sync::Arc;

fn chain(segments: &[&str]) -> Arc<Path> {
    let mut path = Path::root(segments[0]);
    for segment in &segments[1..] {
        path = Path::child(&path, *segment);
    }
    path
}

#[test]
fn test_root_path_resolves_as_is() {
    assert_eq!(Path::root("/api").resolve(), "/api");
    assert_eq!(Path::root("/").resolve(), "/");
    assert_eq!(Path::root("").resolve(), "/");
}

#[test]
fn test_child_path_joins_with_single_separator() {
    let base = Path::root("/api");

    assert_eq!(Path::child(&base, "/logout").resolve(), "/api/logout");
    assert_eq!(Path::child(&base, "logout").resolve(), "/api/logout");
    assert_eq!(Path::child(&base, "/logout/").resolve(), "/api/logout");
    assert_eq!(
        Path::child(&base, "/email/verify/finalize").resolve(),
        "/api/email/verify/finalize"
    );
}

#[test]
fn test_separator_variants_resolve_identically() {
    let variants: [&[&str]; 4] = [
        &["/api", "/v1", "/projects"],
        &["api", "v1", "projects"],
        &["/api/", "v1/", "/projects/"],
        &["api//", "//v1", "projects"],
    ];

    for segments in variants {
        let path = chain(segments);
        let resolved = path.resolve();

        assert_eq!(resolved, "/api/v1/projects", "segments {segments:?}");
        assert_eq!(path.depth(), 2);
        assert_eq!(
            resolved.split('/').filter(|s| !s.is_empty()).count(),
            path.depth() + 1
        );
        assert!(!resolved.contains("//"));
    }
}

#[test]
fn test_empty_segments_are_skipped() {
    let path = chain(&["/api", "", "/projects", "/"]);
    assert_eq!(path.resolve(), "/api/projects");
    assert_eq!(path.depth(), 3);
}

#[test]
fn test_capture_segments_are_kept() {
    let base = Path::root("/api");
    let path = Path::child(&base, "/projects/{project_id}");
    assert_eq!(path.resolve(), "/api/projects/{project_id}");
}

#[test]
fn test_resolution_is_idempotent() {
    let path = chain(&["/api", "/users", "current"]);
    let first = path.resolve();
    let second = path.resolve();
    assert_eq!(first, second);
    // Parents are shared, not copied.
    assert_eq!(path.parent.as_ref().map(|p| p.resolve()).as_deref(), Some("/api/users"));
}
