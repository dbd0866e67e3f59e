use recon_fs::{NormalizedPath, sanitize_file_name};
use rstest::rstest;

#[rstest]
#[case("foo/bar/baz", "foo/bar/baz")]
#[case("foo\\bar\\baz", "foo/bar/baz")]
#[case("foo/bar\\baz", "foo/bar/baz")]
#[case("/uploads//documents/./a.pdf", "/uploads/documents/a.pdf")]
fn test_normalization(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(NormalizedPath::new(input).as_str(), expected);
}

#[test]
fn test_join_resolves_dots() {
    let base = NormalizedPath::new("/a/b");

    assert_eq!(base.join("c").as_str(), "/a/b/c");
    assert_eq!(base.join("./c").as_str(), "/a/b/c");
    assert_eq!(base.join("../c").as_str(), "/a/c");
    assert_eq!(base.join("../../../c").as_str(), "/c");
}

#[test]
fn test_join_traversal_fails_containment() {
    let root = NormalizedPath::new("/srv/uploads");
    let escaped = root.join("../secrets.txt");

    assert_eq!(escaped.as_str(), "/srv/secrets.txt");
    assert!(!escaped.is_within(&root));
}

#[test]
fn test_strip_root_is_segment_aware() {
    let root = NormalizedPath::new("/data/uploads");

    assert_eq!(
        NormalizedPath::new("/data/uploads/documents/a.pdf").strip_root(&root),
        Some("documents/a.pdf".to_string())
    );
    assert_eq!(NormalizedPath::new("/data/uploadsx/a.pdf").strip_root(&root), None);
}

#[test]
fn test_parent_and_file_name() {
    let path = NormalizedPath::new("/objects/documents/2025/05/a.pdf");

    assert_eq!(path.file_name(), Some("a.pdf"));
    assert_eq!(path.extension(), Some("pdf"));
    assert_eq!(
        path.parent().unwrap().as_str(),
        "/objects/documents/2025/05"
    );
}

#[test]
fn test_hidden_file_has_no_extension() {
    assert_eq!(NormalizedPath::new("/x/.hidden").extension(), None);
}

#[rstest]
#[case("Relatório Anual.pdf", Some("Relat-rio-Anual.pdf"))]
#[case("../../etc/passwd", Some("passwd"))]
#[case(".env", Some("env"))]
#[case("///", None)]
fn test_sanitize_file_name(#[case] input: &str, #[case] expected: Option<&str>) {
    assert_eq!(sanitize_file_name(input).as_deref(), expected);
}
