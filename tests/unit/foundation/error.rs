use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        WarpError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(WarpError::frame("x").to_string().contains("frame error:"));
    assert!(
        WarpError::RuleFileNotFound(PathBuf::from("a/b.dfm"))
            .to_string()
            .contains("a/b.dfm")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = WarpError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn unreadable_exposes_io_source() {
    let err = WarpError::RuleFileUnreadable {
        path: PathBuf::from("r.dfm"),
        source: std::io::Error::other("denied"),
    };
    let src = std::error::Error::source(&err).expect("io source");
    assert!(src.to_string().contains("denied"));
    assert!(err.is_rule_load_error());
    assert!(!WarpError::validation("x").is_rule_load_error());
}
