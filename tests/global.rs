//! The process-wide translator lives in a `OnceCell`, so everything touching
//! it shares one test binary and one test function.

use std::fs;
use std::path::Path;

use ts_catalog::TranslatorConfig;

const CZECH: &str = include_str!("../translations/keepassxc_cs.ts");

fn config_for(dir: &Path, language: &str) -> TranslatorConfig {
    TranslatorConfig {
        use_bundled_catalogs: false,
        catalog_dir: dir.to_path_buf(),
        file_prefix: "keepassxc_".to_string(),
        language: language.to_string(),
        fallback_language: None,
    }
}

#[test]
fn lookup_before_init_then_configure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("keepassxc_cs.ts"), CZECH).unwrap();

    // Touching the accessor first creates an empty translator.
    assert_eq!(ts_catalog::tr("AboutDialog", "About"), "About");
    assert!(ts_catalog::global().available_languages().is_empty());

    assert!(!ts_catalog::init_global(&config_for(dir.path(), "cs")));
    assert_eq!(ts_catalog::tr("AboutDialog", "About"), "O aplikaci");
    assert_eq!(ts_catalog::global().available_languages(), vec!["cs"]);

    // A language without a catalog keeps the current one.
    assert!(!ts_catalog::init_global(&config_for(dir.path(), "sk")));
    assert_eq!(ts_catalog::tr("AboutDialog", "About"), "O aplikaci");
}
