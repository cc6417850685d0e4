use std::error::Error;
use std::{ fs, path::Path, path::PathBuf };
use serde_json::{ Value, Map };
use anyhow::Result;

const CATALOG_DIR: &str = "translations";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-env-changed=TS_CATALOG_DIR");

    let catalog_dir = find_catalog_directory()?;
    // Watched even while missing so that creating it triggers a rebuild
    println!("cargo:rerun-if-changed={}", catalog_dir.display());
    let out_path = Path::new(&std::env::var("OUT_DIR")?).join("bundled_catalogs.json");

    // Always create the file, even if empty, so include_str! works
    if !catalog_dir.exists() {
        println!("cargo:warning=No {}/ folder found, bundling no catalogs", CATALOG_DIR);
        fs::write(out_path, "{}")?;
        return Ok(());
    }

    let catalogs = bundle_catalogs(&catalog_dir)?;
    fs::write(out_path, serde_json::to_string(&catalogs)?)?;
    Ok(())
}

/// Map of file stem (`keepassxc_cs`) to the raw TS document.
fn bundle_catalogs(catalog_dir: &Path) -> Result<Value> {
    let mut catalogs = Map::new();

    for entry in fs::read_dir(catalog_dir)? {
        let file_path = entry?.path();
        if file_path.extension().and_then(|e| e.to_str()) != Some("ts") {
            continue;
        }

        let file_stem = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid catalog name {}", file_path.display()))?;

        println!("cargo:rerun-if-changed={}", file_path.display());
        let content = fs::read_to_string(&file_path)?;
        if !is_ts_document(&content) {
            println!("cargo:warning=Skipping {}: not a TS catalog", file_path.display());
            continue;
        }
        catalogs.insert(file_stem.to_string(), Value::String(content));
    }

    Ok(Value::Object(catalogs))
}

/// `.ts` is shared with TypeScript sources; only keep XML documents whose
/// root is `<TS>`.
fn is_ts_document(content: &str) -> bool {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    content.starts_with('<') && content.contains("<TS")
}

fn find_catalog_directory() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TS_CATALOG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    // Walk up from the build output towards the consuming workspace root
    if let Ok(out_dir) = std::env::var("OUT_DIR") {
        let mut current = PathBuf::from(out_dir);
        while current.pop() {
            let candidate = current.join(CATALOG_DIR);
            if candidate.is_dir() {
                return Ok(candidate);
            }
        }
    }

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
    Ok(Path::new(&manifest_dir).join(CATALOG_DIR))
}
