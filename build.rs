use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is not set by cargo"),
    );
    let catalog_dir = manifest_dir.join("src").join("catalog");
    println!("cargo:rerun-if-changed={}", catalog_dir.display());

    let mut names = Vec::new();
    let entries = fs::read_dir(&catalog_dir).expect("failed to list src/catalog");
    for entry in entries {
        let entry = entry.expect("failed to read src/catalog entry");
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|value| value.to_str()) {
            names.push(stem.to_string());
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    names.sort();
    names.dedup();

    let mut generated = String::new();
    generated.push_str(
        "pub(crate) fn embedded_translators() -> &'static [(&'static str, &'static str)] {\n",
    );
    generated.push_str("    &[\n");
    for name in names {
        generated.push_str(&format!(
            "        (\"{name}\", include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/src/catalog/{name}.toml\"))),\n"
        ));
    }
    generated.push_str("    ]\n");
    generated.push_str("}\n");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is not set by cargo"));
    let destination = out_dir.join("embedded_translators.rs");
    fs::write(&destination, generated).expect("failed to write embedded translator index");
}
