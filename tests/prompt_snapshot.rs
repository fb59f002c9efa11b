use vibetrans::catalog::Catalog;
use vibetrans::direction::Direction;
use vibetrans::prompts::{MediaKind, build_multimodal_prompt, build_prompt};

fn direction(raw: &str) -> Direction {
    raw.parse().unwrap()
}

#[test]
fn one_way_prompt_snapshot() {
    let catalog = Catalog::builtin().unwrap();
    let gen_z = catalog.get("gen-z").unwrap();
    let prompt = build_prompt(
        "That party was really fun.",
        gen_z,
        &gen_z.default_mode,
        Some(&gen_z.default_direction),
    )
    .unwrap();
    insta::assert_snapshot!(prompt, @r#"
    You are a Gen Z slang expert. Rewrite the following text the way a Gen Z person would say it online, using current slang naturally. Keep the meaning. Return ONLY the rewritten text:

    "That party was really fun."
    "#);
}

#[test]
fn alias_direction_prompt_snapshot() {
    let catalog = Catalog::builtin().unwrap();
    let esperanto = catalog.get("esperanto-translator").unwrap();
    let to_english = esperanto.resolve_direction("toEnglish").unwrap();
    assert_eq!(to_english, direction("eo-to-en"));

    let prompt = build_prompt("Saluton, mondo!", esperanto, "general", Some(&to_english)).unwrap();
    insta::assert_snapshot!(prompt, @r#"
    You are "Esperanto Translator", a professional translation tool for translating Esperanto into English. Produce natural modern English. Return ONLY the English translation:

    "Saluton, mondo!"
    "#);
}

#[test]
fn multimodal_prompts_name_both_languages() {
    let catalog = Catalog::builtin().unwrap();
    for tool in catalog.all() {
        let Some(multimodal) = tool.multimodal.as_ref() else {
            continue;
        };
        for (supported, kind) in [
            (multimodal.supports_image, MediaKind::Image),
            (multimodal.supports_audio, MediaKind::Audio),
        ] {
            if !supported {
                continue;
            }
            for direction in &tool.directions {
                let prompt =
                    build_multimodal_prompt(tool, &tool.default_mode, Some(direction), kind)
                        .unwrap();
                let source = tool.language_label(&direction.source);
                assert!(
                    prompt.contains(&source),
                    "{} {} prompt for {} lacks '{}'",
                    tool.id,
                    kind.as_str(),
                    direction,
                    source
                );
            }
        }
    }
}
