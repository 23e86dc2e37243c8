use std::fs;
use std::path::Path;

#[test]
fn lib_root_exports_only_the_moderation_modules() {
    let lib_rs = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/lib.rs");
    let source = fs::read_to_string(&lib_rs).expect("read src/lib.rs");

    for module in ["app", "channels", "config", "massban", "permissions", "shared"] {
        assert!(
            source.contains(&format!("pub mod {module};")),
            "src/lib.rs is missing `pub mod {module};`"
        );
    }
    assert!(
        !source.contains("pub mod cli;"),
        "src/lib.rs exports a root cli module; the binary should route through app"
    );
}

#[test]
fn public_surface_is_reachable_from_the_crate_root() {
    use banhammer::app::{Engine, EngineConfig, EngineDeps, MassbanOutcome};
    use banhammer::channels::discord::{DiscordClient, GuildCache, GATEWAY_INTENTS};
    use banhammer::massban::{extract_candidate_ids, parse_massban_args, JobRegistry};
    use banhammer::permissions::{resolve_access, SqliteOverrideStore};

    let _ = std::mem::size_of::<Engine>();
    let _ = std::mem::size_of::<EngineConfig>();
    let _ = std::mem::size_of::<EngineDeps>();
    let _ = std::mem::size_of::<MassbanOutcome>();
    let _ = std::mem::size_of::<DiscordClient>();
    let _ = std::mem::size_of::<SqliteOverrideStore>();
    let _ = resolve_access;
    assert_eq!(GATEWAY_INTENTS, 1 | (1 << 9) | (1 << 15));
    assert_eq!(GuildCache::default().guild_count(), 0);
    assert!(JobRegistry::default().is_empty());
    assert_eq!(extract_candidate_ids("<@12> 34"), vec!["12", "34"]);
    assert!(parse_massban_args("8 https://x", &[], 512).is_err());
}
