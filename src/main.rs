use anyhow::{bail, Context, Result};
use content_groups::config::Config;
use content_groups::i18n::{LocaleRegistry, SyncMetrics};
use content_groups::{
    ContentStore, Database, EntityDecl, Locale, LocaleRequest, Query, RegistryOptions,
    TypeRegistry, ALL,
};
use tracing::info;

const USAGE: &str = "usage: content-groups <init | locales | resolve <entity> <locales|ALL> | translate <entity> <content_group_id> <locale>>";

fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("content_groups=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    if command.as_str() == "locales" {
        for locale in LocaleRegistry::get().list_enabled() {
            let marker = if locale.is_default { " (default)" } else { "" };
            println!("{}\t{}\t{}{}", locale.code, locale.name, locale.native_name, marker);
        }
        return Ok(());
    }

    let store = open_store(&config)?;

    match command.as_str() {
        "init" => {
            let count = store.registry().entity_types().count();
            info!("Provisioned {} entity types in {}", count, config.database_path);
        }
        "resolve" => {
            let [_, entity, locales] = args.as_slice() else {
                bail!(USAGE);
            };
            let query = Query::new(entity.as_str()).with_locales(parse_locales(locales));
            let rows = store.fetch(&query)?;
            info!("Resolved {} rows of {}", rows.len(), entity);

            let json: Vec<_> = rows.iter().map(|row| row.to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        "translate" => {
            let [_, entity, group, locale] = args.as_slice() else {
                bail!(USAGE);
            };
            let content_group_id: i64 = group
                .parse()
                .with_context(|| format!("content_group_id must be an integer, got {group}"))?;

            let locale = Locale::from_code(locale)?;
            info!(
                "Translating group {} into {} ({})",
                content_group_id,
                locale.name(),
                locale.native_name()
            );

            let mut row = store.translate(entity, content_group_id, &locale)?;
            store.create(&mut row)?;
            println!("{}", serde_json::to_string_pretty(&row.to_json())?);
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    let report = SyncMetrics::global().report();
    info!("Metrics: {}", serde_json::to_string(&report)?);
    Ok(())
}

fn open_store(config: &Config) -> Result<ContentStore> {
    let schema = std::fs::read_to_string(&config.schema_path)
        .with_context(|| format!("Failed to read schema file {}", config.schema_path))?;
    let decls: Vec<EntityDecl> = serde_json::from_str(&schema)
        .with_context(|| format!("Failed to parse schema file {}", config.schema_path))?;

    let mut registry = TypeRegistry::with_options(RegistryOptions {
        translation_timestamps: config.translation_timestamps,
    });
    for decl in decls {
        let name = decl.name.clone();
        registry
            .register(decl)
            .with_context(|| format!("Failed to register entity type {name}"))?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    let mut store = ContentStore::new(db, registry)?.with_sequence(&config.content_group_sequence);
    if let Some(locale) = &config.default_locale {
        store = store.with_default_locale(locale.as_str())?;
    }
    Ok(store)
}

/// Comma-separated codes; `ALL` anywhere disables locale filtering.
fn parse_locales(raw: &str) -> Vec<LocaleRequest> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            if code.eq_ignore_ascii_case("all") {
                ALL
            } else {
                LocaleRequest::from(code)
            }
        })
        .collect()
}
