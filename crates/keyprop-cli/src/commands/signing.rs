//! Signing commands: resolve, check, write and clean.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use keyprop_core::signing::{
    SIGNING_DIR, cleanup_android_signing, cleanup_key_properties, detect_keystore_type,
    resolve_project_signing, validate_keystore, write_key_properties, write_keystore,
};
use keyprop_core::{
    AndroidProject, BuildPlan, BuildVariant, KeypropError, SigningConfig, SigningPolicy, SigningResolution,
    VariantConfig,
};
use serde::Serialize;

use crate::config::ResolvedConfig;

/// Placeholder printed instead of a password.
const MASK: &str = "********";

#[derive(Serialize)]
struct SigningView {
    store_file: String,
    keystore_path: String,
    store_password: String,
    key_alias: String,
    key_password: String,
}

impl SigningView {
    fn new(config: &SigningConfig, show_secrets: bool) -> Self {
        let secret = |value: &str| {
            if show_secrets {
                value.to_string()
            } else {
                MASK.to_string()
            }
        };

        Self {
            store_file: config.store_file().to_string(),
            keystore_path: config.keystore_path().display().to_string(),
            store_password: secret(config.store_password()),
            key_alias: config.key_alias().to_string(),
            key_password: secret(config.key_password()),
        }
    }
}

#[derive(Serialize)]
struct VariantView<'a> {
    variant: BuildVariant,
    signing: &'static str,
    debuggable: bool,
    minify_enabled: bool,
    shrink_resources: bool,
    proguard_files: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    signing_config: Option<SigningView>,
}

impl<'a> VariantView<'a> {
    fn new(config: &'a VariantConfig, show_secrets: bool) -> Self {
        Self {
            variant: config.variant,
            signing: config.signing.as_str(),
            debuggable: config.debuggable,
            minify_enabled: config.minify_enabled,
            shrink_resources: config.shrink_resources,
            proguard_files: &config.proguard_files,
            signing_config: config
                .signing_config()
                .map(|c| SigningView::new(c, show_secrets)),
        }
    }
}

/// Parses a `--variant` value; `all` selects every variant.
fn parse_variants(value: &str) -> Result<Vec<BuildVariant>> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(BuildVariant::ALL.to_vec());
    }
    let variant = value.parse::<BuildVariant>().map_err(|e| anyhow!(e))?;
    Ok(vec![variant])
}

/// Print the resolved build plan.
pub fn resolve(config: &ResolvedConfig, variant: &str, json: bool, show_secrets: bool) -> Result<()> {
    let project = config.project()?;
    let variants = parse_variants(variant)?;

    let plan = BuildPlan::resolve(&project, &variants, config.policy())
        .context("Failed to resolve build configuration")?;

    let views: Vec<_> = plan
        .variants()
        .iter()
        .map(|v| VariantView::new(v, show_secrets))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!("Android project: {}", project.root().display());
    println!("Signing properties: {}", project.properties_path().display());
    println!();

    for view in &views {
        println!("[{}]", style(view.variant).bold());
        println!("  Signing:          {}", view.signing);
        println!("  Debuggable:       {}", view.debuggable);
        println!("  Minify:           {}", view.minify_enabled);
        println!("  Shrink resources: {}", view.shrink_resources);
        if !view.proguard_files.is_empty() {
            println!("  ProGuard files:   {}", view.proguard_files.join(", "));
        }
        if let Some(signing) = &view.signing_config {
            println!("  Store file:       {}", signing.store_file);
            println!("  Keystore path:    {}", signing.keystore_path);
            println!("  Store password:   {}", signing.store_password);
            println!("  Key alias:        {}", signing.key_alias);
            println!("  Key password:     {}", signing.key_password);
        }
        println!();
    }

    Ok(())
}

/// Validate key.properties and, optionally, the keystore it points to.
pub async fn check(config: &ResolvedConfig, keytool: bool) -> Result<()> {
    let project = config.project()?;

    let signing = match resolve_project_signing(&project)? {
        SigningResolution::Configured(signing) => signing,
        SigningResolution::MissingFile { path } => {
            if config.policy() == SigningPolicy::RequireSigned {
                return Err(KeypropError::SigningRequired { path }.into());
            }
            println!(
                "{} {} not found; release builds will be unsigned",
                style("!").yellow(),
                path.display()
            );
            return Ok(());
        }
    };

    println!(
        "{} {} is valid (alias '{}')",
        style("✓").green().bold(),
        project.properties_path().display(),
        signing.key_alias()
    );

    if !signing.keystore_path().exists() {
        println!(
            "{} keystore {} does not exist",
            style("!").yellow(),
            signing.keystore_path().display()
        );
    }

    if keytool {
        let info = validate_keystore(&signing).await?;
        println!(
            "{} {} keystore opened, alias '{}' found",
            style("✓").green().bold(),
            info.keystore_type,
            signing.key_alias()
        );
    }

    Ok(())
}

/// Arguments for `keyprop write`.
pub struct WriteArgs {
    pub store_file: Option<String>,
    pub import: Option<PathBuf>,
    pub store_password: String,
    pub key_alias: String,
    pub key_password: String,
    pub force: bool,
}

/// Generate key.properties, optionally importing a keystore into the app module.
pub async fn write(config: &ResolvedConfig, args: WriteArgs) -> Result<()> {
    let project = config.project()?;

    if project.properties_path().exists() && !args.force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            project.properties_path().display()
        );
    }

    let (store_file, imported) = match (&args.import, args.store_file) {
        (Some(source), _) => {
            let (store_file, path) = import_keystore(&project, source).await?;
            (store_file, Some(path))
        }
        (None, Some(store_file)) => (store_file, None),
        (None, None) => bail!("Either --store-file or --import is required"),
    };

    let signing = SigningConfig::new(
        store_file,
        args.store_password,
        args.key_alias,
        args.key_password,
        project.module_dir(),
    );

    let path = match write_key_properties(&project, &signing).await {
        Ok(path) => path,
        Err(e) => {
            if let Some(keystore) = imported {
                remove_imported_keystore(&keystore).await;
            }
            return Err(e.into());
        }
    };
    println!("{} Wrote {}", style("✓").green().bold(), path.display());

    Ok(())
}

/// Copies a keystore under `<module>/signing`.
///
/// Returns the `storeFile` value and the path of the copy.
async fn import_keystore(project: &AndroidProject, source: &Path) -> Result<(String, PathBuf)> {
    let data = tokio::fs::read(source)
        .await
        .with_context(|| format!("Failed to read keystore {}", source.display()))?;
    let keystore_type = detect_keystore_type(&data);

    let path = write_keystore(&project.module_dir().join(SIGNING_DIR), &data, keystore_type).await?;
    println!(
        "{} Imported {} keystore to {}",
        style("✓").green().bold(),
        keystore_type,
        path.display()
    );

    let store_file = format!("{}/keystore.{}", SIGNING_DIR, keystore_type.extension());
    Ok((store_file, path))
}

/// Removes a keystore copied by a `write` that did not complete.
///
/// The signing directory is removed too when nothing else is left in it.
async fn remove_imported_keystore(keystore: &Path) {
    if let Err(e) = tokio::fs::remove_file(keystore).await {
        tracing::warn!("Failed to remove imported keystore {}: {}", keystore.display(), e);
        return;
    }
    tracing::debug!("Removed imported keystore {}", keystore.display());

    if let Some(dir) = keystore.parent() {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

/// Remove key.properties and, with `keystore`, any imported keystore.
pub async fn clean(config: &ResolvedConfig, keystore: bool) -> Result<()> {
    let project = config.project()?;

    if keystore {
        cleanup_android_signing(&project).await?;
        println!("Removed signing files from {}", project.root().display());
        return Ok(());
    }

    if cleanup_key_properties(&project).await? {
        println!("Removed {}", project.properties_path().display());
    } else {
        println!("Nothing to remove");
    }

    Ok(())
}
