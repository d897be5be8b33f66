//! Subcommand implementations

use anyhow::{bail, Context};
use cfgstore_codec::{CodecRegistry, ConfigFileManager, ConfigFormat, ReadContext, StoreOptions};
use cfgstore_core::{full_diff, has_password, search, SearchQuery, StoredConfiguration, StoredConfigurationModifier};
use cfgstore_model::{Catalog, DomainId, EncodingMode, SyntaxRegistry};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// Parse an `--mode` value
///
/// # Errors
/// Returns error for anything but `encoded`, `stripped` or `plain`
pub fn parse_mode(mode: &str) -> anyhow::Result<EncodingMode> {
    match mode {
        "encoded" => Ok(EncodingMode::Encoded),
        "stripped" => Ok(EncodingMode::Stripped),
        "plain" => Ok(EncodingMode::Plain),
        other => bail!("unknown mode '{other}'"),
    }
}

/// First line of stdin, without the line ending
///
/// # Errors
/// Returns error if stdin cannot be read
pub fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Catalog, codecs and options shared by every subcommand
#[derive(Debug, Clone)]
pub struct Session {
    context: ReadContext,
    options: StoreOptions,
    codecs: CodecRegistry,
}

impl Session {
    /// Load the catalog and optional options file
    ///
    /// # Errors
    /// Returns error if either file cannot be read or parsed
    pub fn open(catalog: &Path, options: Option<&Path>) -> anyhow::Result<Self> {
        let json = fs::read_to_string(catalog).with_context(|| format!("reading catalog {}", catalog.display()))?;
        let catalog = Catalog::from_json(&json).with_context(|| format!("parsing catalog {}", catalog.display()))?;
        let options = match options {
            Some(path) => StoreOptions::from_toml_file(path)?,
            None => StoreOptions::default(),
        };
        Ok(Self {
            context: ReadContext::new(Arc::new(catalog), Arc::new(SyntaxRegistry::with_defaults())),
            options,
            codecs: CodecRegistry::with_defaults(),
        })
    }

    fn load(&self, path: &Path) -> anyhow::Result<(ConfigFormat, StoredConfiguration)> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let loaded = self
            .codecs
            .read(&bytes, &self.context)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok(loaded)
    }

    /// Print the header and every record of a file
    ///
    /// # Errors
    /// Returns error if the file cannot be loaded
    pub fn inspect(&self, path: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
        let (format, config) = self.load(path)?;
        writeln!(out, "format:   {format}")?;
        writeln!(out, "created:  {}", config.create_time())?;
        writeln!(out, "modified: {}", config.modify_time().to_rfc3339())?;
        writeln!(out, "password: {}", if has_password(&config) { "set" } else { "not set" })?;
        for key in config.keys() {
            let value = config
                .read_stored_value(&key)
                .map_or_else(|| "(default)".to_string(), |v| v.debug_string(None));
            match config.read_metadata(&key).and_then(|m| m.user_identity.as_ref()) {
                Some(user) => writeln!(out, "{key} = {value}  [{user}]")?,
                None => writeln!(out, "{key} = {value}")?,
            }
        }
        Ok(())
    }

    /// Re-encode `input` into `output`
    ///
    /// # Errors
    /// Returns error if loading or saving fails
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: Option<ConfigFormat>,
        mode: Option<EncodingMode>,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        let (source_format, config) = self.load(input)?;
        let mut options = self.options.clone();
        if let Some(format) = format {
            options = options.with_format(format);
        }
        if let Some(mode) = mode {
            options = options.with_encoding(mode);
        }
        let target = options.format;
        let manager = ConfigFileManager::new(output, self.context.clone(), options);
        manager
            .save(&config)
            .with_context(|| format!("writing {}", output.display()))?;
        writeln!(out, "{} ({source_format}) -> {} ({target})", input.display(), output.display())?;
        Ok(())
    }

    /// Print keys whose values differ
    ///
    /// # Errors
    /// Returns error if either file cannot be loaded
    pub fn diff(&self, before: &Path, after: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
        let (_, before) = self.load(before)?;
        let (_, after) = self.load(after)?;
        let changed = full_diff(&before, &after);
        for key in &changed {
            writeln!(out, "{key}")?;
        }
        tracing::info!(changed = changed.len(), "diff complete");
        Ok(())
    }

    /// Print matching setting keys with their menu location
    ///
    /// # Errors
    /// Returns error if the file cannot be loaded
    pub fn search(&self, path: &Path, query: &str, domain: Option<&str>, out: &mut dyn Write) -> anyhow::Result<()> {
        let (_, config) = self.load(path)?;
        let mut search_query = SearchQuery::new(query);
        if let Some(domain) = domain {
            search_query = search_query.in_domain(DomainId::new(domain));
        }
        let catalog = config.catalog();
        for key in search(&config, &search_query) {
            let location = catalog
                .setting(key.record_id())
                .map(|def| catalog.menu_location(def, key.profile().map(|p| p.as_str())))
                .unwrap_or_default();
            writeln!(out, "{key}\t{location}")?;
        }
        Ok(())
    }

    /// Store a new configuration password and save in place, keeping the
    /// file's format
    ///
    /// # Errors
    /// Returns error for a blank password or if loading or saving fails
    pub fn set_password(&self, path: &Path, password: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let (format, config) = self.load(path)?;
        let options = self.options.clone().with_format(format);
        let manager = ConfigFileManager::new(path, self.context.clone(), options);
        let modifier = StoredConfigurationModifier::new(config);
        modifier.set_password_with_cost(password, self.options.password_cost)?;
        manager.save(&modifier.snapshot())?;
        writeln!(out, "password updated in {}", path.display())?;
        Ok(())
    }
}
