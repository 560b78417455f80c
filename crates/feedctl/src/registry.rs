//! Configuration-file backed [`RegistryService`].

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use feedctl_config::{Config, SourceEntry, load_config, save_config};
use feedctl_encrypt::CredentialCipher;

use crate::reporter::Reporter;
use crate::source::{RegistryService, SourceCommandSpec};

pub const NO_CHANGE_MESSAGE: &str = "Nothing to change. Config already set.";
pub const NOOP_MESSAGE: &str = "Would have made a change to the configuration.";

/// Source registry persisted in the feedctl configuration file.
///
/// Listing goes to `out`; progress and no-change warnings go to the reporter.
pub struct ConfigRegistry<'a> {
    path: PathBuf,
    config: Config,
    cipher: CredentialCipher,
    out: &'a mut dyn Write,
    reporter: &'a mut dyn Reporter,
}

impl<'a> ConfigRegistry<'a> {
    /// Load the registry from `path`. A missing file is an empty registry.
    pub fn open(path: &Path, out: &'a mut dyn Write, reporter: &'a mut dyn Reporter) -> Result<Self> {
        let config = load_config(path)?;
        let cipher = CredentialCipher::new(config.encryption().clone());
        Ok(Self {
            path: path.to_path_buf(),
            config,
            cipher,
            out,
            reporter,
        })
    }

    fn save(&self) -> Result<()> {
        save_config(&self.path, &self.config)
    }

    fn required_name<'s>(spec: &'s SourceCommandSpec) -> Result<&'s str> {
        spec.name()
            .with_context(|| format!("source '{}' requires --name", spec.command))
    }

    /// Flip the disabled flag; returns whether anything changed.
    fn set_disabled(&mut self, name: &str, disabled: bool) -> Result<bool> {
        let Some(entry) = self.config.find_source_mut(name) else {
            return Ok(false);
        };
        if entry.disabled == disabled {
            return Ok(false);
        }
        entry.disabled = disabled;
        self.save()?;
        Ok(true)
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl RegistryService for ConfigRegistry<'_> {
    fn list(&mut self, _spec: &SourceCommandSpec) -> Result<()> {
        if self.config.sources().is_empty() {
            self.reporter.info("No sources configured.");
            return Ok(());
        }

        for source in self.config.sources() {
            let disabled = if source.disabled { " [Disabled]" } else { "" };
            let user = source
                .user
                .as_deref()
                .map(|u| format!(" | user: {u}"))
                .unwrap_or_default();
            writeln!(self.out, "{}{disabled} - {}{user}", source.name, source.url)
                .context("failed to write source listing")?;
        }

        Ok(())
    }

    fn add(&mut self, spec: &SourceCommandSpec) -> Result<()> {
        let name = Self::required_name(spec)?;

        if self.config.find_source(name).is_some() {
            self.reporter.warn(NO_CHANGE_MESSAGE);
            return Ok(());
        }

        let url = spec.source.trim();
        if url.is_empty() {
            bail!("--source is required when adding a source");
        }

        let mut entry = SourceEntry::new(name, url);
        entry.user = non_blank(spec.username.as_ref()).map(str::to_string);
        entry.password = non_blank(spec.password.as_ref())
            .map(|p| self.cipher.seal(p))
            .transpose()
            .context("failed to encrypt source password")?;

        self.config.add_source(entry);
        self.save()?;
        self.reporter.info(&format!("Added {name} - {url}"));

        Ok(())
    }

    fn remove(&mut self, spec: &SourceCommandSpec) -> Result<()> {
        let name = Self::required_name(spec)?;

        match self.config.remove_source(name) {
            Some(removed) => {
                self.save()?;
                self.reporter.info(&format!("Removed {}", removed.name));
            }
            None => self.reporter.warn(NO_CHANGE_MESSAGE),
        }

        Ok(())
    }

    fn disable(&mut self, spec: &SourceCommandSpec) -> Result<()> {
        let name = Self::required_name(spec)?;

        if self.set_disabled(name, true)? {
            self.reporter.info(&format!("Disabled {name}"));
        } else {
            self.reporter.warn(NO_CHANGE_MESSAGE);
        }

        Ok(())
    }

    fn enable(&mut self, spec: &SourceCommandSpec) -> Result<()> {
        let name = Self::required_name(spec)?;

        if self.set_disabled(name, false)? {
            self.reporter.info(&format!("Enabled {name}"));
        } else {
            self.reporter.warn(NO_CHANGE_MESSAGE);
        }

        Ok(())
    }

    fn noop(&mut self, _spec: &SourceCommandSpec) -> Result<()> {
        self.reporter.info(NOOP_MESSAGE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use feedctl_encrypt::decrypt_secret;
    use tempfile::tempdir;

    use super::*;
    use crate::reporter::tests::CollectingReporter;
    use crate::source::SourceCommand;

    fn spec(command: SourceCommand, name: &str, source: &str) -> SourceCommandSpec {
        SourceCommandSpec {
            command,
            name: Some(name.to_string()),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Run one registry call against the config at `path`, returning stdout.
    fn run(
        path: &Path,
        reporter: &mut CollectingReporter,
        call: impl FnOnce(&mut ConfigRegistry<'_>) -> Result<()>,
    ) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut registry = ConfigRegistry::open(path, &mut out, reporter)?;
            call(&mut registry)?;
        }
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn add_then_list() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut reporter = CollectingReporter::default();

        run(&path, &mut reporter, |r| {
            r.add(&spec(SourceCommand::Add, "bob", "https://feed.example/v2/"))
        })
        .expect("add");
        assert_eq!(reporter.infos, vec!["Added bob - https://feed.example/v2/"]);

        let listing = run(&path, &mut reporter, |r| r.list(&SourceCommandSpec::default())).expect("list");
        assert_eq!(listing, "bob - https://feed.example/v2/\n");
    }

    #[test]
    fn list_empty_registry_reports_it() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let listing = run(&td.path().join("config.toml"), &mut reporter, |r| {
            r.list(&SourceCommandSpec::default())
        })
        .expect("list");
        assert!(listing.is_empty());
        assert_eq!(reporter.infos, vec!["No sources configured."]);
    }

    #[test]
    fn adding_an_existing_name_changes_nothing() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut reporter = CollectingReporter::default();

        run(&path, &mut reporter, |r| r.add(&spec(SourceCommand::Add, "bob", "https://a/"))).expect("add");
        run(&path, &mut reporter, |r| r.add(&spec(SourceCommand::Add, "BOB", "https://b/"))).expect("add");

        assert_eq!(reporter.warns, vec![NO_CHANGE_MESSAGE]);
        let config = load_config(&path).expect("load");
        assert_eq!(config.sources().len(), 1);
        assert_eq!(config.sources()[0].url, "https://a/");
    }

    #[test]
    fn add_requires_a_location() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let err = run(&td.path().join("config.toml"), &mut reporter, |r| {
            r.add(&spec(SourceCommand::Add, "bob", "  "))
        })
        .expect_err("no source");
        assert!(err.to_string().contains("--source is required"));
    }

    #[test]
    fn password_is_stored_encrypted() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");

        std::fs::write(
            &path,
            "[encryption]\npassphrase = \"test-pass\"\nenv_var = \"FEEDCTL_TEST_REGISTRY_KEY\"\n",
        )
        .expect("seed");

        temp_env::with_var_unset("FEEDCTL_TEST_REGISTRY_KEY", || {
            let mut reporter = CollectingReporter::default();
            let mut add = spec(SourceCommand::Add, "secure", "https://secure/");
            add.username = Some("ci".to_string());
            add.password = Some("hunter2".to_string());
            run(&path, &mut reporter, |r| r.add(&add)).expect("add");
        });

        let stored = load_config(&path).expect("load");
        let entry = stored.find_source("secure").expect("entry");
        assert_eq!(entry.user.as_deref(), Some("ci"));
        let sealed = entry.password.as_deref().expect("password");
        assert_ne!(sealed, "hunter2");
        assert_eq!(decrypt_secret(sealed, "test-pass").expect("decrypt"), "hunter2");
    }

    #[test]
    fn password_without_passphrase_fails_and_saves_nothing() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        std::fs::write(&path, "[encryption]\nenv_var = \"FEEDCTL_TEST_REGISTRY_NOKEY\"\n")
            .expect("seed");

        temp_env::with_var_unset("FEEDCTL_TEST_REGISTRY_NOKEY", || {
            let mut reporter = CollectingReporter::default();
            let mut add = spec(SourceCommand::Add, "secure", "https://secure/");
            add.password = Some("hunter2".to_string());
            let err = run(&path, &mut reporter, |r| r.add(&add)).expect_err("no passphrase");
            assert!(format!("{err:#}").contains("FEEDCTL_TEST_REGISTRY_NOKEY"));
        });

        assert!(load_config(&path).expect("load").sources().is_empty());
    }

    #[test]
    fn disable_enable_cycle() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut reporter = CollectingReporter::default();

        run(&path, &mut reporter, |r| r.add(&spec(SourceCommand::Add, "bob", "https://a/"))).expect("add");
        run(&path, &mut reporter, |r| r.disable(&spec(SourceCommand::Disable, "bob", ""))).expect("disable");
        assert!(load_config(&path).expect("load").sources()[0].disabled);

        let listing = run(&path, &mut reporter, |r| r.list(&SourceCommandSpec::default())).expect("list");
        assert_eq!(listing, "bob [Disabled] - https://a/\n");

        run(&path, &mut reporter, |r| r.disable(&spec(SourceCommand::Disable, "bob", ""))).expect("disable again");
        run(&path, &mut reporter, |r| r.enable(&spec(SourceCommand::Enable, "Bob", ""))).expect("enable");
        assert!(!load_config(&path).expect("load").sources()[0].disabled);

        assert_eq!(
            reporter.infos,
            vec!["Added bob - https://a/", "Disabled bob", "Enabled Bob"]
        );
        assert_eq!(reporter.warns, vec![NO_CHANGE_MESSAGE]);
    }

    #[test]
    fn remove_missing_source_warns() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut reporter = CollectingReporter::default();

        run(&path, &mut reporter, |r| r.remove(&spec(SourceCommand::Remove, "ghost", ""))).expect("remove");
        assert_eq!(reporter.warns, vec![NO_CHANGE_MESSAGE]);
        assert!(!path.exists());

        run(&path, &mut reporter, |r| r.add(&spec(SourceCommand::Add, "bob", "https://a/"))).expect("add");
        run(&path, &mut reporter, |r| r.remove(&spec(SourceCommand::Remove, "BOB", ""))).expect("remove");
        assert_eq!(reporter.infos.last().map(String::as_str), Some("Removed bob"));
        assert!(load_config(&path).expect("load").sources().is_empty());
    }

    #[test]
    fn noop_leaves_config_untouched() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut reporter = CollectingReporter::default();

        run(&path, &mut reporter, |r| r.noop(&spec(SourceCommand::Add, "bob", "https://a/"))).expect("noop");

        assert_eq!(reporter.infos, vec![NOOP_MESSAGE]);
        assert!(!path.exists());
    }

    #[test]
    fn list_shows_user() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.toml");
        let mut config = Config::new();
        let mut entry = SourceEntry::new("internal", "https://internal/");
        entry.user = Some("ci".to_string());
        config.add_source(entry);
        save_config(&path, &config).expect("seed");

        let mut reporter = CollectingReporter::default();
        let listing = run(&path, &mut reporter, |r| r.list(&SourceCommandSpec::default())).expect("list");
        assert_eq!(listing, "internal - https://internal/ | user: ci\n");
    }
}
