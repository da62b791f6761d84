use std::sync::Arc;

use mailsense_agent::AgentRuntime;
use mailsense_core::config::{AppConfig, ConfigError, LoadOptions};
use mailsense_core::{AnalysisError, InMemoryMailbox, MailSource, MailboxLoadError};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub runtime: AgentRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("mailbox could not be opened: {0}")]
    Mailbox(#[from] MailboxLoadError),
    #[error("analysis runtime could not be built: {0}")]
    Runtime(#[from] AnalysisError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let mail = open_mailbox(&config)?;
    let runtime = AgentRuntime::from_config(&config, mail)?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        provider = %config.llm.provider,
        "application bootstrap complete"
    );
    Ok(Application { config, runtime })
}

fn open_mailbox(config: &AppConfig) -> Result<Arc<dyn MailSource>, MailboxLoadError> {
    match &config.mailbox.path {
        Some(path) => {
            let mailbox = InMemoryMailbox::from_json_file(path)?;
            info!(
                event_name = "system.bootstrap.mailbox_loaded",
                correlation_id = "bootstrap",
                path = %path.display(),
                messages = mailbox.len(),
                "mailbox file loaded"
            );
            Ok(Arc::new(mailbox))
        }
        None => {
            warn!(
                event_name = "system.bootstrap.mailbox_empty",
                correlation_id = "bootstrap",
                "no mailbox path configured; every fetch will fail"
            );
            Ok(Arc::new(InMemoryMailbox::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use mailsense_core::config::{ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use super::{bootstrap, BootstrapError};

    fn overrides(dir: &TempDir, mailbox: Option<&str>) -> ConfigOverrides {
        ConfigOverrides {
            llm_provider: Some("google".to_string()),
            google_api_key: Some("test-google-key".to_string()),
            mailbox_path: mailbox.map(|name| dir.path().join(name)),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn bootstrap_loads_mailbox_and_config_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("mailbox.json"),
            r#"[{"id": "m1", "from": "a@corp.com", "subject": "Hi", "snippet": "hello"}]"#,
        )
        .expect("write mailbox");
        let config_path = dir.path().join("mailsense.toml");
        fs::write(&config_path, "[cache]\nttl_secs = 120\n\n[batch]\nmax_messages = 20\n")
            .expect("write config");

        let app = bootstrap(LoadOptions {
            config_path: Some(config_path),
            require_file: true,
            overrides: overrides(&dir, Some("mailbox.json")),
        })
        .expect("bootstrap succeeds");

        assert_eq!(app.config.cache.ttl_secs, 120);
        assert_eq!(app.runtime.batch().max_messages(), 20);
    }

    #[test]
    fn unreadable_mailbox_fails_bootstrap() {
        let dir = TempDir::new().expect("tempdir");

        let result = bootstrap(LoadOptions {
            config_path: None,
            require_file: false,
            overrides: overrides(&dir, Some("missing.json")),
        });

        assert!(matches!(result, Err(BootstrapError::Mailbox(_))));
    }
}
