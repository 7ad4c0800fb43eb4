use enrol_config::EnrolConfig;

/// Load `.env` (if any) and the layered configuration.
pub fn load_config() -> anyhow::Result<EnrolConfig> {
    let config = EnrolConfig::load_with_dotenv()?;
    if config.journal.enabled {
        tracing::debug!(
            history_cap = config.journal.history_cap,
            log_cap = config.journal.log_cap,
            "provider journal enabled"
        );
    }
    Ok(config)
}
