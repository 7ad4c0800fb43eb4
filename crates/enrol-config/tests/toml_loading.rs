//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed env var manipulation.

use enrol_config::EnrolConfig;
use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};

#[test]
fn loads_every_section_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r"
[state]
log_cap = 10

[journal]
enabled = true
history_cap = 12
log_cap = 14

[jobs]
learner_batch_size = 2
course_batch_size = 4
tick_interval_secs = 15

[cache]
max_course_instances = 8
",
        )?;

        let figment = Figment::from(Serialized::defaults(EnrolConfig::default()))
            .merge(Toml::file("config.toml"));
        let config = EnrolConfig::from_figment(&figment).expect("config loads");

        assert_eq!(config.state.log_cap, 10);
        assert!(config.journal.enabled);
        assert_eq!(config.journal.history_cap, 12);
        assert_eq!(config.journal.log_cap, 14);
        assert_eq!(config.jobs.learner_batch_size, 2);
        assert_eq!(config.jobs.course_batch_size, 4);
        assert_eq!(config.jobs.tick_interval_secs, 15);
        assert_eq!(config.cache.max_course_instances, 8);
        Ok(())
    });
}

#[test]
fn partial_toml_keeps_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[journal]\nenabled = true\n")?;

        let figment = Figment::from(Serialized::defaults(EnrolConfig::default()))
            .merge(Toml::file("config.toml"));
        let config = EnrolConfig::from_figment(&figment).expect("config loads");

        assert!(config.journal.enabled);
        assert_eq!(config.journal.history_cap, 30);
        assert_eq!(config.jobs.learner_batch_size, 20);
        Ok(())
    });
}

#[test]
fn wrong_type_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[jobs]\nlearner_batch_size = \"many\"\n")?;

        let figment = Figment::from(Serialized::defaults(EnrolConfig::default()))
            .merge(Toml::file("config.toml"));
        assert!(EnrolConfig::from_figment(&figment).is_err());
        Ok(())
    });
}
