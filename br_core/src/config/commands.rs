use serde::{Deserialize, Serialize};

/// Placeholder substituted into [`CommandSet::fill`].
pub const SCALE_FACTOR_PLACEHOLDER: &str = "{scale_factor}";

/// The opaque remote commands of one configuration's phase sequence.
///
/// Any field missing from a JSON override falls back to the PostgreSQL /
/// pgBackRest invocation the benchmark was built around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSet {
    /// Data generation, with `{scale_factor}` substituted per configuration.
    pub fill: String,
    pub measure_size: String,
    pub backup: String,
    pub stop_service: String,
    pub wipe_data: String,
    pub restore: String,
    pub start_service: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            fill: "sudo -u postgres pgbench -i -s {scale_factor} -p 5433 postgres".to_string(),
            measure_size: "sudo -u postgres psql -p 5433 -c \"SELECT pg_size_pretty(pg_database_size('postgres'));\"".to_string(),
            backup: "sudo -u postgres pgbackrest --stanza=test-backup --type=full backup".to_string(),
            stop_service: "sudo systemctl stop postgresql@16-test".to_string(),
            wipe_data: "sudo bash -c 'rm -rf /var/lib/postgresql/16/test/*'".to_string(),
            restore: "sudo -u postgres pgbackrest --stanza=test-backup restore".to_string(),
            start_service: "sudo systemctl start postgresql@16-test".to_string(),
        }
    }
}

impl CommandSet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn fill_command(&self, scale_factor: u32) -> String {
        self.fill
            .replace(SCALE_FACTOR_PLACEHOLDER, &scale_factor.to_string())
    }

    /// Inserts backup tuning flags ahead of the trailing `backup` verb, or
    /// appends them when the command does not end with it.
    pub fn with_backup_options(
        mut self,
        process_max: Option<u32>,
        archive_timeout: Option<u32>,
    ) -> Self {
        let mut flags = Vec::new();
        if let Some(process_max) = process_max {
            flags.push(format!("--process-max={process_max}"));
        }
        if let Some(archive_timeout) = archive_timeout {
            flags.push(format!("--archive-timeout={archive_timeout}"));
        }
        if flags.is_empty() {
            return self;
        }
        let flags = flags.join(" ");
        self.backup = match self.backup.strip_suffix(" backup") {
            Some(head) => format!("{head} {flags} backup"),
            None => format!("{} {flags}", self.backup),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_scale_factor() {
        let commands = CommandSet::default();
        assert_eq!(
            commands.fill_command(68),
            "sudo -u postgres pgbench -i -s 68 -p 5433 postgres"
        );
    }

    #[test]
    fn backup_options_go_before_the_verb() {
        let commands = CommandSet::default().with_backup_options(Some(4), Some(300));
        assert_eq!(
            commands.backup,
            "sudo -u postgres pgbackrest --stanza=test-backup --type=full --process-max=4 --archive-timeout=300 backup"
        );
    }

    #[test]
    fn backup_options_append_without_verb() {
        let commands = CommandSet {
            backup: "run-backup".to_string(),
            ..CommandSet::default()
        }
        .with_backup_options(None, Some(60));
        assert_eq!(commands.backup, "run-backup --archive-timeout=60");
    }

    #[test]
    fn partial_json_override_keeps_defaults() {
        let commands = CommandSet::from_json(r#"{"restore": "my-restore"}"#).unwrap();
        assert_eq!(commands.restore, "my-restore");
        assert_eq!(commands.backup, CommandSet::default().backup);
    }
}
