use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
        }
    }
}

/// Loads settings from `story.toml` in the working directory, then lets
/// environment variables override them.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = std::fs::read_to_string("story.toml") {
        apply_file_settings(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings);

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(value) = file_cfg.get("server_url") {
            settings.server_url = value.clone();
        }
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(value) = std::env::var("STORY_SERVER_URL") {
        settings.server_url = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_localhost() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn file_settings_override_defaults() {
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, "server_url = \"http://game.example\"\n");
        assert_eq!(settings.server_url, "http://game.example");
    }

    #[test]
    fn malformed_files_keep_defaults() {
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, "server_url = [");
        assert_eq!(settings.server_url, Settings::default().server_url);
    }

    #[test]
    fn env_overrides_win() {
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, "server_url = \"http://game.example\"\n");
        std::env::set_var("STORY_SERVER_URL", "http://env.example");
        apply_env_overrides(&mut settings);
        std::env::remove_var("STORY_SERVER_URL");
        assert_eq!(settings.server_url, "http://env.example");
    }
}
