use std::path::PathBuf;

use crate::env::{Env, vars};

/// File name of the persisted token record inside the config directory.
pub const TOKEN_FILE_NAME: &str = "token.json";

/// Returns `~/.config/camper/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("camper"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Location of the token record.
///
/// `BASECAMP_TOKEN_FILE` wins, then `~/.config/camper/token.json`, then
/// `./token.json` when no home directory can be determined.
pub fn token_file_path(env: &Env) -> PathBuf {
    if let Some(path) = env.get(vars::TOKEN_FILE) {
        return PathBuf::from(path);
    }
    config_dir()
        .map(|dir| dir.join(TOKEN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_token_file_wins() {
        let env = Env::from_pairs([(vars::TOKEN_FILE, "/tmp/elsewhere.json")]);
        assert_eq!(token_file_path(&env), PathBuf::from("/tmp/elsewhere.json"));
    }

    #[test]
    fn default_token_file_name() {
        let env = Env::from_pairs(Vec::<(String, String)>::new());
        assert!(token_file_path(&env).ends_with(TOKEN_FILE_NAME));
    }
}
