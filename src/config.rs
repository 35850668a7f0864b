use std::collections::HashMap;
use std::fmt::Write as _;

use thiserror::Error;

pub const HOME: &str = "HOME";

const FOLDER_PREFIX: &str = "FOLDER_ID_";
const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_DRIVE_API_ENDPOINT: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc";

/// Folder aliases mapped to drive folder ids. `HOME` always sorts first,
/// the remaining aliases follow in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMap {
    entries: Vec<(String, String)>,
}

impl FolderMap {
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let mut extra: Vec<(String, String)> = env
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(FOLDER_PREFIX)?;
                (!name.is_empty() && !value.is_empty()).then(|| (name.to_string(), value.clone()))
            })
            .collect();
        extra.sort_by(|a, b| a.0.cmp(&b.0));

        // FOLDER_ID_HOME overrides FOLDER_ID.
        let home = match extra.iter().position(|(name, _)| name == HOME) {
            Some(index) => Some(extra.remove(index).1),
            None => non_empty(env, "FOLDER_ID").map(str::to_string),
        };

        let mut entries = Vec::with_capacity(extra.len() + 1);
        if let Some(id) = home {
            entries.push((HOME.to_string(), id));
        }
        entries.extend(extra);
        Self { entries }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, id)| id.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_home(&self) -> bool {
        self.contains(HOME)
    }

    /// `HOME` when configured, otherwise the first alias, otherwise literally `HOME`.
    pub fn default_alias(&self) -> &str {
        if self.has_home() {
            return HOME;
        }
        self.entries
            .first()
            .map(|(name, _)| name.as_str())
            .unwrap_or(HOME)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), id.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token: String,
    pub drive_api: String,
    pub download: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub folders: FolderMap,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

/// What was found in the environment, kept for the diagnostic body.
#[derive(Debug, Clone)]
pub struct Presence {
    client_id: bool,
    client_secret: bool,
    refresh_token: bool,
    primary_folder: bool,
    folders: FolderMap,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}", .0.missing_credentials())]
    MissingCredentials(Presence),
    #[error("{}", .0.no_folders())]
    NoFolders(Presence),
}

impl Config {
    /// Resolves the request configuration, or reports what is missing.
    pub fn resolve(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let folders = FolderMap::from_env(env);
        let client_id = non_empty(env, "CLIENT_ID");
        let client_secret = non_empty(env, "CLIENT_SECRET");
        let refresh_token = non_empty(env, "REFRESH_TOKEN");

        let presence = Presence {
            client_id: client_id.is_some(),
            client_secret: client_secret.is_some(),
            refresh_token: refresh_token.is_some(),
            primary_folder: non_empty(env, "FOLDER_ID").is_some(),
            folders: folders.clone(),
        };

        let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (client_id, client_secret, refresh_token)
        else {
            return Err(ConfigError::MissingCredentials(presence));
        };
        if folders.is_empty() {
            return Err(ConfigError::NoFolders(presence));
        }

        Ok(Self {
            folders,
            credentials: Credentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                refresh_token: refresh_token.to_string(),
            },
            endpoints: Endpoints {
                token: endpoint(env, "TOKEN_ENDPOINT", DEFAULT_TOKEN_ENDPOINT),
                drive_api: endpoint(env, "DRIVE_API_ENDPOINT", DEFAULT_DRIVE_API_ENDPOINT),
                download: endpoint(env, "DRIVE_DOWNLOAD_ENDPOINT", DEFAULT_DOWNLOAD_ENDPOINT),
            },
        })
    }
}

impl Presence {
    fn missing_credentials(&self) -> String {
        let mut out = String::from("Missing environment variables:\n");
        self.write_credentials(&mut out);

        let count = self.folders.len();
        let _ = writeln!(out, "\nFolders configured: {count}");
        for (alias, id) in self.folders.iter() {
            let _ = writeln!(out, "- {alias}: {id}");
        }
        let mode = match count {
            0 => "No folders",
            1 => "Single folder",
            _ => "Multi-folder",
        };
        let _ = writeln!(out, "\nConfiguration mode: {mode}");
        let _ = writeln!(out, "FOLDER_ID as HOME: {}", if self.primary_folder { "YES" } else { "NO" });
        let additional = self.folders.iter().filter(|(alias, _)| *alias != HOME).count();
        let _ = write!(out, "Additional folders: {additional}");
        out
    }

    fn no_folders(&self) -> String {
        let mut out = String::from(
            "No folders configured! Please add at least one:\n\
             - FOLDER_ID (for single folder setup)\n\
             - FOLDER_ID_[NAME] (for multi-folder setup)\n\
             \nCurrent environment variables:\n",
        );
        self.write_credentials(&mut out);
        let _ = write!(out, "FOLDER_ID: {}", status(self.primary_folder));
        out
    }

    fn write_credentials(&self, out: &mut String) {
        let _ = writeln!(out, "CLIENT_ID: {}", status(self.client_id));
        let _ = writeln!(out, "CLIENT_SECRET: {}", status(self.client_secret));
        let _ = writeln!(out, "REFRESH_TOKEN: {}", status(self.refresh_token));
    }
}

fn status(present: bool) -> &'static str {
    if present {
        "OK"
    } else {
        "MISSING"
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn endpoint(env: &HashMap<String, String>, key: &str, default: &str) -> String {
    non_empty(env, key)
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
pub(crate) fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDS: [(&str, &str); 3] = [
        ("CLIENT_ID", "id"),
        ("CLIENT_SECRET", "secret"),
        ("REFRESH_TOKEN", "refresh"),
    ];

    #[test]
    fn test_folder_map_order() {
        let env = env_of(&[
            ("FOLDER_ID_Zeta", "z"),
            ("FOLDER_ID", "home"),
            ("FOLDER_ID_Alpha", "a"),
            ("FOLDER_ID_", "ignored"),
            ("FOLDER_ID_Empty", ""),
        ]);
        let folders = FolderMap::from_env(&env);
        let aliases: Vec<_> = folders.iter().map(|(alias, _)| alias).collect();
        assert_eq!(aliases, vec!["HOME", "Alpha", "Zeta"]);
        assert_eq!(folders.get("Alpha"), Some("a"));
        assert_eq!(folders.default_alias(), "HOME");
    }

    #[test]
    fn test_default_alias_without_home() {
        let folders = FolderMap::from_env(&env_of(&[("FOLDER_ID_Music", "m"), ("FOLDER_ID_Docs", "d")]));
        assert_eq!(folders.default_alias(), "Docs");
        assert_eq!(FolderMap::default().default_alias(), "HOME");
    }

    #[test]
    fn test_resolve_ok_with_default_endpoints() {
        let mut env = env_of(&CREDS);
        env.insert("FOLDER_ID".into(), "root".into());
        env.insert("DRIVE_API_ENDPOINT".into(), "http://localhost:9000/drive/".into());

        let config = Config::resolve(&env).unwrap();
        assert_eq!(config.folders.get(HOME), Some("root"));
        assert_eq!(config.endpoints.token, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.endpoints.drive_api, "http://localhost:9000/drive");
        assert_eq!(config.credentials.refresh_token, "refresh");
    }

    #[test]
    fn test_missing_credentials_are_enumerated() {
        let env = env_of(&[("CLIENT_ID", "id"), ("CLIENT_SECRET", ""), ("FOLDER_ID", "root")]);
        let err = Config::resolve(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));

        let body = err.to_string();
        assert!(body.contains("CLIENT_ID: OK"));
        assert!(body.contains("CLIENT_SECRET: MISSING"));
        assert!(body.contains("REFRESH_TOKEN: MISSING"));
        assert!(body.contains("- HOME: root"));
        assert!(body.contains("Configuration mode: Single folder"));
        assert!(body.contains("FOLDER_ID as HOME: YES"));
    }

    #[test]
    fn test_credentials_checked_before_folders() {
        let err = Config::resolve(&HashMap::new()).unwrap_err();
        let body = err.to_string();
        assert!(body.starts_with("Missing environment variables:"));
        assert!(body.contains("Configuration mode: No folders"));
    }

    #[test]
    fn test_no_folders_has_distinct_body() {
        let err = Config::resolve(&env_of(&CREDS)).unwrap_err();
        assert!(matches!(err, ConfigError::NoFolders(_)));

        let body = err.to_string();
        assert!(body.starts_with("No folders configured!"));
        assert!(body.contains("FOLDER_ID: MISSING"));
        assert!(body.contains("REFRESH_TOKEN: OK"));
    }
}
