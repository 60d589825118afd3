use std::fs;
use std::path::Path;

use serde::Deserialize;

pub const DOTFILE_NAME: &str = ".nodewire";

/// Project configuration read from a `.nodewire` file.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dotfile {
    #[serde(default)]
    pub weaver: WeaverConfig,
}

impl Dotfile {
    /// Reads the dotfile from `dir`, falling back to an empty configuration when there is none.
    pub fn load_or_default(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        match fs::read_to_string(dir.as_ref().join(DOTFILE_NAME)) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
            Ok(content) => Ok(toml::from_str(&content)?),
        }
    }
}

/// Names the weaver relies on, every one of them optional.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeaverConfig {
    pub root_class: Option<String>,
    pub lifecycle_method: Option<String>,
    pub marker_attribute: Option<String>,
    pub lookup_method: Option<String>,
    pub exception_class: Option<String>,
    pub string_type: Option<String>,
    pub helper_class: Option<String>,
    pub helper_method: Option<String>,
    pub message_namespace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_dotfile() {
        let content = r#"
            weaver.root_class = "Engine.Object"
            weaver.lifecycle_method = "_EnterTree"
        "#;

        let dotfile: Dotfile = toml::from_str(content).unwrap();
        assert_eq!(
            dotfile,
            Dotfile {
                weaver: WeaverConfig {
                    root_class: Some(String::from("Engine.Object")),
                    lifecycle_method: Some(String::from("_EnterTree")),
                    ..Default::default()
                },
            }
        )
    }

    #[test]
    fn parse_weaver_table() {
        let content = r#"
            [weaver]
            helper_class = "Game.Generated.Nodes"
            message_namespace = "Game"
        "#;

        let dotfile: Dotfile = toml::from_str(content).unwrap();
        assert_eq!(
            dotfile.weaver.helper_class.as_deref(),
            Some("Game.Generated.Nodes")
        );
        assert_eq!(dotfile.weaver.message_namespace.as_deref(), Some("Game"));
        assert_eq!(dotfile.weaver.root_class, None);
    }

    #[test]
    fn rejects_unknown_keys() {
        let content = r#"
            [weaver]
            root = "Godot.Node"
        "#;

        assert!(toml::from_str::<Dotfile>(content).is_err());
    }

    #[test]
    fn missing_dotfile_is_empty() {
        let dotfile = Dotfile::load_or_default(env!("CARGO_MANIFEST_DIR")).unwrap();
        assert_eq!(dotfile, Dotfile::default());
    }
}
