// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

use std::collections::HashMap;
use thiserror::Error;

use crate::settings::Config;

/// What is being deployed, and where to.
#[derive(PartialEq, Debug, Clone)]
pub struct Deployment {
    pub tag: String,
    pub group: String,
    pub description: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("No deployment group for {0}")]
    UnknownTag(String),
}

impl Deployment {
    /// Empty overrides count as absent.
    pub fn resolve(
        tag: &str,
        group: Option<&str>,
        description: Option<&str>,
        groups: &HashMap<String, String>,
    ) -> Result<Deployment, ResolveError> {
        let group = match group.filter(|g| !g.is_empty()) {
            Some(g) => g.to_string(),
            None => groups
                .get(tag)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownTag(tag.to_string()))?,
        };

        let description = match description.filter(|d| !d.is_empty()) {
            Some(d) => d.to_string(),
            None => format!("Deploy {}", tag),
        };

        Ok(Deployment {
            tag: tag.to_string(),
            group,
            description,
        })
    }

    pub fn s3_location(&self, config: &Config) -> String {
        format!(
            "s3://{}/{}/{}.zip",
            config.bucket,
            config.prefix.trim_matches('/'),
            self.tag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn groups() -> HashMap<String, String> {
        Settings::default().resolve().groups
    }

    #[test]
    fn test_mapped_tags() {
        for (tag, group) in &[("dev", "dev"), ("staging", "staging"), ("release", "prod")] {
            let deployment = Deployment::resolve(tag, None, None, &groups()).unwrap();
            assert_eq!(deployment.group, *group);
        }
    }

    #[test]
    fn test_staging_defaults() {
        assert_eq!(
            Deployment::resolve("staging", None, None, &groups()).unwrap(),
            Deployment {
                tag: "staging".to_string(),
                group: "staging".to_string(),
                description: "Deploy staging".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            Deployment::resolve("unknown-tag", None, None, &groups()),
            Err(ResolveError::UnknownTag("unknown-tag".to_string()))
        );
        assert_eq!(
            ResolveError::UnknownTag("unknown-tag".to_string()).to_string(),
            "No deployment group for unknown-tag"
        );
    }

    #[test]
    fn test_overrides() {
        let deployment = Deployment::resolve(
            "unknown-tag",
            Some("sandbox"),
            Some("hotfix for hugo voting"),
            &groups(),
        )
        .unwrap();
        assert_eq!(deployment.group, "sandbox");
        assert_eq!(deployment.description, "hotfix for hugo voting");

        let deployment = Deployment::resolve("dev", Some(""), Some(""), &groups()).unwrap();
        assert_eq!(deployment.group, "dev");
        assert_eq!(deployment.description, "Deploy dev");
    }

    #[test]
    fn test_s3_location() {
        let deployment = Deployment::resolve("release", None, None, &groups()).unwrap();
        let mut config = Settings::default().resolve();

        assert_eq!(
            deployment.s3_location(&config),
            "s3://deploy.chicon.org/wellington/release.zip"
        );

        config.prefix = "/builds/".to_string();
        assert_eq!(
            deployment.s3_location(&config),
            "s3://deploy.chicon.org/builds/release.zip"
        );
    }
}
