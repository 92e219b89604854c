//! Buildpack builder catalogue

use serde::Serialize;

use crate::config::KetchConfig;

/// Builder used when `app deploy` builds from source without `--builder`
pub const DEFAULT_BUILDER: &str = "heroku/buildpacks:20";

/// A buildpack builder image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Builder {
    pub vendor: String,
    pub image: String,
    pub description: String,
}

impl Builder {
    fn new(vendor: &str, image: &str, description: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            image: image.to_string(),
            description: description.to_string(),
        }
    }
}

const DEFAULT_BUILDERS: &[(&str, &str, &str)] = &[
    ("Google", "gcr.io/buildpacks/builder:v1", "GCP Builder for all runtimes"),
    (
        "Heroku",
        "heroku/buildpacks:18",
        "heroku-18 base image with buildpacks for Ruby, Java, Node.js, Python, Golang, & PHP",
    ),
    (
        "Heroku",
        "heroku/buildpacks:20",
        "heroku-20 base image with buildpacks for Ruby, Java, Node.js, Python, Golang, & PHP",
    ),
    (
        "Paketo Buildpacks",
        "paketobuildpacks/builder:base",
        "Small base image with buildpacks for Java, Node.js, Golang, & .NET Core",
    ),
    (
        "Paketo Buildpacks",
        "paketobuildpacks/builder:full",
        "Larger base image with buildpacks for Java, Node.js, Golang, .NET Core, & PHP",
    ),
    (
        "Paketo Buildpacks",
        "paketobuildpacks/builder:tiny",
        "Tiny base image (bionic build image, distroless run image) with buildpacks for Golang",
    ),
];

/// Built-in builders followed by the ones from `config.toml`
pub fn builders(config: &KetchConfig) -> Vec<Builder> {
    DEFAULT_BUILDERS
        .iter()
        .map(|(vendor, image, description)| Builder::new(vendor, image, description))
        .chain(
            config
                .additional_builders
                .iter()
                .map(|b| Builder::new(&b.vendor, &b.image, &b.description)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdditionalBuilder;

    #[test]
    fn test_default_builders() {
        let builders = builders(&KetchConfig::default());
        assert_eq!(builders.len(), 6);
        assert_eq!(builders[0].vendor, "Google");
        assert!(builders.iter().any(|b| b.image == DEFAULT_BUILDER));
    }

    #[test]
    fn test_additional_builders_come_last() {
        let config = KetchConfig {
            additional_builders: vec![AdditionalBuilder {
                vendor: "test vendor".to_string(),
                image: "test image".to_string(),
                description: "test description".to_string(),
            }],
        };
        let builders = builders(&config);
        assert_eq!(builders.len(), 7);
        assert_eq!(builders[6].image, "test image");
    }
}
