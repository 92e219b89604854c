//! Integration tests for CLI commands that need no cluster

use std::process::Command;
use tempfile::TempDir;

/// Helper to run ketch with an isolated KETCH_HOME
fn ketch_in(home: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ketch"))
        .args(args)
        .env("KETCH_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute ketch")
}

fn ketch(args: &[&str]) -> std::process::Output {
    let home = TempDir::new().unwrap();
    ketch_in(home.path(), args)
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn fixture(name: &str) -> String {
    format!("{}/{}", fixtures_path(), name)
}

mod help_command {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let output = ketch(&["--help"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        for command in ["app", "framework", "unit", "env", "cname", "builder", "application", "controller"] {
            assert!(stdout.contains(command), "missing {} in help", command);
        }
    }

    #[test]
    fn test_version() {
        let output = ketch(&["--version"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_pool_alias() {
        let output = ketch(&["pool", "--help"]);
        assert!(output.status.success());
    }
}

mod builder_command {
    use super::*;

    #[test]
    fn test_builder_list_defaults() {
        let output = ketch(&["builder", "list"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("VENDOR"));
        assert!(lines[0].contains("IMAGE"));
        assert!(lines[0].contains("DESCRIPTION"));
        assert!(stdout.contains("Heroku:"));
        assert!(stdout.contains("heroku/buildpacks:20"));
    }

    #[test]
    fn test_builder_list_with_additional_builders() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[[additional-builders]]\nvendor = \"test vendor\"\nimage = \"test image\"\ndescription = \"test description\"\n",
        )
        .unwrap();

        let output = ketch_in(home.path(), &["builder", "list"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let last = stdout.lines().last().unwrap();
        assert!(last.starts_with("test vendor:"));
        assert!(last.contains("test image"));
    }

    #[test]
    fn test_builder_list_json() {
        let output = ketch(&["builder", "list", "--output", "json"]);

        assert!(output.status.success());
        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
        let builders = json.as_array().unwrap();
        assert_eq!(builders.len(), 6);
        assert_eq!(builders[0]["vendor"], "Google");
    }

    #[test]
    fn test_invalid_config_fails() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("config.toml"), "additional-builders = 3\n").unwrap();

        let output = ketch_in(home.path(), &["builder", "list"]);

        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(2));
    }
}

mod application_command {
    use super::*;

    #[test]
    fn test_template_renders_every_link() {
        let output = ketch(&[
            "application",
            "template",
            "-f",
            &fixture("application.yaml"),
            "-f",
            &fixture("components.yaml"),
        ]);

        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("# Source: Chart.yaml"));
        assert!(stdout.contains("# Source: templates/frontend.yaml"));
        assert!(stdout.contains("# Source: templates/frontend-1.yaml"));
        assert!(stdout.contains("# Source: templates/jobs.yaml"));
        assert!(stdout.contains("image: me/my-frontend:1.2.3"));
        assert!(stdout.contains("replicas: 3"));
        assert!(stdout.contains("automountServiceAccountToken: true"));
        assert_eq!(stdout.matches("image: me/jobs:0.1.0").count(), 2);
    }

    #[test]
    fn test_template_chart_metadata() {
        let output = ketch(&[
            "application",
            "template",
            "-f",
            &fixture("application.yaml"),
            "-f",
            &fixture("components.yaml"),
            "--output",
            "json",
        ]);

        assert!(output.status.success());
        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
        let chart_yaml = json["Chart.yaml"].as_str().unwrap();
        assert!(chart_yaml.contains("name: dashboard"));
        assert!(chart_yaml.contains("description: sample dashboard"));
        assert!(chart_yaml.contains("version: v0.0.0"));
        assert!(json.get("templates/jobs.yaml").is_some());
    }

    #[test]
    fn test_template_unknown_component_type() {
        let output = ketch(&[
            "application",
            "template",
            "-f",
            &fixture("application-unknown-component.yaml"),
            "-f",
            &fixture("components.yaml"),
        ]);

        assert_eq!(output.status.code(), Some(3));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("webservr"));
        assert!(stderr.contains("is not defined"));
    }

    #[test]
    fn test_template_missing_required_parameter() {
        let output = ketch(&[
            "application",
            "template",
            "-f",
            &fixture("application-missing-image.yaml"),
            "-f",
            &fixture("components.yaml"),
        ]);

        assert_eq!(output.status.code(), Some(3));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("required parameter not found: image"));
    }

    #[test]
    fn test_template_without_application() {
        let output = ketch(&["application", "template", "-f", &fixture("components.yaml")]);

        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_template_missing_file() {
        let output = ketch(&["application", "template", "-f", &fixture("does-not-exist.yaml")]);

        assert_eq!(output.status.code(), Some(5));
    }
}

mod framework_command {
    use super::*;

    #[test]
    fn test_add_yaml_without_name() {
        let output = ketch(&["framework", "add", &fixture("framework-no-name.yaml")]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("a framework name is required"));
    }

    #[test]
    fn test_add_yaml_with_flags() {
        let output = ketch(&[
            "framework",
            "add",
            &fixture("framework.yaml"),
            "--namespace",
            "gke",
        ]);

        assert_eq!(output.status.code(), Some(64));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("command line flags are not permitted"));
    }

    #[test]
    fn test_add_rejects_unknown_ingress_type() {
        let output = ketch(&["framework", "add", "hello", "--ingress-type", "haproxy"]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("haproxy"));
    }

    #[test]
    fn test_update_requires_a_flag() {
        let output = ketch(&["framework", "update", "hello"]);

        assert_eq!(output.status.code(), Some(64));
    }
}

mod app_command {
    use super::*;

    #[test]
    fn test_deploy_requires_image() {
        let output = ketch(&["app", "deploy", "dashboard", "--framework", "working-pool"]);

        assert_eq!(output.status.code(), Some(64));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("an image is required"));
    }

    #[test]
    fn test_deploy_rejects_invalid_env() {
        let output = ketch(&["app", "deploy", "dashboard", "-i", "img", "-e", "NOVALUE"]);

        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_deploy_rejects_invalid_name() {
        let output = ketch(&["app", "deploy", "Dashboard_1", "-i", "img"]);

        assert_eq!(output.status.code(), Some(2));
    }
}

mod controller_command {
    use super::*;

    #[test]
    fn test_print_crds() {
        let output = ketch(&["controller", "--print-crds"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.matches("kind: CustomResourceDefinition").count(), 4);
        for name in ["applications", "components", "frameworks", "apps"] {
            assert!(stdout.contains(&format!("name: {}.theketch.io", name)));
        }
    }
}
