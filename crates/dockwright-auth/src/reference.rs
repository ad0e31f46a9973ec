//! Image reference parsing.
//!
//! Splits `[registry/]repository[:tag|@digest]` references and resolves the
//! registry hostname following the Docker CLI rules: the first path segment
//! names a registry only if it contains `.` or `:` or is `localhost`.

use crate::error::{AuthError, Result};
use crate::model::DEFAULT_REGISTRY_URL;
use regex::Regex;
use std::sync::LazyLock;

const MAX_REPOSITORY_NAME_LENGTH: usize = 255;

static REPOSITORY_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").expect("valid regex"));

/// Split an image reference into repository and tag.
///
/// The tag is empty when the reference carries none. A digest
/// (`name@sha256:...`) is returned in place of the tag.
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `localhost:5000/app` -> `("localhost:5000/app", "")`
/// - `busybox@sha256:abc` -> `("busybox", "sha256:abc")`
pub fn parse_repository_tag(image: &str) -> (String, String) {
    if let Some((repository, digest)) = image.split_once('@') {
        return (repository.to_string(), digest.to_string());
    }

    match image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => {
            (repository.to_string(), tag.to_string())
        }
        _ => (image.to_string(), String::new()),
    }
}

/// Resolve the registry hostname and remaining repository path.
pub fn resolve_repository_name(repository: &str) -> Result<(String, String)> {
    if repository.contains("://") {
        return Err(invalid(repository, "repository name must not contain a scheme"));
    }

    match repository.split_once('/') {
        Some((host, name)) if is_registry_host(host) => {
            if host.contains("index.docker.io") {
                return Err(invalid(
                    repository,
                    &format!("invalid repository name, try \"{}\" instead", name),
                ));
            }
            validate_repository_name(name)?;
            Ok((host.to_string(), name.to_string()))
        }
        _ => Ok((DEFAULT_REGISTRY_URL.to_string(), repository.to_string())),
    }
}

/// Registry hostname of an image reference.
pub fn registry_of(image: &str) -> Result<String> {
    let (repository, _) = parse_repository_tag(image);
    let (hostname, _) = resolve_repository_name(&repository)?;
    Ok(hostname)
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

fn validate_repository_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty repository name"));
    }
    if name.len() > MAX_REPOSITORY_NAME_LENGTH {
        return Err(invalid(
            name,
            &format!(
                "repository name must not exceed {} characters",
                MAX_REPOSITORY_NAME_LENGTH
            ),
        ));
    }
    for component in name.split('/') {
        if !REPOSITORY_COMPONENT.is_match(component) {
            return Err(invalid(
                name,
                &format!("invalid repository path component \"{}\"", component),
            ));
        }
    }
    Ok(())
}

fn invalid(reference: &str, message: &str) -> AuthError {
    AuthError::InvalidReference {
        reference: reference.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_tag() {
        assert_eq!(
            parse_repository_tag("ghcr.io/org/app:v1.0"),
            ("ghcr.io/org/app".to_string(), "v1.0".to_string())
        );
        assert_eq!(
            parse_repository_tag("nginx"),
            ("nginx".to_string(), String::new())
        );
        assert_eq!(
            parse_repository_tag("localhost:5000/app"),
            ("localhost:5000/app".to_string(), String::new())
        );
        assert_eq!(
            parse_repository_tag("localhost:5000/app:dev"),
            ("localhost:5000/app".to_string(), "dev".to_string())
        );
        assert_eq!(
            parse_repository_tag("busybox@sha256:0123abcd"),
            ("busybox".to_string(), "sha256:0123abcd".to_string())
        );
    }

    #[test]
    fn test_registry_of_docker_hub() {
        for image in ["nginx", "nginx:alpine", "myuser/app", "myuser/app:latest", "library/busybox@sha256:ab"] {
            assert_eq!(registry_of(image).unwrap(), DEFAULT_REGISTRY_URL, "{}", image);
        }
    }

    #[test]
    fn test_registry_of_explicit_host() {
        assert_eq!(registry_of("ghcr.io/org/app:v1.0").unwrap(), "ghcr.io");
        assert_eq!(registry_of("asia.gcr.io/project/app").unwrap(), "asia.gcr.io");
        assert_eq!(
            registry_of("123456789.dkr.ecr.ap-northeast-1.amazonaws.com/app").unwrap(),
            "123456789.dkr.ecr.ap-northeast-1.amazonaws.com"
        );
    }

    #[test]
    fn test_registry_of_host_with_port() {
        assert_eq!(registry_of("localhost:5000/myapp").unwrap(), "localhost:5000");
        assert_eq!(
            registry_of("registry.internal:8443/team/app:1.2").unwrap(),
            "registry.internal:8443"
        );
    }

    #[test]
    fn test_registry_of_localhost_without_port() {
        assert_eq!(registry_of("localhost/app").unwrap(), "localhost");
    }

    #[test]
    fn test_scheme_is_rejected() {
        assert!(matches!(
            registry_of("https://ghcr.io/org/app"),
            Err(AuthError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_docker_index_host_is_rejected() {
        assert!(resolve_repository_name("index.docker.io/library/nginx").is_err());
    }

    #[test]
    fn test_invalid_repository_path() {
        assert!(resolve_repository_name("ghcr.io/Org/App").is_err());
        assert!(resolve_repository_name("ghcr.io/").is_err());
        assert!(resolve_repository_name("ghcr.io/org//app").is_err());
    }
}
