//! Configuration for curator
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::schemas::ContentKind;
use crate::images::DEFAULT_MAX_CONCURRENT_DELETES;
use crate::seo::SeoDefaults;
use crate::storage::{CloudinaryConfig, SignatureAlgorithm};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_SHORT"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Curator - image lifecycle and SEO metadata maintenance for the CMS
#[derive(Parser, Debug, Clone)]
#[command(name = "curator")]
#[command(about = "Image lifecycle and SEO metadata maintenance for the CMS")]
#[command(version, long_version = LONG_VERSION)]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "cms")]
    pub mongodb_db: String,

    #[command(flatten)]
    pub cloudinary: CloudinaryArgs,

    /// JSON file adding to or overriding the built-in image paths
    #[arg(long, env = "IMAGE_PATHS_FILE")]
    pub image_paths_file: Option<PathBuf>,

    /// Brand appended to generated SEO titles
    #[arg(long, env = "SITE_BRAND", default_value = "Our Company")]
    pub site_brand: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Upper bound on image deletions in flight at once
    #[arg(long, env = "MAX_CONCURRENT_DELETES", default_value_t = DEFAULT_MAX_CONCURRENT_DELETES)]
    pub max_concurrent_deletes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Record image deletions in memory instead of calling Cloudinary
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Cloudinary credentials
#[derive(clap::Args, Debug, Clone)]
pub struct CloudinaryArgs {
    #[arg(long = "cloudinary-cloud-name", env = "CLOUDINARY_CLOUD_NAME")]
    pub cloud_name: Option<String>,

    #[arg(long = "cloudinary-api-key", env = "CLOUDINARY_API_KEY")]
    pub api_key: Option<String>,

    #[arg(long = "cloudinary-api-secret", env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Admin API base URL
    #[arg(long = "cloudinary-api-base", env = "CLOUDINARY_API_BASE", default_value = "https://api.cloudinary.com")]
    pub api_base: String,

    /// Folder uploads are placed in
    #[arg(long = "cloudinary-folder", env = "CLOUDINARY_FOLDER")]
    pub folder: Option<String>,

    /// Digest for request signatures (sha1 or sha256), per account setting
    #[arg(
        long = "cloudinary-signature-algorithm",
        env = "CLOUDINARY_SIGNATURE_ALGORITHM",
        default_value = "sha1"
    )]
    pub signature_algorithm: SignatureAlgorithm,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the image paths registered for one or all record types
    Paths {
        record_type: Option<String>,
    },

    /// Delete every image a stored record references
    Purge {
        /// Record type, e.g. Service or Blog
        record_type: String,
        /// Record id (hex ObjectId)
        id: String,
        /// Also delete the record itself once its images are gone
        #[arg(long)]
        remove: bool,
    },

    /// SEO metadata maintenance
    #[command(subcommand)]
    Seo(SeoCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SeoCommand {
    /// Sync the SEO entry for an existing Service or HirePage record
    Claim {
        /// service or hire
        kind: ContentKind,
        /// Record id (hex ObjectId)
        id: String,
    },

    /// Delete an SEO entry by slug
    Delete {
        slug: String,
        /// Delete even when the entry is owned by a content record
        #[arg(long)]
        force: bool,
    },

    /// Rename an SEO entry and carry the change to its content record
    Rename {
        old_slug: String,
        new_slug: String,
        #[arg(long)]
        title: String,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_deletes == 0 {
            return Err("MAX_CONCURRENT_DELETES must be at least 1".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than 0".to_string());
        }

        if !self.dry_run && self.needs_gateway() {
            let c = &self.cloudinary;
            let missing: Vec<&str> = [
                ("CLOUDINARY_CLOUD_NAME", &c.cloud_name),
                ("CLOUDINARY_API_KEY", &c.api_key),
                ("CLOUDINARY_API_SECRET", &c.api_secret),
            ]
            .iter()
            .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect();

            if !missing.is_empty() {
                return Err(format!(
                    "{} required unless --dry-run is set",
                    missing.join(", ")
                ));
            }
        }

        Ok(())
    }

    /// Whether the selected command deletes remote images
    pub fn needs_gateway(&self) -> bool {
        matches!(self.command, Command::Purge { .. })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Cloudinary settings, when all credentials are present
    pub fn cloudinary_config(&self) -> Option<CloudinaryConfig> {
        let c = &self.cloudinary;
        let mut config = CloudinaryConfig::new(
            c.cloud_name.as_deref()?,
            c.api_key.as_deref()?,
            c.api_secret.as_deref()?,
        );
        config.api_base = c.api_base.trim_end_matches('/').to_string();
        config.folder = c
            .folder
            .as_deref()
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        config.signature_algorithm = c.signature_algorithm;
        config.request_timeout = self.request_timeout();
        Some(config)
    }

    pub fn seo_defaults(&self) -> SeoDefaults {
        SeoDefaults::new(&self.site_brand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("curator").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_dry_run_needs_no_credentials() {
        let args = parse(&["--dry-run", "purge", "Service", "65f0c0ffee00000000000000"]);
        assert!(args.validate().is_ok());
        assert!(args.cloudinary_config().is_none());
    }

    #[test]
    fn test_purge_requires_credentials() {
        let args = parse(&[
            "--cloudinary-cloud-name",
            "demo",
            "purge",
            "Service",
            "65f0c0ffee00000000000000",
        ]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("CLOUDINARY_API_KEY"));
        assert!(err.contains("CLOUDINARY_API_SECRET"));
        assert!(!err.contains("CLOUDINARY_CLOUD_NAME"));
    }

    #[test]
    fn test_seo_commands_skip_gateway_check() {
        let args = parse(&["seo", "delete", "about-us", "--force"]);
        assert!(args.validate().is_ok());
        assert!(matches!(
            args.command,
            Command::Seo(SeoCommand::Delete { force: true, .. })
        ));
    }

    #[test]
    fn test_cloudinary_config_normalized() {
        let args = parse(&[
            "--cloudinary-cloud-name",
            "demo",
            "--cloudinary-api-key",
            "key",
            "--cloudinary-api-secret",
            "secret",
            "--cloudinary-api-base",
            "http://localhost:9000/",
            "--cloudinary-folder",
            "/cms/",
            "--request-timeout-ms",
            "1500",
            "paths",
        ]);
        let config = args.cloudinary_config().unwrap();
        assert_eq!(config.api_base, "http://localhost:9000");
        assert_eq!(config.folder.as_deref(), Some("cms"));
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.signature_algorithm, SignatureAlgorithm::Sha1);
    }

    #[test]
    fn test_signature_algorithm_selectable() {
        let args = parse(&[
            "--cloudinary-cloud-name",
            "demo",
            "--cloudinary-api-key",
            "key",
            "--cloudinary-api-secret",
            "secret",
            "--cloudinary-signature-algorithm",
            "sha256",
            "paths",
        ]);
        let config = args.cloudinary_config().unwrap();
        assert_eq!(config.signature_algorithm, SignatureAlgorithm::Sha256);

        let bad = Args::try_parse_from([
            "curator",
            "--cloudinary-signature-algorithm",
            "md5",
            "paths",
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_claim_parses_kind() {
        let args = parse(&["seo", "claim", "hire", "65f0c0ffee00000000000000"]);
        assert!(matches!(
            args.command,
            Command::Seo(SeoCommand::Claim {
                kind: ContentKind::Hire,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = parse(&["--max-concurrent-deletes", "0", "paths"]);
        assert!(args.validate().is_err());
    }
}
