use crate::errors::UnifixResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-unifix.conf");

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FixerConfig {
    /// Maximum number of candidate rewrites kept per change.
    pub max_fixes: usize,

    /// Depth bound of the unit search.
    pub search_depth: usize,

    /// Ask which side/candidate to keep instead of emitting all of them.
    pub interactive: bool,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            max_fixes: 5,
            search_depth: 5,
            interactive: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// The default output format ("console" or "json").
    pub default_format: String,

    /// Whether to suppress the console summary.
    pub quiet: bool,

    /// The maximum number of changes to show on the console.
    pub max_results: Option<u32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "console".into(),
            quiet: false,
            max_results: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    /// The number of worker threads for per-function analysis, or `None`
    /// to auto-detect.
    pub worker_threads: Option<usize>,

    /// The stack size for rayon threads, in bytes.
    pub rayon_thread_stack_size: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            rayon_thread_stack_size: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub fixer: FixerConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> UnifixResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("unifix.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("unifix.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            // Stderr, so stdout stays clean for `--format json` pipelines.
            eprintln!(
                "{}: Loaded user config from: {}\n",
                style("note").green().bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> UnifixResult<()> {
    let example_path = config_dir.join("unifix.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into the defaults; every field the user sets wins.
fn merge_configs(mut default: Config, user: Config) -> Config {
    // --- FixerConfig ---
    default.fixer.max_fixes = user.fixer.max_fixes;
    default.fixer.search_depth = user.fixer.search_depth;
    default.fixer.interactive = user.fixer.interactive;

    // --- OutputConfig ---
    default.output.default_format = user.output.default_format;
    default.output.quiet = user.output.quiet;
    default.output.max_results = user.output.max_results;

    // --- PerformanceConfig ---
    default.performance.worker_threads = user.performance.worker_threads;
    default.performance.rayon_thread_stack_size = user.performance.rayon_thread_stack_size;

    default
}

#[test]
fn defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.fixer.max_fixes, 5);
    assert_eq!(cfg.fixer.search_depth, 5);
    assert!(!cfg.fixer.interactive);
    assert_eq!(cfg.output.default_format, "console");
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [fixer]
        max_fixes = 2
        interactive = true

        [output]
        quiet = true
    "#;
    fs::write(cfg_path.join("unifix.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("unifix.conf").is_file());

    assert_eq!(cfg.fixer.max_fixes, 2);
    assert!(cfg.fixer.interactive);
    assert!(cfg.output.quiet);

    // Untouched fields keep their defaults.
    assert_eq!(cfg.fixer.search_depth, 5);
}
