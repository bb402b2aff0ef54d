//! Command-line flags and the configuration derived from them

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use constconv_generation::GeneratorConfig;
use constconv_parsers::ParserConfig;
use tracing::debug;

use crate::error::ConfigError;

const USAGE: &str = "constconv --type T --template F [optional flags] [directory]
       constconv --type T --template F [optional flags] files... # Must be a single package";

/// Generate Go code from the typed constants of a package
#[derive(Parser, Debug, Clone)]
#[command(name = "constconv", version, override_usage = USAGE)]
pub struct Cli {
    /// Comma-separated list of type names, e.g. "UserStatus,os.FileMode"
    #[arg(long = "type", value_name = "T", value_parser = NonEmptyStringValueParser::new())]
    pub types: String,

    /// Template file path, relative to the source directory
    #[arg(long, value_name = "F", value_parser = NonEmptyStringValueParser::new())]
    pub template: String,

    /// Semicolon-separated extra template data, e.g. "typename=Foo;prefix=Bar"
    #[arg(long)]
    pub data: Option<String>,

    /// Output file name [default: <srcdir>/<snake-cased-type>_constconv.go]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comma-separated list of build tags to apply
    #[arg(long)]
    pub tags: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// A package directory, or the files of a single package
    #[arg(value_name = "DIRECTORY | FILES")]
    pub paths: Vec<String>,
}

/// Resolved configuration of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Requested type names, e.g. `["UserStatus", "os.FileMode"]`
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub extra_data: BTreeMap<String, String>,
    /// Arguments of this invocation joined by spaces
    pub exec_args: String,
    pub dir_or_files: Vec<String>,
    pub base_dir: PathBuf,
    pub template_file: PathBuf,
    pub output_file: PathBuf,
}

impl Config {
    /// Resolve `cli`; `exec_args` are the raw arguments after the program name
    pub fn from_cli(cli: Cli, exec_args: &[String]) -> Result<Self, ConfigError> {
        let types: Vec<String> = cli.types.split(',').map(str::to_string).collect();

        let tags = match cli.tags.as_deref() {
            Some(tags) if !tags.is_empty() => tags.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };

        let extra_data = match cli.data.as_deref() {
            Some(data) if !data.is_empty() => parse_extra_data(data)?,
            _ => BTreeMap::new(),
        };

        let dir_or_files = if cli.paths.is_empty() {
            vec![".".to_string()]
        } else {
            cli.paths
        };

        let (base_dir, directory_mode) = detect_directory(&dir_or_files)?;
        if !directory_mode && !tags.is_empty() {
            return Err(ConfigError::TagsWithFiles);
        }

        let output_file = cli
            .output
            .unwrap_or_else(|| default_output_file(&base_dir, &types[0]));
        let template_file = base_dir.join(&cli.template);

        let config = Self {
            types,
            tags,
            extra_data,
            exec_args: exec_args.join(" "),
            dir_or_files,
            base_dir,
            template_file,
            output_file,
        };
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            types: self.types.clone(),
            tags: self.tags.clone(),
            patterns: self.dir_or_files.clone(),
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            template_file: self.template_file.clone(),
            extra_data: self.extra_data.clone(),
            exec_args: self.exec_args.clone(),
        }
    }
}

/// Parse `k=v;k2=v2` into a map. Only the first `=` of a pair separates.
pub fn parse_extra_data(data: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    data.split(';')
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| ConfigError::InvalidExtraData {
                    pair: pair.to_string(),
                })
        })
        .collect()
}

/// The base directory of `dir_or_files`, and whether it names a directory.
///
/// A single existing directory is used as is; otherwise the parent of the
/// first file is the base.
pub fn detect_directory(dir_or_files: &[String]) -> Result<(PathBuf, bool), ConfigError> {
    let Some(first) = dir_or_files.first() else {
        return Ok((PathBuf::from("."), true));
    };
    if dir_or_files.len() == 1 {
        let metadata = fs::metadata(first).map_err(|source| ConfigError::Stat {
            path: PathBuf::from(first),
            source,
        })?;
        if metadata.is_dir() {
            return Ok((PathBuf::from(first), true));
        }
    }
    let parent = match Path::new(first).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, false))
}

/// `<base_dir>/<first type, lowercased, first '.' as '_'>_constconv.go`
pub fn default_output_file(base_dir: &Path, first_type: &str) -> PathBuf {
    let name = format!("{}_constconv.go", first_type.replacen('.', "_", 1));
    base_dir.join(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("constconv").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_extra_data() {
        let data = parse_extra_data("package=dayofweek;expr=a=b").unwrap();
        assert_eq!(data["package"], "dayofweek");
        assert_eq!(data["expr"], "a=b");
    }

    #[test]
    fn test_extra_data_pair_without_equals() {
        let err = parse_extra_data("a=1;oops").unwrap_err();
        assert_eq!(err.to_string(), "invalid extraData: oops");
        assert!(parse_extra_data("a=1;").is_err());
    }

    #[test]
    fn test_default_output_file() {
        assert_eq!(
            default_output_file(Path::new("pkg"), "os.FileMode"),
            PathBuf::from("pkg/os_filemode_constconv.go")
        );
        assert_eq!(
            default_output_file(Path::new("."), "DayOfWeek"),
            PathBuf::from("./dayofweek_constconv.go")
        );
    }

    #[test]
    fn test_detect_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();
        assert_eq!(
            detect_directory(&[dir.clone()]).unwrap(),
            (tmp.path().to_path_buf(), true)
        );

        let files = vec![format!("{}/a.go", dir), format!("{}/b.go", dir)];
        assert_eq!(
            detect_directory(&files).unwrap(),
            (tmp.path().to_path_buf(), false)
        );

        let bare = vec!["a.go".to_string(), "b.go".to_string()];
        assert_eq!(detect_directory(&bare).unwrap(), (PathBuf::from("."), false));
    }

    #[test]
    fn test_detect_directory_missing_single_path() {
        let err = detect_directory(&["/nonexistent/x.go".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::Stat { .. }));
    }

    #[test]
    fn test_from_cli_defaults() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();
        let args = ["--type", "DayOfWeek,os.FileMode", "--template", "t.tmpl", dir.as_str()];
        let raw: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let config = Config::from_cli(cli(&args), &raw).unwrap();

        assert_eq!(config.types, vec!["DayOfWeek", "os.FileMode"]);
        assert!(config.tags.is_empty());
        assert!(config.extra_data.is_empty());
        assert_eq!(config.base_dir, tmp.path());
        assert_eq!(config.template_file, tmp.path().join("t.tmpl"));
        assert_eq!(config.output_file, tmp.path().join("dayofweek_constconv.go"));
        assert_eq!(
            config.exec_args,
            format!("--type DayOfWeek,os.FileMode --template t.tmpl {}", dir)
        );

        let parser = config.parser_config();
        assert_eq!(parser.patterns, vec![dir]);
        let generator = config.generator_config();
        assert_eq!(generator.template_file, config.template_file);
    }

    #[test]
    fn test_tags_rejected_with_files() {
        let args = ["--type", "T", "--template", "t.tmpl", "--tags", "a,b", "x.go", "y.go"];
        let err = Config::from_cli(cli(&args), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::TagsWithFiles));
    }

    #[test]
    fn test_tags_with_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();
        let args = ["--type", "T", "--template", "t.tmpl", "--tags", "a,b", dir.as_str()];
        let config = Config::from_cli(cli(&args), &[]).unwrap();
        assert_eq!(config.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_required_flags() {
        let parse = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("constconv").chain(args.iter().copied()))
        };
        assert!(parse(&["--template", "t.tmpl"]).is_err());
        assert!(parse(&["--type", "T"]).is_err());
        assert!(parse(&["--type", "", "--template", "t.tmpl"]).is_err());
    }
}
