use std::fs;
use std::path::Path;

use clap::Parser;
use constconv_cli::*;
use tempfile::TempDir;

const SOURCE: &str = "package colors

type Color int

const (
	Red Color = iota
	Green
	Blue
)
";

const TEMPLATE: &str = "{{doNotEdit}}

package {{basePackageName}}

var {{extra.var}} = map[{{#each valuesList}}{{TypeName}}{{/each}}]string{
{{#each values}}{{Name}}: {{Quote (ToLower Name)}},
{{/each}}}
";

fn package(template: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("colors.go"), SOURCE).unwrap();
    fs::write(tmp.path().join("names.tmpl"), template).unwrap();
    tmp
}

fn config(dir: &Path, extra: &[&str]) -> Config {
    let dir = dir.to_string_lossy().into_owned();
    let mut args = vec!["--type", "Color", "--template", "names.tmpl"];
    args.extend_from_slice(extra);
    args.push(dir.as_str());
    let cli = Cli::try_parse_from(std::iter::once("constconv").chain(args.iter().copied())).unwrap();
    let raw: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    Config::from_cli(cli, &raw).unwrap()
}

#[test]
fn test_run_writes_formatted_output() {
    let tmp = package(TEMPLATE);
    let config = config(tmp.path(), &["--data", "var=colorNames"]);

    let written = run(&config).unwrap();
    assert_eq!(written, tmp.path().join("color_constconv.go"));

    let out = fs::read_to_string(written).unwrap();
    assert!(out.starts_with("// Code generated by \"constconv --type Color --template names.tmpl --data var=colorNames "));
    assert!(out.contains("package colors\n"));
    assert!(out.contains(
        "var colorNames = map[Color]string{\n\tRed:   \"red\",\n\tGreen: \"green\",\n\tBlue:  \"blue\",\n}\n"
    ));
}

#[test]
fn test_run_honours_output_flag() {
    let tmp = package(TEMPLATE);
    let target = tmp.path().join("custom.go");
    let target_str = target.to_string_lossy().into_owned();
    let config = config(tmp.path(), &["--data", "var=names", "--output", target_str.as_str()]);

    assert_eq!(run(&config).unwrap(), target);
    assert!(target.exists());
    assert!(!tmp.path().join("color_constconv.go").exists());
}

#[test]
fn test_template_errors_come_first() {
    let tmp = package("{{#each values}}");
    // the unknown type would fail parsing, but the template is checked first
    let mut config = config(tmp.path(), &[]);
    config.types = vec!["Missing".to_string()];

    let err = run(&config).unwrap_err();
    assert!(matches!(err, CliError::LoadTemplate(_)));
    assert!(err.to_string().starts_with("loading template output: can't parse template file"));
}

#[test]
fn test_parse_errors_are_reported() {
    let tmp = package(TEMPLATE);
    let mut config = config(tmp.path(), &["--data", "var=v"]);
    config.types = vec!["Missing".to_string()];

    let err = run(&config).unwrap_err();
    assert!(matches!(err, CliError::Parse(_)));
    assert!(!config.output_file.exists());
}

#[test]
fn test_unformatted_output_is_still_written() {
    let tmp = package("package {{basePackageName}}\n\nfunc {\n");
    let config = config(tmp.path(), &[]);

    let err = run(&config).unwrap_err();
    assert!(err.wrote_unformatted());
    assert!(err.to_string().starts_with("generating output: internal error. format failed:"));
    assert_eq!(
        fs::read_to_string(&config.output_file).unwrap(),
        "package colors\n\nfunc {\n"
    );
}

#[test]
fn test_strict_template_field() {
    let tmp = package(TEMPLATE);
    // no --data, so extra.var is missing
    let config = config(tmp.path(), &[]);

    let err = run(&config).unwrap_err();
    assert!(matches!(err, CliError::Generate(_)));
    assert!(!err.wrote_unformatted());
}
