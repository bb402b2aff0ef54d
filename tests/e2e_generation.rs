//! End-to-end tests: flags in, generated Go source out, over `testdata/`

use std::fs;

use clap::Parser as _;
use constconv_cli::{run, Cli, CliError, Config, ConfigError};
use constconv_generation::format_source;
use constconv_integration_tests::{copy_fixture, fixture_dir, golden};
use constconv_parsers::{Parser, ParserConfig};
use serde_json::json;
use tempfile::TempDir;

fn config(args: &[&str], exec_args: &str) -> Result<Config, ConfigError> {
    let cli = Cli::try_parse_from(std::iter::once("constconv").chain(args.iter().copied())).unwrap();
    let exec_args: Vec<String> = exec_args.split(' ').map(str::to_string).collect();
    Config::from_cli(cli, &exec_args)
}

#[test]
fn test_dayofweek_matches_golden() {
    let tmp = TempDir::new().unwrap();
    copy_fixture("dayofweek", tmp.path()).unwrap();
    let dir = tmp.path().to_string_lossy().into_owned();
    let config = config(
        &[
            "--type",
            "DayOfWeek",
            "--template",
            "dayofweek.tmpl",
            "--data",
            "typename=DayOfWeek;prefix=DayOfWeek_",
            dir.as_str(),
        ],
        "--type DayOfWeek --template dayofweek.tmpl --data typename=DayOfWeek;prefix=DayOfWeek_",
    )
    .unwrap();

    let written = run(&config).unwrap();
    assert_eq!(written, tmp.path().join("dayofweek_constconv.go"));
    assert_eq!(
        fs::read_to_string(written).unwrap(),
        golden("dayofweek", "dayofweek_constconv.golden").unwrap()
    );
}

#[test]
fn test_file_mode_uses_parent_directory() {
    let tmp = TempDir::new().unwrap();
    copy_fixture("dayofweek", tmp.path()).unwrap();
    let file = tmp.path().join("dayofweek.go").to_string_lossy().into_owned();
    let config = config(
        &[
            "--type",
            "DayOfWeek",
            "--template",
            "dayofweek.tmpl",
            "--data",
            "typename=DayOfWeek;prefix=DayOfWeek_",
            file.as_str(),
        ],
        "--type DayOfWeek --template dayofweek.tmpl --data typename=DayOfWeek;prefix=DayOfWeek_",
    )
    .unwrap();
    assert_eq!(config.base_dir, tmp.path());

    run(&config).unwrap();
    assert_eq!(
        fs::read_to_string(tmp.path().join("dayofweek_constconv.go")).unwrap(),
        golden("dayofweek", "dayofweek_constconv.golden").unwrap()
    );
}

#[test]
fn test_multiple_types_in_request_order() {
    let tmp = TempDir::new().unwrap();
    copy_fixture("colors", tmp.path()).unwrap();
    let dir = tmp.path().to_string_lossy().into_owned();
    let config = config(
        &["--type", "Color,Label", "--template", "colors.tmpl", dir.as_str()],
        "--type Color,Label --template colors.tmpl",
    )
    .unwrap();

    let out = fs::read_to_string(run(&config).unwrap()).unwrap();
    assert_eq!(
        out,
        "// Code generated by \"constconv --type Color,Label --template colors.tmpl\"; DO NOT EDIT.\n\
         \n\
         package colors\n\
         \n\
         // AllColors lists every Color constant.\n\
         var AllColors = []Color{\n\
         \tRed,\n\
         \tGreen,\n\
         \tBlue,\n\
         \tAlpha,\n\
         \tMaximum,\n\
         }\n\
         \n\
         // AllLabels lists every Label constant.\n\
         var AllLabels = []Label{\n\
         \tLabelWarm,\n\
         \tLabelCool,\n\
         }\n"
    );
    assert_eq!(format_source(&out).unwrap(), out);
}

#[test]
fn test_inspected_values_serialize_for_templates() {
    let mut parser = Parser::new(ParserConfig {
        types: vec!["Color".to_string(), "Label".to_string()],
        tags: Vec::new(),
        patterns: vec![fixture_dir("colors").to_string_lossy().into_owned()],
    });
    parser.parse().unwrap();
    assert_eq!(parser.base_package_name(), "colors");

    let results = serde_json::to_value(parser.result_list()).unwrap();
    let colors = &results[0];
    assert_eq!(colors["TypeName"], json!("Color"));
    assert_eq!(colors["RepTypeName"], json!("Color"));
    let values: Vec<(&str, &str)> = colors["Values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| (v["Name"].as_str().unwrap(), v["Str"].as_str().unwrap()))
        .collect();
    assert_eq!(
        values,
        vec![("Red", "1"), ("Green", "2"), ("Blue", "4"), ("Alpha", "16"), ("Maximum", "255")]
    );

    let labels = &results[1]["Values"];
    assert_eq!(labels.as_array().unwrap().len(), 2);
    assert_eq!(labels[0]["Kind"], json!("String"));
    assert_eq!(labels[0]["ExactStr"], json!("\"warm\""));
}

#[test]
fn test_unknown_type_fails_without_output() {
    let tmp = TempDir::new().unwrap();
    copy_fixture("colors", tmp.path()).unwrap();
    let dir = tmp.path().to_string_lossy().into_owned();
    let config = config(
        &["--type", "Shade", "--template", "colors.tmpl", dir.as_str()],
        "--type Shade --template colors.tmpl",
    )
    .unwrap();

    let err = run(&config).unwrap_err();
    assert!(matches!(err, CliError::Parse(_)));
    assert!(!config.output_file.exists());
}

#[test]
fn test_tags_with_files_rejected() {
    let file = fixture_dir("colors").join("colors.go").to_string_lossy().into_owned();
    let err = config(
        &["--type", "Color", "--template", "colors.tmpl", "--tags", "debug", file.as_str()],
        "",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::TagsWithFiles));
}

#[test]
fn test_float_constants_keep_exact_form() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("ratios.go"),
        "package ratios\n\ntype Ratio float64\n\nconst (\n\tHalf  Ratio = 0.5\n\tThird Ratio = 1.0 / 3\n)\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("ratios.tmpl"),
        "{{doNotEdit}}\n\npackage {{basePackageName}}\n\nvar ratioText = map[Ratio][2]string{\n{{#each values}}{{Name}}: {\"{{Str}}\", \"{{ExactStr}}\"},\n{{/each}}}\n",
    )
    .unwrap();
    let dir = tmp.path().to_string_lossy().into_owned();
    let config = config(
        &["--type", "Ratio", "--template", "ratios.tmpl", dir.as_str()],
        "--type Ratio --template ratios.tmpl",
    )
    .unwrap();

    let out = fs::read_to_string(run(&config).unwrap()).unwrap();
    assert!(out.contains("{\"0.5\", \"1/2\"},\n"));
    assert!(out.contains("{\"0.333333\", \"6004799503160661/18014398509481984\"},\n"));
    assert_eq!(format_source(&out).unwrap(), out);
}
