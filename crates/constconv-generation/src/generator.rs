//! Renders parser results through a user template into formatted Go source

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use constconv_parsers::{Parser, TypeResult};
use handlebars::template::{Parameter, TemplateElement};
use handlebars::{no_escape, Handlebars, Template};
use tracing::{debug, info, warn};

use crate::context::TemplateData;
use crate::error::GenerationError;
use crate::format::format_source;
use crate::helpers;

/// Generator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Template file to load
    pub template_file: PathBuf,
    /// Key/value pairs exposed as `extra`
    pub extra_data: BTreeMap<String, String>,
    /// Command-line arguments of this invocation, joined by spaces
    pub exec_args: String,
}

/// Template based code generator
pub struct Generator {
    config: GeneratorConfig,
    registry: Handlebars<'static>,
    template_name: Option<String>,
}

impl Generator {
    /// Create a generator with the helper library registered
    pub fn new(config: GeneratorConfig) -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.set_strict_mode(true);
        helpers::register(&mut registry);
        Self {
            config,
            registry,
            template_name: None,
        }
    }

    /// Generator configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Read and compile the template file.
    ///
    /// Syntax errors surface here, never later in [`Generator::generate`].
    pub fn load_template(&mut self) -> Result<(), GenerationError> {
        let path = &self.config.template_file;
        let load_error = |message: String| GenerationError::LoadTemplate {
            path: path.clone(),
            message,
        };

        let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.registry
            .register_template_string(&name, text)
            .map_err(|e| load_error(e.to_string()))?;
        if let Some(helper) = self.registry.get_template(&name).and_then(unknown_helper) {
            self.registry.unregister_template(&name);
            return Err(load_error(format!("function {:?} not defined", helper)));
        }

        debug!("Loaded template {} from {}", name, path.display());
        self.template_name = Some(name);
        Ok(())
    }

    /// Render the parser's results and format them as Go source
    pub fn generate(&self, parser: &Parser) -> Result<Vec<u8>, GenerationError> {
        self.generate_results(parser.base_package_name(), parser.result_list())
    }

    /// Render `results` and format them as Go source.
    ///
    /// When formatting fails the error carries the rendered bytes.
    pub fn generate_results(
        &self,
        base_package_name: &str,
        results: &[TypeResult],
    ) -> Result<Vec<u8>, GenerationError> {
        let name = self
            .template_name
            .as_deref()
            .ok_or(GenerationError::TemplateNotLoaded)?;
        let data = TemplateData::new(
            &self.config.exec_args,
            &self.config.extra_data,
            base_package_name,
            results,
        )
        .ok_or(GenerationError::NoResults)?;

        let rendered = self.registry.render(name, &data)?;
        match format_source(&rendered) {
            Ok(formatted) => {
                info!("Generated {} bytes from template {}", formatted.len(), name);
                Ok(formatted.into_bytes())
            }
            Err(source) => {
                warn!("Generated source does not parse: {}", source);
                Err(GenerationError::Format {
                    source,
                    unformatted: rendered.into_bytes(),
                })
            }
        }
    }
}

/// First helper call in `template` naming no registered helper
fn unknown_helper(template: &Template) -> Option<String> {
    template.elements.iter().find_map(unknown_in_element)
}

fn unknown_in_element(element: &TemplateElement) -> Option<String> {
    match element {
        TemplateElement::Expression(call)
        | TemplateElement::HtmlExpression(call)
        | TemplateElement::HelperBlock(call) => {
            // `{{Name}}` alone is a field lookup
            let invoked = call.block || !call.params.is_empty() || !call.hash.is_empty();
            if let Some(name) = call.name.as_name() {
                if invoked && !helpers::is_known(name) {
                    return Some(name.to_string());
                }
            }
            call.params
                .iter()
                .chain(call.hash.values())
                .find_map(unknown_in_param)
                .or_else(|| call.template.as_ref().and_then(unknown_helper))
                .or_else(|| call.inverse.as_ref().and_then(unknown_helper))
        }
        _ => None,
    }
}

fn unknown_in_param(param: &Parameter) -> Option<String> {
    match param {
        Parameter::Subexpression(sub) => unknown_in_element(&sub.element),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constconv_parsers::{Kind, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn template(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn generator(file: &NamedTempFile) -> Generator {
        Generator::new(GeneratorConfig {
            template_file: file.path().to_path_buf(),
            extra_data: BTreeMap::from([("receiver".to_string(), "d".to_string())]),
            exec_args: "-type DayOfWeek".to_string(),
        })
    }

    fn results() -> Vec<TypeResult> {
        let value = |name: &str, n: i64| Value {
            name: name.to_string(),
            str: n.to_string(),
            exact_str: n.to_string(),
            kind: Kind::Int,
        };
        vec![TypeResult {
            pkg_name: "days".to_string(),
            type_name: "DayOfWeek".to_string(),
            rep_type_name: "DayOfWeek".to_string(),
            values: vec![value("Sunday", 0), value("Monday", 1)],
            imports: Vec::new(),
        }]
    }

    const STRINGER: &str = "{{doNotEdit}}\n\npackage {{basePackageName}}\n\n{{#each valuesList}}func ({{@root.extra.receiver}} {{TypeName}}) String() string {\nswitch {{@root.extra.receiver}} {\n{{#each Values}}case {{Name}}:\nreturn {{Quote (SnakeCase Name)}}\n{{/each}}}\nreturn \"\"\n}\n{{/each}}";

    #[test]
    fn test_generate_formats_output() {
        let file = template(STRINGER);
        let mut generator = generator(&file);
        generator.load_template().unwrap();
        let out = String::from_utf8(generator.generate_results("days", &results()).unwrap()).unwrap();
        assert_eq!(
            out,
            "// Code generated by \"constconv -type DayOfWeek\"; DO NOT EDIT.\n\npackage days\n\nfunc (d DayOfWeek) String() string {\n\tswitch d {\n\tcase Sunday:\n\t\treturn \"sunday\"\n\tcase Monday:\n\t\treturn \"monday\"\n\t}\n\treturn \"\"\n}\n"
        );
    }

    #[test]
    fn test_generate_is_deterministic() {
        let file = template(STRINGER);
        let mut generator = generator(&file);
        generator.load_template().unwrap();
        let first = generator.generate_results("days", &results()).unwrap();
        let second = generator.generate_results("days", &results()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_template_fails_at_load() {
        let file = template("{{#each values}}{{Name}}");
        let mut generator = generator(&file);
        assert!(matches!(
            generator.load_template(),
            Err(GenerationError::LoadTemplate { .. })
        ));
    }

    #[test]
    fn test_undefined_helper_fails_at_load() {
        let file = template("{{#each values}}{{SnakeCse Name}}\n{{/each}}");
        let mut typo = generator(&file);
        let err = typo.load_template().unwrap_err();
        assert!(matches!(err, GenerationError::LoadTemplate { .. }));
        assert!(err.to_string().ends_with("function \"SnakeCse\" not defined"));
        assert!(matches!(
            typo.generate_results("days", &results()),
            Err(GenerationError::TemplateNotLoaded)
        ));

        let nested = template("{{#if (HasPrefix Name \"S\")}}{{Quote (Snake Name)}}{{/if}}");
        let err = generator(&nested).load_template().unwrap_err();
        assert!(err.to_string().ends_with("function \"Snake\" not defined"));
    }

    #[test]
    fn test_missing_template_file() {
        let mut generator = Generator::new(GeneratorConfig {
            template_file: PathBuf::from("/nonexistent/template.tmpl"),
            ..Default::default()
        });
        let err = generator.load_template().unwrap_err();
        assert!(err
            .to_string()
            .starts_with("can't parse template file /nonexistent/template.tmpl. err:"));
    }

    #[test]
    fn test_generate_requires_loaded_template() {
        let file = template(STRINGER);
        let generator = generator(&file);
        assert!(matches!(
            generator.generate_results("days", &results()),
            Err(GenerationError::TemplateNotLoaded)
        ));
    }

    #[test]
    fn test_missing_field_is_render_error() {
        let file = template("package {{nope}}\n");
        let mut generator = generator(&file);
        generator.load_template().unwrap();
        assert!(matches!(
            generator.generate_results("days", &results()),
            Err(GenerationError::Render(_))
        ));
    }

    #[test]
    fn test_unformattable_output_is_returned() {
        let file = template("package {{basePackageName}}\n\nfunc {\n");
        let mut generator = generator(&file);
        generator.load_template().unwrap();
        let err = generator.generate_results("days", &results()).unwrap_err();
        assert_eq!(err.unformatted(), Some(&b"package days\n\nfunc {\n"[..]));
    }

    #[test]
    fn test_empty_results() {
        let file = template("package p\n");
        let mut generator = generator(&file);
        generator.load_template().unwrap();
        assert!(matches!(
            generator.generate_results("days", &[]),
            Err(GenerationError::NoResults)
        ));
    }
}
