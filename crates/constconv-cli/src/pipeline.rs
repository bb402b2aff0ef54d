//! Load template, parse, generate, write

use std::fs;
use std::path::PathBuf;

use constconv_generation::{GenerationError, Generator};
use constconv_parsers::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Run one generation and return the path written.
///
/// The template is compiled before any Go source is loaded, so template
/// syntax errors are reported first. When the rendered source cannot be
/// formatted it is still written to the output file for inspection and
/// the format error is returned.
pub fn run(config: &Config) -> CliResult<PathBuf> {
    let mut generator = Generator::new(config.generator_config());
    generator
        .load_template()
        .map_err(CliError::LoadTemplate)?;

    let mut parser = Parser::new(config.parser_config());
    parser.parse()?;

    let src = match generator.generate(&parser) {
        Ok(src) => src,
        Err(err @ GenerationError::Format { .. }) => {
            if let Some(unformatted) = err.unformatted() {
                write_output(config, unformatted)?;
                warn!(
                    "Wrote unformatted source to {}",
                    config.output_file.display()
                );
            }
            return Err(CliError::Generate(err));
        }
        Err(err) => return Err(CliError::Generate(err)),
    };

    write_output(config, &src)?;
    info!("Wrote {}", config.output_file.display());
    Ok(config.output_file.clone())
}

fn write_output(config: &Config, src: &[u8]) -> CliResult<()> {
    fs::write(&config.output_file, src).map_err(|source| CliError::Write {
        path: config.output_file.clone(),
        source,
    })
}
