use clap::Parser;
use std::path::{Path, PathBuf};

use edlgen::plan::emit::{Artifact, EmitOptions, ErrorHandlingKind, TrustLayerKind};
use edlgen::{Driver, Status};

/// A compiler for declarative trust-boundary interface definitions
#[derive(Parser)]
#[clap(author, version, about)]
enum Options {
    /// Parse and analyse an EDL file without generating code
    Check {
        /// Path to the EDL file
        #[clap(name = "FILE")]
        edl_file: PathBuf,
    },
    /// Generate the boundary glue for one side
    Generate {
        /// Path to the EDL file
        #[clap(name = "FILE")]
        edl_file: PathBuf,
        /// Directory where artifacts are written
        #[clap(long = "output", name = "DIR", default_value = ".")]
        output_path: PathBuf,
        /// Which side's artifacts to produce: `outer` or `inner`
        #[clap(long = "trust-layer", default_value = "inner")]
        trust_layer: TrustLayerKind,
        /// How generated stubs report failures: `error-code` or `exception`
        #[clap(long = "error-handling", default_value = "exception")]
        error_handling: ErrorHandlingKind,
        /// Namespace applied to all generated names
        #[clap(long = "namespace", default_value = "edl")]
        namespace: String,
        /// Name of the class grouping the outer-side entry points
        #[clap(long = "outer-class", default_value = "EdlClient")]
        outer_class: String,
        /// External schema compiler to run on the emitted schema
        #[clap(long = "schema-compiler", name = "PATH")]
        schema_compiler: Option<PathBuf>,
    },
}

fn main() -> ! {
    match Options::parse() {
        Options::Check { edl_file } => {
            let mut driver = Driver::new();
            let status = match driver.load_source_path(&edl_file) {
                Some(file_id) => driver.check(file_id),
                None => Status::Error,
            };
            std::process::exit(status.exit_code());
        }
        Options::Generate {
            edl_file,
            output_path,
            trust_layer,
            error_handling,
            namespace,
            outer_class,
            schema_compiler,
        } => {
            let mut driver = Driver::new();
            let file_id = match driver.load_source_path(&edl_file) {
                Some(file_id) => file_id,
                None => std::process::exit(Status::Error.exit_code()),
            };

            let options = EmitOptions {
                error_handling,
                trust_layer,
                namespace,
                outer_class,
            };
            let (status, artifacts) = driver.generate(file_id, &options);
            if let Status::Error = status {
                std::process::exit(status.exit_code());
            }

            if let Err(error) = write_artifacts(&output_path, &artifacts) {
                eprintln!("error: couldn't write artifacts: {}", error);
                std::process::exit(Status::Error.exit_code());
            }

            if let Some(compiler) = schema_compiler {
                if let Err(error) = compile_schema(&compiler, &output_path, &artifacts) {
                    eprintln!("error: schema compiler failed: {}", error);
                    std::process::exit(Status::Error.exit_code());
                }
            }

            std::process::exit(Status::Ok.exit_code());
        }
    }
}

fn write_artifacts(output_path: &Path, artifacts: &[Artifact]) -> std::io::Result<()> {
    std::fs::create_dir_all(output_path)?;
    for artifact in artifacts {
        std::fs::write(output_path.join(&artifact.file_name), &artifact.contents)?;
    }
    Ok(())
}

/// Run the external schema compiler on the emitted schema. This is a blocking
/// call on the driver's thread.
fn compile_schema(
    compiler: &Path,
    output_path: &Path,
    artifacts: &[Artifact],
) -> std::io::Result<()> {
    let schema = artifacts
        .iter()
        .find(|artifact| artifact.file_name.ends_with(".fbs"));
    let schema = match schema {
        Some(schema) => schema,
        None => return Ok(()),
    };

    let status = std::process::Command::new(compiler)
        .arg("--cpp")
        .arg("-o")
        .arg(output_path)
        .arg(output_path.join(&schema.file_name))
        .status()?;

    if !status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("exited with {}", status),
        ));
    }
    Ok(())
}
