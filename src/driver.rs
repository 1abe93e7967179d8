//! The top-level driver: file loading, diagnostics emission, and the
//! parse -> plan -> emit pipeline. Writing artifacts to disk and invoking the
//! external schema compiler are the binary's job; the driver only hands the
//! rendered artifacts back.

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::term::termcolor::{BufferedStandardStream, ColorChoice, WriteColor};
use std::cell::RefCell;
use std::path::Path;

use crate::edl;
use crate::files::{FileId, Files};
use crate::pass::edl_to_plan;
use crate::plan::emit::{self, Artifact, EmitOptions};
use crate::reporting::Message;

#[derive(Debug, Copy, Clone)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }
}

pub struct Driver {
    files: Files,
    codespan_config: codespan_reporting::term::Config,
    diagnostic_writer: RefCell<Box<dyn WriteColor>>,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            files: Files::new(),
            codespan_config: codespan_reporting::term::Config::default(),
            diagnostic_writer: RefCell::new(Box::new(BufferedStandardStream::stderr(
                if atty::is(atty::Stream::Stderr) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                },
            ))),
        }
    }

    /// Set the writer to use when rendering diagnostics.
    pub fn set_diagnostic_writer(&mut self, stream: impl 'static + WriteColor) {
        self.diagnostic_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Load a source string into the file database.
    pub fn load_source_string(&mut self, name: String, source: String) -> FileId {
        self.files.add(name, source)
    }

    /// Load a source file into the file database from the given path.
    pub fn load_source_path(&mut self, path: &Path) -> Option<FileId> {
        match std::fs::read_to_string(path) {
            Ok(source) => Some(self.load_source_string(path.display().to_string(), source)),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Parse and analyse a file without generating anything.
    pub fn check(&self, file_id: FileId) -> Status {
        match self.parse_edl(file_id) {
            Ok(_) => Status::Ok,
            Err(message) => {
                self.emit_diagnostic(message.to_diagnostic());
                Status::Error
            }
        }
    }

    /// Run the whole pipeline. On success the returned artifacts are ready
    /// for an external writer; on failure the single fail-fast diagnostic has
    /// been emitted and no artifacts are produced.
    pub fn generate(&self, file_id: FileId, options: &EmitOptions) -> (Status, Vec<Artifact>) {
        match self.parse_edl(file_id) {
            Ok(parsed) => {
                let plan = edl_to_plan::plan(&parsed);
                (Status::Ok, emit::emit(&plan, options))
            }
            Err(message) => {
                self.emit_diagnostic(message.to_diagnostic());
                (Status::Error, Vec::new())
            }
        }
    }

    fn parse_edl(&self, file_id: FileId) -> Result<edl::Edl, Message> {
        let file = self.files.get(file_id).unwrap();
        let name = Path::new(file.name())
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("edl")
            .to_owned();
        edl::parse(file_id, &name, file.source())
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic<FileId>) {
        let mut writer = self.diagnostic_writer.borrow_mut();
        let config = &self.codespan_config;

        codespan_reporting::term::emit(&mut *writer, config, &self.files, &diagnostic).unwrap();
        writer.flush().unwrap();
    }

    fn emit_read_diagnostic(&self, name: impl std::fmt::Display, error: std::io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't read `{}`: {}", name, error));
        self.emit_diagnostic(diagnostic);
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}

#[cfg(test)]
mod tests {
    use codespan_reporting::term::termcolor::NoColor;

    use super::*;
    use crate::plan::emit::{ErrorHandlingKind, TrustLayerKind};

    fn quiet_driver() -> Driver {
        let mut driver = Driver::new();
        driver.set_diagnostic_writer(NoColor::new(std::io::sink()));
        driver
    }

    #[test]
    fn check_reports_status() {
        let mut driver = quiet_driver();
        let good = driver.load_source_string(
            "good.edl".to_owned(),
            "enclave { trusted { void Ping(); }; };".to_owned(),
        );
        let bad = driver.load_source_string("bad.edl".to_owned(), "enclave {".to_owned());

        assert_eq!(driver.check(good).exit_code(), 0);
        assert_eq!(driver.check(bad).exit_code(), 1);
    }

    #[test]
    fn generate_produces_no_artifacts_on_error() {
        let mut driver = quiet_driver();
        let bad = driver.load_source_string(
            "bad.edl".to_owned(),
            "enclave { struct A { B b; }; };".to_owned(),
        );

        let options = EmitOptions {
            error_handling: ErrorHandlingKind::Exception,
            trust_layer: TrustLayerKind::Inner,
            namespace: "bad".to_owned(),
            outer_class: "BadClient".to_owned(),
        };
        let (status, artifacts) = driver.generate(bad, &options);
        assert_eq!(status.exit_code(), 1);
        assert!(artifacts.is_empty());
    }

    #[test]
    fn generate_names_artifacts_after_the_file_stem() {
        let mut driver = quiet_driver();
        let file_id = driver.load_source_string(
            "some/dir/widgets.edl".to_owned(),
            "enclave { trusted { void Ping(); }; };".to_owned(),
        );

        let options = EmitOptions {
            error_handling: ErrorHandlingKind::Exception,
            trust_layer: TrustLayerKind::Outer,
            namespace: "widgets".to_owned(),
            outer_class: "WidgetsClient".to_owned(),
        };
        let (status, artifacts) = driver.generate(file_id, &options);
        assert_eq!(status.exit_code(), 0);
        assert_eq!(artifacts[0].file_name, "widgets_abi.fbs");
        assert_eq!(artifacts[1].file_name, "widgets_types.h");
    }
}
