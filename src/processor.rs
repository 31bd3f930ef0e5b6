use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::blackboard::{PreUnificationAgent, Scheduler};
use crate::encode::Encoder;
use crate::kernel::unifier::DEFAULT_MAX_DEPTH;
use crate::signature::Signature;
use crate::status::Status;
use crate::syntax::{parse_problem, AnnotatedFormula, Statement};

/// Include files deeper than this are assumed circular.
const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Where `include` directives are resolved. Defaults to the directory
    /// of the problem file.
    pub include_dir: Option<PathBuf>,

    /// The search depth bound handed to the unification agent.
    pub max_depth: usize,

    pub verbose: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            include_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
            verbose: false,
        }
    }
}

/// A failure to get the problem as far as the reasoner, tagged with the
/// status the CLI should report.
#[derive(Debug)]
pub struct ProcessorError {
    pub status: Status,
    pub message: String,
}

impl ProcessorError {
    fn new(status: Status, message: String) -> ProcessorError {
        ProcessorError { status, message }
    }
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl From<io::Error> for ProcessorError {
    fn from(error: io::Error) -> Self {
        ProcessorError::new(Status::InputError, error.to_string())
    }
}

/// The problem intake facade: reads TPTP input, resolves includes, encodes
/// statements in order, and drives the blackboard.
pub struct Processor {
    config: ProcessorConfig,
    statements: Vec<AnnotatedFormula>,
}

impl Processor {
    pub fn new(config: ProcessorConfig) -> Processor {
        Processor {
            config,
            statements: vec![],
        }
    }

    pub fn statements(&self) -> &[AnnotatedFormula] {
        &self.statements
    }

    /// Loads a problem file, following its include directives.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ProcessorError> {
        let include_dir = self
            .config
            .include_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        self.load_file_inner(path, &include_dir, &[], 0)
    }

    /// Loads problem text directly, with includes resolved against the
    /// configured include directory or the working directory.
    pub fn load_text(&mut self, text: &str) -> Result<(), ProcessorError> {
        let include_dir = self
            .config
            .include_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        self.load_statements(text, &include_dir, &[], 0)
    }

    fn load_file_inner(
        &mut self,
        path: &Path,
        include_dir: &Path,
        names: &[String],
        depth: usize,
    ) -> Result<(), ProcessorError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(ProcessorError::new(
                Status::InputError,
                format!("includes nested deeper than {}", MAX_INCLUDE_DEPTH),
            ));
        }
        let text = std::fs::read_to_string(path)?;
        self.load_statements(&text, include_dir, names, depth)
    }

    fn load_statements(
        &mut self,
        text: &str,
        include_dir: &Path,
        names: &[String],
        depth: usize,
    ) -> Result<(), ProcessorError> {
        let statements = parse_problem(text)
            .map_err(|error| ProcessorError::new(Status::SyntaxError, error.to_string()))?;
        for statement in statements {
            match statement {
                Statement::Include { file, names: list } => {
                    let path = include_dir.join(&file);
                    self.load_file_inner(&path, include_dir, &list, depth + 1)?;
                }
                Statement::Annotated(formula) => {
                    // An enclosing include may restrict which names to keep.
                    if names.is_empty() || names.contains(&formula.name) {
                        self.statements.push(formula);
                    }
                }
            }
        }
        Ok(())
    }

    /// Encodes everything loaded and runs the scheduler to a verdict.
    /// Encoding failures are verdicts too, per the status vocabulary.
    pub fn run(&mut self, token: CancellationToken) -> Status {
        let mut sig = Signature::new();
        let mut clauses = vec![];
        {
            let mut encoder = Encoder::new(&mut sig);
            for formula in &self.statements {
                match encoder.process(formula) {
                    Ok(Some(clause)) => clauses.push(clause),
                    Ok(None) => {}
                    Err(error) => {
                        if self.config.verbose {
                            println!("encoding {} failed: {}", formula.name, error);
                        }
                        return error.status();
                    }
                }
            }
        }
        let mut scheduler = Scheduler::new(sig, token);
        scheduler.add_agent(Box::new(PreUnificationAgent::with_max_depth(
            self.config.max_depth,
        )));
        scheduler.verbose = self.config.verbose;
        for clause in clauses {
            scheduler.add_clause(clause);
        }
        scheduler.run()
    }
}
