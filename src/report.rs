//! Problem Reporting
//!
//! Non-fatal problems (validation warnings and errors) go through an
//! optional [`ProblemReporter`]. Fatal problems never do; they are returned
//! as errors right away.

use std::fmt;

use crate::core::location::Location;
use crate::error::Result;

/// Problem severity, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Problem type used when the reporter did not get one
pub const DEFAULT_PROBLEM_TYPE: &str = "validation";

/// A reportable (non well-formedness) problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProblem {
    pub location: Location,
    pub message: String,
    pub severity: Severity,
    /// Free form problem category ("validation", "xml-version", ...)
    pub problem_type: String,
}

impl ValidationProblem {
    pub fn new(location: Location, message: impl Into<String>, severity: Severity) -> Self {
        ValidationProblem {
            location,
            message: message.into(),
            severity,
            problem_type: DEFAULT_PROBLEM_TYPE.to_string(),
        }
    }

    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {} at {}", self.severity, self.problem_type, self.message, self.location)
    }
}

/// Receiver of non-fatal problems.
///
/// Returning an error from `report` aborts scanning with that error.
pub trait ProblemReporter {
    fn report(&mut self, problem: &ValidationProblem) -> Result<()>;
}

/// Reporter that keeps every problem it receives
#[derive(Debug, Default)]
pub struct CollectingReporter {
    problems: std::rc::Rc<std::cell::RefCell<Vec<ValidationProblem>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the collected problems that stays valid after the
    /// reporter is moved into a configuration
    pub fn problems(&self) -> std::rc::Rc<std::cell::RefCell<Vec<ValidationProblem>>> {
        std::rc::Rc::clone(&self.problems)
    }
}

impl ProblemReporter for CollectingReporter {
    fn report(&mut self, problem: &ValidationProblem) -> Result<()> {
        self.problems.borrow_mut().push(problem.clone());
        Ok(())
    }
}
