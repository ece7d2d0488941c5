//! Access policy for operator commands

use crate::session::OperatorCommand;
use std::collections::HashSet;

/// Decides whether an operator may issue a command
pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, operator: &str, command: OperatorCommand) -> bool;
}

/// Everyone may do everything
#[derive(Debug, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, _operator: &str, _command: OperatorCommand) -> bool {
        true
    }
}

/// Named operators only; an empty list allows everyone
#[derive(Debug, Default)]
pub struct OperatorList {
    operators: HashSet<String>,
}

impl OperatorList {
    pub fn new<I, S>(operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operators: operators.into_iter().map(Into::into).collect(),
        }
    }
}

impl AccessPolicy for OperatorList {
    fn authorize(&self, operator: &str, _command: OperatorCommand) -> bool {
        self.operators.is_empty() || self.operators.contains(operator)
    }
}
