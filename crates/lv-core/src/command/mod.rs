//! Undoable commands and the stack that records them

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised by commands and the command stack
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Required keyword '{keyword}' not passed to {kind}")]
    MissingKeyword { kind: &'static str, keyword: String },

    #[error("Keyword '{keyword}' passed to {kind} has the wrong type")]
    WrongKeywordType { kind: &'static str, keyword: String },

    #[error("No commands to undo")]
    EmptyUndoStack,

    #[error("No commands to redo")]
    EmptyRedoStack,

    #[error("{kind} failed: {source}")]
    Failed {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl CommandError {
    /// Wrap an arbitrary error raised while running a command
    pub fn failed(kind: &'static str, source: impl Into<anyhow::Error>) -> Self {
        CommandError::Failed {
            kind,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// A state change that can be executed and reverted against a session
pub trait Command<S>: Send {
    /// Short name used in messages
    fn kind(&self) -> &'static str;

    /// Execute the command
    fn execute(&mut self, session: &mut S) -> Result<()>;

    /// Revert what [`Command::execute`] did
    fn undo(&mut self, session: &mut S) -> Result<()>;
}

/// Keyword arguments handed to a command constructor.
///
/// Constructors call [`CommandArgs::require`] with the names their kind
/// declares, then [`CommandArgs::take`] each of them. Anything left over is
/// kept as `extra`.
#[derive(Debug, Clone)]
pub struct CommandArgs<V> {
    values: IndexMap<String, V>,
}

impl<V> CommandArgs<V> {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: V) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: V) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Fail with the first declared keyword that is absent
    pub fn require(&self, kind: &'static str, keywords: &[&str]) -> Result<()> {
        match keywords.iter().find(|k| !self.values.contains_key(**k)) {
            Some(missing) => Err(CommandError::MissingKeyword {
                kind,
                keyword: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Remove a keyword, failing if absent
    pub fn take(&mut self, kind: &'static str, keyword: &str) -> Result<V> {
        self.values
            .shift_remove(keyword)
            .ok_or_else(|| CommandError::MissingKeyword {
                kind,
                keyword: keyword.to_string(),
            })
    }

    /// Everything not consumed by the constructor
    pub fn into_extra(self) -> IndexMap<String, V> {
        self.values
    }
}

impl<V> Default for CommandArgs<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Records executed commands so they can be undone and redone
pub struct CommandStack<S> {
    session: S,
    done: Vec<Box<dyn Command<S>>>,
    undone: Vec<Box<dyn Command<S>>>,
    max_history: Option<usize>,
}

impl<S> CommandStack<S> {
    /// Create a stack around the session commands operate on
    pub fn new(session: S) -> Self {
        Self {
            session,
            done: Vec::new(),
            undone: Vec::new(),
            max_history: None,
        }
    }

    /// Bound the number of undoable commands kept. Oldest entries drop first.
    pub fn with_max_history(mut self, max_history: Option<usize>) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Execute and log a new command. Clears the redo history.
    pub fn do_command(&mut self, mut cmd: Box<dyn Command<S>>) -> Result<()> {
        tracing::debug!("Executing command {}", cmd.kind());
        cmd.execute(&mut self.session)?;
        self.done.push(cmd);
        self.undone.clear();

        if let Some(max) = self.max_history {
            if self.done.len() > max {
                let excess = self.done.len() - max;
                self.done.drain(..excess);
            }
        }
        Ok(())
    }

    /// Undo the most recent command
    pub fn undo(&mut self) -> Result<()> {
        let mut cmd = self.done.pop().ok_or(CommandError::EmptyUndoStack)?;
        tracing::debug!("Undoing command {}", cmd.kind());
        if let Err(e) = cmd.undo(&mut self.session) {
            self.done.push(cmd);
            return Err(e);
        }
        self.undone.push(cmd);
        Ok(())
    }

    /// Redo the most recently undone command
    pub fn redo(&mut self) -> Result<()> {
        let mut cmd = self.undone.pop().ok_or(CommandError::EmptyRedoStack)?;
        tracing::debug!("Redoing command {}", cmd.kind());
        if let Err(e) = cmd.execute(&mut self.session) {
            self.undone.push(cmd);
            return Err(e);
        }
        self.done.push(cmd);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.done.len()
    }

    pub fn redo_len(&self) -> usize {
        self.undone.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Push {
        value: i32,
    }

    impl Push {
        const KIND: &'static str = "Push";

        fn from_args(mut args: CommandArgs<i32>) -> Result<Self> {
            args.require(Self::KIND, &["value"])?;
            Ok(Self {
                value: args.take(Self::KIND, "value")?,
            })
        }
    }

    impl Command<Vec<i32>> for Push {
        fn kind(&self) -> &'static str {
            Self::KIND
        }

        fn execute(&mut self, session: &mut Vec<i32>) -> Result<()> {
            session.push(self.value);
            Ok(())
        }

        fn undo(&mut self, session: &mut Vec<i32>) -> Result<()> {
            session.pop();
            Ok(())
        }
    }

    fn push(value: i32) -> Box<dyn Command<Vec<i32>>> {
        Box::new(Push::from_args(CommandArgs::new().with("value", value)).unwrap())
    }

    #[test]
    fn test_missing_keyword() {
        let err = Push::from_args(CommandArgs::new()).err().unwrap();
        assert!(matches!(err, CommandError::MissingKeyword { keyword, .. } if keyword == "value"));
    }

    #[test]
    fn test_undo_redo_scenario() {
        let mut stack = CommandStack::new(Vec::new());
        stack.do_command(push(1)).unwrap();
        stack.do_command(push(2)).unwrap();
        stack.undo().unwrap();
        stack.redo().unwrap();
        assert_eq!(stack.session(), &vec![1, 2]);

        stack.undo().unwrap();
        stack.undo().unwrap();
        assert!(stack.session().is_empty());
        assert!(matches!(stack.undo(), Err(CommandError::EmptyUndoStack)));
    }

    #[test]
    fn test_do_clears_redo() {
        let mut stack = CommandStack::new(Vec::new());
        stack.do_command(push(1)).unwrap();
        stack.undo().unwrap();
        assert!(stack.can_redo());

        stack.do_command(push(3)).unwrap();
        assert!(!stack.can_redo());
        assert!(matches!(stack.redo(), Err(CommandError::EmptyRedoStack)));
        assert_eq!(stack.session(), &vec![3]);
    }

    #[test]
    fn test_history_limit() {
        let mut stack = CommandStack::new(Vec::new()).with_max_history(Some(2));
        for i in 0..5 {
            stack.do_command(push(i)).unwrap();
        }
        assert_eq!(stack.undo_len(), 2);
        assert_eq!(stack.session().len(), 5);
    }
}
