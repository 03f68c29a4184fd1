//! Line-oriented debug shell dispatcher.
//!
//! Both boards expose a small serial debug shell. The dispatcher is generic
//! over an action type: a board registers its command table once, and
//! dispatching a line yields the tagged action plus its arguments for the
//! board loop to run. `help` is built in and renders the table.

use std::fmt::Write as _;

/// One registered command.
#[derive(Debug, Clone)]
struct Command<A> {
    name: &'static str,
    help: &'static str,
    action: A,
}

/// Result of dispatching one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<A> {
    /// A registered command matched.
    Action { action: A, args: Vec<String> },
    /// The built-in `help` command; contains the rendered table.
    Help(String),
    /// No command with that name.
    Unknown(String),
    /// Blank input.
    Empty,
}

/// Command table for one board's debug shell.
#[derive(Debug, Clone)]
pub struct Shell<A> {
    commands: Vec<Command<A>>,
}

impl<A: Clone> Shell<A> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command. Builder-style so tables read as a list.
    pub fn command(mut self, name: &'static str, help: &'static str, action: A) -> Self {
        self.commands.push(Command { name, help, action });
        self
    }

    /// Match an input line against the table.
    pub fn dispatch(&self, line: &str) -> Dispatch<A> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Dispatch::Empty;
        };
        let name = name.to_ascii_lowercase();

        if name == "help" {
            return Dispatch::Help(self.render_help());
        }

        match self.commands.iter().find(|c| c.name == name) {
            Some(command) => Dispatch::Action {
                action: command.action.clone(),
                args: tokens.map(str::to_string).collect(),
            },
            None => Dispatch::Unknown(name),
        }
    }

    fn render_help(&self) -> String {
        let width = self
            .commands
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("help".len());

        let mut out = String::new();
        for command in &self.commands {
            let _ = writeln!(out, "{:width$}  {}", command.name, command.help);
        }
        let _ = writeln!(out, "{:width$}  {}", "help", "list available commands");
        out
    }
}

impl<A: Clone> Default for Shell<A> {
    fn default() -> Self {
        Self::new()
    }
}
